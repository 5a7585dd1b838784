//! Single-pass hash aggregation (§4.8). A pipeline breaker: the entire input
//! is consumed and grouped before the first output batch is produced.

use async_trait::async_trait;
use indexmap::IndexMap;
use std::sync::Arc;
use strata_common::{Batch, Result, Schema};
use strata_physical_expr::{scalar_vec_to_array, PhysicalExprRef};

use crate::aggregate::accumulator::{
    scalar_at, Accumulator, ApproxMedian, ArrayAgg, Avg, CountDistinct, CountStar, CountValue, FirstNonNull, MinMax,
    Sum, WelfordVariance,
};
use crate::context::ExecutionContext;
use crate::fingerprint::row_key;
use crate::operator::{ExecutionOperator, PhysicalPlan};

#[derive(Debug, Clone)]
pub enum AggregateFunction {
    CountStar,
    Count,
    Sum,
    Min,
    Max,
    Avg,
    ArrayAgg { distinct: bool, limit: Option<usize> },
    CountDistinct,
    StdDev { sample: bool },
    Variance { sample: bool },
    AnyValue,
    ApproximateMedian,
}

impl AggregateFunction {
    fn new_accumulator(&self, element_type: strata_common::LogicalType) -> Box<dyn Accumulator> {
        match self {
            AggregateFunction::CountStar => Box::new(CountStar::default()),
            AggregateFunction::Count => Box::new(CountValue::default()),
            AggregateFunction::Sum => Box::new(Sum::default()),
            AggregateFunction::Min => Box::new(MinMax::new(false)),
            AggregateFunction::Max => Box::new(MinMax::new(true)),
            AggregateFunction::Avg => Box::new(Avg::default()),
            AggregateFunction::ArrayAgg { distinct, limit } => Box::new(ArrayAgg::new(*distinct, *limit, element_type)),
            AggregateFunction::CountDistinct => Box::new(CountDistinct::default()),
            AggregateFunction::StdDev { sample } => Box::new(WelfordVariance::new(*sample, true)),
            AggregateFunction::Variance { sample } => Box::new(WelfordVariance::new(*sample, false)),
            AggregateFunction::AnyValue => Box::new(FirstNonNull::default()),
            AggregateFunction::ApproximateMedian => Box::new(ApproxMedian::default()),
        }
    }
}

pub struct AggregateSlot {
    pub function: AggregateFunction,
    /// `None` only for `COUNT(*)`.
    pub arg: Option<PhysicalExprRef>,
    pub output_type: strata_common::LogicalType,
}

enum State {
    Buffering,
    Emitting(std::vec::IntoIter<Batch>),
    Done,
}

pub struct HashAggregateOperator {
    input: PhysicalPlan,
    group_by: Vec<PhysicalExprRef>,
    aggregates: Vec<AggregateSlot>,
    schema: Arc<Schema>,
    morsel_rows: usize,
    state: State,
}

impl std::fmt::Debug for HashAggregateOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HashAggregateOperator(groups={}, aggregates={})", self.group_by.len(), self.aggregates.len())
    }
}

impl HashAggregateOperator {
    pub fn new(
        input: PhysicalPlan,
        group_by: Vec<PhysicalExprRef>,
        aggregates: Vec<AggregateSlot>,
        schema: Arc<Schema>,
    ) -> Self {
        Self { input, group_by, aggregates, schema, morsel_rows: strata_common::DEFAULT_MORSEL_ROWS, state: State::Buffering }
    }

    async fn buffer_and_group(&mut self, ctx: &ExecutionContext) -> Result<Vec<Batch>> {
        // group key -> (group values, one accumulator per aggregate)
        let mut groups: IndexMap<Vec<crate::fingerprint::KeyValue>, (Vec<strata_common::ScalarValue>, Vec<Box<dyn Accumulator>>)> =
            IndexMap::new();
        let mut buffered_rows = 0usize;

        while let Some(batch) = self.input.next_batch(ctx).await? {
            buffered_rows += batch.num_rows();
            ctx.check_materialize_budget(buffered_rows)?;

            let key_columns = self
                .group_by
                .iter()
                .map(|e| e.evaluate(&batch)?.into_array(batch.num_rows()))
                .collect::<Result<Vec<_>>>()?;
            let arg_columns = self
                .aggregates
                .iter()
                .map(|slot| match &slot.arg {
                    Some(expr) => Ok(Some(expr.evaluate(&batch)?.into_array(batch.num_rows())?)),
                    None => Ok(None),
                })
                .collect::<Result<Vec<_>>>()?;

            for row in 0..batch.num_rows() {
                let key = row_key(&key_columns, row)?;
                if !groups.contains_key(&key) {
                    let group_values = key_columns.iter().map(|c| scalar_at(c, row)).collect::<Result<Vec<_>>>()?;
                    let accumulators =
                        self.aggregates.iter().map(|slot| slot.function.new_accumulator(slot.output_type.clone())).collect();
                    groups.insert(key.clone(), (group_values, accumulators));
                }
                let entry = groups.get_mut(&key).expect("just inserted above");
                for (slot_idx, slot) in self.aggregates.iter().enumerate() {
                    let value = match &arg_columns[slot_idx] {
                        Some(arr) => Some(scalar_at(arr, row)?),
                        None => None,
                    };
                    entry.1[slot_idx].update(value.as_ref())?;
                }
            }
        }

        // Aggregation over an empty input with no GROUP BY yields one row of
        // all-null aggregates; with a GROUP BY it yields zero rows (§4.8).
        if groups.is_empty() && self.group_by.is_empty() {
            let nulls = self
                .aggregates
                .iter()
                .map(|slot| slot.function.new_accumulator(slot.output_type.clone()).finalize())
                .collect::<Result<Vec<_>>>()?;
            return self.assemble(vec![(Vec::new(), nulls)]);
        }

        let rows: Vec<(Vec<strata_common::ScalarValue>, Vec<strata_common::ScalarValue>)> = groups
            .into_values()
            .map(|(group_values, accumulators)| {
                let finalized = accumulators.iter().map(|a| a.finalize()).collect::<Result<Vec<_>>>()?;
                Ok((group_values, finalized))
            })
            .collect::<Result<Vec<_>>>()?;
        self.assemble(rows)
    }

    fn assemble(
        &self,
        rows: Vec<(Vec<strata_common::ScalarValue>, Vec<strata_common::ScalarValue>)>,
    ) -> Result<Vec<Batch>> {
        if rows.is_empty() {
            let arrow_schema = Arc::new(self.schema.to_arrow());
            return Ok(vec![Batch::new(self.schema.clone(), arrow::record_batch::RecordBatch::new_empty(arrow_schema))]);
        }
        let mut batches = Vec::new();
        for chunk in rows.chunks(self.morsel_rows.max(1)) {
            let num_columns = self.group_by.len() + self.aggregates.len();
            let mut columns = Vec::with_capacity(num_columns);
            for col_idx in 0..self.group_by.len() {
                let values: Vec<_> = chunk.iter().map(|(g, _)| g[col_idx].clone()).collect();
                columns.push(scalar_vec_to_array(&values, &self.schema.field(col_idx).logical_type)?);
            }
            for (agg_idx, slot) in self.aggregates.iter().enumerate() {
                let values: Vec<_> = chunk.iter().map(|(_, a)| a[agg_idx].clone()).collect();
                columns.push(scalar_vec_to_array(&values, &slot.output_type)?);
            }
            let arrow_schema = Arc::new(self.schema.to_arrow());
            let data = arrow::record_batch::RecordBatch::try_new(arrow_schema, columns)?;
            batches.push(Batch::new(self.schema.clone(), data));
        }
        Ok(batches)
    }
}

#[async_trait]
impl ExecutionOperator for HashAggregateOperator {
    fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    async fn next_batch(&mut self, ctx: &ExecutionContext) -> Result<Option<Batch>> {
        ctx.check_cancelled()?;
        loop {
            match &mut self.state {
                State::Buffering => {
                    let batches = self.buffer_and_group(ctx).await?;
                    self.state = State::Emitting(batches.into_iter());
                }
                State::Emitting(iter) => match iter.next() {
                    Some(batch) => return Ok(Some(batch)),
                    None => {
                        self.state = State::Done;
                        return Ok(None);
                    }
                },
                State::Done => return Ok(None),
            }
        }
    }

    fn name(&self) -> &'static str {
        "HashAggregate"
    }

    fn children(&self) -> Vec<&PhysicalPlan> {
        vec![&self.input]
    }
}
