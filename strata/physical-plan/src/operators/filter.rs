//! `VectorFilter`/`HashFilter` (§3.1): both reduce a batch to the rows
//! matching a predicate. `VectorFilter` evaluates an arbitrary compiled
//! boolean expression per batch; `HashFilter` is the specialization the
//! optimizer picks for `column IN (literal, literal, ...)`, precomputing a
//! hash set once at construction instead of compiling an OR-chain.

use arrow::array::AsArray;
use async_trait::async_trait;
use std::sync::Arc;
use strata_common::{internal_error, Batch, Result, ScalarValue, Schema};
use strata_physical_expr::PhysicalExprRef;

use crate::aggregate::accumulator::scalar_at;
use crate::context::ExecutionContext;
use crate::operator::{ExecutionOperator, PhysicalPlan};

pub struct VectorFilterOperator {
    input: PhysicalPlan,
    predicate: PhysicalExprRef,
}

impl VectorFilterOperator {
    pub fn new(input: PhysicalPlan, predicate: PhysicalExprRef) -> Self {
        Self { input, predicate }
    }
}

impl std::fmt::Debug for VectorFilterOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "VectorFilterOperator")
    }
}

#[async_trait]
impl ExecutionOperator for VectorFilterOperator {
    fn schema(&self) -> &Arc<Schema> {
        self.input.schema()
    }

    async fn next_batch(&mut self, ctx: &ExecutionContext) -> Result<Option<Batch>> {
        ctx.check_cancelled()?;
        loop {
            let Some(batch) = self.input.next_batch(ctx).await? else { return Ok(None) };
            let mask = self.predicate.evaluate(&batch)?.into_array(batch.num_rows())?;
            let mask = mask.as_boolean();
            let filtered = batch.filter(mask)?;
            if filtered.num_rows() == 0 {
                continue;
            }
            return Ok(Some(filtered));
        }
    }

    fn name(&self) -> &'static str {
        "VectorFilter"
    }

    fn children(&self) -> Vec<&PhysicalPlan> {
        vec![&self.input]
    }
}

/// Set membership test against a precomputed hash set of scalar values,
/// chosen by the optimizer over `VectorFilter` + `InListExpr` when the list
/// is large enough that a hash lookup beats an OR-chain evaluated per batch.
pub struct HashFilterOperator {
    input: PhysicalPlan,
    column: usize,
    values: hashbrown::HashSet<ScalarKey>,
    negate: bool,
}

#[derive(PartialEq, Eq, Hash)]
struct ScalarKey(String);

fn scalar_key(value: &ScalarValue) -> Result<Option<ScalarKey>> {
    if value.is_null() {
        return Ok(None);
    }
    Ok(Some(ScalarKey(value.to_string())))
}

impl HashFilterOperator {
    pub fn new(input: PhysicalPlan, column: usize, values: &[ScalarValue], negate: bool) -> Result<Self> {
        let values = values
            .iter()
            .map(scalar_key)
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .flatten()
            .collect();
        Ok(Self { input, column, values, negate })
    }
}

impl std::fmt::Debug for HashFilterOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HashFilterOperator(col={})", self.column)
    }
}

#[async_trait]
impl ExecutionOperator for HashFilterOperator {
    fn schema(&self) -> &Arc<Schema> {
        self.input.schema()
    }

    async fn next_batch(&mut self, ctx: &ExecutionContext) -> Result<Option<Batch>> {
        ctx.check_cancelled()?;
        loop {
            let Some(batch) = self.input.next_batch(ctx).await? else { return Ok(None) };
            if self.column >= batch.num_columns() {
                return Err(internal_error("HashFilter column index out of range"));
            }
            let column = batch.column(self.column);
            let mut keep = Vec::with_capacity(batch.num_rows());
            for row in 0..batch.num_rows() {
                let value = scalar_at(column, row)?;
                let is_member = scalar_key(&value)?.is_some_and(|k| self.values.contains(&k));
                keep.push(is_member != self.negate);
            }
            let mask = arrow::array::BooleanArray::from(keep);
            let filtered = batch.filter(&mask)?;
            if filtered.num_rows() == 0 {
                continue;
            }
            return Ok(Some(filtered));
        }
    }

    fn name(&self) -> &'static str {
        "HashFilter"
    }

    fn children(&self) -> Vec<&PhysicalPlan> {
        vec![&self.input]
    }
}
