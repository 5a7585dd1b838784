//! Serves a pre-registered table of batches. Always supports projection;
//! predicate/limit pushdown apply to the whole DNF shape except `LIKE`
//! (§4.7's "specialized connector behaviors"), which always passes every
//! row through and relies on the engine's residual filter to apply it.

use crate::connector::{
    BatchStream, Capabilities, Connector, ConnectorMode, DateRange, PartitionKey, ScanRequest,
};
use crate::predicate::{DnfComparison, DnfOp, DnfPredicate};
use arrow::array::{
    ArrayRef, BinaryArray, BooleanArray, Date32Array, Decimal128Array, Float64Array, Int64Array,
    StringArray, TimestampMicrosecondArray,
};
use arrow::compute::kernels::boolean::{and_kleene, not, or_kleene};
use arrow::compute::kernels::cmp::{eq, gt, gt_eq, lt, lt_eq, neq};
use arrow::compute::{is_not_null, is_null};
use async_trait::async_trait;
use std::sync::Arc;
use strata_common::{internal_error, Batch, RelationStatistics, Result, ScalarValue, Schema};

pub struct MemoryConnector {
    schema: Schema,
    batches: Vec<Batch>,
}

impl MemoryConnector {
    pub fn new(schema: Schema, batches: Vec<Batch>) -> Self {
        Self { schema, batches }
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    fn get_schema(&self) -> Result<Schema> {
        Ok(self.schema.clone())
    }

    fn get_statistics(&self) -> Result<RelationStatistics> {
        let rows: usize = self.batches.iter().map(|b| b.num_rows()).sum();
        Ok(RelationStatistics::with_record_count(rows as u64))
    }

    async fn list_partitions(&self, _range: DateRange) -> Result<Vec<PartitionKey>> {
        Ok(Vec::new())
    }

    async fn read_dataset(&self, request: ScanRequest) -> Result<BatchStream> {
        let projection_idx: Option<Vec<usize>> = match &request.projection {
            Some(names) => Some(
                names
                    .iter()
                    .map(|n| {
                        self.schema
                            .index_of(n)
                            .ok_or_else(|| internal_error(format!("unknown column {n}")))
                    })
                    .collect::<Result<Vec<_>>>()?,
            ),
            None => None,
        };

        let mut out = Vec::with_capacity(self.batches.len());
        let mut rows_emitted = 0usize;
        for batch in &self.batches {
            if let Some(limit) = request.limit {
                if rows_emitted >= limit {
                    break;
                }
            }
            // The predicate is evaluated against the full (pre-projection)
            // schema, since it may reference columns the caller didn't ask
            // to see in the result.
            let matching = match &request.predicate {
                Some(predicate) => batch.filter(&evaluate_predicate(predicate, &self.schema, batch)?)?,
                None => batch.clone(),
            };
            let projected = match &projection_idx {
                Some(idx) => matching.project(idx)?,
                None => matching,
            };
            let remaining = request.limit.map(|l| l.saturating_sub(rows_emitted));
            let sliced = match remaining {
                Some(r) if r < projected.num_rows() => {
                    let idx = arrow::array::UInt32Array::from_iter_values(0..r as u32);
                    projected.take(&idx)?
                }
                _ => projected,
            };
            rows_emitted += sliced.num_rows();
            out.push(Ok(sliced));
        }
        Ok(Box::pin(futures::stream::iter(out)))
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            predicate_pushdown: true,
            projection_pushdown: true,
            limit_pushdown: true,
            can_push_compound_predicates: true,
        }
    }

    fn mode(&self) -> ConnectorMode {
        ConnectorMode::ReadOnly
    }
}

/// Evaluates a DNF predicate against one batch, row by row, producing the
/// boolean mask `Batch::filter` expects. Mirrors the comparison/membership
/// kernels `strata-physical-expr`'s compiled expressions use (`cmp` for
/// ordering comparisons, an `eq`/`or_kleene` OR-chain for `IN`), kept local
/// here since connectors sit below that crate and can't depend on it.
fn evaluate_predicate(predicate: &DnfPredicate, schema: &Schema, batch: &Batch) -> Result<BooleanArray> {
    match predicate {
        DnfPredicate::Comparison(c) => evaluate_comparison(c, schema, batch),
        DnfPredicate::And(parts) => {
            let mut acc: Option<BooleanArray> = None;
            for part in parts {
                let next = evaluate_predicate(part, schema, batch)?;
                acc = Some(match acc {
                    Some(prev) => and_kleene(&prev, &next)?,
                    None => next,
                });
            }
            Ok(acc.unwrap_or_else(|| BooleanArray::from(vec![true; batch.num_rows()])))
        }
        DnfPredicate::Or(parts) => {
            let mut acc: Option<BooleanArray> = None;
            for part in parts {
                let next = evaluate_predicate(part, schema, batch)?;
                acc = Some(match acc {
                    Some(prev) => or_kleene(&prev, &next)?,
                    None => next,
                });
            }
            Ok(acc.unwrap_or_else(|| BooleanArray::from(vec![false; batch.num_rows()])))
        }
    }
}

fn evaluate_comparison(c: &DnfComparison, schema: &Schema, batch: &Batch) -> Result<BooleanArray> {
    // LIKE is never evaluated here: every row passes, leaving the engine's
    // residual filter (always kept for a LIKE conjunct, see
    // `strata-optimizer`'s `is_fully_pushed`) to apply it in full.
    if matches!(c.op, DnfOp::Like | DnfOp::NotLike) {
        return Ok(BooleanArray::from(vec![true; batch.num_rows()]));
    }

    let idx = schema.index_of(&c.column).ok_or_else(|| internal_error(format!("unknown column {}", c.column)))?;
    let column = batch.column(idx);
    let literal = || c.value.as_ref().ok_or_else(|| internal_error(format!("{} comparison missing its literal", c.op)));

    Ok(match c.op {
        DnfOp::Eq => eq(column, &scalar_to_array(literal()?, 1)?)?,
        DnfOp::NotEq => neq(column, &scalar_to_array(literal()?, 1)?)?,
        DnfOp::Lt => lt(column, &scalar_to_array(literal()?, 1)?)?,
        DnfOp::LtEq => lt_eq(column, &scalar_to_array(literal()?, 1)?)?,
        DnfOp::Gt => gt(column, &scalar_to_array(literal()?, 1)?)?,
        DnfOp::GtEq => gt_eq(column, &scalar_to_array(literal()?, 1)?)?,
        DnfOp::IsNull => is_null(column)?,
        DnfOp::IsNotNull => is_not_null(column)?,
        DnfOp::In | DnfOp::NotIn => {
            let mut acc: Option<BooleanArray> = None;
            for value in &c.values {
                let matched = eq(column, &scalar_to_array(value, 1)?)?;
                acc = Some(match acc {
                    Some(prev) => or_kleene(&prev, &matched)?,
                    None => matched,
                });
            }
            let membership = acc.unwrap_or_else(|| BooleanArray::from(vec![false; batch.num_rows()]));
            if c.op == DnfOp::NotIn {
                not(&membership)?
            } else {
                membership
            }
        }
        DnfOp::Like | DnfOp::NotLike => unreachable!("handled above"),
    })
}

/// Materializes a `ScalarValue` as a length-`len` array so it can be passed
/// to arrow's `Datum`-based comparison kernels (which broadcast a length-1
/// array against a full column internally).
fn scalar_to_array(value: &ScalarValue, len: usize) -> Result<ArrayRef> {
    Ok(match value {
        ScalarValue::Boolean(v) => Arc::new(BooleanArray::from(vec![*v; len])),
        ScalarValue::Int64(v) => Arc::new(Int64Array::from(vec![*v; len])),
        ScalarValue::Double(v) => Arc::new(Float64Array::from(vec![*v; len])),
        ScalarValue::Decimal128(v, p, s) => Arc::new(Decimal128Array::from(vec![*v; len]).with_precision_and_scale(*p, *s)?),
        ScalarValue::Utf8(v) => Arc::new(StringArray::from(vec![v.as_deref(); len])),
        ScalarValue::Blob(v) => Arc::new(BinaryArray::from(vec![v.as_deref(); len])),
        ScalarValue::Date(v) => Arc::new(Date32Array::from(vec![*v; len])),
        ScalarValue::Timestamp(v) => Arc::new(TimestampMicrosecondArray::from(vec![*v; len])),
        other => return Err(internal_error(format!("unsupported predicate literal for pushdown evaluation: {other}"))),
    })
}

/// A process-wide registry entry wraps connectors behind `Arc` so they can be
/// reused, reentrantly, across queries (§5's "connector instances are reused
/// across queries").
pub type SharedConnector = Arc<dyn Connector>;
