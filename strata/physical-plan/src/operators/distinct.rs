//! `Distinct` (§3.1): implemented as hash aggregation with no aggregators,
//! grouping by every column — the first row seen for a key is the one kept.

use async_trait::async_trait;
use std::sync::Arc;
use strata_common::{Batch, Result, Schema};
use strata_physical_expr::ColumnExpr;

use crate::aggregate::hash_aggregate::HashAggregateOperator;
use crate::context::ExecutionContext;
use crate::operator::{ExecutionOperator, PhysicalPlan};

pub struct DistinctOperator {
    inner: HashAggregateOperator,
}

impl DistinctOperator {
    pub fn new(input: PhysicalPlan, schema: Arc<Schema>) -> Self {
        let group_by = schema
            .fields()
            .iter()
            .enumerate()
            .map(|(idx, field)| Arc::new(ColumnExpr::new(idx, field.logical_type.clone())) as _)
            .collect();
        let inner = HashAggregateOperator::new(input, group_by, Vec::new(), schema);
        Self { inner }
    }
}

impl std::fmt::Debug for DistinctOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DistinctOperator")
    }
}

#[async_trait]
impl ExecutionOperator for DistinctOperator {
    fn schema(&self) -> &Arc<Schema> {
        self.inner.schema()
    }

    async fn next_batch(&mut self, ctx: &ExecutionContext) -> Result<Option<Batch>> {
        self.inner.next_batch(ctx).await
    }

    fn name(&self) -> &'static str {
        "Distinct"
    }

    fn children(&self) -> Vec<&PhysicalPlan> {
        self.inner.children()
    }
}
