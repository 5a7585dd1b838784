pub mod aggregate;
pub mod context;
pub mod fingerprint;
pub mod join;
pub mod operator;
pub mod operators;

pub use context::{CancellationToken, ExecutionContext};
pub use operator::{collect, ExecutionOperator, PhysicalPlan};

pub use aggregate::{AggregateFunction, AggregateSlot, HashAggregateOperator};
pub use join::{AntiJoinOperator, HashJoinOperator, JoinKind, NestedLoopJoinOperator, SemiJoinOperator};
pub use operators::{
    ConnectorScanOperator, CrossJoinUnnestOperator, DistinctOperator, FileScanOperator, HashFilterOperator,
    HeapSortOperator, InMemorySourceOperator, LimitOperator, SortKey, UnionAllOperator, VectorFilterOperator,
    VectorProjectOperator,
};
