pub mod accumulator;
pub mod hash_aggregate;

pub use hash_aggregate::{AggregateFunction, AggregateSlot, HashAggregateOperator};
