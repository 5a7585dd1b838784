pub mod distinct;
pub mod filter;
pub mod limit;
pub mod project;
pub mod scan;
pub mod sort;
pub mod union;
pub mod unnest;

pub use distinct::DistinctOperator;
pub use filter::{HashFilterOperator, VectorFilterOperator};
pub use limit::LimitOperator;
pub use project::VectorProjectOperator;
pub use scan::{ConnectorScanOperator, FileScanOperator, InMemorySourceOperator};
pub use sort::{HeapSortOperator, SortKey};
pub use union::UnionAllOperator;
pub use unnest::CrossJoinUnnestOperator;
