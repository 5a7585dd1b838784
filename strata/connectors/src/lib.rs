//! The connector ABI and its built-in implementations: in-memory, blob/file
//! (flat or Mabel-partitioned), relational (SQL), and Iceberg.

pub mod blob;
pub mod connector;
pub mod iceberg;
pub mod memory;
pub mod predicate;
pub mod sql;

pub use blob::{BatchDecoder, BlobConnector, PartitionLayout};
pub use connector::{
    BatchStream, Capabilities, Connector, ConnectorMode, DateRange, PartitionKey, ScanRequest,
    TemporalSelector,
};
pub use iceberg::{IcebergCatalog, IcebergConnector, ManifestEntry, Snapshot};
pub use memory::{MemoryConnector, SharedConnector};
pub use predicate::{DnfComparison, DnfOp, DnfPredicate};
pub use sql::{SqlConnector, SqlCursorClient};

use std::collections::HashMap;
use std::sync::Arc;
use strata_common::{Result, StrataError};

/// Resolves a connector key to its registered implementation. The catalog
/// owns registration; the physical planner only needs lookup, so this lives
/// here rather than pulling the whole catalog crate into the planner's
/// dependency graph.
pub trait ConnectorLookup: Send + Sync {
    fn lookup(&self, key: &str) -> Result<SharedConnector>;
}

/// A simple in-process connector directory, sufficient for the built-in
/// connectors above; a deployment with external catalog integration can
/// supply its own `ConnectorLookup`.
#[derive(Default)]
pub struct ConnectorRegistry {
    connectors: HashMap<String, SharedConnector>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, key: impl Into<String>, connector: Arc<dyn Connector>) {
        self.connectors.insert(key.into(), connector);
    }
}

impl ConnectorLookup for ConnectorRegistry {
    fn lookup(&self, key: &str) -> Result<SharedConnector> {
        self.connectors
            .get(key)
            .cloned()
            .ok_or_else(|| StrataError::DatasetNotFound(key.to_string()))
    }
}
