//! The connector ABI seam (§4.7). A new data source is added by implementing
//! this trait; capability flags allow gradual implementations — a connector
//! that reports `predicate_pushdown: false` still functions, the engine
//! compensates with a post-scan filter.

use crate::predicate::DnfPredicate;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::fmt;
use strata_common::{Batch, RelationStatistics, Result, Schema};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub predicate_pushdown: bool,
    pub projection_pushdown: bool,
    pub limit_pushdown: bool,
    pub can_push_compound_predicates: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorMode {
    ReadOnly,
    ReadWrite,
}

/// A hierarchical blob-store partition key, e.g. a Mabel `year_/month_/day_`
/// folder or an Iceberg manifest file handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionKey(pub String);

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An inclusive date range, used by `list_partitions` and by the temporal
/// resolver's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// A resolved point-in-time selector, emitted by the binder from a `FOR`
/// clause and handed to the connector as a scan parameter (§9's "temporal
/// clauses as plan-time rewrites").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemporalSelector {
    /// Blob/Mabel: an inclusive hour-stepped date range.
    DateRange(DateRange),
    /// Iceberg: the snapshot at or before this instant.
    Snapshot(DateTime<Utc>),
}

/// What projection/predicate/limit a connector honored, so the engine knows
/// what must still be applied post-scan. A connector that can only partially
/// satisfy a predicate returns the parts it *did* honor here; the engine
/// re-applies the full predicate regardless, which is always correct and
/// avoids making every connector reason about partial satisfaction.
#[derive(Debug, Clone, Default)]
pub struct ScanRequest {
    pub projection: Option<Vec<String>>,
    pub predicate: Option<DnfPredicate>,
    pub limit: Option<usize>,
    pub temporal: Option<TemporalSelector>,
}

/// A batch stream a connector hands back from `read_dataset`. Connectors MAY
/// use bounded internal parallelism to fetch blobs; batches still arrive at
/// the single executor thread in arrival order (§4.5).
pub type BatchStream = std::pin::Pin<Box<dyn futures::Stream<Item = Result<Batch>> + Send>>;

#[async_trait]
pub trait Connector: Send + Sync {
    fn get_schema(&self) -> Result<Schema>;

    fn get_statistics(&self) -> Result<RelationStatistics> {
        Ok(RelationStatistics::unknown())
    }

    async fn list_partitions(&self, _range: DateRange) -> Result<Vec<PartitionKey>> {
        Ok(Vec::new())
    }

    async fn read_dataset(&self, request: ScanRequest) -> Result<BatchStream>;

    fn capabilities(&self) -> Capabilities;

    fn mode(&self) -> ConnectorMode {
        ConnectorMode::ReadOnly
    }
}
