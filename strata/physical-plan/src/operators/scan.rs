//! `ConnectorScan`/`FileScan`/`InMemorySource` (§4.4): the leaves of the
//! physical tree. `ConnectorScan` is the general case — the blob, SQL, and
//! Iceberg connectors all go through it; `FileScan` is the degenerate single-
//! file case the physical planner picks when a dataset resolves to exactly
//! one already-known file rather than a connector that must discover its own
//! partitions. `InMemorySource` replays an already-materialized `Vec<Batch>`,
//! used both for the in-memory connector and for breaking DAG sharing into
//! an explicit tree (invariant 5).

use async_trait::async_trait;
use futures::StreamExt;
use object_store::{path::Path as ObjectPath, ObjectStore};
use std::sync::Arc;
use strata_common::{Batch, Result, Schema};
use strata_connectors::blob::BatchDecoder;
use strata_connectors::{BatchStream, ScanRequest, SharedConnector};

use crate::context::ExecutionContext;
use crate::operator::ExecutionOperator;

enum ScanState {
    Pending(ScanRequest),
    Open(BatchStream),
    Done,
}

pub struct ConnectorScanOperator {
    connector: SharedConnector,
    schema: Arc<Schema>,
    state: ScanState,
}

impl ConnectorScanOperator {
    pub fn new(connector: SharedConnector, request: ScanRequest, schema: Arc<Schema>) -> Self {
        Self { connector, schema, state: ScanState::Pending(request) }
    }
}

impl std::fmt::Debug for ConnectorScanOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ConnectorScanOperator")
    }
}

#[async_trait]
impl ExecutionOperator for ConnectorScanOperator {
    fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    async fn next_batch(&mut self, ctx: &ExecutionContext) -> Result<Option<Batch>> {
        ctx.check_cancelled()?;
        loop {
            match std::mem::replace(&mut self.state, ScanState::Done) {
                ScanState::Pending(request) => {
                    let stream = self.connector.read_dataset(request).await?;
                    self.state = ScanState::Open(stream);
                }
                ScanState::Open(mut stream) => match stream.next().await {
                    Some(batch) => {
                        let batch = batch?;
                        self.state = ScanState::Open(stream);
                        return Ok(Some(batch));
                    }
                    None => return Ok(None),
                },
                ScanState::Done => return Ok(None),
            }
        }
    }

    fn name(&self) -> &'static str {
        "ConnectorScan"
    }

    fn detail(&self) -> Option<String> {
        // Only available before the first pull, since the request is moved
        // into `Connector::read_dataset` once the scan actually opens.
        let ScanState::Pending(request) = &self.state else { return None };
        let mut parts = Vec::new();
        if let Some(predicate) = &request.predicate {
            parts.push(format!("predicate={predicate}"));
        }
        if let Some(projection) = &request.projection {
            parts.push(format!("projection=[{}]", projection.join(", ")));
        }
        if let Some(limit) = request.limit {
            parts.push(format!("limit={limit}"));
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }
}

/// The degenerate single-file case: the physical planner picks this over
/// `ConnectorScan` when a dataset already resolved to exactly one blob path,
/// skipping partition discovery entirely. Reads and decodes the whole file
/// on the first pull, then yields one batch.
pub struct FileScanOperator {
    store: Arc<dyn ObjectStore>,
    path: String,
    schema: Arc<Schema>,
    decoder: Arc<dyn BatchDecoder>,
    done: bool,
}

impl FileScanOperator {
    pub fn new(store: Arc<dyn ObjectStore>, path: impl Into<String>, schema: Arc<Schema>, decoder: Arc<dyn BatchDecoder>) -> Self {
        Self { store, path: path.into(), schema, decoder, done: false }
    }
}

impl std::fmt::Debug for FileScanOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FileScanOperator({})", self.path)
    }
}

#[async_trait]
impl ExecutionOperator for FileScanOperator {
    fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    async fn next_batch(&mut self, ctx: &ExecutionContext) -> Result<Option<Batch>> {
        ctx.check_cancelled()?;
        if self.done {
            return Ok(None);
        }
        self.done = true;
        let object_path = ObjectPath::from(self.path.as_str());
        let bytes = self
            .store
            .get(&object_path)
            .await
            .map_err(|e| strata_common::StrataError::DatasetReadError { dataset: self.path.clone(), message: e.to_string() })?
            .bytes()
            .await
            .map_err(|e| strata_common::StrataError::DatasetReadError { dataset: self.path.clone(), message: e.to_string() })?;
        Ok(Some(self.decoder.decode(&self.schema, bytes)?))
    }

    fn name(&self) -> &'static str {
        "FileScan"
    }
}

/// Replays a pre-materialized batch vector, used both by the in-memory
/// connector's caller and to re-root a shared logical subplan as its own
/// physical tree.
pub struct InMemorySourceOperator {
    schema: Arc<Schema>,
    batches: std::vec::IntoIter<Batch>,
}

impl InMemorySourceOperator {
    pub fn new(schema: Arc<Schema>, batches: Vec<Batch>) -> Self {
        Self { schema, batches: batches.into_iter() }
    }
}

impl std::fmt::Debug for InMemorySourceOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InMemorySourceOperator")
    }
}

#[async_trait]
impl ExecutionOperator for InMemorySourceOperator {
    fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    async fn next_batch(&mut self, ctx: &ExecutionContext) -> Result<Option<Batch>> {
        ctx.check_cancelled()?;
        Ok(self.batches.next())
    }

    fn name(&self) -> &'static str {
        "InMemorySource"
    }
}
