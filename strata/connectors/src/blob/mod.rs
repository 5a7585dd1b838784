//! The blob/file connector: operates on a prefix, discovers files, and reads
//! each as a batch through an injected format decoder (Parquet/ORC/Arrow
//! IPC/JSONL decoding itself is out of scope — see `BatchDecoder`).

pub mod mabel;

use crate::connector::{
    BatchStream, Capabilities, Connector, ConnectorMode, DateRange, PartitionKey, ScanRequest,
    TemporalSelector,
};
use async_trait::async_trait;
use chrono::Utc;
use futures::{StreamExt, TryStreamExt};
use object_store::{path::Path as ObjectPath, ObjectStore};
use std::sync::Arc;
use strata_common::{Batch, RelationStatistics, Result, Schema, StrataError};

/// Decodes one blob's bytes into a `Batch`. Parquet/ORC/Arrow IPC/JSONL
/// decoders are external collaborators implementing this trait; the engine
/// only depends on the contract.
pub trait BatchDecoder: Send + Sync {
    fn decode(&self, schema: &Schema, bytes: bytes::Bytes) -> Result<Batch>;
}

pub enum PartitionLayout {
    /// Flat prefix: every object under `prefix` is a data file.
    Flat,
    /// `year_YYYY/month_MM/day_DD/[by_hour/hour=HH/]as_at_*/…`.
    Mabel,
}

pub struct BlobConnector {
    store: Arc<dyn ObjectStore>,
    prefix: String,
    schema: Schema,
    decoder: Arc<dyn BatchDecoder>,
    layout: PartitionLayout,
    statistics: RelationStatistics,
}

impl BlobConnector {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        prefix: impl Into<String>,
        schema: Schema,
        decoder: Arc<dyn BatchDecoder>,
        layout: PartitionLayout,
    ) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            schema,
            decoder,
            layout,
            statistics: RelationStatistics::unknown(),
        }
    }

    async fn list_all(&self) -> Result<Vec<String>> {
        let prefix = ObjectPath::from(self.prefix.as_str());
        let mut names = Vec::new();
        let mut stream = self.store.list(Some(&prefix));
        while let Some(meta) = stream
            .try_next()
            .await
            .map_err(|e| StrataError::DatasetReadError {
                dataset: self.prefix.clone(),
                message: e.to_string(),
            })?
        {
            names.push(meta.location.to_string());
        }
        Ok(names)
    }

    async fn resolve_blobs(&self, request: &ScanRequest) -> Result<Vec<String>> {
        match self.layout {
            PartitionLayout::Flat => self.list_all().await,
            PartitionLayout::Mabel => {
                let all = self.list_all().await?;
                let range = match &request.temporal {
                    Some(TemporalSelector::DateRange(r)) => *r,
                    _ => {
                        let today = Utc::now().date_naive();
                        DateRange { start: today, end: today }
                    }
                };
                mabel::select_blobs_in_range(&self.prefix, range.start, range.end, &all)
            }
        }
    }
}

#[async_trait]
impl Connector for BlobConnector {
    fn get_schema(&self) -> Result<Schema> {
        Ok(self.schema.clone())
    }

    fn get_statistics(&self) -> Result<RelationStatistics> {
        Ok(self.statistics.clone())
    }

    async fn list_partitions(&self, range: DateRange) -> Result<Vec<PartitionKey>> {
        let blobs = match self.layout {
            PartitionLayout::Flat => self.list_all().await?,
            PartitionLayout::Mabel => {
                mabel::select_blobs_in_range(&self.prefix, range.start, range.end, &self.list_all().await?)?
            }
        };
        Ok(blobs.into_iter().map(PartitionKey).collect())
    }

    async fn read_dataset(&self, request: ScanRequest) -> Result<BatchStream> {
        let blobs = self.resolve_blobs(&request).await?;
        let store = self.store.clone();
        let decoder = self.decoder.clone();
        let schema = self.schema.clone();
        let projection = request.projection.clone();
        let limit = request.limit;

        let stream = futures::stream::iter(blobs).then(move |path| {
            let store = store.clone();
            let decoder = decoder.clone();
            let schema = schema.clone();
            async move {
                let object_path = ObjectPath::from(path.as_str());
                let bytes = store
                    .get(&object_path)
                    .await
                    .map_err(|e| StrataError::DatasetReadError {
                        dataset: path.clone(),
                        message: e.to_string(),
                    })?
                    .bytes()
                    .await
                    .map_err(|e| StrataError::DatasetReadError {
                        dataset: path.clone(),
                        message: e.to_string(),
                    })?;
                decoder.decode(&schema, bytes)
            }
        });

        let stream = stream.and_then(move |batch| {
            let projection = projection.clone();
            async move {
                match &projection {
                    Some(names) => {
                        let idx: Result<Vec<usize>> = names
                            .iter()
                            .map(|n| {
                                batch.schema().index_of(n).ok_or_else(|| {
                                    strata_common::internal_error(format!("unknown column {n}"))
                                })
                            })
                            .collect();
                        batch.project(&idx?)
                    }
                    None => Ok(batch),
                }
            }
        });

        // Limit is applied as a row budget across the blob stream; the
        // connector reports fewer rows than requested only once the budget
        // is exhausted, never more (§4.7 point 3).
        let limited: BatchStream = if let Some(limit) = limit {
            let remaining = Arc::new(std::sync::atomic::AtomicUsize::new(limit));
            Box::pin(stream.try_take_while(move |_| {
                let remaining = remaining.clone();
                async move { Ok(remaining.fetch_sub(1, std::sync::atomic::Ordering::SeqCst) > 0) }
            }))
        } else {
            Box::pin(stream)
        };
        Ok(limited)
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            predicate_pushdown: false,
            projection_pushdown: true,
            limit_pushdown: true,
            can_push_compound_predicates: false,
        }
    }

    fn mode(&self) -> ConnectorMode {
        ConnectorMode::ReadOnly
    }
}
