//! `HashJoin`/`SemiJoin`/`AntiJoin` (§4.9): the build side is buffered into
//! one combined batch and a key -> row-indices multimap; the probe side
//! streams through unchanged. Join keys use the same fingerprint scheme as
//! `HashAggregate` (§4.8), with SQL null-equals-null = false.

use arrow::array::{Array, UInt32Array};
use async_trait::async_trait;
use hashbrown::HashMap;
use std::sync::Arc;
use strata_common::{Batch, Result, Schema};
use strata_physical_expr::PhysicalExprRef;

use crate::context::ExecutionContext;
use crate::fingerprint::{row_key, RowKey};
use crate::operator::{ExecutionOperator, PhysicalPlan};

/// `JoinKind` collapses the logical `JoinType` into the two booleans a hash
/// join actually branches on: whether an unmatched probe row survives, and
/// whether an unmatched build row survives. `RIGHT OUTER` is `LEFT OUTER`
/// with the build/probe roles assigned symmetrically by the physical
/// planner (§4.4's "implementation may swap sides").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
}

impl JoinKind {
    fn emit_unmatched_probe(self) -> bool {
        matches!(self, JoinKind::Left | JoinKind::Full)
    }
    fn emit_unmatched_build(self) -> bool {
        matches!(self, JoinKind::Right | JoinKind::Full)
    }
}

struct BuildSide {
    batch: Batch,
    multimap: HashMap<RowKey, Vec<u32>>,
    matched: Vec<bool>,
}

async fn materialize_build_side(
    mut build: PhysicalPlan,
    keys: &[PhysicalExprRef],
    ctx: &ExecutionContext,
) -> Result<BuildSide> {
    let schema = build.schema().clone();
    let mut batches = Vec::new();
    let mut total_rows = 0usize;
    while let Some(batch) = build.next_batch(ctx).await? {
        total_rows += batch.num_rows();
        ctx.check_materialize_budget(total_rows)?;
        batches.push(batch);
    }
    let combined = Batch::concat(schema, &batches)?;

    let key_columns = keys
        .iter()
        .map(|e| e.evaluate(&combined)?.into_array(combined.num_rows()))
        .collect::<Result<Vec<_>>>()?;
    let mut multimap: HashMap<RowKey, Vec<u32>> = HashMap::new();
    for row in 0..combined.num_rows() {
        if key_columns.iter().any(|c| c.is_null(row)) {
            continue; // null-equals-null = false; a row with a null key never matches
        }
        let key = row_key(&key_columns, row)?;
        multimap.entry(key).or_default().push(row as u32);
    }
    let matched = vec![false; combined.num_rows()];
    Ok(BuildSide { batch: combined, multimap, matched })
}

enum State {
    Building,
    Probing(BuildSide),
    EmittingUnmatchedBuild(BuildSide),
    Done,
}

pub struct HashJoinOperator {
    build_input: Option<PhysicalPlan>,
    probe_input: PhysicalPlan,
    build_keys: Vec<PhysicalExprRef>,
    probe_keys: Vec<PhysicalExprRef>,
    kind: JoinKind,
    schema: Arc<Schema>,
    probe_schema: Arc<Schema>,
    state: State,
}

impl std::fmt::Debug for HashJoinOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HashJoinOperator({:?})", self.kind)
    }
}

impl HashJoinOperator {
    pub fn new(
        build_input: PhysicalPlan,
        probe_input: PhysicalPlan,
        build_keys: Vec<PhysicalExprRef>,
        probe_keys: Vec<PhysicalExprRef>,
        kind: JoinKind,
        schema: Arc<Schema>,
    ) -> Self {
        let probe_schema = probe_input.schema().clone();
        Self {
            build_input: Some(build_input),
            probe_input,
            build_keys,
            probe_keys,
            kind,
            schema,
            probe_schema,
            state: State::Building,
        }
    }

    async fn probe_one_batch(&mut self, build: &mut BuildSide, ctx: &ExecutionContext) -> Result<Option<Batch>> {
        loop {
            let Some(probe_batch) = self.probe_input.next_batch(ctx).await? else { return Ok(None) };
            let probe_key_columns = self
                .probe_keys
                .iter()
                .map(|e| e.evaluate(&probe_batch)?.into_array(probe_batch.num_rows()))
                .collect::<Result<Vec<_>>>()?;

            let mut probe_indices = Vec::new();
            let mut build_indices: Vec<Option<u32>> = Vec::new();
            for row in 0..probe_batch.num_rows() {
                let has_null_key = probe_key_columns.iter().any(|c| c.is_null(row));
                let matches = if has_null_key {
                    None
                } else {
                    let key = row_key(&probe_key_columns, row)?;
                    build.multimap.get(&key)
                };
                match matches {
                    Some(build_rows) if !build_rows.is_empty() => {
                        for &build_row in build_rows {
                            build.matched[build_row as usize] = true;
                            probe_indices.push(row as u32);
                            build_indices.push(Some(build_row));
                        }
                    }
                    _ => {
                        if self.kind.emit_unmatched_probe() {
                            probe_indices.push(row as u32);
                            build_indices.push(None);
                        }
                    }
                }
            }
            if probe_indices.is_empty() {
                continue;
            }
            let probe_side = probe_batch.take(&UInt32Array::from(probe_indices))?;
            let build_side = build.batch.take(&UInt32Array::from(build_indices))?;
            return Ok(Some(concat_sides(&self.schema, probe_side, build_side)?));
        }
    }

    fn emit_unmatched_build_batch(&self, build: &BuildSide) -> Result<Option<Batch>> {
        let unmatched: Vec<u32> = build
            .matched
            .iter()
            .enumerate()
            .filter(|(_, m)| !**m)
            .map(|(i, _)| i as u32)
            .collect();
        if unmatched.is_empty() {
            return Ok(None);
        }
        let build_side = build.batch.take(&UInt32Array::from(unmatched.clone()))?;
        let probe_side = null_batch(&self.probe_schema, unmatched.len());
        Ok(Some(concat_sides(&self.schema, probe_side, build_side)?))
    }
}

fn null_batch(schema: &Arc<Schema>, rows: usize) -> Batch {
    let arrow_schema = Arc::new(schema.to_arrow());
    let columns = schema.fields().iter().map(|f| arrow::array::new_null_array(&f.logical_type.to_arrow(), rows)).collect();
    let data = arrow::record_batch::RecordBatch::try_new(arrow_schema, columns).expect("null columns match schema");
    Batch::new(schema.clone(), data)
}

pub(crate) fn concat_sides(output_schema: &Arc<Schema>, probe: Batch, build: Batch) -> Result<Batch> {
    let arrow_schema = Arc::new(output_schema.to_arrow());
    let mut columns = Vec::with_capacity(probe.num_columns() + build.num_columns());
    columns.extend((0..probe.num_columns()).map(|i| probe.column(i).clone()));
    columns.extend((0..build.num_columns()).map(|i| build.column(i).clone()));
    let data = arrow::record_batch::RecordBatch::try_new(arrow_schema, columns)?;
    Ok(Batch::new(output_schema.clone(), data))
}

#[async_trait]
impl ExecutionOperator for HashJoinOperator {
    fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    async fn next_batch(&mut self, ctx: &ExecutionContext) -> Result<Option<Batch>> {
        ctx.check_cancelled()?;
        loop {
            match std::mem::replace(&mut self.state, State::Done) {
                State::Building => {
                    let build_input = self.build_input.take().expect("build runs exactly once");
                    let build = materialize_build_side(build_input, &self.build_keys, ctx).await?;
                    self.state = State::Probing(build);
                }
                State::Probing(mut build) => match self.probe_one_batch(&mut build, ctx).await? {
                    Some(batch) => {
                        self.state = State::Probing(build);
                        return Ok(Some(batch));
                    }
                    None => {
                        if self.kind.emit_unmatched_build() {
                            self.state = State::EmittingUnmatchedBuild(build);
                        } else {
                            self.state = State::Done;
                            return Ok(None);
                        }
                    }
                },
                State::EmittingUnmatchedBuild(build) => {
                    let result = self.emit_unmatched_build_batch(&build)?;
                    self.state = State::Done;
                    return Ok(result);
                }
                State::Done => return Ok(None),
            }
        }
    }

    fn name(&self) -> &'static str {
        "HashJoin"
    }
}

/// `LEFT SEMI`: emits the probe row once if any build match exists.
pub struct SemiJoinOperator {
    build_input: Option<PhysicalPlan>,
    probe_input: PhysicalPlan,
    build_keys: Vec<PhysicalExprRef>,
    probe_keys: Vec<PhysicalExprRef>,
    negate: bool,
    schema: Arc<Schema>,
    state: SemiAntiState,
}

enum SemiAntiState {
    Building,
    Probing(BuildSide),
    Done,
}

impl std::fmt::Debug for SemiJoinOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}Operator", if self.negate { "AntiJoin" } else { "SemiJoin" })
    }
}

impl SemiJoinOperator {
    pub fn new(
        build_input: PhysicalPlan,
        probe_input: PhysicalPlan,
        build_keys: Vec<PhysicalExprRef>,
        probe_keys: Vec<PhysicalExprRef>,
        negate: bool,
        schema: Arc<Schema>,
    ) -> Self {
        Self { build_input: Some(build_input), probe_input, build_keys, probe_keys, negate, schema, state: SemiAntiState::Building }
    }
}

#[async_trait]
impl ExecutionOperator for SemiJoinOperator {
    fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    async fn next_batch(&mut self, ctx: &ExecutionContext) -> Result<Option<Batch>> {
        ctx.check_cancelled()?;
        loop {
            match std::mem::replace(&mut self.state, SemiAntiState::Done) {
                SemiAntiState::Building => {
                    let build_input = self.build_input.take().expect("build runs exactly once");
                    let build = materialize_build_side(build_input, &self.build_keys, ctx).await?;
                    self.state = SemiAntiState::Probing(build);
                }
                SemiAntiState::Probing(build) => {
                    let Some(probe_batch) = self.probe_input.next_batch(ctx).await? else {
                        self.state = SemiAntiState::Done;
                        return Ok(None);
                    };
                    let probe_key_columns = self
                        .probe_keys
                        .iter()
                        .map(|e| e.evaluate(&probe_batch)?.into_array(probe_batch.num_rows()))
                        .collect::<Result<Vec<_>>>()?;
                    let mut keep = Vec::new();
                    for row in 0..probe_batch.num_rows() {
                        let has_null_key = probe_key_columns.iter().any(|c| c.is_null(row));
                        let exists = !has_null_key
                            && row_key(&probe_key_columns, row).ok().is_some_and(|key| build.multimap.contains_key(&key));
                        if exists != self.negate {
                            keep.push(row as u32);
                        }
                    }
                    self.state = SemiAntiState::Probing(build);
                    if keep.is_empty() {
                        continue;
                    }
                    return Ok(Some(probe_batch.take(&UInt32Array::from(keep))?));
                }
                SemiAntiState::Done => return Ok(None),
            }
        }
    }

    fn name(&self) -> &'static str {
        if self.negate { "AntiJoin" } else { "SemiJoin" }
    }
}

pub type AntiJoinOperator = SemiJoinOperator;
