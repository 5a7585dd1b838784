//! Per-query execution context: cancellation, deadline, and the two tunables
//! exposed to `SET` (§6.3). Threaded through every `next_batch` call rather
//! than stashed in a thread-local, mirroring how the teacher threads a
//! `TaskContext` through `ExecutionPlan::execute`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use strata_common::{StrataError, DEFAULT_MAX_MATERIALIZE_ROWS, DEFAULT_MORSEL_ROWS};

/// Checked at the top of every operator's `next_batch`. Cloning shares the
/// same underlying flag, so a cancellation raised from outside the executor
/// (a client disconnecting, a deadline firing) is observed within one batch.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Debug)]
pub struct ExecutionContext {
    pub cancellation: CancellationToken,
    pub deadline: Option<Instant>,
    pub morsel_rows: usize,
    pub max_materialize_rows: usize,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self {
            cancellation: CancellationToken::new(),
            deadline: None,
            morsel_rows: DEFAULT_MORSEL_ROWS,
            max_materialize_rows: DEFAULT_MAX_MATERIALIZE_ROWS,
        }
    }
}

impl ExecutionContext {
    /// Called at the top of every operator's `next_batch`, per §4.5's
    /// "checked at every `next()`" cancellation contract.
    pub fn check_cancelled(&self) -> strata_common::Result<()> {
        if self.cancellation.is_cancelled() {
            return Err(StrataError::ResourceExceeded("query was cancelled".to_string()));
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                self.cancellation.cancel();
                return Err(StrataError::ResourceExceeded("query deadline exceeded".to_string()));
            }
        }
        Ok(())
    }

    /// Guards every pipeline breaker's buffered row count (invariant 4).
    pub fn check_materialize_budget(&self, buffered_rows: usize) -> strata_common::Result<()> {
        if buffered_rows > self.max_materialize_rows {
            return Err(StrataError::ResourceExceeded(format!(
                "pipeline breaker buffered {buffered_rows} rows, exceeding MAX_MATERIALIZE_ROWS ({})",
                self.max_materialize_rows
            )));
        }
        Ok(())
    }
}
