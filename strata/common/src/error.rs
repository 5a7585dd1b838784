//! The closed error taxonomy surfaced by every layer of the engine.
//!
//! Binder and optimizer errors are reported before execution starts; runtime
//! errors abort the pipeline and surface as the next `next()` call's error.

use std::fmt;

/// Crate-wide result alias, mirrored on every public fallible function.
pub type Result<T, E = StrataError> = std::result::Result<T, E>;

/// The full error taxonomy. Each variant carries a message and, where
/// applicable, the offending expression or dataset name.
#[derive(Debug, thiserror::Error)]
pub enum StrataError {
    #[error("SQL error: {0}")]
    SqlError(String),

    #[error("no SQL statement was supplied")]
    MissingSqlStatement,

    #[error("unsupported syntax: {0}")]
    UnsupportedSyntax(String),

    #[error("dataset not found: {0}")]
    DatasetNotFound(String),

    #[error("dataset is empty: {0}")]
    EmptyDataset(String),

    #[error("failed reading dataset {dataset}: {message}")]
    DatasetReadError { dataset: String, message: String },

    #[error("column not found: {0}")]
    ColumnNotFound(String),

    #[error("ambiguous identifier: {0}")]
    AmbiguousIdentifier(String),

    #[error("dataset referenced more than once without an alias: {0}")]
    AmbiguousDataset(String),

    #[error("dataset reference `{0}` is not visible in this scope")]
    UnexpectedDatasetReference(String),

    #[error("column requires an alias: {0}")]
    UnnamedColumn(String),

    #[error("subquery requires an alias")]
    UnnamedSubquery,

    #[error("incompatible types: {0}")]
    IncompatibleTypes(String),

    #[error("incorrect type: {0}")]
    IncorrectType(String),

    #[error("array literal holds mixed types: {0}")]
    ArrayWithMixedTypes(String),

    #[error("invalid function parameter: {0}")]
    InvalidFunctionParameter(String),

    #[error("function not found: {0}")]
    FunctionNotFound(String),

    #[error("function execution error in {function}: {message}")]
    FunctionExecutionError { function: String, message: String },

    #[error("invalid temporal range filter: {0}")]
    InvalidTemporalRangeFilter(String),

    #[error("column `{0}` referenced before it is evaluated")]
    ColumnReferencedBeforeEvaluation(String),

    #[error("parameter error: {0}")]
    ParameterError(String),

    #[error("permission denied reading dataset: {0}")]
    PermissionsError(String),

    #[error("unknown session variable: {0}")]
    VariableNotFound(String),

    #[error("inconsistent schema: {0}")]
    InconsistentSchema(String),

    #[error("resource exceeded: {0}")]
    ResourceExceeded(String),

    #[error("arrow error: {0}")]
    ArrowError(#[from] arrow_schema::ArrowError),

    #[error("internal error (this indicates a bug): {0}")]
    Internal(String),
}

impl StrataError {
    /// True for the subset of errors that are reported at plan time (before
    /// any operator has produced a batch), matching §7's propagation rule.
    pub fn is_planning_error(&self) -> bool {
        !matches!(
            self,
            StrataError::DatasetReadError { .. }
                | StrataError::FunctionExecutionError { .. }
                | StrataError::ResourceExceeded(_)
        )
    }
}

/// Convenience constructor mirroring `internal_err!`/`plan_err!` macros in
/// the teacher codebase, used at call sites that would otherwise need a
/// verbose `StrataError::Internal(format!(...))`.
pub fn internal_error(msg: impl fmt::Display) -> StrataError {
    StrataError::Internal(msg.to_string())
}
