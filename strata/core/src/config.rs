//! Session-scoped configuration (§6.3): the variables a `SET <name> = <value>`
//! statement may change, applying to every subsequent statement on the same
//! cursor. Grounded on `strata_physical_plan::ExecutionContext`'s tunables
//! (`morsel_rows`, `max_materialize_rows`) — this struct is the session-level
//! superset that also carries the optimizer bypass flag, built the way the
//! teacher threads a `SessionConfig`/`ConfigOptions` through planning rather
//! than reading environment globals at each call site.

use strata_common::{StrataError, DEFAULT_MAX_MATERIALIZE_ROWS, DEFAULT_MORSEL_ROWS};

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub disable_optimizer: bool,
    pub morsel_rows: usize,
    pub max_materialize_rows: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            disable_optimizer: false,
            morsel_rows: DEFAULT_MORSEL_ROWS,
            max_materialize_rows: DEFAULT_MAX_MATERIALIZE_ROWS,
        }
    }
}

impl SessionConfig {
    /// Applies one `SET <name> = <value>` assignment. `enable_optimizer` is
    /// kept for compat (§6.3) and is just the negated spelling of
    /// `disable_optimizer`.
    pub fn set(&mut self, name: &str, value: &str) -> strata_common::Result<()> {
        match name.to_ascii_lowercase().as_str() {
            "disable_optimizer" => self.disable_optimizer = parse_bool(value)?,
            "enable_optimizer" => self.disable_optimizer = !parse_bool(value)?,
            "morsel_rows" => self.morsel_rows = parse_usize(value)?,
            "max_materialize_rows" => self.max_materialize_rows = parse_usize(value)?,
            other => return Err(StrataError::VariableNotFound(other.to_string())),
        }
        Ok(())
    }

    pub fn to_execution_context(&self) -> strata_physical_plan::ExecutionContext {
        strata_physical_plan::ExecutionContext {
            cancellation: strata_physical_plan::CancellationToken::new(),
            deadline: None,
            morsel_rows: self.morsel_rows,
            max_materialize_rows: self.max_materialize_rows,
        }
    }
}

fn parse_bool(value: &str) -> strata_common::Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "on" => Ok(true),
        "false" | "0" | "off" => Ok(false),
        other => Err(StrataError::ParameterError(format!("not a boolean: {other}"))),
    }
}

fn parse_usize(value: &str) -> strata_common::Result<usize> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|_| StrataError::ParameterError(format!("not an integer: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disable_and_enable_are_inverse_spellings() {
        let mut cfg = SessionConfig::default();
        cfg.set("disable_optimizer", "true").unwrap();
        assert!(cfg.disable_optimizer);
        cfg.set("enable_optimizer", "true").unwrap();
        assert!(!cfg.disable_optimizer);
    }

    #[test]
    fn unknown_variable_errors() {
        let mut cfg = SessionConfig::default();
        assert!(matches!(cfg.set("not_a_var", "1"), Err(StrataError::VariableNotFound(_))));
    }

    #[test]
    fn morsel_rows_round_trips_into_execution_context() {
        let mut cfg = SessionConfig::default();
        cfg.set("morsel_rows", "128").unwrap();
        assert_eq!(cfg.to_execution_context().morsel_rows, 128);
    }
}
