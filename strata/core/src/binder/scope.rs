//! Identifier resolution scope (§4.1's "binder resolves every identifier to
//! an input index at bind time", invariant 2). A `Scope` is the ordered list
//! of `(qualifier, column name)` pairs visible at one point while binding a
//! single `SELECT`; its position in the vector is the `ColumnRef` index into
//! the schema it was built from.

use strata_common::{Schema, StrataError};
use strata_expr::ColumnRef;

#[derive(Debug, Clone)]
pub struct Scope {
    columns: Vec<(String, String)>,
}

impl Scope {
    pub fn from_schema(alias: &str, schema: &Schema) -> Scope {
        Scope { columns: schema.fields().iter().map(|f| (alias.to_string(), f.name.clone())).collect() }
    }

    pub fn empty() -> Scope {
        Scope { columns: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Concatenates `other` after `self`, for a join's combined scope —
    /// `self`'s columns keep their index, `other`'s are offset by
    /// `self.len()`.
    pub fn concat(mut self, other: Scope) -> Scope {
        self.columns.extend(other.columns);
        self
    }

    pub fn name_at(&self, index: usize) -> &str {
        &self.columns[index].1
    }

    pub fn qualifier_at(&self, index: usize) -> &str {
        &self.columns[index].0
    }

    /// Resolves an identifier (innermost-outward is the caller's job: it
    /// tries the innermost scope first and falls back outward). `qualifier`
    /// is the table alias/name when the reference was `alias.column`.
    pub fn resolve(&self, qualifier: Option<&str>, name: &str) -> strata_common::Result<ColumnRef> {
        let matches: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, (q, n))| n == name && qualifier.map(|q2| q2 == q).unwrap_or(true))
            .map(|(i, _)| i)
            .collect();
        match matches.len() {
            0 => Err(StrataError::ColumnNotFound(match qualifier {
                Some(q) => format!("{q}.{name}"),
                None => name.to_string(),
            })),
            1 => Ok(ColumnRef { source: None, index: matches[0] }),
            _ => Err(StrataError::AmbiguousIdentifier(name.to_string())),
        }
    }
}
