//! Per-column and per-relation statistics, fed back from connectors into the
//! optimizer. Grounded on the original `RelationStatistics` shape (a manifest
//! entry's `lower_bounds`/`upper_bounds`/`null_count` maps plus a record
//! count), translated into Rust's typed-map idiom.

use std::collections::HashMap;

/// `min`/`max` encoded to a comparable integer domain so range predicates can
/// be evaluated uniformly regardless of the underlying logical type. Strings
/// are truncated to their first 8 bytes and bit-packed big-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct OrderedBound(pub i128);

impl OrderedBound {
    pub fn from_i64(v: i64) -> Self {
        OrderedBound(v as i128)
    }

    pub fn from_f64(v: f64) -> Self {
        // Order-preserving bit trick: flip the sign bit for positives,
        // invert all bits for negatives, so IEEE-754 ordering matches
        // integer ordering of the transformed bits.
        let bits = v.to_bits() as i64;
        let transformed = if bits >= 0 { bits ^ i64::MIN } else { !bits };
        OrderedBound(transformed as i128)
    }

    pub fn from_str_prefix(s: &str) -> Self {
        let mut buf = [0u8; 8];
        let bytes = s.as_bytes();
        let n = bytes.len().min(8);
        buf[..n].copy_from_slice(&bytes[..n]);
        OrderedBound(i128::from(u64::from_be_bytes(buf)))
    }
}

/// Per-column statistics as reported by a connector's manifest/catalog.
#[derive(Debug, Clone, Default)]
pub struct ColumnStatistics {
    pub min: Option<OrderedBound>,
    pub max: Option<OrderedBound>,
    pub null_count: Option<u64>,
    pub distinct_estimate: Option<u64>,
}

/// Statistics for an entire relation (table, partition set, or query
/// result), consulted by statistics-dependent optimizer rules. Absent stats
/// (an empty map / `None` record_count) disables those rules for the subtree,
/// per §4.3's "Safety" clause.
#[derive(Debug, Clone, Default)]
pub struct RelationStatistics {
    pub record_count: Option<u64>,
    pub columns: HashMap<String, ColumnStatistics>,
}

impl RelationStatistics {
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn with_record_count(record_count: u64) -> Self {
        Self {
            record_count: Some(record_count),
            columns: HashMap::new(),
        }
    }

    pub fn set_lower(&mut self, column: &str, value: OrderedBound) {
        let entry = self.columns.entry(column.to_string()).or_default();
        entry.min = Some(match entry.min {
            Some(existing) if existing <= value => existing,
            _ => value,
        });
    }

    pub fn set_upper(&mut self, column: &str, value: OrderedBound) {
        let entry = self.columns.entry(column.to_string()).or_default();
        entry.max = Some(match entry.max {
            Some(existing) if existing >= value => existing,
            _ => value,
        });
    }

    pub fn add_null(&mut self, column: &str, nulls: u64) {
        let entry = self.columns.entry(column.to_string()).or_default();
        *entry.null_count.get_or_insert(0) += nulls;
    }

    /// Merge statistics from another partition/file's manifest entry into
    /// this one, widening bounds and summing counts.
    pub fn merge(&mut self, other: &RelationStatistics) {
        self.record_count = match (self.record_count, other.record_count) {
            (Some(a), Some(b)) => Some(a + b),
            (a, b) => a.or(b),
        };
        for (col, stats) in &other.columns {
            if let Some(min) = stats.min {
                self.set_lower(col, min);
            }
            if let Some(max) = stats.max {
                self.set_upper(col, max);
            }
            if let Some(nulls) = stats.null_count {
                self.add_null(col, nulls);
            }
        }
    }
}
