//! Per-group aggregator state (§4.8). Each `HashAggregate` group owns one
//! `Box<dyn Accumulator>` per aggregate expression; accumulators are cheap to
//! allocate and are never shared across groups.

use arrow::array::{Array, ArrayRef, AsArray};
use std::collections::HashSet;
use strata_common::{internal_error, LogicalType, Result, ScalarValue};

use crate::fingerprint::KeyValue;

pub trait Accumulator: std::fmt::Debug + Send {
    /// Folds one non-null-filtered row's value in. `value` is `None` for
    /// `COUNT(*)`, which has no argument expression.
    fn update(&mut self, value: Option<&ScalarValue>) -> Result<()>;

    fn finalize(&self) -> Result<ScalarValue>;
}

#[derive(Debug, Default)]
pub struct CountStar(u64);
impl Accumulator for CountStar {
    fn update(&mut self, _value: Option<&ScalarValue>) -> Result<()> {
        self.0 += 1;
        Ok(())
    }
    fn finalize(&self) -> Result<ScalarValue> {
        Ok(ScalarValue::Int64(Some(self.0 as i64)))
    }
}

#[derive(Debug, Default)]
pub struct CountValue(u64);
impl Accumulator for CountValue {
    fn update(&mut self, value: Option<&ScalarValue>) -> Result<()> {
        if value.is_some_and(|v| !v.is_null()) {
            self.0 += 1;
        }
        Ok(())
    }
    fn finalize(&self) -> Result<ScalarValue> {
        Ok(ScalarValue::Int64(Some(self.0 as i64)))
    }
}

/// `SUM`: int accumulates widened into `i128`; float into `f64`. Integer
/// overflow raises `ResourceExceeded` rather than silently wrapping.
#[derive(Debug, Default)]
pub struct Sum {
    int_total: Option<i128>,
    float_total: Option<f64>,
    is_float: bool,
}
impl Accumulator for Sum {
    fn update(&mut self, value: Option<&ScalarValue>) -> Result<()> {
        match value {
            Some(ScalarValue::Int64(Some(v))) => {
                self.int_total = Some(self.int_total.unwrap_or(0) + *v as i128);
            }
            Some(ScalarValue::Double(Some(v))) => {
                self.is_float = true;
                self.float_total = Some(self.float_total.unwrap_or(0.0) + v);
            }
            _ => {}
        }
        Ok(())
    }
    fn finalize(&self) -> Result<ScalarValue> {
        if self.is_float {
            return Ok(ScalarValue::Double(self.float_total));
        }
        match self.int_total {
            Some(total) => {
                if total > i64::MAX as i128 || total < i64::MIN as i128 {
                    return Err(strata_common::StrataError::ResourceExceeded(
                        "SUM overflowed a 64-bit integer".to_string(),
                    ));
                }
                Ok(ScalarValue::Int64(Some(total as i64)))
            }
            None => Ok(ScalarValue::Int64(None)),
        }
    }
}

#[derive(Debug)]
pub struct MinMax {
    current: Option<ScalarValue>,
    want_max: bool,
}
impl MinMax {
    pub fn new(want_max: bool) -> Self {
        Self { current: None, want_max }
    }
}
impl Accumulator for MinMax {
    fn update(&mut self, value: Option<&ScalarValue>) -> Result<()> {
        let Some(value) = value else { return Ok(()) };
        if value.is_null() {
            return Ok(());
        }
        self.current = Some(match self.current.take() {
            None => value.clone(),
            Some(existing) => match existing.try_cmp(value) {
                Some(ordering) => {
                    let replace =
                        if self.want_max { ordering == std::cmp::Ordering::Less } else { ordering == std::cmp::Ordering::Greater };
                    if replace { value.clone() } else { existing }
                }
                None => existing,
            },
        });
        Ok(())
    }
    fn finalize(&self) -> Result<ScalarValue> {
        Ok(self.current.clone().unwrap_or(ScalarValue::Null))
    }
}

#[derive(Debug, Default)]
pub struct Avg {
    sum: f64,
    count: u64,
}
impl Accumulator for Avg {
    fn update(&mut self, value: Option<&ScalarValue>) -> Result<()> {
        match value {
            Some(ScalarValue::Int64(Some(v))) => {
                self.sum += *v as f64;
                self.count += 1;
            }
            Some(ScalarValue::Double(Some(v))) => {
                self.sum += v;
                self.count += 1;
            }
            _ => {}
        }
        Ok(())
    }
    fn finalize(&self) -> Result<ScalarValue> {
        if self.count == 0 {
            return Ok(ScalarValue::Double(None));
        }
        Ok(ScalarValue::Double(Some(self.sum / self.count as f64)))
    }
}

/// `ARRAY_AGG`: ordered append, honoring `DISTINCT` and `LIMIT n` modifiers.
#[derive(Debug)]
pub struct ArrayAgg {
    values: Vec<ScalarValue>,
    seen: Option<HashSet<KeyValue>>,
    limit: Option<usize>,
    element_type: LogicalType,
}
impl ArrayAgg {
    pub fn new(distinct: bool, limit: Option<usize>, element_type: LogicalType) -> Self {
        Self { values: Vec::new(), seen: distinct.then(HashSet::new), limit, element_type }
    }
}
impl Accumulator for ArrayAgg {
    fn update(&mut self, value: Option<&ScalarValue>) -> Result<()> {
        let Some(value) = value else { return Ok(()) };
        if let Some(limit) = self.limit {
            if self.values.len() >= limit {
                return Ok(());
            }
        }
        if let Some(seen) = &mut self.seen {
            let key = scalar_key(value);
            if !seen.insert(key) {
                return Ok(());
            }
        }
        self.values.push(value.clone());
        Ok(())
    }
    fn finalize(&self) -> Result<ScalarValue> {
        Ok(ScalarValue::Array(self.values.clone(), self.element_type.clone()))
    }
}

#[derive(Debug, Default)]
pub struct CountDistinct {
    seen: HashSet<KeyValue>,
}
impl Accumulator for CountDistinct {
    fn update(&mut self, value: Option<&ScalarValue>) -> Result<()> {
        let Some(value) = value else { return Ok(()) };
        if value.is_null() {
            return Ok(());
        }
        self.seen.insert(scalar_key(value));
        Ok(())
    }
    fn finalize(&self) -> Result<ScalarValue> {
        Ok(ScalarValue::Int64(Some(self.seen.len() as i64)))
    }
}

/// `STDDEV`/`VARIANCE`: Welford's online algorithm, one pass, numerically
/// stable without a widened accumulator.
#[derive(Debug, Default)]
pub struct WelfordVariance {
    count: u64,
    mean: f64,
    m2: f64,
    sample: bool,
    want_stddev: bool,
}
impl WelfordVariance {
    pub fn new(sample: bool, want_stddev: bool) -> Self {
        Self { count: 0, mean: 0.0, m2: 0.0, sample, want_stddev }
    }
}
impl Accumulator for WelfordVariance {
    fn update(&mut self, value: Option<&ScalarValue>) -> Result<()> {
        let x = match value {
            Some(ScalarValue::Int64(Some(v))) => *v as f64,
            Some(ScalarValue::Double(Some(v))) => *v,
            _ => return Ok(()),
        };
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = x - self.mean;
        self.m2 += delta * delta2;
        Ok(())
    }
    fn finalize(&self) -> Result<ScalarValue> {
        let denominator = if self.sample { self.count.saturating_sub(1) } else { self.count };
        if denominator == 0 {
            return Ok(ScalarValue::Double(None));
        }
        let variance = self.m2 / denominator as f64;
        Ok(ScalarValue::Double(Some(if self.want_stddev { variance.sqrt() } else { variance })))
    }
}

/// `ONE`/`ANY_VALUE`: the first non-null value seen.
#[derive(Debug, Default)]
pub struct FirstNonNull(Option<ScalarValue>);
impl Accumulator for FirstNonNull {
    fn update(&mut self, value: Option<&ScalarValue>) -> Result<()> {
        if self.0.is_none() {
            if let Some(value) = value {
                if !value.is_null() {
                    self.0 = Some(value.clone());
                }
            }
        }
        Ok(())
    }
    fn finalize(&self) -> Result<ScalarValue> {
        Ok(self.0.clone().unwrap_or(ScalarValue::Null))
    }
}

/// `APPROXIMATE_MEDIAN`: a small t-digest (centroid list merged by simple
/// insertion, compressed once it exceeds a bound). Precision is
/// implementation-defined per §4.8.
#[derive(Debug, Default)]
pub struct ApproxMedian {
    centroids: Vec<(f64, u64)>, // (mean, weight)
}
const TDIGEST_MAX_CENTROIDS: usize = 256;
impl Accumulator for ApproxMedian {
    fn update(&mut self, value: Option<&ScalarValue>) -> Result<()> {
        let x = match value {
            Some(ScalarValue::Int64(Some(v))) => *v as f64,
            Some(ScalarValue::Double(Some(v))) => *v,
            _ => return Ok(()),
        };
        self.centroids.push((x, 1));
        if self.centroids.len() > TDIGEST_MAX_CENTROIDS {
            compress(&mut self.centroids);
        }
        Ok(())
    }
    fn finalize(&self) -> Result<ScalarValue> {
        if self.centroids.is_empty() {
            return Ok(ScalarValue::Double(None));
        }
        let mut sorted = self.centroids.clone();
        sorted.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        let total: u64 = sorted.iter().map(|(_, w)| w).sum();
        let target = total as f64 / 2.0;
        let mut cumulative = 0.0;
        for (mean, weight) in &sorted {
            cumulative += *weight as f64;
            if cumulative >= target {
                return Ok(ScalarValue::Double(Some(*mean)));
            }
        }
        Ok(ScalarValue::Double(sorted.last().map(|(m, _)| *m)))
    }
}

/// Merges the nearest-mean pairs until the centroid count is back under the
/// cap, weighting the merged mean by each centroid's count.
fn compress(centroids: &mut Vec<(f64, u64)>) {
    centroids.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    let mut merged = Vec::with_capacity(centroids.len() / 2 + 1);
    let mut iter = centroids.drain(..).peekable();
    while let Some((mean, weight)) = iter.next() {
        if let Some(&(next_mean, next_weight)) = iter.peek() {
            let combined_weight = weight + next_weight;
            let combined_mean = (mean * weight as f64 + next_mean * next_weight as f64) / combined_weight as f64;
            merged.push((combined_mean, combined_weight));
            iter.next();
        } else {
            merged.push((mean, weight));
        }
    }
    *centroids = merged;
}

fn scalar_key(value: &ScalarValue) -> KeyValue {
    match value {
        ScalarValue::Boolean(Some(b)) => KeyValue::Bool(*b),
        ScalarValue::Int64(Some(v)) => KeyValue::Int64(*v),
        ScalarValue::Double(Some(v)) => KeyValue::Double(v.to_bits()),
        ScalarValue::Utf8(Some(s)) => KeyValue::Bytes(s.as_bytes().to_vec()),
        ScalarValue::Blob(Some(b)) => KeyValue::Bytes(b.clone()),
        ScalarValue::Date(Some(d)) => KeyValue::Int64(*d as i64),
        ScalarValue::Timestamp(Some(t)) => KeyValue::Int64(*t),
        _ => KeyValue::Null,
    }
}

/// Reads the scalar at `row` out of an evaluated argument array, used by
/// `HashAggregate` to feed each accumulator one row at a time.
pub fn scalar_at(array: &ArrayRef, row: usize) -> Result<ScalarValue> {
    use arrow::datatypes::DataType;
    if array.is_null(row) {
        return Ok(ScalarValue::Null);
    }
    Ok(match array.data_type() {
        DataType::Boolean => ScalarValue::Boolean(Some(array.as_boolean().value(row))),
        DataType::Int64 => ScalarValue::Int64(Some(array.as_primitive::<arrow::datatypes::Int64Type>().value(row))),
        DataType::Float64 => ScalarValue::Double(Some(array.as_primitive::<arrow::datatypes::Float64Type>().value(row))),
        DataType::Utf8 => ScalarValue::Utf8(Some(array.as_string::<i32>().value(row).to_string())),
        DataType::Date32 => ScalarValue::Date(Some(array.as_primitive::<arrow::datatypes::Date32Type>().value(row))),
        DataType::Timestamp(_, _) => {
            ScalarValue::Timestamp(Some(array.as_primitive::<arrow::datatypes::TimestampMicrosecondType>().value(row)))
        }
        other => return Err(internal_error(format!("unsupported aggregate argument type: {other}"))),
    })
}
