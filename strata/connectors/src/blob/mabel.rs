//! The Mabel partition scheme: `year_YYYY/month_MM/day_DD/[by_hour/hour=HH/]as_at_*/…`.
//!
//! Grounded on the original partition-selection algorithm: control blobs
//! (markers) are separated from data blobs; `by_*` segments other than
//! `by_hour` are rejected; `by_hour` folders are preferred when present; the
//! most recent `as_at_*` folder with a `frame.complete` marker and no
//! `frame.ignore` marker is selected, walking older `as_at_*` folders until
//! one qualifies.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use std::collections::BTreeSet;
use strata_common::{Result, StrataError};

/// Extensions recognized as decodable data files; anything else under a
/// partition folder is a control blob (`frame.complete`, `frame.ignore`, …).
const DATA_EXTENSIONS: &[&str] = &["parquet", "jsonl", "orc", "arrow", "csv"];

fn is_data_blob(path: &str) -> bool {
    match path.rsplit_once('.') {
        Some((_, ext)) => DATA_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()),
        None => false,
    }
}

fn extract_segment_prefix<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let start = path.find(prefix)?;
    let rest = &path[start..];
    let end = rest.find('/').map(|i| start + i).unwrap_or(path.len());
    Some(&path[start..end])
}

fn is_complete_and_not_ignored(control_blobs: &[String], as_at: &str) -> bool {
    let complete_suffix = format!("{as_at}/frame.complete");
    let ignore_suffix = format!("{as_at}/frame.ignore");
    let mut complete = false;
    let mut ignore = false;
    for blob in control_blobs {
        if blob.contains(&complete_suffix) {
            complete = true;
        } else if blob.contains(&ignore_suffix) {
            ignore = true;
        }
        if complete && ignore {
            break;
        }
    }
    complete && !ignore
}

/// Resolves the data blobs readable for one `(day, hour)` slot under `prefix`
/// at `timestamp`, given the full list of blobs the object store reports
/// under that day folder.
fn blobs_for_hour(prefix: &str, timestamp: NaiveDateTime, all_blobs: &[String]) -> Result<Vec<String>> {
    let date_path = format!(
        "{prefix}/year_{:04}/month_{:02}/day_{:02}",
        timestamp.year(),
        timestamp.month(),
        timestamp.day()
    );
    let hour_label = format!("/by_hour/hour={:02}/", timestamp.hour());

    let mut blobs: Vec<String> = all_blobs
        .iter()
        .filter(|b| b.starts_with(&date_path))
        .cloned()
        .collect();
    if blobs.is_empty() {
        return Ok(Vec::new());
    }

    let control_blobs: Vec<String> = blobs.iter().filter(|b| !is_data_blob(b)).cloned().collect();
    blobs.retain(|b| is_data_blob(b));

    let segments: BTreeSet<Option<String>> = blobs
        .iter()
        .filter(|b| b.contains("/by_"))
        .map(|b| extract_segment_prefix(b, "by_").map(|s| s.to_string()))
        .collect();
    let unsupported: Vec<String> = segments
        .iter()
        .flatten()
        .filter(|s| s.as_str() != "by_hour")
        .cloned()
        .collect();
    if !unsupported.is_empty() {
        return Err(StrataError::UnsupportedSyntax(format!(
            "`{prefix}` contains unsupported segmentation (`{}`), only 'by_hour' segments are supported",
            unsupported.join("`, `")
        )));
    }

    if blobs.iter().any(|b| b.contains(&hour_label)) {
        blobs.retain(|b| b.contains(&hour_label));
    }

    let mut as_ats: Vec<String> = blobs
        .iter()
        .filter(|b| b.contains("/as_at"))
        .filter_map(|b| extract_segment_prefix(b, "as_at_").map(|s| s.to_string()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    as_ats.sort();

    while let Some(as_at) = as_ats.pop() {
        if is_complete_and_not_ignored(&control_blobs, &as_at) {
            return Ok(blobs.into_iter().filter(|b| b.contains(&as_at)).collect());
        }
    }
    Ok(Vec::new())
}

/// Hourly timestamps from `start` 00:00 through `end` 23:00 inclusive,
/// stepped by one hour, matching §4.7's "hourly ranges iterate by
/// `(start..=end)` stepped by one hour".
pub fn hourly_timestamps(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDateTime> {
    let mut out = Vec::new();
    let mut cursor = start.and_time(NaiveTime::MIN);
    let last = end.and_time(NaiveTime::from_hms_opt(23, 0, 0).unwrap());
    while cursor <= last {
        out.push(cursor);
        cursor += Duration::hours(1);
    }
    out
}

/// Given the full (pre-fetched) blob listing under `prefix` and an inclusive
/// date range, returns the sorted, deduplicated set of data blobs that should
/// be read.
pub fn select_blobs_in_range(
    prefix: &str,
    start: NaiveDate,
    end: NaiveDate,
    all_blobs: &[String],
) -> Result<Vec<String>> {
    let mut found = BTreeSet::new();
    for ts in hourly_timestamps(start, end) {
        for blob in blobs_for_hour(prefix, ts, all_blobs)? {
            found.insert(blob);
        }
    }
    Ok(found.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn selects_latest_complete_as_at() {
        let blobs = vec![
            "ds/year_2024/month_01/day_02/as_at_100/data.parquet".to_string(),
            "ds/year_2024/month_01/day_02/as_at_100/frame.complete".to_string(),
            "ds/year_2024/month_01/day_02/as_at_200/data.parquet".to_string(),
            "ds/year_2024/month_01/day_02/as_at_200/frame.ignore".to_string(),
        ];
        let selected = select_blobs_in_range("ds", date(2024, 1, 2), date(2024, 1, 2), &blobs).unwrap();
        assert_eq!(selected, vec!["ds/year_2024/month_01/day_02/as_at_100/data.parquet".to_string()]);
    }

    #[test]
    fn falls_back_past_ignored_frame() {
        let blobs = vec![
            "ds/year_2024/month_01/day_02/as_at_100/data.parquet".to_string(),
            "ds/year_2024/month_01/day_02/as_at_100/frame.complete".to_string(),
            "ds/year_2024/month_01/day_02/as_at_200/data.parquet".to_string(),
            "ds/year_2024/month_01/day_02/as_at_200/frame.ignore".to_string(),
            "ds/year_2024/month_01/day_02/as_at_200/frame.complete".to_string(),
        ];
        let selected = select_blobs_in_range("ds", date(2024, 1, 2), date(2024, 1, 2), &blobs).unwrap();
        assert_eq!(selected, vec!["ds/year_2024/month_01/day_02/as_at_100/data.parquet".to_string()]);
    }

    #[test]
    fn prefers_by_hour_segmentation_when_present() {
        let blobs = vec![
            "ds/year_2024/month_01/day_02/as_at_100/data.parquet".to_string(),
            "ds/year_2024/month_01/day_02/as_at_100/frame.complete".to_string(),
            "ds/year_2024/month_01/day_02/by_hour/hour=05/as_at_300/data.parquet".to_string(),
            "ds/year_2024/month_01/day_02/by_hour/hour=05/as_at_300/frame.complete".to_string(),
        ];
        let selected = select_blobs_in_range("ds", date(2024, 1, 2), date(2024, 1, 2), &blobs).unwrap();
        assert_eq!(
            selected,
            vec!["ds/year_2024/month_01/day_02/by_hour/hour=05/as_at_300/data.parquet".to_string()]
        );
    }

    #[test]
    fn rejects_unsupported_segmentation() {
        let blobs = vec!["ds/year_2024/month_01/day_02/by_region/us/as_at_100/data.parquet".to_string()];
        let err = select_blobs_in_range("ds", date(2024, 1, 2), date(2024, 1, 2), &blobs).unwrap_err();
        assert!(matches!(err, StrataError::UnsupportedSyntax(_)));
    }

    #[test]
    fn no_complete_frame_yields_nothing() {
        let blobs = vec!["ds/year_2024/month_01/day_02/as_at_100/data.parquet".to_string()];
        let selected = select_blobs_in_range("ds", date(2024, 1, 2), date(2024, 1, 2), &blobs).unwrap();
        assert!(selected.is_empty());
    }
}
