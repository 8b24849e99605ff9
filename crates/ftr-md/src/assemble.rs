//! Tag selection and frame assembly.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use ftr_core::{FrameError, MinuteFrame};

use crate::provider::FetchOutcome;

/// Tags listed in a signals file, one per line.
///
/// Blank lines are skipped. With `filter`, only lines containing it are kept.
/// Duplicates are dropped, first occurrence wins.
pub fn select_tags(signals_text: &str, filter: Option<&str>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    signals_text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter(|l| filter.map_or(true, |f| l.contains(f)))
        .filter(|l| seen.insert(l.to_string()))
        .map(str::to_string)
        .collect()
}

/// Outer-join every fetched series on its minute timestamps.
///
/// Rows are sorted ascending; a tag without a sample at a row is undefined
/// there. Column order follows `outcome.series`. Duplicate samples for the
/// same minute keep the last one.
pub fn assemble_frame(outcome: &FetchOutcome) -> Result<MinuteFrame, FrameError> {
    let mut per_tag: Vec<(String, BTreeMap<i64, Option<f64>>)> = Vec::new();
    let mut all_ts = BTreeSet::new();

    for series in &outcome.series {
        let mut by_ts = BTreeMap::new();
        for s in &series.samples {
            all_ts.insert(s.ts);
            by_ts.insert(s.ts, s.value);
        }
        per_tag.push((series.tag.clone(), by_ts));
    }

    let timestamps: Vec<DateTime<Utc>> = all_ts
        .iter()
        .filter_map(|ts| DateTime::from_timestamp(*ts, 0))
        .collect();
    let kept: Vec<i64> = timestamps.iter().map(DateTime::timestamp).collect();

    let named = per_tag
        .into_iter()
        .map(|(tag, by_ts)| {
            let col = kept.iter().map(|ts| by_ts.get(ts).copied().flatten()).collect();
            (tag, col)
        })
        .collect();

    MinuteFrame::from_named_columns(timestamps, named)
}
