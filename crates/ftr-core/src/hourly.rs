//! Hourly reconciliation.
//!
//! Buckets are left-closed and labelled by their start (`15:00` holds
//! `15:00..=15:59`). Every hour between the first and last sample is emitted,
//! including hours without samples.
//!
//! Per bucket:
//! - `cons` is the plain sum of defined minute consumption
//! - `corrected` substitutes the anomaly value minute by minute where one is
//!   defined; without any anomaly in the bucket it equals `cons`
//! - `has_corrections` is set when at least one minute had an anomaly

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::report::TagFailure;
use crate::types::{Basis, ColumnKey, MinuteFrame, Stage};

const SECS_PER_HOUR: i64 = 3_600;

pub const SUFFIX_HOURLY_CONS: &str = "_hourly_cons";
pub const SUFFIX_HOURLY_CORRECTED: &str = "_hourly_cons_corrected";
pub const SUFFIX_HOURLY_FLAG: &str = "_hourly_has_corrections";

fn hour_start(ts: DateTime<Utc>) -> DateTime<Utc> {
    let secs = ts.timestamp();
    DateTime::from_timestamp(secs - secs.rem_euclid(SECS_PER_HOUR), 0).unwrap_or(ts)
}

// ---------------------------------------------------------------------------
// Buckets
// ---------------------------------------------------------------------------

/// Hour labels plus the bucket index of every minute.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HourlyBuckets {
    hours: Vec<DateTime<Utc>>,
    bucket_of: Vec<usize>,
}

impl HourlyBuckets {
    pub fn from_timestamps(timestamps: &[DateTime<Utc>]) -> Self {
        let (Some(first), Some(last)) = (timestamps.iter().min(), timestamps.iter().max()) else {
            return Self::default();
        };
        let first = hour_start(*first);
        let last = hour_start(*last);

        let span = ((last - first).num_seconds() / SECS_PER_HOUR) as usize;
        let hours = (0..=span)
            .map(|h| first + chrono::Duration::hours(h as i64))
            .collect();
        let bucket_of = timestamps
            .iter()
            .map(|t| ((hour_start(*t) - first).num_seconds() / SECS_PER_HOUR) as usize)
            .collect();

        Self { hours, bucket_of }
    }

    pub fn hours(&self) -> &[DateTime<Utc>] {
        &self.hours
    }

    pub fn len(&self) -> usize {
        self.hours.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hours.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Per-tag reconciliation
// ---------------------------------------------------------------------------

/// Three hourly columns for one tag, aligned to [`HourlyBuckets::hours`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HourlyColumns {
    pub cons: Vec<f64>,
    pub corrected: Vec<f64>,
    pub has_corrections: Vec<bool>,
}

/// Reconcile one tag's minute consumption into `buckets`.
///
/// `anom = None` means the tag has no anomaly column at all.
pub fn reconcile_hourly(
    buckets: &HourlyBuckets,
    cons: &[Option<f64>],
    anom: Option<&[Option<f64>]>,
) -> HourlyColumns {
    let n = buckets.len();
    let mut raw_sum = vec![0.0; n];
    let mut substituted = vec![0.0; n];
    let mut flagged = vec![false; n];

    for (i, &bucket) in buckets.bucket_of.iter().enumerate() {
        let c = cons.get(i).copied().flatten();
        let a = anom.and_then(|col| col.get(i).copied().flatten());

        raw_sum[bucket] += c.unwrap_or(0.0);
        substituted[bucket] += a.or(c).unwrap_or(0.0);
        flagged[bucket] |= a.is_some();
    }

    let corrected = (0..n)
        .map(|h| if flagged[h] { substituted[h] } else { raw_sum[h] })
        .collect();

    HourlyColumns {
        cons: raw_sum,
        corrected,
        has_corrections: flagged,
    }
}

// ---------------------------------------------------------------------------
// Frame reconciliation
// ---------------------------------------------------------------------------

/// Hourly table for a whole batch, keyed by tag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HourlyFrame {
    pub hours: Vec<DateTime<Utc>>,
    pub tags: BTreeMap<String, HourlyColumns>,
    /// Tags with derived columns but no consumption column to reconcile.
    pub failures: Vec<TagFailure>,
}

impl HourlyFrame {
    pub fn cons_column(tag: &str) -> String {
        format!("{tag}{SUFFIX_HOURLY_CONS}")
    }

    pub fn corrected_column(tag: &str) -> String {
        format!("{tag}{SUFFIX_HOURLY_CORRECTED}")
    }

    pub fn flag_column(tag: &str) -> String {
        format!("{tag}{SUFFIX_HOURLY_FLAG}")
    }

    /// Output header after the timestamp column, three names per tag.
    pub fn column_names(&self) -> Vec<String> {
        self.tags
            .keys()
            .flat_map(|t| {
                [
                    Self::cons_column(t),
                    Self::corrected_column(t),
                    Self::flag_column(t),
                ]
            })
            .collect()
    }
}

/// Reconcile every consumption column in `frame`.
///
/// A tag with both a rectified and a raw consumption column uses the
/// rectified one. The anomaly column is looked up with the same basis first,
/// then the other basis. A tag that has rectified or anomaly columns but no
/// consumption column is reported in [`HourlyFrame::failures`].
pub fn reconcile_frame(frame: &MinuteFrame) -> HourlyFrame {
    let buckets = HourlyBuckets::from_timestamps(frame.timestamps());

    let tags: BTreeSet<String> = frame
        .keys()
        .filter(|k| {
            matches!(
                k.stage,
                Stage::Consumption(_) | Stage::Rectified | Stage::Anomaly(_)
            )
        })
        .map(|k| k.tag.clone())
        .collect();

    let mut out = HourlyFrame {
        hours: buckets.hours().to_vec(),
        tags: BTreeMap::new(),
        failures: Vec::new(),
    };

    for tag in tags {
        let Some((basis, cons)) = [Basis::Rectified, Basis::Raw].into_iter().find_map(|b| {
            frame
                .get(&ColumnKey::new(tag.as_str(), Stage::Consumption(b)))
                .map(|c| (b, c))
        }) else {
            let key = ColumnKey::new(tag.as_str(), Stage::Consumption(Basis::Rectified));
            let reason = format!("missing column '{}'", key.column_name());
            warn!(tag = %tag, reason = %reason, "tag skipped in hourly reconciliation");
            out.failures.push(TagFailure { tag, reason });
            continue;
        };
        let other = match basis {
            Basis::Rectified => Basis::Raw,
            Basis::Raw => Basis::Rectified,
        };
        let anom = frame
            .get(&ColumnKey::new(tag.as_str(), Stage::Anomaly(basis)))
            .or_else(|| frame.get(&ColumnKey::new(tag.as_str(), Stage::Anomaly(other))));

        let cols = reconcile_hourly(&buckets, cons, anom);
        debug!(
            tag = %tag,
            hours = cols.cons.len(),
            corrected_hours = cols.has_corrections.iter().filter(|f| **f).count(),
            "hourly reconciled"
        );
        out.tags.insert(tag, cols);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, h, m, 0).unwrap()
    }

    #[test]
    fn anomaly_substitutes_minute_by_minute() {
        let ts: Vec<_> = (0..6).map(|m| at(8, m)).collect();
        let cons = vec![
            Some(-10.0),
            Some(20.0),
            Some(20.0),
            Some(20.0),
            Some(20.0),
            Some(20.0),
        ];
        let anom = vec![Some(42.0), None, None, None, None, None];

        let buckets = HourlyBuckets::from_timestamps(&ts);
        let cols = reconcile_hourly(&buckets, &cons, Some(anom.as_slice()));
        assert_eq!(cols.cons, vec![90.0]);
        assert_eq!(cols.corrected, vec![142.0]);
        assert_eq!(cols.has_corrections, vec![true]);
    }

    #[test]
    fn buckets_are_left_closed_and_gap_hours_emitted() {
        let ts = vec![at(8, 59), at(9, 0), at(11, 30)];
        let buckets = HourlyBuckets::from_timestamps(&ts);
        assert_eq!(buckets.hours(), &[at(8, 0), at(9, 0), at(10, 0), at(11, 0)]);

        let cons = vec![Some(1.0), Some(2.0), None];
        let cols = reconcile_hourly(&buckets, &cons, None);
        assert_eq!(cols.cons, vec![1.0, 2.0, 0.0, 0.0]);
        assert_eq!(cols.corrected, cols.cons);
        assert_eq!(cols.has_corrections, vec![false; 4]);
    }

    #[test]
    fn undefined_consumption_under_anomaly_still_counts_anomaly() {
        let ts = vec![at(0, 0), at(0, 1)];
        let buckets = HourlyBuckets::from_timestamps(&ts);
        let cols = reconcile_hourly(&buckets, &[None, Some(5.0)], Some(&[Some(7.0), None][..]));
        assert_eq!(cols.cons, vec![5.0]);
        assert_eq!(cols.corrected, vec![12.0]);
    }

    #[test]
    fn empty_timestamps_give_empty_buckets() {
        let buckets = HourlyBuckets::from_timestamps(&[]);
        assert!(buckets.is_empty());
        let cols = reconcile_hourly(&buckets, &[], None);
        assert!(cols.cons.is_empty());
    }

    #[test]
    fn frame_prefers_rectified_consumption() {
        let ts = vec![at(5, 0), at(5, 1)];
        let named = vec![
            ("A_TOT_cons".to_string(), vec![Some(100.0), None]),
            ("A_TOT_rect_0_cons".to_string(), vec![Some(3.0), None]),
            ("A_TOT_anom".to_string(), vec![Some(4.0), None]),
            ("B_TOT_rect_0_cons".to_string(), vec![Some(1.0), Some(1.0)]),
        ];
        let frame = MinuteFrame::from_named_columns(ts, named).unwrap();
        let hourly = reconcile_frame(&frame);

        assert_eq!(hourly.hours, vec![at(5, 0)]);
        let a = &hourly.tags["A_TOT"];
        assert_eq!(a.cons, vec![3.0]);
        // falls back to the raw-basis anomaly column
        assert_eq!(a.corrected, vec![4.0]);
        assert_eq!(hourly.tags["B_TOT"].corrected, vec![2.0]);
        assert_eq!(
            hourly.column_names(),
            vec![
                "A_TOT_hourly_cons",
                "A_TOT_hourly_cons_corrected",
                "A_TOT_hourly_has_corrections",
                "B_TOT_hourly_cons",
                "B_TOT_hourly_cons_corrected",
                "B_TOT_hourly_has_corrections",
            ]
        );
    }

    #[test]
    fn tag_without_consumption_is_reported() {
        let ts = vec![at(5, 0), at(5, 1)];
        let named = vec![
            ("A_TOT_rect_0_cons".to_string(), vec![Some(1.0), Some(2.0)]),
            ("Z_TOT_anom".to_string(), vec![Some(4.0), None]),
        ];
        let frame = MinuteFrame::from_named_columns(ts, named).unwrap();
        let hourly = reconcile_frame(&frame);

        assert_eq!(hourly.tags.keys().collect::<Vec<_>>(), vec!["A_TOT"]);
        assert_eq!(hourly.failures.len(), 1);
        assert_eq!(hourly.failures[0].tag, "Z_TOT");
        assert_eq!(
            hourly.failures[0].reason,
            "missing column 'Z_TOT_rect_0_cons'"
        );
    }
}
