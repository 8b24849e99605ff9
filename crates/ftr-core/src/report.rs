//! Per-tag correction audit.
//!
//! Built by [`crate::pipeline`] while it processes a batch. Serialized as JSON
//! next to the minute output so a reviewer can see which tags still carry
//! unexplained negative minutes.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Tag report
// ---------------------------------------------------------------------------

/// What the pipeline did to one tag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagReport {
    pub tag: String,
    /// Number of minutes in the batch.
    pub samples: usize,
    /// Raw samples the rectifier replaced (zero or down-then-down).
    pub invalid_samples: usize,
    /// Minutes with negative rectified consumption before correction.
    pub negative_minutes: usize,
    /// Adjacent negative/positive pairs seen by the redistributor.
    pub matched_pairs: usize,
    /// Redistribution windows applied.
    pub windows: usize,
    /// Pairs left alone because their net was not positive.
    pub suppressed_pairs: usize,
    /// Pairs whose negative minute had a real raw reading.
    pub empty_window_pairs: usize,
    pub resets: usize,
    /// Reset entries that overwrote a redistribution entry.
    pub collisions: usize,
    /// Minutes with a defined anomaly value.
    pub anomaly_minutes: usize,
    /// Negative consumption minutes with no anomaly covering them.
    pub remaining_negative_minutes: usize,
    /// Sum of `net` over all applied windows.
    pub conserved_volume: f64,
}

impl TagReport {
    /// `true` when no negative minute is left unexplained and no anomaly
    /// entry was overwritten.
    pub fn is_clean(&self) -> bool {
        self.remaining_negative_minutes == 0 && self.collisions == 0
    }
}

impl fmt::Display for TagReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tag={} samples={} invalid={} negative={} pairs={} windows={} suppressed={} \
             empty_windows={} resets={} collisions={} anomalies={} remaining_negative={} \
             conserved_volume={}",
            self.tag,
            self.samples,
            self.invalid_samples,
            self.negative_minutes,
            self.matched_pairs,
            self.windows,
            self.suppressed_pairs,
            self.empty_window_pairs,
            self.resets,
            self.collisions,
            self.anomaly_minutes,
            self.remaining_negative_minutes,
            self.conserved_volume
        )
    }
}

// ---------------------------------------------------------------------------
// Batch report
// ---------------------------------------------------------------------------

/// A tag whose pipeline aborted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagFailure {
    pub tag: String,
    pub reason: String,
}

/// Outcome of one [`crate::process_frame`] call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Tags whose high/low words were combined before processing.
    pub combined: Vec<String>,
    /// Derived columns dropped from the input before recomputation.
    pub dropped_derived: usize,
    pub tags: Vec<TagReport>,
    pub failures: Vec<TagFailure>,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.tags.iter().all(TagReport::is_clean)
    }

    pub fn tag(&self, tag: &str) -> Option<&TagReport> {
        self.tags.iter().find(|t| t.tag == tag)
    }

    pub fn total_anomaly_minutes(&self) -> usize {
        self.tags.iter().map(|t| t.anomaly_minutes).sum()
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "BatchReport {{")?;
        writeln!(f, "  combined: {}", self.combined.len())?;
        writeln!(f, "  dropped_derived: {}", self.dropped_derived)?;
        writeln!(f, "  tags: {}", self.tags.len())?;
        for t in &self.tags {
            writeln!(f, "    {t}")?;
        }
        writeln!(f, "  failures: {}", self.failures.len())?;
        for fail in &self.failures {
            writeln!(f, "    tag={} reason={}", fail.tag, fail.reason)?;
        }
        write!(f, "}}")
    }
}
