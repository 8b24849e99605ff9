//! Per-tag correction pipeline.
//!
//! For every totalizer tag in a frame:
//! 1. rectify the raw counter into `<tag>_rect_0`
//! 2. difference it into `<tag>_rect_0_cons`
//! 3. redistribute compensated negatives against the raw counter
//! 4. annotate counter resets found on the rectified counter
//! 5. store the merged sparse column as `<tag>_rect_0_anom`
//!
//! A reset and a redistribution landing on the same minute resolve in favour
//! of the reset. Tags are independent; one tag failing never aborts the batch.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::combine::combine_frame_pairs;
use crate::consumption::differences;
use crate::rectify::{count_invalid, rectify};
use crate::redistribute::redistribute;
use crate::report::{BatchReport, TagFailure, TagReport};
use crate::reset::{apply_resets, detect_resets, ResetPolicy};
use crate::types::{Basis, ColumnKey, FrameError, MinuteFrame, Stage};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Engine knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Only total columns whose tag ends with this suffix are processed.
    /// `None` processes every total column.
    pub total_suffix: Option<String>,
    pub reset: ResetPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            total_suffix: Some("_TOT".to_string()),
            reset: ResetPolicy::default(),
        }
    }
}

impl EngineConfig {
    pub fn accepts(&self, tag: &str) -> bool {
        match &self.total_suffix {
            Some(suffix) => tag.ends_with(suffix.as_str()),
            None => true,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure confined to one tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagError {
    /// A column the stage needs is not in the frame.
    MissingColumn { tag: String, column: String },
    /// A derived column could not be stored.
    Frame(FrameError),
}

impl fmt::Display for TagError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagError::MissingColumn { tag, column } => {
                write!(f, "tag '{tag}': missing column '{column}'")
            }
            TagError::Frame(e) => write!(f, "frame error: {e}"),
        }
    }
}

impl std::error::Error for TagError {}

impl From<FrameError> for TagError {
    fn from(e: FrameError) -> Self {
        TagError::Frame(e)
    }
}

fn require(frame: &MinuteFrame, key: &ColumnKey) -> Result<Vec<Option<f64>>, TagError> {
    frame
        .get(key)
        .map(|c| c.to_vec())
        .ok_or_else(|| TagError::MissingColumn {
            tag: key.tag.clone(),
            column: key.column_name(),
        })
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Run every stage for one tag and store the derived columns in `frame`.
pub fn process_tag(
    frame: &mut MinuteFrame,
    tag: &str,
    cfg: &EngineConfig,
) -> Result<TagReport, TagError> {
    let raw = require(frame, &ColumnKey::total(tag))?;

    let rect = rectify(&raw);
    let cons = differences(&rect);
    let redistribution = redistribute(&cons, &raw);
    let resets = detect_resets(&rect, &cfg.reset);

    let mut anom = redistribution.anomalies;
    let collisions = apply_resets(&mut anom, &resets);
    if collisions > 0 {
        warn!(tag = %tag, collisions, "counter reset overwrote redistributed minutes");
    }
    for r in &resets {
        debug!(
            tag = %tag,
            position = r.position,
            previous = r.previous_value,
            next = r.next_value,
            counter_max = r.counter_max,
            true_consumption = r.true_consumption,
            "counter reset"
        );
    }

    let negative_minutes = cons.iter().flatten().filter(|c| **c < 0.0).count();
    let remaining_negative_minutes = cons
        .iter()
        .zip(anom.iter())
        .filter(|(c, a)| matches!(c, Some(v) if *v < 0.0) && a.is_none())
        .count();
    if remaining_negative_minutes > 0 {
        warn!(
            tag = %tag,
            remaining_negative_minutes,
            "negative consumption left uncorrected"
        );
    }

    let report = TagReport {
        tag: tag.to_string(),
        samples: raw.len(),
        invalid_samples: count_invalid(&raw),
        negative_minutes,
        matched_pairs: redistribution.windows.len()
            + redistribution.suppressed.len()
            + redistribution.empty_windows.len(),
        windows: redistribution.windows.len(),
        suppressed_pairs: redistribution.suppressed.len(),
        empty_window_pairs: redistribution.empty_windows.len(),
        resets: resets.len(),
        collisions,
        anomaly_minutes: anom.iter().filter(|a| a.is_some()).count(),
        remaining_negative_minutes,
        conserved_volume: redistribution.windows.iter().map(|w| w.net).sum(),
    };

    frame.insert(ColumnKey::rectified(tag), rect)?;
    frame.insert(ColumnKey::new(tag, Stage::Consumption(Basis::Rectified)), cons)?;
    frame.insert(ColumnKey::new(tag, Stage::Anomaly(Basis::Rectified)), anom)?;

    info!(
        tag = %tag,
        invalid = report.invalid_samples,
        windows = report.windows,
        resets = report.resets,
        anomalies = report.anomaly_minutes,
        "tag corrected"
    );
    Ok(report)
}

/// Process the named tags. Failures are recorded and the batch continues.
pub fn process_tags(frame: &mut MinuteFrame, tags: &[String], cfg: &EngineConfig) -> BatchReport {
    let mut report = BatchReport::default();
    for tag in tags {
        match process_tag(frame, tag, cfg) {
            Ok(t) => report.tags.push(t),
            Err(e) => {
                warn!(tag = %tag, error = %e, "tag skipped");
                report.failures.push(TagFailure {
                    tag: tag.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }
    report
}

/// Full batch: drop stale derived columns, combine split words, then correct
/// every accepted total column.
pub fn process_frame(frame: &mut MinuteFrame, cfg: &EngineConfig) -> BatchReport {
    let dropped_derived = frame.drop_derived();
    if dropped_derived > 0 {
        debug!(dropped_derived, "dropped derived input columns");
    }
    let combined = combine_frame_pairs(frame);

    let tags: Vec<String> = frame
        .tags_at(Stage::Total)
        .into_iter()
        .filter(|t| cfg.accepts(t))
        .collect();

    let mut report = process_tags(frame, &tags, cfg);
    report.combined = combined;
    report.dropped_derived = dropped_derived;

    info!(
        minutes = frame.len(),
        tags = report.tags.len(),
        failures = report.failures.len(),
        anomalies = report.total_anomaly_minutes(),
        "batch corrected"
    );
    report
}
