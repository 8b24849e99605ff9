//! Negative-compensation redistribution.
//!
//! A meter that stalls (reads 0 or nothing) and then catches up produces a
//! negative minute immediately followed by a positive one in the rectified
//! consumption. Their sum (`net`) is the volume that really flowed during the
//! stall. This pass spreads `net` evenly over the stuck run of the **raw**
//! totalizer, ending at the negative minute.
//!
//! Rules:
//! - only a directly adjacent `(< 0, > 0)` pair matches
//! - `net <= 0` suppresses the pair; the negative stays visible downstream
//! - the window is `[start, i]` where `start` is the first minute of the
//!   zero/undefined raw run ending at `i`; the positive minute keeps its value
//! - after any matched pair the scan skips both minutes
//! - values accumulate; an exact 0.0 result collapses to undefined
//!
//! This module does **not** look at counter resets; see [`crate::reset`].

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::Column;

/// One applied redistribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedistributionWindow {
    /// First minute receiving a share.
    pub start: usize,
    /// Last minute receiving a share (the negative minute).
    pub end: usize,
    pub negative: f64,
    pub positive: f64,
    pub net: f64,
    pub per_minute: f64,
}

impl RedistributionWindow {
    pub fn len(&self) -> usize {
        self.end + 1 - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }
}

/// Result of [`redistribute`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Redistribution {
    /// Sparse replacement consumption, one entry per minute.
    pub anomalies: Column,
    pub windows: Vec<RedistributionWindow>,
    /// Positions of matched pairs whose net was not positive.
    pub suppressed: Vec<usize>,
    /// Positions of matched pairs whose raw total was a real reading at the
    /// negative minute, leaving nothing to spread over.
    pub empty_windows: Vec<usize>,
}

fn is_stuck(raw: Option<f64>) -> bool {
    match raw {
        None => true,
        Some(v) => v == 0.0 || !v.is_finite(),
    }
}

/// Spread each compensated negative over its stuck run.
///
/// `cons` is the rectified consumption; `totals_raw` is the pre-rectification
/// counter on the same index.
pub fn redistribute(cons: &[Option<f64>], totals_raw: &[Option<f64>]) -> Redistribution {
    let n = cons.len();
    let mut acc: Vec<Option<f64>> = vec![None; n];
    let mut out = Redistribution::default();

    let mut i = 0;
    while i + 1 < n {
        let (Some(cur), Some(nxt)) = (cons[i], cons[i + 1]) else {
            i += 1;
            continue;
        };
        if !(cur < 0.0 && nxt > 0.0) {
            i += 1;
            continue;
        }

        let net = cur + nxt;
        if net <= 0.0 {
            debug!(position = i, negative = cur, positive = nxt, "redistribution suppressed");
            out.suppressed.push(i);
            i += 2;
            continue;
        }

        // Walk back over the raw stuck run ending at i.
        let mut start = i + 1;
        while start > 0 && is_stuck(totals_raw.get(start - 1).copied().flatten()) {
            start -= 1;
        }

        if start > i {
            out.empty_windows.push(i);
        } else {
            let count = (i - start + 1) as f64;
            let per_minute = net / count;
            for slot in &mut acc[start..=i] {
                *slot = Some(slot.unwrap_or(0.0) + per_minute);
            }
            out.windows.push(RedistributionWindow {
                start,
                end: i,
                negative: cur,
                positive: nxt,
                net,
                per_minute,
            });
        }
        i += 2;
    }

    out.anomalies = acc
        .into_iter()
        .map(|v| v.filter(|x| *x != 0.0))
        .collect();
    out
}
