//! Counter word combination.
//!
//! Some meters publish their 32-bit totalizer as two 16-bit registers
//! (`<tag>_H`, `<tag>_L`). This module merges each pair into one `<tag>`
//! counter column and drops the halves from the frame.

use tracing::debug;

use crate::types::{Column, ColumnKey, MinuteFrame, Stage};

const LOW_WORD_MASK: i64 = 0xFFFF;

/// Coerce a register sample to an integer word. Undefined and non-finite
/// samples become 0; fractional samples are truncated toward zero.
fn coerce_word(v: Option<f64>) -> i64 {
    match v {
        Some(x) if x.is_finite() => x.trunc() as i64,
        _ => 0,
    }
}

/// `combined[i] = (high[i] << 16) | (low[i] & 0xFFFF)`.
///
/// Never fails: noisy telemetry is combined best-effort and every output
/// position is defined.
pub fn combine_words(high: &[Option<f64>], low: &[Option<f64>]) -> Column {
    high.iter()
        .zip(low.iter())
        .map(|(h, l)| {
            let h = coerce_word(*h);
            let l = coerce_word(*l);
            Some(((h << 16) | (l & LOW_WORD_MASK)) as f64)
        })
        .collect()
}

/// Combine every high/low pair in `frame` into a total column.
///
/// Returns the tags that were combined. A half without its partner is left
/// untouched.
pub fn combine_frame_pairs(frame: &mut MinuteFrame) -> Vec<String> {
    let mut combined = Vec::new();

    for tag in frame.tags_at(Stage::High) {
        let high_key = ColumnKey::new(tag.clone(), Stage::High);
        let low_key = ColumnKey::new(tag.clone(), Stage::Low);

        let (Some(high), Some(low)) = (frame.get(&high_key), frame.get(&low_key)) else {
            continue;
        };
        let total = combine_words(high, low);

        frame.remove(&high_key);
        frame.remove(&low_key);
        // Lengths come from the same frame, insert cannot mismatch.
        if frame.insert(ColumnKey::total(tag.clone()), total).is_ok() {
            debug!(tag = %tag, "combined high/low counter words");
            combined.push(tag);
        }
    }

    combined
}
