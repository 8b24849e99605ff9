//! Zero/invalid totalizer rectification (`_rect_0`).
//!
//! A raw sample is invalid when:
//! - it reads exactly zero, or
//! - it dropped below the previous raw sample AND the next raw sample is
//!   lower still or zero (a down-then-down/flat glitch).
//!
//! Non-finite samples count as undefined. Invalid and undefined samples are
//! replaced by the last valid value (0 when none has been seen yet). The classification only ever looks at raw
//! neighbours; the replacement threads `last_valid` left to right.

/// `true` when `raw[i]` is a defined sample that must not be trusted.
///
/// The first and last positions lack a neighbour, so only the zero test can
/// flag them. Comparisons against an undefined or non-finite neighbour are
/// false.
pub fn is_invalid(raw: &[Option<f64>], i: usize) -> bool {
    let Some(cur) = finite_at(raw, i) else {
        return false;
    };
    if cur == 0.0 {
        return true;
    }

    let prev = i.checked_sub(1).and_then(|p| finite_at(raw, p));
    let next = finite_at(raw, i + 1);

    match (prev, next) {
        (Some(prev), Some(next)) => cur < prev && (next < cur || next == 0.0),
        _ => false,
    }
}

fn finite_at(raw: &[Option<f64>], i: usize) -> Option<f64> {
    raw.get(i).copied().flatten().filter(|v| v.is_finite())
}

/// Number of samples [`is_invalid`] flags.
pub fn count_invalid(raw: &[Option<f64>]) -> usize {
    (0..raw.len()).filter(|&i| is_invalid(raw, i)).count()
}

/// Produce the rectified counter. Every output position is defined; values
/// are whole counts (fractions truncated toward zero).
pub fn rectify(raw: &[Option<f64>]) -> Vec<Option<f64>> {
    let (out, _) = raw.iter().enumerate().fold(
        (Vec::with_capacity(raw.len()), None::<f64>),
        |(mut out, last_valid), (i, sample)| {
            let kept = match sample {
                Some(v) if v.is_finite() && !is_invalid(raw, i) => Some(*v),
                _ => None,
            };
            let last_valid = kept.or(last_valid);
            out.push(Some(last_valid.unwrap_or(0.0).trunc()));
            (out, last_valid)
        },
    );
    out
}
