use crate::types::Column;

/// Forward differences: `cons[i] = totals[i + 1] - totals[i]`.
///
/// A position is undefined when either side is undefined. The last position
/// has no successor and is always undefined.
pub fn differences(totals: &[Option<f64>]) -> Column {
    let mut out: Column = totals
        .windows(2)
        .map(|w| match (w[0], w[1]) {
            (Some(cur), Some(next)) => Some(next - cur),
            _ => None,
        })
        .collect();
    if !totals.is_empty() {
        out.push(None);
    }
    out
}
