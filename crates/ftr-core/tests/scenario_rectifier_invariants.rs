//! Rectifier invariants on totalizers with zero dropouts.
//!
//! GREEN when:
//! - rectifying an already rectified series changes nothing
//! - the rectified series is non-decreasing
//! - a rectified series has no sample left that `is_invalid` would flag,
//!   apart from leading zeros before the first reading
//!
//! Input model: a non-decreasing meter whose samples randomly read 0 or
//! nothing (communication dropouts).

use ftr_core::{is_invalid, rectify};
use proptest::prelude::*;

fn meter_with_dropouts() -> impl Strategy<Value = Vec<Option<f64>>> {
    (
        1u32..1_000_000,
        prop::collection::vec((0u32..500, 0u8..10), 1..150),
    )
        .prop_map(|(start, steps)| {
            let mut total = start as f64;
            steps
                .into_iter()
                .map(|(inc, roll)| {
                    total += inc as f64;
                    match roll {
                        0 | 1 => Some(0.0),
                        2 => None,
                        _ => Some(total),
                    }
                })
                .collect()
        })
}

proptest! {
    #[test]
    fn rectify_is_idempotent(raw in meter_with_dropouts()) {
        let once = rectify(&raw);
        let twice = rectify(&once);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn rectified_total_is_non_decreasing(raw in meter_with_dropouts()) {
        let rect = rectify(&raw);
        prop_assert_eq!(rect.len(), raw.len());
        for w in rect.windows(2) {
            prop_assert!(w[1] >= w[0], "{:?} -> {:?}", w[0], w[1]);
        }
    }

    #[test]
    fn rectified_series_is_valid_after_first_reading(raw in meter_with_dropouts()) {
        let rect = rectify(&raw);
        let first = rect.iter().position(|v| *v != Some(0.0));
        if let Some(first) = first {
            for i in first..rect.len() {
                prop_assert!(!is_invalid(&rect, i), "position {} still invalid", i);
            }
        }
    }
}

#[test]
fn every_output_position_is_defined() {
    let raw = vec![None, Some(0.0), None, Some(5.5), None];
    let rect = rectify(&raw);
    assert!(rect.iter().all(Option::is_some));
    assert_eq!(rect, vec![Some(0.0), Some(0.0), Some(0.0), Some(5.0), Some(5.0)]);
}
