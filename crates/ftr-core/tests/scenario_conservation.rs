//! Redistribution conserves volume.
//!
//! GREEN when:
//! - every applied window spreads exactly its `net` (`per_minute * len == net`)
//! - the anomaly column sums to the total `net` of all windows, even when
//!   windows overlap on a shared stuck run
//! - a window always ends on the negative minute and never covers the
//!   compensating positive minute
//! - suppressed pairs (`net <= 0`) contribute nothing

use ftr_core::{differences, rectify, redistribute};
use proptest::prelude::*;

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-6 * b.abs().max(1.0)
}

fn sample() -> impl Strategy<Value = Option<f64>> {
    prop_oneof![
        1 => Just(None),
        3 => Just(Some(0.0)),
        6 => (1u32..10_000).prop_map(|v| Some(v as f64)),
    ]
}

proptest! {
    #[test]
    fn every_window_spreads_its_net(raw in prop::collection::vec(sample(), 0..120)) {
        let rect = rectify(&raw);
        let cons = differences(&rect);
        let r = redistribute(&cons, &raw);

        prop_assert_eq!(r.anomalies.len(), cons.len());
        for w in &r.windows {
            prop_assert!(w.net > 0.0);
            prop_assert!(close(w.per_minute * w.len() as f64, w.net));
            prop_assert_eq!(cons[w.end], Some(w.negative));
            prop_assert_eq!(cons[w.end + 1], Some(w.positive));
            prop_assert!(close(w.negative + w.positive, w.net));
        }
    }

    #[test]
    fn anomaly_total_equals_window_nets(raw in prop::collection::vec(sample(), 0..120)) {
        let rect = rectify(&raw);
        let cons = differences(&rect);
        let r = redistribute(&cons, &raw);

        let anomaly_total: f64 = r.anomalies.iter().flatten().sum();
        let net_total: f64 = r.windows.iter().map(|w| w.net).sum();
        prop_assert!(close(anomaly_total, net_total));
    }

    #[test]
    fn positive_minute_keeps_its_value(raw in prop::collection::vec(sample(), 0..120)) {
        let rect = rectify(&raw);
        let cons = differences(&rect);
        let r = redistribute(&cons, &raw);

        for w in &r.windows {
            // the positive minute is only covered if a later window reaches back over it
            let later_covers = r
                .windows
                .iter()
                .any(|o| o.start <= w.end + 1 && w.end + 1 <= o.end);
            if !later_covers {
                prop_assert!(r.anomalies[w.end + 1].is_none());
            }
        }
    }
}

#[test]
fn overlapping_windows_accumulate() {
    // both negatives share the stuck run starting at 1
    let raw = vec![
        Some(100.0),
        Some(0.0),
        Some(0.0),
        Some(0.0),
        Some(0.0),
        Some(0.0),
    ];
    let cons = vec![Some(0.0), Some(-5.0), Some(25.0), Some(-1.0), Some(7.0), None];
    let r = redistribute(&cons, &raw);

    assert_eq!(r.windows.len(), 2);
    assert_eq!((r.windows[0].start, r.windows[0].end), (1, 1));
    assert_eq!((r.windows[1].start, r.windows[1].end), (1, 3));
    // 20 at 1, then 6 / 3 = 2 over 1..=3
    assert_eq!(
        r.anomalies,
        vec![None, Some(22.0), Some(2.0), Some(2.0), None, None]
    );
    let total: f64 = r.anomalies.iter().flatten().sum();
    assert_eq!(total, 26.0);
}
