//! Minute file in, corrected minute file and hourly file out.
//!
//! GREEN when:
//! - a European minute file with split counter words is read, corrected and
//!   written with derived columns appended after the input columns
//! - the corrected minute file is read back and reconciled into an hourly
//!   European file with three columns per tag
//! - stale derived columns in the reread file are recomputed, not trusted

use ftr_core::{process_frame, reconcile_frame, EngineConfig};
use ftr_io::{read_minute_table, write_hourly_table, write_minute_table, CsvFormat};

const RAW: &str = "timeStamp;PBD07_TOT_H;PBD07_TOT_L;PBD08_TOT\n\
2025-12-04 09:58:00;0;1000;500\n\
2025-12-04 09:59:00;0;1010;0\n\
2025-12-04 10:00:00;0;0;0\n\
2025-12-04 10:01:00;0;0;498\n\
2025-12-04 10:02:00;0;1005;530\n\
2025-12-04 10:03:00;0;1100;530\n";

#[test]
fn minute_file_corrected_and_reconciled() {
    let dir = tempfile::tempdir().unwrap();
    let raw_path = dir.path().join("all_minutes_20251204_100400.csv");
    std::fs::write(&raw_path, RAW).unwrap();

    let mut frame = read_minute_table(&raw_path).unwrap();
    let report = process_frame(&mut frame, &EngineConfig::default());
    assert_eq!(report.combined, vec!["PBD07_TOT".to_string()]);
    assert_eq!(report.tags.len(), 2);

    let minutes_path = dir.path().join("consumption_minutes_with_anom.csv");
    write_minute_table(&minutes_path, &frame, CsvFormat::Standard).unwrap();

    let text = std::fs::read_to_string(&minutes_path).unwrap();
    let header = text.lines().next().unwrap();
    assert_eq!(
        header,
        "timeStamp,PBD08_TOT,PBD07_TOT,\
         PBD08_TOT_rect_0,PBD08_TOT_rect_0_cons,PBD08_TOT_rect_0_anom,\
         PBD07_TOT_rect_0,PBD07_TOT_rect_0_cons,PBD07_TOT_rect_0_anom"
    );

    let reread = read_minute_table(&minutes_path).unwrap();
    let hourly = reconcile_frame(&reread);
    let hourly_path = dir.path().join("consumption_hourly.csv");
    write_hourly_table(&hourly_path, &hourly, CsvFormat::European).unwrap();

    let text = std::fs::read_to_string(&hourly_path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines[0],
        "timeStamp;PBD07_TOT_hourly_cons;PBD07_TOT_hourly_cons_corrected;\
         PBD07_TOT_hourly_has_corrections;PBD08_TOT_hourly_cons;\
         PBD08_TOT_hourly_cons_corrected;PBD08_TOT_hourly_has_corrections"
    );
    // PBD07: rect 1000 1010 1010 1010 1005 1100 -> cons 10 0 | 0 -5 95 _
    //        anomaly 45 at 10:00 and 10:01 (raw 0 at 10:00, 10:01)
    // PBD08: rect 500 500 500 498 530 530 -> cons 0 0 | -2 32 0 _
    //        anomaly 15 at 09:59 and 10:00
    assert_eq!(lines[1], "2025-12-04 09:00:00;10;10;false;0;15;true");
    assert_eq!(lines[2], "2025-12-04 10:00:00;90;185;true;30;47;true");
    assert_eq!(lines.len(), 3);
}

#[test]
fn stale_derived_columns_are_recomputed_on_reread() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stale.csv");
    std::fs::write(
        &path,
        "timeStamp,A_TOT,A_TOT_rect_0_cons\n\
         2025-01-01 00:00:00,10,999\n\
         2025-01-01 00:01:00,12,999\n",
    )
    .unwrap();

    let mut frame = read_minute_table(&path).unwrap();
    let report = process_frame(&mut frame, &EngineConfig::default());
    assert_eq!(report.dropped_derived, 1);

    let out = dir.path().join("out.csv");
    write_minute_table(&out, &frame, CsvFormat::Standard).unwrap();
    let text = std::fs::read_to_string(&out).unwrap();
    assert!(text.contains("2025-01-01 00:00:00,10,10,2,\n"));
}
