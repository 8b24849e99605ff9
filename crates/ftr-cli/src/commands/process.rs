//! `ftr minutes` and `ftr hourly`.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use super::fetch::MINUTES_PREFIX;
use super::{csv_format, ensure_dir, output_stamp, LoadedSettings};

pub const CORRECTED_PREFIX: &str = "consumption_minutes_with_anom";
pub const REPORT_PREFIX: &str = "correction_report";
pub const HOURLY_PREFIX: &str = "consumption_hourly";

fn resolve_input(input: Option<PathBuf>, dir: &str, prefix: &str) -> Result<PathBuf> {
    if let Some(p) = input {
        return Ok(p);
    }
    ftr_io::latest_matching(Path::new(dir), prefix, "csv")?
        .with_context(|| format!("no {prefix}_*.csv found in '{dir}'"))
}

// ---------------------------------------------------------------------------
// minutes
// ---------------------------------------------------------------------------

/// Correct a minute table. Returns the written corrected-minutes path.
pub fn minutes(cfg: &LoadedSettings, input: Option<PathBuf>) -> Result<PathBuf> {
    let io = &cfg.settings.io;
    let input = resolve_input(input, &io.minute_dir, MINUTES_PREFIX)?;
    info!(input = %input.display(), "reading minute table");

    let mut frame = ftr_io::read_minute_table(&input)
        .with_context(|| format!("read minute table failed: {}", input.display()))?;

    let report = ftr_core::process_frame(&mut frame, &cfg.settings.engine.engine_config());
    if report.tags.is_empty() && report.failures.is_empty() {
        warn!("no totalizer column matched engine.total_suffix");
    }

    let out_dir = Path::new(&io.output_dir);
    ensure_dir(out_dir)?;
    let stamp = output_stamp();

    let minutes_path = out_dir.join(ftr_io::timestamped_name(CORRECTED_PREFIX, stamp, "csv"));
    ftr_io::write_minute_table(&minutes_path, &frame, csv_format(io.minute_format))?;

    let report_path = out_dir.join(ftr_io::timestamped_name(REPORT_PREFIX, stamp, "json"));
    let json = serde_json::to_string_pretty(&report).context("serialize report json failed")?;
    std::fs::write(&report_path, json)
        .with_context(|| format!("write report failed: {}", report_path.display()))?;

    println!("minutes_ok=true input={}", input.display());
    println!("config_hash={}", cfg.loaded.config_hash);
    println!(
        "rows={} tags={} combined={} dropped_derived={} failures={}",
        frame.len(),
        report.tags.len(),
        report.combined.len(),
        report.dropped_derived,
        report.failures.len()
    );
    println!(
        "anomaly_minutes={} clean={}",
        report.total_anomaly_minutes(),
        report.is_clean()
    );
    for t in report.tags.iter().filter(|t| !t.is_clean()) {
        println!("unclean {}", t);
    }
    for f in &report.failures {
        println!("failed_tag={} reason={}", f.tag, f.reason);
    }
    println!("minutes_path={}", minutes_path.display());
    println!("report_path={}", report_path.display());

    Ok(minutes_path)
}

// ---------------------------------------------------------------------------
// hourly
// ---------------------------------------------------------------------------

/// Reconcile corrected minutes into an hourly table. Returns the written path.
pub fn hourly(cfg: &LoadedSettings, input: Option<PathBuf>) -> Result<PathBuf> {
    let io = &cfg.settings.io;
    let input = resolve_input(input, &io.output_dir, CORRECTED_PREFIX)?;
    info!(input = %input.display(), "reading corrected minute table");

    let frame = ftr_io::read_minute_table(&input)
        .with_context(|| format!("read minute table failed: {}", input.display()))?;

    let hourly = ftr_core::reconcile_frame(&frame);
    if hourly.tags.is_empty() {
        bail!(
            "HOURLY_NO_CONSUMPTION: '{}' has no consumption columns (run `ftr minutes` first)",
            input.display()
        );
    }

    let out_dir = Path::new(&io.output_dir);
    ensure_dir(out_dir)?;
    let path = out_dir.join(ftr_io::timestamped_name(HOURLY_PREFIX, output_stamp(), "csv"));
    ftr_io::write_hourly_table(&path, &hourly, csv_format(io.hourly_format))?;

    let corrected_hours: usize = hourly
        .tags
        .values()
        .map(|c| c.has_corrections.iter().filter(|f| **f).count())
        .sum();

    println!("hourly_ok=true input={}", input.display());
    println!(
        "hours={} tags={} corrected_hours={} failures={}",
        hourly.hours.len(),
        hourly.tags.len(),
        corrected_hours,
        hourly.failures.len()
    );
    for f in &hourly.failures {
        println!("failed_tag={} reason={}", f.tag, f.reason);
    }
    println!("hourly_path={}", path.display());

    Ok(path)
}
