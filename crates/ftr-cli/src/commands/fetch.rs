//! `ftr fetch`: historian tag view -> `all_minutes_<ts>.csv`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveTime, Utc};
use ftr_config::secrets::resolve_secrets_for_mode;
use ftr_config::{ConfigMode, SourceSettings};
use ftr_md::{assemble_frame, select_tags, FetchMinutesRequest, MinuteProvider, TagViewProvider};
use tracing::{info, warn};

use super::{csv_format, ensure_dir, output_stamp, LoadedSettings};

pub const MINUTES_PREFIX: &str = "all_minutes";

/// Fetch, assemble and write the minute table. Returns the written path.
pub async fn fetch(
    cfg: &LoadedSettings,
    start: Option<String>,
    end: Option<String>,
) -> Result<PathBuf> {
    let source = &cfg.settings.source;
    let (base_url, view) = source.validate()?;
    let secrets = resolve_secrets_for_mode(source, ConfigMode::Fetch)?;

    let (start, end) = period(source, start, end)?;

    let provider = TagViewProvider::new_with_base_url(
        base_url.to_string(),
        view.to_string(),
        secrets.api_token,
        source.tag_prefix.clone(),
        Duration::from_secs(source.timeout_secs),
    )?;

    let tags = requested_tags(source)?;
    if let Some(t) = &tags {
        info!(tags = t.len(), "tags selected");
    }

    let outcome = provider
        .fetch_minutes(FetchMinutesRequest { tags, start, end })
        .await
        .context("historian fetch failed")?;

    for f in &outcome.failed {
        warn!(tag = %f.tag, reason = %f.reason, "tag skipped");
    }
    if outcome.series.is_empty() {
        bail!(
            "FETCH_EMPTY: no tag returned data (missing={} failed={} empty={})",
            outcome.missing.len(),
            outcome.failed.len(),
            outcome.empty.len()
        );
    }

    let frame = assemble_frame(&outcome)?;

    let dir = Path::new(&cfg.settings.io.minute_dir);
    ensure_dir(dir)?;
    let path = dir.join(ftr_io::timestamped_name(MINUTES_PREFIX, output_stamp(), "csv"));
    ftr_io::write_minute_table(&path, &frame, csv_format(cfg.settings.io.minute_format))?;

    println!("fetch_ok=true source={}", provider.source_name());
    println!("config_hash={}", cfg.loaded.config_hash);
    println!("period_start={}", start.to_rfc3339());
    println!("period_end={}", end.to_rfc3339());
    println!(
        "tags={} rows={} missing={} failed={} empty={}",
        outcome.series.len(),
        frame.len(),
        outcome.missing.len(),
        outcome.failed.len(),
        outcome.empty.len()
    );
    for m in &outcome.missing {
        println!("missing_tag={}", m);
    }
    println!("minutes_path={}", path.display());

    Ok(path)
}

/// No filter: every tag of the view (`None`) and the signals file is not
/// read. A filter selects from the signals file, which is then required.
fn requested_tags(source: &SourceSettings) -> Result<Option<Vec<String>>> {
    let Some(filter) = source.effective_filter() else {
        if let Some(file) = &source.signals_file {
            info!(signals_file = %file, "no filter set, fetching every tag of the view");
        }
        return Ok(None);
    };
    let Some(file) = &source.signals_file else {
        bail!("CONFIG_MISSING: source.signals_file is required when source.filter is set");
    };

    let text = std::fs::read_to_string(file)
        .with_context(|| format!("read signals_file failed: {}", file))?;
    let tags = select_tags(&text, Some(filter));
    if tags.is_empty() {
        bail!(
            "FETCH_NO_TAGS: no tag of signals_file '{}' contains '{}'",
            file,
            filter
        );
    }
    Ok(Some(tags))
}

/// CLI overrides config; unset start is today 00:00 UTC, unset end is now.
fn period(
    source: &SourceSettings,
    start: Option<String>,
    end: Option<String>,
) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let now = Utc::now();

    let start = match start.or_else(|| source.period.start.clone()) {
        Some(raw) => parse_bound("start", &raw)?,
        None => now.date_naive().and_time(NaiveTime::MIN).and_utc(),
    };
    let end = match end.or_else(|| source.period.end.clone()) {
        Some(raw) => parse_bound("end", &raw)?,
        None => now,
    };

    if end <= start {
        bail!(
            "invalid period: end {} is not after start {}",
            end.to_rfc3339(),
            start.to_rfc3339()
        );
    }
    Ok((start, end))
}

fn parse_bound(which: &str, raw: &str) -> Result<DateTime<Utc>> {
    ftr_io::parse_timestamp(raw).with_context(|| format!("invalid period {which}: '{raw}'"))
}
