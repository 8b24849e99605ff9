//! Typed view of the loaded config.
//!
//! Every section and field has a default, so an empty config is valid for
//! the `minutes` and `hourly` steps. `fetch` additionally needs
//! `source.base_url` and `source.view` ([`SourceSettings::validate`]).

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use ftr_core::{EngineConfig, ResetPolicy};

/// CSV dialect of a written table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// `,` separator, `.` decimal point.
    Standard,
    /// `;` separator, `,` decimal comma.
    European,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub source: SourceSettings,
    pub engine: EngineSettings,
    pub io: IoSettings,
}

impl Settings {
    pub fn from_config_json(config_json: &Value) -> Result<Self> {
        let settings: Settings =
            serde_json::from_value(config_json.clone()).context("invalid config: settings")?;
        settings.engine.validate()?;
        Ok(settings)
    }
}

// ---------------------------------------------------------------------------
// source
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeriodSettings {
    /// `YYYY-MM-DD HH:MM:SS`; unset means today 00:00:00.
    pub start: Option<String>,
    /// `YYYY-MM-DD HH:MM:SS`; unset means now.
    pub end: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    pub base_url: Option<String>,
    /// Tag view name on the historian.
    pub view: Option<String>,
    /// NAME of the env var holding the API token. No token header when unset.
    pub token_env: Option<String>,
    /// Prefix the historian may store tag names under.
    pub tag_prefix: String,
    /// Substring filter over the signals file, which it makes required.
    /// Empty/unset: every tag in the view, signals file ignored.
    pub filter: Option<String>,
    /// One tag per line.
    pub signals_file: Option<String>,
    pub timeout_secs: u64,
    pub period: PeriodSettings,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            view: None,
            token_env: None,
            tag_prefix: "CL_CAT_".to_string(),
            filter: None,
            signals_file: None,
            timeout_secs: 30,
            period: PeriodSettings::default(),
        }
    }
}

impl SourceSettings {
    /// `(base_url, view)` or an error naming the missing key.
    pub fn validate(&self) -> Result<(&str, &str)> {
        let base_url = match self.base_url.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => s,
            _ => bail!("CONFIG_MISSING: source.base_url is required for fetch"),
        };
        let view = match self.view.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => s,
            _ => bail!("CONFIG_MISSING: source.view is required for fetch"),
        };
        Ok((base_url, view))
    }

    /// Filter with blanks treated as unset.
    pub fn effective_filter(&self) -> Option<&str> {
        self.filter.as_deref().map(str::trim).filter(|f| !f.is_empty())
    }
}

// ---------------------------------------------------------------------------
// engine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Only totals whose tag ends with this are corrected. Empty string: all.
    pub total_suffix: String,
    pub reset_threshold: f64,
    pub default_counter_max: f64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        let reset = ResetPolicy::default();
        Self {
            total_suffix: "_TOT".to_string(),
            reset_threshold: reset.threshold,
            default_counter_max: reset.default_counter_max,
        }
    }
}

impl EngineSettings {
    fn validate(&self) -> Result<()> {
        if !(self.reset_threshold.is_finite() && self.reset_threshold < 0.0) {
            bail!(
                "invalid config: engine.reset_threshold must be negative, got {}",
                self.reset_threshold
            );
        }
        if !(self.default_counter_max.is_finite() && self.default_counter_max > 0.0) {
            bail!(
                "invalid config: engine.default_counter_max must be positive, got {}",
                self.default_counter_max
            );
        }
        Ok(())
    }

    pub fn engine_config(&self) -> EngineConfig {
        let suffix = self.total_suffix.trim();
        EngineConfig {
            total_suffix: (!suffix.is_empty()).then(|| suffix.to_string()),
            reset: ResetPolicy {
                threshold: self.reset_threshold,
                default_counter_max: self.default_counter_max,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// io
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IoSettings {
    /// Where `fetch` writes `all_minutes_*.csv`.
    pub minute_dir: String,
    /// Where `minutes` / `hourly` write their outputs.
    pub output_dir: String,
    pub minute_format: OutputFormat,
    pub hourly_format: OutputFormat,
}

impl Default for IoSettings {
    fn default() -> Self {
        Self {
            minute_dir: "minute_data".to_string(),
            output_dir: "processed".to_string(),
            minute_format: OutputFormat::Standard,
            hourly_format: OutputFormat::European,
        }
    }
}
