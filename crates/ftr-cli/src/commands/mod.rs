//! Command handler modules for ftr-cli.
//!
//! Shared config loading and small helpers live here; each pipeline step
//! lives in its own submodule.

pub mod fetch;
pub mod process;

use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use clap::Args;
use ftr_config::{
    report_unused_keys_multi, ConfigMode, LoadedConfig, OutputFormat, Settings, UnusedKeyPolicy,
};
use ftr_io::CsvFormat;

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

#[derive(Args, Debug, Clone)]
pub struct LoadArgs {
    /// Layered config paths in merge order. None: built-in defaults.
    #[arg(long = "config")]
    pub config_paths: Vec<String>,

    /// Fail instead of warn when the config has keys this command never reads.
    #[arg(long, default_value_t = false)]
    pub strict_config: bool,
}

/// Loaded config plus its typed view.
pub struct LoadedSettings {
    pub loaded: LoadedConfig,
    pub settings: Settings,
}

impl LoadArgs {
    pub fn load(&self, modes: &[ConfigMode]) -> Result<LoadedSettings> {
        let path_refs: Vec<&str> = self.config_paths.iter().map(|s| s.as_str()).collect();
        let loaded = ftr_config::load_layered_yaml(&path_refs)?;

        let policy = if self.strict_config {
            UnusedKeyPolicy::Fail
        } else {
            UnusedKeyPolicy::Warn
        };
        let report = report_unused_keys_multi(modes, &loaded.config_json, policy)?;
        if !report.is_clean() {
            eprintln!(
                "WARN: CONFIG_UNUSED_KEYS mode={} unused_leaf_keys={}",
                report.mode,
                report.unused_leaf_pointers.len()
            );
            for p in report.unused_leaf_pointers.iter().take(50) {
                eprintln!("  unused={}", p);
            }
            let extra = report.unused_leaf_pointers.len().saturating_sub(50);
            if extra > 0 {
                eprintln!("  ... and {} more", extra);
            }
        }

        let settings = Settings::from_config_json(&loaded.config_json)?;
        tracing::debug!(config_hash = %loaded.config_hash, "settings loaded");
        Ok(LoadedSettings { loaded, settings })
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

pub fn csv_format(f: OutputFormat) -> CsvFormat {
    match f {
        OutputFormat::Standard => CsvFormat::Standard,
        OutputFormat::European => CsvFormat::European,
    }
}

/// Local wall-clock time used in output file names.
pub fn output_stamp() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

pub fn ensure_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_format_maps_to_dialect() {
        assert_eq!(csv_format(OutputFormat::Standard), CsvFormat::Standard);
        assert_eq!(csv_format(OutputFormat::European), CsvFormat::European);
    }

    #[test]
    fn no_config_paths_load_defaults() {
        let args = LoadArgs {
            config_paths: vec![],
            strict_config: true,
        };
        let cfg = args.load(&[ConfigMode::Minutes]).unwrap();
        assert_eq!(cfg.settings, Settings::default());
    }
}
