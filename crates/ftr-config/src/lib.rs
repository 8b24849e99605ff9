//! ftr-config
//!
//! Layered YAML configuration for the totalizer pipeline:
//! - docs merged in order (later overrides earlier), converted to JSON
//! - canonical JSON + SHA-256 hash so every output can name its config
//! - credential literals rejected (`CONFIG_SECRET_DETECTED`); the API token
//!   is referenced by env var NAME only
//! - per-mode unused-key report
//!
//! Typed access lives in [`settings`]; env var resolution in [`secrets`].

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs;

pub mod secrets;
pub mod settings;

pub use settings::{EngineSettings, IoSettings, OutputFormat, PeriodSettings, Settings, SourceSettings};

/// Known secret-like prefixes. If any leaf string value in the effective
/// config starts with one of these, loading aborts with CONFIG_SECRET_DETECTED.
const SECRET_PREFIXES: &[&str] = &[
    "sk-",        // OpenAI style
    "sk_live",    // Stripe live
    "sk_test",    // Stripe test
    "AKIA",       // AWS access key ID
    "-----BEGIN", // PEM private keys
    "ghp_",       // GitHub PAT
    "gho_",       // GitHub OAuth
    "glpat-",     // GitLab PAT
    "xoxb-",      // Slack bot token
    "xoxp-",      // Slack user token
    "eyJ",        // JWT (base64 of '{"')
];

// ---------------------------------------------------------------------------
// Modes + consumed-key registry
// ---------------------------------------------------------------------------

/// Which pipeline step is reading the config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigMode {
    /// Acquire minute data from the tag view API.
    Fetch,
    /// Correct a minute table.
    Minutes,
    /// Reconcile corrected minutes into hours.
    Hourly,
}

impl ConfigMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigMode::Fetch => "FETCH",
            ConfigMode::Minutes => "MINUTES",
            ConfigMode::Hourly => "HOURLY",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnusedKeyReport {
    pub mode: String,
    /// Consumed JSON-pointer prefixes used for this analysis (sorted, unique)
    pub consumed_prefixes: Vec<String>,
    /// Unused leaf pointers (sorted)
    pub unused_leaf_pointers: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }
}

/// Consumed JSON-pointer prefixes per mode.
///
/// Must reflect what [`Settings`] and the CLI actually read in that mode. A
/// leaf under any listed prefix counts as consumed.
pub fn consumed_pointers_for_mode(mode: ConfigMode) -> &'static [&'static str] {
    match mode {
        // ftr-cli fetch: SourceSettings + where/how the minute table is written
        ConfigMode::Fetch => &[
            "/source/base_url",
            "/source/view",
            "/source/token_env",
            "/source/tag_prefix",
            "/source/filter",
            "/source/signals_file",
            "/source/timeout_secs",
            "/source/period/start",
            "/source/period/end",
            "/io/minute_dir",
            "/io/minute_format",
        ],

        // ftr-cli minutes: EngineSettings + minute table in/out
        ConfigMode::Minutes => &[
            "/engine/total_suffix",
            "/engine/reset_threshold",
            "/engine/default_counter_max",
            "/io/minute_dir",
            "/io/output_dir",
            "/io/minute_format",
        ],

        // ftr-cli hourly: corrected minutes in, hourly table out
        ConfigMode::Hourly => &["/io/output_dir", "/io/minute_format", "/io/hourly_format"],
    }
}

/// Produce an unused-key report for a given mode.
/// If `policy == Fail`, returns an error when unused keys exist.
/// If `policy == Warn`, always returns Ok(report).
pub fn report_unused_keys(
    mode: ConfigMode,
    config_json: &Value,
    policy: UnusedKeyPolicy,
) -> Result<UnusedKeyReport> {
    report_unused_keys_for(mode, consumed_pointers_for_mode(mode), config_json, policy)
}

/// Same as [`report_unused_keys`] over the union of several modes (a
/// combined `run` reads what each of its steps reads).
pub fn report_unused_keys_multi(
    modes: &[ConfigMode],
    config_json: &Value,
    policy: UnusedKeyPolicy,
) -> Result<UnusedKeyReport> {
    let Some(first) = modes.first() else {
        bail!("CONFIG_UNUSED_KEYS: no mode given");
    };
    let consumed: Vec<&str> = modes
        .iter()
        .flat_map(|m| consumed_pointers_for_mode(*m).iter().copied())
        .collect();
    let mut report = report_unused_keys_for(*first, &consumed, config_json, policy)?;
    report.mode = modes
        .iter()
        .map(|m| m.as_str())
        .collect::<Vec<_>>()
        .join("+");
    Ok(report)
}

fn report_unused_keys_for(
    mode: ConfigMode,
    consumed_pointers: &[&str],
    config_json: &Value,
    policy: UnusedKeyPolicy,
) -> Result<UnusedKeyReport> {
    let consumed: BTreeSet<String> = consumed_pointers.iter().map(|p| normalize_pointer(p)).collect();
    let consumed_prefixes: Vec<String> = consumed.into_iter().collect();

    let mut leaves: Vec<String> = Vec::new();
    collect_leaf_pointers(config_json, "", &mut leaves);

    let mut unused: Vec<String> = leaves
        .into_iter()
        .filter(|lp| !consumed_prefixes.iter().any(|cp| is_prefix_pointer(cp, lp)))
        .collect();
    unused.sort();
    unused.dedup();

    let report = UnusedKeyReport {
        mode: mode.as_str().to_string(),
        consumed_prefixes,
        unused_leaf_pointers: unused,
    };

    if policy == UnusedKeyPolicy::Fail && !report.is_clean() {
        bail!(
            "CONFIG_UNUSED_KEYS (mode={}): {} unused config leaf key(s) detected. \
            Remove them or update the consumed registry. First few: {}",
            report.mode,
            report.unused_leaf_pointers.len(),
            preview_list(&report.unused_leaf_pointers, 12)
        );
    }

    Ok(report)
}

/// Normalize JSON pointer:
/// - must begin with "/"
/// - no trailing "/" unless it's just "/"
fn normalize_pointer(p: &str) -> String {
    let mut s = p.trim().to_string();
    if s.is_empty() {
        return "/".to_string();
    }
    if !s.starts_with('/') {
        s.insert(0, '/');
    }
    while s.ends_with('/') && s.len() > 1 {
        s.pop();
    }
    s
}

/// `true` if `prefix` is a JSON-pointer prefix of `leaf`.
/// "/a/b" consumes "/a/b/c" but NOT "/a/bc".
fn is_prefix_pointer(prefix: &str, leaf: &str) -> bool {
    if prefix == "/" || leaf == prefix {
        return true;
    }
    leaf.strip_prefix(prefix)
        .map(|rest| rest.starts_with('/'))
        .unwrap_or(false)
}

fn collect_leaf_pointers(v: &Value, prefix: &str, out: &mut Vec<String>) {
    match v {
        Value::Object(map) => {
            for (k, vv) in map.iter() {
                let next = format!("{}/{}", prefix, escape_pointer_token(k));
                collect_leaf_pointers(vv, &next, out);
            }
        }
        Value::Array(arr) => {
            for (i, vv) in arr.iter().enumerate() {
                let next = format!("{}/{}", prefix, i);
                collect_leaf_pointers(vv, &next, out);
            }
        }
        _ => {
            let p = if prefix.is_empty() {
                "/".to_string()
            } else {
                prefix.to_string()
            };
            out.push(p);
        }
    }
}

fn escape_pointer_token(s: &str) -> String {
    s.replace('~', "~0").replace('/', "~1")
}

fn preview_list(items: &[String], n: usize) -> String {
    let take = items.iter().take(n).cloned().collect::<Vec<_>>();
    format!("{:?}", take)
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let mut docs: Vec<String> = Vec::new();
    for p in paths {
        let raw =
            fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}"))?;
        docs.push(raw);
    }
    let doc_refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = serde_json::json!({});
    for raw in yaml_docs {
        let v_yaml: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid yaml")?;
        // An empty document parses as null; it overrides nothing.
        if v_yaml.is_null() {
            continue;
        }
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        merged = deep_merge(merged, v_json);
    }

    enforce_no_secret_literals(&merged)?;

    let canonical_json = canonicalize_json(&merged)?;
    let config_hash = sha256_hex(canonical_json.as_bytes());
    tracing::debug!(config_hash = %config_hash, docs = yaml_docs.len(), "config loaded");
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

/// serde_json's default `Map` is ordered by key, so plain compact
/// serialization is canonical.
fn canonicalize_json(v: &Value) -> Result<String> {
    serde_json::to_string(v).context("canonical json serialize failed")
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn enforce_no_secret_literals(v: &Value) -> Result<()> {
    let mut leaves = Vec::new();
    collect_leaf_pointers(v, "", &mut leaves);

    for ptr in leaves {
        let Some(s) = v.pointer(&ptr).and_then(Value::as_str) else {
            continue;
        };
        if looks_like_secret(s) {
            bail!("CONFIG_SECRET_DETECTED leaf={} value=REDACTED", ptr);
        }
    }
    Ok(())
}

fn looks_like_secret(s: &str) -> bool {
    let t = s.trim();
    if t.len() < 8 {
        return false;
    }
    SECRET_PREFIXES.iter().any(|p| t.starts_with(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pointer_prefix_respects_segment_boundary() {
        assert!(is_prefix_pointer("/io/minute_dir", "/io/minute_dir"));
        assert!(is_prefix_pointer("/source/period", "/source/period/start"));
        assert!(!is_prefix_pointer("/io/minute", "/io/minute_dir"));
        assert!(is_prefix_pointer("/", "/anything"));
    }

    #[test]
    fn normalize_pointer_adds_slash_and_trims() {
        assert_eq!(normalize_pointer("io/output_dir/"), "/io/output_dir");
        assert_eq!(normalize_pointer(""), "/");
    }

    #[test]
    fn leaf_pointers_escape_tokens() {
        let v = serde_json::json!({"a/b": {"c~d": 1}, "list": [true, "x"]});
        let mut out = Vec::new();
        collect_leaf_pointers(&v, "", &mut out);
        out.sort();
        assert_eq!(out, vec!["/a~1b/c~0d", "/list/0", "/list/1"]);
    }

    #[test]
    fn later_document_overrides_earlier() {
        let loaded = load_layered_yaml_from_strings(&[
            "engine:\n  reset_threshold: -5\n  total_suffix: _TOT\n",
            "engine:\n  reset_threshold: -9\n",
        ])
        .unwrap();
        assert_eq!(
            loaded.config_json.pointer("/engine/reset_threshold"),
            Some(&serde_json::json!(-9))
        );
        assert_eq!(
            loaded.config_json.pointer("/engine/total_suffix"),
            Some(&serde_json::json!("_TOT"))
        );
    }

    #[test]
    fn short_strings_are_never_secrets() {
        assert!(!looks_like_secret("sk-1"));
        assert!(looks_like_secret("eyJhbGciOiJIUzI1NiJ9.payload"));
    }
}
