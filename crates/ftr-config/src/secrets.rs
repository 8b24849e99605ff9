//! Runtime secret resolution.
//!
//! Config YAML stores only the env var NAME of the API token
//! (`source.token_env`). The value is read once here and passed to the
//! provider; `Debug` redacts it and errors name the variable, never the value.

use anyhow::{bail, Result};

use crate::{ConfigMode, SourceSettings};

#[derive(Clone, Default)]
pub struct ResolvedSecrets {
    /// Historian API token. `None` when no `token_env` is configured.
    pub api_token: Option<String>,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field("api_token", &self.api_token.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

/// Returns `None` if the variable is unset or blank.
fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Resolve secrets for `mode`.
///
/// | Mode    | Required                                   |
/// |---------|--------------------------------------------|
/// | FETCH   | the token, when `source.token_env` is set  |
/// | MINUTES | nothing                                    |
/// | HOURLY  | nothing                                    |
pub fn resolve_secrets_for_mode(source: &SourceSettings, mode: ConfigMode) -> Result<ResolvedSecrets> {
    if mode != ConfigMode::Fetch {
        return Ok(ResolvedSecrets::default());
    }

    let Some(var) = source.token_env.as_deref().map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(ResolvedSecrets::default());
    };

    match resolve_env(var) {
        Some(token) => Ok(ResolvedSecrets {
            api_token: Some(token),
        }),
        None => bail!(
            "SECRETS_MISSING mode={}: required env var '{}' (api token) is not set or empty",
            mode.as_str(),
            var
        ),
    }
}
