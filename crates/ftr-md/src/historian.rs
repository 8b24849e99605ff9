//! Tag-view historian provider.
//!
//! Endpoints (relative to `base_url`):
//! - `GET  /Documents/tagviews/{view}`: view definition, `columns: [{name, uid}]`
//! - `POST /Documents/tagviews/{view}/historic`: raw minute rows for one uid
//!
//! The token is sent in the `nexustoken` header and never logged.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::provider::{
    FetchMinutesRequest, FetchOutcome, MinuteProvider, MinuteSample, ProviderError,
    TagFetchFailure, TagSeries,
};

const TOKEN_HEADER: &str = "nexustoken";
const DATA_SOURCE: &str = "RAW";
const RESOLUTION: &str = "RES_1_MIN";

#[derive(Clone)]
pub struct TagViewProvider {
    http: reqwest::Client,
    base_url: String,
    view: String,
    token: Option<String>,
    tag_prefix: String,
}

impl fmt::Debug for TagViewProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagViewProvider")
            .field("base_url", &self.base_url)
            .field("view", &self.view)
            .field("token", &self.token.as_ref().map(|_| "<REDACTED>"))
            .field("tag_prefix", &self.tag_prefix)
            .finish()
    }
}

impl TagViewProvider {
    pub fn new_with_base_url(
        base_url: String,
        view: String,
        token: Option<String>,
        tag_prefix: String,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        if view.trim().is_empty() {
            return Err(ProviderError::Config("tag view name is empty".to_string()));
        }
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Config(format!("http client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            view,
            token,
            tag_prefix,
        })
    }

    fn view_url(&self) -> String {
        format!("{}/Documents/tagviews/{}", self.base_url, self.view)
    }

    fn historic_url(&self) -> String {
        format!("{}/historic", self.view_url())
    }

    fn with_token(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(t) => req.header(TOKEN_HEADER, t),
            None => req,
        }
    }

    /// Tag name -> uid for every column of the view.
    pub async fn list_tags(&self) -> Result<BTreeMap<String, Value>, ProviderError> {
        let resp = self
            .with_token(self.http.get(self.view_url()))
            .send()
            .await
            .map_err(|e| ProviderError::Transport(format!("list tags: {e}")))?;
        let listing: ViewListing = decode(resp, "list tags").await?;

        let entries = match listing {
            ViewListing::Many(v) => v,
            ViewListing::One(e) => vec![e],
        };
        Ok(entries
            .into_iter()
            .flat_map(|e| e.columns)
            .filter_map(|c| match (c.name, c.uid) {
                (Some(name), Some(uid)) if !name.is_empty() && !uid.is_null() => Some((name, uid)),
                _ => None,
            })
            .collect())
    }

    /// Resolve a requested tag against the view: as-is first, then with the
    /// configured prefix. Returns `(request_name, uid)`.
    pub fn resolve<'a>(
        &self,
        tag: &str,
        uids: &'a BTreeMap<String, Value>,
    ) -> Option<(String, &'a Value)> {
        if let Some(uid) = uids.get(tag) {
            return Some((tag.to_string(), uid));
        }
        let prefixed = format!("{}{tag}", self.tag_prefix);
        uids.get(&prefixed).map(|uid| (prefixed, uid))
    }

    /// Raw minute rows for one uid.
    pub async fn fetch_uid(
        &self,
        uid: &Value,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<MinuteSample>, ProviderError> {
        let body = json!({
            "dataSource": DATA_SOURCE,
            "resolution": RESOLUTION,
            "uids": [uid],
            "startTs": start.timestamp(),
            "endTs": end.timestamp(),
        });
        let resp = self
            .with_token(self.http.post(self.historic_url()).json(&body))
            .send()
            .await
            .map_err(|e| ProviderError::Transport(format!("historic: {e}")))?;
        let rows: Vec<HistoricRow> = decode(resp, "historic").await?;

        Ok(rows
            .into_iter()
            .filter_map(|r| {
                let ts = epoch_seconds(&r.time_stamp)?;
                Some(MinuteSample {
                    ts,
                    value: number(&r.value),
                })
            })
            .collect())
    }
}

#[async_trait::async_trait]
impl MinuteProvider for TagViewProvider {
    fn source_name(&self) -> &'static str {
        "tagview"
    }

    async fn fetch_minutes(&self, req: FetchMinutesRequest) -> Result<FetchOutcome, ProviderError> {
        let uids = self.list_tags().await?;
        info!(view = %self.view, tags = uids.len(), "tag view listed");

        let tags = match req.tags {
            Some(t) => t,
            None => uids.keys().cloned().collect(),
        };

        let mut out = FetchOutcome::default();
        for tag in tags {
            let Some((request_name, uid)) = self.resolve(&tag, &uids) else {
                warn!(tag = %tag, "tag not found in view");
                out.missing.push(tag);
                continue;
            };

            match self.fetch_uid(uid, req.start, req.end).await {
                Ok(samples) if samples.is_empty() => {
                    info!(tag = %tag, "no rows");
                    out.empty.push(tag);
                }
                Ok(samples) => {
                    info!(tag = %tag, request_name = %request_name, rows = samples.len(), "fetched");
                    out.series.push(TagSeries {
                        tag,
                        request_name,
                        samples,
                    });
                }
                Err(e) => {
                    warn!(tag = %tag, error = %e, "fetch failed");
                    out.failed.push(TagFetchFailure {
                        tag,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if !out.missing.is_empty() {
            warn!(missing = ?out.missing, "tags missing from view");
        }
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ViewListing {
    Many(Vec<ViewEntry>),
    One(ViewEntry),
}

#[derive(Debug, Deserialize)]
struct ViewEntry {
    #[serde(default)]
    columns: Vec<ViewColumn>,
}

#[derive(Debug, Deserialize)]
struct ViewColumn {
    name: Option<String>,
    uid: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct HistoricRow {
    #[serde(rename = "timeStamp")]
    time_stamp: Value,
    #[serde(default, alias = "valor")]
    value: Value,
}

async fn decode<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
    what: &str,
) -> Result<T, ProviderError> {
    let status = resp.status();
    if !status.is_success() {
        let message = resp.text().await.unwrap_or_default();
        return Err(ProviderError::Api {
            code: Some(i64::from(status.as_u16())),
            message: format!("{what}: {message}"),
        });
    }
    resp.json()
        .await
        .map_err(|e| ProviderError::Decode(format!("{what}: {e}")))
}

fn number(v: &Value) -> Option<f64> {
    let x = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    x.is_finite().then_some(x)
}

fn epoch_seconds(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(prefix: &str) -> TagViewProvider {
        TagViewProvider::new_with_base_url(
            "http://historian.invalid/".to_string(),
            "FTR".to_string(),
            Some("secret-token".to_string()),
            prefix.to_string(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn urls_strip_trailing_slash() {
        let p = provider("CL_CAT_");
        assert_eq!(p.view_url(), "http://historian.invalid/Documents/tagviews/FTR");
        assert_eq!(
            p.historic_url(),
            "http://historian.invalid/Documents/tagviews/FTR/historic"
        );
    }

    #[test]
    fn resolve_tries_plain_then_prefixed() {
        let p = provider("CL_CAT_");
        let mut uids = BTreeMap::new();
        uids.insert("A_TOT".to_string(), json!("u1"));
        uids.insert("CL_CAT_B_TOT".to_string(), json!(42));

        assert_eq!(p.resolve("A_TOT", &uids), Some(("A_TOT".to_string(), &json!("u1"))));
        assert_eq!(
            p.resolve("B_TOT", &uids),
            Some(("CL_CAT_B_TOT".to_string(), &json!(42)))
        );
        assert_eq!(
            p.resolve("CL_CAT_B_TOT", &uids),
            Some(("CL_CAT_B_TOT".to_string(), &json!(42)))
        );
        assert_eq!(p.resolve("C_TOT", &uids), None);
    }

    #[test]
    fn debug_redacts_token() {
        let s = format!("{:?}", provider("X"));
        assert!(s.contains("<REDACTED>"));
        assert!(!s.contains("secret-token"));
    }

    #[test]
    fn empty_view_is_config_error() {
        let err = TagViewProvider::new_with_base_url(
            "http://x".into(),
            " ".into(),
            None,
            String::new(),
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert!(matches!(err, ProviderError::Config(_)));
    }

    #[test]
    fn lenient_value_decoding() {
        assert_eq!(number(&json!(12.5)), Some(12.5));
        assert_eq!(number(&json!("7")), Some(7.0));
        assert_eq!(number(&Value::Null), None);
        assert_eq!(number(&json!("n/a")), None);
        assert_eq!(epoch_seconds(&json!(1_700_000_000)), Some(1_700_000_000));
        assert_eq!(epoch_seconds(&json!(1_700_000_000.0)), Some(1_700_000_000));
        assert_eq!(epoch_seconds(&json!("1700000000")), Some(1_700_000_000));
        assert_eq!(epoch_seconds(&json!(true)), None);
    }
}
