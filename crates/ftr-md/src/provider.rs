//! Provider boundary: request/outcome types, error type and trait.

use std::fmt;

use chrono::{DateTime, Utc};

// ---------------------------------------------------------------------------
// Samples
// ---------------------------------------------------------------------------

/// One minute reading as returned by the historian.
#[derive(Debug, Clone, PartialEq)]
pub struct MinuteSample {
    /// UTC epoch seconds.
    pub ts: i64,
    /// `None` when the historian returned null or a non-numeric value.
    pub value: Option<f64>,
}

/// All samples fetched for one tag.
#[derive(Debug, Clone, PartialEq)]
pub struct TagSeries {
    /// Tag as requested; used as the column name.
    pub tag: String,
    /// Name the historian knows the tag by (may carry a prefix).
    pub request_name: String,
    pub samples: Vec<MinuteSample>,
}

/// A tag that resolved but could not be downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagFetchFailure {
    pub tag: String,
    pub reason: String,
}

// ---------------------------------------------------------------------------
// Request / outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FetchMinutesRequest {
    /// Tags to fetch. `None` fetches every tag of the view.
    pub tags: Option<Vec<String>>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// What a fetch produced. Unknown and failing tags are reported, not fatal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchOutcome {
    pub series: Vec<TagSeries>,
    /// Requested tags the view does not know.
    pub missing: Vec<String>,
    /// Tags whose download failed.
    pub failed: Vec<TagFetchFailure>,
    /// Tags that returned no rows.
    pub empty: Vec<String>,
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that abort a whole fetch.
#[derive(Debug)]
pub enum ProviderError {
    /// Network or transport failure.
    Transport(String),
    /// The historian answered with a non-success status.
    Api { code: Option<i64>, message: String },
    /// A response payload could not be decoded.
    Decode(String),
    /// A required configuration value is missing or invalid.
    Config(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Transport(msg) => write!(f, "transport error: {msg}"),
            ProviderError::Api {
                code: Some(c),
                message,
            } => write!(f, "historian api error code={c}: {message}"),
            ProviderError::Api {
                code: None,
                message,
            } => write!(f, "historian api error: {message}"),
            ProviderError::Decode(msg) => write!(f, "decode error: {msg}"),
            ProviderError::Config(msg) => write!(f, "config error: {msg}"),
        }
    }
}

impl std::error::Error for ProviderError {}

// ---------------------------------------------------------------------------
// Provider trait
// ---------------------------------------------------------------------------

/// Upstream minute-data source.
///
/// Object safe and `Send + Sync` so the CLI can hold a `Box<dyn MinuteProvider>`.
#[async_trait::async_trait]
pub trait MinuteProvider: Send + Sync {
    fn source_name(&self) -> &'static str;

    async fn fetch_minutes(&self, req: FetchMinutesRequest) -> Result<FetchOutcome, ProviderError>;
}
