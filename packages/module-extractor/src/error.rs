//! Typed errors for the module extractor.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling.
//!
//! Only [`ExtractionError`] ever reaches the caller of a pipeline run.
//! Fetch, model and parse errors are recovered inside the pipeline and
//! show up in the run report instead.

use std::time::Duration;

use thiserror::Error;

/// Pipeline-fatal errors.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Not a single page could be fetched from the root URL.
    #[error("no pages could be fetched from {url}")]
    NoPages { url: String },

    /// Pages were fetched but none of them yielded any text.
    #[error("no text could be extracted from the pages of {url}")]
    EmptyCorpus { url: String },

    /// The root URL was rejected before crawling.
    #[error("invalid root URL: {0}")]
    InvalidUrl(#[from] SecurityError),

    /// Configuration is missing or inconsistent.
    #[error("config error: {0}")]
    Config(String),

    /// The result could not be serialized
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that can occur while fetching a single page.
///
/// The crawler treats every variant the same way: the page is
/// unavailable, it is recorded and skipped.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// Non-2xx response
    #[error("HTTP {status} for {url}")]
    Http { url: String, status: u16 },

    /// Request did not complete in time
    #[error("timeout fetching {url}")]
    Timeout { url: String },

    /// Connection, TLS or body read failure
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// URL could not be parsed or resolved
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    /// A redirect left the crawl scope
    #[error("{url} redirected off-site to {target}")]
    OffSite { url: String, target: String },
}

/// Errors from the language-model collaborator.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Provider-side rate limit (HTTP 429)
    #[error("rate limited")]
    RateLimited { retry_after: Option<Duration> },

    /// The call exceeded its timeout
    #[error("model call timed out after {0:?}")]
    Timeout(Duration),

    /// Network failure before a response arrived
    #[error("transport error: {0}")]
    Transport(String),

    /// Provider returned a 5xx
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },

    /// Credential rejected (401/403)
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Any other non-success response
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// The response carried no completion text
    #[error("empty response from model")]
    EmptyResponse,
}

impl ModelError {
    /// Whether retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Timeout(_) | Self::Transport(_) | Self::Server { .. }
        )
    }

    /// Server-suggested delay before retrying, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Model output that could not be turned into module records.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("model output is empty")]
    Empty,

    #[error("no JSON array or object found in model output")]
    NoJson,

    #[error("invalid JSON after repair: {0}")]
    Json(#[from] serde_json::Error),

    #[error("JSON does not contain a module list")]
    NotAModuleList,
}

/// Why a chunk contributed nothing to Pass 1.
#[derive(Debug, Error)]
pub enum ChunkError {
    /// The model call failed, after retries where the failure allowed them.
    #[error("model call failed after {attempts} attempt(s): {source}")]
    Model {
        attempts: u32,
        #[source]
        source: ModelError,
    },

    /// The output could not be parsed, even after repair.
    #[error("unparsable model output: {0}")]
    Parse(#[from] ParseError),
}

/// Root URL validation errors.
#[derive(Debug, Error)]
pub enum SecurityError {
    /// URL scheme not allowed (e.g., file://, ftp://)
    #[error("disallowed URL scheme: {0}")]
    DisallowedScheme(String),

    /// URL has no host
    #[error("URL has no host")]
    NoHost,

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, ExtractionError>;

/// Result type alias for fetch operations.
pub type CrawlResult<T> = std::result::Result<T, CrawlError>;

/// Result type alias for model calls.
pub type ModelResult<T> = std::result::Result<T, ModelError>;

/// Result type alias for security operations.
pub type SecurityResult<T> = std::result::Result<T, SecurityError>;
