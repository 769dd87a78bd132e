//! Fetcher trait - the HTTP transport collaborator.
//!
//! The crawler only needs "URL in, status + body out". TLS, redirects
//! and timeouts belong to the implementation.

use async_trait::async_trait;
use std::collections::HashMap;
use url::Url;

use crate::error::CrawlResult;

/// Response to a single fetch.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// HTTP status code
    pub status: u16,

    /// Response body decoded as text
    pub body: String,

    /// Response headers (lowercased names)
    pub headers: HashMap<String, String>,

    /// URL after redirects
    pub final_url: Url,
}

impl FetchResponse {
    /// A 200 response served from `url` itself.
    pub fn ok(url: Url, body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            headers: HashMap::new(),
            final_url: url,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type").map(String::as_str)
    }
}

/// Transport used by the crawler.
///
/// Implementations return `Ok` for any response that arrived, including
/// non-2xx ones; the crawler decides what counts as available.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> CrawlResult<FetchResponse>;

    /// Name for logging.
    fn name(&self) -> &str {
        "unknown"
    }
}

#[async_trait]
impl<F: Fetcher + ?Sized> Fetcher for std::sync::Arc<F> {
    async fn fetch(&self, url: &Url) -> CrawlResult<FetchResponse> {
        (**self).fetch(url).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
