//! reqwest-backed fetcher.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::error::{CrawlError, CrawlResult};
use crate::traits::fetcher::{FetchResponse, Fetcher};

/// Browser-like User-Agent; several help centers reject bot agents.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

const MAX_REDIRECTS: usize = 10;

/// HTTP fetcher over a shared `reqwest::Client`.
///
/// # Example
///
/// ```rust,ignore
/// use module_extractor::crawlers::HttpFetcher;
///
/// let fetcher = HttpFetcher::new()?.with_user_agent("DocsBot/1.0");
/// ```
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    user_agent: String,
}

impl HttpFetcher {
    /// Fetcher with a 15 second per-request timeout and a browser User-Agent.
    pub fn new() -> CrawlResult<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> CrawlResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| CrawlError::Transport(Box::new(e)))?;

        Ok(Self::with_client(client))
    }

    /// Use a preconfigured client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    fn map_error(url: &Url, error: reqwest::Error) -> CrawlError {
        if error.is_timeout() {
            CrawlError::Timeout {
                url: url.to_string(),
            }
        } else if error.is_builder() {
            CrawlError::InvalidUrl {
                url: url.to_string(),
            }
        } else {
            CrawlError::Transport(Box::new(error))
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> CrawlResult<FetchResponse> {
        debug!(url = %url, "HTTP fetch starting");

        let response = self
            .client
            .get(url.clone())
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .header(reqwest::header::ACCEPT, "text/html,application/xhtml+xml")
            .send()
            .await
            .map_err(|e| Self::map_error(url, e))?;

        let status = response.status().as_u16();
        let final_url = response.url().clone();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| {
                v.to_str()
                    .ok()
                    .map(|v| (k.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();

        let body = response
            .text()
            .await
            .map_err(|e| Self::map_error(url, e))?;

        debug!(url = %url, status, final_url = %final_url, bytes = body.len(), "HTTP fetch complete");

        Ok(FetchResponse {
            status,
            body,
            headers,
            final_url,
        })
    }

    fn name(&self) -> &str {
        "http"
    }
}
