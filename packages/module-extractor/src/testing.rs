//! Testing utilities including mock implementations.
//!
//! These are useful for testing applications that use the extractor
//! without making real model or network calls.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use url::Url;

use crate::crawlers::links::normalize_url;
use crate::error::{CrawlError, CrawlResult, ModelError, ModelResult};
use crate::pipeline::prompts::is_synthesis;
use crate::pipeline::synthesize::consolidate;
use crate::traits::fetcher::{FetchResponse, Fetcher};
use crate::traits::model::{LanguageModel, Prompt};
use crate::types::module::ModuleRecord;

type Handler = Arc<dyn Fn(&str) -> ModelResult<String> + Send + Sync>;

/// Which pass a model call belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Extraction,
    Synthesis,
}

/// Record of a call made to the mock model.
#[derive(Debug, Clone)]
pub struct MockModelCall {
    pub kind: PromptKind,
    /// The user message (chunk text or serialized raw list)
    pub input: String,
    pub max_output_tokens: u32,
}

/// A mock language model for testing.
///
/// Extraction calls answer `[]` unless a handler is set. Synthesis calls
/// merge the input list by case-insensitive module name unless a handler
/// is set, which is enough to exercise the pipeline end to end.
#[derive(Clone, Default)]
pub struct MockModel {
    extraction_handler: Arc<RwLock<Option<Handler>>>,
    synthesis_handler: Arc<RwLock<Option<Handler>>>,

    /// Errors returned by the next calls, in order
    failures: Arc<Mutex<VecDeque<ModelError>>>,

    /// Delay applied to every call
    delay: Arc<RwLock<Option<Duration>>>,

    /// Delays applied to calls whose input contains a marker
    delays_for: Arc<RwLock<Vec<(String, Duration)>>>,

    /// Call tracking for assertions
    calls: Arc<RwLock<Vec<MockModelCall>>>,
}

impl MockModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer extraction calls with `handler(chunk_text)`.
    pub fn with_extraction_handler<F>(self, handler: F) -> Self
    where
        F: Fn(&str) -> ModelResult<String> + Send + Sync + 'static,
    {
        *self.extraction_handler.write().unwrap() = Some(Arc::new(handler));
        self
    }

    /// Answer every extraction call with the same text.
    pub fn with_extraction_output(self, output: impl Into<String>) -> Self {
        let output = output.into();
        self.with_extraction_handler(move |_| Ok(output.clone()))
    }

    /// Answer synthesis calls with `handler(raw_json)`.
    pub fn with_synthesis_handler<F>(self, handler: F) -> Self
    where
        F: Fn(&str) -> ModelResult<String> + Send + Sync + 'static,
    {
        *self.synthesis_handler.write().unwrap() = Some(Arc::new(handler));
        self
    }

    /// Answer every synthesis call with the same text.
    pub fn with_synthesis_output(self, output: impl Into<String>) -> Self {
        let output = output.into();
        self.with_synthesis_handler(move |_| Ok(output.clone()))
    }

    /// Fail the next `count` calls with errors built by `make`.
    pub fn fail_next<F>(self, count: usize, make: F) -> Self
    where
        F: Fn() -> ModelError,
    {
        self.failures
            .lock()
            .unwrap()
            .extend((0..count).map(|_| make()));
        self
    }

    /// Delay every call.
    pub fn with_delay(self, delay: Duration) -> Self {
        *self.delay.write().unwrap() = Some(delay);
        self
    }

    /// Delay calls whose input contains `marker`.
    pub fn with_delay_for(self, marker: impl Into<String>, delay: Duration) -> Self {
        self.delays_for.write().unwrap().push((marker.into(), delay));
        self
    }

    /// Get all calls made to this mock.
    pub fn calls(&self) -> Vec<MockModelCall> {
        self.calls.read().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }

    pub fn extraction_calls(&self) -> usize {
        self.count_kind(PromptKind::Extraction)
    }

    pub fn synthesis_calls(&self) -> usize {
        self.count_kind(PromptKind::Synthesis)
    }

    /// Clear call history.
    pub fn clear_calls(&self) {
        self.calls.write().unwrap().clear();
    }

    fn count_kind(&self, kind: PromptKind) -> usize {
        self.calls
            .read()
            .unwrap()
            .iter()
            .filter(|c| c.kind == kind)
            .count()
    }

    fn delay_for(&self, input: &str) -> Option<Duration> {
        let specific = self
            .delays_for
            .read()
            .unwrap()
            .iter()
            .find(|(marker, _)| input.contains(marker.as_str()))
            .map(|(_, d)| *d);
        specific.or(*self.delay.read().unwrap())
    }

    /// Deterministic stand-in for the synthesis call.
    fn default_synthesis(input: &str) -> ModelResult<String> {
        let records: Vec<ModuleRecord> = serde_json::from_str(input).map_err(|e| ModelError::Api {
            status: 400,
            message: e.to_string(),
        })?;
        serde_json::to_string(&consolidate(records)).map_err(|e| ModelError::Transport(e.to_string()))
    }
}

#[async_trait]
impl LanguageModel for MockModel {
    async fn complete(&self, prompt: &Prompt, max_output_tokens: u32) -> ModelResult<String> {
        let kind = if is_synthesis(prompt) {
            PromptKind::Synthesis
        } else {
            PromptKind::Extraction
        };
        self.calls.write().unwrap().push(MockModelCall {
            kind,
            input: prompt.user.clone(),
            max_output_tokens,
        });

        if let Some(delay) = self.delay_for(&prompt.user) {
            tokio::time::sleep(delay).await;
        }

        let failure = self.failures.lock().unwrap().pop_front();
        if let Some(error) = failure {
            return Err(error);
        }

        let handler = match kind {
            PromptKind::Extraction => self.extraction_handler.read().unwrap().clone(),
            PromptKind::Synthesis => self.synthesis_handler.read().unwrap().clone(),
        };

        match (handler, kind) {
            (Some(handler), _) => handler(&prompt.user),
            (None, PromptKind::Extraction) => Ok("[]".to_string()),
            (None, PromptKind::Synthesis) => Self::default_synthesis(&prompt.user),
        }
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}

#[derive(Clone)]
enum MockResponse {
    Page { status: u16, body: String },
    Redirect(String),
    Error(String),
}

/// A mock fetcher serving an in-memory site.
///
/// Unknown URLs answer 404. URLs are matched after normalization, so
/// `https://a.test/x/` and `https://a.test/x#top` hit the same entry.
#[derive(Clone, Default)]
pub struct MockFetcher {
    responses: Arc<RwLock<HashMap<String, MockResponse>>>,
    delays: Arc<RwLock<HashMap<String, Duration>>>,

    /// Requested URLs, in call order
    calls: Arc<RwLock<Vec<String>>>,
}

const MAX_MOCK_REDIRECTS: usize = 10;

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `html` with status 200.
    pub fn with_page(self, url: &str, html: impl Into<String>) -> Self {
        self.insert(
            url,
            MockResponse::Page {
                status: 200,
                body: html.into(),
            },
        )
    }

    /// Answer with a bare status code.
    pub fn with_status(self, url: &str, status: u16) -> Self {
        self.insert(
            url,
            MockResponse::Page {
                status,
                body: String::new(),
            },
        )
    }

    /// Redirect `from` to `to`; the response carries `to` as its final URL.
    pub fn with_redirect(self, from: &str, to: &str) -> Self {
        self.insert(from, MockResponse::Redirect(to.to_string()))
    }

    /// Fail with a transport error.
    pub fn with_error(self, url: &str, message: impl Into<String>) -> Self {
        self.insert(url, MockResponse::Error(message.into()))
    }

    /// Delay responses for `url`.
    pub fn with_delay(self, url: &str, delay: Duration) -> Self {
        self.delays.write().unwrap().insert(key(url), delay);
        self
    }

    /// Get all requested URLs.
    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }

    pub fn was_fetched(&self, url: &str) -> bool {
        let wanted = key(url);
        self.calls.read().unwrap().iter().any(|c| key(c) == wanted)
    }

    /// How many times `url` was requested.
    pub fn fetches_of(&self, url: &str) -> usize {
        let wanted = key(url);
        self.calls
            .read()
            .unwrap()
            .iter()
            .filter(|c| key(c) == wanted)
            .count()
    }

    fn insert(self, url: &str, response: MockResponse) -> Self {
        self.responses.write().unwrap().insert(key(url), response);
        self
    }
}

fn key(url: &str) -> String {
    Url::parse(url)
        .map(|u| normalize_url(&u).to_string())
        .unwrap_or_else(|_| url.to_string())
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &Url) -> CrawlResult<FetchResponse> {
        self.calls.write().unwrap().push(url.to_string());

        let delay = self.delays.read().unwrap().get(&key(url.as_str())).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut current = url.clone();
        for _ in 0..MAX_MOCK_REDIRECTS {
            let response = self
                .responses
                .read()
                .unwrap()
                .get(&key(current.as_str()))
                .cloned();

            match response {
                Some(MockResponse::Redirect(target)) => {
                    current = Url::parse(&target).map_err(|_| CrawlError::InvalidUrl { url: target })?;
                }
                Some(MockResponse::Page { status, body }) => {
                    return Ok(FetchResponse {
                        status,
                        body,
                        headers: HashMap::from([(
                            "content-type".to_string(),
                            "text/html; charset=utf-8".to_string(),
                        )]),
                        final_url: current,
                    });
                }
                Some(MockResponse::Error(message)) => {
                    return Err(CrawlError::Transport(message.into()));
                }
                None => {
                    return Ok(FetchResponse {
                        status: 404,
                        body: String::new(),
                        headers: HashMap::new(),
                        final_url: current,
                    });
                }
            }
        }

        Err(CrawlError::Transport(
            format!("too many redirects from {}", url).into(),
        ))
    }

    fn name(&self) -> &str {
        "mock"
    }
}
