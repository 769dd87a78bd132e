//! Configuration types for crawling, chunking and the two model passes.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Rough characters-per-token ratio used for all model budgets.
pub const CHARS_PER_TOKEN: usize = 4;

/// Estimate the token count of a text.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// How far the crawl may stray from the root host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainPolicy {
    /// Exact host match only
    #[default]
    SameHost,
    /// Any host under the same registrable domain (docs.x.com, help.x.com)
    SameRegistrableDomain,
}

/// Link classifier settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    pub domain_policy: DomainPolicy,

    /// File extensions that are followed even though they are usually downloads
    #[serde(default)]
    pub allowed_extensions: Vec<String>,

    /// Extra path segments to reject, on top of the built-in list
    #[serde(default)]
    pub extra_excluded_paths: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            domain_policy: DomainPolicy::SameHost,
            allowed_extensions: vec![],
            extra_excluded_paths: vec![],
        }
    }
}

impl ClassifierConfig {
    pub fn with_domain_policy(mut self, policy: DomainPolicy) -> Self {
        self.domain_policy = policy;
        self
    }

    /// Follow links ending in this extension (e.g. "pdf").
    pub fn allow_extension(mut self, ext: impl Into<String>) -> Self {
        self.allowed_extensions
            .push(ext.into().trim_start_matches('.').to_lowercase());
        self
    }

    /// Reject links with this path segment.
    pub fn exclude_path(mut self, segment: impl Into<String>) -> Self {
        self.extra_excluded_paths
            .push(segment.into().trim_matches('/').to_lowercase());
        self
    }
}

/// Configuration for one crawl.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Stop after this many successfully fetched pages
    pub max_pages: usize,

    /// Maximum link distance from the root (0 = root only)
    pub max_depth: usize,

    /// Concurrent fetches per frontier batch
    pub concurrency: usize,

    /// Wall-clock budget for the whole crawl
    #[serde(with = "duration_secs")]
    pub time_budget: Duration,

    pub classifier: ClassifierConfig,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_pages: 50,
            max_depth: 1,
            concurrency: 4,
            time_budget: Duration::from_secs(180),
            classifier: ClassifierConfig::default(),
        }
    }
}

impl CrawlConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = budget;
        self
    }

    pub fn with_classifier(mut self, classifier: ClassifierConfig) -> Self {
        self.classifier = classifier;
        self
    }
}

/// Pass 1 settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Chunk size ceiling in characters
    pub max_chunk_chars: usize,

    /// Concurrent chunk calls
    pub concurrency: usize,

    /// Retries after the first attempt, for retryable failures only
    pub max_retries: u32,

    /// First backoff delay; doubles on each retry
    #[serde(with = "duration_millis")]
    pub initial_backoff: Duration,

    /// Per-call timeout
    #[serde(with = "duration_secs")]
    pub call_timeout: Duration,

    pub max_output_tokens: u32,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: 48_000,
            concurrency: 4,
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
            call_timeout: Duration::from_secs(120),
            max_output_tokens: 4096,
        }
    }
}

impl ExtractorConfig {
    pub fn with_max_chunk_chars(mut self, chars: usize) -> Self {
        self.max_chunk_chars = chars;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Backoff before retry number `attempt` (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

/// Pass 2 settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisConfig {
    /// Largest serialized raw list (in estimated tokens) sent to the model
    pub input_budget_tokens: usize,

    /// Timeout for the single synthesis call
    #[serde(with = "duration_secs")]
    pub call_timeout: Duration,

    pub max_output_tokens: u32,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            input_budget_tokens: 120_000,
            call_timeout: Duration::from_secs(300),
            max_output_tokens: 16_384,
        }
    }
}

impl SynthesisConfig {
    pub fn with_input_budget_tokens(mut self, tokens: usize) -> Self {
        self.input_budget_tokens = tokens;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }
}

/// Configuration for a full pipeline run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub crawl: CrawlConfig,
    pub extractor: ExtractorConfig,
    pub synthesis: SynthesisConfig,
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_crawl(mut self, crawl: CrawlConfig) -> Self {
        self.crawl = crawl;
        self
    }

    pub fn with_extractor(mut self, extractor: ExtractorConfig) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_synthesis(mut self, synthesis: SynthesisConfig) -> Self {
        self.synthesis = synthesis;
        self
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
