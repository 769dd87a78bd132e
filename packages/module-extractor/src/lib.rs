//! Documentation Site Module Extraction Library
//!
//! Crawls a documentation website from its root URL and turns it into a
//! catalog of product "modules" and their submodules, as one JSON array.
//!
//! # Design Philosophy
//!
//! **"A fixed budget of model calls"**
//!
//! - Crawl scope is decided by link heuristics, never by the model
//! - One extraction call per size-bounded chunk (Pass 1)
//! - Exactly one synthesis call over the raw list (Pass 2)
//! - Degrade to the raw list instead of failing
//!
//! # Usage
//!
//! ```rust,ignore
//! use module_extractor::{Pipeline, PipelineConfig, HttpFetcher};
//! use module_extractor::ai::OpenAI;
//! use tokio_util::sync::CancellationToken;
//!
//! let pipeline = Pipeline::new(HttpFetcher::new()?, OpenAI::from_env()?, PipelineConfig::default());
//!
//! let root = validate_root_url("https://help.example.com/")?;
//! let report = pipeline.run(&root, &CancellationToken::new()).await?;
//!
//! println!("{}", serde_json::to_string_pretty(&report.result.records)?);
//! ```
//!
//! # Modules
//!
//! - [`traits`] - Collaborator abstractions (Fetcher, LanguageModel)
//! - [`types`] - Pages, corpus, module records, configuration
//! - [`crawlers`] - Link classifier, breadth-first crawler, HTTP fetcher
//! - [`preprocess`] - HTML to text and corpus building
//! - [`pipeline`] - Chunking, Pass 1, Pass 2 and the end-to-end runner
//! - [`security`] - Root URL validation and credential handling
//! - [`testing`] - Mock implementations for testing

pub mod crawlers;
pub mod error;
pub mod pipeline;
pub mod preprocess;
pub mod security;
pub mod testing;
pub mod traits;
pub mod types;

#[cfg(feature = "openai")]
pub mod ai;

// Re-export core types at crate root
pub use error::{
    ChunkError, CrawlError, ExtractionError, ModelError, ParseError, Result, SecurityError,
};
pub use traits::{
    fetcher::{FetchResponse, Fetcher},
    model::{LanguageModel, Prompt},
};
pub use types::{
    config::{
        estimate_tokens, ClassifierConfig, CrawlConfig, DomainPolicy, ExtractorConfig,
        PipelineConfig, SynthesisConfig,
    },
    corpus::{Chunk, Corpus, CorpusSegment},
    module::{FinalModuleRecord, ModuleRecord, RawModuleRecord, SubmoduleValue, Submodules},
    page::{CrawlReport, FetchFailure, PageRecord},
    result::{BatchResult, ExtractionResult, PipelineReport, SiteFailure, SynthesisOutcome},
};

// Re-export pipeline components
pub use pipeline::{
    chunk, consolidate, parse_module_list, ChunkFailure, Extractor, Pipeline, RawExtraction,
    Synthesizer,
};

// Re-export crawlers
pub use crawlers::{
    Crawler, FetcherExt, HttpFetcher, LinkClassifier, RateLimitedFetcher, Verdict,
};

pub use preprocess::{build_corpus, extract_text};
pub use security::{parse_url_list, validate_root_url, SecretString, UrlList};
