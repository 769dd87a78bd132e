//! Page types - fetched pages and fetch failures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A successfully fetched page.
///
/// Created by the crawler and consumed by the preprocessor; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRecord {
    /// Normalized absolute URL (unique within a crawl)
    pub url: String,

    /// Raw HTML
    pub html: String,

    /// Link distance from the root page
    pub depth: usize,

    /// When the page was fetched
    pub fetched_at: DateTime<Utc>,
}

impl PageRecord {
    /// Create a new page record fetched now.
    pub fn new(url: impl Into<String>, html: impl Into<String>, depth: usize) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
            depth,
            fetched_at: Utc::now(),
        }
    }
}

/// A page that could not be fetched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchFailure {
    pub url: String,
    pub depth: usize,
    pub reason: String,
}

/// Outcome of one crawl.
#[derive(Debug, Clone, Default)]
pub struct CrawlReport {
    /// Pages in the order they were fetched
    pub pages: Vec<PageRecord>,

    /// Pages that were attempted but unavailable
    pub failures: Vec<FetchFailure>,

    /// Number of distinct URLs admitted to the frontier
    pub discovered: usize,

    /// The crawl stopped early (cancellation or time budget)
    pub interrupted: bool,
}

impl CrawlReport {
    /// Whether any page was fetched.
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}
