//! Corpus and chunk types.

use serde::{Deserialize, Serialize};

/// Prefix of the line that separates pages inside the corpus and chunks.
pub const PAGE_MARKER_PREFIX: &str = "=== Page: ";

/// Suffix of the page-boundary line.
pub const PAGE_MARKER_SUFFIX: &str = " ===";

/// Render the page-boundary line for a source URL.
pub fn page_marker(url: &str) -> String {
    format!("{}{}{}", PAGE_MARKER_PREFIX, url, PAGE_MARKER_SUFFIX)
}

/// Text extracted from one crawled page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusSegment {
    pub source_url: String,
    pub text: String,
}

/// All pages' text in crawl order.
///
/// Only pages with non-empty extracted text have a segment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Corpus {
    segments: Vec<CorpusSegment>,
}

impl Corpus {
    /// Build from segments, dropping blank ones.
    pub fn new(segments: impl IntoIterator<Item = CorpusSegment>) -> Self {
        Self {
            segments: segments
                .into_iter()
                .filter(|s| !s.text.trim().is_empty())
                .collect(),
        }
    }

    pub fn segments(&self) -> &[CorpusSegment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Total characters of page text (markers excluded).
    pub fn char_count(&self) -> usize {
        self.segments.iter().map(|s| s.text.chars().count()).sum()
    }

    /// The whole corpus as one string with page-boundary markers.
    pub fn render(&self) -> String {
        self.segments
            .iter()
            .map(|s| format!("{}\n{}", page_marker(&s.source_url), s.text))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// A size-bounded slice of the corpus sent to the model in Pass 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Sequence number, starting at 0
    pub index: usize,

    /// Chunk text including page-boundary markers
    pub text: String,

    /// Pages contributing to this chunk, in order
    pub sources: Vec<String>,
}

impl Chunk {
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}
