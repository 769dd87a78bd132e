//! Corpus assembly.

use tracing::debug;

use super::html::extract_text;
use crate::types::corpus::{Corpus, CorpusSegment};
use crate::types::page::PageRecord;

/// Build the corpus from crawled pages, in crawl order.
///
/// Pages whose extraction is empty contribute no segment.
pub fn build_corpus(pages: &[PageRecord]) -> Corpus {
    let segments = pages.iter().filter_map(|page| {
        let text = extract_text(&page.html);
        if text.is_empty() {
            debug!(url = %page.url, "Page yielded no content");
            return None;
        }
        debug!(url = %page.url, chars = text.len(), "Page text extracted");
        Some(CorpusSegment {
            source_url: page.url.clone(),
            text,
        })
    });

    Corpus::new(segments)
}
