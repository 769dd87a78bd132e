//! Crawl frontier: an append-only log of admitted URLs plus a FIFO of
//! indexes into it.
//!
//! Entries reference their source page by index, so the page graph holds
//! no reference cycles. The visited set is keyed by normalized URL string;
//! a URL is admitted at most once per crawl.

use std::collections::{HashSet, VecDeque};
use url::Url;

use super::links::normalize_url;

/// A URL admitted for fetching.
#[derive(Debug, Clone)]
pub struct FrontierEntry {
    /// Normalized URL
    pub url: Url,
    /// Index of the page this link was found on (None for the root)
    pub source: Option<usize>,
    pub depth: usize,
}

/// Why a URL was not admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmitError {
    AlreadyVisited,
    TooDeep,
}

#[derive(Debug)]
pub struct Frontier {
    log: Vec<FrontierEntry>,
    queue: VecDeque<usize>,
    visited: HashSet<String>,
    max_depth: usize,
}

impl Frontier {
    /// Create a frontier holding only the root at depth 0.
    pub fn new(root: &Url, max_depth: usize) -> Self {
        let mut frontier = Self {
            log: Vec::new(),
            queue: VecDeque::new(),
            visited: HashSet::new(),
            max_depth,
        };
        frontier.push(normalize_url(root), None, 0);
        frontier
    }

    /// Admit a link found on entry `source`, at the source's depth + 1.
    pub fn admit(&mut self, url: &Url, source: usize) -> Result<usize, AdmitError> {
        let depth = self.log[source].depth + 1;
        if depth > self.max_depth {
            return Err(AdmitError::TooDeep);
        }

        let normalized = normalize_url(url);
        if self.visited.contains(normalized.as_str()) {
            return Err(AdmitError::AlreadyVisited);
        }

        Ok(self.push(normalized, Some(source), depth))
    }

    /// Mark a URL as visited without queueing it (e.g. a redirect target).
    pub fn mark_visited(&mut self, url: &Url) -> bool {
        self.visited.insert(normalize_url(url).into())
    }

    /// Pop the next entry index in admission order.
    pub fn next(&mut self) -> Option<usize> {
        self.queue.pop_front()
    }

    pub fn entry(&self, index: usize) -> &FrontierEntry {
        &self.log[index]
    }

    /// Entries still waiting to be fetched.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Distinct URLs admitted so far.
    pub fn discovered(&self) -> usize {
        self.log.len()
    }

    fn push(&mut self, url: Url, source: Option<usize>, depth: usize) -> usize {
        let index = self.log.len();
        self.visited.insert(url.as_str().to_string());
        self.log.push(FrontierEntry { url, source, depth });
        self.queue.push_back(index);
        index
    }
}
