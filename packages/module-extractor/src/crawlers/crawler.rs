//! Breadth-first crawler over a documentation site.
//!
//! Up to `concurrency` fetches are in flight at once, taken from the head
//! of the frontier. Results are processed in dequeue order, so page order
//! and frontier expansion stay deterministic regardless of which fetch
//! finishes first. Only this task ever touches the frontier.

use std::collections::{BTreeMap, VecDeque};

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::classifier::{LinkClassifier, Verdict};
use super::frontier::Frontier;
use super::links::{extract_links, normalize_url};
use crate::error::{CrawlError, CrawlResult};
use crate::traits::fetcher::{FetchResponse, Fetcher};
use crate::types::config::CrawlConfig;
use crate::types::page::{CrawlReport, FetchFailure, PageRecord};

/// Site crawler.
pub struct Crawler<F: Fetcher> {
    fetcher: F,
    config: CrawlConfig,
    classifier: LinkClassifier,
}

/// Mutable state of one crawl.
struct CrawlState {
    frontier: Frontier,
    report: CrawlReport,
    scope: Url,
    scope_resolved: bool,
}

impl<F: Fetcher> Crawler<F> {
    pub fn new(fetcher: F, config: CrawlConfig) -> Self {
        let classifier = LinkClassifier::new(config.classifier.clone());
        Self {
            fetcher,
            config,
            classifier,
        }
    }

    /// Crawl from `root` until the frontier empties, `max_pages` pages
    /// are fetched, the time budget runs out, or `cancel` fires.
    ///
    /// Never fails: unavailable pages are recorded in the report. When
    /// interrupted, every fetch that already completed is kept.
    #[instrument(skip(self, cancel), fields(root = %root, fetcher = self.fetcher.name()))]
    pub async fn crawl(&self, root: &Url, cancel: &CancellationToken) -> CrawlReport {
        let deadline = Instant::now() + self.config.time_budget;
        let max_pages = self.config.max_pages;
        let concurrency = self.config.concurrency.max(1);

        let mut state = CrawlState {
            frontier: Frontier::new(root, self.config.max_depth),
            report: CrawlReport::default(),
            scope: root.clone(),
            scope_resolved: false,
        };

        // Dispatched entries not yet processed, in dequeue order
        let mut pending: VecDeque<usize> = VecDeque::new();
        // Completed fetches waiting for an earlier entry to finish
        let mut ready: BTreeMap<usize, CrawlResult<FetchResponse>> = BTreeMap::new();
        let mut in_flight = FuturesUnordered::new();

        info!(
            max_pages,
            max_depth = self.config.max_depth,
            concurrency,
            "Starting crawl"
        );

        loop {
            if cancel.is_cancelled() {
                info!("Crawl cancelled");
                state.report.interrupted = true;
                break;
            }
            if Instant::now() >= deadline {
                warn!(budget = ?self.config.time_budget, "Crawl time budget exhausted");
                state.report.interrupted = true;
                break;
            }

            while in_flight.len() < concurrency && state.report.pages.len() + pending.len() < max_pages {
                let Some(index) = state.frontier.next() else {
                    break;
                };
                let url = state.frontier.entry(index).url.clone();
                let fetcher = &self.fetcher;
                pending.push_back(index);
                in_flight.push(async move {
                    let result = fetcher.fetch(&url).await;
                    (index, result)
                });
            }

            if pending.is_empty() {
                break;
            }
            debug!(
                in_flight = in_flight.len(),
                waiting = ready.len(),
                queued = state.frontier.pending(),
                "Fetching"
            );

            let (index, result) = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(in_flight = in_flight.len(), "Crawl cancelled during fetch");
                    state.report.interrupted = true;
                    break;
                }
                _ = tokio::time::sleep_until(deadline) => {
                    warn!(budget = ?self.config.time_budget, in_flight = in_flight.len(), "Crawl time budget exhausted during fetch");
                    state.report.interrupted = true;
                    break;
                }
                Some(done) = in_flight.next() => done,
            };
            ready.insert(index, result);

            while let Some(result) = pending.front().and_then(|head| ready.remove(head)) {
                if let Some(index) = pending.pop_front() {
                    self.process(&mut state, index, result, true);
                }
            }
        }

        // Fetches that finished behind a slower one when the crawl stopped
        for index in pending {
            if let Some(result) = ready.remove(&index) {
                self.process(&mut state, index, result, false);
            }
        }

        let mut report = state.report;
        report.discovered = state.frontier.discovered();
        info!(
            pages = report.pages.len(),
            failures = report.failures.len(),
            discovered = report.discovered,
            interrupted = report.interrupted,
            "Crawl finished"
        );
        report
    }

    /// Record one fetch result and, when `expand` is set, admit the
    /// page's links.
    fn process(
        &self,
        state: &mut CrawlState,
        index: usize,
        result: CrawlResult<FetchResponse>,
        expand: bool,
    ) {
        let entry = state.frontier.entry(index).clone();

        let response = match result {
            Ok(response) if response.is_success() => response,
            Ok(response) => {
                let e = CrawlError::Http {
                    url: entry.url.to_string(),
                    status: response.status,
                };
                record_failure(&mut state.report, &entry.url, entry.depth, e);
                return;
            }
            Err(e) => {
                record_failure(&mut state.report, &entry.url, entry.depth, e);
                return;
            }
        };

        let final_url = normalize_url(&response.final_url);

        // The root may redirect (example.com -> www.example.com); the
        // resolved host becomes the scope for the rest of the crawl.
        if entry.source.is_none() && !state.scope_resolved {
            if final_url.host_str() != state.scope.host_str() {
                info!(original = %state.scope, resolved = %final_url, "Root URL resolved after redirect");
            }
            state.scope = final_url.clone();
            state.scope_resolved = true;
        } else if !self.classifier.is_in_scope(&final_url, &state.scope) {
            let e = CrawlError::OffSite {
                url: entry.url.to_string(),
                target: final_url.to_string(),
            };
            record_failure(&mut state.report, &entry.url, entry.depth, e);
            return;
        }

        if final_url != entry.url && !state.frontier.mark_visited(&final_url) {
            debug!(url = %entry.url, target = %final_url, "Redirect target already visited");
            return;
        }

        if expand && entry.depth < self.config.max_depth {
            let admitted = self.expand(
                &mut state.frontier,
                index,
                &response.body,
                &response.final_url,
                &state.scope,
            );
            debug!(url = %final_url, depth = entry.depth, admitted, "Expanded frontier");
        }

        debug!(url = %final_url, depth = entry.depth, bytes = response.body.len(), "Page fetched");
        state
            .report
            .pages
            .push(PageRecord::new(final_url.to_string(), response.body, entry.depth));
    }

    /// Classify the page's links and admit accepted ones. Returns the
    /// number of newly admitted URLs.
    fn expand(
        &self,
        frontier: &mut Frontier,
        source: usize,
        html: &str,
        page_url: &Url,
        scope: &Url,
    ) -> usize {
        let links = extract_links(html, page_url);
        let total = links.len();
        let mut admitted = 0;

        for link in links {
            match self
                .classifier
                .classify(&link.url, &link.anchor_text, Some(page_url), scope)
            {
                Verdict::Accept => {
                    if frontier.admit(&link.url, source).is_ok() {
                        admitted += 1;
                    }
                }
                Verdict::Reject(reason) => {
                    debug!(link = %link.url, %reason, "Link rejected");
                }
            }
        }

        debug!(url = %page_url, total, admitted, "Heuristic link filtering");
        admitted
    }
}

fn record_failure(report: &mut CrawlReport, url: &Url, depth: usize, error: CrawlError) {
    warn!(url = %url, depth, error = %error, "Page unavailable");
    report.failures.push(FetchFailure {
        url: url.to_string(),
        depth,
        reason: error.to_string(),
    });
}
