//! End-to-end pipeline: crawl, preprocess, chunk, Pass 1, Pass 2.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use url::Url;

use super::chunker::chunk;
use super::extract::Extractor;
use super::synthesize::Synthesizer;
use crate::crawlers::Crawler;
use crate::error::{ExtractionError, Result};
use crate::preprocess::build_corpus;
use crate::security::validate_root_url;
use crate::traits::{fetcher::Fetcher, model::LanguageModel};
use crate::types::config::PipelineConfig;
use crate::types::result::{BatchResult, ExtractionResult, PipelineReport, SiteFailure};

/// The module extraction pipeline.
///
/// # Example
///
/// ```rust,ignore
/// use module_extractor::{HttpFetcher, Pipeline, PipelineConfig};
/// use module_extractor::ai::OpenAI;
///
/// let pipeline = Pipeline::new(HttpFetcher::new()?, OpenAI::from_env()?, PipelineConfig::default());
/// let report = pipeline.run(&root, &CancellationToken::new()).await?;
/// println!("{}", report.result.to_json_array()?);
/// ```
pub struct Pipeline<F: Fetcher, M: LanguageModel> {
    crawler: Crawler<F>,
    extractor: Extractor<Arc<M>>,
    synthesizer: Synthesizer<Arc<M>>,
}

impl<F: Fetcher, M: LanguageModel> Pipeline<F, M> {
    pub fn new(fetcher: F, model: M, config: PipelineConfig) -> Self {
        let model = Arc::new(model);
        Self {
            crawler: Crawler::new(fetcher, config.crawl),
            extractor: Extractor::new(model.clone(), config.extractor),
            synthesizer: Synthesizer::new(model, config.synthesis),
        }
    }

    /// Validate a user-supplied root URL, then [`run`](Self::run) it.
    pub async fn run_url(&self, input: &str, cancel: &CancellationToken) -> Result<PipelineReport> {
        let root = validate_root_url(input)?;
        self.run(&root, cancel).await
    }

    /// Run the whole pipeline for one root URL.
    ///
    /// Fails only when nothing usable was fetched. Everything after a
    /// non-empty corpus degrades instead of failing.
    #[instrument(skip(self, cancel), fields(root = %root, run_id = %uuid::Uuid::now_v7()))]
    pub async fn run(&self, root: &Url, cancel: &CancellationToken) -> Result<PipelineReport> {
        let crawl = self.crawler.crawl(root, cancel).await;
        if crawl.pages.is_empty() {
            warn!(failures = crawl.failures.len(), "No pages fetched");
            return Err(ExtractionError::NoPages {
                url: root.to_string(),
            });
        }

        let corpus = build_corpus(&crawl.pages);
        if corpus.is_empty() {
            warn!(pages = crawl.pages.len(), "Fetched pages yielded no text");
            return Err(ExtractionError::EmptyCorpus {
                url: root.to_string(),
            });
        }
        info!(
            segments = corpus.len(),
            chars = corpus.char_count(),
            "Corpus built"
        );

        let chunks = chunk(&corpus, self.extractor.config().max_chunk_chars);
        let raw = self.extractor.extract_all(chunks, cancel).await;
        let cancelled = cancel.is_cancelled();
        let raw_records = raw.records.len();

        let (result, synthesis) = self.synthesizer.synthesize(raw.records).await;

        let report = PipelineReport {
            root_url: root.to_string(),
            pages_fetched: crawl.pages.len(),
            fetch_failures: crawl.failures.len(),
            corpus_segments: corpus.len(),
            chunks: raw.chunks,
            raw_records,
            soft_failures: raw.soft_failures.len(),
            cancelled,
            synthesis,
            result,
        };

        info!(
            pages = report.pages_fetched,
            fetch_failures = report.fetch_failures,
            chunks = report.chunks,
            soft_failures = report.soft_failures,
            modules = report.result.records.len(),
            synthesized = report.result.synthesized,
            cancelled = report.cancelled,
            "Run finished"
        );

        Ok(report)
    }

    /// Run every root URL in turn and concatenate the results.
    ///
    /// Sites that fail are reported and skipped. The batch fails only when
    /// no site produced a result.
    #[instrument(skip_all, fields(sites = roots.len()))]
    pub async fn run_batch(&self, roots: &[Url], cancel: &CancellationToken) -> Result<BatchResult> {
        let mut reports = Vec::new();
        let mut failures = Vec::new();
        let mut first_error = None;

        for root in roots {
            if cancel.is_cancelled() {
                info!(remaining = roots.len() - reports.len() - failures.len(), "Batch cancelled");
                break;
            }
            match self.run(root, cancel).await {
                Ok(report) => reports.push(report),
                Err(e) => {
                    warn!(url = %root, error = %e, "Site failed");
                    failures.push(SiteFailure {
                        url: root.to_string(),
                        reason: e.to_string(),
                    });
                    first_error.get_or_insert(e);
                }
            }
        }

        if reports.is_empty() {
            return Err(first_error
                .unwrap_or_else(|| ExtractionError::Config("no root URLs to process".into())));
        }

        let synthesized = reports.iter().all(|r| r.result.synthesized);
        let records = reports
            .iter()
            .flat_map(|r| r.result.records.iter().cloned())
            .collect();
        let result = ExtractionResult {
            records,
            synthesized,
        };

        info!(
            succeeded = reports.len(),
            failed = failures.len(),
            modules = result.records.len(),
            synthesized,
            "Batch finished"
        );

        Ok(BatchResult {
            result,
            reports,
            failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockFetcher, MockModel};
    use crate::types::result::SynthesisOutcome;

    const PAGE: &str = r#"<html><body><main>
        <h1>Billing</h1><p>Manage invoices and payment methods.</p>
    </main></body></html>"#;

    fn model() -> MockModel {
        MockModel::new().with_extraction_output(
            r#"[{"module": "Billing", "Description": "Invoices and payments", "Submodules": {}}]"#,
        )
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_run_single_page() {
        let fetcher = MockFetcher::new().with_page("https://docs.test/", PAGE);
        let pipeline = Pipeline::new(fetcher, model(), PipelineConfig::default());

        let report = pipeline
            .run(&url("https://docs.test/"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.pages_fetched, 1);
        assert_eq!(report.chunks, 1);
        assert!(report.result.synthesized);
        assert_eq!(report.synthesis, SynthesisOutcome::Merged);
        assert_eq!(report.result.records[0].module, "Billing");
    }

    #[tokio::test]
    async fn test_no_pages_is_fatal() {
        let pipeline = Pipeline::new(MockFetcher::new(), model(), PipelineConfig::default());

        let err = pipeline
            .run(&url("https://docs.test/"), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ExtractionError::NoPages { .. }));
    }

    #[tokio::test]
    async fn test_run_url_rejects_invalid_roots() {
        let fetcher = MockFetcher::new();
        let pipeline = Pipeline::new(fetcher.clone(), model(), PipelineConfig::default());

        let err = pipeline
            .run_url("ftp://files.test/docs", &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ExtractionError::InvalidUrl(_)));
        assert_eq!(fetcher.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_run_url_trims_input() {
        let fetcher = MockFetcher::new().with_page("https://docs.test/", PAGE);
        let pipeline = Pipeline::new(fetcher, model(), PipelineConfig::default());

        let report = pipeline
            .run_url("  https://docs.test/\n", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.root_url, "https://docs.test/");
    }

    #[tokio::test]
    async fn test_textless_pages_are_fatal() {
        let fetcher = MockFetcher::new()
            .with_page("https://docs.test/", "<html><body><script>app()</script></body></html>");
        let model = model();
        let pipeline = Pipeline::new(fetcher, model.clone(), PipelineConfig::default());

        let err = pipeline
            .run(&url("https://docs.test/"), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ExtractionError::EmptyCorpus { .. }));
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_batch_skips_failed_sites() {
        let fetcher = MockFetcher::new()
            .with_page("https://a.test/", PAGE)
            .with_page("https://c.test/", PAGE);
        let pipeline = Pipeline::new(fetcher, model(), PipelineConfig::default());

        let roots = vec![url("https://a.test/"), url("https://b.test/"), url("https://c.test/")];
        let batch = pipeline
            .run_batch(&roots, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(batch.reports.len(), 2);
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].url, "https://b.test/");
        assert_eq!(batch.result.records.len(), 2);
        assert!(batch.result.synthesized);
    }

    #[tokio::test]
    async fn test_batch_fails_when_every_site_fails() {
        let pipeline = Pipeline::new(MockFetcher::new(), model(), PipelineConfig::default());

        let err = pipeline
            .run_batch(&[url("https://a.test/")], &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ExtractionError::NoPages { .. }));
    }

    #[tokio::test]
    async fn test_empty_batch_is_a_config_error() {
        let pipeline = Pipeline::new(MockFetcher::new(), model(), PipelineConfig::default());

        let err = pipeline
            .run_batch(&[], &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ExtractionError::Config(_)));
    }
}
