//! End-to-end tests for the extraction pipeline.
//!
//! These tests run the full flow against an in-memory site and a scripted
//! model:
//! 1. Crawl with link classification
//! 2. Build the corpus and chunk it
//! 3. Pass 1 per chunk
//! 4. Pass 2 or fallback

use std::time::Duration;

use module_extractor::{
    build_corpus, chunk,
    testing::{MockFetcher, MockModel},
    CrawlConfig, Crawler, ExtractionError, ExtractorConfig, ModelError, ModuleRecord, PageRecord,
    Pipeline, PipelineConfig, SynthesisConfig, SynthesisOutcome, Synthesizer,
};
use tokio_util::sync::CancellationToken;
use url::Url;

fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

/// Helper to build a documentation page with a main region and links.
fn doc_page(title: &str, body: &str, links: &[(&str, &str)]) -> String {
    let links: String = links
        .iter()
        .map(|(href, text)| format!(r#"<li><a href="{}">{}</a></li>"#, href, text))
        .collect();
    format!(
        r#"<html><head><title>{title}</title><script>track()</script></head>
        <body>
          <nav><ul>{links}</ul></nav>
          <main><h1>{title}</h1><p>{body}</p></main>
          <footer>Copyright</footer>
        </body></html>"#
    )
}

/// Extraction handler answering one module per page marker found in the chunk.
fn module_per_page(text: &str) -> Result<String, ModelError> {
    let records: Vec<ModuleRecord> = text
        .lines()
        .filter_map(|line| line.strip_prefix("# "))
        .map(|title| ModuleRecord::new(title.trim(), format!("About {}", title.trim())))
        .collect();
    Ok(serde_json::to_string(&records).unwrap())
}

fn fast_config() -> PipelineConfig {
    PipelineConfig::default().with_extractor(
        ExtractorConfig::default()
            .with_initial_backoff(Duration::from_millis(1))
            .with_max_retries(1),
    )
}

// =============================================================================
// End-to-end scenarios
// =============================================================================

#[tokio::test]
async fn test_single_page_site_is_synthesized() {
    let fetcher = MockFetcher::new().with_page(
        "https://docs.test/",
        doc_page("Billing", "Create invoices and manage payment methods.", &[]),
    );
    let model = MockModel::new().with_extraction_handler(module_per_page);
    let pipeline = Pipeline::new(fetcher.clone(), model.clone(), fast_config());

    let report = pipeline
        .run(&url("https://docs.test/"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.pages_fetched, 1);
    assert_eq!(report.corpus_segments, 1);
    assert!(report.result.synthesized);
    assert!(!report.result.records.is_empty());
    assert_eq!(report.result.records[0].module, "Billing");
    assert_eq!(model.synthesis_calls(), 1);
    assert_eq!(fetcher.fetch_count(), 1);

    let json = report.result.to_json_array().unwrap();
    assert_eq!(json[0]["module"], "Billing");
    assert!(json[0]["Description"].is_string());
    assert!(json[0]["Submodules"].is_object());
}

#[tokio::test]
async fn test_oversized_raw_list_is_returned_unsynthesized() {
    let fetcher = MockFetcher::new().with_page(
        "https://docs.test/",
        doc_page("Everything", "A very large product.", &[]),
    );
    let filler: Vec<ModuleRecord> = (0..10_000)
        .map(|i| {
            ModuleRecord::new(format!("Filler module {i:05}"), "Padding description text")
                .with_submodule("Detail", "More padding")
        })
        .collect();
    let filler_json = serde_json::to_string(&filler).unwrap();
    let model = MockModel::new().with_extraction_output(filler_json);
    let pipeline = Pipeline::new(fetcher, model.clone(), fast_config());

    let report = pipeline
        .run(&url("https://docs.test/"), &CancellationToken::new())
        .await
        .unwrap();

    assert!(!report.result.synthesized);
    assert_eq!(report.result.records, filler);
    assert!(matches!(
        report.synthesis,
        SynthesisOutcome::SkippedOverBudget { budget: 120_000, .. }
    ));
    assert_eq!(model.synthesis_calls(), 0);
}

#[tokio::test]
async fn test_case_variants_across_chunks_merge() {
    let fetcher = MockFetcher::new()
        .with_page(
            "https://docs.test/",
            doc_page(
                "Overview",
                "Start here.",
                &[("/invoices", "Invoices"), ("/payments", "Payments")],
            ),
        )
        .with_page(
            "https://docs.test/invoices",
            doc_page("Invoices", "Download and send invoices. invoices-marker", &[]),
        )
        .with_page(
            "https://docs.test/payments",
            doc_page("Payments", "Store cards and bank accounts. payments-marker", &[]),
        );

    let model = MockModel::new().with_extraction_handler(|text| {
        if text.contains("invoices-marker") {
            Ok(r#"[{"module": "Billing", "Description": "Invoices", "Submodules": {"Invoices": "Send invoices"}}]"#.to_string())
        } else if text.contains("payments-marker") {
            Ok(r#"[{"module": "billing", "Description": "Payments", "Submodules": {"Cards": "Store cards"}}]"#.to_string())
        } else {
            Ok("[]".to_string())
        }
    });

    // Small chunks so every page lands in its own chunk
    let config = fast_config().with_extractor(
        ExtractorConfig::default()
            .with_max_chunk_chars(120)
            .with_initial_backoff(Duration::from_millis(1)),
    );
    let pipeline = Pipeline::new(fetcher, model.clone(), config);

    let report = pipeline
        .run(&url("https://docs.test/"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.pages_fetched, 3);
    assert!(report.chunks >= 3);
    assert_eq!(report.raw_records, 2);
    assert!(report.result.synthesized);

    let billing: Vec<_> = report
        .result
        .records
        .iter()
        .filter(|r| r.module.eq_ignore_ascii_case("billing"))
        .collect();
    assert_eq!(billing.len(), 1);
    assert!(billing[0].submodules.contains_key("Invoices"));
    assert!(billing[0].submodules.contains_key("Cards"));
}

// =============================================================================
// Crawl safety
// =============================================================================

#[tokio::test]
async fn test_rejected_links_are_never_fetched() {
    let fetcher = MockFetcher::new()
        .with_page(
            "https://docs.test/",
            doc_page(
                "Home",
                "Welcome.",
                &[
                    ("/guide", "Guide"),
                    ("https://elsewhere.test/guide", "Partner guide"),
                    ("/login", "Log in"),
                    ("/files/manual.pdf", "Manual"),
                    ("mailto:help@docs.test", "Email us"),
                    ("https://twitter.com/share?url=x", "Share"),
                ],
            ),
        )
        .with_page("https://docs.test/guide", doc_page("Guide", "Steps.", &[]))
        .with_page("https://elsewhere.test/guide", doc_page("Other", "Other.", &[]));

    let crawler = Crawler::new(fetcher.clone(), CrawlConfig::default());
    let report = crawler
        .crawl(&url("https://docs.test/"), &CancellationToken::new())
        .await;

    assert_eq!(report.pages.len(), 2);
    assert!(fetcher.was_fetched("https://docs.test/guide"));
    assert!(!fetcher.was_fetched("https://elsewhere.test/guide"));
    assert!(!fetcher.was_fetched("https://docs.test/login"));
    assert!(!fetcher.was_fetched("https://docs.test/files/manual.pdf"));
    assert_eq!(fetcher.fetch_count(), 2);
}

#[tokio::test]
async fn test_cycles_fetch_each_page_once() {
    let fetcher = MockFetcher::new()
        .with_page(
            "https://docs.test/",
            doc_page("Home", "Root.", &[("/a", "A"), ("/b", "B"), ("/#top", "Top")]),
        )
        .with_page(
            "https://docs.test/a",
            doc_page("A", "Page A.", &[("/", "Home"), ("/b", "B"), ("/a#section", "Section")]),
        )
        .with_page(
            "https://docs.test/b",
            doc_page("B", "Page B.", &[("/a", "A"), ("/", "Home")]),
        );

    let crawler = Crawler::new(fetcher.clone(), CrawlConfig::default().with_max_depth(5));
    let report = crawler
        .crawl(&url("https://docs.test/"), &CancellationToken::new())
        .await;

    assert_eq!(report.pages.len(), 3);
    assert_eq!(fetcher.fetches_of("https://docs.test/"), 1);
    assert_eq!(fetcher.fetches_of("https://docs.test/a"), 1);
    assert_eq!(fetcher.fetches_of("https://docs.test/b"), 1);
    assert_eq!(fetcher.fetch_count(), 3);
}

#[tokio::test]
async fn test_fetch_failures_do_not_abort_the_run() {
    let fetcher = MockFetcher::new()
        .with_page(
            "https://docs.test/",
            doc_page("Home", "Root.", &[("/gone", "Gone"), ("/broken", "Broken"), ("/ok", "Ok")]),
        )
        .with_status("https://docs.test/gone", 410)
        .with_error("https://docs.test/broken", "connection reset")
        .with_page("https://docs.test/ok", doc_page("Ok", "Fine.", &[]));

    let model = MockModel::new().with_extraction_handler(module_per_page);
    let pipeline = Pipeline::new(fetcher, model, fast_config());

    let report = pipeline
        .run(&url("https://docs.test/"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.pages_fetched, 2);
    assert_eq!(report.fetch_failures, 2);
    assert!(report.result.synthesized);
}

// =============================================================================
// Preprocessing and chunking
// =============================================================================

#[test]
fn test_corpus_follows_fetch_order() {
    let pages = vec![
        PageRecord::new("https://docs.test/z", "<main><p>Zed</p></main>", 1),
        PageRecord::new("https://docs.test/empty", "<script>x()</script>", 1),
        PageRecord::new("https://docs.test/a", "<main><p>Ay</p></main>", 1),
    ];

    let corpus = build_corpus(&pages);
    let sources: Vec<_> = corpus.segments().iter().map(|s| s.source_url.as_str()).collect();

    assert_eq!(sources, vec!["https://docs.test/z", "https://docs.test/a"]);
}

#[test]
fn test_chunking_is_restartable() {
    let pages: Vec<PageRecord> = (0..20)
        .map(|i| {
            PageRecord::new(
                format!("https://docs.test/{i}"),
                format!("<main><h2>Topic {i}</h2><p>{}</p></main>", "word ".repeat(40 + i)),
                1,
            )
        })
        .collect();
    let corpus = build_corpus(&pages);

    let first: Vec<_> = chunk(&corpus, 500).collect();
    let second: Vec<_> = chunk(&corpus, 500).collect();

    assert_eq!(first, second);
    assert!(first.len() > 1);
    assert!(first.iter().all(|c| c.text.chars().count() <= 500));
}

// =============================================================================
// Degradation
// =============================================================================

#[tokio::test]
async fn test_unparsable_chunk_contributes_nothing() {
    let fetcher = MockFetcher::new()
        .with_page(
            "https://docs.test/",
            doc_page("Home", "Root. good-marker", &[("/bad", "Bad")]),
        )
        .with_page("https://docs.test/bad", doc_page("Bad", "bad-marker", &[]));

    let model = MockModel::new().with_extraction_handler(|text| {
        if text.contains("bad-marker") {
            Ok("I could not find any modules, sorry!".to_string())
        } else {
            Ok(r#"```json
[{"module": "Home", "Description": "Root page",},]
```"#
                .to_string())
        }
    });
    let config = fast_config().with_extractor(
        ExtractorConfig::default()
            .with_max_chunk_chars(100)
            .with_initial_backoff(Duration::from_millis(1)),
    );
    let pipeline = Pipeline::new(fetcher, model, config);

    let report = pipeline
        .run(&url("https://docs.test/"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.soft_failures, 1);
    assert_eq!(report.raw_records, 1);
    assert_eq!(report.result.records[0].module, "Home");
}

#[tokio::test]
async fn test_synthesis_failure_falls_back_to_raw_list() {
    let fetcher = MockFetcher::new().with_page(
        "https://docs.test/",
        doc_page("Search", "Find anything.", &[]),
    );
    let model = MockModel::new()
        .with_extraction_handler(module_per_page)
        .with_synthesis_handler(|_| Err(ModelError::RateLimited { retry_after: None }));
    let pipeline = Pipeline::new(fetcher, model.clone(), fast_config());

    let report = pipeline
        .run(&url("https://docs.test/"), &CancellationToken::new())
        .await
        .unwrap();

    assert!(!report.result.synthesized);
    assert!(matches!(report.synthesis, SynthesisOutcome::CallFailed { .. }));
    assert_eq!(report.result.records, vec![ModuleRecord::new("Search", "About Search")]);
    // Pass 2 is single-shot
    assert_eq!(model.synthesis_calls(), 1);
}

#[tokio::test]
async fn test_synthesizer_fallback_keeps_records_identical() {
    let raw: Vec<ModuleRecord> = (0..10_000)
        .map(|i| ModuleRecord::new(format!("Module {i}"), "x".repeat(50)))
        .collect();
    let model = MockModel::new();
    let synthesizer = Synthesizer::new(model.clone(), SynthesisConfig::default());

    let (result, outcome) = synthesizer.synthesize(raw.clone()).await;

    assert!(!result.synthesized);
    assert_eq!(result.records, raw);
    assert!(matches!(outcome, SynthesisOutcome::SkippedOverBudget { .. }));
    assert_eq!(model.call_count(), 0);
}

// =============================================================================
// Cancellation and fatal errors
// =============================================================================

#[tokio::test]
async fn test_cancel_during_pass_one_keeps_finished_chunks() {
    let fetcher = MockFetcher::new()
        .with_page(
            "https://docs.test/",
            doc_page("Fast", "fast-marker", &[("/slow", "Slow")]),
        )
        .with_page("https://docs.test/slow", doc_page("Slow", "slow-marker", &[]));

    let model = MockModel::new()
        .with_extraction_handler(module_per_page)
        .with_delay_for("slow-marker", Duration::from_secs(5));
    let config = fast_config().with_extractor(
        ExtractorConfig::default()
            .with_max_chunk_chars(100)
            .with_concurrency(2),
    );
    let pipeline = Pipeline::new(fetcher, model, config);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let report = pipeline.run(&url("https://docs.test/"), &cancel).await.unwrap();

    assert!(report.cancelled);
    let names: Vec<_> = report.result.records.iter().map(|r| r.module.as_str()).collect();
    assert_eq!(names, vec!["Fast"]);
}

#[tokio::test]
async fn test_unreachable_root_is_fatal() {
    let fetcher = MockFetcher::new().with_error("https://docs.test/", "dns failure");
    let pipeline = Pipeline::new(fetcher, MockModel::new(), fast_config());

    let err = pipeline
        .run(&url("https://docs.test/"), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ExtractionError::NoPages { .. }));
}

#[tokio::test]
async fn test_batch_concatenates_sites_in_order() {
    let fetcher = MockFetcher::new()
        .with_page("https://one.test/", doc_page("Alpha", "First site.", &[]))
        .with_page("https://two.test/", doc_page("Beta", "Second site.", &[]));
    let model = MockModel::new().with_extraction_handler(module_per_page);
    let pipeline = Pipeline::new(fetcher, model, fast_config());

    let batch = pipeline
        .run_batch(
            &[url("https://one.test/"), url("https://two.test/"), url("https://three.test/")],
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let names: Vec<_> = batch.result.records.iter().map(|r| r.module.as_str()).collect();
    assert_eq!(names, vec!["Alpha", "Beta"]);
    assert!(batch.result.synthesized);
    assert_eq!(batch.failures.len(), 1);
}

#[tokio::test]
async fn test_read_the_docs_site_yields_modules() {
    let page = |title: &str, body: &str, links: &str| {
        format!(
            r#"<html class="writer-html5"><body class="wy-body-for-nav">
            <div class="wy-grid-for-nav">
              <nav class="wy-nav-side"><ul>{links}</ul></nav>
              <section class="wy-nav-content-wrap"><div class="wy-nav-content">
                <div role="main" class="document"><h1>{title}</h1><p>{body}</p></div>
              </div></section>
            </div></body></html>"#
        )
    };
    let fetcher = MockFetcher::new()
        .with_page(
            "https://docs.test/",
            page("Overview", "Start here.", r#"<li><a href="/reports">Reports</a></li>"#),
        )
        .with_page("https://docs.test/reports", page("Reports", "Export reports as CSV.", ""));
    let model = MockModel::new().with_extraction_handler(module_per_page);
    let pipeline = Pipeline::new(fetcher, model, fast_config());

    let report = pipeline
        .run(&url("https://docs.test/"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.corpus_segments, 2);
    let names: Vec<_> = report.result.records.iter().map(|r| r.module.as_str()).collect();
    assert_eq!(names, vec!["Overview", "Reports"]);
}
