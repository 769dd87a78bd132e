// Command-line entry point: URLs in, module catalog JSON out

mod config;

use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use module_extractor::{
    ai::OpenAI, parse_url_list, CrawlConfig, ExtractorConfig, Fetcher, FetcherExt, HttpFetcher,
    Pipeline, PipelineConfig,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

use crate::config::Config;

/// Extract a catalog of modules and submodules from documentation sites.
#[derive(Debug, Parser)]
#[command(name = "extract-modules", version)]
struct Args {
    /// Root URLs of documentation sites
    urls: Vec<String>,

    /// Read root URLs from a file, one per line
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Maximum pages fetched per site
    #[arg(long)]
    max_pages: Option<usize>,

    /// Maximum link depth from the root
    #[arg(long)]
    max_depth: Option<usize>,

    /// Concurrent fetches and model calls
    #[arg(long)]
    concurrency: Option<usize>,

    /// Fetch rate limit in requests per second
    #[arg(long)]
    rps: Option<u32>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,

    /// Print the full run report instead of only the module array
    #[arg(long)]
    report: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries only the JSON result
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,module_extractor=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = Config::from_env().context("Failed to load configuration")?;

    let roots = read_roots(&args)?;
    if roots.is_empty() {
        anyhow::bail!("no valid root URLs given");
    }
    tracing::info!(sites = roots.len(), "Root URLs loaded");

    let mut model = OpenAI::new(config.openai_api_key.clone());
    if let Some(name) = &config.openai_model {
        model = model.with_model(name);
    }
    if let Some(base_url) = &config.openai_base_url {
        model = model.with_base_url(base_url);
    }

    let pipeline_config = pipeline_config(&args, &config);
    let fetcher = HttpFetcher::new().context("Failed to build HTTP client")?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing with the results collected so far");
            on_signal.cancel();
        }
    });

    let output = match args.rps.or(config.requests_per_second) {
        Some(rps) => {
            run(fetcher.rate_limited(rps), model, pipeline_config, &roots, &cancel, args.report).await?
        }
        None => run(fetcher, model, pipeline_config, &roots, &cancel, args.report).await?,
    };

    let rendered = if args.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{}", rendered);

    Ok(())
}

async fn run<F: Fetcher>(
    fetcher: F,
    model: OpenAI,
    config: PipelineConfig,
    roots: &[Url],
    cancel: &CancellationToken,
    full_report: bool,
) -> Result<serde_json::Value> {
    let pipeline = Pipeline::new(fetcher, model, config);
    let batch = pipeline
        .run_batch(roots, cancel)
        .await
        .context("Extraction failed")?;

    for failure in &batch.failures {
        tracing::warn!(url = %failure.url, reason = %failure.reason, "Site skipped");
    }

    if full_report {
        Ok(serde_json::to_value(&batch)?)
    } else {
        Ok(batch.result.to_json_array()?)
    }
}

fn read_roots(args: &Args) -> Result<Vec<Url>> {
    let mut input = args.urls.join("\n");

    if let Some(path) = &args.file {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        input.push('\n');
        input.push_str(&contents);
    }

    if input.trim().is_empty() {
        std::io::stdin()
            .read_to_string(&mut input)
            .context("Failed to read URLs from stdin")?;
    }

    Ok(parse_url_list(&input).valid)
}

fn pipeline_config(args: &Args, config: &Config) -> PipelineConfig {
    let mut crawl = CrawlConfig::default();
    let mut extractor = ExtractorConfig::default();

    if let Some(max_pages) = args.max_pages.or(config.max_pages) {
        crawl = crawl.with_max_pages(max_pages);
    }
    if let Some(max_depth) = args.max_depth.or(config.max_depth) {
        crawl = crawl.with_max_depth(max_depth);
    }
    if let Some(concurrency) = args.concurrency.or(config.concurrency) {
        crawl = crawl.with_concurrency(concurrency);
        extractor = extractor.with_concurrency(concurrency);
    }

    PipelineConfig::new()
        .with_crawl(crawl)
        .with_extractor(extractor)
}
