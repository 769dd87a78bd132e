use anyhow::{Context, Result};
use dotenvy::dotenv;
use module_extractor::SecretString;
use std::env;
use std::str::FromStr;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: SecretString,
    pub openai_model: Option<String>,
    pub openai_base_url: Option<String>,
    pub max_pages: Option<usize>,
    pub max_depth: Option<usize>,
    pub concurrency: Option<usize>,
    pub requests_per_second: Option<u32>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let openai_api_key = SecretString::new(
            env::var("OPENAI_API_KEY").context("OPENAI_API_KEY must be set")?,
        );
        if openai_api_key.is_empty() {
            anyhow::bail!("OPENAI_API_KEY must not be empty");
        }

        Ok(Self {
            openai_api_key,
            openai_model: env::var("OPENAI_MODEL").ok(),
            openai_base_url: env::var("OPENAI_BASE_URL").ok(),
            max_pages: parse_var("EXTRACTOR_MAX_PAGES")?,
            max_depth: parse_var("EXTRACTOR_MAX_DEPTH")?,
            concurrency: parse_var("EXTRACTOR_CONCURRENCY")?,
            requests_per_second: parse_var("EXTRACTOR_REQUESTS_PER_SECOND")?,
        })
    }
}

fn parse_var<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("{} must be a valid number", name)),
        _ => Ok(None),
    }
}
