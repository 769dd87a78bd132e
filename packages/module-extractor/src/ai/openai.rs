//! OpenAI implementation of the LanguageModel trait.
//!
//! A reference implementation over the chat completions endpoint.
//!
//! # Example
//!
//! ```rust,ignore
//! use module_extractor::ai::OpenAI;
//!
//! let model = OpenAI::new("sk-...").with_model("gpt-4o");
//! let pipeline = Pipeline::new(fetcher, model, PipelineConfig::default());
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::RETRY_AFTER, Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ExtractionError, ModelError, ModelResult, Result};
use crate::security::SecretString;
use crate::traits::model::{LanguageModel, Prompt};

pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI chat model.
///
/// Uses gpt-4o at temperature 0 unless configured otherwise.
#[derive(Clone)]
pub struct OpenAI {
    client: Client,
    api_key: SecretString,
    model: String,
    base_url: String,
    temperature: f32,
}

impl OpenAI {
    /// Create a new OpenAI client with the given API key.
    pub fn new(api_key: impl Into<SecretString>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: 0.0,
        }
    }

    /// Create from environment variable `OPENAI_API_KEY`.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| ExtractionError::Config("OPENAI_API_KEY not set".into()))?;
        let api_key = SecretString::new(api_key);
        if api_key.is_empty() {
            return Err(ExtractionError::Config("OPENAI_API_KEY is empty".into()));
        }
        Ok(Self::new(api_key))
    }

    /// Set the chat model (default: gpt-4o).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set a custom base URL (for Azure, proxies, etc.).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Use a preconfigured HTTP client.
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Get the current model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn request(&self, prompt: &Prompt, max_output_tokens: u32) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: prompt.system.clone(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.user.clone(),
                },
            ],
            temperature: Some(self.temperature),
            max_tokens: Some(max_output_tokens),
        }
    }
}

#[async_trait]
impl LanguageModel for OpenAI {
    async fn complete(&self, prompt: &Prompt, max_output_tokens: u32) -> ModelResult<String> {
        debug!(model = %self.model, chars = prompt.char_count(), "Sending chat completion");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose())
            .json(&self.request(prompt, max_output_tokens))
            .send()
            .await
            .map_err(|e| ModelError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after(response.headers());
            let message = response.text().await.unwrap_or_default();
            return Err(status_error(status, retry_after, message));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| ModelError::Transport(e.to_string()))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(ModelError::EmptyResponse)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Map a non-success status onto the retry taxonomy.
fn status_error(status: StatusCode, retry_after: Option<Duration>, message: String) -> ModelError {
    match status.as_u16() {
        429 => ModelError::RateLimited { retry_after },
        401 | 403 => ModelError::Auth(message),
        code @ 500..=599 => ModelError::Server {
            status: code,
            message,
        },
        code => ModelError::Api {
            status: code,
            message,
        },
    }
}

/// `Retry-After` in seconds; HTTP dates are ignored.
fn retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
}

// Request/Response types

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}
