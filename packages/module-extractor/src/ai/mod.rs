//! Language model implementations.
//!
//! This module provides a reference implementation of the `LanguageModel`
//! trait. Users can use it directly or implement their own.

mod openai;

pub use openai::{OpenAI, DEFAULT_BASE_URL, DEFAULT_MODEL};
