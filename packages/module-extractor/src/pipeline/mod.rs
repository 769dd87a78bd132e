//! Extraction pipeline - the core of the library.
//!
//! The pipeline orchestrates:
//! - Chunking the corpus into size-bounded pieces
//! - Pass 1: one extraction call per chunk, run concurrently
//! - Parsing and repairing model output into module records
//! - Pass 2: a single synthesis call, with fallback to the raw list

pub mod chunker;
pub mod extract;
pub mod parse;
pub mod prompts;
pub mod runner;
pub mod synthesize;

pub use chunker::{chunk, Chunks};
pub use extract::{ChunkFailure, Extractor, RawExtraction};
pub use parse::{coerce_records, parse_module_list};
pub use prompts::{extraction_prompt, synthesis_prompt, EXTRACTION_PROMPT, SYNTHESIS_PROMPT};
pub use runner::Pipeline;
pub use synthesize::{consolidate, Synthesizer};
