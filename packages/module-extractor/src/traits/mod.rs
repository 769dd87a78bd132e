//! Core trait abstractions for the module extractor.
//!
//! These traits define the two external collaborators the pipeline
//! depends on: page transport and the language model.

pub mod fetcher;
pub mod model;
