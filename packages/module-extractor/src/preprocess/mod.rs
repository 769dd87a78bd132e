//! Content preprocessing: raw HTML to one ordered text corpus.

pub mod corpus;
pub mod html;

pub use corpus::build_corpus;
pub use html::extract_text;
