//! Site crawling.
//!
//! - `Crawler` - breadth-first, depth- and page-bounded site walk
//! - `LinkClassifier` - rule-based documentation link filter
//! - `HttpFetcher` - reqwest transport
//! - `RateLimitedFetcher` - wrapper that adds a request quota

pub mod classifier;
pub mod crawler;
pub mod frontier;
pub mod http;
pub mod links;
pub mod rate_limited;

pub use classifier::{registrable_domain, LinkClassifier, RejectReason, Verdict};
pub use crawler::Crawler;
pub use frontier::{AdmitError, Frontier, FrontierEntry};
pub use http::HttpFetcher;
pub use links::{extract_links, normalize_url, DiscoveredLink};
pub use rate_limited::{FetcherExt, RateLimitedFetcher};
