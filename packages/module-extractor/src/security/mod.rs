//! Input validation and credential handling.

mod credentials;
mod input;

pub use credentials::SecretString;
pub use input::{parse_url_list, validate_root_url, UrlList};
