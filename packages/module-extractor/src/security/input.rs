//! Root URL validation for user input.

use tracing::warn;
use url::Url;

use crate::error::{SecurityError, SecurityResult};

/// Check that a user-supplied root URL is a crawlable web URL.
///
/// Only `http` and `https` URLs with a host are accepted.
pub fn validate_root_url(input: &str) -> SecurityResult<Url> {
    let url = Url::parse(input.trim())?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(SecurityError::DisallowedScheme(url.scheme().to_string()));
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(SecurityError::NoHost),
    }
}

/// URLs parsed from a one-per-line text block.
#[derive(Debug, Default)]
pub struct UrlList {
    pub valid: Vec<Url>,
    pub invalid: Vec<String>,
}

/// Split a text block into valid and invalid root URLs.
///
/// Blank lines are ignored; duplicates keep their first position.
pub fn parse_url_list(input: &str) -> UrlList {
    let mut list = UrlList::default();

    for line in input.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match validate_root_url(line) {
            Ok(url) => {
                if !list.valid.contains(&url) {
                    list.valid.push(url);
                }
            }
            Err(e) => {
                warn!(input = %line, error = %e, "Skipping invalid URL");
                list.invalid.push(line.to_string());
            }
        }
    }

    list
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_web_urls() {
        assert!(validate_root_url("https://support.example.com/en/").is_ok());
        assert!(validate_root_url("  http://example.com  ").is_ok());
    }

    #[test]
    fn test_rejects_non_web_urls() {
        assert!(matches!(
            validate_root_url("ftp://example.com/"),
            Err(SecurityError::DisallowedScheme(_))
        ));
        assert!(matches!(
            validate_root_url("mailto:help@example.com"),
            Err(SecurityError::DisallowedScheme(_))
        ));
        assert!(matches!(
            validate_root_url("example.com"),
            Err(SecurityError::UrlParse(_))
        ));
    }

    #[test]
    fn test_parse_url_list() {
        let list = parse_url_list(
            "https://help.example.com/\n\n  not a url \nhttps://docs.example.org/start\nhttps://help.example.com/\n",
        );
        assert_eq!(list.valid.len(), 2);
        assert_eq!(list.valid[1].as_str(), "https://docs.example.org/start");
        assert_eq!(list.invalid, vec!["not a url".to_string()]);
    }
}
