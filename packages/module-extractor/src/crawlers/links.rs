//! Link discovery and URL normalization.

use scraper::{Html, Selector};
use url::Url;

/// A hyperlink found on a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredLink {
    /// Absolute URL (fragment kept for the classifier)
    pub url: Url,

    /// Visible anchor text, whitespace-collapsed
    pub anchor_text: String,
}

/// Extract all `<a href>` targets from a page, resolved against `page_url`.
///
/// Honors `<base href>` when present. Unresolvable hrefs are dropped.
pub fn extract_links(html: &str, page_url: &Url) -> Vec<DiscoveredLink> {
    let document = Html::parse_document(html);

    let base = Selector::parse("base[href]")
        .ok()
        .and_then(|sel| {
            document
                .select(&sel)
                .next()
                .and_then(|el| el.value().attr("href"))
                .and_then(|href| page_url.join(href.trim()).ok())
        })
        .unwrap_or_else(|| page_url.clone());

    let Ok(anchor) = Selector::parse("a[href]") else {
        return vec![];
    };

    document
        .select(&anchor)
        .filter_map(|el| {
            let href = el.value().attr("href")?.trim();
            if href.is_empty() {
                return None;
            }
            let url = base.join(href).ok()?;
            let anchor_text = collapse_whitespace(&el.text().collect::<String>());
            Some(DiscoveredLink { url, anchor_text })
        })
        .collect()
}

/// Normalize a URL into the crawl's dedup key.
///
/// Drops the fragment and a trailing slash (except the root path);
/// scheme and host are already lowercased by the parser, default ports
/// are already removed.
pub fn normalize_url(url: &Url) -> Url {
    let mut normalized = url.clone();
    normalized.set_fragment(None);

    let path = normalized.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        normalized.set_path(path.trim_end_matches('/'));
    }
    if normalized.query() == Some("") {
        normalized.set_query(None);
    }
    normalized
}

pub(crate) fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}
