//! HTML to plain text.
//!
//! Picks the main content container and serializes its block structure
//! into plain text: headings keep a `#` prefix per level, list items a
//! `- ` prefix, tables become pipe rows. Blocks are separated by a blank
//! line so the chunker can split on paragraphs.

use indexmap::IndexMap;
use scraper::{ElementRef, Html, Node, Selector};

use crate::crawlers::links::collapse_whitespace;

/// Elements that never carry documentation content.
const NOISE_TAGS: &[&str] = &[
    "script", "style", "noscript", "nav", "footer", "header", "aside", "form", "iframe", "svg",
    "button", "template", "select", "dialog",
];

/// Whole class or id names of navigation and chrome regions.
const BOILERPLATE_TOKENS: &[&str] = &[
    "nav", "navbar", "navigation", "header", "footer", "sidebar", "menu", "breadcrumb",
    "breadcrumbs", "toc", "table-of-contents", "cookie", "cookies", "consent", "banner",
    "advertisement", "ads", "social", "share", "sr-only", "visually-hidden", "skip-link",
    "feedback", "pagination", "site-header", "site-footer", "site-nav", "main-nav", "side-nav",
    "sidenav", "topbar", "cookie-banner", "cookie-consent", "toc-wrapper",
];

/// Nesting below this many elements is not serialized.
const MAX_DEPTH: usize = 256;

/// Content-region classes and ids, compared by text size.
const CONTENT_SELECTORS: &str = "#content, #main-content, #main, .content, .main-content, \
    .article-body, .article-content, .post-content, .entry-content, .markdown-body, \
    .documentation, .docs-content, .doc-content";

/// Elements whose text counts towards their container's score.
const SCORED_BLOCKS: &[&str] = &[
    "p", "pre", "li", "h1", "h2", "h3", "h4", "h5", "h6", "blockquote", "td", "dd",
];

/// Elements flowed into the surrounding paragraph.
const INLINE_TAGS: &[&str] = &[
    "a", "abbr", "b", "bdi", "cite", "code", "data", "em", "i", "kbd", "label", "mark", "q",
    "s", "samp", "small", "span", "strong", "sub", "sup", "time", "u", "var", "wbr",
];

/// Extract the normalized text of a page's main content.
///
/// Returns an empty string when no container yields any text.
pub fn extract_text(html: &str) -> String {
    let document = Html::parse_document(html);

    content_candidates(&document)
        .into_iter()
        .map(serialize)
        .find(|text| !text.is_empty())
        .unwrap_or_default()
}

/// Main-content containers in priority order.
fn content_candidates(document: &Html) -> Vec<ElementRef<'_>> {
    let mut candidates = Vec::new();

    for css in ["main", "[role=main]", "article"] {
        if let Some(el) = select_all(document, css).into_iter().next() {
            candidates.push(el);
        }
    }

    if let Some(el) = select_all(document, CONTENT_SELECTORS)
        .into_iter()
        .max_by_key(|el| text_len(*el))
    {
        candidates.push(el);
    }

    if let Some(el) = best_scored_container(document) {
        candidates.push(el);
    }

    candidates
}

/// Non-noise elements matching `css`, in document order.
fn select_all<'a>(document: &'a Html, css: &str) -> Vec<ElementRef<'a>> {
    let Ok(selector) = Selector::parse(css) else {
        return vec![];
    };
    document
        .select(&selector)
        .filter(|el| !is_noise(*el) && !within_noise(*el))
        .collect()
}

/// The container holding the most block text, attributed to each
/// block's nearest sectioning ancestor.
fn best_scored_container(document: &Html) -> Option<ElementRef<'_>> {
    let mut scores: IndexMap<_, (usize, ElementRef<'_>)> = IndexMap::new();

    for el in document.root_element().descendants().filter_map(ElementRef::wrap) {
        if !SCORED_BLOCKS.contains(&el.value().name()) || within_noise(el) {
            continue;
        }
        let Some(container) = el
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(|a| matches!(a.value().name(), "div" | "section" | "body"))
        else {
            continue;
        };
        let len = text_len(el);
        scores
            .entry(container.id())
            .or_insert((0, container))
            .0 += len;
    }

    let mut best: Option<(usize, ElementRef<'_>)> = None;
    for (score, el) in scores.into_values() {
        if score > 0 && best.map_or(true, |(top, _)| score > top) {
            best = Some((score, el));
        }
    }
    best.map(|(_, el)| el)
}

fn is_noise(el: ElementRef<'_>) -> bool {
    let value = el.value();
    if NOISE_TAGS.contains(&value.name()) {
        return true;
    }
    if value.attr("hidden").is_some() || value.attr("aria-hidden") == Some("true") {
        return true;
    }
    // Page-wide state classes such as `wy-body-for-nav` or `sidebar-fixed`
    if matches!(value.name(), "html" | "body") {
        return false;
    }
    value.classes().any(is_boilerplate_token) || value.id().is_some_and(is_boilerplate_token)
}

fn within_noise(el: ElementRef<'_>) -> bool {
    el.ancestors().filter_map(ElementRef::wrap).any(is_noise)
}

fn is_boilerplate_token(token: &str) -> bool {
    BOILERPLATE_TOKENS
        .iter()
        .any(|word| token.eq_ignore_ascii_case(word))
}

fn text_len(el: ElementRef<'_>) -> usize {
    inline_text(el).chars().count()
}

/// Serialize a container into blank-line separated blocks.
fn serialize(container: ElementRef<'_>) -> String {
    let mut blocks = Vec::new();
    walk(container, &mut blocks, 0);
    blocks.join("\n\n")
}

fn walk(el: ElementRef<'_>, blocks: &mut Vec<String>, depth: usize) {
    if depth > MAX_DEPTH {
        return;
    }
    let mut inline = String::new();

    for child in el.children() {
        match child.value() {
            Node::Text(text) => inline.push_str(text),
            Node::Element(_) => {
                let Some(child) = ElementRef::wrap(child) else {
                    continue;
                };
                if is_noise(child) {
                    continue;
                }
                let name = child.value().name();
                if INLINE_TAGS.contains(&name) {
                    collect_text(child, &mut inline, false, depth + 1);
                    continue;
                }
                if name == "br" {
                    inline.push(' ');
                    continue;
                }

                flush(&mut inline, blocks);
                serialize_block(child, name, blocks, depth + 1);
            }
            _ => {}
        }
    }

    flush(&mut inline, blocks);
}

fn serialize_block(el: ElementRef<'_>, name: &str, blocks: &mut Vec<String>, depth: usize) {
    match name {
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let level = name[1..].parse::<usize>().unwrap_or(1);
            push_prefixed(blocks, &"#".repeat(level), inline_text(el));
        }
        "p" | "dt" | "dd" | "figcaption" | "summary" | "caption" => {
            push_prefixed(blocks, "", inline_text(el));
        }
        "li" => {
            let own = collapse_whitespace(&list_item_text(el));
            push_prefixed(blocks, "-", own);
            for nested in el
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|c| matches!(c.value().name(), "ul" | "ol") && !is_noise(*c))
            {
                walk(nested, blocks, depth + 1);
            }
        }
        "pre" => {
            let text = preformatted_text(el);
            if !text.is_empty() {
                blocks.push(text);
            }
        }
        "table" => {
            let text = table_text(el);
            if !text.is_empty() {
                blocks.push(text);
            }
        }
        "blockquote" => {
            let mut inner = Vec::new();
            walk(el, &mut inner, depth);
            if !inner.is_empty() {
                let quoted = inner
                    .join("\n\n")
                    .lines()
                    .map(|line| if line.is_empty() { ">".to_string() } else { format!("> {}", line) })
                    .collect::<Vec<_>>()
                    .join("\n");
                blocks.push(quoted);
            }
        }
        "img" | "hr" | "video" | "audio" | "canvas" | "picture" | "object" | "embed" | "input"
        | "textarea" => {}
        _ => walk(el, blocks, depth),
    }
}

fn flush(inline: &mut String, blocks: &mut Vec<String>) {
    let text = collapse_whitespace(inline);
    if !text.is_empty() {
        blocks.push(text);
    }
    inline.clear();
}

fn push_prefixed(blocks: &mut Vec<String>, prefix: &str, text: String) {
    if text.is_empty() {
        return;
    }
    if prefix.is_empty() {
        blocks.push(text);
    } else {
        blocks.push(format!("{} {}", prefix, text));
    }
}

/// Whitespace-collapsed text of an element, skipping noise descendants.
fn inline_text(el: ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_text(el, &mut out, false, 0);
    collapse_whitespace(&out)
}

/// Text of a list item without its nested lists.
fn list_item_text(el: ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_text(el, &mut out, true, 0);
    out
}

fn collect_text(el: ElementRef<'_>, out: &mut String, skip_lists: bool, depth: usize) {
    if depth > MAX_DEPTH {
        return;
    }
    for child in el.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(_) => {
                let Some(child) = ElementRef::wrap(child) else {
                    continue;
                };
                if is_noise(child) {
                    continue;
                }
                let name = child.value().name();
                if skip_lists && matches!(name, "ul" | "ol") {
                    continue;
                }
                if INLINE_TAGS.contains(&name) {
                    collect_text(child, out, skip_lists, depth + 1);
                } else {
                    out.push(' ');
                    collect_text(child, out, skip_lists, depth + 1);
                    out.push(' ');
                }
            }
            _ => {}
        }
    }
}

/// Code and preformatted text with line breaks kept.
fn preformatted_text(el: ElementRef<'_>) -> String {
    let raw: String = el.text().collect();
    let lines: Vec<&str> = raw.lines().map(str::trim_end).collect();
    let start = lines.iter().position(|l| !l.is_empty());
    let end = lines.iter().rposition(|l| !l.is_empty());
    match (start, end) {
        (Some(start), Some(end)) => lines[start..=end].join("\n"),
        _ => String::new(),
    }
}

/// Pipe-delimited rows; the first row is followed by a separator.
fn table_text(el: ElementRef<'_>) -> String {
    let rows: Vec<Vec<String>> = el
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|row| row.value().name() == "tr")
        .map(|row| {
            row.children()
                .filter_map(ElementRef::wrap)
                .filter(|cell| matches!(cell.value().name(), "td" | "th"))
                .map(|cell| inline_text(cell).replace('|', "/"))
                .collect::<Vec<_>>()
        })
        .filter(|cells| cells.iter().any(|c| !c.is_empty()))
        .collect();

    let mut lines = Vec::with_capacity(rows.len() + 1);
    for (i, cells) in rows.iter().enumerate() {
        lines.push(format!("| {} |", cells.join(" | ")));
        if i == 0 {
            let separator = vec!["---"; cells.len()].join(" | ");
            lines.push(format!("| {} |", separator));
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefers_main_and_drops_chrome() {
        let html = r#"
            <html><head><title>Help</title><style>.x{}</style></head>
            <body>
              <header><a href="/">Logo</a></header>
              <nav><ul><li>Home</li></ul></nav>
              <main>
                <h1>Billing</h1>
                <p>Manage   invoices and
                   payment methods.</p>
                <script>track()</script>
                <!-- comment -->
                <h2>Invoices</h2>
                <ul><li>Download invoices</li><li>Change billing email</li></ul>
              </main>
              <footer>Copyright</footer>
            </body></html>
        "#;

        let text = extract_text(html);
        assert_eq!(
            text,
            "# Billing\n\nManage invoices and payment methods.\n\n## Invoices\n\n- Download invoices\n\n- Change billing email"
        );
    }

    #[test]
    fn test_main_beats_article() {
        let html = r#"<body><article><p>Article text</p></article><main><p>Main text</p></main></body>"#;
        assert_eq!(extract_text(html), "Main text");
    }

    #[test]
    fn test_falls_back_to_article() {
        let html = r#"<body><div><p>Outside</p></div><article><h3>Guide</h3><p>Inside</p></article></body>"#;
        assert_eq!(extract_text(html), "### Guide\n\nInside");
    }

    #[test]
    fn test_falls_back_to_highest_scored_container() {
        let html = r#"
            <body>
              <div class="promo"><p>Short</p></div>
              <div class="wrapper">
                <p>First long paragraph about reports and dashboards.</p>
                <p>Second long paragraph about exporting reports.</p>
              </div>
            </body>
        "#;
        assert_eq!(
            extract_text(html),
            "First long paragraph about reports and dashboards.\n\nSecond long paragraph about exporting reports."
        );
    }

    #[test]
    fn test_no_content_yields_empty() {
        assert_eq!(extract_text("<html><body><nav><p>Menu</p></nav></body></html>"), "");
        assert_eq!(extract_text(""), "");
    }

    #[test]
    fn test_boilerplate_classes_removed() {
        let html = r#"
            <main>
              <div class="breadcrumb">Home / Docs</div>
              <div id="cookie-banner"><p>We use cookies</p></div>
              <p>Real content</p>
              <div class="sr-only">Skip</div>
            </main>
        "#;
        assert_eq!(extract_text(html), "Real content");
    }

    #[test]
    fn test_boilerplate_token_matching() {
        assert!(is_boilerplate_token("site-header"));
        assert!(is_boilerplate_token("Footer"));
        assert!(!is_boilerplate_token("headerless"));
        assert!(!is_boilerplate_token("main-content"));
        assert!(!is_boilerplate_token("wy-body-for-nav"));
        assert!(!is_boilerplate_token("header-fixed"));
    }

    #[test]
    fn test_read_the_docs_layout() {
        let html = r#"
            <html class="writer-html5"><body class="wy-body-for-nav">
              <div class="wy-grid-for-nav">
                <nav class="wy-nav-side"><ul><li>Getting started</li></ul></nav>
                <section class="wy-nav-content-wrap">
                  <div class="wy-nav-content">
                    <div role="main" class="document">
                      <h1>Billing</h1>
                      <p>Invoices are issued monthly.</p>
                    </div>
                  </div>
                </section>
              </div>
            </body></html>
        "#;
        assert_eq!(extract_text(html), "# Billing\n\nInvoices are issued monthly.");
    }

    #[test]
    fn test_body_state_classes_keep_content() {
        let html = r#"
            <body class="app header-fixed sidebar-fixed menu-open">
              <div class="sidebar"><p>Menu entries</p></div>
              <main><h2>Reports</h2><p>Export reports as CSV.</p></main>
            </body>
        "#;
        assert_eq!(extract_text(html), "## Reports\n\nExport reports as CSV.");
    }

    #[test]
    fn test_deep_nesting_is_cut_off() {
        let depth = 5_000;
        let html = format!(
            "<main><p>Overview</p>{}<p>Buried</p>{}</main>",
            "<div>".repeat(depth),
            "</div>".repeat(depth)
        );
        let text = extract_text(&html);
        assert!(text.starts_with("Overview"));
        assert!(!text.contains("Buried"));
    }

    #[test]
    fn test_nested_lists() {
        let html = r#"<main><ul><li>Users<ul><li>Invite users</li><li>Remove users</li></ul></li></ul></main>"#;
        assert_eq!(
            extract_text(html),
            "- Users\n\n- Invite users\n\n- Remove users"
        );
    }

    #[test]
    fn test_tables_pre_and_blockquote() {
        let html = r#"
            <main>
              <table>
                <tr><th>Plan</th><th>Seats</th></tr>
                <tr><td>Team</td><td>10</td></tr>
              </table>
              <pre>
curl -X POST \
  https://api.test/v1/items
              </pre>
              <blockquote><p>Note: limits apply.</p></blockquote>
            </main>
        "#;
        let text = extract_text(html);
        assert_eq!(
            text,
            "| Plan | Seats |\n| --- | --- |\n| Team | 10 |\n\ncurl -X POST \\\n  https://api.test/v1/items\n\n> Note: limits apply."
        );
    }

    #[test]
    fn test_leaf_div_and_inline_text() {
        let html = r#"<main><div>Use the <a href="/x">Export</a> button.</div><div><span>Second</span></div></main>"#;
        assert_eq!(extract_text(html), "Use the Export button.\n\nSecond");
    }
}
