//! Link classifier - decides whether a discovered link is documentation.
//!
//! Pure and deterministic: no network, no model calls. Rules run in order
//! and the first match decides. Skipping a relevant page is preferred over
//! following an irrelevant one.

use std::fmt;
use url::Url;

use crate::types::config::{ClassifierConfig, DomainPolicy};

/// File extensions that point at downloads or assets, not pages.
const DOWNLOAD_EXTENSIONS: &[&str] = &[
    "pdf", "zip", "gz", "tar", "rar", "7z", "exe", "dmg", "pkg", "msi", "apk", "png", "jpg",
    "jpeg", "gif", "svg", "webp", "ico", "bmp", "mp3", "mp4", "mov", "avi", "webm", "css", "js",
    "xml", "rss", "json", "csv", "sh", "py",
];

/// Path segments of pages that are never product documentation.
const EXCLUDED_PATH_SEGMENTS: &[&str] = &[
    // authentication
    "login", "logout", "signin", "sign-in", "signout", "sign-out", "signup", "sign-up",
    "register", "auth", "oauth", "sso", "account", "profile",
    // marketing and company
    "pricing", "plans", "demo", "webinar", "webinars", "events", "case-studies", "customers",
    "blog", "news", "press", "brand", "investors", "careers", "jobs", "about", "company",
    "contact",
    // legal
    "privacy", "terms", "legal", "policy", "cookies", "security",
    // community and commerce
    "community", "forum", "forums", "cart", "checkout", "subscribe",
    // social sharing
    "share", "sharer", "intent",
];

/// Anchor texts of links that lead away from documentation.
const EXCLUDED_ANCHOR_PHRASES: &[&str] = &[
    "log in", "login", "log out", "sign in", "sign up", "register", "create account",
    "contact us", "about us", "privacy policy", "terms of service", "terms of use", "careers",
    "pricing", "request a demo", "book a demo", "download", "follow us", "share on",
    "facebook", "twitter", "linkedin", "youtube", "instagram", "tiktok",
];

/// Query keys used by share widgets.
const SHARE_QUERY_KEYS: &[&str] = &["share", "shareurl", "share_url"];

/// Why a link was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// mailto:, tel:, javascript: and other non-web schemes
    NonWebScheme(String),
    /// Different host than the root
    DomainMismatch,
    /// Download or asset file
    DownloadExtension(String),
    /// Login, marketing, legal or share page
    NonContentPath(String),
    /// Anchor text names a non-content destination
    NonContentAnchor(String),
    /// Fragment pointing into the page the link was found on
    SamePageFragment,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonWebScheme(s) => write!(f, "non-web scheme {}", s),
            Self::DomainMismatch => f.write_str("different domain"),
            Self::DownloadExtension(e) => write!(f, "download extension .{}", e),
            Self::NonContentPath(p) => write!(f, "non-content path /{}", p),
            Self::NonContentAnchor(a) => write!(f, "non-content anchor '{}'", a),
            Self::SamePageFragment => f.write_str("fragment on same page"),
        }
    }
}

/// Classification result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject(RejectReason),
}

impl Verdict {
    pub fn is_accept(&self) -> bool {
        matches!(self, Self::Accept)
    }
}

/// Heuristic in-scope filter for crawl links.
#[derive(Debug, Clone, Default)]
pub struct LinkClassifier {
    config: ClassifierConfig,
}

impl LinkClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Whether `candidate` is in scope for a crawl rooted at `root`.
    pub fn is_in_scope(&self, candidate: &Url, root: &Url) -> bool {
        self.classify(candidate, "", None, root).is_accept()
    }

    /// Classify a link found on `source` (if known) with its anchor text.
    pub fn classify(
        &self,
        candidate: &Url,
        anchor_text: &str,
        source: Option<&Url>,
        root: &Url,
    ) -> Verdict {
        if let Some(reason) = self.check_domain(candidate, root) {
            return Verdict::Reject(reason);
        }
        if let Some(reason) = self.check_patterns(candidate, anchor_text) {
            return Verdict::Reject(reason);
        }
        if let Some(source) = source {
            if is_same_page_fragment(candidate, source) {
                return Verdict::Reject(RejectReason::SamePageFragment);
            }
        }
        Verdict::Accept
    }

    fn check_domain(&self, candidate: &Url, root: &Url) -> Option<RejectReason> {
        if !matches!(candidate.scheme(), "http" | "https") {
            return Some(RejectReason::NonWebScheme(candidate.scheme().to_string()));
        }

        let (Some(host), Some(root_host)) = (candidate.host_str(), root.host_str()) else {
            return Some(RejectReason::DomainMismatch);
        };
        let host = host.to_lowercase();
        let root_host = root_host.to_lowercase();

        let same = match self.config.domain_policy {
            DomainPolicy::SameHost => host == root_host,
            DomainPolicy::SameRegistrableDomain => {
                registrable_domain(&host) == registrable_domain(&root_host)
            }
        };

        (!same).then_some(RejectReason::DomainMismatch)
    }

    fn check_patterns(&self, candidate: &Url, anchor_text: &str) -> Option<RejectReason> {
        let path = candidate.path().to_lowercase();

        if let Some(ext) = extension(&path) {
            let allowed = self.config.allowed_extensions.iter().any(|a| a == ext);
            if !allowed && DOWNLOAD_EXTENSIONS.contains(&ext) {
                return Some(RejectReason::DownloadExtension(ext.to_string()));
            }
        }

        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let excluded = EXCLUDED_PATH_SEGMENTS.contains(&segment)
                || self.config.extra_excluded_paths.iter().any(|p| p == segment);
            if excluded {
                return Some(RejectReason::NonContentPath(segment.to_string()));
            }
        }

        if let Some((key, _)) = candidate
            .query_pairs()
            .find(|(k, _)| SHARE_QUERY_KEYS.contains(&k.to_lowercase().as_str()))
        {
            return Some(RejectReason::NonContentPath(format!("?{}", key)));
        }

        let anchor = anchor_text.trim().to_lowercase();
        if !anchor.is_empty() {
            if let Some(phrase) = EXCLUDED_ANCHOR_PHRASES.iter().find(|p| anchor.contains(*p)) {
                return Some(RejectReason::NonContentAnchor(phrase.to_string()));
            }
        }

        None
    }
}

/// Extension of the last path segment, if it has one.
fn extension(path: &str) -> Option<&str> {
    let last = path.rsplit('/').next()?;
    let (stem, ext) = last.rsplit_once('.')?;
    (!stem.is_empty() && !ext.is_empty()).then_some(ext)
}

fn is_same_page_fragment(candidate: &Url, source: &Url) -> bool {
    if candidate.fragment().is_none() {
        return false;
    }
    let mut a = candidate.clone();
    let mut b = source.clone();
    a.set_fragment(None);
    b.set_fragment(None);
    a == b
}

/// Second-level country domains that act like TLDs (example.co.uk).
const COMPOUND_SLDS: &[&str] = &["co", "com", "org", "net", "ac", "gov", "edu", "ne", "or"];

/// Best-effort registrable domain: the last two labels, or three when
/// the second-level label is a country-code registry (co.uk, com.au).
pub fn registrable_domain(host: &str) -> &str {
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() <= 2 || host.parse::<std::net::IpAddr>().is_ok() {
        return host;
    }

    let tld = labels[labels.len() - 1];
    let sld = labels[labels.len() - 2];
    let keep = if tld.len() == 2 && COMPOUND_SLDS.contains(&sld) {
        3
    } else {
        2
    };

    if labels.len() <= keep {
        return host;
    }
    let skip: usize = labels[..labels.len() - keep].iter().map(|l| l.len() + 1).sum();
    &host[skip..]
}
