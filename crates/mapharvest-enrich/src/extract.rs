//! Email extraction and validation over raw HTML.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

/// Placeholder, platform and social domains whose addresses are never a
/// business contact. Subdomains are rejected too.
pub const EXCLUDED_DOMAINS: &[&str] = &[
    "example.com",
    "domain.com",
    "email.com",
    "test.com",
    "wix.com",
    "wordpress.com",
    "sentry.io",
    "sentry-next.wixpress.com",
    "google.com",
    "facebook.com",
    "twitter.com",
    "instagram.com",
    "squarespace.com",
    "linkedin.com",
    "youtube.com",
    "pinterest.com",
];

/// Asset names such as `logo@2x.png` look like addresses to the regex.
const IMAGE_EXTENSIONS: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".gif", ".svg", ".webp", ".ico", ".bmp",
];

/// Leading characters inspected for a challenge interstitial.
const CHALLENGE_WINDOW: usize = 1000;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("email regex is valid")
});

static MAILTO_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)mailto:([A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,})")
        .expect("mailto regex is valid")
});

static MAILTO_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"a[href^="mailto:"]"#).expect("mailto selector is valid"));

/// First valid email in `html`.
///
/// `mailto:` targets are trusted first; when one of them validates it is
/// returned without scanning the rest of the page.
#[must_use]
pub fn extract_email(html: &str) -> Option<String> {
    if let Some(email) = mailto_candidates(html)
        .into_iter()
        .find(|e| is_valid_email(e))
    {
        return Some(email);
    }

    EMAIL_RE
        .find_iter(html)
        .map(|m| m.as_str())
        .find(|e| is_valid_email(e))
        .map(ToString::to_string)
}

fn mailto_candidates(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut candidates: Vec<String> = document
        .select(&MAILTO_SELECTOR)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| {
            let target = href.get("mailto:".len()..)?;
            let address = target.split('?').next()?.trim();
            (!address.is_empty()).then(|| address.to_string())
        })
        .collect();

    for captures in MAILTO_RE.captures_iter(html) {
        if let Some(m) = captures.get(1) {
            if !candidates.iter().any(|c| c == m.as_str()) {
                candidates.push(m.as_str().to_string());
            }
        }
    }

    candidates
}

/// Whether `email` looks like a real business address.
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    let lower = email.to_ascii_lowercase();

    if IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
        return false;
    }

    let Some((local, domain)) = lower.rsplit_once('@') else {
        return false;
    };
    if local.is_empty() || domain.len() < 4 || !domain.contains('.') {
        return false;
    }

    if EXCLUDED_DOMAINS
        .iter()
        .any(|d| domain == *d || domain.strip_suffix(d).is_some_and(|rest| rest.ends_with('.')))
    {
        return false;
    }

    domain
        .rsplit('.')
        .next()
        .is_some_and(|tld| tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic()))
}

/// Whether the start of the page is a Cloudflare-style challenge.
#[must_use]
pub fn looks_like_challenge(html: &str) -> bool {
    let head: String = html.chars().take(CHALLENGE_WINDOW).collect();
    let head = head.to_lowercase();
    head.contains("cloudflare") && head.contains("challenge")
}

/// Cut `html` to at most `max_bytes`, on a character boundary.
#[must_use]
pub fn truncate_html(html: &str, max_bytes: usize) -> &str {
    if html.len() <= max_bytes {
        return html;
    }
    let mut end = max_bytes;
    while !html.is_char_boundary(end) {
        end -= 1;
    }
    &html[..end]
}
