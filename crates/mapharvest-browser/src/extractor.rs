//! Structured record extraction from a loaded business page.
//!
//! Each field read resolves to one of three outcomes: a value, unavailable
//! (element missing or text unparsable) or failed. Only a closed session is
//! treated as fatal for the extraction; every other failure degrades the
//! field to [`Field::Unavailable`].

use crate::actions::PageHandle;
use crate::error::{BrowserError, Result};
use mapharvest_core::{BusinessRecord, Field};
use once_cell::sync::Lazy;
use regex::Regex;

/// Reads a [`BusinessRecord`] from a rendered page.
#[async_trait::async_trait]
pub trait DetailExtractor: Send + Sync {
    /// Extract every field; missing values come back as the sentinel.
    async fn extract(&self, page: &dyn PageHandle) -> Result<BusinessRecord>;
}

/// Heading text shown on list pages instead of a business name.
const RESULTS_HEADING: &str = "Results";

static IDENTITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!1s([^!/?&]+)").expect("identity regex is valid"));

static COORDINATES_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"@(-?\d{1,3}(?:\.\d+)?),(-?\d{1,3}(?:\.\d+)?)").expect("coordinates regex is valid")
});

static RATING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d(?:[.,]\d+)?)").expect("rating regex is valid"));

static REVIEWS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(\s*([\d.,\s]+?)\s*\)").expect("review count regex is valid"));

/// CSS selectors used by [`SelectorExtractor`].
#[derive(Debug, Clone)]
pub struct Selectors {
    pub name: Vec<String>,
    pub category: String,
    pub rating_block: String,
    pub address: String,
    pub phone: String,
    pub website: String,
    pub plus_code: String,
    pub opening_hours: Vec<String>,
    pub description: Vec<String>,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            name: vec![
                "h1.DUwDvf".to_string(),
                "h1.fontHeadlineLarge".to_string(),
                "div[role=\"main\"] h1".to_string(),
                "h1".to_string(),
            ],
            category: "button[jsaction*=\"category\"]".to_string(),
            rating_block: "div.F7nice".to_string(),
            address: "button[data-item-id=\"address\"]".to_string(),
            phone: "button[data-item-id*=\"phone\"]".to_string(),
            website: "a[data-item-id=\"authority\"]".to_string(),
            plus_code: "button[data-item-id=\"oloc\"]".to_string(),
            opening_hours: vec![
                "button[data-item-id*=\"hours\"]".to_string(),
                "div[aria-label*=\"Hours\"]".to_string(),
                "button[aria-label*=\"Hours\"]".to_string(),
            ],
            description: vec![
                "div[class*=\"description\"]".to_string(),
                "div[jsaction*=\"description\"]".to_string(),
                "div[aria-label*=\"About\"]".to_string(),
            ],
        }
    }
}

/// Default [`DetailExtractor`] driven by CSS selectors.
#[derive(Debug, Clone, Default)]
pub struct SelectorExtractor {
    selectors: Selectors,
}

impl SelectorExtractor {
    #[must_use]
    pub fn new(selectors: Selectors) -> Self {
        Self { selectors }
    }

    async fn first_text(&self, page: &dyn PageHandle, selectors: &[String]) -> Result<Option<String>> {
        for selector in selectors {
            if let Some(text) = degrade(selector, page.text(selector).await)? {
                return Ok(Some(text));
            }
        }
        Ok(None)
    }

    async fn name(&self, page: &dyn PageHandle) -> Result<Option<String>> {
        for selector in &self.selectors.name {
            if let Some(text) = degrade(selector, page.text(selector).await)? {
                if text != RESULTS_HEADING {
                    return Ok(Some(text));
                }
            }
        }
        Ok(None)
    }

    async fn opening_hours(&self, page: &dyn PageHandle) -> Result<Option<String>> {
        for selector in &self.selectors.opening_hours {
            let label = degrade(selector, page.attribute(selector, "aria-label").await)?;
            let hours = match label {
                Some(label) => Some(label),
                None => degrade(selector, page.text(selector).await)?,
            };
            if let Some(hours) = hours.filter(|h| h.len() > 5) {
                return Ok(Some(hours));
            }
        }
        Ok(None)
    }
}

#[async_trait::async_trait]
impl DetailExtractor for SelectorExtractor {
    async fn extract(&self, page: &dyn PageHandle) -> Result<BusinessRecord> {
        let selectors = &self.selectors;
        let mut record = BusinessRecord::default();

        let url = degrade("url", page.current_url().await)?;
        if let Some(url) = &url {
            record.identity_id = parse_identity_id(url).into();
            if let Some((lat, lng)) = parse_coordinates(url) {
                record.latitude = Field::Value(lat);
                record.longitude = Field::Value(lng);
            }
        }
        record.source_url = Field::from_text(url);

        record.name = Field::from_text(self.name(page).await?);
        record.category = Field::from_text(degrade(
            &selectors.category,
            page.text(&selectors.category).await,
        )?);

        if let Some(block) = degrade(
            &selectors.rating_block,
            page.text(&selectors.rating_block).await,
        )? {
            let (rating, reviews) = parse_rating_block(&block);
            record.rating = rating.into();
            record.review_count = reviews.into();
        }

        record.full_address = Field::from_text(
            degrade(&selectors.address, page.text(&selectors.address).await)?
                .map(|a| clean_label(&a)),
        );
        record.phone = Field::from_text(
            degrade(&selectors.phone, page.text(&selectors.phone).await)?
                .map(|p| clean_label(&p)),
        );
        record.website = Field::from_text(degrade(
            &selectors.website,
            page.attribute(&selectors.website, "href").await,
        )?);
        record.plus_code = Field::from_text(
            degrade(&selectors.plus_code, page.text(&selectors.plus_code).await)?
                .map(|p| clean_label(&p)),
        );
        record.opening_hours = Field::from_text(self.opening_hours(page).await?);
        record.description = Field::from_text(self.first_text(page, &selectors.description).await?);

        Ok(record)
    }
}

/// Map a field read to value / unavailable, keeping only a closed session fatal.
fn degrade(field: &str, read: Result<Option<String>>) -> Result<Option<String>> {
    match read {
        Ok(value) => Ok(value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())),
        Err(BrowserError::SessionClosed) => Err(BrowserError::SessionClosed),
        Err(e) => {
            tracing::debug!(field, error = %e, "field read failed, marking unavailable");
            Ok(None)
        }
    }
}

/// Strip the icon glyphs the site prefixes to contact buttons.
fn clean_label(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(*c as u32, 0xE000..=0xF8FF))
        .collect::<String>()
        .trim()
        .to_string()
}

/// The site's business identifier from the `!1s<id>!` URL segment.
#[must_use]
pub fn parse_identity_id(url: &str) -> Option<String> {
    IDENTITY_RE
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Latitude and longitude from the `@lat,lng` URL segment.
#[must_use]
pub fn parse_coordinates(url: &str) -> Option<(f64, f64)> {
    let captures = COORDINATES_RE.captures(url)?;
    let lat: f64 = captures.get(1)?.as_str().parse().ok()?;
    let lng: f64 = captures.get(2)?.as_str().parse().ok()?;

    ((-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng)).then_some((lat, lng))
}

/// Rating and review count from text such as `4.6(1,234)`.
#[must_use]
pub fn parse_rating_block(text: &str) -> (Option<f32>, Option<u32>) {
    let rating = RATING_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().replace(',', ".").parse::<f32>().ok())
        .filter(|r| (0.0..=5.0).contains(r));

    let reviews = REVIEWS_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| {
            m.as_str()
                .chars()
                .filter(char::is_ascii_digit)
                .collect::<String>()
                .parse::<u32>()
                .ok()
        });

    (rating, reviews)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLACE_URL: &str = "https://www.google.com/maps/place/Acme+Dental/@40.7484,-73.9857,17z/data=!4m6!3m5!1s0x89c259a9b3117469:0xd134e199a405a163!8m2";

    #[test]
    fn test_parse_identity_id() {
        assert_eq!(
            parse_identity_id(PLACE_URL).as_deref(),
            Some("0x89c259a9b3117469:0xd134e199a405a163")
        );
        assert_eq!(parse_identity_id("https://www.google.com/maps/search/cafe"), None);
    }

    #[test]
    fn test_parse_coordinates() {
        assert_eq!(parse_coordinates(PLACE_URL), Some((40.7484, -73.9857)));
        assert_eq!(parse_coordinates("https://www.google.com/maps/search/cafe"), None);
    }

    #[test]
    fn test_parse_rating_block() {
        assert_eq!(parse_rating_block("4.6(1,234)"), (Some(4.6), Some(1234)));
        assert_eq!(parse_rating_block("4,8 (87)"), (Some(4.8), Some(87)));
        assert_eq!(parse_rating_block("No reviews"), (None, None));
    }

    #[test]
    fn test_clean_label() {
        assert_eq!(clean_label("\u{e0c8}  123 Main St "), "123 Main St");
        assert_eq!(clean_label("(555) 010-9999"), "(555) 010-9999");
    }

    #[test]
    fn test_degrade_keeps_session_closed_fatal() {
        assert!(degrade("name", Err(BrowserError::SessionClosed)).is_err());
        assert_eq!(
            degrade("name", Err(BrowserError::Timeout("h1".to_string()))).expect("degraded"),
            None
        );
        assert_eq!(
            degrade("name", Ok(Some("  ".to_string()))).expect("blank"),
            None
        );
    }
}
