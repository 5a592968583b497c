//! Search navigation and result collection.
//!
//! Per attempt the navigator moves through
//! `Idle -> Navigated -> (ChallengeDetected | ResultsVisible) -> ResultsCollected`.
//! Results are gathered by scrolling the result feed until the link count
//! stops changing.

use crate::error::{Result, ScanError};
use mapharvest_browser::{with_language, PageHandle};
use mapharvest_core::{BrowserSettings, Query, SearchSettings};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Container holding the scrollable result list.
pub const FEED_SELECTOR: &str = r#"[role="feed"]"#;

/// Path fragment identifying a single business page.
pub const PLACE_PATH: &str = "/maps/place/";

/// Returns the `href` of every business link currently rendered.
pub const COLLECT_LINKS_SCRIPT: &str =
    r#"Array.from(document.querySelectorAll('a[href*="/maps/place/"]')).map(a => a.href)"#;

/// Scrolls the result feed to its end.
pub const SCROLL_SCRIPT: &str = r#"(() => {
    const feed = document.querySelector('[role="feed"]');
    if (!feed) return false;
    feed.scrollTop = feed.scrollHeight;
    return true;
})()"#;

/// True when a CAPTCHA or "unusual traffic" interstitial is showing.
pub const CHALLENGE_SCRIPT: &str = r#"(() => {
    const selectors = [
        'iframe[src*="recaptcha"]',
        'iframe[src*="captcha"]',
        '[id*="captcha"]',
        '[class*="captcha"]'
    ];
    if (selectors.some(s => document.querySelector(s))) return true;
    if (location.pathname.startsWith('/sorry/')) return true;
    const body = (document.body?.innerText || '').toLowerCase();
    return body.includes('unusual traffic from your computer network');
})()"#;

/// Navigation progress within one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavState {
    Idle,
    Navigated,
    ChallengeDetected,
    ResultsVisible,
    ResultsCollected,
}

/// Bounds of the scroll-until-stable loop.
#[derive(Debug, Clone)]
pub struct ScrollPolicy {
    /// Consecutive unchanged rounds that end collection
    pub stable_rounds: u32,
    /// Hard cap on scroll iterations
    pub max_scrolls: u32,
    /// Pause after each scroll
    pub pause: Duration,
    /// Stop once this many distinct links are visible
    pub max_results: usize,
}

impl From<&SearchSettings> for ScrollPolicy {
    fn from(settings: &SearchSettings) -> Self {
        Self {
            stable_rounds: settings.stable_scroll_rounds.max(1),
            max_scrolls: settings.max_scrolls,
            pause: Duration::from_millis(settings.scroll_pause_ms),
            max_results: settings.max_results,
        }
    }
}

/// Opens a search or direct URL on the session's main tab and lists the
/// business URLs it yields.
#[derive(Debug, Clone)]
pub struct SearchNavigator {
    base_url: String,
    language: String,
    scroll: ScrollPolicy,
    navigation_timeout: Duration,
    element_timeout: Duration,
}

impl SearchNavigator {
    #[must_use]
    pub fn new(search: &SearchSettings, browser: &BrowserSettings) -> Self {
        Self {
            base_url: search.base_url.trim_end_matches('/').to_string(),
            language: search.language.clone(),
            scroll: ScrollPolicy::from(search),
            navigation_timeout: browser.navigation_timeout(),
            element_timeout: browser.element_timeout(),
        }
    }

    /// URL to load for `query`, with the interface language applied.
    pub fn target_url(&self, query: &Query) -> Result<String> {
        let raw = match query {
            Query::Search { keyword, location } => {
                let mut url = Url::parse(&self.base_url).map_err(|e| {
                    ScanError::NavigationError(format!("invalid base URL {}: {e}", self.base_url))
                })?;
                url.path_segments_mut()
                    .map_err(|()| {
                        ScanError::NavigationError(format!("base URL cannot hold a path: {}", self.base_url))
                    })?
                    .pop_if_empty()
                    .push("search")
                    .push(&format!("{keyword}+{location}"));
                url.to_string()
            }
            Query::Url { url } => url.clone(),
        };

        Ok(with_language(&raw, &self.language)?)
    }

    /// Run one navigation attempt and return the deduplicated result URLs.
    pub async fn collect(&self, page: &dyn PageHandle, query: &Query) -> Result<Vec<String>> {
        let mut state = NavState::Idle;
        let url = self.target_url(query)?;

        info!(query = %query.describe(), url = %url, "navigating");
        page.navigate(&url, self.navigation_timeout).await?;
        transition(&mut state, NavState::Navigated);

        if self.challenge_present(page).await? {
            transition(&mut state, NavState::ChallengeDetected);
            return Err(ScanError::ChallengeDetected { url });
        }

        if url.contains(PLACE_PATH) {
            transition(&mut state, NavState::ResultsCollected);
            return Ok(vec![url]);
        }

        if let Err(e) = page
            .wait_for_selector(FEED_SELECTOR, self.element_timeout)
            .await
        {
            // A search with exactly one match lands on the business page itself
            let landed = page.current_url().await?.unwrap_or_default();
            if landed.contains(PLACE_PATH) {
                transition(&mut state, NavState::ResultsCollected);
                return Ok(vec![landed]);
            }
            if self.challenge_present(page).await? {
                transition(&mut state, NavState::ChallengeDetected);
                return Err(ScanError::ChallengeDetected { url });
            }
            if e.is_session_closed() {
                return Err(e.into());
            }
            warn!(url = %url, error = %e, "result feed not found, treating as no results");
            transition(&mut state, NavState::ResultsCollected);
            return Ok(Vec::new());
        }
        transition(&mut state, NavState::ResultsVisible);

        let urls = self.scroll_until_stable(page).await?;
        transition(&mut state, NavState::ResultsCollected);

        info!(query = %query.describe(), results = urls.len(), "results collected");
        Ok(urls)
    }

    /// Scroll the feed until the link count is unchanged for
    /// `stable_rounds` consecutive rounds or `max_scrolls` is reached.
    pub async fn scroll_until_stable(&self, page: &dyn PageHandle) -> Result<Vec<String>> {
        let policy = &self.scroll;
        let mut links = collect_links(page).await?;
        let mut last_count = links.len();
        let mut stable = 0;

        for round in 1..=policy.max_scrolls {
            if distinct(&links).len() >= policy.max_results {
                debug!(round, "result cap reached");
                break;
            }

            page.evaluate(SCROLL_SCRIPT).await?;
            if !policy.pause.is_zero() {
                tokio::time::sleep(policy.pause).await;
            }

            links = collect_links(page).await?;
            if links.len() == last_count {
                stable += 1;
                if stable >= policy.stable_rounds {
                    debug!(round, count = last_count, "result count stable");
                    break;
                }
            } else {
                stable = 0;
                last_count = links.len();
            }
        }

        let mut urls = distinct(&links);
        urls.truncate(policy.max_results);
        Ok(urls)
    }

    async fn challenge_present(&self, page: &dyn PageHandle) -> Result<bool> {
        let value = page.evaluate(CHALLENGE_SCRIPT).await?;
        Ok(value.as_bool().unwrap_or(false))
    }
}

fn transition(state: &mut NavState, next: NavState) {
    debug!(from = ?*state, to = ?next, "navigation state");
    *state = next;
}

async fn collect_links(page: &dyn PageHandle) -> Result<Vec<String>> {
    let value = page.evaluate(COLLECT_LINKS_SCRIPT).await?;
    Ok(value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(ToString::to_string))
                .collect()
        })
        .unwrap_or_default())
}

/// Remove repeated URLs, keeping first occurrences in order.
#[must_use]
pub fn distinct(urls: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    urls.iter()
        .filter(|u| seen.insert(u.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockSite, MockState};
    use std::sync::atomic::Ordering;

    fn navigator(search: SearchSettings) -> SearchNavigator {
        SearchNavigator::new(&search, &BrowserSettings::default())
    }

    fn search_settings() -> SearchSettings {
        SearchSettings {
            base_url: "https://maps.test/maps".to_string(),
            scroll_pause_ms: 0,
            ..SearchSettings::default()
        }
    }

    fn pizza() -> Query {
        Query::Search {
            keyword: "pizza".to_string(),
            location: "10001".to_string(),
        }
    }

    #[test]
    fn test_target_url_for_search() {
        let nav = navigator(search_settings());
        assert_eq!(
            nav.target_url(&Query::Search {
                keyword: "family dentist".to_string(),
                location: "10001".to_string(),
            })
            .expect("url"),
            "https://maps.test/maps/search/family%20dentist+10001?hl=en"
        );
    }

    #[test]
    fn test_target_url_for_direct_url() {
        let nav = navigator(search_settings());
        let url = nav
            .target_url(&Query::Url {
                url: "https://maps.test/maps/place/Acme/@1,2,3z".to_string(),
            })
            .expect("url");
        assert_eq!(url, "https://maps.test/maps/place/Acme/@1,2,3z?hl=en");
    }

    #[test]
    fn test_distinct_preserves_order() {
        let urls = vec![
            "b".to_string(),
            "a".to_string(),
            "b".to_string(),
            "c".to_string(),
            "a".to_string(),
        ];
        assert_eq!(distinct(&urls), vec!["b", "a", "c"]);
    }

    #[tokio::test]
    async fn test_scroll_stops_after_stable_rounds() {
        let site = MockSite::with_places(30).initial_visible(5).reveal_per_scroll(5);
        let (page, state) = MockState::detached_page(site, "proxy:1");

        let urls = navigator(search_settings())
            .collect(page.as_ref(), &pizza())
            .await
            .expect("collect");

        assert_eq!(urls.len(), 30);
        // 5 growing rounds, then 3 unchanged rounds
        assert_eq!(state.scrolls.load(Ordering::SeqCst), 8);
    }

    #[tokio::test]
    async fn test_scroll_respects_iteration_cap() {
        let site = MockSite::with_places(100).initial_visible(5).reveal_per_scroll(5);
        let (page, state) = MockState::detached_page(site, "proxy:1");

        let mut settings = search_settings();
        settings.max_scrolls = 4;
        settings.max_results = 1000;

        let urls = navigator(settings)
            .collect(page.as_ref(), &pizza())
            .await
            .expect("collect");

        assert_eq!(state.scrolls.load(Ordering::SeqCst), 4);
        assert_eq!(urls.len(), 25);
    }

    #[tokio::test]
    async fn test_result_cap_truncates() {
        let site = MockSite::with_places(40).initial_visible(5).reveal_per_scroll(5);
        let (page, _state) = MockState::detached_page(site, "proxy:1");

        let mut settings = search_settings();
        settings.max_results = 12;

        let urls = navigator(settings)
            .collect(page.as_ref(), &pizza())
            .await
            .expect("collect");

        assert_eq!(urls.len(), 12);
        assert!(urls[0].ends_with("/maps/place/biz-0"));
    }

    #[tokio::test]
    async fn test_duplicate_links_removed() {
        let site = MockSite::with_places(6).duplicate_links().initial_visible(6);
        let (page, _state) = MockState::detached_page(site, "proxy:1");

        let urls = navigator(search_settings())
            .collect(page.as_ref(), &pizza())
            .await
            .expect("collect");

        assert_eq!(urls.len(), 6);
    }

    #[tokio::test]
    async fn test_challenge_is_reported() {
        let site = MockSite::with_places(5).challenge_on("proxy:bad");
        let (page, _state) = MockState::detached_page(site, "proxy:bad");

        let err = navigator(search_settings())
            .collect(page.as_ref(), &pizza())
            .await
            .expect_err("challenge");

        assert!(matches!(err, ScanError::ChallengeDetected { .. }));
    }

    #[tokio::test]
    async fn test_place_url_is_single_result() {
        let site = MockSite::with_places(5);
        let (page, state) = MockState::detached_page(site, "proxy:1");

        let urls = navigator(search_settings())
            .collect(
                page.as_ref(),
                &Query::Url {
                    url: "https://maps.test/maps/place/biz-3".to_string(),
                },
            )
            .await
            .expect("collect");

        assert_eq!(urls, vec!["https://maps.test/maps/place/biz-3?hl=en"]);
        assert_eq!(state.scrolls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_feed_is_empty_result() {
        let site = MockSite::with_places(5).without_feed();
        let (page, _state) = MockState::detached_page(site, "proxy:1");

        let urls = navigator(search_settings())
            .collect(page.as_ref(), &pizza())
            .await
            .expect("collect");

        assert!(urls.is_empty());
    }
}
