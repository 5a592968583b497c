//! In-memory fakes of the browser boundary.

use crate::navigator::{CHALLENGE_SCRIPT, COLLECT_LINKS_SCRIPT, FEED_SELECTOR, PLACE_PATH, SCROLL_SCRIPT};
use async_trait::async_trait;
use mapharvest_browser::{BrowserError, PageHandle, PageRenderer, SessionLauncher};
use mapharvest_core::EgressCredential;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type BrowserResult<T> = mapharvest_browser::Result<T>;

pub(crate) const SITE_ROOT: &str = "https://maps.test";

/// What the fake site serves.
#[derive(Debug, Clone, Default)]
pub(crate) struct MockSite {
    places: Vec<String>,
    names: HashMap<String, String>,
    initial_visible: usize,
    reveal_per_scroll: usize,
    duplicate_links: bool,
    without_feed: bool,
    challenge_credentials: HashSet<String>,
    dead_credentials: HashSet<String>,
    detail_delay: Duration,
}

impl MockSite {
    /// `count` places named `Business {i}` at `/maps/place/biz-{i}`, all visible.
    pub(crate) fn with_places(count: usize) -> Self {
        let places: Vec<String> = (0..count)
            .map(|i| format!("{SITE_ROOT}/maps/place/biz-{i}"))
            .collect();
        let names = places
            .iter()
            .enumerate()
            .map(|(i, url)| (url.clone(), format!("Business {i}")))
            .collect();
        Self {
            initial_visible: count,
            places,
            names,
            ..Self::default()
        }
    }

    pub(crate) fn initial_visible(mut self, n: usize) -> Self {
        self.initial_visible = n;
        self
    }

    pub(crate) fn reveal_per_scroll(mut self, n: usize) -> Self {
        self.reveal_per_scroll = n;
        self
    }

    pub(crate) fn duplicate_links(mut self) -> Self {
        self.duplicate_links = true;
        self
    }

    pub(crate) fn without_feed(mut self) -> Self {
        self.without_feed = true;
        self
    }

    pub(crate) fn challenge_on(mut self, credential_id: &str) -> Self {
        self.challenge_credentials.insert(credential_id.to_string());
        self
    }

    pub(crate) fn dead_on(mut self, credential_id: &str) -> Self {
        self.dead_credentials.insert(credential_id.to_string());
        self
    }

    pub(crate) fn unnamed(mut self, index: usize) -> Self {
        if let Some(url) = self.places.get(index) {
            self.names.remove(url);
        }
        self
    }

    pub(crate) fn detail_delay(mut self, delay: Duration) -> Self {
        self.detail_delay = delay;
        self
    }

    pub(crate) fn places(&self) -> &[String] {
        &self.places
    }

    fn name_for(&self, url: &str) -> Option<&String> {
        let base = url.split('?').next().unwrap_or(url);
        self.names.get(base)
    }
}

/// Tab lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Event {
    Opened,
    Closed,
}

/// Observations shared by every fake session.
#[derive(Debug, Default)]
pub(crate) struct MockState {
    pub(crate) site: MockSite,
    pub(crate) launches: Mutex<Vec<String>>,
    pub(crate) events: Mutex<Vec<Event>>,
    pub(crate) active: AtomicUsize,
    pub(crate) max_active: AtomicUsize,
    pub(crate) scrolls: AtomicUsize,
    pub(crate) shutdowns: AtomicUsize,
}

impl MockState {
    pub(crate) fn new(site: MockSite) -> Arc<Self> {
        Arc::new(Self {
            site,
            ..Self::default()
        })
    }

    /// A page outside any renderer, for navigator tests.
    pub(crate) fn detached_page(site: MockSite, credential_id: &str) -> (Box<dyn PageHandle>, Arc<Self>) {
        let state = Self::new(site);
        let page = MockPage::new(Arc::clone(&state), credential_id);
        (Box::new(page), state)
    }

    pub(crate) fn launches(&self) -> Vec<String> {
        self.launches.lock().expect("launches lock").clone()
    }

    pub(crate) fn events(&self) -> Vec<Event> {
        self.events.lock().expect("events lock").clone()
    }

    /// Sizes of the groups of tabs that were open together.
    pub(crate) fn tab_groups(&self) -> Vec<usize> {
        let mut groups = Vec::new();
        let (mut open, mut opened_in_group) = (0usize, 0usize);
        for event in self.events() {
            match event {
                Event::Opened => {
                    open += 1;
                    opened_in_group += 1;
                }
                Event::Closed => {
                    open -= 1;
                    if open == 0 {
                        groups.push(opened_in_group);
                        opened_in_group = 0;
                    }
                }
            }
        }
        groups
    }
}

pub(crate) struct MockPage {
    state: Arc<MockState>,
    credential_id: String,
    url: Mutex<Option<String>>,
    revealed: AtomicUsize,
}

impl MockPage {
    fn new(state: Arc<MockState>, credential_id: &str) -> Self {
        let revealed = state.site.initial_visible;
        Self {
            state,
            credential_id: credential_id.to_string(),
            url: Mutex::new(None),
            revealed: AtomicUsize::new(revealed),
        }
    }

    fn current(&self) -> String {
        self.url.lock().expect("url lock").clone().unwrap_or_default()
    }

    fn visible_links(&self) -> Vec<Value> {
        let site = &self.state.site;
        let revealed = self.revealed.load(Ordering::SeqCst).min(site.places.len());
        site.places[..revealed]
            .iter()
            .flat_map(|url| {
                let copies = if site.duplicate_links { 2 } else { 1 };
                std::iter::repeat(json!(url)).take(copies)
            })
            .collect()
    }
}

#[async_trait]
impl PageHandle for MockPage {
    async fn navigate(&self, url: &str, _timeout: Duration) -> BrowserResult<()> {
        *self.url.lock().expect("url lock") = Some(url.to_string());
        if url.contains(PLACE_PATH) && !self.state.site.detail_delay.is_zero() {
            tokio::time::sleep(self.state.site.detail_delay).await;
        }
        Ok(())
    }

    async fn wait_for_selector(&self, selector: &str, _timeout: Duration) -> BrowserResult<()> {
        let url = self.current();
        let present = if selector == FEED_SELECTOR {
            url.contains("/search/") && !self.state.site.without_feed
        } else if selector.contains("h1") {
            self.state.site.name_for(&url).is_some()
        } else {
            false
        };

        if present {
            Ok(())
        } else {
            Err(BrowserError::Timeout(format!("waiting for {selector}")))
        }
    }

    async fn text(&self, selector: &str) -> BrowserResult<Option<String>> {
        if selector.contains("h1") {
            return Ok(self.state.site.name_for(&self.current()).cloned());
        }
        Ok(None)
    }

    async fn attribute(&self, _selector: &str, _name: &str) -> BrowserResult<Option<String>> {
        Ok(None)
    }

    async fn evaluate(&self, script: &str) -> BrowserResult<Value> {
        let site = &self.state.site;
        let value = if script == CHALLENGE_SCRIPT {
            json!(site.challenge_credentials.contains(&self.credential_id))
        } else if script == SCROLL_SCRIPT {
            self.state.scrolls.fetch_add(1, Ordering::SeqCst);
            self.revealed.fetch_add(site.reveal_per_scroll, Ordering::SeqCst);
            json!(true)
        } else if script == COLLECT_LINKS_SCRIPT {
            Value::Array(self.visible_links())
        } else {
            Value::Null
        };
        Ok(value)
    }

    async fn current_url(&self) -> BrowserResult<Option<String>> {
        Ok(self.url.lock().expect("url lock").clone())
    }

    async fn close(&self) -> BrowserResult<()> {
        self.state.active.fetch_sub(1, Ordering::SeqCst);
        self.state.events.lock().expect("events lock").push(Event::Closed);
        Ok(())
    }
}

pub(crate) struct MockRenderer {
    state: Arc<MockState>,
    credential_id: String,
    alive: AtomicBool,
}

impl MockRenderer {
    pub(crate) fn new(state: Arc<MockState>, credential_id: &str) -> Self {
        let alive = !state.site.dead_credentials.contains(credential_id);
        Self {
            state,
            credential_id: credential_id.to_string(),
            alive: AtomicBool::new(alive),
        }
    }
}

#[async_trait]
impl PageRenderer for MockRenderer {
    async fn open_page(&self) -> BrowserResult<Box<dyn PageHandle>> {
        if !self.is_alive() {
            return Err(BrowserError::SessionClosed);
        }
        let now = self.state.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_active.fetch_max(now, Ordering::SeqCst);
        self.state.events.lock().expect("events lock").push(Event::Opened);
        Ok(Box::new(MockPage::new(
            Arc::clone(&self.state),
            &self.credential_id,
        )))
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn shutdown(&self) -> BrowserResult<()> {
        self.alive.store(false, Ordering::SeqCst);
        self.state.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub(crate) struct MockLauncher {
    state: Arc<MockState>,
}

impl MockLauncher {
    pub(crate) fn new(state: Arc<MockState>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl SessionLauncher for MockLauncher {
    async fn launch(&self, credential: &EgressCredential) -> BrowserResult<Box<dyn PageRenderer>> {
        self.state
            .launches
            .lock()
            .expect("launches lock")
            .push(credential.id());
        Ok(Box::new(MockRenderer::new(
            Arc::clone(&self.state),
            &credential.id(),
        )))
    }
}

/// Credentials `10.0.0.{i}:8080` for `i` in `1..=count`.
pub(crate) fn credentials(count: usize) -> Vec<EgressCredential> {
    (1..=count)
        .map(|i| EgressCredential::new(format!("10.0.0.{i}"), 8080, "user", "pw"))
        .collect()
}
