use crate::error::{BrowserError, Result};
use mapharvest_core::EgressCredential;
use std::time::Duration;

/// One isolated browser tab.
///
/// This is the full set of page operations the engine relies on.
#[async_trait::async_trait]
pub trait PageHandle: Send + Sync {
    /// Navigate to a URL, failing with [`BrowserError::Timeout`] after `timeout`
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<()>;

    /// Wait for a selector to appear
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()>;

    /// Visible text of the first matching element, `None` when nothing matches
    async fn text(&self, selector: &str) -> Result<Option<String>>;

    /// Attribute of the first matching element, `None` when absent
    async fn attribute(&self, selector: &str, name: &str) -> Result<Option<String>>;

    /// Evaluate a script expression and return its JSON value
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value>;

    /// URL currently loaded in the tab
    async fn current_url(&self) -> Result<Option<String>>;

    /// Close the tab
    async fn close(&self) -> Result<()>;
}

/// A running browser session able to open tabs.
#[async_trait::async_trait]
pub trait PageRenderer: Send + Sync {
    /// Open a new isolated tab
    async fn open_page(&self) -> Result<Box<dyn PageHandle>>;

    /// Whether the underlying browser process is still connected
    fn is_alive(&self) -> bool;

    /// Close the browser
    async fn shutdown(&self) -> Result<()>;
}

/// Starts browser sessions bound to one egress credential.
#[async_trait::async_trait]
pub trait SessionLauncher: Send + Sync {
    /// Launch a session routed through `credential`
    async fn launch(&self, credential: &EgressCredential) -> Result<Box<dyn PageRenderer>>;
}

/// Append `hl=<language>` to a URL, replacing any existing value.
pub fn with_language(url: &str, language: &str) -> Result<String> {
    let mut parsed = url::Url::parse(url)
        .map_err(|e| BrowserError::NavigationError(format!("Invalid URL: {e}")))?;

    let pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, _)| k != "hl")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    parsed
        .query_pairs_mut()
        .clear()
        .extend_pairs(pairs)
        .append_pair("hl", language);

    Ok(parsed.to_string())
}
