use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrowserError>;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("failed to launch browser: {0}")]
    Launch(String),

    #[error("chromium error: {0}")]
    ChromiumError(String),

    #[error("navigation failed: {0}")]
    NavigationError(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("script evaluation failed: {0}")]
    Script(String),

    #[error("browser session closed")]
    SessionClosed,
}

impl BrowserError {
    /// Whether the session behind the page is gone and must be rebuilt.
    #[must_use]
    pub fn is_session_closed(&self) -> bool {
        matches!(self, Self::SessionClosed)
    }
}
