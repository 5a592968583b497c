use mapharvest_browser::BrowserError;
use mapharvest_proxy::ProxyError;
use thiserror::Error;

/// Failure category driving the retry decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Network path failed (timeout, navigation error)
    Proxy,
    /// Bot-challenge page served
    Challenge,
    /// Browser process or tab died
    Crash,
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("no egress credential available: {0}")]
    CredentialExhausted(String),

    #[error("bot challenge detected at {url}")]
    ChallengeDetected { url: String },

    #[error("navigation timed out: {0}")]
    NavigationTimeout(String),

    #[error("navigation failed: {0}")]
    NavigationError(String),

    #[error("browser session crashed: {0}")]
    SessionCrash(String),

    #[error("no business name found at {url}")]
    ExtractionEmpty { url: String },
}

impl ScanError {
    /// Category of a query-level failure; `None` for errors that never
    /// trigger a retry.
    #[must_use]
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::ChallengeDetected { .. } => Some(FailureKind::Challenge),
            Self::SessionCrash(_) => Some(FailureKind::Crash),
            Self::NavigationTimeout(_) | Self::NavigationError(_) => Some(FailureKind::Proxy),
            Self::CredentialExhausted(_) | Self::ExtractionEmpty { .. } => None,
        }
    }
}

impl From<BrowserError> for ScanError {
    fn from(err: BrowserError) -> Self {
        match err {
            BrowserError::Timeout(msg) => Self::NavigationTimeout(msg),
            BrowserError::SessionClosed => Self::SessionCrash("browser session closed".to_string()),
            BrowserError::Launch(msg) => Self::SessionCrash(format!("launch failed: {msg}")),
            BrowserError::NavigationError(msg)
            | BrowserError::ChromiumError(msg)
            | BrowserError::Script(msg) => Self::NavigationError(msg),
        }
    }
}

impl From<ProxyError> for ScanError {
    fn from(err: ProxyError) -> Self {
        Self::CredentialExhausted(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
