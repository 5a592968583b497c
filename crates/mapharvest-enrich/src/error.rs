//! Error types for email enrichment.

use thiserror::Error;

/// Why a single website produced no email.
///
/// These never leave the pipeline: every variant resolves to "no email" for
/// the website in question.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnrichmentUnavailable {
    /// Blocked or rate limited (403, 429, 503)
    #[error("blocked with HTTP {status}")]
    Blocked {
        /// HTTP status code
        status: u16,
    },

    /// Any other non-success status
    #[error("unexpected HTTP {status}")]
    UnexpectedStatus {
        /// HTTP status code
        status: u16,
    },

    /// Content type is not HTML
    #[error("not an HTML page: {content_type}")]
    NotHtml {
        /// Reported content type
        content_type: String,
    },

    /// A bot-challenge interstitial was served
    #[error("challenge page served")]
    Challenge,

    /// Connect or total timeout elapsed
    #[error("request timed out")]
    Timeout,

    /// Connection could not be established
    #[error("connection failed: {0}")]
    Connect(String),

    /// Any other transport failure
    #[error("request failed: {0}")]
    Request(String),

    /// Website value is not a usable URL
    #[error("invalid website URL: {0}")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for EnrichmentUnavailable {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connect(err.to_string())
        } else {
            Self::Request(err.to_string())
        }
    }
}

/// Errors constructing the enrichment pipeline.
#[derive(Error, Debug)]
pub enum EnrichError {
    /// HTTP client could not be built
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Result type for pipeline construction.
pub type Result<T> = std::result::Result<T, EnrichError>;
