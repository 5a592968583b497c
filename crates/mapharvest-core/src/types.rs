//! Shared types used across the mapharvest engine.
//!
//! This module defines the egress credential, the query selector and the
//! fixed-shape business record whose fields carry an explicit
//! "unavailable" sentinel instead of being absent.

use crate::error::CoreError;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroizing;

/// Text written in place of a field that could not be extracted.
pub const UNAVAILABLE: &str = "Not given";

/// Proxy address plus authentication used as the outbound path of a session.
///
/// Credentials are identified by `address:port`; the password is wiped from
/// memory on drop and never rendered by `Debug` or `Display`.
#[derive(Clone)]
pub struct EgressCredential {
    address: String,
    port: u16,
    username: String,
    password: Zeroizing<String>,
}

impl EgressCredential {
    /// Create a credential from its parts.
    #[must_use]
    pub fn new(
        address: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            port,
            username: username.into(),
            password: Zeroizing::new(password.into()),
        }
    }

    /// Proxy host name or IP.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Proxy port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Proxy user name.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Proxy password.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Identity of the credential: `address:port`.
    #[must_use]
    pub fn id(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    /// Proxy server URL suitable for a browser `--proxy-server` flag.
    #[must_use]
    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.address, self.port)
    }
}

impl PartialEq for EgressCredential {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address && self.port == other.port
    }
}

impl Eq for EgressCredential {}

impl fmt::Debug for EgressCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EgressCredential")
            .field("address", &self.address)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl fmt::Display for EgressCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

impl FromStr for EgressCredential {
    type Err = CoreError;

    /// Parse `address:port:username:password`.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = line.trim().split(':').collect();
        let [address, port, username, password] = parts.as_slice() else {
            return Err(CoreError::InvalidCredential(format!(
                "expected 4 colon-separated fields, got {}",
                parts.len()
            )));
        };

        if address.is_empty() {
            return Err(CoreError::InvalidCredential("empty address".to_string()));
        }

        let port = port
            .parse::<u16>()
            .map_err(|e| CoreError::InvalidCredential(format!("invalid port '{port}': {e}")))?;

        Ok(Self::new(*address, port, *username, *password))
    }
}

/// One logical search, consumed once by the retry orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Query {
    /// Keyword search within a location (zip code, city, ...)
    Search {
        /// What to search for
        keyword: String,
        /// Where to search
        location: String,
    },
    /// A direct results-page or business-page URL
    Url {
        /// Target URL
        url: String,
    },
}

impl Query {
    /// Human-readable description for logs.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Search { keyword, location } => format!("{keyword} in {location}"),
            Self::Url { url } => url.clone(),
        }
    }

    /// Keyword of a search query.
    #[must_use]
    pub fn keyword(&self) -> Option<&str> {
        match self {
            Self::Search { keyword, .. } => Some(keyword),
            Self::Url { .. } => None,
        }
    }

    /// Location of a search query.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        match self {
            Self::Search { location, .. } => Some(location),
            Self::Url { .. } => None,
        }
    }
}

/// Raw `{keyword, location, direct_url}` triple as produced by input layers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryInput {
    /// Search keyword
    pub keyword: String,
    /// Search location
    #[serde(alias = "zip_code")]
    pub location: String,
    /// Direct URL (exclusive with keyword/location)
    #[serde(alias = "url")]
    pub direct_url: String,
}

impl TryFrom<QueryInput> for Query {
    type Error = CoreError;

    fn try_from(input: QueryInput) -> Result<Self, Self::Error> {
        let keyword = input.keyword.trim();
        let location = input.location.trim();
        let url = input.direct_url.trim();

        match (keyword.is_empty(), location.is_empty(), url.is_empty()) {
            (true, true, false) => Ok(Self::Url {
                url: url.to_string(),
            }),
            (false, false, true) => Ok(Self::Search {
                keyword: keyword.to_string(),
                location: location.to_string(),
            }),
            (_, _, false) => Err(CoreError::InvalidQuery(
                "direct_url cannot be combined with keyword/location".to_string(),
            )),
            _ => Err(CoreError::InvalidQuery(
                "keyword and location are both required for a search".to_string(),
            )),
        }
    }
}

/// How duplicate records are recognised after a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupStrategy {
    /// The site's own identifier, falling back to name + address
    #[default]
    ByIdentity,
    /// Always name + address
    ByNameAddress,
    /// Keep every record
    None,
}

/// A record field holding either an extracted value or the unavailable sentinel.
#[derive(Debug, Clone, PartialEq)]
pub enum Field<T> {
    /// Extracted value
    Value(T),
    /// Not present on the page, or could not be read
    Unavailable,
}

impl<T> Default for Field<T> {
    fn default() -> Self {
        Self::Unavailable
    }
}

impl<T> Field<T> {
    /// Borrow the value if present.
    #[must_use]
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Value(v) => Some(v),
            Self::Unavailable => None,
        }
    }

    /// Whether a value is present.
    #[must_use]
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Value(_))
    }

    /// Map the contained value.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Field<U> {
        match self {
            Self::Value(v) => Field::Value(f(v)),
            Self::Unavailable => Field::Unavailable,
        }
    }
}

impl<T> From<Option<T>> for Field<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Unavailable, Self::Value)
    }
}

impl Field<String> {
    /// Text value with surrounding whitespace removed; blank text counts as missing.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.value().map(|s| s.trim()).filter(|s| !s.is_empty())
    }

    /// Build from optional text, treating blank strings as unavailable.
    #[must_use]
    pub fn from_text(value: Option<String>) -> Self {
        value
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .into()
    }
}

impl<T: Serialize> Serialize for Field<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Value(v) => v.serialize(serializer),
            Self::Unavailable => serializer.serialize_str(UNAVAILABLE),
        }
    }
}

/// Structured listing extracted from one business detail page.
///
/// Every field is total: it holds a value or [`Field::Unavailable`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BusinessRecord {
    /// Business name
    pub name: Field<String>,
    /// Full postal address
    pub full_address: Field<String>,
    /// Latitude in decimal degrees
    pub latitude: Field<f64>,
    /// Longitude in decimal degrees
    pub longitude: Field<f64>,
    /// Phone number
    pub phone: Field<String>,
    /// Business website
    pub website: Field<String>,
    /// Contact email
    pub email: Field<String>,
    /// Star rating (0-5)
    pub rating: Field<f32>,
    /// Number of reviews
    pub review_count: Field<u32>,
    /// Business category
    pub category: Field<String>,
    /// Opening hours summary
    pub opening_hours: Field<String>,
    /// Plus code
    pub plus_code: Field<String>,
    /// The site's own unique business identifier
    pub identity_id: Field<String>,
    /// URL the record was extracted from
    pub source_url: Field<String>,
    /// Free-text description
    pub description: Field<String>,
    /// Keyword of the originating query
    pub keyword: Field<String>,
    /// Location of the originating query
    pub location: Field<String>,
}

impl BusinessRecord {
    /// Whether the record carries a usable (non-blank) name.
    #[must_use]
    pub fn has_name(&self) -> bool {
        self.name.text().is_some()
    }

    /// Whether the email pipeline should look at this record.
    #[must_use]
    pub fn needs_email(&self) -> bool {
        !self.email.is_available() && self.website.text().is_some()
    }

    /// Stamp the originating query onto the record.
    pub fn annotate(&mut self, query: &Query) {
        self.keyword = Field::from_text(query.keyword().map(str::to_string));
        self.location = Field::from_text(query.location().map(str::to_string));
    }
}
