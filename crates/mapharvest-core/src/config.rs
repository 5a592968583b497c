//! Configuration management for mapharvest.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use crate::types::DedupStrategy;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main application configuration.
///
/// This is loaded from `~/.config/mapharvest/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Egress credential pool settings
    pub proxy: ProxySettings,
    /// Browser session settings
    pub browser: BrowserSettings,
    /// Search and result collection settings
    pub search: SearchSettings,
    /// Detail-page extraction settings
    pub extraction: ExtractionSettings,
    /// Query retry and pacing settings
    pub retry: RetrySettings,
    /// Email enrichment settings
    pub email: EmailSettings,
    /// Post-run deduplication settings
    pub dedup: DedupSettings,
}

impl AppConfig {
    /// Load configuration from the default location, falling back to defaults if not found.
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration from an explicit path.
    ///
    /// Unlike [`AppConfig::load`], a missing file is an error here.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.display().to_string(),
            });
        }

        tracing::debug!("Loading config from {}", path.display());
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `MAPHARVEST_HEADLESS`: browser headless mode (true/false)
    /// - `MAPHARVEST_PROXY_FILE`: credential file path
    /// - `MAPHARVEST_ROTATION_THRESHOLD`: requests per credential before rotating
    /// - `MAPHARVEST_CONCURRENCY`: detail-page tabs per batch
    /// - `MAPHARVEST_EXTRACT_EMAILS`: enable email enrichment (true/false)
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("MAPHARVEST_HEADLESS") {
            if let Ok(headless) = val.parse() {
                self.browser.headless = headless;
                tracing::debug!("Override browser.headless from env: {}", headless);
            }
        }

        if let Ok(val) = std::env::var("MAPHARVEST_PROXY_FILE") {
            tracing::debug!("Override proxy.credentials_file from env: {}", val);
            self.proxy.credentials_file = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("MAPHARVEST_ROTATION_THRESHOLD") {
            if let Ok(threshold) = val.parse() {
                self.proxy.rotation_threshold = threshold;
                tracing::debug!("Override proxy.rotation_threshold from env: {}", threshold);
            }
        }

        if let Ok(val) = std::env::var("MAPHARVEST_CONCURRENCY") {
            if let Ok(concurrency) = val.parse() {
                self.extraction.concurrency = concurrency;
                tracing::debug!("Override extraction.concurrency from env: {}", concurrency);
            }
        }

        if let Ok(val) = std::env::var("MAPHARVEST_EXTRACT_EMAILS") {
            if let Ok(enabled) = val.parse() {
                self.email.enabled = enabled;
                tracing::debug!("Override email.enabled from env: {}", enabled);
            }
        }

        self
    }

    /// Load configuration with environment variable overrides.
    pub fn load_with_env() -> ConfigResult<Self> {
        Ok(Self::load()?.with_env_overrides())
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> ConfigResult<()> {
        fn positive(field: &str, value: u64) -> ConfigResult<()> {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    reason: "must be at least 1".to_string(),
                });
            }
            Ok(())
        }

        positive(
            "proxy.rotation_threshold",
            u64::from(self.proxy.rotation_threshold),
        )?;
        positive("extraction.concurrency", self.extraction.concurrency as u64)?;
        positive("retry.max_attempts", u64::from(self.retry.max_attempts))?;
        positive("search.max_scrolls", u64::from(self.search.max_scrolls))?;
        positive(
            "search.stable_scroll_rounds",
            u64::from(self.search.stable_scroll_rounds),
        )?;
        positive("email.max_concurrent", self.email.max_concurrent as u64)?;
        positive("email.timeout_secs", self.email.timeout_secs)?;
        positive(
            "browser.navigation_timeout_secs",
            self.browser.navigation_timeout_secs,
        )?;

        if !self.search.base_url.starts_with("http") {
            return Err(ConfigError::InvalidValue {
                field: "search.base_url".to_string(),
                reason: format!("not an http(s) URL: {}", self.search.base_url),
            });
        }

        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/mapharvest/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs =
            ProjectDirs::from("com", "mapharvest", "mapharvest").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }
}

/// Egress credential pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxySettings {
    /// Credential file (`address:port:username:password` per line)
    pub credentials_file: PathBuf,
    /// Scheduled requests per credential before rotating
    pub rotation_threshold: u32,
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            credentials_file: PathBuf::from("proxies.txt"),
            rotation_threshold: 14,
        }
    }
}

/// Browser session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Run browser in headless mode
    pub headless: bool,
    /// Browser window width
    pub window_width: u32,
    /// Browser window height
    pub window_height: u32,
    /// Navigation timeout in seconds
    pub navigation_timeout_secs: u64,
    /// Element wait timeout in seconds
    pub element_timeout_secs: u64,
    /// Disable image loading in the renderer
    pub block_heavy_resources: bool,
}

impl BrowserSettings {
    /// Navigation timeout as a `Duration`.
    #[must_use]
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    /// Element wait timeout as a `Duration`.
    #[must_use]
    pub fn element_timeout(&self) -> Duration {
        Duration::from_secs(self.element_timeout_secs)
    }
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1920,
            window_height: 1080,
            navigation_timeout_secs: 30,
            element_timeout_secs: 10,
            block_heavy_resources: true,
        }
    }
}

/// Search and result collection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Map-search service root
    pub base_url: String,
    /// Interface language appended as `hl=`
    pub language: String,
    /// Maximum result URLs handed to the scheduler per query
    pub max_results: usize,
    /// Consecutive unchanged scroll rounds that end collection
    pub stable_scroll_rounds: u32,
    /// Hard cap on scroll iterations
    pub max_scrolls: u32,
    /// Pause after each scroll in milliseconds
    pub scroll_pause_ms: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            base_url: "https://www.google.com/maps".to_string(),
            language: "en".to_string(),
            max_results: 60,
            stable_scroll_rounds: 3,
            max_scrolls: 50,
            scroll_pause_ms: 200,
        }
    }
}

/// Detail-page extraction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionSettings {
    /// Tabs opened per batch
    pub concurrency: usize,
    /// How long to wait for the name element, in milliseconds
    pub name_wait_ms: u64,
    /// Pause after navigation before reading fields, in milliseconds
    pub settle_ms: u64,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            concurrency: 10,
            name_wait_ms: 5000,
            settle_ms: 1500,
        }
    }
}

/// Query retry and pacing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Attempts per query, including the first
    pub max_attempts: u32,
    /// Pause before a retry in milliseconds
    pub retry_delay_ms: u64,
    /// Pause between queries in milliseconds
    pub delay_between_queries_ms: u64,
    /// Keep a healthy browser session across queries
    pub reuse_session: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            retry_delay_ms: 1000,
            delay_between_queries_ms: 2000,
            reuse_session: true,
        }
    }
}

/// Email enrichment settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailSettings {
    /// Whether websites are visited for emails
    pub enabled: bool,
    /// Total per-request timeout in seconds
    pub timeout_secs: u64,
    /// Connect timeout in seconds
    pub connect_timeout_secs: u64,
    /// Websites fetched concurrently
    pub max_concurrent: usize,
    /// Bytes of HTML inspected per page
    pub max_html_bytes: usize,
    /// Redirects followed per request
    pub max_redirects: usize,
    /// Sub-paths fetched when the homepage has no email
    pub contact_paths: Vec<String>,
}

impl Default for EmailSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: 6,
            connect_timeout_secs: 2,
            max_concurrent: 5,
            max_html_bytes: 500 * 1024,
            max_redirects: 2,
            contact_paths: vec!["/contact".to_string(), "/about".to_string()],
        }
    }
}

/// Post-run deduplication settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupSettings {
    /// Identity used to collapse duplicate records
    pub strategy: DedupStrategy,
}
