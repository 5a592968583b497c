//! Mapharvest Core - Foundation crate for the mapharvest extraction engine.
//!
//! This crate provides the shared record types, error handling and
//! configuration that every other mapharvest crate depends on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths and env overrides
//! - [`types`] - Shared domain types (`EgressCredential`, `Query`, `BusinessRecord`, `Field`)
//!
//! # Example
//!
//! ```rust
//! use mapharvest_core::{AppConfig, Query, QueryInput};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! config.validate()?;
//!
//! let query = Query::try_from(QueryInput {
//!     keyword: "dentists".to_string(),
//!     location: "10001".to_string(),
//!     direct_url: String::new(),
//! })?;
//! assert_eq!(query.describe(), "dentists in 10001");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{
    AppConfig, BrowserSettings, DedupSettings, EmailSettings, ExtractionSettings, ProxySettings,
    RetrySettings, SearchSettings,
};
pub use error::{ConfigError, ConfigResult, CoreError, Result};
pub use types::{
    BusinessRecord, DedupStrategy, EgressCredential, Field, Query, QueryInput, UNAVAILABLE,
};
