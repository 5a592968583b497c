//! Mapharvest Proxy - egress credential pool.
//!
//! Loads `address:port:username:password` credentials from a text file and
//! hands them out round-robin through a [`ProxyRotator`]. The rotator
//! advances either on a request-count schedule or immediately on failure.
//!
//! # Example
//!
//! ```rust
//! use mapharvest_proxy::{parse_credentials, ProxyRotator};
//!
//! let pool = parse_credentials("10.0.0.1:8080:u:p\n10.0.0.2:8080:u:p\n");
//! let mut rotator = ProxyRotator::new(pool, 1);
//!
//! assert_eq!(rotator.current().unwrap().address(), "10.0.0.1");
//! rotator.record_request();
//! assert_eq!(rotator.current().unwrap().address(), "10.0.0.2");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod error;
pub mod loader;
pub mod rotator;

pub use error::{ProxyError, Result};
pub use loader::{load_from_path, parse_credentials};
pub use rotator::ProxyRotator;
