//! Error types for the credential pool.

use thiserror::Error;

/// Errors that can occur while loading or using the credential pool.
#[derive(Error, Debug)]
pub enum ProxyError {
    /// The pool holds no usable credential
    #[error("no egress credentials available")]
    NoCredentials,

    /// Credential file could not be read
    #[error("failed to read credential file {path}: {source}")]
    Read {
        /// Path to the credential file
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Result type for credential pool operations.
pub type Result<T> = std::result::Result<T, ProxyError>;
