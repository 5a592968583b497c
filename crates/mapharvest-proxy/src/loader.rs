//! Credential file loading.
//!
//! One credential per line in `address:port:username:password` form. Blank
//! lines and `#` comments are ignored; malformed lines are logged and skipped.

use crate::error::{ProxyError, Result};
use mapharvest_core::EgressCredential;
use std::path::Path;
use tracing::{info, warn};

/// Parse credential file contents.
///
/// Never fails: every line that does not parse is skipped with a warning.
#[must_use]
pub fn parse_credentials(contents: &str) -> Vec<EgressCredential> {
    let mut credentials = Vec::new();

    for (index, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match line.parse::<EgressCredential>() {
            Ok(credential) => credentials.push(credential),
            Err(e) => {
                warn!(line = index + 1, error = %e, "skipping malformed credential line");
            }
        }
    }

    credentials
}

/// Load credentials from a file.
///
/// An empty pool is not an error here; [`crate::ProxyRotator::current`]
/// reports it when a credential is actually needed.
pub fn load_from_path(path: &Path) -> Result<Vec<EgressCredential>> {
    let contents = std::fs::read_to_string(path).map_err(|source| ProxyError::Read {
        path: path.display().to_string(),
        source,
    })?;

    let credentials = parse_credentials(&contents);

    info!(
        count = credentials.len(),
        path = %path.display(),
        "loaded egress credentials"
    );

    Ok(credentials)
}
