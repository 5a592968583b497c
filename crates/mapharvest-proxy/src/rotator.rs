//! Round-robin credential rotation.

use crate::error::{ProxyError, Result};
use mapharvest_core::EgressCredential;
use tracing::{debug, info};

/// Owns the credential pool and the pointer to the active entry.
///
/// The pointer only moves through [`ProxyRotator::record_request`] (scheduled
/// rotation after `rotation_threshold` requests) and
/// [`ProxyRotator::record_failure`] (immediate rotation). Both reset the
/// request counter. There is no exclusion of failed credentials; a failed
/// entry comes around again after one full cycle.
#[derive(Debug)]
pub struct ProxyRotator {
    credentials: Vec<EgressCredential>,
    current_index: usize,
    request_counter: u32,
    rotation_threshold: u32,
}

impl ProxyRotator {
    /// Create a rotator over `credentials`, in load order.
    ///
    /// A threshold of zero is treated as one.
    #[must_use]
    pub fn new(credentials: Vec<EgressCredential>, rotation_threshold: u32) -> Self {
        Self {
            credentials,
            current_index: 0,
            request_counter: 0,
            rotation_threshold: rotation_threshold.max(1),
        }
    }

    /// The active credential.
    pub fn current(&self) -> Result<&EgressCredential> {
        self.credentials
            .get(self.current_index)
            .ok_or(ProxyError::NoCredentials)
    }

    /// Count one scheduled request against the active credential.
    ///
    /// Returns `true` when this request triggered a rotation.
    pub fn record_request(&mut self) -> bool {
        if self.credentials.is_empty() {
            return false;
        }

        self.request_counter += 1;
        if self.request_counter >= self.rotation_threshold {
            debug!(
                requests = self.request_counter,
                threshold = self.rotation_threshold,
                "rotation threshold reached"
            );
            self.rotate();
            return true;
        }
        false
    }

    /// Mark the active credential as failed and rotate immediately.
    pub fn record_failure(&mut self) {
        if self.credentials.is_empty() {
            return;
        }

        if let Some(failed) = self.credentials.get(self.current_index) {
            info!(proxy = %failed, "egress credential failed, rotating");
        }
        self.rotate();
    }

    fn rotate(&mut self) {
        self.current_index = (self.current_index + 1) % self.credentials.len();
        self.request_counter = 0;

        if let Some(next) = self.credentials.get(self.current_index) {
            debug!(proxy = %next, index = self.current_index, "switched egress credential");
        }
    }

    /// Index of the active credential.
    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    /// Requests counted against the active credential since the last rotation.
    #[must_use]
    pub fn request_counter(&self) -> u32 {
        self.request_counter
    }

    /// Scheduled requests per credential.
    #[must_use]
    pub fn rotation_threshold(&self) -> u32 {
        self.rotation_threshold
    }

    /// Number of credentials in the pool.
    #[must_use]
    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    /// Whether the pool is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }
}
