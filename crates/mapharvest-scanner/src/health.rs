//! Per-credential attempt outcomes.
//!
//! Observation only: the rotator never consults these counters.

use crate::error::FailureKind;
use serde::Serialize;
use std::collections::BTreeMap;

/// Attempt outcomes seen on one egress credential.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CredentialStats {
    /// Attempts that completed
    pub successes: u32,
    /// Attempts that failed, any category
    pub failures: u32,
    /// Failures caused by a bot-challenge page
    pub challenges: u32,
    /// Failures caused by a dead browser or tab
    pub crashes: u32,
    /// Navigation timeouts and errors
    pub network_failures: u32,
    /// All attempts
    pub total: u32,
    /// `successes / total` as a percentage
    pub success_rate: f64,
}

impl CredentialStats {
    fn update_rate(&mut self) {
        if self.total > 0 {
            self.success_rate = f64::from(self.successes) / f64::from(self.total) * 100.0;
        }
    }
}

/// Outcome counters keyed by credential id (`address:port`).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CredentialHealth {
    stats: BTreeMap<String, CredentialStats>,
}

impl CredentialHealth {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, credential_id: &str) {
        let stats = self.entry(credential_id);
        stats.successes += 1;
        stats.total += 1;
        stats.update_rate();
    }

    pub fn record_failure(&mut self, credential_id: &str, kind: FailureKind) {
        let stats = self.entry(credential_id);
        stats.failures += 1;
        stats.total += 1;
        match kind {
            FailureKind::Challenge => stats.challenges += 1,
            FailureKind::Crash => stats.crashes += 1,
            FailureKind::Proxy => stats.network_failures += 1,
        }
        stats.update_rate();
    }

    #[must_use]
    pub fn get(&self, credential_id: &str) -> Option<&CredentialStats> {
        self.stats.get(credential_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CredentialStats)> {
        self.stats.iter().map(|(id, stats)| (id.as_str(), stats))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stats.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    fn entry(&mut self, credential_id: &str) -> &mut CredentialStats {
        self.stats.entry(credential_id.to_string()).or_default()
    }
}
