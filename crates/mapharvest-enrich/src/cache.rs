//! Per-website email cache shared by the enrichment workers.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};

/// Cache state for one website URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEntry {
    /// Never fetched, or a fetch is still in flight
    NotChecked,
    /// Fetched, nothing valid found
    NoEmail,
    /// Fetched, email found
    Email(String),
}

/// Website URL to email lookup result.
///
/// Each URL owns a [`OnceCell`]; concurrent callers for the same URL await
/// the first caller's fetch instead of issuing their own.
#[derive(Debug, Default)]
pub struct EmailCache {
    entries: Mutex<HashMap<String, Arc<OnceCell<Option<String>>>>>,
}

impl EmailCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached result for `website`, running `fetch` at most once per URL.
    pub async fn get_or_fetch<F, Fut>(&self, website: &str, fetch: F) -> Option<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<String>>,
    {
        let cell = {
            let mut entries = self.entries.lock().await;
            Arc::clone(entries.entry(website.to_string()).or_default())
        };

        cell.get_or_init(fetch).await.clone()
    }

    /// Current state for `website`.
    pub async fn lookup(&self, website: &str) -> CacheEntry {
        let entries = self.entries.lock().await;
        match entries.get(website).and_then(|cell| cell.get()) {
            None => CacheEntry::NotChecked,
            Some(None) => CacheEntry::NoEmail,
            Some(Some(email)) => CacheEntry::Email(email.clone()),
        }
    }

    /// Number of websites seen.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Whether no website has been seen.
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_lookup_states() {
        let cache = EmailCache::new();
        assert_eq!(cache.lookup("https://a.com").await, CacheEntry::NotChecked);

        cache
            .get_or_fetch("https://a.com", || async { Some("info@a.com".to_string()) })
            .await;
        cache.get_or_fetch("https://b.com", || async { None }).await;

        assert_eq!(
            cache.lookup("https://a.com").await,
            CacheEntry::Email("info@a.com".to_string())
        );
        assert_eq!(cache.lookup("https://b.com").await, CacheEntry::NoEmail);
        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_fetch() {
        let cache = EmailCache::new();
        let fetches = AtomicUsize::new(0);

        let lookups = (0..8).map(|_| {
            cache.get_or_fetch("https://shared.com", || async {
                fetches.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                Some("team@shared.com".to_string())
            })
        });
        let results = futures::future::join_all(lookups).await;

        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        assert!(results
            .iter()
            .all(|r| r.as_deref() == Some("team@shared.com")));
    }
}
