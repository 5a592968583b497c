//! Concurrent email enrichment over plain HTTP.

use crate::cache::EmailCache;
use crate::error::{EnrichmentUnavailable, Result};
use crate::extract::{extract_email, looks_like_challenge, truncate_html};
use futures::stream::{self, StreamExt};
use mapharvest_core::{BusinessRecord, EmailSettings, Field};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{redirect, Client, StatusCode};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Visits business websites and fills in missing emails.
pub struct EmailEnricher {
    client: Client,
    settings: EmailSettings,
    cache: EmailCache,
    requests: AtomicUsize,
}

impl EmailEnricher {
    /// Build the shared HTTP client from settings.
    pub fn new(settings: EmailSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .redirect(redirect::Policy::limited(settings.max_redirects))
            .pool_max_idle_per_host(3)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            settings,
            cache: EmailCache::new(),
            requests: AtomicUsize::new(0),
        })
    }

    /// Fill the email field of every record that has a website but no email.
    ///
    /// Records are returned in input order. A website that cannot be read
    /// leaves the sentinel in place.
    pub async fn enrich(&self, mut records: Vec<BusinessRecord>) -> Vec<BusinessRecord> {
        let pending: Vec<(usize, String)> = records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.needs_email())
            .filter_map(|(i, r)| r.website.text().map(|w| (i, w.to_string())))
            .collect();

        if pending.is_empty() {
            return records;
        }

        let total = pending.len();
        let found: Vec<(usize, Option<String>)> = stream::iter(pending)
            .map(|(index, website)| async move { (index, self.find_email(&website).await) })
            .buffer_unordered(self.settings.max_concurrent.max(1))
            .collect()
            .await;

        let mut hits = 0;
        for (index, email) in found {
            if let (Some(email), Some(record)) = (email, records.get_mut(index)) {
                record.email = Field::Value(email);
                hits += 1;
            }
        }

        info!(checked = total, found = hits, "email enrichment finished");
        records
    }

    /// Email for one website, fetched at most once per URL.
    pub async fn find_email(&self, website: &str) -> Option<String> {
        self.cache
            .get_or_fetch(website, || self.search_website(website))
            .await
    }

    /// Homepage first, then each contact path in order.
    async fn search_website(&self, website: &str) -> Option<String> {
        let base = match Url::parse(website) {
            Ok(url) => url,
            Err(e) => {
                debug!(website, error = %EnrichmentUnavailable::InvalidUrl(e.to_string()), "skipping website");
                return None;
            }
        };

        match self.fetch_email(base.as_str()).await {
            Ok(Some(email)) => return Some(email),
            Ok(None) => {}
            Err(reason) => debug!(url = %base, %reason, "homepage unavailable"),
        }

        for path in &self.settings.contact_paths {
            let Some(page) = contact_url(&base, path) else {
                continue;
            };
            match self.fetch_email(page.as_str()).await {
                Ok(Some(email)) => return Some(email),
                Ok(None) => {}
                Err(reason) => debug!(url = %page, %reason, "contact page unavailable"),
            }
        }

        None
    }

    /// Fetch one page and look for an email in it.
    pub async fn fetch_email(
        &self,
        url: &str,
    ) -> std::result::Result<Option<String>, EnrichmentUnavailable> {
        self.requests.fetch_add(1, Ordering::Relaxed);

        let mut response = self
            .client
            .get(url)
            .header(ACCEPT, "text/html")
            .send()
            .await?;

        let status = response.status();
        if matches!(
            status,
            StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE
        ) {
            return Err(EnrichmentUnavailable::Blocked {
                status: status.as_u16(),
            });
        }
        if status != StatusCode::OK {
            return Err(EnrichmentUnavailable::UnexpectedStatus {
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.to_ascii_lowercase().contains("text/html") {
            return Err(EnrichmentUnavailable::NotHtml { content_type });
        }

        let limit = self.settings.max_html_bytes;
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            body.extend_from_slice(&chunk);
            if body.len() >= limit {
                break;
            }
        }

        let text = String::from_utf8_lossy(&body);
        let html = truncate_html(&text, limit);

        if looks_like_challenge(html) {
            return Err(EnrichmentUnavailable::Challenge);
        }

        let email = extract_email(html);
        if let Some(email) = &email {
            debug!(url, email = %email, "email found");
        }
        Ok(email)
    }

    /// The per-website cache.
    #[must_use]
    pub fn cache(&self) -> &EmailCache {
        &self.cache
    }

    /// HTTP requests issued so far.
    #[must_use]
    pub fn requests_sent(&self) -> usize {
        self.requests.load(Ordering::Relaxed)
    }
}

/// `path` appended below the website URL, so `https://x.com/shop` fetches
/// `https://x.com/shop/contact`. Query and fragment are dropped.
fn contact_url(website: &Url, path: &str) -> Option<Url> {
    let mut url = website.clone();
    url.set_query(None);
    url.set_fragment(None);
    url.path_segments_mut()
        .ok()?
        .pop_if_empty()
        .extend(path.split('/').filter(|s| !s.is_empty()));
    Some(url)
}
