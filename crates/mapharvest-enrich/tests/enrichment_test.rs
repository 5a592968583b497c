//! Enrichment pipeline tests against local `wiremock` servers.

use mapharvest_core::{BusinessRecord, EmailSettings, Field};
use mapharvest_enrich::{CacheEntry, EmailEnricher, EnrichmentUnavailable};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_enricher() -> EmailEnricher {
    let settings = EmailSettings {
        timeout_secs: 1,
        connect_timeout_secs: 1,
        ..EmailSettings::default()
    };
    EmailEnricher::new(settings).expect("build enricher")
}

fn record_with_website(name: &str, website: &str) -> BusinessRecord {
    BusinessRecord {
        name: Field::Value(name.to_string()),
        website: Field::Value(website.to_string()),
        ..BusinessRecord::default()
    }
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(
        format!("<html><body>{body}</body></html>"),
        "text/html; charset=utf-8",
    )
}

#[tokio::test]
async fn homepage_mailto_skips_contact_pages() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<a href="mailto:info@acme.com">Email us</a>"#))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/contact"))
        .respond_with(html("contact@acme.com"))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/about"))
        .respond_with(html("about@acme.com"))
        .expect(0)
        .mount(&server)
        .await;

    let enricher = test_enricher();
    let records = enricher
        .enrich(vec![record_with_website("Acme", &server.uri())])
        .await;

    assert_eq!(records[0].email, Field::Value("info@acme.com".to_string()));
}

#[tokio::test]
async fn falls_back_to_contact_page() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html("<p>Welcome</p>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/contact"))
        .respond_with(html("<p>Write to frontdesk@acmedental.net</p>"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/about"))
        .respond_with(html("about@acmedental.net"))
        .expect(0)
        .mount(&server)
        .await;

    let enricher = test_enricher();
    let email = enricher.find_email(&server.uri()).await;

    assert_eq!(email.as_deref(), Some("frontdesk@acmedental.net"));
}

#[tokio::test]
async fn contact_pages_sit_below_website_path() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/clinic"))
        .respond_with(html("<p>Welcome</p>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/clinic/contact"))
        .respond_with(html("<p>bookings@brightsmile.org</p>"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/contact"))
        .respond_with(html("<p>parent@holdingco.org</p>"))
        .expect(0)
        .mount(&server)
        .await;

    let enricher = test_enricher();
    let email = enricher.find_email(&format!("{}/clinic", server.uri())).await;

    assert_eq!(email.as_deref(), Some("bookings@brightsmile.org"));
}

#[tokio::test]
async fn shared_website_fetched_once() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<a href="mailto:hq@chain-gyms.com">HQ</a>"#))
        .expect(1)
        .mount(&server)
        .await;

    let records: Vec<BusinessRecord> = (0..6)
        .map(|i| record_with_website(&format!("Branch {i}"), &server.uri()))
        .collect();

    let enricher = test_enricher();
    let records = enricher.enrich(records).await;

    assert!(records
        .iter()
        .all(|r| r.email == Field::Value("hq@chain-gyms.com".to_string())));
    assert_eq!(enricher.requests_sent(), 1);
    assert_eq!(
        enricher.cache().lookup(&server.uri()).await,
        CacheEntry::Email("hq@chain-gyms.com".to_string())
    );
}

#[tokio::test]
async fn blocked_site_keeps_sentinel() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let enricher = test_enricher();
    assert_eq!(
        enricher.fetch_email(&server.uri()).await,
        Err(EnrichmentUnavailable::Blocked { status: 403 })
    );

    let records = enricher
        .enrich(vec![record_with_website("Blocked", &server.uri())])
        .await;
    assert_eq!(records[0].email, Field::Unavailable);
    assert_eq!(
        enricher.cache().lookup(&server.uri()).await,
        CacheEntry::NoEmail
    );
}

#[tokio::test]
async fn non_html_response_is_ignored() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(r#"{"email": "json@acme.com"}"#, "application/json"),
        )
        .mount(&server)
        .await;

    let enricher = test_enricher();
    let result = enricher.fetch_email(&server.uri()).await;

    assert!(matches!(result, Err(EnrichmentUnavailable::NotHtml { .. })));
    assert_eq!(enricher.find_email(&server.uri()).await, None);
}

#[tokio::test]
async fn challenge_page_yields_no_email() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(html(
            "Checking your browser - cloudflare challenge - ops@acme.com",
        ))
        .mount(&server)
        .await;

    let enricher = test_enricher();
    assert_eq!(
        enricher.fetch_email(&server.uri()).await,
        Err(EnrichmentUnavailable::Challenge)
    );
}

#[tokio::test]
async fn slow_site_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(html("late@acme.com").set_delay(std::time::Duration::from_secs(3)))
        .mount(&server)
        .await;

    let enricher = test_enricher();
    assert_eq!(
        enricher.fetch_email(&server.uri()).await,
        Err(EnrichmentUnavailable::Timeout)
    );
}

#[tokio::test]
async fn records_without_website_or_with_email_are_untouched() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(html("new@acme.com"))
        .expect(0)
        .mount(&server)
        .await;

    let mut has_email = record_with_website("Has email", &server.uri());
    has_email.email = Field::Value("kept@acme.com".to_string());
    let no_website = BusinessRecord {
        name: Field::Value("No site".to_string()),
        ..BusinessRecord::default()
    };

    let enricher = test_enricher();
    let records = enricher.enrich(vec![has_email, no_website]).await;

    assert_eq!(records[0].email, Field::Value("kept@acme.com".to_string()));
    assert_eq!(records[1].email, Field::Unavailable);
    assert_eq!(enricher.requests_sent(), 0);
}
