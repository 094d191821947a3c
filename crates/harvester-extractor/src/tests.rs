//! Engine tests against scripted sessions

use crate::{
    DelayConfig, ExtractorConfig, FetchEngine, FieldKind, FieldSpec, RateLimiter, RetryPolicy,
    SelectorStrategy, TargetProfile,
};
use harvester_domain::{FieldValue, SessionIdentity, WorkItem};
use harvester_session::{ScriptedSession, ScriptedSite, SessionError, SessionFactory};
use std::time::Duration;

const PRIMARY: &str = "https://shop.test/dp/B0TEST";
const ALTERNATE: &str = "https://shop.test/intl/dp/B0TEST";

const FULL_PAGE: &str = r#"
<html><body><div id="dp">
  <span id="productTitle">  Lámpara de pie  </span>
  <div id="corePriceDisplay_desktop_feature_div">
    <span class="a-price-whole">1.299,</span><span class="a-price-fraction">99</span>
  </div>
  <img id="landingImage" data-a-dynamic-image='{"https://m.media-amazon.com/images/I/71a._AC_SX300_.jpg":[300,300],"https://m.media-amazon.com/images/I/71a._AC_SX679_.jpg":[679,679]}'>
  <ul>
    <li class="imageThumbnail"><img src="https://m.media-amazon.com/images/I/81b._AC_US40_.jpg" data-old-hires="https://m.media-amazon.com/images/I/81b._AC_SL1500_.jpg"></li>
    <li class="imageThumbnail"><img src="https://m.media-amazon.com/images/G/dp-play-icon-overlay.png"></li>
  </ul>
  <div id="ppd">En stock. Envío gratis.</div>
</div></body></html>
"#;

fn profile() -> TargetProfile {
    TargetProfile {
        url_template: "https://shop.test/dp/{key}".to_string(),
        alternate_url_templates: Vec::new(),
        ..TargetProfile::default()
    }
}

fn engine(profile: TargetProfile) -> FetchEngine {
    let config = ExtractorConfig {
        retry: RetryPolicy::immediate(3),
        ..ExtractorConfig::default()
    };
    FetchEngine::new(profile, config).unwrap()
}

async fn session(site: &ScriptedSite) -> ScriptedSession {
    site.create(0, SessionIdentity::new("agent", "es-ES")).await.unwrap()
}

fn limiter() -> RateLimiter {
    RateLimiter::new(DelayConfig::none())
}

#[tokio::test]
async fn test_full_page_extraction() {
    let site = ScriptedSite::new();
    site.add_page(PRIMARY, FULL_PAGE);
    let mut session = session(&site).await;

    let result = engine(profile())
        .extract(&mut session, &mut limiter(), &WorkItem::new("B0TEST"))
        .await
        .unwrap();

    assert_eq!(result.key, "B0TEST");
    assert_eq!(result.attempts, 1);
    assert_eq!(result.source_url, PRIMARY);
    assert_eq!(
        result.field("title"),
        Some(&FieldValue::Text("Lámpara de pie".to_string()))
    );
    assert_eq!(result.field("price"), Some(&FieldValue::Number(1299.99)));
    assert_eq!(
        result.field("image"),
        Some(&FieldValue::List(vec![
            "https://m.media-amazon.com/images/I/71a.jpg".to_string(),
            "https://m.media-amazon.com/images/I/81b.jpg".to_string(),
        ]))
    );
    assert_eq!(result.field("available"), Some(&FieldValue::Flag(true)));
}

#[tokio::test]
async fn test_only_primary_price_present() {
    let site = ScriptedSite::new();
    site.add_page(
        PRIMARY,
        r#"<div id="dp"><div id="corePriceDisplay_desktop_feature_div">
             <span class="a-price-whole">19,</span><span class="a-price-fraction">95</span>
           </div></div>"#,
    );
    let mut session = session(&site).await;

    let result = engine(profile())
        .extract(&mut session, &mut limiter(), &WorkItem::new("B0TEST"))
        .await
        .unwrap();

    assert_eq!(result.fields.len(), 1);
    assert_eq!(result.field("price"), Some(&FieldValue::Number(19.95)));
    assert!(result.field("title").is_none());
    assert!(result.field("image").is_none());
}

#[tokio::test]
async fn test_fallback_strategy_used_when_primary_absent() {
    let site = ScriptedSite::new();
    site.add_page(
        PRIMARY,
        r#"<div id="dp"><div id="corePriceDisplay_desktop_feature_div">
             <span class="a-offscreen">24,50 €</span>
           </div></div>"#,
    );
    let mut session = session(&site).await;

    let result = engine(profile())
        .extract(&mut session, &mut limiter(), &WorkItem::new("B0TEST"))
        .await
        .unwrap();

    assert_eq!(result.field("price"), Some(&FieldValue::Number(24.5)));
}

#[tokio::test]
async fn test_unavailable_marker() {
    let site = ScriptedSite::new();
    site.add_page(
        PRIMARY,
        r#"<div id="dp"><div id="ppd">No disponible por el momento.</div></div>"#,
    );
    let mut session = session(&site).await;

    let result = engine(profile())
        .extract(&mut session, &mut limiter(), &WorkItem::new("B0TEST"))
        .await
        .unwrap();

    assert_eq!(result.field("available"), Some(&FieldValue::Flag(false)));
}

#[tokio::test]
async fn test_two_transient_failures_then_success() {
    let site = ScriptedSite::new();
    site.add_page(PRIMARY, FULL_PAGE);
    site.fail_first(PRIMARY, 2, SessionError::Network("connection reset".into()));
    let mut session = session(&site).await;

    let result = engine(profile())
        .extract(&mut session, &mut limiter(), &WorkItem::new("B0TEST"))
        .await
        .unwrap();

    assert_eq!(result.attempts, 3);
    assert_eq!(site.navigation_count(PRIMARY), 3);
}

#[tokio::test]
async fn test_retries_are_bounded() {
    let site = ScriptedSite::new();
    site.add_page(PRIMARY, FULL_PAGE);
    site.fail_first(PRIMARY, 10, SessionError::Blocked(503));
    let mut session = session(&site).await;

    let failure = engine(profile())
        .extract(&mut session, &mut limiter(), &WorkItem::new("B0TEST"))
        .await
        .unwrap_err();

    assert_eq!(failure.key, "B0TEST");
    assert_eq!(failure.attempts, 3);
    assert!(failure.reason.contains("503"));
    assert_eq!(site.navigation_count(PRIMARY), 3);
}

#[tokio::test]
async fn test_permanent_error_not_retried() {
    let site = ScriptedSite::new();
    let mut session = session(&site).await;

    let failure = engine(profile())
        .extract(&mut session, &mut limiter(), &WorkItem::new("B0TEST"))
        .await
        .unwrap_err();

    assert_eq!(failure.attempts, 1);
    assert_eq!(site.navigation_count(PRIMARY), 1);
}

#[tokio::test]
async fn test_missing_ready_selector_is_retried() {
    let site = ScriptedSite::new();
    site.add_page(PRIMARY, "<p>Robot check</p>");
    let mut session = session(&site).await;

    let failure = engine(profile())
        .extract(&mut session, &mut limiter(), &WorkItem::new("B0TEST"))
        .await
        .unwrap_err();

    assert_eq!(failure.attempts, 3);
    assert!(failure.reason.contains("#dp"));
}

#[tokio::test]
async fn test_alternate_url_when_primary_yields_nothing() {
    let site = ScriptedSite::new();
    site.add_page(PRIMARY, r#"<div id="dp">Lo sentimos</div>"#);
    site.add_page(ALTERNATE, FULL_PAGE);
    let mut session = session(&site).await;

    let mut profile = profile();
    profile.alternate_url_templates = vec!["https://shop.test/intl/dp/{key}".to_string()];

    let result = engine(profile)
        .extract(&mut session, &mut limiter(), &WorkItem::new("B0TEST"))
        .await
        .unwrap();

    assert_eq!(result.source_url, ALTERNATE);
    assert_eq!(result.attempts, 1);
    assert!(result.field("price").is_some());
}

#[tokio::test]
async fn test_alternate_not_visited_when_primary_has_fields() {
    let site = ScriptedSite::new();
    site.add_page(PRIMARY, FULL_PAGE);
    site.add_page(ALTERNATE, FULL_PAGE);
    let mut session = session(&site).await;

    let mut profile = profile();
    profile.alternate_url_templates = vec!["https://shop.test/intl/dp/{key}".to_string()];

    engine(profile)
        .extract(&mut session, &mut limiter(), &WorkItem::new("B0TEST"))
        .await
        .unwrap();

    assert_eq!(site.navigation_count(ALTERNATE), 0);
}

#[tokio::test]
async fn test_all_urls_empty_gives_empty_result() {
    let site = ScriptedSite::new();
    site.add_page(PRIMARY, r#"<div id="dp"></div>"#);
    let mut session = session(&site).await;

    let mut profile = profile();
    profile.alternate_url_templates = vec!["https://shop.test/intl/dp/{key}".to_string()];

    let result = engine(profile)
        .extract(&mut session, &mut limiter(), &WorkItem::new("B0TEST"))
        .await
        .unwrap();

    assert!(result.is_empty());
    assert_eq!(result.source_url, PRIMARY);
    assert_eq!(site.navigation_count(ALTERNATE), 1);
}

fn with_alternate(mut profile: TargetProfile) -> TargetProfile {
    profile.alternate_url_templates = vec!["https://shop.test/intl/dp/{key}".to_string()];
    profile
}

const UNAVAILABLE_PAGE: &str = r#"<div id="dp">
  <span id="productTitle">Lámpara de pie</span>
  <div id="ppd">No disponible por el momento.</div>
</div>"#;

#[tokio::test]
async fn test_transient_primary_error_not_hidden_by_empty_alternate() {
    let site = ScriptedSite::new();
    site.add_page(PRIMARY, FULL_PAGE);
    site.fail_first(PRIMARY, 1, SessionError::Network("connection reset".into()));
    site.add_page(ALTERNATE, r#"<div id="dp"></div>"#);
    let mut session = session(&site).await;

    let result = engine(with_alternate(profile()))
        .extract(&mut session, &mut limiter(), &WorkItem::new("B0TEST"))
        .await
        .unwrap();

    assert_eq!(result.attempts, 2);
    assert_eq!(result.source_url, PRIMARY);
    assert_eq!(result.field("price"), Some(&FieldValue::Number(1299.99)));
    assert_eq!(site.navigation_count(PRIMARY), 2);
}

#[tokio::test]
async fn test_transient_primary_error_not_hidden_by_permanent_alternate() {
    let site = ScriptedSite::new();
    site.add_page(PRIMARY, FULL_PAGE);
    site.fail_first(PRIMARY, 10, SessionError::Blocked(503));
    let mut session = session(&site).await;

    let failure = engine(with_alternate(profile()))
        .extract(&mut session, &mut limiter(), &WorkItem::new("B0TEST"))
        .await
        .unwrap_err();

    assert_eq!(failure.attempts, 3);
    assert!(failure.reason.contains("503"));
}

#[tokio::test]
async fn test_unavailable_primary_falls_back_to_alternate() {
    let site = ScriptedSite::new();
    site.add_page(PRIMARY, UNAVAILABLE_PAGE);
    site.add_page(ALTERNATE, FULL_PAGE);
    let mut session = session(&site).await;

    let result = engine(with_alternate(profile()))
        .extract(&mut session, &mut limiter(), &WorkItem::new("B0TEST"))
        .await
        .unwrap();

    assert_eq!(result.source_url, ALTERNATE);
    assert_eq!(result.field("available"), Some(&FieldValue::Flag(true)));
    assert_eq!(site.navigation_count(ALTERNATE), 1);
}

#[tokio::test]
async fn test_unavailable_everywhere_keeps_primary_result() {
    let site = ScriptedSite::new();
    site.add_page(PRIMARY, UNAVAILABLE_PAGE);
    site.add_page(ALTERNATE, UNAVAILABLE_PAGE);
    let mut session = session(&site).await;

    let result = engine(with_alternate(profile()))
        .extract(&mut session, &mut limiter(), &WorkItem::new("B0TEST"))
        .await
        .unwrap();

    assert_eq!(result.source_url, PRIMARY);
    assert_eq!(result.attempts, 1);
    assert_eq!(result.field("available"), Some(&FieldValue::Flag(false)));
    assert!(result.field("title").is_some());
}

#[tokio::test]
async fn test_unavailable_fallback_can_be_disabled() {
    let site = ScriptedSite::new();
    site.add_page(PRIMARY, UNAVAILABLE_PAGE);
    site.add_page(ALTERNATE, FULL_PAGE);
    let mut session = session(&site).await;

    let mut profile = with_alternate(profile());
    profile.fallback_when_unavailable = false;

    let result = engine(profile)
        .extract(&mut session, &mut limiter(), &WorkItem::new("B0TEST"))
        .await
        .unwrap();

    assert_eq!(result.field("available"), Some(&FieldValue::Flag(false)));
    assert_eq!(site.navigation_count(ALTERNATE), 0);
}

#[tokio::test]
async fn test_metadata_placeholders_in_template() {
    let site = ScriptedSite::new();
    site.add_page("https://shop.test/es/item/K1", r#"<h1 class="name">Silla</h1>"#);
    let mut session = session(&site).await;

    let profile = TargetProfile {
        version: "2".to_string(),
        url_template: "https://shop.test/{market}/item/{key}".to_string(),
        alternate_url_templates: Vec::new(),
        ready_selector: None,
        fallback_when_unavailable: false,
        fields: vec![FieldSpec::new(
            "name",
            FieldKind::Text,
            vec![SelectorStrategy::text("h1.name")],
        )],
    };
    let item = WorkItem::with_metadata("K1", vec![("market".to_string(), "es".to_string())]);

    let result = engine(profile)
        .extract(&mut session, &mut limiter(), &item)
        .await
        .unwrap();

    assert_eq!(result.field("name"), Some(&FieldValue::Text("Silla".to_string())));
}

#[tokio::test(start_paused = true)]
async fn test_backoff_between_attempts() {
    let site = ScriptedSite::new();
    site.add_page(PRIMARY, FULL_PAGE);
    site.fail_first(PRIMARY, 2, SessionError::Network("reset".into()));
    let mut session = session(&site).await;

    let engine = FetchEngine::new(profile(), ExtractorConfig::default()).unwrap();
    let started = tokio::time::Instant::now();

    let result = engine
        .extract(&mut session, &mut limiter(), &WorkItem::new("B0TEST"))
        .await
        .unwrap();

    assert_eq!(result.attempts, 3);
    // Two backoffs of at least two seconds each
    assert!(started.elapsed() >= Duration::from_secs(4));
    assert!(started.elapsed() <= Duration::from_secs(10));
}
