//! Integration tests for the redirect endpoint
//!
//! These tests verify the entire application stack including:
//! - HTTP routing
//! - The waterfall precedence chain over a real database
//! - Error handling

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::{Duration as TimeDelta, Utc};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use tower::ServiceExt;

use linkrouter::database::{init_db, AppState};
use linkrouter::model::{AbTest, AbTestStatus, Destination, HealthStatus, Schedule, ShortLink};
use linkrouter::route::create_app;
use linkrouter::router::{ThreadRngDraw, VariantDraw, WaterfallRouter};
use linkrouter::store::RedbLinkStore;

/// Variant draw pinned to a fixed value
struct FixedDraw(f64);

impl VariantDraw for FixedDraw {
    fn draw(&self) -> f64 {
        self.0
    }
}

/// Helper to create a test application over a temporary database
fn setup_test_app(draw: Arc<dyn VariantDraw>) -> (axum::Router, RedbLinkStore, NamedTempFile) {
    let temp_db = NamedTempFile::new().expect("Failed to create temp file");
    let db_path = temp_db.path().to_str().unwrap();

    let db = init_db(db_path).expect("Failed to initialize test database");
    let store = RedbLinkStore::new(Arc::new(db));

    let router = WaterfallRouter::with_parts(
        Arc::new(store.clone()),
        draw,
        Duration::from_millis(50),
    );
    let state = AppState {
        router: Arc::new(router),
    };

    (create_app(state), store, temp_db)
}

/// Helper function to parse response body as JSON
async fn response_json(body: Body) -> Value {
    let bytes = body
        .collect()
        .await
        .expect("Failed to read response body")
        .to_bytes();

    serde_json::from_slice(&bytes).expect("Failed to parse JSON")
}

fn seed_link(store: &RedbLinkStore, code: &str, is_active: bool, fallback_url: Option<&str>) {
    store
        .put_short_link(&ShortLink {
            short_code: code.to_string(),
            original_url: "https://store.example/original".to_string(),
            fallback_url: fallback_url.map(str::to_string),
            is_active,
            created_at: Utc::now(),
        })
        .expect("Failed to seed short link");
}

fn seed_destination(
    store: &RedbLinkStore,
    code: &str,
    id: &str,
    priority: u32,
    status: Option<HealthStatus>,
    checked_minutes_ago: Option<i64>,
) {
    store
        .put_destination(&Destination {
            id: id.to_string(),
            short_code: code.to_string(),
            url: format!("https://store.example/{}", id),
            priority,
            health_status: status,
            last_health_check_at: checked_minutes_ago
                .map(|minutes| Utc::now() - TimeDelta::minutes(minutes)),
        })
        .expect("Failed to seed destination");
}

async fn get(app: axum::Router, uri: &str) -> axum::response::Response {
    app.oneshot(
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn test_redirect_healthy_primary() {
    let (app, store, _temp_db) = setup_test_app(Arc::new(ThreadRngDraw));

    seed_link(&store, "abc123", true, Some("https://store.example/safe"));
    seed_destination(&store, "abc123", "main", 1, Some(HealthStatus::Healthy), Some(1));

    let response = get(app, "/abc123").await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        response.headers().get("location").unwrap(),
        "https://store.example/main"
    );
}

#[tokio::test]
async fn test_redirect_unknown_code() {
    let (app, _store, _temp_db) = setup_test_app(Arc::new(ThreadRngDraw));

    let response = get(app, "/nonexistent").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = response_json(response.into_body()).await;
    assert_eq!(body["error"], "Short link not found or inactive");
}

#[tokio::test]
async fn test_redirect_inactive_link() {
    let (app, store, _temp_db) = setup_test_app(Arc::new(ThreadRngDraw));

    seed_link(&store, "paused", false, None);
    seed_destination(&store, "paused", "main", 1, Some(HealthStatus::Healthy), Some(1));

    let response = get(app, "/paused").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_schedule_override_wins() {
    let (app, store, _temp_db) = setup_test_app(Arc::new(ThreadRngDraw));

    seed_link(&store, "abc123", true, None);
    seed_destination(&store, "abc123", "main", 1, Some(HealthStatus::Healthy), Some(1));
    store
        .put_schedule(&Schedule {
            id: "sched_1".to_string(),
            short_code: "abc123".to_string(),
            destination_url: "https://store.example/flash-sale".to_string(),
            starts_at: Utc::now() - TimeDelta::hours(1),
            ends_at: Utc::now() + TimeDelta::hours(1),
            created_at: Utc::now() - TimeDelta::days(1),
        })
        .expect("Failed to seed schedule");

    let response = get(app, "/abc123").await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        response.headers().get("location").unwrap(),
        "https://store.example/flash-sale"
    );
}

#[tokio::test]
async fn test_overlapping_schedules_use_most_recently_created() {
    let (app, store, _temp_db) = setup_test_app(Arc::new(ThreadRngDraw));

    seed_link(&store, "abc123", true, None);
    for (id, url, created_days_ago) in [
        ("sched_old", "https://store.example/old-sale", 10),
        ("sched_new", "https://store.example/new-sale", 1),
    ] {
        store
            .put_schedule(&Schedule {
                id: id.to_string(),
                short_code: "abc123".to_string(),
                destination_url: url.to_string(),
                starts_at: Utc::now() - TimeDelta::hours(1),
                ends_at: Utc::now() + TimeDelta::hours(1),
                created_at: Utc::now() - TimeDelta::days(created_days_ago),
            })
            .expect("Failed to seed schedule");
    }

    let response = get(app, "/abc123").await;

    assert_eq!(
        response.headers().get("location").unwrap(),
        "https://store.example/new-sale"
    );
}

#[tokio::test]
async fn test_ab_variant_selection_and_click_count() {
    // Pinned draw of 10 against a weight of 50 always selects variant A
    let (app, store, _temp_db) = setup_test_app(Arc::new(FixedDraw(10.0)));

    seed_link(&store, "abc123", true, None);
    store
        .put_ab_test(&AbTest {
            id: "test_1".to_string(),
            short_code: "abc123".to_string(),
            status: AbTestStatus::Running,
            variant_a_url: "https://store.example/variant-a".to_string(),
            variant_b_url: "https://store.example/variant-b".to_string(),
            variant_a_weight: 50,
            variant_b_weight: 50,
            variant_a_clicks: 0,
            variant_b_clicks: 0,
        })
        .expect("Failed to seed A/B test");

    let response = get(app, "/abc123").await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        response.headers().get("location").unwrap(),
        "https://store.example/variant-a"
    );

    // The click increment is detached; give it a moment to land
    tokio::time::sleep(Duration::from_millis(100)).await;

    let test = store
        .get_ab_test("abc123")
        .expect("Failed to read A/B test")
        .expect("A/B test missing");
    assert_eq!(test.variant_a_clicks, 1);
    assert_eq!(test.variant_b_clicks, 0);
}

#[tokio::test]
async fn test_broken_primary_falls_back_to_healthy_backup() {
    let (app, store, _temp_db) = setup_test_app(Arc::new(ThreadRngDraw));

    seed_link(&store, "abc123", true, Some("https://store.example/safe"));
    seed_destination(&store, "abc123", "main", 1, Some(HealthStatus::Broken), Some(2));
    seed_destination(&store, "abc123", "backup", 2, Some(HealthStatus::Healthy), Some(2));

    let response = get(app, "/abc123").await;

    assert_eq!(
        response.headers().get("location").unwrap(),
        "https://store.example/backup"
    );
}

#[tokio::test]
async fn test_failsafe_when_every_destination_is_bad() {
    let (app, store, _temp_db) = setup_test_app(Arc::new(ThreadRngDraw));

    seed_link(&store, "abc123", true, Some("https://store.example/safe"));
    seed_destination(&store, "abc123", "main", 1, Some(HealthStatus::Broken), Some(2));
    seed_destination(&store, "abc123", "backup", 2, Some(HealthStatus::OutOfStock), Some(10));

    let response = get(app, "/abc123").await;

    assert_eq!(
        response.headers().get("location").unwrap(),
        "https://store.example/safe"
    );
}

#[tokio::test]
async fn test_failsafe_uses_original_url_without_fallback() {
    let (app, store, _temp_db) = setup_test_app(Arc::new(ThreadRngDraw));

    seed_link(&store, "abc123", true, None);

    let response = get(app, "/abc123").await;

    assert_eq!(
        response.headers().get("location").unwrap(),
        "https://store.example/original"
    );
}

#[tokio::test]
async fn test_tracking_params_survive_redirect() {
    let (app, store, _temp_db) = setup_test_app(Arc::new(ThreadRngDraw));

    seed_link(&store, "abc123", true, None);
    seed_destination(&store, "abc123", "main", 1, Some(HealthStatus::Healthy), Some(1));

    let response = get(app, "/abc123?utm_source=newsletter&utm_campaign=spring").await;

    assert_eq!(
        response.headers().get("location").unwrap(),
        "https://store.example/main?utm_source=newsletter&utm_campaign=spring"
    );
}

#[tokio::test]
async fn test_destination_order_is_priority_then_id() {
    let (app, store, _temp_db) = setup_test_app(Arc::new(ThreadRngDraw));

    seed_link(&store, "abc123", true, None);
    // Seeded out of order; the store must yield priority order with an id
    // tie-break at priority 2.
    seed_destination(&store, "abc123", "z-late", 2, Some(HealthStatus::Healthy), Some(1));
    seed_destination(&store, "abc123", "a-early", 2, Some(HealthStatus::Healthy), Some(1));
    seed_destination(&store, "abc123", "main", 1, Some(HealthStatus::Broken), Some(2));

    let response = get(app, "/abc123").await;

    assert_eq!(
        response.headers().get("location").unwrap(),
        "https://store.example/a-early"
    );
}
