use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use tokio::sync::broadcast;
use tokio_stream::StreamExt;
use tower::ServiceExt;

use voltshare::config::AppConfig;
use voltshare::db;
use voltshare::services::realtime::SelfMutationGuard;
use voltshare::state::AppState;

// ── Helpers ──

fn test_state() -> Arc<AppState> {
    let config = AppConfig {
        port: 3000,
        database_url: ":memory:".to_string(),
    };
    let conn = db::init_db(":memory:").unwrap();
    let (booking_tx, _) = broadcast::channel(64);
    Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config,
        booking_tx,
        guard: SelfMutationGuard::default(),
    })
}

fn app() -> Router {
    voltshare::router(test_state())
}

fn json_request(method: &str, uri: &str, user: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json");
    if let Some(user) = user {
        builder = builder.header("X-User-Id", user);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn signup(app: &Router, user_id: &str, role: &str) {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/signup",
            None,
            serde_json::json!({
                "user_id": user_id,
                "email": format!("{user_id}@example.com"),
                "name": user_id,
                "role": role,
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
}

fn charger_input() -> serde_json::Value {
    serde_json::json!({
        "title": "Garage fast charger",
        "address": "12 MG Road, Bengaluru",
        "pincode": "560001",
        "price_per_hour": 50,
        "charger_type": "ccs",
        "power_output": 50.0,
        "available_start": "08:00",
        "available_end": "18:00",
    })
}

/// Signs up a host and a driver and lists one charger; returns the charger id.
async fn seed_marketplace(app: &Router) -> String {
    signup(app, "host-1", "host").await;
    signup(app, "driver-1", "driver").await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/chargers",
            Some("host-1"),
            charger_input(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    body["charger"]["id"].as_str().unwrap().to_string()
}

async fn book(
    app: &Router,
    driver: &str,
    charger_id: &str,
    date: &str,
    start: &str,
    end: &str,
) -> axum::response::Response {
    app.clone()
        .oneshot(json_request(
            "POST",
            "/api/bookings",
            Some(driver),
            serde_json::json!({
                "charger_id": charger_id,
                "booking_date": date,
                "start_time": start,
                "end_time": end,
            }),
        ))
        .await
        .unwrap()
}

async fn transition(
    app: &Router,
    user: &str,
    booking_id: &str,
    action: &str,
) -> axum::response::Response {
    app.clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/bookings/{booking_id}/{action}"),
            Some(user),
            serde_json::json!({}),
        ))
        .await
        .unwrap()
}

// ── Health ──

#[tokio::test]
async fn test_health() {
    let response = app().oneshot(get_request("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// ── Users ──

#[tokio::test]
async fn test_signup_and_lookup() {
    let app = app();
    signup(&app, "driver-1", "driver").await;

    let response = app
        .oneshot(get_request("/api/users/driver-1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["role"], "driver");
    assert_eq!(body["email"], "driver-1@example.com");
}

#[tokio::test]
async fn test_duplicate_signup_fails() {
    let app = app();
    signup(&app, "driver-1", "driver").await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/auth/signup",
            None,
            serde_json::json!({
                "user_id": "driver-1",
                "email": "other@example.com",
                "name": "Other",
                "role": "driver",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_signup_rejects_unknown_role() {
    let response = app()
        .oneshot(json_request(
            "POST",
            "/api/auth/signup",
            None,
            serde_json::json!({
                "user_id": "u-1",
                "email": "u@example.com",
                "name": "U",
                "role": "admin",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_user_is_404() {
    let response = app().oneshot(get_request("/api/users/ghost")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ── Chargers ──

#[tokio::test]
async fn test_driver_cannot_list_a_charger() {
    let app = app();
    signup(&app, "driver-1", "driver").await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/chargers",
            Some("driver-1"),
            charger_input(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_charger_validation() {
    let app = app();
    signup(&app, "host-1", "host").await;

    let mut bad = charger_input();
    bad["pincode"] = serde_json::json!("12");
    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/chargers", Some("host-1"), bad))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let mut bad = charger_input();
    bad["available_end"] = serde_json::json!("08:00");
    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/chargers", Some("host-1"), bad))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let mut bad = charger_input();
    bad["charger_type"] = serde_json::json!("tesla");
    let response = app
        .oneshot(json_request("POST", "/api/chargers", Some("host-1"), bad))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_charger_detail_includes_host_name() {
    let app = app();
    let charger_id = seed_marketplace(&app).await;

    let response = app
        .oneshot(get_request(&format!("/api/chargers/{charger_id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["host_name"], "host-1");
    assert_eq!(body["status"], "active");
}

#[tokio::test]
async fn test_search_filters_compose() {
    let app = app();
    seed_marketplace(&app).await;

    let response = app
        .clone()
        .oneshot(get_request(
            "/api/chargers/search?pincode=5600&charger_type=ccs&min_power=22",
        ))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body.as_array().unwrap().len(), 1);

    let response = app
        .clone()
        .oneshot(get_request("/api/chargers/search?charger_type=wall"))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert!(body.as_array().unwrap().is_empty());

    let response = app
        .oneshot(get_request("/api/chargers/search?max_price=20"))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_only_owner_updates_charger() {
    let app = app();
    let charger_id = seed_marketplace(&app).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/api/chargers/{charger_id}"),
            Some("driver-1"),
            charger_input(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let mut update = charger_input();
    update["price_per_hour"] = serde_json::json!(80);
    update["status"] = serde_json::json!("paused");
    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/api/chargers/{charger_id}"),
            Some("host-1"),
            update,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["charger"]["price_per_hour"], 80);
    assert_eq!(body["charger"]["status"], "paused");

    // Paused chargers drop out of search results
    let response = app
        .oneshot(get_request("/api/chargers/search"))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_field_only_update_keeps_charger_paused() {
    let app = app();
    let charger_id = seed_marketplace(&app).await;

    let mut update = charger_input();
    update["status"] = serde_json::json!("paused");
    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/api/chargers/{charger_id}"),
            Some("host-1"),
            update,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // A price-only update with no status field must not re-activate it
    let mut update = charger_input();
    update["price_per_hour"] = serde_json::json!(120);
    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/api/chargers/{charger_id}"),
            Some("host-1"),
            update,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["charger"]["price_per_hour"], 120);
    assert_eq!(body["charger"]["status"], "paused");

    let response = app
        .oneshot(get_request(&format!("/api/chargers/{charger_id}")))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["status"], "paused");
}

#[tokio::test]
async fn test_only_owner_deletes_charger() {
    let app = app();
    let charger_id = seed_marketplace(&app).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/chargers/{charger_id}"))
                .header("X-User-Id", "driver-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/chargers/{charger_id}"))
                .header("X-User-Id", "host-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(get_request(&format!("/api/chargers/{charger_id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ── Bookings ──

#[tokio::test]
async fn test_booking_price_is_server_computed() {
    let app = app();
    let charger_id = seed_marketplace(&app).await;

    // Client sends a bogus total_price; the stored value comes from the rate.
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/bookings",
            Some("driver-1"),
            serde_json::json!({
                "charger_id": charger_id,
                "booking_date": "2030-06-16",
                "start_time": "12:00",
                "end_time": "14:00",
                "total_price": 1,
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["booking"]["total_price"], 100);
    assert_eq!(body["booking"]["status"], "pending");
}

#[tokio::test]
async fn test_overlapping_booking_conflicts() {
    let app = app();
    let charger_id = seed_marketplace(&app).await;

    let response = book(&app, "driver-1", &charger_id, "2030-06-16", "10:00", "12:00").await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = book(&app, "driver-1", &charger_id, "2030-06-16", "11:00", "13:00").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = book(&app, "driver-1", &charger_id, "2030-06-16", "12:00", "14:00").await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_cancelled_booking_frees_the_slot() {
    let app = app();
    let charger_id = seed_marketplace(&app).await;

    let response = book(&app, "driver-1", &charger_id, "2030-06-16", "10:00", "12:00").await;
    let body = body_json(response).await;
    let booking_id = body["booking"]["id"].as_str().unwrap().to_string();

    let response = transition(&app, "driver-1", &booking_id, "cancel").await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = book(&app, "driver-1", &charger_id, "2030-06-16", "10:00", "12:00").await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_booking_outside_window_fails() {
    let app = app();
    let charger_id = seed_marketplace(&app).await;

    let response = book(&app, "driver-1", &charger_id, "2030-06-16", "06:00", "08:00").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_booking_unknown_charger_is_404() {
    let app = app();
    seed_marketplace(&app).await;

    let response = book(&app, "driver-1", "ghost", "2030-06-16", "10:00", "12:00").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_booking_paused_charger_fails() {
    let app = app();
    let charger_id = seed_marketplace(&app).await;

    let mut update = charger_input();
    update["status"] = serde_json::json!("paused");
    app.clone()
        .oneshot(json_request(
            "PUT",
            &format!("/api/chargers/{charger_id}"),
            Some("host-1"),
            update,
        ))
        .await
        .unwrap();

    let response = book(&app, "driver-1", &charger_id, "2030-06-16", "10:00", "12:00").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_host_accept_reject_flow() {
    let app = app();
    let charger_id = seed_marketplace(&app).await;

    let response = book(&app, "driver-1", &charger_id, "2030-06-16", "10:00", "12:00").await;
    let body = body_json(response).await;
    let booking_id = body["booking"]["id"].as_str().unwrap().to_string();

    let response = transition(&app, "host-1", &booking_id, "accept").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["booking"]["status"], "confirmed");

    // Accepting twice is an invalid transition
    let response = transition(&app, "host-1", &booking_id, "accept").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // A second booking can still be rejected
    let response = book(&app, "driver-1", &charger_id, "2030-06-16", "14:00", "15:00").await;
    let body = body_json(response).await;
    let second_id = body["booking"]["id"].as_str().unwrap().to_string();

    let response = transition(&app, "host-1", &second_id, "reject").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["booking"]["status"], "cancelled");
}

#[tokio::test]
async fn test_stranger_cannot_cancel() {
    let app = app();
    let charger_id = seed_marketplace(&app).await;
    signup(&app, "driver-2", "driver").await;

    let response = book(&app, "driver-1", &charger_id, "2030-06-16", "10:00", "12:00").await;
    let body = body_json(response).await;
    let booking_id = body["booking"]["id"].as_str().unwrap().to_string();

    let response = transition(&app, "driver-2", &booking_id, "cancel").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_driver_and_host_booking_views() {
    let app = app();
    let charger_id = seed_marketplace(&app).await;

    let response = book(&app, "driver-1", &charger_id, "2030-06-16", "10:00", "12:00").await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .clone()
        .oneshot(get_request("/api/bookings?driver_id=driver-1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let bookings = body.as_array().unwrap();
    assert_eq!(bookings.len(), 1);
    assert_eq!(bookings[0]["charger_title"], "Garage fast charger");
    assert_eq!(bookings[0]["host_name"], "host-1");
    assert_eq!(bookings[0]["phase"], "upcoming");

    let response = app
        .clone()
        .oneshot(get_request("/api/bookings/host?host_id=host-1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let bookings = body.as_array().unwrap();
    assert_eq!(bookings.len(), 1);
    assert_eq!(bookings[0]["driver_email"], "driver-1@example.com");

    let response = app
        .oneshot(get_request("/api/bookings/host?host_id=host-1&status=confirmed"))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_get_booking_detail() {
    let app = app();
    let charger_id = seed_marketplace(&app).await;

    let response = book(&app, "driver-1", &charger_id, "2030-06-16", "10:00", "12:00").await;
    let body = body_json(response).await;
    let booking_id = body["booking"]["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(get_request(&format!("/api/bookings/{booking_id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["charger_id"], charger_id.as_str());
    assert_eq!(body["price_per_hour"], 50);

    let response = app
        .oneshot(get_request("/api/bookings/ghost"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_free_slots_reflect_bookings() {
    let app = app();
    let charger_id = seed_marketplace(&app).await;

    book(&app, "driver-1", &charger_id, "2030-06-16", "10:00", "12:00").await;

    let response = app
        .clone()
        .oneshot(get_request(&format!(
            "/api/chargers/{charger_id}/slots?date=2030-06-16"
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let slots: Vec<&str> = body["slots"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s.as_str().unwrap())
        .collect();
    assert!(!slots.contains(&"10:00"));
    assert!(!slots.contains(&"11:00"));
    assert!(slots.contains(&"08:00"));
    assert!(slots.contains(&"12:00"));

    // Another date is unaffected
    let response = app
        .oneshot(get_request(&format!(
            "/api/chargers/{charger_id}/slots?date=2030-06-17"
        )))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["slots"].as_array().unwrap().len(), 10);
}

// ── Change stream ──

/// Reads the SSE body until `count` booking_change payloads have arrived,
/// skipping keepalive comments and partial frames.
async fn collect_change_events(
    body: axum::body::Body,
    count: usize,
) -> Vec<serde_json::Value> {
    let mut stream = body.into_data_stream();
    let mut buf = String::new();
    loop {
        let complete = buf.rsplit_once('\n').map(|(head, _)| head).unwrap_or("");
        let events: Vec<serde_json::Value> = complete
            .lines()
            .filter_map(|line| line.strip_prefix("data: "))
            .filter_map(|data| serde_json::from_str(data).ok())
            .collect();
        if events.len() >= count {
            return events;
        }

        let chunk = tokio::time::timeout(std::time::Duration::from_secs(5), stream.next())
            .await
            .expect("timed out waiting for change events")
            .expect("change stream ended unexpectedly")
            .unwrap();
        buf.push_str(std::str::from_utf8(&chunk).unwrap());
    }
}

#[tokio::test]
async fn test_change_stream_tags_self_mutations() {
    let app = app();
    let charger_id = seed_marketplace(&app).await;

    // Subscribe first so the broadcast receiver exists before the mutations
    let response = app
        .clone()
        .oneshot(get_request("/api/bookings/events?client_id=tab-1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body();

    // Mutation from the subscribed client: its echo is flagged self-caused
    let mut request = json_request(
        "POST",
        "/api/bookings",
        Some("driver-1"),
        serde_json::json!({
            "charger_id": charger_id,
            "booking_date": "2030-06-16",
            "start_time": "10:00",
            "end_time": "12:00",
        }),
    );
    request
        .headers_mut()
        .insert("X-Client-Id", "tab-1".parse().unwrap());
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    let booking_id = created["booking"]["id"].as_str().unwrap().to_string();

    // Mutation with no client id: the echo is not suppressible
    let response = transition(&app, "driver-1", &booking_id, "cancel").await;
    assert_eq!(response.status(), StatusCode::OK);

    let events = collect_change_events(body, 2).await;
    assert_eq!(events[0]["event"], "insert");
    assert_eq!(events[0]["booking"]["id"], booking_id.as_str());
    assert_eq!(events[0]["self_change"], true);
    assert_eq!(events[1]["event"], "update");
    assert_eq!(events[1]["booking"]["status"], "cancelled");
    assert_eq!(events[1]["self_change"], false);
}

#[tokio::test]
async fn test_change_stream_marker_is_scoped_to_client() {
    let app = app();
    let charger_id = seed_marketplace(&app).await;

    // Subscriber is a different tab than the one mutating
    let response = app
        .clone()
        .oneshot(get_request("/api/bookings/events?client_id=tab-2"))
        .await
        .unwrap();
    let body = response.into_body();

    let mut request = json_request(
        "POST",
        "/api/bookings",
        Some("driver-1"),
        serde_json::json!({
            "charger_id": charger_id,
            "booking_date": "2030-06-16",
            "start_time": "10:00",
            "end_time": "12:00",
        }),
    );
    request
        .headers_mut()
        .insert("X-Client-Id", "tab-1".parse().unwrap());
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let events = collect_change_events(body, 1).await;
    assert_eq!(events[0]["event"], "insert");
    assert_eq!(events[0]["self_change"], false);
}

#[tokio::test]
async fn test_booking_requires_identity() {
    let app = app();
    let charger_id = seed_marketplace(&app).await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/bookings",
            None,
            serde_json::json!({
                "charger_id": charger_id,
                "booking_date": "2030-06-16",
                "start_time": "10:00",
                "end_time": "12:00",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
