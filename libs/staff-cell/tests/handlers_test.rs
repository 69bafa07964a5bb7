use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use reservation_cell::models::{ChoicePair, ChoiceSet, PatientDetails, ReservationStatus};
use reservation_cell::services::store::ReservationStore;
use shared_config::AppConfig;
use shared_utils::test_utils::TestConfig;
use shared_utils::tokens::{self, RESERVATION_FORM_PURPOSE, STAFF_SESSION_PURPOSE};
use staff_cell::router::staff_routes;
use staff_cell::services::accounts::StaffAccountService;

fn setup() -> (tempfile::TempDir, AppConfig, Router) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.db");
    let config = TestConfig::with_database(path.to_str().unwrap()).to_app_config();
    shared_database::init(&config).unwrap();
    let app = staff_routes(std::sync::Arc::new(config.clone()));
    (dir, config, app)
}

fn create_staff(config: &AppConfig) -> staff_cell::models::StaffUser {
    StaffAccountService::open(config)
        .unwrap()
        .create("tanaka@example.com", "Tanaka Hanako", "correct horse battery")
        .unwrap()
}

fn session_cookie_for(config: &AppConfig, staff_id: Uuid) -> String {
    let mut payload = serde_json::Map::new();
    payload.insert("staff_id".to_string(), Value::String(staff_id.to_string()));
    let token = tokens::issue_token(&config.secret_key, STAFF_SESSION_PURPOSE, payload);
    format!("staff_session={}", token)
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

fn post_json(uri: &str, cookie: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn seed_reservation(config: &AppConfig, email: &str) -> reservation_cell::models::Reservation {
    let store = ReservationStore::open(config).unwrap();
    store
        .create(
            email,
            &PatientDetails {
                chart_number: None,
                referring_hospital: None,
                last_name: "Yamada".to_string(),
                first_name: "Taro".to_string(),
                last_name_kana: None,
                first_name_kana: None,
                birth_date: "1980-04-02".to_string(),
                sex: "M".to_string(),
            },
            &ChoiceSet {
                first: ChoicePair {
                    date: "2025-06-01".to_string(),
                    time_slot: "AM".to_string(),
                },
                second: None,
                third: None,
            },
        )
        .unwrap()
}

// ==============================================================================
// LOGIN / LOGOUT
// ==============================================================================

#[tokio::test]
async fn login_sets_a_session_cookie_and_honors_next() {
    let (_dir, config, app) = setup();
    create_staff(&config);

    let response = app
        .oneshot(post_json(
            "/login/",
            None,
            json!({
                "email": "  TANAKA@example.com ",
                "password": "correct horse battery",
                "next": "/staff/reservations/",
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(set_cookie.starts_with("staff_session="));
    assert!(set_cookie.contains("HttpOnly"));

    let body = body_json(response).await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["redirect"], json!("/staff/reservations/"));
}

#[tokio::test]
async fn login_rejects_offsite_next_destinations() {
    let (_dir, config, app) = setup();
    create_staff(&config);

    let response = app
        .oneshot(post_json(
            "/login/",
            None,
            json!({
                "email": "tanaka@example.com",
                "password": "correct horse battery",
                "next": "https://evil.example.com/",
            }),
        ))
        .await
        .unwrap();

    let body = body_json(response).await;
    assert_eq!(body["redirect"], json!("/staff/reservations/"));
}

#[tokio::test]
async fn all_login_failure_modes_share_one_error_message() {
    let (_dir, config, app) = setup();
    create_staff(&config);

    let wrong_password = app
        .clone()
        .oneshot(post_json(
            "/login/",
            None,
            json!({ "email": "tanaka@example.com", "password": "nope" }),
        ))
        .await
        .unwrap();
    let unknown_account = app
        .clone()
        .oneshot(post_json(
            "/login/",
            None,
            json!({ "email": "ghost@example.com", "password": "nope" }),
        ))
        .await
        .unwrap();

    StaffAccountService::open(&config)
        .unwrap()
        .set_active("tanaka@example.com", false)
        .unwrap();
    let inactive_account = app
        .oneshot(post_json(
            "/login/",
            None,
            json!({ "email": "tanaka@example.com", "password": "correct horse battery" }),
        ))
        .await
        .unwrap();

    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_account.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(inactive_account.status(), StatusCode::UNAUTHORIZED);

    let a = body_json(wrong_password).await;
    let b = body_json(unknown_account).await;
    let c = body_json(inactive_account).await;
    assert_eq!(a["error"], b["error"]);
    assert_eq!(b["error"], c["error"]);
    // The submitted email is echoed; the password never is.
    assert_eq!(a["email"], json!("tanaka@example.com"));
    assert!(a.get("password").is_none());
}

#[tokio::test]
async fn logout_clears_the_session_cookie() {
    let (_dir, config, app) = setup();
    let staff = create_staff(&config);
    let cookie = session_cookie_for(&config, staff.id);

    let response = app
        .oneshot(get("/logout/", Some(&cookie)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "/staff/login/"
    );
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(set_cookie.starts_with("staff_session="));
}

// ==============================================================================
// ACCESS GATE
// ==============================================================================

#[tokio::test]
async fn unauthenticated_access_redirects_to_login_with_destination() {
    let (_dir, _config, app) = setup();

    let response = app.oneshot(get("/reservations/", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let location = response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(location.starts_with("/staff/login/?next="));
    assert!(location.contains("/reservations/"));
}

#[tokio::test]
async fn a_valid_session_reaches_the_dashboard() {
    let (_dir, config, app) = setup();
    let staff = create_staff(&config);
    let cookie = session_cookie_for(&config, staff.id);

    let response = app
        .oneshot(get("/reservations/", Some(&cookie)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["pending"].is_array());
    assert!(body["recent"].is_array());
}

#[tokio::test]
async fn a_magic_link_token_is_not_a_staff_session() {
    let (_dir, config, app) = setup();
    let staff = create_staff(&config);

    // Correctly signed, same secret - but the wrong purpose class.
    let mut payload = serde_json::Map::new();
    payload.insert("staff_id".to_string(), Value::String(staff.id.to_string()));
    let token = tokens::issue_token(&config.secret_key, RESERVATION_FORM_PURPOSE, payload);
    let cookie = format!("staff_session={}", token);

    let response = app
        .oneshot(get("/reservations/", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn a_deactivated_account_loses_access_immediately() {
    let (_dir, config, app) = setup();
    let staff = create_staff(&config);
    let cookie = session_cookie_for(&config, staff.id);

    StaffAccountService::open(&config)
        .unwrap()
        .set_active("tanaka@example.com", false)
        .unwrap();

    let response = app
        .oneshot(get("/reservations/", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

// ==============================================================================
// DASHBOARD + TRANSITIONS
// ==============================================================================

#[tokio::test]
async fn dashboard_lists_pending_fifo_and_recent() {
    let (_dir, config, app) = setup();
    let staff = create_staff(&config);
    let cookie = session_cookie_for(&config, staff.id);

    let first = seed_reservation(&config, "a@example.com");
    std::thread::sleep(std::time::Duration::from_millis(2));
    let second = seed_reservation(&config, "b@example.com");

    let response = app
        .oneshot(get("/reservations/", Some(&cookie)))
        .await
        .unwrap();
    let body = body_json(response).await;

    let pending = body["pending"].as_array().unwrap();
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0]["id"], json!(first.id));
    assert_eq!(pending[1]["id"], json!(second.id));

    let recent = body["recent"].as_array().unwrap();
    assert_eq!(recent[0]["id"], json!(second.id));
}

#[tokio::test]
async fn detail_returns_the_record_and_its_version() {
    let (_dir, config, app) = setup();
    let staff = create_staff(&config);
    let cookie = session_cookie_for(&config, staff.id);
    let reservation = seed_reservation(&config, "a@example.com");

    let response = app
        .oneshot(get(&format!("/reservations/{}/", reservation.id), Some(&cookie)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["reservation"]["email"], json!("a@example.com"));
    assert_eq!(body["record_version"], json!(reservation.updated_at));
}

#[tokio::test]
async fn unknown_reservation_points_back_to_the_listing() {
    let (_dir, config, app) = setup();
    let staff = create_staff(&config);
    let cookie = session_cookie_for(&config, staff.id);

    let response = app
        .oneshot(get(&format!("/reservations/{}/", Uuid::new_v4()), Some(&cookie)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["redirect"], json!("/staff/reservations/"));
}

#[tokio::test]
async fn confirming_through_the_endpoint_commits_and_reports_success() {
    let (_dir, config, app) = setup();
    let staff = create_staff(&config);
    let cookie = session_cookie_for(&config, staff.id);
    let reservation = seed_reservation(&config, "a@example.com");

    let response = app
        .oneshot(post_json(
            &format!("/reservations/{}/", reservation.id),
            Some(&cookie),
            json!({
                "status": "confirmed",
                "confirmed_datetime": "2025-06-01 10:00",
                "handled_by": "tanaka",
                "record_version": reservation.updated_at,
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["warning"], Value::Null);
    assert_eq!(body["reservation"]["status"], json!("confirmed"));

    let store = ReservationStore::open(&config).unwrap();
    let current = store.get(reservation.id).unwrap().unwrap();
    assert_eq!(current.status, ReservationStatus::Confirmed);
    assert_eq!(current.handled_by.as_deref(), Some("tanaka"));
}

#[tokio::test]
async fn a_stale_dashboard_write_conflicts() {
    let (_dir, config, app) = setup();
    let staff = create_staff(&config);
    let cookie = session_cookie_for(&config, staff.id);
    let reservation = seed_reservation(&config, "a@example.com");

    // Another session wins the race.
    ReservationStore::open(&config)
        .unwrap()
        .update_status(
            reservation.id,
            ReservationStatus::Cancelled,
            None,
            None,
            Some("suzuki"),
            &reservation.updated_at,
        )
        .unwrap();

    let response = app
        .oneshot(post_json(
            &format!("/reservations/{}/", reservation.id),
            Some(&cookie),
            json!({
                "status": "confirmed",
                "confirmed_datetime": "2025-06-01 10:00",
                "record_version": reservation.updated_at,
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn transitions_require_a_session() {
    let (_dir, config, app) = setup();
    let reservation = seed_reservation(&config, "a@example.com");

    let response = app
        .oneshot(post_json(
            &format!("/reservations/{}/", reservation.id),
            None,
            json!({
                "status": "cancelled",
                "record_version": reservation.updated_at,
            }),
        ))
        .await
        .unwrap();

    // Redirected at the gate; the record is untouched.
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let store = ReservationStore::open(&config).unwrap();
    let current = store.get(reservation.id).unwrap().unwrap();
    assert_eq!(current.status, ReservationStatus::Pending);
}
