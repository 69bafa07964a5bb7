use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use notification_cell::{Mailer, SmtpMailer, UnconfiguredMailer};
use reservation_cell::services::store::ReservationStore;
use shared_config::AppConfig;
use shared_models::error::AppError;
use shared_utils::tokens::{self, STAFF_SESSION_PURPOSE};

use crate::gate::SESSION_COOKIE;
use crate::models::{LoginRequest, StaffUser, UpdateReservationRequest};
use crate::services::accounts::StaffAccountService;
use crate::services::transitions::apply_reservation_update;

// ==============================================================================
// SESSION LIFECYCLE
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub next: Option<String>,
}

pub async fn staff_index() -> Redirect {
    Redirect::to("/staff/reservations/")
}

/// Bootstrap payload for the login form; echoes the destination the gate
/// carried over.
pub async fn login_page(Query(query): Query<LoginQuery>) -> Json<Value> {
    Json(json!({ "email": "", "next": query.next }))
}

#[axum::debug_handler]
pub async fn login(
    State(config): State<Arc<AppConfig>>,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> Response {
    let service = match StaffAccountService::open(&config) {
        Ok(service) => service,
        Err(e) => return AppError::Database(e.to_string()).into_response(),
    };

    let user = match service.verify_credentials(&request.email, &request.password) {
        Ok(Some(user)) => user,
        Ok(None) => {
            // Wrong password, unknown account, and deactivated account are
            // deliberately the same response. The email is echoed for the
            // form; the password never is.
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "error": "Incorrect email or password.",
                    "email": request.email,
                })),
            )
                .into_response();
        }
        Err(e) => return AppError::Database(e.to_string()).into_response(),
    };

    let mut payload = Map::new();
    payload.insert("staff_id".to_string(), Value::String(user.id.to_string()));
    let token = tokens::issue_token(&config.secret_key, STAFF_SESSION_PURPOSE, payload);

    let cookie = Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();
    let jar = jar.add(cookie);

    // Only same-site destinations are honored.
    let redirect = request
        .next
        .filter(|next| next.starts_with('/'))
        .unwrap_or_else(|| "/staff/reservations/".to_string());

    info!(staff = %user.email, "staff login");
    (
        jar,
        Json(json!({ "success": true, "redirect": redirect, "name": user.name })),
    )
        .into_response()
}

pub async fn logout(jar: CookieJar) -> (CookieJar, Redirect) {
    let mut cookie = Cookie::from(SESSION_COOKIE);
    cookie.set_path("/");
    (jar.remove(cookie), Redirect::to("/staff/login/"))
}

// ==============================================================================
// DASHBOARD
// ==============================================================================

#[axum::debug_handler]
pub async fn reservation_list(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<StaffUser>,
) -> Result<Json<Value>, AppError> {
    let store = ReservationStore::open(&config)?;
    let pending = store.list_pending()?;
    let recent = store.list_recent(50)?;
    debug!(staff = %user.email, pending = pending.len(), "dashboard listing");
    Ok(Json(json!({ "pending": pending, "recent": recent })))
}

fn not_found_with_listing_redirect() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "The reservation could not be found.",
            "redirect": "/staff/reservations/"
        })),
    )
        .into_response()
}

#[axum::debug_handler]
pub async fn reservation_detail(
    State(config): State<Arc<AppConfig>>,
    Path(reservation_id): Path<Uuid>,
    Extension(user): Extension<StaffUser>,
) -> Response {
    let store = match ReservationStore::open(&config) {
        Ok(store) => store,
        Err(e) => return AppError::from(e).into_response(),
    };
    match store.get(reservation_id) {
        Ok(Some(reservation)) => {
            debug!(staff = %user.email, reservation_id = %reservation.id, "detail view");
            let record_version = reservation.updated_at.clone();
            Json(json!({ "reservation": reservation, "record_version": record_version }))
                .into_response()
        }
        Ok(None) => not_found_with_listing_redirect(),
        Err(e) => AppError::from(e).into_response(),
    }
}

// ==============================================================================
// STATUS TRANSITIONS
// ==============================================================================

#[axum::debug_handler]
pub async fn update_reservation(
    State(config): State<Arc<AppConfig>>,
    Path(reservation_id): Path<Uuid>,
    Extension(_user): Extension<StaffUser>,
    Json(request): Json<UpdateReservationRequest>,
) -> Response {
    let store = match ReservationStore::open(&config) {
        Ok(store) => store,
        Err(e) => return AppError::from(e).into_response(),
    };
    let current = match store.get(reservation_id) {
        Ok(Some(reservation)) => reservation,
        Ok(None) => return not_found_with_listing_redirect(),
        Err(e) => return AppError::from(e).into_response(),
    };

    // A broken mail setup must not block the status write; it degrades to
    // the same warning path as a failed send.
    let smtp;
    let unconfigured;
    let mailer: &dyn Mailer = match SmtpMailer::from_config(&config) {
        Ok(m) => {
            smtp = m;
            &smtp
        }
        Err(e) => {
            warn!("mail transport unavailable: {}", e);
            unconfigured = UnconfiguredMailer {
                reason: e.to_string(),
            };
            &unconfigured
        }
    };

    match apply_reservation_update(&config, &store, mailer, &current, &request).await {
        Ok(report) => Json(json!({
            "success": true,
            "reservation": report.reservation,
            "warning": report.notification_warning,
        }))
        .into_response(),
        Err(e) => e.into_response(),
    }
}
