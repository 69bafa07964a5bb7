use std::sync::Arc;

use axum::{
    body::Body,
    extract::{OriginalUri, State},
    http::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_utils::tokens::{self, STAFF_SESSION_MAX_AGE_SECS, STAFF_SESSION_PURPOSE};

use crate::models::StaffUser;
use crate::services::accounts::StaffAccountService;

pub const SESSION_COOKIE: &str = "staff_session";

/// Require an authenticated staff session on every route behind this layer.
/// Anything less redirects to the login form, carrying the original
/// destination so login can return there.
pub async fn staff_session_gate(
    State(config): State<Arc<AppConfig>>,
    OriginalUri(original_uri): OriginalUri,
    jar: CookieJar,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    match session_user(&config, &jar) {
        Some(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        None => {
            debug!(destination = %original_uri.path(), "unauthenticated staff access");
            Redirect::to(&format!("/staff/login/?next={}", original_uri.path())).into_response()
        }
    }
}

fn session_user(config: &AppConfig, jar: &CookieJar) -> Option<StaffUser> {
    let cookie = jar.get(SESSION_COOKIE)?;
    let data = tokens::verify_token(
        &config.secret_key,
        STAFF_SESSION_PURPOSE,
        cookie.value(),
        STAFF_SESSION_MAX_AGE_SECS,
    )
    .ok()?;
    let staff_id = data
        .get("staff_id")
        .and_then(Value::as_str)
        .and_then(|raw| Uuid::parse_str(raw).ok())?;

    let service = StaffAccountService::open(config).ok()?;
    let user = service.get(staff_id).ok().flatten()?;
    // A deactivated account loses access immediately, not at cookie expiry.
    user.is_active.then_some(user)
}
