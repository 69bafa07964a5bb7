use std::sync::Arc;

use axum::{
    response::Redirect,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};

use reservation_cell::router::reservation_routes;
use shared_config::AppConfig;
use staff_cell::router::staff_routes;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { Redirect::to("/reservations/email/") }))
        .route("/healthz", get(healthz))
        .nest("/reservations", reservation_routes(state.clone()))
        .nest("/staff", staff_routes(state))
}

/// Liveness probe: fixed success, no dependencies touched.
async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
