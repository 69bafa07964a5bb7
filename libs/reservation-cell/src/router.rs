use std::sync::Arc;

use axum::{
    routing::get,
    Router,
};

use shared_config::AppConfig;

use crate::handlers;

pub fn reservation_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route(
            "/email/",
            get(handlers::email_entry).post(handlers::request_form_link),
        )
        .route(
            "/form/{token}/",
            get(handlers::reservation_form).post(handlers::submit_reservation),
        )
        .route("/done/", get(handlers::reservation_done))
        .route(
            "/reschedule/{token}/",
            get(handlers::reschedule_form).post(handlers::submit_reschedule),
        )
        .with_state(state)
}
