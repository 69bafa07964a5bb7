use std::sync::Arc;

use axum::{
    middleware,
    routing::get,
    Router,
};

use shared_config::AppConfig;

use crate::gate::staff_session_gate;
use crate::handlers;

pub fn staff_routes(state: Arc<AppConfig>) -> Router {
    // Every listing and mutating route sits behind the session gate.
    let protected_routes = Router::new()
        .route("/reservations/", get(handlers::reservation_list))
        .route(
            "/reservations/{reservation_id}/",
            get(handlers::reservation_detail).post(handlers::update_reservation),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            staff_session_gate,
        ));

    Router::new()
        .route("/", get(handlers::staff_index))
        .route("/login/", get(handlers::login_page).post(handlers::login))
        .route("/logout/", get(handlers::logout))
        .merge(protected_routes)
        .with_state(state)
}
