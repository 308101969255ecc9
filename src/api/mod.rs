pub mod middleware;
pub mod reservations;
pub mod test_data;

pub use middleware::*;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/reservations", post(reservations::create_reservation))
        .route("/api/reservations/status", get(reservations::get_status))
        .route(
            "/api/reservations/circuit/reset",
            post(reservations::reset_circuit),
        )
        .route("/api/test/setup", post(test_data::setup_test_data))
        .route(
            "/api/test/reservations",
            delete(test_data::clear_reservations),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
