use crate::api::middleware::{ApiResult, AppState};
use crate::models::CreateReservationCommand;
use axum::{extract::State, http::StatusCode, Json};
use serde_json::json;

pub async fn create_reservation(
    State(state): State<AppState>,
    Json(cmd): Json<CreateReservationCommand>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let reservation = state.reservation_service.create_reservation(&cmd).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "status": "success",
            "reservationId": reservation.id,
            "reservation": reservation,
        })),
    ))
}

/// Operational snapshot: circuit breaker state plus the size of the local
/// permit registry.
pub async fn get_status(State(state): State<AppState>) -> Json<serde_json::Value> {
    let circuit_state = state.distributed_limiter.circuit_state();
    Json(json!({
        "circuitBreaker": {
            "state": circuit_state,
        },
        "localRateLimiter": {
            "activeSemaphores": state.local_limiter.active_semaphore_count(),
        },
    }))
}

pub async fn reset_circuit(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.distributed_limiter.reset_circuit();
    Json(json!({ "status": "circuit breaker reset" }))
}
