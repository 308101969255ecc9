use crate::api::middleware::{ApiResult, AppState};
use crate::models::{Location, UserRole, VehicleStatus};
use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::json;

#[derive(Deserialize)]
pub struct SetupParams {
    #[serde(default = "default_vehicles")]
    pub vehicles: u32,
    #[serde(default = "default_dispatchers")]
    pub dispatchers: u32,
}

fn default_vehicles() -> u32 {
    10
}

fn default_dispatchers() -> u32 {
    20
}

/// Load-test provisioning: wipe everything, then seed an operator plus the
/// requested fleet. All seeded resources start at the airport.
pub async fn setup_test_data(
    State(state): State<AppState>,
    Query(params): Query<SetupParams>,
) -> ApiResult<Json<serde_json::Value>> {
    state.db.delete_all_reservations().await?;
    state.db.delete_all_vehicles().await?;
    state.db.delete_all_users().await?;

    let operator = state
        .db
        .create_user(UserRole::Operator, "TestOperator", Location::Airport)
        .await?;

    let mut vehicle_ids = Vec::new();
    for _ in 0..params.vehicles {
        let vehicle = state
            .db
            .create_vehicle(Location::Airport, VehicleStatus::Idle)
            .await?;
        vehicle_ids.push(vehicle.id);
    }

    let mut dispatcher_ids = Vec::new();
    for i in 0..params.dispatchers {
        let dispatcher = state
            .db
            .create_user(UserRole::Volunteer, &format!("Dispatcher{}", i), Location::Airport)
            .await?;
        dispatcher_ids.push(dispatcher.id);
    }

    Ok(Json(json!({
        "status": "success",
        "operatorId": operator.id,
        "vehicleIds": vehicle_ids,
        "dispatcherIds": dispatcher_ids,
    })))
}

pub async fn clear_reservations(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    state.db.delete_all_reservations().await?;
    Ok(Json(json!({ "status": "success" })))
}
