use crate::api::middleware::error::{ApiError, ApiResult};
use crate::database::Database;
use crate::models::{Location, Vehicle, VehicleStatus};
use sqlx::Row;

impl Database {
    pub async fn create_vehicle(
        &self,
        base_location: Location,
        status: VehicleStatus,
    ) -> ApiResult<Vehicle> {
        let now = chrono::Utc::now().to_rfc3339();
        let result = sqlx::query(
            "INSERT INTO vehicles (base_location, status, created_at) VALUES (?, ?, ?)",
        )
        .bind(base_location.as_str())
        .bind(status.as_str())
        .bind(&now)
        .execute(self.pool())
        .await?;

        let id = result
            .last_insert_id()
            .ok_or_else(|| ApiError::Internal("store did not assign a vehicle id".to_string()))?;

        Ok(Vehicle {
            id,
            base_location,
            status,
        })
    }

    /// Where the vehicle sits when it has no reservation history.
    pub async fn vehicle_base_location(&self, vehicle_id: i64) -> ApiResult<Location> {
        let row = sqlx::query("SELECT base_location FROM vehicles WHERE id = ?")
            .bind(vehicle_id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("vehicle {} not found", vehicle_id)))?;

        let raw: String = row.try_get("base_location")?;
        Location::parse(&raw)
            .ok_or_else(|| ApiError::Internal(format!("unknown location in store: {}", raw)))
    }

    pub async fn delete_all_vehicles(&self) -> ApiResult<()> {
        sqlx::query("DELETE FROM vehicles")
            .execute(self.pool())
            .await?;
        Ok(())
    }
}
