use crate::api::middleware::error::{ApiError, ApiResult};
use crate::database::Database;
use crate::models::{Location, User, UserRole};
use sqlx::Row;

impl Database {
    pub async fn create_user(
        &self,
        role: UserRole,
        name: &str,
        base_location: Location,
    ) -> ApiResult<User> {
        let now = chrono::Utc::now().to_rfc3339();
        let result = sqlx::query(
            "INSERT INTO users (role, name, base_location, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(role.as_str())
        .bind(name)
        .bind(base_location.as_str())
        .bind(&now)
        .execute(self.pool())
        .await?;

        let id = result
            .last_insert_id()
            .ok_or_else(|| ApiError::Internal("store did not assign a user id".to_string()))?;

        Ok(User {
            id,
            role,
            name: name.to_string(),
            base_location,
        })
    }

    /// Where the dispatcher sits when they have no reservation history.
    pub async fn user_base_location(&self, user_id: i64) -> ApiResult<Location> {
        let row = sqlx::query("SELECT base_location FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("user {} not found", user_id)))?;

        let raw: String = row.try_get("base_location")?;
        Location::parse(&raw)
            .ok_or_else(|| ApiError::Internal(format!("unknown location in store: {}", raw)))
    }

    pub async fn delete_all_users(&self) -> ApiResult<()> {
        sqlx::query("DELETE FROM users").execute(self.pool()).await?;
        Ok(())
    }
}
