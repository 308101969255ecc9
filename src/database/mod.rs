use chrono::NaiveDateTime;
use sqlx::{any::AnyPoolOptions, AnyPool};

pub mod reservations;
pub mod users;
pub mod vehicles;

/// Connection pool plus every query the admission core consumes.
///
/// Reservation and lock timestamps are stored as `%Y-%m-%dT%H:%M:%S` text;
/// the format is lexicographically sortable, so interval comparisons run as
/// plain string comparisons in SQL.
#[derive(Clone)]
pub struct Database {
    pool: AnyPool,
}

impl Database {
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = AnyPoolOptions::new()
            .max_connections(20)
            .min_connections(5)
            .connect(database_url)
            .await?;

        // Enable foreign keys for SQLite
        if database_url.starts_with("sqlite") {
            sqlx::query("PRAGMA foreign_keys = ON")
                .execute(&pool)
                .await?;
        }

        Ok(Self { pool })
    }

    /// Create the schema if it does not exist yet.
    ///
    /// Reservation ids use AUTOINCREMENT: ids must keep increasing even after
    /// compensating deletes, or the earlier-insert-wins overlap check breaks.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                role TEXT NOT NULL CHECK(role IN ('OPERATOR', 'VOLUNTEER')),
                name TEXT NOT NULL,
                base_location TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS vehicles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                base_location TEXT NOT NULL,
                status TEXT NOT NULL CHECK(status IN ('IDLE', 'MOVING')),
                created_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS reservations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                vehicle_id INTEGER NOT NULL,
                dispatcher_id INTEGER NOT NULL,
                operator_id INTEGER NOT NULL,
                from_location TEXT NOT NULL,
                to_location TEXT NOT NULL,
                status TEXT NOT NULL
                    CHECK(status IN ('CREATED', 'IN_PROGRESS', 'COMPLETED', 'CANCELLED')),
                start_time TEXT NOT NULL,
                end_time TEXT NOT NULL,
                version INTEGER NOT NULL DEFAULT 1,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (vehicle_id) REFERENCES vehicles(id),
                FOREIGN KEY (dispatcher_id) REFERENCES users(id),
                FOREIGN KEY (operator_id) REFERENCES users(id)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_reservations_vehicle_time
             ON reservations(vehicle_id, status, start_time, end_time)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_reservations_dispatcher_time
             ON reservations(dispatcher_id, status, start_time, end_time)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS distributed_locks (
                key TEXT PRIMARY KEY,
                owner TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }
}

/// Render an interval endpoint the way the schema stores it.
pub fn format_time(t: NaiveDateTime) -> String {
    t.format("%Y-%m-%dT%H:%M:%S").to_string()
}

/// Inverse of [`format_time`].
pub fn parse_time(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn time_format_round_trips() {
        let t = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap();
        let s = format_time(t);
        assert_eq!(s, "2024-01-15T10:30:00");
        assert_eq!(parse_time(&s), Some(t));
    }

    #[test]
    fn time_format_sorts_lexicographically() {
        let earlier = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(9, 59, 59)
            .unwrap();
        let later = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        assert!(format_time(earlier) < format_time(later));
    }
}
