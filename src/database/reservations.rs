use crate::api::middleware::error::{ApiError, ApiResult};
use crate::database::{format_time, parse_time, Database};
use crate::models::{CreateReservationCommand, Location, Reservation, ReservationStatus};
use chrono::NaiveDateTime;
use sqlx::Row;

impl Database {
    /// Insert a reservation and commit it immediately.
    ///
    /// The statement runs on the pool in auto-commit mode, outside any caller
    /// transaction, so the row is visible to concurrent executions the moment
    /// this returns. The store-assigned id decides insertion order for the
    /// overlap race.
    pub async fn insert_reservation(
        &self,
        cmd: &CreateReservationCommand,
    ) -> ApiResult<Reservation> {
        let now = chrono::Utc::now().to_rfc3339();
        let result = sqlx::query(
            "INSERT INTO reservations
                (vehicle_id, dispatcher_id, operator_id, from_location, to_location,
                 status, start_time, end_time, version, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, 1, ?)",
        )
        .bind(cmd.vehicle_id)
        .bind(cmd.dispatcher_id)
        .bind(cmd.operator_id)
        .bind(cmd.from_location.as_str())
        .bind(cmd.to_location.as_str())
        .bind(ReservationStatus::Created.as_str())
        .bind(format_time(cmd.start_time))
        .bind(format_time(cmd.end_time))
        .bind(&now)
        .execute(self.pool())
        .await?;

        let id = result
            .last_insert_id()
            .ok_or_else(|| ApiError::Internal("store did not assign a reservation id".to_string()))?;

        Ok(Reservation {
            id,
            vehicle_id: cmd.vehicle_id,
            dispatcher_id: cmd.dispatcher_id,
            operator_id: cmd.operator_id,
            from_location: cmd.from_location,
            to_location: cmd.to_location,
            status: ReservationStatus::Created,
            start_time: cmd.start_time,
            end_time: cmd.end_time,
            version: 1,
            updated_at: now,
        })
    }

    /// Compensating delete for a tentative reservation, committed immediately.
    pub async fn delete_reservation(&self, reservation_id: i64) -> ApiResult<()> {
        sqlx::query("DELETE FROM reservations WHERE id = ?")
            .bind(reservation_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// True iff an active reservation for the vehicle overlaps `[start, end)`.
    ///
    /// With `exclude_earlier_than`, only rows whose id is strictly smaller are
    /// considered — earlier tentative commits count, later ones do not, so
    /// among racing inserts exactly the earliest survives validation.
    pub async fn vehicle_overlap_exists(
        &self,
        vehicle_id: i64,
        exclude_earlier_than: Option<i64>,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> ApiResult<bool> {
        self.overlap_exists("vehicle_id", vehicle_id, exclude_earlier_than, start, end)
            .await
    }

    pub async fn dispatcher_overlap_exists(
        &self,
        dispatcher_id: i64,
        exclude_earlier_than: Option<i64>,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> ApiResult<bool> {
        self.overlap_exists("dispatcher_id", dispatcher_id, exclude_earlier_than, start, end)
            .await
    }

    async fn overlap_exists(
        &self,
        column: &str,
        resource_id: i64,
        exclude_earlier_than: Option<i64>,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> ApiResult<bool> {
        // Boundary-exclusive overlap: start < other.end AND end > other.start.
        let row = match exclude_earlier_than {
            Some(exclude_id) => {
                sqlx::query(&format!(
                    "SELECT COUNT(*) AS n FROM reservations
                     WHERE {} = ?
                       AND id < ?
                       AND status IN ('CREATED', 'IN_PROGRESS')
                       AND start_time < ?
                       AND end_time > ?",
                    column
                ))
                .bind(resource_id)
                .bind(exclude_id)
                .bind(format_time(end))
                .bind(format_time(start))
                .fetch_one(self.pool())
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT COUNT(*) AS n FROM reservations
                     WHERE {} = ?
                       AND status IN ('CREATED', 'IN_PROGRESS')
                       AND start_time < ?
                       AND end_time > ?",
                    column
                ))
                .bind(resource_id)
                .bind(format_time(end))
                .bind(format_time(start))
                .fetch_one(self.pool())
                .await?
            }
        };

        let count: i64 = row.try_get("n")?;
        Ok(count > 0)
    }

    /// Destination of the vehicle's most recent reservation ending at or
    /// before `time`, or `None` when it has no history there.
    pub async fn find_vehicle_last_location(
        &self,
        vehicle_id: i64,
        time: NaiveDateTime,
    ) -> ApiResult<Option<Location>> {
        self.find_last_location("vehicle_id", vehicle_id, time).await
    }

    pub async fn find_dispatcher_last_location(
        &self,
        dispatcher_id: i64,
        time: NaiveDateTime,
    ) -> ApiResult<Option<Location>> {
        self.find_last_location("dispatcher_id", dispatcher_id, time)
            .await
    }

    async fn find_last_location(
        &self,
        column: &str,
        resource_id: i64,
        time: NaiveDateTime,
    ) -> ApiResult<Option<Location>> {
        let row = sqlx::query(&format!(
            "SELECT to_location FROM reservations
             WHERE {} = ? AND end_time <= ?
             ORDER BY end_time DESC
             LIMIT 1",
            column
        ))
        .bind(resource_id)
        .bind(format_time(time))
        .fetch_optional(self.pool())
        .await?;

        match row {
            Some(row) => {
                let raw: String = row.try_get("to_location")?;
                let location = Location::parse(&raw).ok_or_else(|| {
                    ApiError::Internal(format!("unknown location in store: {}", raw))
                })?;
                Ok(Some(location))
            }
            None => Ok(None),
        }
    }

    pub async fn get_reservation(&self, reservation_id: i64) -> ApiResult<Option<Reservation>> {
        let row = sqlx::query(
            "SELECT id, vehicle_id, dispatcher_id, operator_id, from_location, to_location,
                    status, start_time, end_time, version, updated_at
             FROM reservations
             WHERE id = ?",
        )
        .bind(reservation_id)
        .fetch_optional(self.pool())
        .await?;

        match row {
            Some(row) => Ok(Some(reservation_from_row(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn count_reservations(&self) -> ApiResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM reservations")
            .fetch_one(self.pool())
            .await?;
        Ok(row.try_get("n")?)
    }

    pub async fn delete_all_reservations(&self) -> ApiResult<()> {
        sqlx::query("DELETE FROM reservations")
            .execute(self.pool())
            .await?;
        Ok(())
    }
}

fn reservation_from_row(row: &sqlx::any::AnyRow) -> ApiResult<Reservation> {
    let from_raw: String = row.try_get("from_location")?;
    let to_raw: String = row.try_get("to_location")?;
    let status_raw: String = row.try_get("status")?;
    let start_raw: String = row.try_get("start_time")?;
    let end_raw: String = row.try_get("end_time")?;

    Ok(Reservation {
        id: row.try_get("id")?,
        vehicle_id: row.try_get("vehicle_id")?,
        dispatcher_id: row.try_get("dispatcher_id")?,
        operator_id: row.try_get("operator_id")?,
        from_location: Location::parse(&from_raw)
            .ok_or_else(|| ApiError::Internal(format!("unknown location in store: {}", from_raw)))?,
        to_location: Location::parse(&to_raw)
            .ok_or_else(|| ApiError::Internal(format!("unknown location in store: {}", to_raw)))?,
        status: ReservationStatus::parse(&status_raw)
            .ok_or_else(|| ApiError::Internal(format!("unknown status in store: {}", status_raw)))?,
        start_time: parse_time(&start_raw)
            .ok_or_else(|| ApiError::Internal(format!("bad start_time in store: {}", start_raw)))?,
        end_time: parse_time(&end_raw)
            .ok_or_else(|| ApiError::Internal(format!("bad end_time in store: {}", end_raw)))?,
        version: row.try_get("version")?,
        updated_at: row.try_get("updated_at")?,
    })
}
