use crate::api::middleware::error::{ApiError, ApiResult};
use crate::database::Database;
use crate::models::{CreateReservationCommand, Location, Reservation};
use crate::observability::{RESERVATION_CREATE_FAILED_TOTAL, RESERVATION_CREATE_TOTAL};
use crate::services::ratelimit::CompositeRateLimiter;
use crate::services::travel_time::TravelTimeService;
use std::sync::Arc;

/// Insert-then-validate reservation admission.
///
/// A creation request passes the composite rate limiter, then the business
/// checks, then commits a tentative row that is immediately visible to every
/// concurrent execution, and finally re-validates against the store. The
/// store's id ordering decides races: only reservations inserted earlier
/// count as conflicts, so of N racing requests exactly the first insert
/// survives and the rest roll themselves back. That database-level check is
/// correct on its own; the rate-limit layers in front of it only cut down
/// wasted insert/delete cycles.
#[derive(Clone)]
pub struct ReservationService {
    db: Database,
    travel_time: TravelTimeService,
    limiter: Arc<CompositeRateLimiter>,
}

impl ReservationService {
    pub fn new(
        db: Database,
        travel_time: TravelTimeService,
        limiter: Arc<CompositeRateLimiter>,
    ) -> Self {
        Self {
            db,
            travel_time,
            limiter,
        }
    }

    pub async fn create_reservation(
        &self,
        cmd: &CreateReservationCommand,
    ) -> ApiResult<Reservation> {
        if cmd.start_time >= cmd.end_time {
            return Err(ApiError::BadRequest(
                "start time must precede end time".to_string(),
            ));
        }

        let mut admission = match self
            .limiter
            .acquire(cmd.vehicle_id, cmd.dispatcher_id, cmd.start_time, cmd.end_time)
            .await
        {
            Ok(context) => context,
            Err(e) => {
                metrics::counter!(RESERVATION_CREATE_FAILED_TOTAL, "reason" => "admission")
                    .increment(1);
                return Err(e);
            }
        };

        let result = self.create_validated(cmd).await;
        self.limiter.release(&mut admission).await;

        match &result {
            Ok(reservation) => {
                metrics::counter!(RESERVATION_CREATE_TOTAL).increment(1);
                tracing::info!(
                    "reservation {} committed: vehicle {} dispatcher {} {} -> {} [{} .. {})",
                    reservation.id,
                    reservation.vehicle_id,
                    reservation.dispatcher_id,
                    reservation.from_location,
                    reservation.to_location,
                    reservation.start_time,
                    reservation.end_time
                );
            }
            Err(e) => {
                metrics::counter!(RESERVATION_CREATE_FAILED_TOTAL, "reason" => "validation")
                    .increment(1);
                tracing::debug!("reservation rejected: {}", e);
            }
        }

        result
    }

    async fn create_validated(&self, cmd: &CreateReservationCommand) -> ApiResult<Reservation> {
        // 1. The vehicle must actually be at the declared origin.
        let vehicle_location = self.vehicle_location_at(cmd.vehicle_id, cmd).await?;
        if vehicle_location != cmd.from_location {
            return Err(ApiError::StateMismatch(format!(
                "vehicle {} is at {}, not at the requested origin {}",
                cmd.vehicle_id, vehicle_location, cmd.from_location
            )));
        }

        // 2. So must the dispatcher.
        let dispatcher_location = self.dispatcher_location_at(cmd.dispatcher_id, cmd).await?;
        if dispatcher_location != cmd.from_location {
            return Err(ApiError::StateMismatch(format!(
                "dispatcher {} is at {}, not at the requested origin {}",
                cmd.dispatcher_id, dispatcher_location, cmd.from_location
            )));
        }

        // 3. The interval must cover the minimum travel time.
        let required = self
            .travel_time
            .required_minutes(cmd.from_location, cmd.to_location);
        let actual = (cmd.end_time - cmd.start_time).num_minutes();
        if actual < required {
            return Err(ApiError::StateMismatch(format!(
                "interval of {} minutes is shorter than the {} required for {} -> {}",
                actual,
                if required == i64::MAX {
                    "infinite".to_string()
                } else {
                    required.to_string()
                },
                cmd.from_location,
                cmd.to_location
            )));
        }

        // 4. Tentative commit, immediately visible to other executions.
        let reservation = self.db.insert_reservation(cmd).await?;

        // 5. Validate against everything inserted before us; roll back on
        //    conflict.
        if let Err(e) = self.validate_no_overlap(cmd, reservation.id).await {
            if let Err(delete_err) = self.db.delete_reservation(reservation.id).await {
                tracing::error!(
                    "failed to roll back tentative reservation {}: {}",
                    reservation.id,
                    delete_err
                );
            }
            return Err(e);
        }

        Ok(reservation)
    }

    async fn validate_no_overlap(
        &self,
        cmd: &CreateReservationCommand,
        reservation_id: i64,
    ) -> ApiResult<()> {
        if self
            .db
            .vehicle_overlap_exists(cmd.vehicle_id, Some(reservation_id), cmd.start_time, cmd.end_time)
            .await?
        {
            return Err(ApiError::StateMismatch(format!(
                "vehicle {} is already reserved in this time window",
                cmd.vehicle_id
            )));
        }

        if self
            .db
            .dispatcher_overlap_exists(
                cmd.dispatcher_id,
                Some(reservation_id),
                cmd.start_time,
                cmd.end_time,
            )
            .await?
        {
            return Err(ApiError::StateMismatch(format!(
                "dispatcher {} is already assigned in this time window",
                cmd.dispatcher_id
            )));
        }

        Ok(())
    }

    async fn vehicle_location_at(
        &self,
        vehicle_id: i64,
        cmd: &CreateReservationCommand,
    ) -> ApiResult<Location> {
        match self
            .db
            .find_vehicle_last_location(vehicle_id, cmd.start_time)
            .await?
        {
            Some(location) => Ok(location),
            None => self.db.vehicle_base_location(vehicle_id).await,
        }
    }

    async fn dispatcher_location_at(
        &self,
        dispatcher_id: i64,
        cmd: &CreateReservationCommand,
    ) -> ApiResult<Location> {
        match self
            .db
            .find_dispatcher_last_location(dispatcher_id, cmd.start_time)
            .await?
        {
            Some(location) => Ok(location),
            None => self.db.user_base_location(dispatcher_id).await,
        }
    }
}
