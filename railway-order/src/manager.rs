use chrono::Utc;
use railway_catalog::PricingEngine;
use railway_core::{BookingError, BookingResult, BookingTx, NewReservation, SeatKey, StoreError};
use railway_shared::{
    Passenger, Reservation, ReservationDetail, ReservationRequest, ReservationStatus, Schedule,
};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::context::{finish, rollback, BookingContext};
use crate::hold::{release_seat, SeatHold};

pub const MAX_PAGE_SIZE: i64 = 100;

/// Everything resolved before the seat lock is taken
struct Admission {
    passenger: Passenger,
    schedule: Schedule,
    key: SeatKey,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReservationPage {
    pub items: Vec<Reservation>,
    pub total: i64,
}

/// Reservation lifecycle: admission, cancellation, confirmation, deletion.
///
/// ```text
/// pending -> confirmed | canceled | expired
/// confirmed -> canceled
/// canceled -> (deleted)
/// ```
pub struct ReservationManager {
    ctx: BookingContext,
    pricing: PricingEngine,
}

impl ReservationManager {
    pub fn new(ctx: BookingContext) -> Self {
        Self::with_pricing(ctx, PricingEngine::default())
    }

    pub fn with_pricing(ctx: BookingContext, pricing: PricingEngine) -> Self {
        Self { ctx, pricing }
    }

    /// Admit a booking request as a pending reservation.
    ///
    /// The seat lock is taken only after every read-side check passed, and
    /// every failure after that point rolls back and releases it. On success
    /// the lock stays held until payment settles or its TTL lapses.
    pub async fn create_reservation(&self, req: ReservationRequest) -> BookingResult<Reservation> {
        validate_request(&req)?;

        let mut tx = self.ctx.begin().await?;

        let admission = match self.check_admission(tx.as_mut(), &req).await {
            Ok(admission) => admission,
            Err(err) => {
                rollback(tx).await;
                warn!("reservation rejected for seat {}/{}/{}: {}", req.schedule_id, req.wagon_id, req.seat_id, err);
                return Err(err);
            }
        };

        let hold = match SeatHold::acquire(
            self.ctx.locks.clone(),
            admission.key,
            self.ctx.policy.seat_lock_ttl,
        )
        .await
        {
            Ok(Some(hold)) => hold,
            Ok(None) => {
                rollback(tx).await;
                warn!("seat {} is locked by another booking", admission.key);
                return Err(BookingError::SeatLocked);
            }
            Err(e) => {
                rollback(tx).await;
                return Err(e.into());
            }
        };

        let reservation = match self.write_reservation(tx.as_mut(), &admission, req.discount_id).await {
            Ok(reservation) => reservation,
            Err(err) => {
                rollback(tx).await;
                hold.release().await;
                warn!("failed to create reservation on {}: {}", admission.key, err);
                return Err(err);
            }
        };

        if let Err(e) = tx.commit().await {
            hold.release().await;
            return Err(e.into());
        }
        hold.keep();

        info!(
            reservation_id = %reservation.id,
            passenger_id = %reservation.passenger_id,
            price = reservation.price,
            "reservation created on {}",
            admission.key
        );
        Ok(reservation)
    }

    async fn check_admission(
        &self,
        tx: &mut dyn BookingTx,
        req: &ReservationRequest,
    ) -> BookingResult<Admission> {
        let passenger = match (req.passenger_id, req.user_id) {
            (Some(passenger_id), _) => tx
                .get_passenger(passenger_id)
                .await?
                .ok_or_else(|| BookingError::PassengerNotFound(format!("passenger id {}", passenger_id)))?,
            (None, Some(user_id)) => tx
                .get_passenger_by_user(user_id)
                .await?
                .ok_or_else(|| BookingError::PassengerNotFound(format!("user id {}", user_id)))?,
            (None, None) => {
                return Err(BookingError::Validation(
                    "passenger_id is required when no user is signed in".to_string(),
                ))
            }
        };

        let schedule = tx
            .get_schedule(req.schedule_id)
            .await?
            .ok_or(BookingError::ScheduleNotFound(req.schedule_id))?;
        let wagon = tx
            .get_wagon(req.wagon_id)
            .await?
            .ok_or(BookingError::WagonNotFound(req.wagon_id))?;
        let seat = tx
            .get_seat(req.seat_id)
            .await?
            .ok_or(BookingError::SeatNotFound(req.seat_id))?;

        if seat.wagon_id != wagon.id {
            return Err(BookingError::SeatMismatch(format!(
                "seat {} is not in wagon {}",
                seat.id, wagon.id
            )));
        }
        if wagon.train_id != schedule.train_id {
            return Err(BookingError::SeatMismatch(format!(
                "wagon {} does not run on schedule {}",
                wagon.id, schedule.id
            )));
        }

        let key = SeatKey::new(schedule.id, wagon.id, seat.id);
        if tx.count_active_reservations(&key).await? > 0 {
            return Err(BookingError::SeatAlreadyBooked);
        }

        Ok(Admission {
            passenger,
            schedule,
            key,
        })
    }

    async fn write_reservation(
        &self,
        tx: &mut dyn BookingTx,
        admission: &Admission,
        discount_id: Option<Uuid>,
    ) -> BookingResult<Reservation> {
        let discount = match discount_id {
            Some(id) => Some(
                tx.get_discount(id)
                    .await?
                    .ok_or(BookingError::DiscountNotFound(id))?,
            ),
            None => None,
        };

        let now = Utc::now();
        let quote = self
            .pricing
            .quote(admission.schedule.price, discount.as_ref(), now)?;

        let reservation = tx
            .insert_reservation(NewReservation {
                passenger_id: admission.passenger.id,
                schedule_id: admission.key.schedule_id,
                wagon_id: admission.key.wagon_id,
                seat_id: admission.key.seat_id,
                discount_id: quote.applied_discount,
                price: quote.final_price,
                status: ReservationStatus::Pending,
                booking_date: now,
                expires_at: now + self.ctx.policy.hold_window,
            })
            .await?;

        if let Some(discount_id) = quote.applied_discount {
            if !tx.consume_discount(reservation.id, discount_id).await? {
                // Another booking took the last use after we read the code.
                return Err(BookingError::DiscountExhausted);
            }
        }

        Ok(reservation)
    }

    pub async fn get_reservation(&self, id: Uuid) -> BookingResult<Reservation> {
        let mut tx = self.ctx.begin().await?;
        let result = match tx.get_reservation(id).await {
            Ok(Some(reservation)) => Ok(reservation),
            Ok(None) => Err(BookingError::ReservationNotFound(id)),
            Err(e) => Err(e.into()),
        };
        finish(tx, result).await
    }

    /// The reservation with its passenger, schedule, seat label, discount
    /// code and most recent payment attempt.
    pub async fn get_reservation_detail(&self, id: Uuid) -> BookingResult<ReservationDetail> {
        let mut tx = self.ctx.begin().await?;
        let result = detail_in(tx.as_mut(), id).await;
        finish(tx, result).await
    }

    pub async fn list_reservations(&self, limit: i64, offset: i64) -> BookingResult<ReservationPage> {
        if !(1..=MAX_PAGE_SIZE).contains(&limit) {
            return Err(BookingError::Validation(format!(
                "limit must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }
        if offset < 0 {
            return Err(BookingError::Validation("offset must not be negative".to_string()));
        }

        let mut tx = self.ctx.begin().await?;
        let result: BookingResult<ReservationPage> = async {
            let items = tx.list_reservations(limit, offset).await?;
            let total = tx.count_reservations().await?;
            Ok(ReservationPage { items, total })
        }
        .await;
        finish(tx, result).await
    }

    /// `pending | confirmed -> canceled`
    pub async fn cancel_reservation(&self, id: Uuid) -> BookingResult<()> {
        let mut tx = self.ctx.begin().await?;
        let result = cancel_in(tx.as_mut(), id).await;
        let previous = finish(tx, result).await.inspect_err(|e| {
            warn!("failed to cancel reservation {}: {}", id, e);
        })?;

        if previous.status == ReservationStatus::Pending {
            release_seat(self.ctx.locks.as_ref(), &SeatKey::from(&previous)).await;
        }
        info!("reservation {} canceled", id);
        Ok(())
    }

    /// Physically removes a canceled reservation.
    pub async fn delete_reservation(&self, id: Uuid) -> BookingResult<()> {
        let mut tx = self.ctx.begin().await?;
        let result: BookingResult<()> = async {
            let reservation = tx
                .lock_reservation(id)
                .await?
                .ok_or(BookingError::ReservationNotFound(id))?;
            if reservation.status != ReservationStatus::Canceled {
                return Err(BookingError::NotCanceled);
            }
            tx.delete_reservation(id).await?;
            Ok(())
        }
        .await;
        finish(tx, result).await.inspect_err(|e| {
            warn!("failed to delete reservation {}: {}", id, e);
        })?;

        info!("reservation {} deleted", id);
        Ok(())
    }

    /// `pending -> confirmed` without a payment row. Takes the seat out of
    /// the schedule's remaining count exactly once.
    pub async fn confirm_reservation(&self, id: Uuid) -> BookingResult<()> {
        let mut tx = self.ctx.begin().await?;
        let result = confirm_in(tx.as_mut(), id).await;
        let reservation = finish(tx, result).await.inspect_err(|e| {
            warn!("failed to confirm reservation {}: {}", id, e);
        })?;

        release_seat(self.ctx.locks.as_ref(), &SeatKey::from(&reservation)).await;
        info!("reservation {} confirmed", id);
        Ok(())
    }
}

async fn detail_in(tx: &mut dyn BookingTx, id: Uuid) -> BookingResult<ReservationDetail> {
    let reservation = tx
        .get_reservation(id)
        .await?
        .ok_or(BookingError::ReservationNotFound(id))?;

    let missing = |what: String| BookingError::Store(StoreError::RowNotFound(what));
    let passenger = tx
        .get_passenger(reservation.passenger_id)
        .await?
        .ok_or_else(|| missing(format!("passenger {}", reservation.passenger_id)))?;
    let schedule = tx
        .get_schedule(reservation.schedule_id)
        .await?
        .ok_or_else(|| missing(format!("schedule {}", reservation.schedule_id)))?;
    let wagon = tx
        .get_wagon(reservation.wagon_id)
        .await?
        .ok_or_else(|| missing(format!("wagon {}", reservation.wagon_id)))?;
    let seat = tx
        .get_seat(reservation.seat_id)
        .await?
        .ok_or_else(|| missing(format!("seat {}", reservation.seat_id)))?;

    let discount_code = match reservation.discount_id {
        Some(discount_id) => tx.get_discount(discount_id).await?.map(|d| d.code),
        None => None,
    };
    let latest_payment = tx
        .list_payments(id)
        .await?
        .into_iter()
        .max_by_key(|p| p.payment_date);

    Ok(ReservationDetail {
        reservation_id: reservation.id,
        status: reservation.status,
        passenger_name: passenger.name,
        passenger_id_number: passenger.id_number,
        schedule_id: schedule.id,
        train_id: schedule.train_id,
        departure_time: schedule.departure_time,
        arrival_time: schedule.arrival_time,
        seat_label: seat.label(&wagon),
        class_type: wagon.class_type,
        ticket_price: reservation.price,
        booking_date: reservation.booking_date,
        expires_at: reservation.expires_at,
        discount_code,
        payment_amount: latest_payment.as_ref().map(|p| p.amount),
        payment_method: latest_payment.as_ref().map(|p| p.payment_method.clone()),
        payment_status: latest_payment.map(|p| p.status),
    })
}

async fn cancel_in(tx: &mut dyn BookingTx, id: Uuid) -> BookingResult<Reservation> {
    let reservation = tx
        .lock_reservation(id)
        .await?
        .ok_or(BookingError::ReservationNotFound(id))?;

    if reservation.status == ReservationStatus::Canceled {
        return Err(BookingError::AlreadyCanceled);
    }
    if !reservation.status.can_transition_to(ReservationStatus::Canceled) {
        return Err(BookingError::InvalidTransition {
            from: reservation.status,
            to: ReservationStatus::Canceled,
        });
    }

    tx.set_reservation_status(id, ReservationStatus::Canceled).await?;
    if reservation.status == ReservationStatus::Confirmed {
        tx.adjust_available_seats(reservation.schedule_id, 1).await?;
    }
    Ok(reservation)
}

/// Shared by manual confirmation and successful payment.
pub(crate) async fn confirm_in(tx: &mut dyn BookingTx, id: Uuid) -> BookingResult<Reservation> {
    let reservation = tx
        .lock_reservation(id)
        .await?
        .ok_or(BookingError::ReservationNotFound(id))?;

    if reservation.status == ReservationStatus::Confirmed {
        return Err(BookingError::AlreadyConfirmed);
    }
    if !reservation.status.can_transition_to(ReservationStatus::Confirmed) {
        return Err(BookingError::InvalidTransition {
            from: reservation.status,
            to: ReservationStatus::Confirmed,
        });
    }

    mark_confirmed(tx, &reservation).await?;
    Ok(reservation)
}

pub(crate) async fn mark_confirmed(tx: &mut dyn BookingTx, reservation: &Reservation) -> BookingResult<()> {
    tx.set_reservation_status(reservation.id, ReservationStatus::Confirmed)
        .await?;
    tx.adjust_available_seats(reservation.schedule_id, -1).await?;
    Ok(())
}

fn validate_request(req: &ReservationRequest) -> BookingResult<()> {
    let mut problems = Vec::new();
    if req.schedule_id <= 0 {
        problems.push("schedule_id is required");
    }
    if req.wagon_id <= 0 {
        problems.push("wagon_id is required");
    }
    if req.seat_id <= 0 {
        problems.push("seat_id is required");
    }
    if req.passenger_id.is_some_and(|id| id.is_nil()) {
        problems.push("passenger_id must not be nil");
    }
    if req.discount_id.is_some_and(|id| id.is_nil()) {
        problems.push("discount_id must not be nil");
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(BookingError::Validation(problems.join(", ")))
    }
}
