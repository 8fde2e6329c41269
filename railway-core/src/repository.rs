use async_trait::async_trait;
use chrono::{DateTime, Utc};
use railway_shared::{
    DiscountCode, Passenger, Payment, PaymentStatus, Reservation, ReservationStatus, Schedule,
    Seat, Wagon,
};
use uuid::Uuid;

use crate::{SeatKey, StoreResult};

/// Columns supplied when inserting a reservation row
#[derive(Debug, Clone)]
pub struct NewReservation {
    pub passenger_id: Uuid,
    pub schedule_id: i64,
    pub wagon_id: i64,
    pub seat_id: i64,
    pub discount_id: Option<Uuid>,
    pub price: i64,
    pub status: ReservationStatus,
    pub booking_date: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Columns supplied when recording a settlement attempt
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub reservation_id: Uuid,
    pub payment_method: String,
    pub status: PaymentStatus,
    pub amount: i64,
    pub gateway_response: Option<String>,
    pub transaction_id: Uuid,
    pub payment_date: DateTime<Utc>,
}

/// Entry point to the relational store
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn begin(&self) -> StoreResult<Box<dyn BookingTx>>;
}

/// An open relational transaction.
///
/// Dropping a transaction without calling `commit` discards its writes.
#[async_trait]
pub trait BookingTx: Send {
    async fn get_passenger(&mut self, id: Uuid) -> StoreResult<Option<Passenger>>;

    /// The passenger record owned by a user account
    async fn get_passenger_by_user(&mut self, user_id: Uuid) -> StoreResult<Option<Passenger>>;

    async fn get_schedule(&mut self, id: i64) -> StoreResult<Option<Schedule>>;

    async fn get_wagon(&mut self, id: i64) -> StoreResult<Option<Wagon>>;

    async fn get_seat(&mut self, id: i64) -> StoreResult<Option<Seat>>;

    /// Number of pending or confirmed reservations for the seat
    async fn count_active_reservations(&mut self, key: &SeatKey) -> StoreResult<i64>;

    async fn get_discount(&mut self, id: Uuid) -> StoreResult<Option<DiscountCode>>;

    /// Links the discount to the reservation and takes one use from it.
    /// Returns `false` when the code had no uses left.
    async fn consume_discount(&mut self, reservation_id: Uuid, discount_id: Uuid)
        -> StoreResult<bool>;

    async fn insert_reservation(&mut self, new: NewReservation) -> StoreResult<Reservation>;

    async fn get_reservation(&mut self, id: Uuid) -> StoreResult<Option<Reservation>>;

    /// Like `get_reservation` but holds a row lock until the transaction ends
    async fn lock_reservation(&mut self, id: Uuid) -> StoreResult<Option<Reservation>>;

    async fn set_reservation_status(
        &mut self,
        id: Uuid,
        status: ReservationStatus,
    ) -> StoreResult<()>;

    async fn delete_reservation(&mut self, id: Uuid) -> StoreResult<()>;

    async fn list_reservations(&mut self, limit: i64, offset: i64)
        -> StoreResult<Vec<Reservation>>;

    async fn count_reservations(&mut self) -> StoreResult<i64>;

    async fn adjust_available_seats(&mut self, schedule_id: i64, delta: i32) -> StoreResult<()>;

    async fn insert_payment(&mut self, new: NewPayment) -> StoreResult<Payment>;

    async fn list_payments(&mut self, reservation_id: Uuid) -> StoreResult<Vec<Payment>>;

    /// Bulk `pending -> expired` for rows whose hold window closed before `now`
    async fn expire_unpaid_reservations(&mut self, now: DateTime<Utc>) -> StoreResult<u64>;

    /// Ids of pending rows whose hold window closed before `now`
    async fn list_stale_pending(&mut self, now: DateTime<Utc>) -> StoreResult<Vec<Uuid>>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}
