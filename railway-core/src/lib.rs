pub mod lock;
pub mod payment;
pub mod repository;

use std::time::Duration;

use railway_shared::ReservationStatus;
use uuid::Uuid;

pub use lock::{SeatKey, SeatLock};
pub use payment::{PaymentGateway, SettlementOutcome};
pub use repository::{BookingStore, BookingTx, NewPayment, NewReservation};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Raw failures reported by the store and lock adapters.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[source] BoxError),
    #[error("lock store error: {0}")]
    Lock(#[source] BoxError),
    #[error("an active reservation already exists for {0}")]
    DuplicateActive(String),
    #[error("row not found: {0}")]
    RowNotFound(String),
    #[error("invalid stored value: {0}")]
    Decode(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// How a caller should treat a failed booking operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input or an illegal transition; never retried automatically
    Client,
    /// Contention with existing state; the caller may retry or poll
    Conflict,
    /// Infrastructure failure; safe to retry
    Transient,
}

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("no passenger found for {0}")]
    PassengerNotFound(String),
    #[error("schedule {0} not found")]
    ScheduleNotFound(i64),
    #[error("wagon {0} not found")]
    WagonNotFound(i64),
    #[error("seat {0} not found")]
    SeatNotFound(i64),
    #[error("seat selection mismatch: {0}")]
    SeatMismatch(String),
    #[error("discount {0} not found")]
    DiscountNotFound(Uuid),
    #[error("discount expired")]
    DiscountExpired,
    #[error("discount has no remaining uses")]
    DiscountExhausted,
    #[error("invalid discount: {0}")]
    InvalidDiscount(String),
    #[error("seat already booked")]
    SeatAlreadyBooked,
    #[error("seat is already locked")]
    SeatLocked,
    #[error("reservation {0} not found")]
    ReservationNotFound(Uuid),
    #[error("reservation already paid or canceled (status {0})")]
    ReservationNotPending(ReservationStatus),
    #[error("reservation already canceled")]
    AlreadyCanceled,
    #[error("reservation already confirmed")]
    AlreadyConfirmed,
    #[error("reservation status isn't canceled yet")]
    NotCanceled,
    #[error("cannot move reservation from {from} to {to}")]
    InvalidTransition {
        from: ReservationStatus,
        to: ReservationStatus,
    },
    #[error("payment gateway error: {0}")]
    Gateway(String),
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Store(StoreError),
}

impl BookingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BookingError::SeatAlreadyBooked
            | BookingError::SeatLocked
            | BookingError::AlreadyCanceled
            | BookingError::AlreadyConfirmed => ErrorKind::Conflict,
            BookingError::Gateway(_) | BookingError::Timeout(_) | BookingError::Store(_) => {
                ErrorKind::Transient
            }
            _ => ErrorKind::Client,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            BookingError::PassengerNotFound(_)
                | BookingError::ScheduleNotFound(_)
                | BookingError::WagonNotFound(_)
                | BookingError::SeatNotFound(_)
                | BookingError::DiscountNotFound(_)
                | BookingError::ReservationNotFound(_)
        )
    }
}

impl From<StoreError> for BookingError {
    fn from(err: StoreError) -> Self {
        match err {
            // The partial unique index on active rows caught a race the
            // availability check missed.
            StoreError::DuplicateActive(_) => BookingError::SeatAlreadyBooked,
            other => BookingError::Store(other),
        }
    }
}

pub type BookingResult<T> = Result<T, BookingError>;
