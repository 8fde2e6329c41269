pub mod models;
pub mod pii;

pub use models::{
    DiscountCode, Passenger, Payment, PaymentReceipt, PaymentRequest, PaymentStatus, Reservation,
    ReservationDetail, ReservationRequest, ReservationStatus, Schedule, Seat, Wagon,
};
