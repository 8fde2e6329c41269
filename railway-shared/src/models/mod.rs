pub mod discount;
pub mod inventory;
pub mod payment;
pub mod reservation;

pub use discount::DiscountCode;
pub use inventory::{Passenger, Schedule, Seat, Wagon};
pub use payment::{Payment, PaymentReceipt, PaymentRequest, PaymentStatus};
pub use reservation::{Reservation, ReservationDetail, ReservationRequest, ReservationStatus};
