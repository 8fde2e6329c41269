pub mod context;
pub mod expiry;
pub mod hold;
pub mod manager;
pub mod orchestrator;
pub mod settlement;

pub use context::{BookingContext, BookingPolicy};
pub use expiry::{spawn_sweepers, PaymentTimeoutSweep, Sweep, SweeperHandles, UnpaidReservationSweep};
pub use hold::SeatHold;
pub use manager::{ReservationManager, ReservationPage};
pub use orchestrator::PaymentProcessor;
pub use settlement::{FixedGateway, SimulatedGateway};
