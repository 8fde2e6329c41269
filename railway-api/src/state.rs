use std::sync::Arc;

use railway_order::{PaymentProcessor, ReservationManager};

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

#[derive(Clone)]
pub struct AppState {
    pub reservations: Arc<ReservationManager>,
    pub payments: Arc<PaymentProcessor>,
    pub auth: AuthConfig,
}
