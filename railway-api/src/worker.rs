use std::sync::Arc;
use std::time::Duration;

use railway_core::{BookingStore, PaymentGateway, SeatLock};
use railway_order::{
    spawn_sweepers, BookingContext, BookingPolicy, PaymentProcessor, ReservationManager,
    SimulatedGateway, SweeperHandles,
};
use railway_store::BookingRules;
use tracing::info;

use crate::state::{AppState, AuthConfig};

pub fn policy_from_rules(rules: &BookingRules) -> BookingPolicy {
    BookingPolicy {
        seat_lock_ttl: Duration::from_secs(rules.seat_lock_ttl_seconds),
        hold_window: chrono::Duration::seconds(rules.hold_window_seconds as i64),
        sweep_interval: Duration::from_secs(rules.sweep_interval_seconds),
        sweep_deadline: Duration::from_secs(rules.sweep_deadline_seconds),
    }
}

pub fn gateway_from_rules(rules: &BookingRules) -> Arc<dyn PaymentGateway> {
    Arc::new(SimulatedGateway::new(
        Duration::from_millis(rules.payment_latency_ms),
        rules.payment_success_rate,
    ))
}

/// Wire the booking services over the chosen adapters.
pub fn build_state(
    store: Arc<dyn BookingStore>,
    locks: Arc<dyn SeatLock>,
    gateway: Arc<dyn PaymentGateway>,
    rules: &BookingRules,
    auth: AuthConfig,
) -> (AppState, BookingContext) {
    let ctx = BookingContext::new(store, locks, policy_from_rules(rules));
    let state = AppState {
        reservations: Arc::new(ReservationManager::new(ctx.clone())),
        payments: Arc::new(PaymentProcessor::new(ctx.clone(), gateway)),
        auth,
    };
    (state, ctx)
}

/// Background reconciliation of stale pending reservations.
pub fn start_expiration_workers(ctx: &BookingContext) -> SweeperHandles {
    info!(
        "Starting expiration sweepers every {:?} (deadline {:?})",
        ctx.policy.sweep_interval, ctx.policy.sweep_deadline
    );
    spawn_sweepers(ctx)
}
