use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use railway_core::{BoxError, PaymentGateway, SettlementOutcome};
use tracing::debug;
use uuid::Uuid;

/// Stand-in for a card processor: waits, then approves a fixed share of
/// attempts at random.
#[derive(Debug, Clone)]
pub struct SimulatedGateway {
    latency: Duration,
    success_rate: u8,
}

impl SimulatedGateway {
    /// `success_rate` is a percentage and is capped at 100.
    pub fn new(latency: Duration, success_rate: u8) -> Self {
        Self {
            latency,
            success_rate: success_rate.min(100),
        }
    }
}

impl Default for SimulatedGateway {
    fn default() -> Self {
        Self::new(Duration::from_millis(1500), 80)
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn settle(
        &self,
        reservation_id: Uuid,
        amount: i64,
        payment_method: &str,
    ) -> Result<SettlementOutcome, BoxError> {
        tokio::time::sleep(self.latency).await;

        let roll: u8 = rand::thread_rng().gen_range(0..100);
        debug!(
            "simulated settlement for {} ({} via {}): roll {} against {}",
            reservation_id, amount, payment_method, roll, self.success_rate
        );

        if roll < self.success_rate {
            Ok(SettlementOutcome::Approved)
        } else {
            Ok(SettlementOutcome::Declined {
                reason: "declined by simulated gateway".to_string(),
            })
        }
    }
}

/// Gateway with a predetermined answer, for tests and local runs.
#[derive(Debug, Clone)]
pub struct FixedGateway {
    outcome: SettlementOutcome,
}

impl FixedGateway {
    pub fn approving() -> Self {
        Self {
            outcome: SettlementOutcome::Approved,
        }
    }

    pub fn declining(reason: &str) -> Self {
        Self {
            outcome: SettlementOutcome::Declined {
                reason: reason.to_string(),
            },
        }
    }
}

#[async_trait]
impl PaymentGateway for FixedGateway {
    async fn settle(
        &self,
        _reservation_id: Uuid,
        _amount: i64,
        _payment_method: &str,
    ) -> Result<SettlementOutcome, BoxError> {
        Ok(self.outcome.clone())
    }
}
