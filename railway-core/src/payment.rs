use async_trait::async_trait;
use uuid::Uuid;

use crate::BoxError;

/// Decision returned by a settlement gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementOutcome {
    Approved,
    Declined { reason: String },
}

impl SettlementOutcome {
    pub fn is_approved(&self) -> bool {
        matches!(self, SettlementOutcome::Approved)
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Settle `amount` for a reservation. An `Err` is an infrastructure
    /// failure, a decline is a normal outcome.
    async fn settle(
        &self,
        reservation_id: Uuid,
        amount: i64,
        payment_method: &str,
    ) -> Result<SettlementOutcome, BoxError>;
}
