use std::sync::Arc;

use chrono::Utc;
use railway_core::{
    BookingError, BookingResult, BookingTx, NewPayment, PaymentGateway, SeatKey, SettlementOutcome,
};
use railway_shared::{PaymentReceipt, PaymentRequest, PaymentStatus, ReservationStatus};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::context::{finish, BookingContext};
use crate::hold::release_seat;
use crate::manager::mark_confirmed;

/// Settles payment for pending reservations.
pub struct PaymentProcessor {
    ctx: BookingContext,
    gateway: Arc<dyn PaymentGateway>,
}

impl PaymentProcessor {
    pub fn new(ctx: BookingContext, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { ctx, gateway }
    }

    /// Runs the settlement and records it in one transaction.
    ///
    /// An approved payment confirms the reservation and takes the seat off
    /// the schedule; the seat lock is released only after the commit. A
    /// declined payment is recorded and the reservation stays pending so the
    /// caller can retry inside the hold window.
    pub async fn process_payment(&self, req: PaymentRequest) -> BookingResult<PaymentReceipt> {
        if req.payment_method.trim().is_empty() {
            return Err(BookingError::Validation("payment_method is required".to_string()));
        }
        if req.amount < 0 {
            return Err(BookingError::Validation("amount must not be negative".to_string()));
        }

        let mut tx = self.ctx.begin().await?;
        let result = self.settle_in(tx.as_mut(), &req).await;
        let (receipt, confirmed_seat) = finish(tx, result).await.inspect_err(|e| {
            warn!("payment for reservation {} failed: {}", req.reservation_id, e);
        })?;

        if let Some(key) = confirmed_seat {
            release_seat(self.ctx.locks.as_ref(), &key).await;
        }

        info!(
            "payment {} for reservation {}: {}",
            receipt.transaction_id, req.reservation_id, receipt.status
        );
        Ok(receipt)
    }

    async fn settle_in(
        &self,
        tx: &mut dyn BookingTx,
        req: &PaymentRequest,
    ) -> BookingResult<(PaymentReceipt, Option<SeatKey>)> {
        let reservation = tx
            .lock_reservation(req.reservation_id)
            .await?
            .ok_or(BookingError::ReservationNotFound(req.reservation_id))?;

        if reservation.status != ReservationStatus::Pending {
            return Err(BookingError::ReservationNotPending(reservation.status));
        }

        let outcome = self
            .gateway
            .settle(reservation.id, req.amount, &req.payment_method)
            .await
            .map_err(|e| {
                error!("payment gateway failure for {}: {}", reservation.id, e);
                BookingError::Gateway(e.to_string())
            })?;

        let (status, message, gateway_response) = match &outcome {
            SettlementOutcome::Approved => (PaymentStatus::Success, "Payment successful!", "approved".to_string()),
            SettlementOutcome::Declined { reason } => (PaymentStatus::Failed, "Payment failed!", reason.clone()),
        };

        if outcome.is_approved() {
            mark_confirmed(tx, &reservation).await?;
        }

        let transaction_id = Uuid::new_v4();
        tx.insert_payment(NewPayment {
            reservation_id: reservation.id,
            payment_method: req.payment_method.clone(),
            status,
            amount: req.amount,
            gateway_response: Some(gateway_response),
            transaction_id,
            payment_date: Utc::now(),
        })
        .await?;

        let receipt = PaymentReceipt {
            transaction_id,
            status,
            message: message.to_string(),
        };
        let confirmed_seat = outcome.is_approved().then(|| SeatKey::from(&reservation));
        Ok((receipt, confirmed_seat))
    }
}
