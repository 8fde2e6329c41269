use axum::{extract::State, routing::post, Json, Router};
use railway_shared::{PaymentReceipt, PaymentRequest};

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/payments", post(process_payment))
}

/// POST /v1/payments
/// Settle a pending reservation. A declined payment still answers 200 with
/// `status = "failed"`; the reservation stays payable until its hold expires.
pub async fn process_payment(
    State(state): State<AppState>,
    Json(req): Json<PaymentRequest>,
) -> Result<Json<PaymentReceipt>, AppError> {
    Ok(Json(state.payments.process_payment(req).await?))
}
