use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use railway_order::ReservationPage;
use railway_shared::{Reservation, ReservationDetail, ReservationRequest};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::Claims;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/reservations", post(create_reservation).get(list_reservations))
        .route("/v1/reservations/{id}", get(get_reservation).delete(delete_reservation))
        .route("/v1/reservations/{id}/detail", get(get_reservation_detail))
        .route("/v1/reservations/{id}/cancel", post(cancel_reservation))
        .route("/v1/reservations/{id}/confirm", post(confirm_reservation))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// POST /v1/reservations
/// Hold a seat. Without `passenger_id` the caller's own passenger record is used.
pub async fn create_reservation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(mut req): Json<ReservationRequest>,
) -> Result<(StatusCode, Json<Reservation>), AppError> {
    req.user_id = claims.user_id();
    let reservation = state.reservations.create_reservation(req).await?;
    Ok((StatusCode::CREATED, Json(reservation)))
}

/// GET /v1/reservations
pub async fn list_reservations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<ListParams>,
) -> Result<Json<ReservationPage>, AppError> {
    if !claims.is_admin() {
        return Err(AppError::Authorization("admin role required".to_string()));
    }
    let page = state
        .reservations
        .list_reservations(params.limit.unwrap_or(10), params.offset.unwrap_or(0))
        .await?;
    Ok(Json(page))
}

/// GET /v1/reservations/{id}
pub async fn get_reservation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Reservation>, AppError> {
    Ok(Json(state.reservations.get_reservation(id).await?))
}

/// GET /v1/reservations/{id}/detail
pub async fn get_reservation_detail(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReservationDetail>, AppError> {
    Ok(Json(state.reservations.get_reservation_detail(id).await?))
}

/// POST /v1/reservations/{id}/cancel
pub async fn cancel_reservation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.reservations.cancel_reservation(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/reservations/{id}/confirm
pub async fn confirm_reservation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.reservations.confirm_reservation(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /v1/reservations/{id}
/// Only canceled reservations can be removed.
pub async fn delete_reservation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    state.reservations.delete_reservation(id).await?;
    Ok(Json(json!({ "message": "successful delete reservation" })))
}
