use axum::{extract::State, http::HeaderMap, Json};
use tracing::{info, instrument};
use validator::Validate;

use crate::{
    app_state::AppState,
    error::{ApiError, Result},
    models::{
        common::SuccessResponse,
        payments::{OrderRecord, SettlementNotification},
    },
};

/// POST /api/v1/webhooks/settlement
///
/// The only actor allowed to flip an order to `completed`. The caller must
/// present the shared API key, and the paid amount must match the order
/// exactly before any credits move.
#[instrument(skip(state, headers, notification))]
pub async fn settlement_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(notification): Json<SettlementNotification>,
) -> Result<Json<SuccessResponse<OrderRecord>>> {
    let authorization = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    state.settlement_service.verify_api_key(authorization)?;

    notification
        .validate()
        .map_err(|e| ApiError::BadRequest(format!("Validation error: {}", e)))?;

    info!(
        transaction_code = %notification.transaction_code,
        amount = notification.amount,
        reference_id = ?notification.reference_id,
        "Settlement notification received"
    );

    let order = state
        .settlement_service
        .handle_notification(&notification)
        .await?;

    Ok(Json(SuccessResponse::new(order.into())))
}
