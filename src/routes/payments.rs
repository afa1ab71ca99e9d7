use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use std::time::Duration;
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use crate::{
    app_state::AppState,
    error::{ApiError, Result},
    middleware::UserIdentity,
    models::{
        common::SuccessResponse,
        payments::{
            BankTransferInfo, CreateOrderRequest, GiftcodeData, GiftcodeResponse, OrderData,
            OrderRecord, OrderResponse, OrderWaitData, OrderWaitResponse, PlanListData,
            PlanListResponse, PlanRecord, RedeemGiftcodeRequest, ValidateVoucherRequest,
            VoucherData, VoucherResponse,
        },
    },
};

const DEFAULT_WAIT_SECS: u64 = 25;
const MAX_WAIT_SECS: u64 = 60;

/// GET /api/v1/payments/plans
#[instrument(skip(state, _identity))]
pub async fn list_plans(
    State(state): State<AppState>,
    _identity: UserIdentity,
) -> Result<Json<PlanListResponse>> {
    let plans = state
        .payment_service
        .plans()
        .iter()
        .map(PlanRecord::from)
        .collect();

    Ok(Json(SuccessResponse::new(PlanListData { plans })))
}

/// POST /api/v1/payments/orders
#[instrument(skip(state, request))]
pub async fn create_order(
    State(state): State<AppState>,
    identity: UserIdentity,
    Json(request): Json<CreateOrderRequest>,
) -> Result<Json<OrderResponse>> {
    request
        .validate()
        .map_err(|e| ApiError::BadRequest(format!("Validation error: {}", e)))?;

    let order = state
        .payment_service
        .get_or_create_pending_order(
            identity.user_id,
            &request.plan_id,
            request.voucher_code.as_deref(),
        )
        .await?;

    let bank = state.payment_service.bank();
    let bank_transfer = BankTransferInfo {
        bank_id: bank.bank_id.clone(),
        account_no: bank.account_no.clone(),
        account_name: bank.account_name.clone(),
        amount: order.amount,
        transaction_code: order.transaction_code.clone(),
    };

    Ok(Json(SuccessResponse::new(OrderData {
        order: order.into(),
        bank_transfer,
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitQuery {
    pub timeout_secs: Option<u64>,
}

/// GET /api/v1/payments/orders/{id}/wait
///
/// Long-poll bridge over the completion hub. Client disconnects drop the
/// handler future, which drops the subscription, so abandoned waits never
/// leak a listener.
#[instrument(skip(state, identity))]
pub async fn wait_order(
    State(state): State<AppState>,
    identity: UserIdentity,
    Path(order_id): Path<Uuid>,
    Query(query): Query<WaitQuery>,
) -> Result<Json<OrderWaitResponse>> {
    let order = state.payment_service.get_order(order_id).await?;
    if order.user_id != identity.user_id {
        return Err(ApiError::NotFound(format!("Order {}", order_id)));
    }

    let timeout_secs = query
        .timeout_secs
        .unwrap_or(DEFAULT_WAIT_SECS)
        .clamp(1, MAX_WAIT_SECS);

    let paid = state
        .payment_service
        .wait_for_completion(order_id, Duration::from_secs(timeout_secs))
        .await?;

    Ok(Json(SuccessResponse::new(OrderWaitData {
        paid: paid.is_some(),
        order: paid.map(OrderRecord::from),
    })))
}

/// POST /api/v1/payments/vouchers/validate
#[instrument(skip(state, request))]
pub async fn validate_voucher(
    State(state): State<AppState>,
    _identity: UserIdentity,
    Json(request): Json<ValidateVoucherRequest>,
) -> Result<Json<VoucherResponse>> {
    request
        .validate()
        .map_err(|e| ApiError::BadRequest(format!("Validation error: {}", e)))?;

    let (discount_percent, discounted_amount) = state
        .payment_service
        .apply_voucher(&request.plan_id, &request.code)
        .await?;

    Ok(Json(SuccessResponse::new(VoucherData {
        code: request.code,
        discount_percent,
        discounted_amount,
    })))
}

/// POST /api/v1/payments/giftcodes/redeem
#[instrument(skip(state, request))]
pub async fn redeem_giftcode(
    State(state): State<AppState>,
    identity: UserIdentity,
    Json(request): Json<RedeemGiftcodeRequest>,
) -> Result<Json<GiftcodeResponse>> {
    request
        .validate()
        .map_err(|e| ApiError::BadRequest(format!("Validation error: {}", e)))?;

    let credits_added = state
        .payment_service
        .redeem_giftcode(identity.user_id, &request.code)
        .await?;

    Ok(Json(SuccessResponse::new(GiftcodeData { credits_added })))
}
