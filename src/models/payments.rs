use entity::sea_orm_active_enums::OrderStatus;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::common::SuccessResponse;

/// Request for a pending payment order (idempotent: reloading the page or
/// re-sending the same plan/voucher combination returns the same order)
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, max = 64))]
    pub plan_id: String,

    #[validate(length(min = 1, max = 64))]
    pub voucher_code: Option<String>,
}

pub type OrderResponse = SuccessResponse<OrderData>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderData {
    pub order: OrderRecord,
    /// Everything the bank/QR surface needs to render the transfer
    pub bank_transfer: BankTransferInfo,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    pub id: uuid::Uuid,
    pub plan_id: String,
    pub plan_name: String,
    pub amount: i64,
    pub currency: String,
    pub credits_added: i32,
    pub status: OrderStatus,
    pub transaction_code: String,
    pub created_at: time::OffsetDateTime,
}

impl From<entity::payment_orders::Model> for OrderRecord {
    fn from(order: entity::payment_orders::Model) -> Self {
        Self {
            id: order.id,
            plan_id: order.plan_id,
            plan_name: order.plan_name,
            amount: order.amount,
            currency: order.currency,
            credits_added: order.credits_added,
            status: order.status,
            transaction_code: order.transaction_code,
            created_at: order.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BankTransferInfo {
    pub bank_id: String,
    pub account_no: String,
    pub account_name: String,
    pub amount: i64,
    pub transaction_code: String,
}

pub type PlanListResponse = SuccessResponse<PlanListData>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanListData {
    pub plans: Vec<PlanRecord>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRecord {
    pub id: String,
    pub name: String,
    pub price: i64,
    pub credits: i32,
    pub extend_days: i64,
    pub order_type: String,
}

impl From<&crate::config::PlanConfig> for PlanRecord {
    fn from(plan: &crate::config::PlanConfig) -> Self {
        Self {
            id: plan.id.clone(),
            name: plan.name.clone(),
            price: plan.price,
            credits: plan.credits,
            extend_days: plan.extend_days,
            order_type: plan.order_type.clone(),
        }
    }
}

/// Long-poll result: the settled order, or still-pending after the timeout
pub type OrderWaitResponse = SuccessResponse<OrderWaitData>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderWaitData {
    pub paid: bool,
    pub order: Option<OrderRecord>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ValidateVoucherRequest {
    #[validate(length(min = 1, max = 64))]
    pub plan_id: String,

    #[validate(length(min = 1, max = 64))]
    pub code: String,
}

pub type VoucherResponse = SuccessResponse<VoucherData>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoucherData {
    pub code: String,
    pub discount_percent: i32,
    pub discounted_amount: i64,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RedeemGiftcodeRequest {
    #[validate(length(min = 1, max = 64))]
    pub code: String,
}

pub type GiftcodeResponse = SuccessResponse<GiftcodeData>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GiftcodeData {
    pub credits_added: i32,
}

/// Payload of the external settlement webhook
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SettlementNotification {
    #[validate(length(min = 1, max = 32))]
    pub transaction_code: String,

    pub amount: i64,

    /// Provider-side identifier, logged for reconciliation
    #[validate(length(max = 128))]
    pub reference_id: Option<String>,
}
