use super::sea_orm_active_enums::OrderStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Bank-transfer payment order for a credit top-up plan.
///
/// `transaction_code` is the human-typed reference the payer puts in the
/// bank memo; the settlement webhook joins on it. `code_version` marks
/// the code-generation scheme a row was created under.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "payment_orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: String,
    pub plan_name: String,
    pub amount: i64,
    pub currency: String,
    pub order_type: String,
    pub credits_added: i32,
    pub status: OrderStatus,
    pub payment_method: String,
    #[sea_orm(unique)]
    pub transaction_code: String,
    pub code_version: i16,
    pub created_at: TimeDateTimeWithTimeZone,
    pub updated_at: TimeDateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
