use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One-shot redeemable code. `redeemed_at IS NULL` is the claim guard:
/// redemption is a conditional update on that predicate.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "gift_codes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub code: String,
    pub credits: i32,
    pub extend_days: i32,
    pub redeemed_by: Option<Uuid>,
    pub redeemed_at: Option<TimeDateTimeWithTimeZone>,
    pub created_at: TimeDateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
