use super::sea_orm_active_enums::JobStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One unit of asynchronous generation work, tied to the debit that paid
/// for it through `usage_log_id`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "generation_jobs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub tool_id: String,
    #[sea_orm(column_type = "Text")]
    pub prompt: String,
    pub cost: i32,
    pub usage_log_id: Uuid,
    pub status: JobStatus,
    pub result_url: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub error_message: Option<String>,
    pub created_at: TimeDateTimeWithTimeZone,
    pub updated_at: TimeDateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
