use entity::sea_orm_active_enums::LedgerEntryType;
use serde::Serialize;

use super::common::SuccessResponse;

pub type CreditStatusResponse = SuccessResponse<CreditStatusData>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditStatusData {
    pub credits: i32,
    pub subscription_end: Option<time::OffsetDateTime>,
    pub is_expired: bool,
    pub recent_entries: Vec<LedgerEntryRecord>,
}

/// One row of the audit trail, as shown to the account owner
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntryRecord {
    pub id: uuid::Uuid,
    pub amount: i32,
    pub entry_type: LedgerEntryType,
    pub description: String,
    pub created_at: time::OffsetDateTime,
}

impl From<entity::usage_logs::Model> for LedgerEntryRecord {
    fn from(entry: entity::usage_logs::Model) -> Self {
        Self {
            id: entry.id,
            amount: entry.amount,
            entry_type: entry.entry_type,
            description: entry.description,
            created_at: entry.created_at,
        }
    }
}
