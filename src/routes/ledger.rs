use axum::{extract::State, Json};
use tracing::instrument;

use crate::{
    app_state::AppState,
    error::Result,
    middleware::UserIdentity,
    models::{
        common::SuccessResponse,
        ledger::{CreditStatusData, CreditStatusResponse},
    },
};

/// GET /api/v1/credits/status
#[instrument(skip(state, identity))]
pub async fn get_credit_status(
    State(state): State<AppState>,
    identity: UserIdentity,
) -> Result<Json<CreditStatusResponse>> {
    let status = state
        .ledger_service
        .get_status(identity.user_id, identity.email.as_deref())
        .await?;

    let entries = state
        .ledger_service
        .recent_entries(identity.user_id, 20)
        .await?;

    Ok(Json(SuccessResponse::new(CreditStatusData {
        credits: status.credits,
        subscription_end: status.subscription_end,
        is_expired: status.is_expired,
        recent_entries: entries.into_iter().map(Into::into).collect(),
    })))
}
