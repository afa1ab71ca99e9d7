use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Insufficient credits: need {required}, have {available}")]
    InsufficientCredits { required: i32, available: i32 },

    #[error("Voucher not found: {0}")]
    VoucherNotFound(String),

    #[error("Voucher is not active: {0}")]
    VoucherInactive(String),

    #[error("Voucher outside its validity window: {0}")]
    VoucherExpired(String),

    #[error("Invalid or already used gift code: {0}")]
    InvalidGiftcode(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::Database(ref e) => {
                // A dropped write here could strand a debit; always log loudly.
                tracing::error!("Storage error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORAGE_ERROR",
                    "An internal storage error occurred".to_string(),
                )
            }
            ApiError::InsufficientCredits {
                required,
                available,
            } => (
                StatusCode::PAYMENT_REQUIRED,
                "INSUFFICIENT_CREDITS",
                format!("Insufficient credits: need {}, have {}", required, available),
            ),
            ApiError::VoucherNotFound(ref code) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "VOUCHER_NOT_FOUND",
                format!("Voucher '{}' does not exist", code),
            ),
            ApiError::VoucherInactive(ref code) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "VOUCHER_INACTIVE",
                format!("Voucher '{}' is not active", code),
            ),
            ApiError::VoucherExpired(ref code) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "VOUCHER_EXPIRED",
                format!("Voucher '{}' is outside its validity window", code),
            ),
            ApiError::InvalidGiftcode(ref msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "GIFTCODE_INVALID",
                msg.clone(),
            ),
            ApiError::BadRequest(ref msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiError::NotFound(ref msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            ApiError::Unauthorized(ref msg) => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
            }
            ApiError::Conflict(ref msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            ApiError::Internal(ref e) => {
                tracing::error!("Internal error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "success": false,
            "error": {
                "code": error_code,
                "message": message,
            }
        });

        (status, Json(body)).into_response()
    }
}

// Helper type for results
pub type Result<T> = std::result::Result<T, ApiError>;
