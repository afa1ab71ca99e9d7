//! Identity extraction for requests arriving through the trusted gateway.
//!
//! Authentication itself lives upstream; the gateway forwards the verified
//! user as `X-User-Id` (and optionally `X-User-Email`, used for first-touch
//! account provisioning). This middleware lifts those headers into a typed
//! request extension.

use crate::error::{ApiError, Result};
use axum::{
    extract::{FromRequestParts, Request},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

/// Request extension storing the gateway-verified user
#[derive(Debug, Clone)]
pub struct UserIdentity {
    pub user_id: Uuid,
    pub email: Option<String>,
}

/// Returns 401 Unauthorized when the gateway headers are missing and
/// 400 when the user id is not a UUID.
pub async fn gateway_identity_middleware(mut request: Request, next: Next) -> Result<Response> {
    let headers = request.headers();

    let user_id = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing X-User-Id header".to_string()))?;

    let user_id = Uuid::parse_str(user_id)
        .map_err(|_| ApiError::BadRequest("X-User-Id is not a valid UUID".to_string()))?;

    let email = headers
        .get("x-user-email")
        .and_then(|v| v.to_str().ok())
        .map(|e| e.to_string());

    request
        .extensions_mut()
        .insert(UserIdentity { user_id, email });

    Ok(next.run(request).await)
}

/// Axum extractor for the gateway identity.
///
/// Only works on routes protected by gateway_identity_middleware.
impl<S> FromRequestParts<S> for UserIdentity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<UserIdentity>()
            .cloned()
            .ok_or_else(|| {
                ApiError::Unauthorized(
                    "User identity not found - route must be protected by gateway_identity_middleware"
                        .to_string(),
                )
            })
    }
}
