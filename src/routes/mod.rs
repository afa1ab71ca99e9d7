// Route modules
pub mod jobs;
pub mod ledger;
pub mod payments;
pub mod webhook;

use crate::{
    app_state::AppState,
    middleware::{gateway_identity_middleware, logging_middleware},
};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", api_v1_routes())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// API v1 routes
fn api_v1_routes() -> Router<AppState> {
    // Routes requiring a gateway-verified user identity
    let identity_routes = Router::new()
        .route("/credits/status", get(ledger::get_credit_status))
        .route("/jobs", post(jobs::create_job).get(jobs::list_jobs))
        .route("/jobs/{id}", get(jobs::get_job))
        .route("/jobs/{id}/processing", post(jobs::mark_processing))
        .route("/jobs/{id}/complete", post(jobs::complete_job))
        .route("/jobs/{id}/fail", post(jobs::fail_job))
        .route("/payments/plans", get(payments::list_plans))
        .route("/payments/orders", post(payments::create_order))
        .route("/payments/orders/{id}/wait", get(payments::wait_order))
        .route(
            "/payments/vouchers/validate",
            post(payments::validate_voucher),
        )
        .route(
            "/payments/giftcodes/redeem",
            post(payments::redeem_giftcode),
        )
        .layer(middleware::from_fn(gateway_identity_middleware));

    // Public routes (authenticated by their own API key, not user identity)
    let public_routes =
        Router::new().route("/webhooks/settlement", post(webhook::settlement_webhook));

    // Combine all routes with request/response logging
    Router::new()
        .merge(identity_routes)
        .merge(public_routes)
        .layer(middleware::from_fn(logging_middleware))
}
