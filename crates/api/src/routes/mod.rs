//! HTTP routes

pub mod company;
pub mod dashboard;
pub mod subscription;
pub mod trial;
pub mod webhooks;

use axum::{
    middleware,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::json;

use crate::auth::{require_auth, require_subscription, require_trial_active};
use crate::state::AppState;

/// Build the application router.
///
/// Three tiers of protection:
/// - public: health and the signature-verified Stripe webhook,
/// - funnel: authenticated but reachable while locked, so an expired tenant
///   can still see their trial state and pay,
/// - gated: the protected app surface, behind the subscription guards.
pub fn create_router(state: AppState) -> Router {
    let auth_state = state.auth_state();

    let public = Router::new()
        .route("/health", get(health))
        .route("/api/webhooks/stripe", post(webhooks::stripe_webhook));

    let funnel = Router::new()
        .route("/api/trial/status", get(trial::trial_status))
        .route("/api/company/profile", get(company::get_profile))
        .route("/api/company/profile", put(company::update_profile))
        .route(
            "/api/subscription/create",
            post(subscription::create_subscription),
        )
        .route(
            "/api/subscription/portal",
            post(subscription::create_portal_session),
        )
        .layer(middleware::from_fn_with_state(
            auth_state.clone(),
            require_auth,
        ));

    // Data API behind the strict guard (fail closed).
    let gated_api = Router::new()
        .route("/api/dashboard/summary", get(dashboard::summary))
        .layer(middleware::from_fn_with_state(
            auth_state.clone(),
            require_subscription,
        ))
        .layer(middleware::from_fn_with_state(
            auth_state.clone(),
            require_auth,
        ));

    // Browser entry points behind the edge guard (fail open, redirects).
    let gated_pages = Router::new()
        .route("/dashboard", get(dashboard::entry))
        .layer(middleware::from_fn_with_state(
            auth_state.clone(),
            require_trial_active,
        ))
        .layer(middleware::from_fn_with_state(auth_state, require_auth));

    Router::new()
        .merge(public)
        .merge(funnel)
        .merge(gated_api)
        .merge(gated_pages)
        .with_state(state)
}

/// Liveness probe
async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
