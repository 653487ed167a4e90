//! Stripe webhook endpoint

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde_json::json;

use crate::state::AppState;

/// POST /api/webhooks/stripe
///
/// Unauthenticated; the signature is the authentication. The raw body must
/// reach verification byte-for-byte, so no Json extractor here.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, Json<serde_json::Value>) {
    let Some(billing) = state.billing.as_ref() else {
        tracing::error!("Webhook received but billing is not configured");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "billing not configured" })),
        );
    };

    let Some(signature) = headers
        .get("Stripe-Signature")
        .and_then(|v| v.to_str().ok())
    else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "missing Stripe-Signature header" })),
        );
    };

    let event = match billing.webhooks.verify_event(&body, signature) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, "Webhook signature verification failed");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "invalid signature" })),
            );
        }
    };

    match billing.webhooks.handle_event(event).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "received": true }))),
        Err(e) => {
            // Non-2xx makes Stripe retry; the idempotency claim makes the
            // retry safe.
            tracing::error!(error = %e, "Webhook processing failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "processing failed" })),
            )
        }
    }
}
