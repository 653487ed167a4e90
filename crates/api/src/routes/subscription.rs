//! Subscription checkout and portal endpoints

use axum::{extract::State, Extension, Json};
use locagest_billing::PlanType;
use serde::Deserialize;
use serde_json::json;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubscriptionRequest {
    pub plan_type: String,
}

/// POST /api/subscription/create
///
/// Plan validation happens before the customer lookup so a bad planType
/// never costs a Stripe round trip.
pub async fn create_subscription(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<CreateSubscriptionRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let plan = PlanType::parse(&body.plan_type)?;

    let billing = state.billing_service()?;

    let (name, email): (String, Option<String>) =
        sqlx::query_as("SELECT name, email FROM company_profiles WHERE id = $1")
            .bind(user.company_id)
            .fetch_optional(&state.pool)
            .await?
            .ok_or_else(|| {
                ApiError::NotFound(format!("No profile for company {}", user.company_id))
            })?;

    let contact_email = email.unwrap_or_else(|| user.email.clone());

    let customer_id = billing
        .customer
        .get_or_create(user.company_id, &contact_email, &name)
        .await?;

    let checkout = billing
        .checkout
        .create_subscription_checkout(user.company_id, &customer_id, plan)
        .await?;

    Ok(Json(json!({
        "success": true,
        "checkoutUrl": checkout.checkout_url,
        "sessionId": checkout.session_id,
    })))
}

/// POST /api/subscription/portal
pub async fn create_portal_session(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<serde_json::Value>> {
    let billing = state.billing_service()?;

    let customer_id: Option<(Option<String>,)> =
        sqlx::query_as("SELECT stripe_customer_id FROM company_profiles WHERE id = $1")
            .bind(user.company_id)
            .fetch_optional(&state.pool)
            .await?;

    let customer_id = customer_id
        .and_then(|(id,)| id)
        .ok_or_else(|| {
            ApiError::NotFound("No billing customer for this account yet".to_string())
        })?;

    let portal = billing.portal.create_portal_session(&customer_id).await?;

    Ok(Json(json!({ "success": true, "url": portal.url })))
}
