//! Stripe Checkout session creation

use sqlx::PgPool;
use stripe::{
    CheckoutSession, CheckoutSessionMode, CreateCheckoutSession, CreateCheckoutSessionLineItems,
    CreateCheckoutSessionSubscriptionData, CustomerId,
};
use uuid::Uuid;

use crate::client::StripeClient;
use crate::error::{BillingError, BillingResult};
use crate::plan::PlanType;
use crate::subscriptions::SubscriptionService;

/// Checkout session returned to the client
#[derive(Debug, Clone, serde::Serialize)]
pub struct CheckoutResponse {
    pub session_id: String,
    pub checkout_url: String,
}

/// Checkout service: builds Stripe-hosted checkout flows for a validated plan
pub struct CheckoutService {
    stripe: StripeClient,
    pool: PgPool,
}

impl CheckoutService {
    pub fn new(stripe: StripeClient, pool: PgPool) -> Self {
        Self { stripe, pool }
    }

    /// Create a subscription checkout session for the tenant.
    ///
    /// The plan has already been validated by `PlanType::parse`. The tenant ID
    /// goes into both the session metadata and the subscription metadata so
    /// webhook reconciliation can resolve the tenant from either object.
    pub async fn create_subscription_checkout(
        &self,
        company_id: Uuid,
        customer_id: &str,
        plan: PlanType,
    ) -> BillingResult<CheckoutResponse> {
        // At-most-one-active-subscription invariant. Not transactional with
        // the session creation below.
        let subscriptions = SubscriptionService::new(self.stripe.clone(), self.pool.clone());
        subscriptions
            .ensure_no_active_subscription(customer_id)
            .await?;

        let price_id = self.stripe.config().price_id_for_plan(plan).to_string();

        let customer_id = customer_id
            .parse::<CustomerId>()
            .map_err(|e| BillingError::StripeApi(format!("Invalid customer ID: {e}")))?;

        let mut metadata = std::collections::HashMap::new();
        metadata.insert("company_id".to_string(), company_id.to_string());
        metadata.insert("plan".to_string(), plan.as_str().to_string());

        let company_ref = company_id.to_string();
        let config = self.stripe.config();

        let mut params = CreateCheckoutSession::new();
        params.customer = Some(customer_id);
        params.mode = Some(CheckoutSessionMode::Subscription);
        params.line_items = Some(vec![CreateCheckoutSessionLineItems {
            price: Some(price_id),
            quantity: Some(1),
            ..Default::default()
        }]);
        params.success_url = Some(&config.checkout_success_url);
        params.cancel_url = Some(&config.checkout_cancel_url);
        params.client_reference_id = Some(&company_ref);
        params.metadata = Some(metadata.clone());
        params.subscription_data = Some(CreateCheckoutSessionSubscriptionData {
            metadata: Some(metadata),
            ..Default::default()
        });

        let session = CheckoutSession::create(self.stripe.inner(), params).await?;

        let checkout_url = session
            .url
            .clone()
            .ok_or_else(|| BillingError::StripeApi("Checkout session has no URL".to_string()))?;

        tracing::info!(
            company_id = %company_id,
            session_id = %session.id,
            plan = %plan,
            "Created checkout session"
        );

        Ok(CheckoutResponse {
            session_id: session.id.to_string(),
            checkout_url,
        })
    }
}
