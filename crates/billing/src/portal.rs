//! Stripe customer portal sessions

use stripe::{BillingPortalSession, CreateBillingPortalSession, CustomerId};

use crate::client::StripeClient;
use crate::error::{BillingError, BillingResult};

/// Portal session returned to the client
#[derive(Debug, Clone, serde::Serialize)]
pub struct PortalResponse {
    pub url: String,
}

/// Portal service: Stripe-hosted self-service subscription management
pub struct PortalService {
    stripe: StripeClient,
}

impl PortalService {
    pub fn new(stripe: StripeClient) -> Self {
        Self { stripe }
    }

    pub async fn create_portal_session(&self, customer_id: &str) -> BillingResult<PortalResponse> {
        let customer_id = customer_id
            .parse::<CustomerId>()
            .map_err(|e| BillingError::StripeApi(format!("Invalid customer ID: {e}")))?;

        let return_url = self.stripe.config().portal_return_url.clone();

        let mut params = CreateBillingPortalSession::new(customer_id);
        params.return_url = Some(&return_url);

        let session = BillingPortalSession::create(self.stripe.inner(), params).await?;

        Ok(PortalResponse { url: session.url })
    }
}
