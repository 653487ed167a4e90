//! Stripe customer management

use sqlx::PgPool;
use stripe::{CreateCustomer, Customer};
use uuid::Uuid;

use crate::client::StripeClient;
use crate::error::{BillingError, BillingResult};

/// Customer service: one Stripe customer per tenant, created lazily and
/// persisted on `company_profiles.stripe_customer_id`.
pub struct CustomerService {
    stripe: StripeClient,
    pool: PgPool,
}

impl CustomerService {
    pub fn new(stripe: StripeClient, pool: PgPool) -> Self {
        Self { stripe, pool }
    }

    /// Get the tenant's Stripe customer ID, creating the customer if absent.
    pub async fn get_or_create(
        &self,
        company_id: Uuid,
        email: &str,
        company_name: &str,
    ) -> BillingResult<String> {
        let existing: Option<(Option<String>,)> =
            sqlx::query_as("SELECT stripe_customer_id FROM company_profiles WHERE id = $1")
                .bind(company_id)
                .fetch_optional(&self.pool)
                .await?;

        let existing =
            existing.ok_or_else(|| BillingError::CustomerNotFound(company_id.to_string()))?;

        if let (Some(customer_id),) = existing {
            return Ok(customer_id);
        }

        let mut metadata = std::collections::HashMap::new();
        metadata.insert("company_id".to_string(), company_id.to_string());

        let mut params = CreateCustomer::new();
        params.email = Some(email);
        params.name = Some(company_name);
        params.metadata = Some(metadata);

        let customer = Customer::create(self.stripe.inner(), params).await?;
        let customer_id = customer.id.to_string();

        sqlx::query(
            "UPDATE company_profiles SET stripe_customer_id = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(&customer_id)
        .bind(company_id)
        .execute(&self.pool)
        .await?;

        tracing::info!(
            company_id = %company_id,
            customer_id = %customer_id,
            "Created Stripe customer"
        );

        Ok(customer_id)
    }

    /// Resolve a tenant from a Stripe customer ID (webhook reconciliation).
    pub async fn company_id_for_customer(&self, customer_id: &str) -> BillingResult<Uuid> {
        let result: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM company_profiles WHERE stripe_customer_id = $1")
                .bind(customer_id)
                .fetch_optional(&self.pool)
                .await?;

        result
            .map(|(id,)| id)
            .ok_or_else(|| BillingError::CustomerNotFound(customer_id.to_string()))
    }
}
