//! Subscription lookup and reconciliation

use locagest_shared::SubscriptionStatus;
use sqlx::PgPool;
use stripe::{CustomerId, ListSubscriptions, Subscription, SubscriptionStatus as StripeSubStatus};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::client::StripeClient;
use crate::error::{BillingError, BillingResult};

/// Map a Stripe subscription status onto the tenant gating status.
///
/// Past-due keeps access (Stripe is still retrying payment); everything
/// terminal or unpaid denies.
pub fn status_from_stripe(status: StripeSubStatus) -> SubscriptionStatus {
    match status {
        StripeSubStatus::Trialing => SubscriptionStatus::Trial,
        StripeSubStatus::Active | StripeSubStatus::PastDue => SubscriptionStatus::Active,
        StripeSubStatus::Canceled | StripeSubStatus::IncompleteExpired => {
            SubscriptionStatus::Cancelled
        }
        StripeSubStatus::Incomplete | StripeSubStatus::Paused | StripeSubStatus::Unpaid => {
            SubscriptionStatus::Expired
        }
    }
}

/// Subscription service for querying Stripe and syncing tenant state
pub struct SubscriptionService {
    stripe: StripeClient,
    pool: PgPool,
}

impl SubscriptionService {
    pub fn new(stripe: StripeClient, pool: PgPool) -> Self {
        Self { stripe, pool }
    }

    pub fn stripe(&self) -> &StripeClient {
        &self.stripe
    }

    /// Find the customer's active or trialing subscription, if any.
    pub async fn find_active_or_trialing(
        &self,
        customer_id: &str,
    ) -> BillingResult<Option<Subscription>> {
        let customer_id = customer_id
            .parse::<CustomerId>()
            .map_err(|e| BillingError::StripeApi(format!("Invalid customer ID: {e}")))?;

        let mut params = ListSubscriptions::new();
        params.customer = Some(customer_id);
        params.limit = Some(10);

        let subscriptions = Subscription::list(self.stripe.inner(), &params).await?;

        Ok(subscriptions.data.into_iter().find(|sub| {
            matches!(
                sub.status,
                StripeSubStatus::Active | StripeSubStatus::Trialing
            )
        }))
    }

    /// At-most-one-active-subscription invariant: reject checkout when an
    /// active or trialing subscription already exists.
    ///
    /// This check and the subsequent checkout creation are two sequential
    /// awaits with no transactional guard; concurrent duplicate calls may
    /// both pass (acknowledged race, tolerated upstream).
    pub async fn ensure_no_active_subscription(&self, customer_id: &str) -> BillingResult<()> {
        match self.find_active_or_trialing(customer_id).await? {
            Some(existing) => {
                tracing::warn!(
                    customer_id = %customer_id,
                    subscription_id = %existing.id,
                    status = ?existing.status,
                    "Checkout rejected: subscription already exists"
                );
                Err(BillingError::DuplicateSubscription)
            }
            None => Ok(()),
        }
    }

    /// Persist a Stripe subscription's status (and trial end, when present)
    /// onto the tenant profile. Last write wins; the gating logic tolerates
    /// webhook lag by re-reading on every access decision.
    pub async fn sync_subscription_to_db(
        &self,
        company_id: Uuid,
        subscription: &Subscription,
    ) -> BillingResult<()> {
        let status = status_from_stripe(subscription.status);
        let trial_end = subscription
            .trial_end
            .and_then(|ts| OffsetDateTime::from_unix_timestamp(ts).ok());

        sqlx::query(
            r#"
            UPDATE company_profiles SET
                status = $1,
                trial_end = COALESCE($2, trial_end),
                updated_at = NOW()
            WHERE id = $3
            "#,
        )
        .bind(status)
        .bind(trial_end)
        .bind(company_id)
        .execute(&self.pool)
        .await?;

        tracing::info!(
            company_id = %company_id,
            subscription_id = %subscription.id,
            status = %status,
            "Synced subscription state to profile"
        );

        Ok(())
    }

    /// Mark the tenant cancelled (subscription deleted webhook).
    pub async fn mark_cancelled(&self, company_id: Uuid) -> BillingResult<()> {
        sqlx::query(
            "UPDATE company_profiles SET status = 'cancelled', updated_at = NOW() WHERE id = $1",
        )
        .bind(company_id)
        .execute(&self.pool)
        .await?;

        tracing::info!(company_id = %company_id, "Subscription cancelled");
        Ok(())
    }

    /// Mark the tenant active (checkout completed webhook).
    pub async fn mark_active(&self, company_id: Uuid) -> BillingResult<()> {
        sqlx::query(
            "UPDATE company_profiles SET status = 'active', updated_at = NOW() WHERE id = $1",
        )
        .bind(company_id)
        .execute(&self.pool)
        .await?;

        tracing::info!(company_id = %company_id, "Subscription activated");
        Ok(())
    }
}
