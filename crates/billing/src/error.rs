//! Billing error taxonomy

/// Errors surfaced by the billing services
#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    /// Rejected before any network call: planType was not monthly/annual.
    #[error("Invalid plan '{0}'. Valid plans are: monthly, annual")]
    InvalidPlan(String),

    /// The tenant already has an active or trialing subscription.
    #[error("An active or trialing subscription already exists for this company")]
    DuplicateSubscription,

    #[error("No Stripe customer found for '{0}'")]
    CustomerNotFound(String),

    #[error("No subscription found for company {0}")]
    SubscriptionNotFound(String),

    #[error("Stripe API error: {0}")]
    StripeApi(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Webhook signature verification failed")]
    WebhookSignatureInvalid,

    #[error("Webhook event not supported: {0}")]
    WebhookEventNotSupported(String),

    #[error("Email delivery failed: {0}")]
    Email(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for BillingError {
    fn from(e: sqlx::Error) -> Self {
        Self::Database(e.to_string())
    }
}

impl From<stripe::StripeError> for BillingError {
    fn from(e: stripe::StripeError) -> Self {
        Self::StripeApi(e.to_string())
    }
}

pub type BillingResult<T> = Result<T, BillingError>;
