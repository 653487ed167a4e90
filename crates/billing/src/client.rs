//! Stripe client and configuration

use std::sync::Arc;

use crate::error::{BillingError, BillingResult};
use crate::plan::PlanType;

/// Stripe configuration loaded from the environment
#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    pub webhook_secret: String,
    pub price_monthly: String,
    pub price_annual: String,
    /// Where Stripe sends the browser after checkout
    pub checkout_success_url: String,
    pub checkout_cancel_url: String,
    /// Where the customer portal sends the browser back to
    pub portal_return_url: String,
}

impl StripeConfig {
    pub fn from_env() -> BillingResult<Self> {
        let secret_key = require_env("STRIPE_SECRET_KEY")?;
        let webhook_secret = require_env("STRIPE_WEBHOOK_SECRET")?;
        let price_monthly = require_env("STRIPE_PRICE_MONTHLY")?;
        let price_annual = require_env("STRIPE_PRICE_ANNUAL")?;

        let app_base_url =
            std::env::var("APP_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());

        Ok(Self {
            secret_key,
            webhook_secret,
            price_monthly,
            price_annual,
            checkout_success_url: format!("{app_base_url}/dashboard?checkout=success"),
            checkout_cancel_url: format!("{app_base_url}/assinatura"),
            portal_return_url: format!("{app_base_url}/assinatura-gestao"),
        })
    }

    /// Price ID for a validated plan
    pub fn price_id_for_plan(&self, plan: PlanType) -> &str {
        match plan {
            PlanType::Monthly => &self.price_monthly,
            PlanType::Annual => &self.price_annual,
        }
    }
}

fn require_env(name: &str) -> BillingResult<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| BillingError::Config(format!("{name} not set")))
}

/// Shared Stripe client
#[derive(Clone)]
pub struct StripeClient {
    client: stripe::Client,
    config: Arc<StripeConfig>,
}

impl StripeClient {
    pub fn new(config: StripeConfig) -> Self {
        let client = stripe::Client::new(config.secret_key.clone());
        Self {
            client,
            config: Arc::new(config),
        }
    }

    pub fn from_env() -> BillingResult<Self> {
        Ok(Self::new(StripeConfig::from_env()?))
    }

    pub fn inner(&self) -> &stripe::Client {
        &self.client
    }

    pub fn config(&self) -> &StripeConfig {
        &self.config
    }
}
