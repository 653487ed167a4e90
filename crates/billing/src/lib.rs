// Billing crate clippy configuration
#![allow(clippy::field_reassign_with_default)] // Used for conditional struct field setting
// Test code patterns (expected in test files):
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Locagest Billing Module
//!
//! Handles Stripe integration for subscription gating of rental tenants.
//!
//! ## Features
//!
//! - **Checkout**: Create Stripe-hosted checkout sessions for monthly/annual plans
//! - **Customer Portal**: Self-service subscription management
//! - **Customer Mapping**: Get-or-create Stripe customers per tenant
//! - **Webhooks**: Reconcile Stripe events onto tenant profiles, idempotently
//! - **Email Notifications**: Trial ending, payment failed

pub mod checkout;
pub mod client;
pub mod customer;
pub mod email;
pub mod error;
pub mod plan;
pub mod portal;
pub mod subscriptions;
pub mod webhooks;

#[cfg(test)]
mod edge_case_tests;

// Checkout
pub use checkout::{CheckoutResponse, CheckoutService};

// Client
pub use client::{StripeClient, StripeConfig};

// Customer
pub use customer::CustomerService;

// Email
pub use email::BillingEmailService;

// Error
pub use error::{BillingError, BillingResult};

// Plan
pub use plan::PlanType;

// Portal
pub use portal::{PortalResponse, PortalService};

// Subscriptions
pub use subscriptions::{status_from_stripe, SubscriptionService};

// Webhooks
pub use webhooks::WebhookHandler;

use sqlx::PgPool;

/// Main billing service that combines all billing functionality
pub struct BillingService {
    pub checkout: CheckoutService,
    pub customer: CustomerService,
    pub email: BillingEmailService,
    pub portal: PortalService,
    pub subscriptions: SubscriptionService,
    pub webhooks: WebhookHandler,
}

impl BillingService {
    /// Create a new billing service from environment variables
    pub fn from_env(pool: PgPool) -> BillingResult<Self> {
        let stripe = StripeClient::from_env()?;
        Ok(Self::build(stripe, pool))
    }

    /// Create a new billing service with explicit config
    pub fn new(config: StripeConfig, pool: PgPool) -> Self {
        Self::build(StripeClient::new(config), pool)
    }

    fn build(stripe: StripeClient, pool: PgPool) -> Self {
        let email_service = BillingEmailService::from_env();

        Self {
            checkout: CheckoutService::new(stripe.clone(), pool.clone()),
            customer: CustomerService::new(stripe.clone(), pool.clone()),
            email: email_service.clone(),
            portal: PortalService::new(stripe.clone()),
            subscriptions: SubscriptionService::new(stripe.clone(), pool.clone()),
            webhooks: WebhookHandler::new(stripe, pool, email_service),
        }
    }
}
