//! Application state

use sqlx::PgPool;
use std::sync::Arc;

use crate::{
    auth::{AuthState, JwtManager},
    config::Config,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub jwt_manager: JwtManager,
    /// Billing service (None when Stripe env vars are missing)
    pub billing: Option<Arc<locagest_billing::BillingService>>,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Self {
        let jwt_manager = JwtManager::new(&config.jwt_secret, config.jwt_expiry_hours);

        // Billing is optional: the trial gate works without Stripe, tenants
        // just cannot convert until it is configured.
        let billing = match locagest_billing::BillingService::from_env(pool.clone()) {
            Ok(svc) => {
                tracing::info!("Stripe billing service initialized");
                Some(Arc::new(svc))
            }
            Err(e) => {
                tracing::warn!("Stripe billing not configured: {}", e);
                None
            }
        };

        Self {
            pool,
            config,
            jwt_manager,
            billing,
        }
    }

    /// Get auth state for middleware
    pub fn auth_state(&self) -> AuthState {
        AuthState {
            jwt_manager: self.jwt_manager.clone(),
            pool: self.pool.clone(),
        }
    }

    /// Billing service, or a 503-mapping error when not configured
    pub fn billing_service(&self) -> Result<&Arc<locagest_billing::BillingService>, crate::error::ApiError> {
        self.billing.as_ref().ok_or_else(|| {
            crate::error::ApiError::ServiceUnavailable("Billing not configured".to_string())
        })
    }
}
