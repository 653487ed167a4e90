//! Authentication and gating for Locagest

pub mod jwt;
pub mod middleware;

pub use jwt::{Claims, JwtManager};
pub use middleware::{
    require_auth, require_subscription, require_trial_active, AuthError, AuthState, AuthUser,
    SUBSCRIPTION_REDIRECT,
};
