//! Common types used across Locagest

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Subscription status of a tenant
///
/// Persisted on `company_profiles.status`. `trial_start`/`trial_end` are set
/// once at tenant creation; only webhook reconciliation moves the status to
/// `active` or `cancelled` afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Trial,
    Active,
    Expired,
    Cancelled,
}

impl Default for SubscriptionStatus {
    fn default() -> Self {
        Self::Trial
    }
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trial => "trial",
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse a stored status value, defaulting unknown values to `Expired`
    /// so a corrupted row denies access rather than granting it.
    pub fn parse_or_denied(s: &str) -> Self {
        match s {
            "trial" => Self::Trial,
            "active" => Self::Active,
            "expired" => Self::Expired,
            "cancelled" => Self::Cancelled,
            other => {
                tracing::warn!(status = %other, "Unknown subscription status, treating as expired");
                Self::Expired
            }
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tenant profile row (`company_profiles`)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CompanyProfile {
    pub id: Uuid,
    pub owner_user_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: SubscriptionStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub trial_start: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub trial_end: OffsetDateTime,
    pub stripe_customer_id: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            SubscriptionStatus::Trial,
            SubscriptionStatus::Active,
            SubscriptionStatus::Expired,
            SubscriptionStatus::Cancelled,
        ] {
            assert_eq!(SubscriptionStatus::parse_or_denied(status.as_str()), status);
        }
    }

    #[test]
    fn unknown_status_denies() {
        assert_eq!(
            SubscriptionStatus::parse_or_denied("past_due"),
            SubscriptionStatus::Expired
        );
        assert_eq!(
            SubscriptionStatus::parse_or_denied(""),
            SubscriptionStatus::Expired
        );
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&SubscriptionStatus::Cancelled).unwrap();
        assert_eq!(json, "\"cancelled\"");
    }
}
