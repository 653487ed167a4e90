//! Trial state evaluation
//!
//! Pure derivation of a tenant's gating state from the profile timestamps.
//! There is deliberately no caching here: every access decision re-evaluates,
//! and both enforcement points (edge middleware and the strict route guard)
//! must agree because they call the same function.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::types::SubscriptionStatus;

pub const SECONDS_PER_DAY: i64 = 86_400;

/// Derived trial/subscription state. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialState {
    pub is_active: bool,
    pub is_expired: bool,
    /// Days remaining, clamped to >= 0 for display. Expiry is decided by the
    /// unclamped `now > trial_end` comparison, never by this value.
    pub days_left: i64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub trial_end: Option<OffsetDateTime>,
    pub status: SubscriptionStatus,
}

impl TrialState {
    /// Evaluate the gating state at `now`.
    ///
    /// - `is_expired` is `now > trial_end`, regardless of status.
    /// - `is_active` means an unexpired trial.
    /// - A paid subscription (`Active`) is allowed even past `trial_end`;
    ///   `Cancelled` is denied even before it.
    pub fn evaluate(
        now: OffsetDateTime,
        trial_start: OffsetDateTime,
        trial_end: OffsetDateTime,
        status: SubscriptionStatus,
    ) -> Self {
        debug_assert!(trial_end >= trial_start, "trial_end precedes trial_start");

        let is_expired = now > trial_end;
        let is_active = !is_expired && status == SubscriptionStatus::Trial;

        let remaining_secs = (trial_end - now).whole_seconds();
        let days_left = if remaining_secs <= 0 {
            0
        } else {
            // i64::div_ceil is unstable (int_roundings); remaining_secs > 0 here,
            // so the unsigned division is value-identical.
            (remaining_secs as u64).div_ceil(SECONDS_PER_DAY as u64) as i64
        };

        Self {
            is_active,
            is_expired,
            days_left,
            trial_end: Some(trial_end),
            status,
        }
    }

    /// Fail-closed default used when the profile lookup fails (no row, or a
    /// store error on a path that must deny).
    pub fn denied() -> Self {
        Self {
            is_active: false,
            is_expired: true,
            days_left: 0,
            trial_end: None,
            status: SubscriptionStatus::Expired,
        }
    }

    /// Whether this state grants access to protected functionality.
    pub fn allows_access(&self) -> bool {
        matches!(AccessDecision::from(self), AccessDecision::Allow)
    }
}

/// Terminal rendering/enforcement branch for a trial state.
///
/// `Lock` is the blocking "access locked" view (actions: manage subscription,
/// sign out); `Funnel` sends the tenant straight to subscription management.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    /// Paid subscription or unexpired trial: render/serve normally.
    Allow,
    /// Trial ran out: blocking locked view.
    Lock,
    /// Cancelled or anything unrecognized: subscription management page.
    Funnel,
}

impl From<&TrialState> for AccessDecision {
    fn from(state: &TrialState) -> Self {
        match state.status {
            // Paid subscription overrides trial_end entirely.
            SubscriptionStatus::Active => Self::Allow,
            SubscriptionStatus::Cancelled => Self::Funnel,
            SubscriptionStatus::Trial if state.is_active => Self::Allow,
            SubscriptionStatus::Trial | SubscriptionStatus::Expired => Self::Lock,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const START: OffsetDateTime = datetime!(2025-01-01 00:00 UTC);
    const END: OffsetDateTime = datetime!(2025-01-08 00:00 UTC);

    #[test]
    fn mid_trial_is_active_with_three_days_left() {
        let state = TrialState::evaluate(
            datetime!(2025-01-05 00:00 UTC),
            START,
            END,
            SubscriptionStatus::Trial,
        );
        assert!(state.is_active);
        assert!(!state.is_expired);
        assert_eq!(state.days_left, 3);
        assert_eq!(AccessDecision::from(&state), AccessDecision::Allow);
    }

    #[test]
    fn day_after_trial_end_is_expired_and_locked() {
        let state = TrialState::evaluate(
            datetime!(2025-01-09 00:00 UTC),
            START,
            END,
            SubscriptionStatus::Trial,
        );
        assert!(!state.is_active);
        assert!(state.is_expired);
        assert_eq!(state.days_left, 0);
        assert_eq!(AccessDecision::from(&state), AccessDecision::Lock);
    }

    #[test]
    fn expired_regardless_of_status_when_past_end() {
        let now = datetime!(2025-02-01 00:00 UTC);
        for status in [
            SubscriptionStatus::Trial,
            SubscriptionStatus::Active,
            SubscriptionStatus::Expired,
            SubscriptionStatus::Cancelled,
        ] {
            let state = TrialState::evaluate(now, START, END, status);
            assert!(state.is_expired, "status {status} should report expired");
        }
    }

    #[test]
    fn paid_subscription_allowed_past_trial_end() {
        let state = TrialState::evaluate(
            datetime!(2025-06-01 00:00 UTC),
            START,
            END,
            SubscriptionStatus::Active,
        );
        assert!(state.is_expired);
        assert_eq!(AccessDecision::from(&state), AccessDecision::Allow);
        assert!(state.allows_access());
    }

    #[test]
    fn cancelled_funnels_even_inside_trial_window() {
        let state = TrialState::evaluate(
            datetime!(2025-01-02 00:00 UTC),
            START,
            END,
            SubscriptionStatus::Cancelled,
        );
        assert!(!state.is_expired);
        assert_eq!(AccessDecision::from(&state), AccessDecision::Funnel);
        assert!(!state.allows_access());
    }

    #[test]
    fn days_left_never_negative() {
        for days_past in 0..30 {
            let now = END + time::Duration::days(days_past);
            let state = TrialState::evaluate(now, START, END, SubscriptionStatus::Trial);
            assert!(state.days_left >= 0);
        }
    }

    #[test]
    fn days_left_rounds_up_partial_days() {
        // 1 second remaining still counts as 1 day for display
        let state = TrialState::evaluate(
            END - time::Duration::seconds(1),
            START,
            END,
            SubscriptionStatus::Trial,
        );
        assert_eq!(state.days_left, 1);

        // 1 day + 1 second rounds up to 2
        let state = TrialState::evaluate(
            END - time::Duration::seconds(SECONDS_PER_DAY + 1),
            START,
            END,
            SubscriptionStatus::Trial,
        );
        assert_eq!(state.days_left, 2);
    }

    #[test]
    fn exactly_at_trial_end_is_not_expired() {
        // Expiry is strictly `now > trial_end`
        let state = TrialState::evaluate(END, START, END, SubscriptionStatus::Trial);
        assert!(!state.is_expired);
        assert!(state.is_active);
        assert_eq!(state.days_left, 0);
    }

    #[test]
    fn denied_default_fails_closed() {
        let state = TrialState::denied();
        assert!(state.is_expired);
        assert!(!state.is_active);
        assert_eq!(state.status, SubscriptionStatus::Expired);
        assert_eq!(state.days_left, 0);
        assert!(!state.allows_access());
    }

    #[test]
    fn evaluation_is_deterministic() {
        let now = datetime!(2025-01-05 12:30 UTC);
        let a = TrialState::evaluate(now, START, END, SubscriptionStatus::Trial);
        let b = TrialState::evaluate(now, START, END, SubscriptionStatus::Trial);
        assert_eq!(a, b);
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let state = TrialState::denied();
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["isExpired"], true);
        assert_eq!(json["isActive"], false);
        assert_eq!(json["daysLeft"], 0);
        assert_eq!(json["status"], "expired");
        assert!(json["trialEnd"].is_null());
    }
}
