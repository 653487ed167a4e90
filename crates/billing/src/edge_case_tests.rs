// Test file - these are expected patterns in test code
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

//! Edge Case Tests for Billing
//!
//! Boundary conditions across:
//! - Plan validation
//! - Stripe status mapping vs. gating decisions
//! - Trial evaluation at exact boundaries

#[cfg(test)]
mod plan_validation_tests {
    use crate::error::BillingError;
    use crate::plan::PlanType;

    #[test]
    fn test_plan_parsed_before_any_network_call() {
        // Invalid plan must fail locally with InvalidPlan, never StripeApi.
        let err = PlanType::parse("lifetime").unwrap_err();
        assert!(matches!(err, BillingError::InvalidPlan(_)));
    }

    #[test]
    fn test_plan_parsing_is_case_sensitive() {
        assert!(PlanType::parse("Monthly").is_err());
        assert!(PlanType::parse("ANNUAL").is_err());
        assert_eq!(PlanType::parse("monthly").unwrap(), PlanType::Monthly);
        assert_eq!(PlanType::parse("annual").unwrap(), PlanType::Annual);
    }

    #[test]
    fn test_plan_rejects_surrounding_whitespace() {
        assert!(PlanType::parse(" monthly").is_err());
        assert!(PlanType::parse("annual\n").is_err());
    }
}

#[cfg(test)]
mod status_mapping_tests {
    use crate::subscriptions::status_from_stripe;
    use locagest_shared::{AccessDecision, SubscriptionStatus, TrialState};
    use stripe::SubscriptionStatus as StripeSubStatus;
    use time::macros::datetime;

    /// Every Stripe status, pushed through the mapper and then the access
    /// decision for a tenant whose trial window has already lapsed. Only
    /// statuses Stripe considers payable should keep the tenant unlocked.
    #[test]
    fn test_stripe_status_to_access_decision_matrix() {
        let trial_start = datetime!(2025-01-01 00:00:00 UTC);
        let trial_end = datetime!(2025-01-08 00:00:00 UTC);
        let now = datetime!(2025-02-01 00:00:00 UTC);

        let cases = [
            (StripeSubStatus::Active, AccessDecision::Allow),
            (StripeSubStatus::PastDue, AccessDecision::Allow),
            (StripeSubStatus::Trialing, AccessDecision::Lock),
            (StripeSubStatus::Canceled, AccessDecision::Funnel),
            (StripeSubStatus::IncompleteExpired, AccessDecision::Funnel),
            (StripeSubStatus::Incomplete, AccessDecision::Lock),
            (StripeSubStatus::Unpaid, AccessDecision::Lock),
            (StripeSubStatus::Paused, AccessDecision::Lock),
        ];

        for (stripe_status, expected) in cases {
            let status = status_from_stripe(stripe_status);
            let state = TrialState::evaluate(now, trial_start, trial_end, status);
            assert_eq!(
                AccessDecision::from(&state),
                expected,
                "stripe status {stripe_status:?} (mapped to {status:?})"
            );
        }
    }

    #[test]
    fn test_active_subscription_overrides_lapsed_trial() {
        let state = TrialState::evaluate(
            datetime!(2026-06-01 00:00:00 UTC),
            datetime!(2025-01-01 00:00:00 UTC),
            datetime!(2025-01-08 00:00:00 UTC),
            SubscriptionStatus::Active,
        );
        assert!(state.is_expired, "trial window itself has lapsed");
        assert_eq!(AccessDecision::from(&state), AccessDecision::Allow);
    }

    #[test]
    fn test_cancelled_funnels_even_inside_trial_window() {
        let state = TrialState::evaluate(
            datetime!(2025-01-02 00:00:00 UTC),
            datetime!(2025-01-01 00:00:00 UTC),
            datetime!(2025-01-08 00:00:00 UTC),
            SubscriptionStatus::Cancelled,
        );
        assert_eq!(AccessDecision::from(&state), AccessDecision::Funnel);
    }
}

#[cfg(test)]
mod trial_boundary_tests {
    use locagest_shared::{AccessDecision, SubscriptionStatus, TrialState};
    use time::macros::datetime;
    use time::Duration;

    const START: time::OffsetDateTime = datetime!(2025-01-01 00:00:00 UTC);
    const END: time::OffsetDateTime = datetime!(2025-01-08 00:00:00 UTC);

    #[test]
    fn test_exactly_at_trial_end_still_allowed() {
        let state = TrialState::evaluate(END, START, END, SubscriptionStatus::Trial);
        assert!(!state.is_expired);
        assert_eq!(AccessDecision::from(&state), AccessDecision::Allow);
    }

    #[test]
    fn test_one_second_past_trial_end_locks() {
        let state = TrialState::evaluate(
            END + Duration::seconds(1),
            START,
            END,
            SubscriptionStatus::Trial,
        );
        assert!(state.is_expired);
        assert_eq!(state.days_left, 0);
        assert_eq!(AccessDecision::from(&state), AccessDecision::Lock);
    }

    #[test]
    fn test_days_left_rounds_up_partial_days() {
        // 1 second remaining counts as 1 day, 24h+1s counts as 2 days.
        let one_sec = TrialState::evaluate(
            END - Duration::seconds(1),
            START,
            END,
            SubscriptionStatus::Trial,
        );
        assert_eq!(one_sec.days_left, 1);

        let day_plus = TrialState::evaluate(
            END - Duration::seconds(86_401),
            START,
            END,
            SubscriptionStatus::Trial,
        );
        assert_eq!(day_plus.days_left, 2);
    }

    #[test]
    fn test_denied_default_is_fail_closed() {
        let state = TrialState::denied();
        assert!(state.is_expired);
        assert!(!state.is_active);
        assert_eq!(state.days_left, 0);
        assert_eq!(AccessDecision::from(&state), AccessDecision::Lock);
    }
}
