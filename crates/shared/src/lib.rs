#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Shared types and database helpers for Locagest
//!
//! Everything here is usable without the billing crate: the trial evaluator
//! and access decision are pure functions, so both the API middleware and the
//! billing webhook handlers compute gating verdicts the same way.

pub mod db;
pub mod trial;
pub mod types;

pub use db::{create_pool, run_migrations};
pub use trial::{AccessDecision, TrialState, SECONDS_PER_DAY};
pub use types::{CompanyProfile, SubscriptionStatus};
