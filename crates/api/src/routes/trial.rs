//! Trial status endpoint

use axum::{extract::State, Extension, Json};
use locagest_shared::{SubscriptionStatus, TrialState};
use serde_json::json;
use time::OffsetDateTime;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// GET /api/trial/status
///
/// Recomputes the trial state from the profile row on every call. Unlike the
/// guards, a missing profile here is a 404: the caller asked about a specific
/// tenant, there is nothing to fail closed over.
pub async fn trial_status(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<serde_json::Value>> {
    let row: Option<(SubscriptionStatus, OffsetDateTime, OffsetDateTime)> = sqlx::query_as(
        "SELECT status, trial_start, trial_end FROM company_profiles WHERE id = $1",
    )
    .bind(user.company_id)
    .fetch_optional(&state.pool)
    .await?;

    let (status, trial_start, trial_end) = row.ok_or_else(|| {
        ApiError::NotFound(format!("No profile for company {}", user.company_id))
    })?;

    let trial_state =
        TrialState::evaluate(OffsetDateTime::now_utc(), trial_start, trial_end, status);

    Ok(Json(json!({ "data": trial_state })))
}
