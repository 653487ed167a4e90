//! Dashboard endpoints (the protected app surface)

use axum::{extract::State, Extension, Json};
use locagest_shared::{CompanyProfile, TrialState};
use serde_json::json;
use time::OffsetDateTime;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// GET /api/dashboard/summary
///
/// Behind the strict subscription guard: reaching this handler means the
/// tenant is allowed.
pub async fn summary(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<serde_json::Value>> {
    let profile: Option<CompanyProfile> =
        sqlx::query_as("SELECT * FROM company_profiles WHERE id = $1")
            .bind(user.company_id)
            .fetch_optional(&state.pool)
            .await?;

    let profile = profile.ok_or_else(|| {
        ApiError::NotFound(format!("No profile for company {}", user.company_id))
    })?;

    let trial = TrialState::evaluate(
        OffsetDateTime::now_utc(),
        profile.trial_start,
        profile.trial_end,
        profile.status,
    );

    Ok(Json(json!({
        "data": {
            "company": { "id": profile.id, "name": profile.name },
            "trial": trial,
        }
    })))
}

/// GET /dashboard
///
/// Browser entry point behind the edge guard. Locked tenants never reach
/// this handler; they get the 307 redirect upstream.
pub async fn entry(
    Extension(user): Extension<AuthUser>,
) -> Json<serde_json::Value> {
    Json(json!({
        "app": "locagest",
        "companyId": user.company_id,
    }))
}
