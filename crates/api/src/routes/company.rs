//! Tenant profile endpoints

use axum::{extract::State, Extension, Json};
use locagest_shared::CompanyProfile;
use serde::Deserialize;
use serde_json::json;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Trial window granted at tenant creation (days)
const TRIAL_PERIOD_DAYS: i64 = 7;

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// GET /api/company/profile
pub async fn get_profile(
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

    Ok(Json(json!({ "data": profile })))
}

/// PUT /api/company/profile
///
/// Upsert of the contact fields only. The insert branch opens the trial
/// window once; the update branch never touches status or trial columns,
/// those belong to webhook reconciliation.
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<UpdateProfileRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("Company name is required".to_string()));
    }

    let profile: CompanyProfile = sqlx::query_as(
        r#"
        INSERT INTO company_profiles
            (id, owner_user_id, name, email, phone, status, trial_start, trial_end)
        VALUES
            ($1, $2, $3, $4, $5, 'trial', NOW(), NOW() + ($6::TEXT || ' days')::INTERVAL)
        ON CONFLICT (id) DO UPDATE SET
            name = EXCLUDED.name,
            email = EXCLUDED.email,
            phone = EXCLUDED.phone,
            updated_at = NOW()
        RETURNING *
        "#,
    )
    .bind(user.company_id)
    .bind(user.user_id)
    .bind(name)
    .bind(&body.email)
    .bind(&body.phone)
    .bind(TRIAL_PERIOD_DAYS)
    .fetch_one(&state.pool)
    .await?;

    tracing::info!(company_id = %user.company_id, "Profile updated");

    Ok(Json(json!({ "success": true, "data": profile })))
}
