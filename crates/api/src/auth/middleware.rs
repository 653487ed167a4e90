//! Authentication and subscription-gating middleware
//!
//! Two layers enforce the subscription gate, with deliberately different
//! failure modes:
//!
//! - [`require_trial_active`] fronts the browser-facing pages. It redirects
//!   locked tenants to the subscription funnel and FAILS OPEN: if the profile
//!   cannot be loaded we let the request through rather than strand a paying
//!   user on an error page. The strict guard still protects the data behind
//!   those pages.
//! - [`require_subscription`] fronts the data API. It FAILS CLOSED: any
//!   doubt (missing profile, database error) denies with a structured
//!   locked payload the frontend knows how to render.

use axum::{
    extract::{Request, State},
    http::{
        header::{AUTHORIZATION, COOKIE, LOCATION},
        StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use locagest_shared::{AccessDecision, SubscriptionStatus, TrialState};
use serde_json::json;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use super::jwt::JwtManager;

/// Where locked tenants are sent to manage their subscription.
pub const SUBSCRIPTION_REDIRECT: &str = "/assinatura-gestao";

/// Pages reachable without an active trial or subscription. The edge guard
/// must never redirect these or locked users could not subscribe at all.
const GATE_EXEMPT_PATHS: &[&str] = &["/login", "/assinatura", "/assinatura-gestao", "/health"];

/// Authenticated user extracted from a validated JWT
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub company_id: Uuid,
    pub email: String,
}

/// State needed for authentication middleware
#[derive(Clone)]
pub struct AuthState {
    pub jwt_manager: JwtManager,
    pub pool: PgPool,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing authentication")]
    MissingAuth,
    #[error("Malformed Authorization header")]
    InvalidAuthFormat,
    #[error("Invalid or expired token")]
    InvalidToken,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "success": false,
                "error": self.to_string(),
                "redirect": "/login",
            })),
        )
            .into_response()
    }
}

/// Extract bearer token from HttpOnly cookies set by the frontend.
fn extract_token_from_cookie(request: &Request) -> Option<String> {
    request
        .headers()
        .get(COOKIE)
        .and_then(|h| h.to_str().ok())
        .and_then(|cookies| {
            for cookie in cookies.split(';') {
                if let Some(token) = cookie.trim().strip_prefix("locagest_auth_token=") {
                    return Some(token.to_string());
                }
            }
            None
        })
}

/// Extract bearer token from the Authorization header, falling back to the
/// HttpOnly cookie for browser clients.
fn extract_bearer_token(request: &Request) -> Option<String> {
    if let Some(header) = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
    {
        if let Some(token) = header.strip_prefix("Bearer ") {
            return Some(token.to_string());
        }
    }

    extract_token_from_cookie(request)
}

fn is_gate_exempt(path: &str) -> bool {
    GATE_EXEMPT_PATHS
        .iter()
        .any(|exempt| path == *exempt || path.starts_with(&format!("{exempt}/")))
}

/// Middleware that requires a valid JWT
pub async fn require_auth(
    State(auth_state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    let Some(token) = extract_bearer_token(&request) else {
        // Distinguish a malformed Authorization header from no credentials.
        if request.headers().contains_key(AUTHORIZATION) {
            tracing::warn!(path = %path, "require_auth: Authorization header is not a Bearer token");
            return AuthError::InvalidAuthFormat.into_response();
        }
        tracing::warn!(path = %path, "require_auth: no token in header or cookie");
        return AuthError::MissingAuth.into_response();
    };

    match auth_state.jwt_manager.validate_access_token(&token) {
        Ok(claims) => {
            request.extensions_mut().insert(AuthUser {
                user_id: claims.sub,
                company_id: claims.company_id,
                email: claims.email,
            });
            next.run(request).await
        }
        Err(e) => {
            tracing::warn!(path = %path, error = %e, "require_auth: token validation failed");
            AuthError::InvalidToken.into_response()
        }
    }
}

/// Load the gating state for a tenant. `None` when the profile is missing.
async fn load_trial_state(
    pool: &PgPool,
    company_id: Uuid,
) -> Result<Option<TrialState>, sqlx::Error> {
    let row: Option<(SubscriptionStatus, OffsetDateTime, OffsetDateTime)> = sqlx::query_as(
        "SELECT status, trial_start, trial_end FROM company_profiles WHERE id = $1",
    )
    .bind(company_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|(status, trial_start, trial_end)| {
        TrialState::evaluate(OffsetDateTime::now_utc(), trial_start, trial_end, status)
    }))
}

/// Edge-guard policy: redirect only on a definite locked verdict. A missing
/// profile or a store failure passes through (fail open) so an onboarding
/// tenant or a database blip cannot take down every page. The strict guard
/// still protects the data behind them.
fn edge_guard_redirects(lookup: &Result<Option<TrialState>, sqlx::Error>) -> bool {
    match lookup {
        Ok(Some(state)) => !matches!(AccessDecision::from(state), AccessDecision::Allow),
        Ok(None) | Err(_) => false,
    }
}

/// Strict-guard policy: any doubt denies. Missing profile and store failure
/// both collapse to the fail-closed default.
fn strict_guard_state(lookup: Result<Option<TrialState>, sqlx::Error>) -> TrialState {
    match lookup {
        Ok(Some(state)) => state,
        Ok(None) | Err(_) => TrialState::denied(),
    }
}

/// Edge guard for browser-facing pages. Runs after `require_auth`.
///
/// Redirects locked tenants to the subscription page with 307 so the
/// browser preserves the method.
pub async fn require_trial_active(
    State(auth_state): State<AuthState>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    if is_gate_exempt(&path) {
        return next.run(request).await;
    }

    let Some(user) = request.extensions().get::<AuthUser>().cloned() else {
        // No identity means require_auth was not layered in front; let the
        // strict guard (or the 401) handle it.
        return next.run(request).await;
    };

    let lookup = load_trial_state(&auth_state.pool, user.company_id).await;
    match &lookup {
        Ok(Some(_)) => {}
        Ok(None) => tracing::warn!(
            company_id = %user.company_id,
            "Edge guard: no profile found, allowing through"
        ),
        Err(e) => tracing::error!(
            company_id = %user.company_id,
            error = %e,
            "Edge guard: profile lookup failed, allowing through"
        ),
    }

    if edge_guard_redirects(&lookup) {
        tracing::info!(
            company_id = %user.company_id,
            path = %path,
            "Edge guard redirecting locked tenant"
        );
        return (
            StatusCode::TEMPORARY_REDIRECT,
            [(LOCATION, SUBSCRIPTION_REDIRECT)],
        )
            .into_response();
    }

    next.run(request).await
}

fn locked_response(status: &SubscriptionStatus) -> Response {
    (
        StatusCode::PAYMENT_REQUIRED,
        Json(json!({
            "success": false,
            "error": "subscription_required",
            "message": "Seu período de teste terminou. Assine um plano para continuar.",
            "status": status,
            "redirect": SUBSCRIPTION_REDIRECT,
            "actions": ["manage_subscription", "sign_out"],
        })),
    )
        .into_response()
}

/// Strict guard for the data API. Runs after `require_auth`.
///
/// Fails CLOSED: missing profile and database errors both deny.
pub async fn require_subscription(
    State(auth_state): State<AuthState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(user) = request.extensions().get::<AuthUser>().cloned() else {
        return AuthError::MissingAuth.into_response();
    };

    let lookup = load_trial_state(&auth_state.pool, user.company_id).await;
    match &lookup {
        Ok(Some(_)) => {}
        Ok(None) => tracing::warn!(
            company_id = %user.company_id,
            "Strict guard: no profile found, denying"
        ),
        Err(e) => tracing::error!(
            company_id = %user.company_id,
            error = %e,
            "Strict guard: profile lookup failed, denying"
        ),
    }

    let state = strict_guard_state(lookup);

    match AccessDecision::from(&state) {
        AccessDecision::Allow => next.run(request).await,
        AccessDecision::Lock | AccessDecision::Funnel => {
            tracing::info!(
                company_id = %user.company_id,
                status = %state.status,
                "Strict guard denying locked tenant"
            );
            locked_response(&state.status)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request_with_headers(headers: &[(&str, &str)]) -> Request {
        let mut builder = Request::builder().uri("/api/equipment");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn bearer_token_from_authorization_header() {
        let req = request_with_headers(&[("Authorization", "Bearer abc.def.ghi")]);
        assert_eq!(extract_bearer_token(&req).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn bearer_token_falls_back_to_cookie() {
        let req = request_with_headers(&[(
            "Cookie",
            "theme=dark; locagest_auth_token=tok123; lang=pt-BR",
        )]);
        assert_eq!(extract_bearer_token(&req).as_deref(), Some("tok123"));
    }

    #[test]
    fn header_wins_over_cookie() {
        let req = request_with_headers(&[
            ("Authorization", "Bearer from-header"),
            ("Cookie", "locagest_auth_token=from-cookie"),
        ]);
        assert_eq!(extract_bearer_token(&req).as_deref(), Some("from-header"));
    }

    #[test]
    fn missing_auth_yields_none() {
        let req = request_with_headers(&[("Cookie", "theme=dark")]);
        assert!(extract_bearer_token(&req).is_none());
    }

    #[test]
    fn subscription_pages_are_gate_exempt() {
        assert!(is_gate_exempt("/login"));
        assert!(is_gate_exempt("/assinatura"));
        assert!(is_gate_exempt("/assinatura-gestao"));
        assert!(is_gate_exempt("/assinatura-gestao/planos"));
    }

    #[test]
    fn app_pages_are_gated() {
        assert!(!is_gate_exempt("/dashboard"));
        assert!(!is_gate_exempt("/equipamentos"));
        // Prefix matching must not over-match sibling paths.
        assert!(!is_gate_exempt("/assinatura-antiga"));
    }

    fn expired_trial_state() -> TrialState {
        use time::macros::datetime;
        TrialState::evaluate(
            datetime!(2025-01-09 00:00 UTC),
            datetime!(2025-01-01 00:00 UTC),
            datetime!(2025-01-08 00:00 UTC),
            SubscriptionStatus::Trial,
        )
    }

    fn active_trial_state() -> TrialState {
        use time::macros::datetime;
        TrialState::evaluate(
            datetime!(2025-01-05 00:00 UTC),
            datetime!(2025-01-01 00:00 UTC),
            datetime!(2025-01-08 00:00 UTC),
            SubscriptionStatus::Trial,
        )
    }

    #[test]
    fn edge_guard_fails_open_on_store_trouble() {
        // Missing profile and lookup errors both pass through at the edge.
        assert!(!edge_guard_redirects(&Ok(None)));
        assert!(!edge_guard_redirects(&Err(sqlx::Error::PoolTimedOut)));
    }

    #[test]
    fn edge_guard_redirects_locked_and_passes_active() {
        assert!(edge_guard_redirects(&Ok(Some(expired_trial_state()))));
        assert!(!edge_guard_redirects(&Ok(Some(active_trial_state()))));
    }

    #[test]
    fn strict_guard_fails_closed_on_store_trouble() {
        for lookup in [Ok(None), Err(sqlx::Error::PoolTimedOut)] {
            let state = strict_guard_state(lookup);
            assert!(state.is_expired);
            assert_eq!(AccessDecision::from(&state), AccessDecision::Lock);
        }
    }

    #[test]
    fn strict_guard_keeps_a_definite_verdict() {
        let state = strict_guard_state(Ok(Some(active_trial_state())));
        assert_eq!(AccessDecision::from(&state), AccessDecision::Allow);
    }

    #[tokio::test]
    async fn locked_response_is_402_with_recovery_actions() {
        let response = locked_response(&SubscriptionStatus::Expired);
        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(body["error"], "subscription_required");
        assert_eq!(body["redirect"], SUBSCRIPTION_REDIRECT);
        assert_eq!(
            body["actions"],
            serde_json::json!(["manage_subscription", "sign_out"])
        );
        assert!(body["message"].is_string());
    }
}
