//! API error types and HTTP mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use locagest_billing::BillingError;
use serde_json::json;

/// API-level error, mapped onto an HTTP status and JSON body
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Database error")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Billing(#[from] BillingError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Billing(e) => match e {
                BillingError::InvalidPlan(_)
                | BillingError::WebhookSignatureInvalid
                | BillingError::WebhookEventNotSupported(_) => StatusCode::BAD_REQUEST,
                BillingError::DuplicateSubscription => StatusCode::CONFLICT,
                BillingError::CustomerNotFound(_) | BillingError::SubscriptionNotFound(_) => {
                    StatusCode::NOT_FOUND
                }
                BillingError::StripeApi(_) | BillingError::Config(_) => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                BillingError::Database(_) | BillingError::Email(_) | BillingError::Internal(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    /// Client-safe message with a recovery hint. Internal details stay in
    /// the logs.
    fn public_message(&self) -> String {
        match self {
            ApiError::Database(_) => "Internal server error".to_string(),
            ApiError::Billing(e) => match e {
                BillingError::InvalidPlan(plan) => {
                    format!("Invalid plan type '{plan}': expected 'monthly' or 'annual'")
                }
                BillingError::DuplicateSubscription => {
                    "An active subscription already exists for this account".to_string()
                }
                BillingError::CustomerNotFound(_) | BillingError::SubscriptionNotFound(_) => {
                    "Billing record not found".to_string()
                }
                BillingError::StripeApi(_) => {
                    "Payment provider unavailable, try again shortly".to_string()
                }
                BillingError::Config(_) => "Billing is not configured".to_string(),
                BillingError::WebhookSignatureInvalid => "Invalid webhook signature".to_string(),
                BillingError::WebhookEventNotSupported(msg) => msg.clone(),
                BillingError::Database(_) | BillingError::Email(_) | BillingError::Internal(_) => {
                    "Internal server error".to_string()
                }
            },
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::warn!(error = %self, "Request rejected");
        }

        (
            status,
            Json(json!({
                "success": false,
                "error": self.public_message(),
            })),
        )
            .into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn billing_errors_map_to_documented_statuses() {
        let cases = [
            (
                ApiError::Billing(BillingError::InvalidPlan("weekly".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::Billing(BillingError::DuplicateSubscription),
                StatusCode::CONFLICT,
            ),
            (
                ApiError::Billing(BillingError::StripeApi("down".into())),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                ApiError::NotFound("profile".into()),
                StatusCode::NOT_FOUND,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.status(), expected, "{err}");
        }
    }

    #[test]
    fn internal_detail_is_not_leaked() {
        let err = ApiError::Billing(BillingError::Database(
            "relation company_profiles does not exist".into(),
        ));
        assert_eq!(err.public_message(), "Internal server error");
    }
}
