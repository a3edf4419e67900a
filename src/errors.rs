use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

fn current_request_id() -> Option<String> {
    crate::observability::current_request_id().map(|rid| rid.as_str().to_string())
}

/// Standard error envelope returned by every failing endpoint.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Bad Request")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Request identifier for support and debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// ISO 8601 timestamp when the error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(
        #[from]
        #[serde(skip)]
        sea_orm::error::DbErr,
    ),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Amount mismatch: declared {declared}, computed {computed}")]
    AmountMismatch {
        declared: rust_decimal::Decimal,
        computed: rust_decimal::Decimal,
    },

    #[error("Payment gateway unavailable")]
    GatewayUnavailable,

    #[error("Payment signature invalid")]
    SignatureInvalid,

    // Deliberately vague so the response leaks nothing about why a
    // brand is switched off.
    #[error("This payment method is temporarily unavailable")]
    PaymentBrandDisabled,

    #[error("Verification code rejected")]
    OtpRejected,

    #[error("Please wait before requesting another code")]
    OtpResendThrottled,

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("Other error: {0}")]
    Other(
        #[from]
        #[serde(skip)]
        anyhow::Error,
    ),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

pub trait IntoDbErr {
    fn into_db_err(self) -> DbErr;
}

impl IntoDbErr for DbErr {
    fn into_db_err(self) -> DbErr {
        self
    }
}

impl IntoDbErr for String {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self)
    }
}

impl ServiceError {
    pub fn db_error<E: IntoDbErr>(error: E) -> Self {
        ServiceError::DatabaseError(error.into_db_err())
    }

    /// Single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_)
            | Self::InvalidOperation(_)
            | Self::AmountMismatch { .. }
            | Self::OtpRejected => StatusCode::BAD_REQUEST,
            Self::AuthError(_) | Self::Unauthorized(_) | Self::SignatureInvalid => {
                StatusCode::UNAUTHORIZED
            }
            Self::OtpResendThrottled => StatusCode::TOO_MANY_REQUESTS,
            Self::PaymentBrandDisabled => StatusCode::UNPROCESSABLE_ENTITY,
            Self::GatewayUnavailable | Self::ExternalServiceError(_) => StatusCode::BAD_GATEWAY,
            Self::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the message suitable for HTTP responses. Internal errors
    /// return generic text to avoid leaking implementation details;
    /// auth failures stay generic to avoid account-existence probes.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::Other(_) => "Internal server error".to_string(),
            Self::AuthError(_) | Self::Unauthorized(_) => "Authentication required".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            details: None,
            request_id: current_request_id(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}

/// API error type for HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Service error: {0}")]
    ServiceError(#[from] ServiceError),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::ServiceError(err) => err.into_response(),
            ApiError::ValidationError(message) => {
                error_envelope(StatusCode::BAD_REQUEST, message, None)
            }
            ApiError::NotFound(message) => error_envelope(StatusCode::NOT_FOUND, message, None),
        }
    }
}

fn error_envelope(status: StatusCode, message: String, details: Option<String>) -> Response {
    let err = ErrorResponse {
        error: status.canonical_reason().unwrap_or("Error").to_string(),
        message,
        details,
        request_id: current_request_id(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    };
    (status, Json(err)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_errors_do_not_leak_details() {
        let err = ServiceError::db_error("connection refused to 10.0.0.5".to_string());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.response_message(), "Database error");
    }

    #[test]
    fn auth_errors_stay_generic() {
        let err = ServiceError::AuthError("no account for carol@example.com".to_string());
        assert_eq!(err.response_message(), "Authentication required");
    }

    #[test]
    fn disabled_brand_message_is_nonspecific() {
        let err = ServiceError::PaymentBrandDisabled;
        assert_eq!(
            err.response_message(),
            "This payment method is temporarily unavailable"
        );
    }

    #[test]
    fn gateway_errors_map_to_bad_gateway() {
        assert_eq!(
            ServiceError::GatewayUnavailable.status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ServiceError::SignatureInvalid.status_code(),
            StatusCode::UNAUTHORIZED
        );
    }
}
