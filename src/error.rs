use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

use crate::database::StoreError;
use crate::services::order_lifecycle::LifecycleError;

pub type Result<T> = std::result::Result<T, ApiError>;

/// Error codes for categorizing errors
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    // Authentication errors (1xxx)
    #[serde(rename = "AUTH_1002")]
    TokenExpired,
    #[serde(rename = "AUTH_1003")]
    TokenInvalid,
    #[serde(rename = "AUTH_1004")]
    TokenMissing,
    #[serde(rename = "AUTH_1008")]
    OAuthFailed,

    // Authorization errors (2xxx)
    #[serde(rename = "AUTHZ_2001")]
    InsufficientPermissions,
    #[serde(rename = "AUTHZ_2002")]
    ResourceAccessDenied,
    #[serde(rename = "PROFILE_INCOMPLETE")]
    ProfileIncomplete,

    // Validation errors (3xxx)
    #[serde(rename = "VAL_3001")]
    InvalidInput,
    #[serde(rename = "VAL_3002")]
    MissingRequiredField,
    #[serde(rename = "VAL_3003")]
    InvalidFormat,
    #[serde(rename = "VAL_3005")]
    InvalidAmount,

    // Resource errors (4xxx)
    #[serde(rename = "RES_4001")]
    NotFound,
    #[serde(rename = "RES_4002")]
    AlreadyExists,
    #[serde(rename = "RES_4003")]
    Conflict,

    // Business logic errors (5xxx)
    #[serde(rename = "BIZ_5007")]
    InvalidOrderState,

    // Database errors (7xxx)
    #[serde(rename = "DB_7002")]
    QueryFailed,

    // External service errors (8xxx)
    #[serde(rename = "EXT_8003")]
    ExternalServiceError,

    // Internal errors (9xxx)
    #[serde(rename = "INT_9999")]
    InternalServerError,
    #[serde(rename = "INT_9998")]
    ConfigurationError,
}

impl ErrorCode {
    /// Get numeric code
    pub fn code(&self) -> u16 {
        match self {
            ErrorCode::TokenExpired => 1002,
            ErrorCode::TokenInvalid => 1003,
            ErrorCode::TokenMissing => 1004,
            ErrorCode::OAuthFailed => 1008,

            ErrorCode::InsufficientPermissions => 2001,
            ErrorCode::ResourceAccessDenied => 2002,
            ErrorCode::ProfileIncomplete => 2004,

            ErrorCode::InvalidInput => 3001,
            ErrorCode::MissingRequiredField => 3002,
            ErrorCode::InvalidFormat => 3003,
            ErrorCode::InvalidAmount => 3005,

            ErrorCode::NotFound => 4001,
            ErrorCode::AlreadyExists => 4002,
            ErrorCode::Conflict => 4003,

            ErrorCode::InvalidOrderState => 5007,

            ErrorCode::QueryFailed => 7002,

            ErrorCode::ExternalServiceError => 8003,

            ErrorCode::InternalServerError => 9999,
            ErrorCode::ConfigurationError => 9998,
        }
    }

    /// Get user-friendly message
    pub fn message(&self) -> &'static str {
        match self {
            ErrorCode::TokenExpired => "Your session has expired. Please log in again",
            ErrorCode::TokenInvalid => "Invalid authentication token",
            ErrorCode::TokenMissing => "Authentication required. Please log in",
            ErrorCode::OAuthFailed => "Discord sign-in failed",

            ErrorCode::InsufficientPermissions => {
                "You don't have permission to perform this action"
            }
            ErrorCode::ResourceAccessDenied => "Access to this resource is denied",
            ErrorCode::ProfileIncomplete => "Set your in-game name before using the marketplace",

            ErrorCode::InvalidInput => "Invalid input provided",
            ErrorCode::MissingRequiredField => "Required field is missing",
            ErrorCode::InvalidFormat => "Invalid format provided",
            ErrorCode::InvalidAmount => "Invalid amount provided",

            ErrorCode::NotFound => "The requested resource was not found",
            ErrorCode::AlreadyExists => "This resource already exists",
            ErrorCode::Conflict => "The resource was modified concurrently, please retry",

            ErrorCode::InvalidOrderState => "The order is not in a state that allows this action",

            ErrorCode::QueryFailed => "Database query failed",

            ErrorCode::ExternalServiceError => "External service error occurred",

            ErrorCode::InternalServerError => "An internal server error occurred",
            ErrorCode::ConfigurationError => "Server configuration error",
        }
    }
}

/// Structured error response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: ErrorDetail,
    pub request_id: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    pub code: ErrorCode,
    pub code_number: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("{1}")]
    WithCode(ErrorCode, String),

    #[error("{1}")]
    WithCodeAndDetails(ErrorCode, String, String),

    #[error("Validation failed: {field}")]
    ValidationWithField {
        code: ErrorCode,
        field: String,
        message: String,
    },
}

impl ApiError {
    /// Create error with specific error code
    pub fn with_code(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError::WithCode(code, message.into())
    }

    /// Create error with code and additional details
    pub fn with_details(
        code: ErrorCode,
        message: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        ApiError::WithCodeAndDetails(code, message.into(), details.into())
    }

    /// Create validation error for specific field
    pub fn validation_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::ValidationWithField {
            code: ErrorCode::InvalidInput,
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create general validation error
    pub fn validation_error(message: impl Into<String>, field: Option<&str>) -> Self {
        match field {
            Some(field_name) => ApiError::validation_field(field_name, message),
            None => ApiError::with_code(ErrorCode::InvalidInput, message),
        }
    }

    /// Helper: Resource not found
    pub fn not_found(resource: &str) -> Self {
        ApiError::with_code(ErrorCode::NotFound, format!("{} not found", resource))
    }

    /// Helper: Order state precondition violated
    pub fn invalid_state(reason: impl Into<String>) -> Self {
        ApiError::with_code(ErrorCode::InvalidOrderState, reason)
    }

    /// Helper: profile gate
    pub fn profile_incomplete() -> Self {
        ApiError::with_code(
            ErrorCode::ProfileIncomplete,
            ErrorCode::ProfileIncomplete.message(),
        )
    }

    /// Helper: token expired
    pub fn token_expired() -> Self {
        ApiError::with_code(ErrorCode::TokenExpired, "Token expired")
    }

    /// Get error code
    pub fn error_code(&self) -> ErrorCode {
        match self {
            ApiError::BadRequest(_) => ErrorCode::InvalidInput,
            ApiError::Unauthorized(_) => ErrorCode::TokenMissing,
            ApiError::Forbidden(_) => ErrorCode::ResourceAccessDenied,
            ApiError::NotFound(_) => ErrorCode::NotFound,
            ApiError::Conflict(_) => ErrorCode::Conflict,
            ApiError::Database(_) => ErrorCode::QueryFailed,
            ApiError::ExternalService(_) => ErrorCode::ExternalServiceError,
            ApiError::Internal(_) => ErrorCode::InternalServerError,
            ApiError::WithCode(code, _) => *code,
            ApiError::WithCodeAndDetails(code, _, _) => *code,
            ApiError::ValidationWithField { code, .. } => *code,
        }
    }

    fn error_details(&self) -> Option<String> {
        match self {
            ApiError::WithCodeAndDetails(_, _, details) => Some(details.clone()),
            _ => None,
        }
    }

    fn error_field(&self) -> Option<String> {
        match self {
            ApiError::ValidationWithField { field, .. } => Some(field.clone()),
            _ => None,
        }
    }

    /// Get status code
    pub fn status_code(&self) -> StatusCode {
        match self.error_code() {
            ErrorCode::TokenExpired
            | ErrorCode::TokenInvalid
            | ErrorCode::TokenMissing
            | ErrorCode::OAuthFailed => StatusCode::UNAUTHORIZED,

            ErrorCode::InsufficientPermissions
            | ErrorCode::ResourceAccessDenied
            | ErrorCode::ProfileIncomplete => StatusCode::FORBIDDEN,

            ErrorCode::InvalidInput
            | ErrorCode::MissingRequiredField
            | ErrorCode::InvalidFormat
            | ErrorCode::InvalidAmount
            | ErrorCode::InvalidOrderState => StatusCode::BAD_REQUEST,

            ErrorCode::NotFound => StatusCode::NOT_FOUND,

            ErrorCode::AlreadyExists | ErrorCode::Conflict => StatusCode::CONFLICT,

            ErrorCode::ExternalServiceError => StatusCode::BAD_GATEWAY,

            ErrorCode::QueryFailed
            | ErrorCode::InternalServerError
            | ErrorCode::ConfigurationError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message; server errors never leak their cause
    fn client_message(&self, code: ErrorCode) -> String {
        if self.status_code().is_server_error() {
            return code.message().to_string();
        }
        match self {
            ApiError::WithCode(_, msg) | ApiError::WithCodeAndDetails(_, msg, _) => msg.clone(),
            ApiError::ValidationWithField { message, .. } => message.clone(),
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg) => msg.clone(),
            _ => code.message().to_string(),
        }
    }

    /// Log error with appropriate level
    fn log_error(&self, request_id: &str) {
        match self.status_code() {
            status if status.is_server_error() => {
                error!(
                    request_id = %request_id,
                    error = %self,
                    "Server error occurred"
                );
            }
            status if status.is_client_error() => {
                warn!(
                    request_id = %request_id,
                    error = %self,
                    "Client error occurred"
                );
            }
            _ => {}
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let request_id = Uuid::new_v4().to_string();
        let status = self.status_code();
        let code = self.error_code();

        self.log_error(&request_id);

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code,
                code_number: code.code(),
                message: self.client_message(code),
                details: self.error_details(),
                field: self.error_field(),
            },
            request_id,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(error_response)).into_response()
    }
}

impl From<LifecycleError> for ApiError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::NotFound => ApiError::not_found("Order"),
            LifecycleError::Forbidden(reason) => {
                ApiError::with_code(ErrorCode::InsufficientPermissions, reason)
            }
            LifecycleError::InvalidState(reason) => ApiError::invalid_state(reason),
            LifecycleError::InvalidInput { field, message } => {
                ApiError::validation_field(field, message)
            }
            LifecycleError::Conflict => ApiError::with_code(
                ErrorCode::Conflict,
                ErrorCode::Conflict.message(),
            ),
            LifecycleError::Store(e) => e.into(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Database(e) => ApiError::Database(e),
            StoreError::Corrupt(reason) => ApiError::Internal(reason),
            StoreError::Duplicate(what) => ApiError::with_code(
                ErrorCode::AlreadyExists,
                format!("{} already exists", what),
            ),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(err: JsonRejection) -> Self {
        match err {
            JsonRejection::JsonDataError(e) => ApiError::with_details(
                ErrorCode::InvalidInput,
                "Invalid input provided",
                e.body_text(),
            ),
            JsonRejection::JsonSyntaxError(_) => {
                ApiError::with_code(ErrorCode::InvalidFormat, "Invalid JSON format")
            }
            JsonRejection::MissingJsonContentType(_) => {
                ApiError::with_code(ErrorCode::InvalidFormat, "JSON content type required")
            }
            other => ApiError::with_details(
                ErrorCode::InvalidInput,
                "Invalid request body",
                other.body_text(),
            ),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let first = errors.field_errors().into_iter().find_map(|(field, errs)| {
            errs.first().map(|e| {
                let message = e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{} is invalid", field));
                (field.to_string(), message)
            })
        });
        match first {
            Some((field, message)) => ApiError::validation_field(field, message),
            None => ApiError::with_code(ErrorCode::InvalidInput, errors.to_string()),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(err: QueryRejection) -> Self {
        ApiError::with_details(
            ErrorCode::InvalidInput,
            "Invalid query parameters",
            err.body_text(),
        )
    }
}

impl From<PathRejection> for ApiError {
    fn from(err: PathRejection) -> Self {
        ApiError::with_details(ErrorCode::InvalidFormat, "Invalid path parameter", err.body_text())
    }
}
