/// Error handling for the API server
///
/// This module provides a unified error type that maps to HTTP responses.
/// All handlers should return `Result<T, ApiError>` which automatically
/// converts to appropriate HTTP status codes.
///
/// Store, view and navigation errors convert with `?`:
///
/// | Source                          | Status |
/// |---------------------------------|--------|
/// | `StoreError::NotFound`          | 404    |
/// | `StoreError::Constraint`        | 409    |
/// | `StoreError::InvalidDocument`   | 400    |
/// | `ViewError::Validation`         | 422    |
/// | `ViewError::Rejected`           | 409    |
/// | `NavigationError::UnknownRoute` | 404    |
/// | anything else                   | 500    |
///
/// # Example
///
/// ```no_run
/// use cotisations_api::error::{ApiError, ApiResult};
/// use axum::Json;
/// use cotisations_shared::store::{Collection, DocumentKey, Store};
/// use serde_json::Value;
///
/// async fn handler(store: Store) -> ApiResult<Json<Value>> {
///     let document = store
///         .get_document(Collection::Cantons, &DocumentKey::Id(1))
///         .await?
///         .ok_or_else(|| ApiError::NotFound("Canton 1 not found".to_string()))?;
///     Ok(Json(document))
/// }
/// ```

use crate::shell::forms::FieldError;
use crate::shell::{NavigationError, ViewError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use cotisations_shared::store::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),

    /// Not found (404)
    NotFound(String),

    /// Conflict (409) - e.g., duplicate canton name
    Conflict(String),

    /// Unprocessable entity (422) - validation errors
    ValidationError(Vec<ValidationErrorDetail>),

    /// Internal server error (500)
    InternalError(String),

    /// Service unavailable (503)
    ServiceUnavailable(String),
}

/// Validation error detail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    /// Field that failed validation
    pub field: String,

    /// Error message
    pub message: String,
}

impl ValidationErrorDetail {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<FieldError> for ValidationErrorDetail {
    fn from(error: FieldError) -> Self {
        Self {
            field: error.field,
            message: error.message,
        }
    }
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "bad_request", "not_found")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// Optional validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl ApiError {
    /// Single-field validation failure
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        ApiError::ValidationError(vec![ValidationErrorDetail::new(field, message)])
    }

    /// HTTP status of this error
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let (error_code, message, details) = match self {
            ApiError::BadRequest(msg) => ("bad_request", msg, None),
            ApiError::NotFound(msg) => ("not_found", msg, None),
            ApiError::Conflict(msg) => ("conflict", msg, None),
            ApiError::ValidationError(errors) => (
                "validation_error",
                "Request validation failed".to_string(),
                Some(errors),
            ),
            ApiError::InternalError(msg) => {
                // Log internal errors but don't expose details to clients
                tracing::error!("Internal error: {}", msg);
                ("internal_error", "An internal error occurred".to_string(), None)
            }
            ApiError::ServiceUnavailable(msg) => ("service_unavailable", msg, None),
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            details,
        });

        (status, body).into_response()
    }
}

/// Convert store errors to API errors
impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            StoreError::Constraint { .. } => ApiError::Conflict(err.to_string()),
            StoreError::MissingKey(_) | StoreError::InvalidDocument { .. } => {
                ApiError::BadRequest(err.to_string())
            }
            StoreError::Open(_) => ApiError::ServiceUnavailable("Database unavailable".to_string()),
            _ => ApiError::InternalError(err.to_string()),
        }
    }
}

/// Convert view errors to API errors
impl From<ViewError> for ApiError {
    fn from(err: ViewError) -> Self {
        match err {
            ViewError::Store(err) => err.into(),
            ViewError::Validation(errors) => {
                ApiError::ValidationError(errors.into_iter().map(Into::into).collect())
            }
            ViewError::UnknownAction(action) => ApiError::BadRequest(format!("Unknown action: {}", action)),
            ViewError::Rejected(message) => ApiError::Conflict(message),
            ViewError::State(message) => ApiError::InternalError(format!("View state: {}", message)),
        }
    }
}

/// Convert navigation errors to API errors
impl From<NavigationError> for ApiError {
    fn from(err: NavigationError) -> Self {
        match err {
            NavigationError::UnknownRoute(route) => ApiError::NotFound(format!("Route not found: {}", route)),
            NavigationError::NoView => ApiError::Conflict("No view is mounted".to_string()),
            NavigationError::Query(message) => ApiError::BadRequest(message),
            NavigationError::View(err) => err.into(),
        }
    }
}
