//! # Error Handling
//!
//! Two layers live here:
//!
//! - [`CrudError`]: the typed failures raised by the session provider, the filter engine,
//!   the schema binding and the CRUD engine. Store-layer errors are classified once, in
//!   `From<DbErr>`, so the rest of the crate can propagate with `?`.
//! - [`ApiError`]: the HTTP-facing error. It maps a [`CrudError`] to a status code, sends a
//!   sanitized message and logs internal details through `tracing`.
//!
//! ```rust,ignore
//! async fn handler(State(state): State<ResourceState<Car>>) -> Result<Json<Car>, ApiError> {
//!     let car = state.provider.scope(BackendId::Primary, |session| Box::pin(async move {
//!         state.engine.get(session, 1).await
//!     })).await?;
//!     car.map(Json).ok_or_else(|| ApiError::not_found("car", Some("1".to_string())))
//! }
//! ```

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::{DbErr, SqlErr};
use serde::Serialize;
use std::fmt;

use crate::session::BackendId;

/// Failures raised below the HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum CrudError {
    /// The backend could not be reached, or a connection could not be acquired.
    #[error("{}", connection_message(.backend, .source))]
    Connection {
        backend: Option<BackendId>,
        #[source]
        source: DbErr,
    },

    /// A session was requested for a backend that was never configured.
    #[error("backend `{0}` is not configured")]
    BackendNotConfigured(BackendId),

    /// A filter, ordering or payload key names a column the resource does not have.
    #[error("{resource} has no field `{field}`")]
    UnknownField { resource: String, field: String },

    /// A filter specification carries an operator outside the dispatch table.
    #[error("unsupported filter operator `{0}`")]
    UnsupportedOperator(String),

    /// A filter value cannot be used with its operator.
    #[error("invalid value for `{field}`: {message}")]
    InvalidFilterValue { field: String, message: String },

    /// Uniqueness or foreign-key violation on write.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("{resource} not found")]
    NotFound { resource: String, id: Option<String> },

    /// Caller contract violation, such as negative pagination bounds.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Inbound payload rejected by the schema binding.
    #[error("validation failed: {}", .0.join(", "))]
    Validation(Vec<String>),

    /// Any other store failure.
    #[error("database error: {0}")]
    Database(#[source] DbErr),
}

fn connection_message(backend: &Option<BackendId>, source: &DbErr) -> String {
    match backend {
        Some(backend) => format!("cannot reach backend `{backend}`: {source}"),
        None => format!("database connection failed: {source}"),
    }
}

impl CrudError {
    pub fn unknown_field(resource: impl Into<String>, field: impl Into<String>) -> Self {
        Self::UnknownField {
            resource: resource.into(),
            field: field.into(),
        }
    }

    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidFilterValue {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>, id: Option<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id,
        }
    }

    /// Attach the backend identity to a connection failure.
    #[must_use]
    pub fn on_backend(self, backend: BackendId) -> Self {
        match self {
            Self::Connection { source, .. } => Self::Connection {
                backend: Some(backend),
                source,
            },
            other => other,
        }
    }
}

impl From<DbErr> for CrudError {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(detail)) => {
                return Self::ConstraintViolation(detail);
            }
            Some(SqlErr::ForeignKeyConstraintViolation(detail)) => {
                return Self::ConstraintViolation(detail);
            }
            _ => {}
        }
        match err {
            DbErr::Conn(_) | DbErr::ConnectionAcquire(_) => Self::Connection {
                backend: None,
                source: err,
            },
            DbErr::RecordNotFound(msg) => Self::NotFound {
                resource: msg,
                id: None,
            },
            other => Self::Database(other),
        }
    }
}

/// API error type with automatic logging and sanitized responses
#[derive(Debug)]
pub enum ApiError {
    /// 404 Not Found - Resource doesn't exist
    NotFound {
        /// Resource type (e.g., "car")
        resource: String,
        /// Optional ID that wasn't found
        id: Option<String>,
    },

    /// 400 Bad Request - malformed filters, bad pagination bounds
    BadRequest { message: String },

    /// 409 Conflict - uniqueness or foreign-key violation
    Conflict { message: String },

    /// 400 Bad Request - payload failed schema validation
    ValidationFailed { errors: Vec<String> },

    /// 500 Internal Server Error - store failure (details logged, not exposed)
    Database {
        message: String,
        internal: String,
    },
}

impl ApiError {
    pub fn not_found(resource: impl Into<String>, id: Option<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn validation_failed(errors: Vec<String>) -> Self {
        Self::ValidationFailed { errors }
    }

    /// HTTP status code for this error
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::BadRequest { .. } | Self::ValidationFailed { .. } => StatusCode::BAD_REQUEST,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Database { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// User-facing error message (sanitized)
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound { resource, id } => match id {
                Some(id) => format!("{resource} with ID '{id}' not found"),
                None => format!("{resource} not found"),
            },
            Self::BadRequest { message } | Self::Conflict { message } => message.clone(),
            Self::ValidationFailed { errors } => {
                if errors.len() == 1 {
                    errors[0].clone()
                } else {
                    format!("Validation failed: {}", errors.join(", "))
                }
            }
            Self::Database { message, .. } => message.clone(),
        }
    }

    fn log_internal(&self) {
        match self {
            Self::Database { internal, .. } => {
                tracing::error!(error = %internal, "Database error occurred");
            }
            _ => {
                tracing::debug!(
                    error = %self.user_message(),
                    status = %self.status_code(),
                    "API error"
                );
            }
        }
    }
}

/// Error response sent to users (sanitized)
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<String>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.log_internal();

        let status = self.status_code();
        let response = match &self {
            Self::ValidationFailed { errors } => ErrorResponse {
                error: "Validation failed".to_string(),
                details: Some(errors.clone()),
            },
            _ => ErrorResponse {
                error: self.user_message(),
                details: None,
            },
        };

        (status, Json(response)).into_response()
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl std::error::Error for ApiError {}

/// Convert engine failures to HTTP errors
///
/// - `NotFound` → 404
/// - malformed filters, bad bounds → 400
/// - `Validation` → 400 with details
/// - `ConstraintViolation` → 409
/// - connection and store failures → 500 (logged, sanitized)
impl From<CrudError> for ApiError {
    fn from(err: CrudError) -> Self {
        match err {
            CrudError::NotFound { resource, id } => Self::NotFound { resource, id },
            CrudError::UnknownField { .. }
            | CrudError::UnsupportedOperator(_)
            | CrudError::InvalidFilterValue { .. }
            | CrudError::InvalidArgument(_) => Self::bad_request(err.to_string()),
            CrudError::Validation(errors) => Self::ValidationFailed { errors },
            CrudError::ConstraintViolation(detail) => Self::conflict(format!("Conflict: {detail}")),
            CrudError::Connection { .. } | CrudError::BackendNotConfigured(_) => Self::Database {
                message: "The database is unavailable".to_string(),
                internal: err.to_string(),
            },
            CrudError::Database(_) => Self::Database {
                message: "A database error occurred".to_string(),
                internal: err.to_string(),
            },
        }
    }
}

impl From<DbErr> for ApiError {
    fn from(err: DbErr) -> Self {
        CrudError::from(err).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_with_id() {
        let err = ApiError::not_found("car", Some("123".to_string()));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.user_message(), "car with ID '123' not found");
    }

    #[test]
    fn test_validation_failed_multiple_errors() {
        let err = ApiError::validation_failed(vec![
            "model: required".to_string(),
            "year: out of range".to_string(),
        ]);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            err.user_message(),
            "Validation failed: model: required, year: out of range"
        );
    }

    #[test]
    fn test_unsupported_operator_is_bad_request() {
        let err: ApiError = CrudError::UnsupportedOperator("between".to_string()).into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.user_message().contains("between"));
    }

    #[test]
    fn test_unknown_field_is_bad_request() {
        let err: ApiError = CrudError::unknown_field("car", "colour").into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.user_message(), "car has no field `colour`");
    }

    #[test]
    fn test_constraint_violation_is_conflict() {
        let err: ApiError = CrudError::ConstraintViolation("cars.model".to_string()).into();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_connection_error_is_sanitized() {
        let crud = CrudError::Connection {
            backend: Some(BackendId::SecondaryA),
            source: DbErr::Conn(sea_orm::RuntimeErr::Internal("refused".to_string())),
        };
        assert!(crud.to_string().contains("secondary_a"));
        let err: ApiError = crud.into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.user_message().contains("refused"));
    }

    #[test]
    fn test_dberr_conn_becomes_connection() {
        let err: CrudError = DbErr::Conn(sea_orm::RuntimeErr::Internal("down".to_string())).into();
        assert!(matches!(err, CrudError::Connection { backend: None, .. }));
        let err = err.on_backend(BackendId::Primary);
        assert!(matches!(
            err,
            CrudError::Connection {
                backend: Some(BackendId::Primary),
                ..
            }
        ));
    }

    #[test]
    fn test_dberr_custom_becomes_database() {
        let err: CrudError = DbErr::Custom("boom".to_string()).into();
        assert!(matches!(err, CrudError::Database(_)));
        let api: ApiError = err.into();
        assert_eq!(api.user_message(), "A database error occurred");
    }
}
