//! Server error types
//!
//! Every operation reports failures through [`ApiError`]. Each variant maps to a
//! stable [`ErrorKind`] code that clients can match on and to an HTTP status.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use openbis_common::CommonError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::response::ErrorResponse;

/// Result type alias for API operations
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Stable error codes exposed to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    UserFailure,
    AuthenticationFailure,
    InvalidSession,
    AuthorizationFailure,
    UnauthorizedObjectAccess,
    ObjectNotFound,
    NotFetched,
    Database,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UserFailure => "USER_FAILURE",
            ErrorKind::AuthenticationFailure => "AUTHENTICATION_FAILURE",
            ErrorKind::InvalidSession => "INVALID_SESSION",
            ErrorKind::AuthorizationFailure => "AUTHORIZATION_FAILURE",
            ErrorKind::UnauthorizedObjectAccess => "UNAUTHORIZED_OBJECT_ACCESS",
            ErrorKind::ObjectNotFound => "OBJECT_NOT_FOUND",
            ErrorKind::NotFetched => "NOT_FETCHED",
            ErrorKind::Database => "DATABASE",
            ErrorKind::Internal => "INTERNAL",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ErrorKind::UserFailure => StatusCode::BAD_REQUEST,
            ErrorKind::AuthenticationFailure | ErrorKind::InvalidSession => StatusCode::UNAUTHORIZED,
            ErrorKind::AuthorizationFailure | ErrorKind::UnauthorizedObjectAccess => {
                StatusCode::FORBIDDEN
            },
            ErrorKind::ObjectNotFound => StatusCode::NOT_FOUND,
            ErrorKind::NotFetched => StatusCode::BAD_REQUEST,
            ErrorKind::Database | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Application error
#[derive(Error, Debug)]
pub enum ApiError {
    /// The request is well formed but violates a business rule
    #[error("{0}")]
    UserFailure(String),

    #[error("Authentication failed: invalid user or password")]
    AuthenticationFailure,

    #[error("Session token is invalid or has expired")]
    InvalidSession,

    #[error("Authorization failure: {0}")]
    AuthorizationFailure(String),

    #[error("Access denied to object with {kind} = [{id}]")]
    UnauthorizedObjectAccess { kind: &'static str, id: String },

    /// A foreign id inside a payload does not resolve
    #[error("Object with {kind} = [{id}] has not been found")]
    ObjectNotFound { kind: &'static str, id: String },

    #[error("{0} has not been fetched")]
    NotFetched(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Shorthand for a [`ApiError::UserFailure`]
    pub fn user(message: impl Into<String>) -> Self {
        ApiError::UserFailure(message.into())
    }

    pub fn unauthorized(kind: &'static str, id: impl ToString) -> Self {
        ApiError::UnauthorizedObjectAccess {
            kind,
            id: id.to_string(),
        }
    }

    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        ApiError::ObjectNotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// "X is being used" rejection shared by every blocking delete
    pub fn being_used(what: impl std::fmt::Display) -> Self {
        ApiError::UserFailure(format!("{} is being used", what))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::UserFailure(_) => ErrorKind::UserFailure,
            ApiError::AuthenticationFailure => ErrorKind::AuthenticationFailure,
            ApiError::InvalidSession => ErrorKind::InvalidSession,
            ApiError::AuthorizationFailure(_) => ErrorKind::AuthorizationFailure,
            ApiError::UnauthorizedObjectAccess { .. } => ErrorKind::UnauthorizedObjectAccess,
            ApiError::ObjectNotFound { .. } => ErrorKind::ObjectNotFound,
            ApiError::NotFetched(_) => ErrorKind::NotFetched,
            ApiError::Database(_) => ErrorKind::Database,
            ApiError::Serialization(_) | ApiError::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<CommonError> for ApiError {
    fn from(err: CommonError) -> Self {
        ApiError::UserFailure(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let message = match self {
            ApiError::Database(ref e) => {
                tracing::error!("Database error: {:?}", e);
                "A database error occurred".to_string()
            },
            ApiError::Internal(ref message) => {
                tracing::error!("Internal error: {}", message);
                "An internal error occurred".to_string()
            },
            ApiError::Serialization(ref e) => {
                tracing::error!("Serialization error: {:?}", e);
                "An internal error occurred".to_string()
            },
            ref other => other.to_string(),
        };

        (kind.status(), Json(ErrorResponse::new(kind.as_str(), message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ApiError::user("bad"), StatusCode::BAD_REQUEST),
            (ApiError::AuthenticationFailure, StatusCode::UNAUTHORIZED),
            (ApiError::InvalidSession, StatusCode::UNAUTHORIZED),
            (ApiError::AuthorizationFailure("no".into()), StatusCode::FORBIDDEN),
            (ApiError::unauthorized("SpacePermId", "CISD"), StatusCode::FORBIDDEN),
            (ApiError::not_found("SpacePermId", "NOPE"), StatusCode::NOT_FOUND),
            (ApiError::NotFetched("Properties"), StatusCode::BAD_REQUEST),
            (ApiError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, status) in cases {
            assert_eq!(err.kind().status(), status, "{:?}", err);
        }
    }

    #[test]
    fn test_messages_name_the_object() {
        let err = ApiError::unauthorized("SpacePermId", "TEST-SPACE");
        assert_eq!(err.to_string(), "Access denied to object with SpacePermId = [TEST-SPACE]");

        let err = ApiError::being_used("Sample type 'CELL_PLATE'");
        assert_eq!(err.to_string(), "Sample type 'CELL_PLATE' is being used");
    }

    #[test]
    fn test_common_error_is_user_failure() {
        let err: ApiError = CommonError::EmptyCode.into();
        assert_eq!(err.kind(), ErrorKind::UserFailure);
    }
}
