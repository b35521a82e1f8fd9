//! Mapping from service errors to HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use keyward_auth::AuthError;
use keyward_store::StoreError;
use serde_json::json;
use thiserror::Error;

/// Errors a handler can return.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    /// Any authentication failure. The body never says which check failed.
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Access denied")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized | ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = match &self {
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "request failed");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { entity, key } => ApiError::NotFound(format!("{entity} {key}")),
            StoreError::Conflict(msg) => ApiError::Conflict(msg),
            StoreError::Invalid(msg) => ApiError::BadRequest(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        if e.is_server_error() {
            return ApiError::Internal(e.to_string());
        }
        match e {
            AuthError::InvalidCredentials => ApiError::InvalidCredentials,
            AuthError::UnknownPrincipal(id) => ApiError::NotFound(format!("user {id}")),
            AuthError::InvalidInput(msg) => ApiError::BadRequest(msg),
            AuthError::Store(e) => e.into(),
            // A presented token failing verification inside an account flow.
            AuthError::Token(_) => ApiError::Unauthorized,
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// Like the `From<StoreError>` mapping, but an unresolved role or group
/// name in a request body is the caller's mistake.
pub fn membership_error(e: StoreError) -> ApiError {
    match e {
        StoreError::NotFound { entity, key } if entity == "role" || entity == "group" => {
            ApiError::BadRequest(format!("invalid {entity} name: {key}"))
        }
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyward_token::TokenError;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ApiError::Unauthorized, StatusCode::UNAUTHORIZED),
            (ApiError::Forbidden, StatusCode::FORBIDDEN),
            (ApiError::from(AuthError::InvalidCredentials), StatusCode::UNAUTHORIZED),
            (
                ApiError::from(AuthError::Token(TokenError::Signing("bad".into()))),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ApiError::from(AuthError::Token(TokenError::KeyNotFound)),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ApiError::from(AuthError::Task("cancelled".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ApiError::from(AuthError::Token(TokenError::SignatureInvalid)),
                StatusCode::UNAUTHORIZED,
            ),
            (
                ApiError::from(AuthError::UnknownPrincipal(7)),
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError::from(StoreError::Conflict("taken".into())),
                StatusCode::CONFLICT,
            ),
            (
                membership_error(StoreError::NotFound {
                    entity: "role",
                    key: "root".into(),
                }),
                StatusCode::BAD_REQUEST,
            ),
            (
                membership_error(StoreError::NotFound {
                    entity: "user",
                    key: "7".into(),
                }),
                StatusCode::NOT_FOUND,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
