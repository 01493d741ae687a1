use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::services::tryout::TryoutError;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    code: u16,
    message: String,
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    participant_test_id: Option<String>,
}

#[derive(Debug)]
pub(crate) enum ApiError {
    Unauthorized(&'static str),
    Forbidden(&'static str),
    BadRequest(String),
    NotFound(String),
    InvalidState(String),
    InvalidTransition(String),
    AttemptLimitExceeded(String),
    AlreadyOngoing { message: String, participant_test_id: String },
    Validation(String),
    TooManyRequests(&'static str),
    Internal(String),
}

impl ApiError {
    /// Log the underlying error with context and return an `Internal` variant.
    pub(crate) fn internal(err: impl std::fmt::Display, context: &str) -> Self {
        tracing::error!(error = %err, "{context}");
        Self::Internal(context.to_string())
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) | ApiError::AttemptLimitExceeded(_) => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidState(_)
            | ApiError::InvalidTransition(_)
            | ApiError::AlreadyOngoing { .. } => StatusCode::CONFLICT,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::NotFound(_) => "not_found",
            ApiError::InvalidState(_) => "invalid_state",
            ApiError::InvalidTransition(_) => "invalid_transition",
            ApiError::AttemptLimitExceeded(_) => "attempt_limit_exceeded",
            ApiError::AlreadyOngoing { .. } => "already_ongoing",
            ApiError::Validation(_) => "validation_error",
            ApiError::TooManyRequests(_) => "too_many_requests",
            ApiError::Internal(_) => "internal",
        }
    }
}

impl From<TryoutError> for ApiError {
    fn from(err: TryoutError) -> Self {
        match err {
            TryoutError::NotFound(message) => ApiError::NotFound(message),
            TryoutError::InvalidState(message) => ApiError::InvalidState(message),
            TryoutError::InvalidTransition(message) => ApiError::InvalidTransition(message),
            TryoutError::AttemptLimitExceeded { .. } => ApiError::AttemptLimitExceeded(err.to_string()),
            TryoutError::AlreadyOngoing { ref participant_test_id } => ApiError::AlreadyOngoing {
                message: err.to_string(),
                participant_test_id: participant_test_id.clone(),
            },
            TryoutError::Validation(message) => ApiError::Validation(message),
            TryoutError::Forbidden(message) => ApiError::Forbidden(message),
            TryoutError::Database(err) => ApiError::internal(err, "Database operation failed"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = self.kind();
        let (message, participant_test_id) = match self {
            ApiError::Unauthorized(message)
            | ApiError::Forbidden(message)
            | ApiError::TooManyRequests(message) => (message.to_string(), None),
            ApiError::AlreadyOngoing { message, participant_test_id } => {
                (message, Some(participant_test_id))
            }
            ApiError::Internal(message) => {
                tracing::error!(error = %message, "Internal server error");
                (message, None)
            }
            ApiError::BadRequest(message)
            | ApiError::NotFound(message)
            | ApiError::InvalidState(message)
            | ApiError::InvalidTransition(message)
            | ApiError::AttemptLimitExceeded(message)
            | ApiError::Validation(message) => (message, None),
        };

        let body = ErrorResponse { code: status.as_u16(), message, error, participant_test_id };
        let mut response = (status, Json(body)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}
