//! JSON error responses.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::error::Error;

/// Message returned when a lookup by id finds nothing.
pub const STUDENT_NOT_FOUND: &str = "Student not found";

/// An error response: a status code and a `{message, error?}` body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    status: StatusCode,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<Value>,
}

impl ApiError {
    /// Create a response with only a message.
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            error: None,
        }
    }

    /// Attach an `error` detail.
    #[must_use]
    pub fn with_error(mut self, error: impl Into<Value>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// 404 for an unknown or malformed student id.
    #[must_use]
    pub fn student_not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, STUDENT_NOT_FOUND)
    }

    /// 400 for a body that is not a JSON student object.
    #[must_use]
    pub fn rejected_body(context: &str, rejection: &JsonRejection) -> Self {
        Self::new(StatusCode::BAD_REQUEST, context).with_error(rejection.body_text())
    }

    /// Translate a crate error raised while performing `context`.
    ///
    /// Conflicts answer with their own message; validation failures and
    /// store errors name the operation and carry the error as detail.
    #[must_use]
    pub fn from_error(context: &str, err: &Error) -> Self {
        match err {
            Error::Validation { .. } => {
                Self::new(StatusCode::BAD_REQUEST, context).with_error(err.to_string())
            }
            Error::Conflict { message } => Self::new(StatusCode::BAD_REQUEST, message.clone()),
            Error::NotFound { .. } | Error::InvalidIdentifier { .. } => Self::student_not_found(),
            _ => {
                warn!(error = %err, "{}", context);
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, context).with_error(err.to_string())
            }
        }
    }

    /// The HTTP status of this response.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The `message` field of the body.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

/// Attach an operation name to a crate result, as axum handlers need.
pub trait ResultExt<T> {
    /// Convert the error side into an [`ApiError`] for `context`.
    ///
    /// # Errors
    ///
    /// Returns the translated error if `self` is an error.
    fn or_respond(self, context: &str) -> Result<T, ApiError>;
}

impl<T> ResultExt<T> for crate::error::Result<T> {
    fn or_respond(self, context: &str) -> Result<T, ApiError> {
        self.map_err(|err| ApiError::from_error(context, &err))
    }
}
