use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt::Display;

use crate::services::RecordError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    errors: Vec<String>,
    detail: Option<String>,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            errors: Vec::new(),
            detail: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "resource not found")
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn internal<E: Display>(error: E) -> Self {
        Self {
            detail: Some(error.to_string()),
            ..Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
        }
    }

    pub fn with_errors(mut self, errors: Vec<String>) -> Self {
        self.errors = errors;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }
}

/// Body written for every failed request.
///
/// The full envelope, detail included, also rides along in the response
/// extensions so a later layer can decide whether to expose it.
#[derive(Clone, Debug, Serialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ErrorEnvelope {
    pub fn has_detail(&self) -> bool {
        self.error.is_some()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status;
        if status.is_server_error() {
            tracing::error!(
                status = status.as_u16(),
                detail = self.detail.as_deref().unwrap_or(""),
                "{}",
                self.message
            );
        }

        let envelope = ErrorEnvelope {
            success: false,
            message: self.message,
            errors: self.errors,
            error: self.detail,
        };
        let public = ErrorEnvelope {
            error: None,
            ..envelope.clone()
        };

        let mut response = (status, Json(public)).into_response();
        if envelope.has_detail() {
            response.extensions_mut().insert(envelope);
        }
        response
    }
}

impl From<RecordError> for AppError {
    fn from(value: RecordError) -> Self {
        match value {
            RecordError::Validation { message, errors } => {
                AppError::bad_request(message).with_errors(errors)
            }
            RecordError::NotFound(what) => AppError::new(StatusCode::NOT_FOUND, what),
            RecordError::Conflict(message) => AppError::conflict(message),
            RecordError::Database(err) => AppError::from(err),
        }
    }
}

impl From<diesel::result::Error> for AppError {
    fn from(value: diesel::result::Error) -> Self {
        match value {
            diesel::result::Error::NotFound => AppError::not_found(),
            _ => AppError::internal(value),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        AppError::internal(value)
    }
}

impl From<JsonRejection> for AppError {
    fn from(value: JsonRejection) -> Self {
        AppError::bad_request("invalid request body").with_errors(vec![value.body_text()])
    }
}

impl From<QueryRejection> for AppError {
    fn from(value: QueryRejection) -> Self {
        AppError::bad_request("invalid query string").with_errors(vec![value.body_text()])
    }
}

impl From<PathRejection> for AppError {
    fn from(value: PathRejection) -> Self {
        AppError::bad_request("invalid path parameter").with_errors(vec![value.body_text()])
    }
}
