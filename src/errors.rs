//! # Error Handling
//!
//! Every way a generated endpoint can fail, and the HTTP response each one
//! becomes. Controller operations return `Result<_, ApiError>`; the Axum
//! handlers hand the error straight back and [`IntoResponse`] shapes it.
//!
//! | Variant            | Status | Body                          |
//! |--------------------|--------|-------------------------------|
//! | `MethodDisabled`   | 400    | `{"error": "GET is disabled for items"}` |
//! | `Validation`       | 400    | `{"error": "Validation failed", "details": [...]}` |
//! | `BadRequest`       | 400    | `{"error": message}`          |
//! | `Persistence`      | 400    | `{"error": message}`          |
//! | `NothingAffected`  | 400    | `{"error": "No rows were affected"}` |
//! | `Forbidden`        | 403    | empty                         |
//! | `NotFound`         | 404    | empty                         |
//!
//! Persistence failures are reported as client errors with the database
//! message, so callers see why an insert was refused. They are also logged
//! through `tracing` at error level.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::fmt;

use crate::options::ApiMethods;
use crate::validation::ValidationErrors;

#[derive(Debug)]
pub enum ApiError {
    /// 400 - the entity's options do not enable this method
    MethodDisabled {
        method: ApiMethods,
        resource: &'static str,
    },

    /// 400 - the body, path or query did not validate
    Validation { errors: ValidationErrors },

    /// 400 - generic client error
    BadRequest { message: String },

    /// 400 - the data context refused the operation
    Persistence {
        /// Sent to the caller
        message: String,
        /// Logged only
        internal: String,
    },

    /// 400 - a delete passed the existence check but removed nothing
    NothingAffected { resource: &'static str },

    /// 403 - the caller lacks a required scope
    Forbidden,

    /// 404 - no record with the requested id
    NotFound { resource: &'static str, id: String },
}

impl ApiError {
    pub fn method_disabled(method: ApiMethods, resource: &'static str) -> Self {
        Self::MethodDisabled { method, resource }
    }

    pub fn validation(errors: ValidationErrors) -> Self {
        Self::Validation { errors }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn persistence(message: impl Into<String>, internal: impl fmt::Debug) -> Self {
        Self::Persistence {
            message: message.into(),
            internal: format!("{internal:?}"),
        }
    }

    pub fn not_found(resource: &'static str, id: impl fmt::Display) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MethodDisabled { .. }
            | Self::Validation { .. }
            | Self::BadRequest { .. }
            | Self::Persistence { .. }
            | Self::NothingAffected { .. } => StatusCode::BAD_REQUEST,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
        }
    }

    /// Message sent to the caller, `None` for status-only responses.
    #[must_use]
    pub fn user_message(&self) -> Option<String> {
        match self {
            Self::MethodDisabled { method, resource } => {
                Some(format!("{} is disabled for {resource}", method.label()))
            }
            Self::Validation { .. } => Some("Validation failed".to_string()),
            Self::BadRequest { message } | Self::Persistence { message, .. } => {
                Some(message.clone())
            }
            Self::NothingAffected { .. } => Some("No rows were affected".to_string()),
            Self::Forbidden | Self::NotFound { .. } => None,
        }
    }

    fn log(&self) {
        match self {
            Self::Persistence { message, internal } => {
                tracing::error!(error = %internal, message = %message, "Persistence error");
            }
            Self::NothingAffected { resource } => {
                tracing::warn!(resource, "Delete affected no rows");
            }
            _ => {
                tracing::debug!(
                    error = %self,
                    status = %self.status_code(),
                    "API error"
                );
            }
        }
    }
}

/// Error response sent to users
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<String>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.log();

        let status = self.status_code();
        match (self.user_message(), &self) {
            (Some(error), Self::Validation { errors }) => (
                status,
                Json(ErrorResponse {
                    error,
                    details: Some(errors.details()),
                }),
            )
                .into_response(),
            (Some(error), _) => (
                status,
                Json(ErrorResponse {
                    error,
                    details: None,
                }),
            )
                .into_response(),
            (None, _) => status.into_response(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self, self.user_message()) {
            (Self::Validation { errors }, _) => write!(f, "{errors}"),
            (_, Some(message)) => write!(f, "{message}"),
            (Self::Forbidden, None) => write!(f, "Forbidden"),
            (Self::NotFound { resource, id }, None) => {
                write!(f, "{resource} with ID '{id}' not found")
            }
            (_, None) => write!(f, "{}", self.status_code()),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        Self::validation(errors)
    }
}
