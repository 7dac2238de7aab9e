//! Error types for the PDF annotator server

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::identity::AuthError;
use crate::pdf::AnnotateError;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Annotation error: {0}")]
    Annotate(#[from] AnnotateError),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            AppError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large", msg.clone())
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
            AppError::Auth(e) => {
                let error_type = match e {
                    AuthError::MissingToken(_) | AuthError::Unauthorized(_) => "unauthorized",
                    AuthError::Forbidden(_) => "forbidden",
                    AuthError::InvalidGrant { .. } => "invalid_grant",
                    AuthError::MalformedResponse(_) => {
                        tracing::error!("Identity provider contract violation: {}", e);
                        "bad_gateway"
                    }
                    AuthError::Unavailable(_) => {
                        tracing::error!("Identity provider unavailable: {}", e);
                        "identity_unavailable"
                    }
                };
                (e.status_code(), error_type, e.to_string())
            }
            AppError::Annotate(e) => {
                if e.is_client_error() {
                    tracing::debug!("Rejected annotation request: {}", e);
                    (e.status_code(), "invalid_annotation_request", e.to_string())
                } else {
                    tracing::error!("Annotation failed: {}", e);
                    (
                        e.status_code(),
                        "annotation_failed",
                        "Failed to annotate document".to_string(),
                    )
                }
            }
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
            details: if cfg!(debug_assertions) {
                Some(self.to_string())
            } else {
                None
            },
        });

        let mut response = (status, body).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}
