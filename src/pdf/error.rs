//! Annotation error types

use thiserror::Error;

/// Errors raised while applying an annotation set
#[derive(Debug, Error)]
pub enum AnnotateError {
    /// Input is not a readable PDF
    #[error("Malformed PDF: {0}")]
    MalformedDocument(String),

    /// Annotation type not supported by the backend
    #[error("Unsupported annotation type '{annotation_type}' (annotation {index})")]
    UnsupportedAnnotationType {
        index: usize,
        annotation_type: String,
    },

    /// Annotation targets a page the document doesn't have
    #[error("Annotation {index} targets page {page} but the document has {page_count} pages")]
    PageOutOfRange {
        index: usize,
        page: u32,
        page_count: usize,
    },

    /// Annotation is structurally invalid (geometry, colour)
    #[error("Invalid annotation {index}: {reason}")]
    InvalidAnnotation { index: usize, reason: String },

    /// Annotated output exceeds the configured limit
    #[error("Annotated document is {size} bytes, limit is {limit}")]
    OutputTooLarge { size: usize, limit: usize },

    /// Output lost or gained pages
    #[error("Page count changed from {before} to {after}")]
    PageCountMismatch { before: usize, after: usize },

    /// Failed to serialize the annotated document
    #[error("Failed to write PDF: {0}")]
    Write(String),

    /// Operation timed out
    #[error("Annotation timed out after {0} seconds")]
    Timeout(u64),

    #[error("Internal annotation error: {0}")]
    Internal(String),
}

impl AnnotateError {
    /// Whether the caller's input caused the failure
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedDocument(_)
                | Self::UnsupportedAnnotationType { .. }
                | Self::PageOutOfRange { .. }
                | Self::InvalidAnnotation { .. }
                | Self::OutputTooLarge { .. }
        )
    }

    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Self::MalformedDocument(_) => StatusCode::BAD_REQUEST,
            Self::UnsupportedAnnotationType { .. }
            | Self::PageOutOfRange { .. }
            | Self::InvalidAnnotation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::OutputTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::PageCountMismatch { .. } | Self::Write(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<lopdf::Error> for AnnotateError {
    fn from(err: lopdf::Error) -> Self {
        AnnotateError::Internal(err.to_string())
    }
}
