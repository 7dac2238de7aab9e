//! Annotation endpoints
//!
//! Both routes take a PDF plus an [`AnnotationSet`] and return the annotated
//! PDF. The multipart route streams the PDF back as `application/pdf`; the
//! JSON route carries it base64-encoded in both directions.

use std::time::Duration;

use axum::{
    body::Body,
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, State},
    http::{header, StatusCode},
    middleware,
    response::Response,
    routing::post,
    Extension, Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::annotations::AnnotationSet;
use crate::auth::require_annotator;
use crate::error::{AppError, Result};
use crate::identity::UserDetails;
use crate::pdf::{AnnotateError, AnnotatedDocument, PdfDocument};
use crate::state::AppState;

/// Room for the annotation set alongside the document
const ANNOTATION_SET_ALLOWANCE: usize = 1024 * 1024;

/// Create the annotation router
pub fn router(state: AppState) -> Router<AppState> {
    let max_upload = state.config().annotation.max_upload_bytes;
    let multipart_limit = max_upload.saturating_add(ANNOTATION_SET_ALLOWANCE);
    // Base64 inflates the document by a third
    let json_limit = (max_upload / 3 + 1)
        .saturating_mul(4)
        .saturating_add(ANNOTATION_SET_ALLOWANCE);

    Router::new()
        .route(
            "/annotate",
            post(annotate_multipart).layer(DefaultBodyLimit::max(multipart_limit)),
        )
        .route(
            "/annotate/json",
            post(annotate_json).layer(DefaultBodyLimit::max(json_limit)),
        )
        .route_layer(middleware::from_fn_with_state(state, require_annotator))
}

/// JSON annotation request
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotateJsonRequest {
    /// Base64-encoded PDF
    pub document: String,
    #[serde(default)]
    pub annotation_set: AnnotationSet,
}

/// JSON annotation response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotateJsonResponse {
    /// Base64-encoded annotated PDF
    pub document: String,
    pub page_count: usize,
    pub sha256: String,
    pub annotation_count: usize,
}

fn multipart_error(e: MultipartError) -> AppError {
    tracing::warn!("Failed to read multipart upload: {}", e);
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(e.body_text())
    } else {
        AppError::BadRequest(format!("Failed to read upload: {}", e.body_text()))
    }
}

fn check_upload_size(state: &AppState, len: usize) -> Result<()> {
    let limit = state.config().annotation.max_upload_bytes;
    if len > limit {
        return Err(AppError::PayloadTooLarge(format!(
            "document of {} bytes exceeds the {} byte limit",
            len, limit
        )));
    }
    Ok(())
}

/// Annotate an uploaded PDF
async fn annotate_multipart(
    State(state): State<AppState>,
    Extension(user): Extension<UserDetails>,
    mut multipart: Multipart,
) -> Result<Response> {
    let mut document = None;
    let mut filename = None;
    let mut annotation_set = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or("").to_string();
        tracing::debug!(
            "Received field: name='{}', filename={:?}, content_type={:?}",
            name,
            field.file_name(),
            field.content_type()
        );

        match name.as_str() {
            "file" | "document" => {
                filename = field.file_name().map(str::to_string);
                let data = field.bytes().await.map_err(multipart_error)?;
                check_upload_size(&state, data.len())?;
                document = Some(PdfDocument::from_bytes(data.to_vec())?);
            }
            "annotationSet" | "annotations" => {
                let data = field.bytes().await.map_err(multipart_error)?;
                let set: AnnotationSet = serde_json::from_slice(&data).map_err(|e| {
                    AppError::BadRequest(format!("Invalid annotation set: {}", e))
                })?;
                annotation_set = Some(set);
            }
            _ => tracing::debug!("Ignoring multipart field '{}'", name),
        }
    }

    let document = document.ok_or_else(|| {
        AppError::BadRequest("No file provided. Use field name 'file' or 'document'".to_string())
    })?;
    let annotation_set = annotation_set.ok_or_else(|| {
        AppError::BadRequest(
            "No annotation set provided. Use field name 'annotationSet'".to_string(),
        )
    })?;

    let annotated = run_annotator(&state, &user, document, annotation_set).await?;
    let sha256 = annotated.document.sha256();

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/pdf")
        .header(header::CONTENT_LENGTH, annotated.document.len())
        .header(
            header::CONTENT_DISPOSITION,
            format!(
                "attachment; filename=\"{}\"",
                annotated_filename(filename.as_deref())
            ),
        )
        .header("X-Page-Count", annotated.page_count)
        .header("X-Document-Sha256", sha256)
        .body(Body::from(annotated.document.into_bytes()))
        .map_err(|e| AppError::Internal(e.to_string()))
}

/// Annotate a base64-encoded PDF
async fn annotate_json(
    State(state): State<AppState>,
    Extension(user): Extension<UserDetails>,
    Json(request): Json<AnnotateJsonRequest>,
) -> Result<Json<AnnotateJsonResponse>> {
    let bytes = STANDARD
        .decode(request.document.trim())
        .map_err(|e| AppError::BadRequest(format!("Document is not valid base64: {}", e)))?;
    check_upload_size(&state, bytes.len())?;
    let document = PdfDocument::from_bytes(bytes)?;

    let annotated = run_annotator(&state, &user, document, request.annotation_set).await?;

    Ok(Json(AnnotateJsonResponse {
        sha256: annotated.document.sha256(),
        page_count: annotated.page_count,
        annotation_count: annotated.annotations_written,
        document: STANDARD.encode(annotated.document.as_bytes()),
    }))
}

/// Run the annotator on the blocking pool, bounded by the configured timeout
async fn run_annotator(
    state: &AppState,
    user: &UserDetails,
    document: PdfDocument,
    annotation_set: AnnotationSet,
) -> Result<AnnotatedDocument> {
    let annotator = state.annotator().clone();
    let timeout_secs = state.config().annotation.timeout_secs;

    tracing::info!(
        user_id = %user.id,
        backend = annotator.name(),
        sha256 = %document.sha256(),
        bytes = document.len(),
        annotations = annotation_set.len(),
        document_id = ?annotation_set.document_id,
        "Annotating document"
    );

    let task = tokio::task::spawn_blocking(move || annotator.annotate(&document, &annotation_set));

    let annotated = match tokio::time::timeout(Duration::from_secs(timeout_secs), task).await {
        Err(_) => {
            // spawn_blocking work cannot be cancelled; it runs to completion and is dropped
            tracing::warn!(
                user_id = %user.id,
                timeout_secs,
                "Annotation timed out, the task keeps running in the background"
            );
            return Err(AnnotateError::Timeout(timeout_secs).into());
        }
        Ok(Err(e)) => {
            return Err(AnnotateError::Internal(format!("annotation task failed: {}", e)).into())
        }
        Ok(Ok(result)) => result?,
    };

    tracing::info!(
        user_id = %user.id,
        page_count = annotated.page_count,
        written = annotated.annotations_written,
        bytes = annotated.document.len(),
        "Annotated document"
    );

    Ok(annotated)
}

/// Download name for an annotated upload: `<stem>-annotated.pdf`
///
/// Only ASCII alphanumerics, `-`, `_` and `.` survive so the name can be
/// quoted in `Content-Disposition` as is.
fn annotated_filename(original: Option<&str>) -> String {
    let base = original
        .and_then(|name| name.rsplit(['/', '\\']).next())
        .unwrap_or("");
    let stem = match base.len().checked_sub(4) {
        Some(cut) if base.is_char_boundary(cut) && base[cut..].eq_ignore_ascii_case(".pdf") => {
            &base[..cut]
        }
        _ => base,
    };

    let cleaned: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches(|c| c == '.' || c == '_');

    if cleaned.is_empty() {
        "document-annotated.pdf".to_string()
    } else {
        format!("{}-annotated.pdf", cleaned)
    }
}
