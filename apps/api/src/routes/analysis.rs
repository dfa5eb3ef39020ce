use std::path::Path;

use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use tracing::info;

use crate::errors::AppError;
use crate::models::{AnalysisRequest, AnalysisResult};
use crate::state::AppState;

/// Upload extensions accepted by the analysis endpoint.
const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "jpg", "jpeg", "png", "svg"];

/// POST /api/v1/cv/analyze
///
/// Expects a multipart form with a `file` part. A missing, unnamed or empty file
/// is a 400; the extension is checked only after that. The response is the
/// terminal analysis result; a `Failed` analysis is still a 200 with
/// `error_message` set.
pub async fn handle_analyze(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<AnalysisResult>, AppError> {
    let max_bytes = state.config.max_upload_bytes;
    let (file_name, document) = read_file_part(&mut multipart, max_bytes).await?;

    let result = state
        .analyzer
        .analyze(AnalysisRequest::new(file_name, document))
        .await;
    let took_ms = result
        .analyzed_at()
        .map(|done| (done - result.uploaded_at()).num_milliseconds())
        .unwrap_or_default();
    match result.error_message() {
        Some(reason) => info!(
            "Analysis {} of '{}' failed after {took_ms}ms: {reason}",
            result.id(),
            result.document_name()
        ),
        None => info!(
            "Analysis {} of '{}' completed in {took_ms}ms: {} fields, {} chars of text",
            result.id(),
            result.document_name(),
            result.extracted_fields().len(),
            result.normalized_text().len()
        ),
    }
    Ok(Json(result))
}

async fn read_file_part(
    multipart: &mut Multipart,
    max_bytes: usize,
) -> Result<(String, Bytes), AppError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field
            .file_name()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .ok_or_else(|| AppError::Validation("Uploaded file has no file name".into()))?;

        let document = field.bytes().await.map_err(multipart_error)?;
        if document.is_empty() {
            return Err(AppError::Validation("Uploaded file is empty".into()));
        }
        check_extension(&file_name)?;
        if document.len() > max_bytes {
            return Err(AppError::PayloadTooLarge(format!(
                "File is {} bytes; the limit is {max_bytes} bytes",
                document.len()
            )));
        }
        return Ok((file_name, document));
    }

    Err(AppError::Validation("No file uploaded".into()))
}

fn check_extension(file_name: &str) -> Result<(), AppError> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    if ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        Ok(())
    } else {
        Err(AppError::UnsupportedMediaType(format!(
            "'{file_name}' is not a supported file type (allowed: {})",
            ALLOWED_EXTENSIONS.join(", ")
        )))
    }
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        AppError::Validation(format!("Invalid multipart body: {}", err.body_text()))
    }
}
