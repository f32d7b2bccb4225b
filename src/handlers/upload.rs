use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    response::Json,
};
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::{AppError, AppResult};
use crate::models::{FileOutcome, InputFile, ProcessResponse};
use crate::services::Disposition;
use crate::state::AppState;

/// Multipart field names that carry PDFs.
const FILE_FIELDS: [&str; 3] = ["pdfs", "file", "files"];

const BYTES_PER_MB: usize = 1024 * 1024;

/// Rename uploads on disk. Responds with the new filename of every file, in
/// upload order; files that failed are reported as `"error"`.
pub async fn upload_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Json<Vec<String>>> {
    let outcomes = run_batch(&state, multipart, Disposition::Rename).await?;
    Ok(Json(
        outcomes
            .iter()
            .map(|outcome| outcome.new_name().to_string())
            .collect(),
    ))
}

/// Produce renamed download copies, replacing those of the previous run.
pub async fn process_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Json<ProcessResponse>> {
    let start = Instant::now();
    let outcomes = run_batch(&state, multipart, Disposition::Download).await?;
    let total_time = start.elapsed().as_millis() as u64;
    Ok(Json(ProcessResponse::new(outcomes, total_time)))
}

async fn run_batch(
    state: &AppState,
    mut multipart: Multipart,
    disposition: Disposition,
) -> AppResult<Vec<FileOutcome>> {
    let start = Instant::now();
    let request_id = uuid::Uuid::new_v4().to_string()[..8].to_string();

    info!(request_id = %request_id, disposition = ?disposition, "Starting batch request");

    let files = match read_pdf_files(
        &mut multipart,
        state.config.max_file_size_mb,
        state.config.max_request_size_mb,
    )
    .await
    {
        Ok(files) => files,
        Err(e) => {
            error!(request_id = %request_id, error = %e, "Failed to read multipart upload");
            return Err(e);
        }
    };

    info!(
        request_id = %request_id,
        files = files.len(),
        "Files extracted from multipart form"
    );

    let outcomes = state.pipeline.process_batch(files, disposition).await;

    info!(
        request_id = %request_id,
        files = outcomes.len(),
        failed = outcomes.iter().filter(|o| o.is_failure()).count(),
        total_time_ms = start.elapsed().as_millis() as u64,
        "Request completed"
    );

    Ok(outcomes)
}

/// Collect every file part, in order. Fails only when the request itself is
/// malformed; per-file problems are left for the pipeline to report.
pub async fn read_pdf_files(
    multipart: &mut Multipart,
    max_file_size_mb: usize,
    max_request_size_mb: usize,
) -> AppResult<Vec<InputFile>> {
    let max_size_bytes = max_file_size_mb.saturating_mul(BYTES_PER_MB);
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_request_size_mb))?
    {
        let field_name = field.name().unwrap_or("").to_string();
        if !FILE_FIELDS.contains(&field_name.as_str()) {
            debug!(field = %field_name, "Ignoring non-file field");
            continue;
        }

        let file_name = field.file_name().unwrap_or("").to_string();
        let content_type = field.content_type().map(|ct| ct.to_string());

        let data = field
            .bytes()
            .await
            .map_err(|e| multipart_error(e, max_request_size_mb))?;

        // An empty file input still submits one nameless, empty part.
        if file_name.is_empty() && data.is_empty() {
            continue;
        }

        if data.len() > max_size_bytes {
            warn!(
                file_name = %file_name,
                file_size = data.len(),
                max_size = max_size_bytes,
                "File size exceeds limit"
            );
            return Err(AppError::FileTooLarge {
                size: data.len().div_ceil(BYTES_PER_MB),
                limit: max_file_size_mb,
            });
        }

        let mut file = InputFile::new(&file_name, data);
        if let Some(mime_type) = content_type {
            file = file.with_mime_type(mime_type);
        }

        debug!(
            "Extracted file: {} ({} bytes, type: {:?})",
            file.name,
            file.size,
            file.mime_type
        );
        files.push(file);
    }

    if files.is_empty() {
        return Err(AppError::MissingFile);
    }
    Ok(files)
}

fn multipart_error(err: MultipartError, max_request_size_mb: usize) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge {
            limit: max_request_size_mb,
        }
    } else {
        AppError::invalid_file(format!("Failed to read multipart field: {}", err.body_text()))
    }
}
