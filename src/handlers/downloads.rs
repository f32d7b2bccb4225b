use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub async fn download_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let download_id = Uuid::parse_str(&id)
        .map_err(|_| AppError::validation(format!("'{}' is not a download id", id)))?;

    let stored = state
        .pipeline
        .downloads()
        .get(&download_id)
        .await
        .ok_or(AppError::DownloadNotFound { id })?;

    info!(download_id = %download_id, file_name = %stored.file_name, "Serving download");

    let disposition = content_disposition(&stored.file_name);

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/pdf")),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        stored.content,
    )
        .into_response())
}

/// `attachment` header with an ASCII `filename` and, for non-ASCII names, an
/// RFC 5987 `filename*` carrying the exact UTF-8 name.
fn content_disposition(file_name: &str) -> HeaderValue {
    let fallback: String = file_name
        .chars()
        .map(|c| {
            if c.is_ascii() && !c.is_ascii_control() && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let mut value = format!("attachment; filename=\"{}\"", fallback);
    if !file_name.is_ascii() {
        value.push_str("; filename*=UTF-8''");
        value.push_str(&percent_encode(file_name));
    }
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

/// Percent-encode everything outside RFC 5987 `attr-char`.
fn percent_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len() * 3);
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || b"!#$&+-.^_`|~".contains(&byte) {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

/// Release every held download.
pub async fn clear_downloads_handler(State(state): State<AppState>) -> StatusCode {
    let released = state.pipeline.downloads().clear().await;
    info!(released, "Downloads cleared on request");
    StatusCode::NO_CONTENT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_names_use_plain_filename() {
        assert_eq!(
            content_disposition("Maria_Garcia_scan001.pdf"),
            "attachment; filename=\"Maria_Garcia_scan001.pdf\""
        );
        assert_eq!(
            content_disposition("a\"b\\c.pdf"),
            "attachment; filename=\"a_b_c.pdf\""
        );
    }

    #[test]
    fn non_ascii_names_get_encoded_filename() {
        let value = content_disposition("Ann_Lee_résumé (1).pdf");
        assert_eq!(
            value,
            "attachment; filename=\"Ann_Lee_r_sum_ (1).pdf\"; \
             filename*=UTF-8''Ann_Lee_r%C3%A9sum%C3%A9%20%281%29.pdf"
        );
        assert!(value.to_str().is_ok());
    }
}
