use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::{json, Value};
use std::time::SystemTime;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Health check endpoint
pub async fn health_handler(State(state): State<AppState>) -> AppResult<Json<Value>> {
    info!("Health check requested");

    let timestamp = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let (rasterizer, ocr) = state.tool_status().await?;
    let (total_requests, rejected_requests, available_permits) = state.rate_limiter.metrics();
    let downloads_held = state.pipeline.downloads().len().await;

    let status = if rasterizer && ocr { "healthy" } else { "degraded" };

    let response = json!({
        "status": status,
        "timestamp": timestamp,
        "version": env!("CARGO_PKG_VERSION"),
        "services": {
            "rasterizer": rasterizer,
            "ocr_service": ocr
        },
        "downloads_held": downloads_held,
        "rate_limiting": {
            "total_requests": total_requests,
            "rejected_requests": rejected_requests,
            "available_permits": available_permits
        },
        "uptime_seconds": state.started_at.elapsed().as_secs()
    });

    info!(
        status = status,
        rasterizer_available = rasterizer,
        ocr_available = ocr,
        "Health check completed"
    );

    Ok(Json(response))
}

/// Readiness check endpoint
pub async fn ready_handler(State(state): State<AppState>) -> AppResult<StatusCode> {
    let (rasterizer, ocr) = state.tool_status().await?;

    if !rasterizer {
        info!("Readiness check failed - rasterizer unavailable");
        return Err(AppError::service_unavailable("pdftoppm"));
    }
    if !ocr {
        info!("Readiness check failed - OCR unavailable");
        return Err(AppError::service_unavailable("tesseract"));
    }

    info!("Readiness check passed");
    Ok(StatusCode::OK)
}
