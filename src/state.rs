use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::middleware::rate_limit::RateLimiter;
use crate::services::{
    DownloadStore, OcrService, PdfRasterizer, Pipeline, Rasterizer, TextRecognizer,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pipeline: Arc<Pipeline>,
    pub rate_limiter: Arc<RateLimiter>,
    pub started_at: Instant,
}

impl AppState {
    /// State backed by the real `pdftoppm` and `tesseract` binaries.
    pub fn new(config: Config) -> AppResult<Self> {
        let rasterizer = Arc::new(PdfRasterizer::new(config.pdftoppm_bin.clone()));
        let recognizer = Arc::new(
            OcrService::new(config.tesseract_bin.clone()).with_psm(config.tesseract_psm),
        );
        Self::with_services(config, rasterizer, recognizer)
    }

    pub fn with_services(
        config: Config,
        rasterizer: Arc<dyn Rasterizer>,
        recognizer: Arc<dyn TextRecognizer>,
    ) -> AppResult<Self> {
        let pipeline = Pipeline::new(
            &config,
            rasterizer,
            recognizer,
            Arc::new(DownloadStore::new()),
        )?;
        Ok(Self {
            rate_limiter: Arc::new(RateLimiter::new(config.max_concurrent_requests)),
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
            started_at: Instant::now(),
        })
    }

    /// Probe the external tools off the async runtime.
    /// Returns (rasterizer available, OCR available).
    pub async fn tool_status(&self) -> AppResult<(bool, bool)> {
        let rasterizer = self.pipeline.rasterizer();
        let recognizer = self.pipeline.recognizer();
        tokio::task::spawn_blocking(move || (rasterizer.is_available(), recognizer.is_available()))
            .await
            .map_err(|e| AppError::internal(format!("tool probe failed: {}", e)))
    }
}
