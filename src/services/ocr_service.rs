use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::PipelineError;

#[async_trait]
pub trait TextRecognizer: Send + Sync {
    /// Recognize the text in `image` using the given language model.
    async fn recognize(&self, image: &Path, language: &str) -> Result<String, PipelineError>;

    fn is_available(&self) -> bool;
}

/// Tesseract driven through its command line interface.
pub struct OcrService {
    binary: String,
    psm: Option<u8>,
}

impl OcrService {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            psm: None,
        }
    }

    pub fn with_psm(mut self, psm: Option<u8>) -> Self {
        self.psm = psm;
        self
    }

    pub fn is_tesseract_available(binary: &str) -> bool {
        std::process::Command::new(binary)
            .arg("--version")
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }
}

impl Default for OcrService {
    fn default() -> Self {
        Self::new("tesseract")
    }
}

#[async_trait]
impl TextRecognizer for OcrService {
    async fn recognize(&self, image: &Path, language: &str) -> Result<String, PipelineError> {
        let start = Instant::now();
        debug!(image = %image.display(), language, "Starting OCR");

        let mut cmd = Command::new(&self.binary);
        cmd.arg(image).arg("stdout").arg("-l").arg(language);
        if let Some(psm) = self.psm {
            cmd.arg("--psm").arg(psm.to_string());
        }
        // Dropping the future on timeout must not leave tesseract running.
        cmd.stdin(Stdio::null()).kill_on_drop(true);

        let output = cmd.output().await.map_err(|e| {
            PipelineError::recognition(format!("failed to run {}: {}", self.binary, e))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(image = %image.display(), status = %output.status, "Tesseract failed");
            return Err(PipelineError::recognition(format!(
                "{} exited with {}: {}",
                self.binary,
                output.status,
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        info!(
            image = %image.display(),
            characters = text.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "OCR completed"
        );
        Ok(text)
    }

    fn is_available(&self) -> bool {
        Self::is_tesseract_available(&self.binary)
    }
}
