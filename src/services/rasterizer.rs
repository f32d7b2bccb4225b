use async_trait::async_trait;
use lopdf::Document;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::PipelineError;

/// PDF user space is 72 units per inch.
const POINTS_PER_INCH: f32 = 72.0;

/// How page 1 is turned into pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RasterSettings {
    /// Scale relative to the page's natural size (1.0 = 72 dpi).
    Zoom(f32),
    /// Fixed density, then scaled to exact pixel dimensions.
    Density { dpi: u32, width: u32, height: u32 },
}

impl RasterSettings {
    pub fn dpi(&self) -> u32 {
        match self {
            RasterSettings::Zoom(zoom) => (POINTS_PER_INCH * zoom).round().max(1.0) as u32,
            RasterSettings::Density { dpi, .. } => *dpi,
        }
    }
}

/// First page of a document, rendered to a PNG on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterizedPage {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
}

#[async_trait]
pub trait Rasterizer: Send + Sync {
    /// Render page 1 of `pdf` into `out_dir`. Fails with
    /// [`PipelineError::Decode`] when the document is unreadable or empty.
    async fn rasterize_first_page(
        &self,
        pdf: &Path,
        out_dir: &Path,
        settings: &RasterSettings,
    ) -> Result<RasterizedPage, PipelineError>;

    fn is_available(&self) -> bool;
}

/// Renders through poppler's `pdftoppm`.
pub struct PdfRasterizer {
    binary: String,
}

impl PdfRasterizer {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for PdfRasterizer {
    fn default() -> Self {
        Self::new("pdftoppm")
    }
}

#[async_trait]
impl Rasterizer for PdfRasterizer {
    async fn rasterize_first_page(
        &self,
        pdf: &Path,
        out_dir: &Path,
        settings: &RasterSettings,
    ) -> Result<RasterizedPage, PipelineError> {
        let start = Instant::now();

        let content = tokio::fs::read(pdf).await?;
        let pages = tokio::task::spawn_blocking(move || count_pages(&content))
            .await
            .map_err(|e| PipelineError::decode(format!("page count task failed: {}", e)))??;
        debug!(pdf = %pdf.display(), pages, "PDF structure validated");

        let prefix = out_dir.join("page");
        let mut cmd = Command::new(&self.binary);
        cmd.arg("-png")
            .args(["-f", "1", "-l", "1", "-singlefile"])
            .arg("-r")
            .arg(settings.dpi().to_string());
        if let RasterSettings::Density { width, height, .. } = settings {
            cmd.arg("-scale-to-x")
                .arg(width.to_string())
                .arg("-scale-to-y")
                .arg(height.to_string());
        }
        cmd.arg(pdf)
            .arg(&prefix)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = cmd
            .output()
            .await
            .map_err(|e| PipelineError::decode(format!("failed to run {}: {}", self.binary, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PipelineError::decode(format!(
                "{} exited with {}: {}",
                self.binary,
                output.status,
                stderr.trim()
            )));
        }

        let path = prefix.with_extension("png");
        let (width, height) = image::image_dimensions(&path)
            .map_err(|e| PipelineError::decode(format!("rendered page is unreadable: {}", e)))?;

        info!(
            pdf = %pdf.display(),
            dpi = settings.dpi(),
            width,
            height,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Rendered first page"
        );

        Ok(RasterizedPage {
            path,
            width,
            height,
        })
    }

    fn is_available(&self) -> bool {
        // pdftoppm -v prints to stderr and exits 0 on current poppler releases
        std::process::Command::new(&self.binary)
            .arg("-v")
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }
}

/// Parse the document and make sure it has a first page.
pub fn count_pages(content: &[u8]) -> Result<usize, PipelineError> {
    let doc = Document::load_mem(content)
        .map_err(|e| PipelineError::decode(format!("unreadable PDF: {}", e)))?;
    let pages = doc.get_pages().len();
    if pages == 0 {
        return Err(PipelineError::decode("document has no pages"));
    }
    Ok(pages)
}
