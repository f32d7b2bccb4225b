use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{CollisionPolicy, Config};
use crate::error::{AppResult, PipelineError};
use crate::models::{FileOutcome, InputFile};
use crate::services::download_store::DownloadStore;
use crate::services::name_extractor::{NameExtractor, NamePolicy};
use crate::services::ocr_service::TextRecognizer;
use crate::services::rasterizer::{RasterSettings, Rasterizer};

/// Where a processed file ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Keep the bytes in memory and hand out a download link for
    /// `<name>_<original>`.
    Download,
    /// Move the upload to `renamed/<name>.pdf`.
    Rename,
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub language: String,
    pub ocr_timeout: Duration,
    pub concurrency: usize,
    pub download_raster: RasterSettings,
    pub rename_raster: RasterSettings,
    pub upload_dir: PathBuf,
    pub renamed_dir: PathBuf,
    pub temp_dir: PathBuf,
    pub collision: CollisionPolicy,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            language: config.ocr_language.clone(),
            ocr_timeout: Duration::from_secs(config.ocr_timeout_seconds),
            concurrency: config.ocr_concurrency.max(1),
            download_raster: RasterSettings::Zoom(config.download_zoom),
            rename_raster: RasterSettings::Density {
                dpi: config.raster_dpi,
                width: config.raster_width,
                height: config.raster_height,
            },
            upload_dir: config.upload_dir.clone(),
            renamed_dir: config.renamed_dir.clone(),
            temp_dir: config.temp_dir.clone(),
            collision: config.rename_collision,
        }
    }
}

/// Rasterize, recognize, extract, dispose. One outcome per input file.
pub struct Pipeline {
    rasterizer: Arc<dyn Rasterizer>,
    recognizer: Arc<dyn TextRecognizer>,
    download_names: NameExtractor,
    rename_names: NameExtractor,
    downloads: Arc<DownloadStore>,
    settings: PipelineSettings,
    // Held from target selection until the rename lands.
    rename_lock: Mutex<()>,
}

impl Pipeline {
    pub fn new(
        config: &Config,
        rasterizer: Arc<dyn Rasterizer>,
        recognizer: Arc<dyn TextRecognizer>,
        downloads: Arc<DownloadStore>,
    ) -> AppResult<Self> {
        Ok(Self {
            rasterizer,
            recognizer,
            download_names: NameExtractor::new(
                NamePolicy::download().with_label(config.name_label.clone()),
            )?,
            rename_names: NameExtractor::new(
                NamePolicy::rename().with_label(config.name_label.clone()),
            )?,
            downloads,
            settings: PipelineSettings::from_config(config),
            rename_lock: Mutex::new(()),
        })
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn rasterizer(&self) -> Arc<dyn Rasterizer> {
        Arc::clone(&self.rasterizer)
    }

    pub fn recognizer(&self) -> Arc<dyn TextRecognizer> {
        Arc::clone(&self.recognizer)
    }

    pub fn downloads(&self) -> &DownloadStore {
        &self.downloads
    }

    /// Outcomes come back in input order whatever the concurrency.
    pub async fn process_batch(
        &self,
        files: Vec<InputFile>,
        disposition: Disposition,
    ) -> Vec<FileOutcome> {
        let start = Instant::now();
        let total = files.len();
        let run_id = match disposition {
            Disposition::Download => Some(self.downloads.begin_run().await),
            Disposition::Rename => None,
        };

        info!(
            files = total,
            disposition = ?disposition,
            concurrency = self.settings.concurrency,
            "Processing batch"
        );

        let outcomes: Vec<FileOutcome> = stream::iter(files.into_iter().enumerate())
            .map(|(index, file)| self.process_file(index, file, disposition, run_id))
            .buffered(self.settings.concurrency)
            .collect()
            .await;

        let failed = outcomes.iter().filter(|o| o.is_failure()).count();
        info!(
            files = total,
            failed,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Batch finished"
        );
        outcomes
    }

    async fn process_file(
        &self,
        index: usize,
        file: InputFile,
        disposition: Disposition,
        run_id: Option<Uuid>,
    ) -> FileOutcome {
        let start = Instant::now();
        debug!(index, file_name = %file.name, size = file.size, "Processing file");

        let result = if !file.is_pdf() {
            Err(PipelineError::invalid_file("not a PDF document"))
        } else {
            match (disposition, run_id) {
                (Disposition::Download, Some(run_id)) => self.download_file(&file, run_id).await,
                _ => self.rename_file(&file).await,
            }
        };

        match result {
            Ok(outcome) => {
                info!(
                    index,
                    file_name = %file.name,
                    new_name = %outcome.new_name(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "File processed"
                );
                outcome
            }
            Err(e) => {
                warn!(
                    index,
                    file_name = %file.name,
                    kind = e.kind().as_str(),
                    error = %e,
                    "File failed"
                );
                FileOutcome::Failed {
                    original: file.name,
                    kind: e.kind(),
                    message: e.to_string(),
                }
            }
        }
    }

    async fn download_file(&self, file: &InputFile, run_id: Uuid) -> Result<FileOutcome, PipelineError> {
        let scratch = self.scratch_dir()?;
        let pdf_path = scratch.path().join("input.pdf");
        tokio::fs::write(&pdf_path, &file.content).await?;

        let text = self
            .recognize_first_page(&pdf_path, scratch.path(), &self.settings.download_raster)
            .await;
        release_scratch(scratch);
        let name = self.download_names.extract(&text?);

        let new_name = format!("{}_{}", name, file.name);
        let download = self
            .downloads
            .insert(run_id, new_name.clone(), file.content.clone())
            .await;

        Ok(FileOutcome::Renamed {
            original: file.name.clone(),
            new_name,
            download,
        })
    }

    async fn rename_file(&self, file: &InputFile) -> Result<FileOutcome, PipelineError> {
        let upload_path = self
            .settings
            .upload_dir
            .join(format!("{}.pdf", Uuid::new_v4()));
        tokio::fs::write(&upload_path, &file.content).await?;

        let result = self.rename_upload(&upload_path).await;
        if result.is_err() {
            if let Err(e) = tokio::fs::remove_file(&upload_path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %upload_path.display(), error = %e, "Failed to remove upload");
                }
            }
        }

        Ok(FileOutcome::Renamed {
            original: file.name.clone(),
            new_name: result?,
            download: None,
        })
    }

    async fn rename_upload(&self, upload_path: &Path) -> Result<String, PipelineError> {
        let scratch = self.scratch_dir()?;
        let text = self
            .recognize_first_page(upload_path, scratch.path(), &self.settings.rename_raster)
            .await;
        release_scratch(scratch);
        let name = self.rename_names.extract(&text?);

        let _guard = self.rename_lock.lock().await;
        let target = self.resolve_target(&name).await?;
        // Same filesystem: rename(2) replaces the target in one step.
        tokio::fs::rename(upload_path, &target).await.map_err(|e| {
            PipelineError::filesystem(format!("rename to {} failed: {}", target.display(), e))
        })?;

        Ok(target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{}.pdf", name)))
    }

    async fn resolve_target(&self, name: &str) -> Result<PathBuf, PipelineError> {
        let target = self.settings.renamed_dir.join(format!("{}.pdf", name));
        if self.settings.collision == CollisionPolicy::Overwrite {
            return Ok(target);
        }

        let mut candidate = target;
        let mut n = 1u32;
        while tokio::fs::try_exists(&candidate).await? {
            candidate = self
                .settings
                .renamed_dir
                .join(format!("{} ({}).pdf", name, n));
            n += 1;
        }
        Ok(candidate)
    }

    async fn recognize_first_page(
        &self,
        pdf: &Path,
        scratch: &Path,
        raster: &RasterSettings,
    ) -> Result<String, PipelineError> {
        let page = self
            .rasterizer
            .rasterize_first_page(pdf, scratch, raster)
            .await?;

        let timeout = self.settings.ocr_timeout;
        tokio::time::timeout(
            timeout,
            self.recognizer.recognize(&page.path, &self.settings.language),
        )
        .await
        .map_err(|_| {
            PipelineError::recognition(format!("timed out after {}s", timeout.as_secs_f32()))
        })?
    }

    fn scratch_dir(&self) -> Result<tempfile::TempDir, PipelineError> {
        tempfile::Builder::new()
            .prefix("raster-")
            .tempdir_in(&self.settings.temp_dir)
            .map_err(|e| {
                PipelineError::filesystem(format!(
                    "cannot create scratch dir in {}: {}",
                    self.settings.temp_dir.display(),
                    e
                ))
            })
    }
}

fn release_scratch(scratch: tempfile::TempDir) {
    let path = scratch.path().to_path_buf();
    if let Err(e) = scratch.close() {
        warn!(path = %path.display(), error = %e, "Failed to remove raster scratch dir");
    }
}
