pub mod download_store;
pub mod name_extractor;
pub mod ocr_service;
pub mod pipeline;
pub mod rasterizer;

pub use download_store::{DownloadStore, StoredDownload};
pub use name_extractor::{CaptureClass, NameExtractor, NamePolicy, ReservedCharPolicy, WhitespacePolicy};
pub use ocr_service::{OcrService, TextRecognizer};
pub use pipeline::{Disposition, Pipeline, PipelineSettings};
pub use rasterizer::{PdfRasterizer, RasterSettings, RasterizedPage, Rasterizer};
