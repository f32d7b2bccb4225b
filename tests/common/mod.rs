//! Fakes for the external tools plus request helpers.
//!
//! A fixture "PDF" is `%PDF-1.4\n` followed by the text the fake OCR engine
//! should recognize. The fake rasterizer copies the bytes to `page.png`, so
//! whatever a test puts in the document comes back out of OCR.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use pdf_renamer::error::PipelineError;
use pdf_renamer::services::{RasterSettings, RasterizedPage, Rasterizer, TextRecognizer};
use pdf_renamer::{AppState, Config};

const HEADER: &str = "%PDF-1.4\n";
/// Documents containing this marker fail to rasterize.
pub const BROKEN: &str = "BROKEN";
/// `DELAY <ms>` on the first text line makes OCR sleep that long.
pub const DELAY: &str = "DELAY ";

pub fn pdf_with_text(text: &str) -> Vec<u8> {
    format!("{}{}", HEADER, text).into_bytes()
}

pub struct FakeRasterizer;

#[async_trait]
impl Rasterizer for FakeRasterizer {
    async fn rasterize_first_page(
        &self,
        pdf: &Path,
        out_dir: &Path,
        _settings: &RasterSettings,
    ) -> Result<RasterizedPage, PipelineError> {
        let content = tokio::fs::read(pdf).await?;
        if String::from_utf8_lossy(&content).contains(BROKEN) {
            return Err(PipelineError::decode("fixture is marked broken"));
        }
        let path = out_dir.join("page.png");
        tokio::fs::write(&path, &content).await?;
        Ok(RasterizedPage {
            path,
            width: 1000,
            height: 1400,
        })
    }

    fn is_available(&self) -> bool {
        true
    }
}

pub struct FakeOcr;

#[async_trait]
impl TextRecognizer for FakeOcr {
    async fn recognize(&self, image: &Path, language: &str) -> Result<String, PipelineError> {
        assert_eq!(language, "eng");
        let content = tokio::fs::read(image).await?;
        let text = String::from_utf8_lossy(&content)
            .trim_start_matches(HEADER)
            .to_string();

        if let Some(rest) = text.strip_prefix(DELAY) {
            let millis: u64 = rest
                .lines()
                .next()
                .and_then(|l| l.trim().parse().ok())
                .unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(millis)).await;
        }
        Ok(text)
    }

    fn is_available(&self) -> bool {
        true
    }
}

pub struct TestEnv {
    pub dir: TempDir,
    pub state: AppState,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(adjust: impl FnOnce(&mut Config)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let mut config = Config {
            upload_dir: root.join("uploads"),
            renamed_dir: root.join("renamed"),
            temp_dir: root.join("temp"),
            public_dir: root.join("public"),
            ..Config::default()
        };
        adjust(&mut config);
        config.ensure_directories().unwrap();

        let state =
            AppState::with_services(config, Arc::new(FakeRasterizer), Arc::new(FakeOcr)).unwrap();
        Self { dir, state }
    }

    pub fn renamed_dir(&self) -> PathBuf {
        self.state.config.renamed_dir.clone()
    }

    pub fn upload_dir(&self) -> PathBuf {
        self.state.config.upload_dir.clone()
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.state.config.temp_dir.clone()
    }
}

pub fn list_dir(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

const BOUNDARY: &str = "----pdf-renamer-test-boundary";

/// Build a multipart/form-data request with one part per file.
pub fn multipart_request(uri: &str, field: &str, files: &[(&str, Vec<u8>)]) -> Request<Body> {
    let mut body = Vec::new();
    for (name, content) in files {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                field, name
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/pdf\r\n\r\n");
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
