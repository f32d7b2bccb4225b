use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::FailureKind;

/// Name reported for a file whose pipeline failed.
pub const ERROR_NAME: &str = "error";

/// A retrievable copy of a renamed file held by the download store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadHandle {
    pub id: Uuid,
    pub url: String,
}

impl DownloadHandle {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            url: format!("/api/v1/downloads/{}", id),
        }
    }
}

/// Result of running one input file through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Renamed {
        original: String,
        new_name: String,
        download: Option<DownloadHandle>,
    },
    Failed {
        original: String,
        kind: FailureKind,
        message: String,
    },
}

impl FileOutcome {
    pub fn original(&self) -> &str {
        match self {
            FileOutcome::Renamed { original, .. } | FileOutcome::Failed { original, .. } => original,
        }
    }

    pub fn new_name(&self) -> &str {
        match self {
            FileOutcome::Renamed { new_name, .. } => new_name,
            FileOutcome::Failed { .. } => ERROR_NAME,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, FileOutcome::Failed { .. })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FailureDetail {
    pub kind: FailureKind,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FileResult {
    pub original: String,
    pub new_name: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FailureDetail>,
}

impl From<FileOutcome> for FileResult {
    fn from(outcome: FileOutcome) -> Self {
        match outcome {
            FileOutcome::Renamed {
                original,
                new_name,
                download,
            } => FileResult {
                original,
                new_name,
                status: "renamed".to_string(),
                download_url: download.map(|handle| handle.url),
                error: None,
            },
            FileOutcome::Failed {
                original,
                kind,
                message,
            } => FileResult {
                original,
                new_name: ERROR_NAME.to_string(),
                status: "failed".to_string(),
                download_url: None,
                error: Some(FailureDetail { kind, message }),
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProcessResponse {
    pub success: bool,
    pub data: ProcessData,
    pub processing_time_ms: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProcessData {
    pub results: Vec<FileResult>,
    pub failed: usize,
}

impl ProcessResponse {
    pub fn new(outcomes: Vec<FileOutcome>, processing_time_ms: u64) -> Self {
        let failed = outcomes.iter().filter(|o| o.is_failure()).count();
        Self {
            success: true,
            data: ProcessData {
                results: outcomes.into_iter().map(FileResult::from).collect(),
                failed,
            },
            processing_time_ms,
        }
    }
}
