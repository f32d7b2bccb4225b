use bytes::Bytes;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::DownloadHandle;

#[derive(Debug, Clone)]
pub struct StoredDownload {
    pub file_name: String,
    pub content: Bytes,
}

#[derive(Default)]
struct StoreInner {
    current_run: Option<Uuid>,
    entries: HashMap<Uuid, StoredDownload>,
}

/// In-memory copies of renamed files, scoped to the latest processing run.
///
/// Starting a run releases every handle of the previous one, so memory held
/// here is bounded by the size of a single batch.
#[derive(Default)]
pub struct DownloadStore {
    inner: RwLock<StoreInner>,
}

impl DownloadStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Supersede the current run and return the id of the new one.
    pub async fn begin_run(&self) -> Uuid {
        let run_id = Uuid::new_v4();
        let mut inner = self.inner.write().await;
        let released = inner.entries.len();
        inner.entries.clear();
        inner.current_run = Some(run_id);
        info!(run_id = %run_id, released, "Started download run");
        run_id
    }

    /// Returns `None` when `run_id` has already been superseded.
    pub async fn insert(
        &self,
        run_id: Uuid,
        file_name: String,
        content: Bytes,
    ) -> Option<DownloadHandle> {
        let mut inner = self.inner.write().await;
        if inner.current_run != Some(run_id) {
            warn!(run_id = %run_id, file_name = %file_name, "Run superseded, download dropped");
            return None;
        }

        let id = Uuid::new_v4();
        debug!(download_id = %id, file_name = %file_name, size = content.len(), "Stored download");
        inner.entries.insert(id, StoredDownload { file_name, content });
        Some(DownloadHandle::new(id))
    }

    pub async fn get(&self, id: &Uuid) -> Option<StoredDownload> {
        self.inner.read().await.entries.get(id).cloned()
    }

    /// Release every handle. Returns how many were held.
    pub async fn clear(&self) -> usize {
        let mut inner = self.inner.write().await;
        let released = inner.entries.len();
        inner.entries.clear();
        inner.current_run = None;
        info!(released, "Cleared downloads");
        released
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
