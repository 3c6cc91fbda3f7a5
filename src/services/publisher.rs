use anyhow::Result;
use async_trait::async_trait;
use log::info;
use std::path::PathBuf;
use std::sync::Arc;

use crate::core::io::{read_json, write_json, Storage};

/// Hands a finished short to whatever uploads it.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn register(&self, job_id: &str) -> Result<()>;
}

/// Job ids waiting for upload, kept as a JSON list.
pub struct UploadQueue {
    path: PathBuf,
    storage: Arc<dyn Storage>,
}

impl UploadQueue {
    pub fn new(build_folder: &str, storage: Arc<dyn Storage>) -> Self {
        Self {
            path: PathBuf::from(build_folder).join("upload_queue.json"),
            storage,
        }
    }

    pub async fn pending(&self) -> Result<Vec<String>> {
        if self.storage.exists(&self.path).await? {
            read_json(self.storage.as_ref(), &self.path).await
        } else {
            Ok(Vec::new())
        }
    }
}

#[async_trait]
impl Publisher for UploadQueue {
    async fn register(&self, job_id: &str) -> Result<()> {
        let mut queue = self.pending().await?;
        if queue.iter().any(|id| id == job_id) {
            return Ok(());
        }
        queue.push(job_id.to_string());
        write_json(self.storage.as_ref(), &self.path, &queue).await?;
        info!("Queued {} for upload ({} pending)", job_id, queue.len());
        Ok(())
    }
}
