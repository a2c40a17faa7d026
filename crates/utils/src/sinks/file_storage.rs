//! Filesystem-backed message sink.
//!
//! Provides [`FileStorageSink`], a [`MessageSink`](crate::MessageSink)
//! that writes every forwarded copy as an `.eml` file, one directory per
//! forward target.

use std::path::PathBuf;

use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::sink::{MessageSink, SinkFuture, SinkResult};

/// Message sink that stores forwarded emails under an outbox directory.
///
/// Files are laid out as `{base_path}/{target}/{uuid}.eml`, with every
/// non alphanumeric character of the target replaced by `_`.
#[derive(Debug, Clone)]
pub struct FileStorageSink {
    base_path: PathBuf,
}

impl FileStorageSink {
    /// Creates a new [`FileStorageSink`] rooted at the given path.
    pub fn new(base_path: PathBuf) -> Self {
        info!(path = %base_path.display(), "File storage sink initialized");
        Self { base_path }
    }

    /// Returns the path to a target's outbox directory.
    fn target_path(&self, target: &str) -> PathBuf {
        let safe_target = target.replace(|c: char| !c.is_ascii_alphanumeric(), "_");
        self.base_path.join(safe_target)
    }

    /// Lists the files written for a target.
    pub async fn list(&self, target: &str) -> SinkResult<Vec<PathBuf>> {
        let target_dir = self.target_path(target);

        // Return empty list if directory doesn't exist
        if !target_dir.exists() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        let mut entries = fs::read_dir(&target_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "eml") {
                files.push(path);
            }
        }

        Ok(files)
    }

    async fn store(&self, raw: &[u8], target: &str) -> SinkResult<PathBuf> {
        let target_dir = self.target_path(target);
        fs::create_dir_all(&target_dir).await?;

        let file_path = target_dir.join(format!("{}.eml", Uuid::new_v4()));
        let mut file = File::create(&file_path).await?;
        file.write_all(raw).await?;
        file.flush().await?;

        Ok(file_path)
    }
}

impl MessageSink for FileStorageSink {
    fn send<'a>(&'a self, raw: &'a [u8], target: &'a str) -> SinkFuture<'a> {
        Box::pin(async move {
            debug!(forward_to = %target, "Storing forwarded email to filesystem");
            let path = self.store(raw, target).await.map_err(|e| {
                error!(forward_to = %target, error = %e, "Failed to store forwarded email");
                e
            })?;
            info!(
                forward_to = %target,
                path = %path.display(),
                "Stored forwarded email to filesystem"
            );
            Ok(())
        })
    }

    fn name(&self) -> &str {
        "file_storage"
    }
}
