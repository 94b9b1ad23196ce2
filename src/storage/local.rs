//! Local filesystem baseline store.
//!
//! Stores the baseline as a single JSON object, the same shape a pickledb
//! dump has, so an existing state file can be picked up as-is.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::storage::StateStore;

/// JSON-file backed baseline store.
#[derive(Debug, Clone)]
pub struct LocalStateStore {
    path: PathBuf,
    entries: BTreeMap<String, u32>,
}

impl LocalStateStore {
    /// Load the store from `path`, starting empty when the file does not exist.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => BTreeMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| AppError::persistence(path.display(), e))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No state file at {}, starting empty", path.display());
                BTreeMap::new()
            }
            Err(e) => return Err(AppError::persistence(path.display(), e)),
        };

        Ok(Self { path, entries })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling temp file: the full file name plus `.tmp`, never the state file itself.
    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, bytes: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let tmp = self.tmp_path();
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await
    }
}

#[async_trait]
impl StateStore for LocalStateStore {
    fn get(&self, thread_id: &str) -> Option<u32> {
        self.entries.get(thread_id).copied()
    }

    fn set(&mut self, thread_id: &str, post_count: u32) {
        self.entries.insert(thread_id.to_string(), post_count);
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    async fn flush(&mut self) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(&self.entries)
            .map_err(|e| AppError::persistence(self.path.display(), e))?;
        self.write_bytes(&bytes)
            .await
            .map_err(|e| AppError::persistence(self.path.display(), e))?;
        log::debug!(
            "Flushed {} entries to {}",
            self.entries.len(),
            self.path.display()
        );
        Ok(())
    }
}
