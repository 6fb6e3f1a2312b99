//! Durable slots holding the serialized client task snapshot.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tokio::fs;

use crate::error::ClientError;

/// A single named location that survives restarts of the client.
#[async_trait]
pub trait SnapshotSlot: Send + Sync {
    /// Returns the stored contents, or `None` if nothing was ever written.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Io` if the slot exists but cannot be read.
    async fn read(&self) -> Result<Option<String>, ClientError>;

    /// Replaces the stored contents.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Io` if the slot cannot be written.
    async fn write(&self, contents: &str) -> Result<(), ClientError>;
}

/// Slot backed by a JSON file, replaced atomically on every write.
#[derive(Debug, Clone)]
pub struct FileSnapshotSlot {
    path: PathBuf,
}

impl FileSnapshotSlot {
    /// Uses `<dir>/<name>.json` as the slot.
    #[must_use]
    pub fn new(dir: impl AsRef<Path>, name: &str) -> Self {
        Self {
            path: dir.as_ref().join(format!("{name}.json")),
        }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SnapshotSlot for FileSnapshotSlot {
    async fn read(&self) -> Result<Option<String>, ClientError> {
        match fs::read_to_string(&self.path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, contents: &str) -> Result<(), ClientError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, contents).await?;
        fs::rename(&staging, &self.path).await?;
        Ok(())
    }
}

/// Slot kept in memory; survives only as long as the value itself.
#[derive(Debug, Default)]
pub struct MemorySnapshotSlot {
    contents: Mutex<Option<String>>,
}

impl MemorySnapshotSlot {
    /// Creates an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a slot that already holds `contents`.
    #[must_use]
    pub fn with_contents(contents: impl Into<String>) -> Self {
        Self {
            contents: Mutex::new(Some(contents.into())),
        }
    }

    /// Current contents, read without going through the async interface.
    #[must_use]
    pub fn contents(&self) -> Option<String> {
        self.contents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl SnapshotSlot for MemorySnapshotSlot {
    async fn read(&self) -> Result<Option<String>, ClientError> {
        Ok(self.contents())
    }

    async fn write(&self, contents: &str) -> Result<(), ClientError> {
        *self.contents.lock().unwrap_or_else(PoisonError::into_inner) = Some(contents.to_owned());
        Ok(())
    }
}
