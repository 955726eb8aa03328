//! One-file-per-message storage for the queue folder.
//!
//! Each item is written as JSON to `<id>.msg`. Writes go to a hidden temp
//! file first and are renamed into place, so a crash never leaves a
//! half-written `.msg` behind.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::message::OutboundMessage;
use crate::queue::QueueItem;

/// Extension of persisted queue items
pub const QUEUE_FILE_EXTENSION: &str = "msg";

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Queue file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error on {path}: {source}")]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl PersistenceError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Path of the file holding the item with the given id
pub fn item_path(folder: &Path, id: Uuid) -> PathBuf {
    folder.join(format!("{}.{}", id, QUEUE_FILE_EXTENSION))
}

/// Write an item to `<folder>/<id>.msg`, refusing to overwrite.
pub async fn write_item(folder: &Path, item: &OutboundMessage) -> Result<PathBuf, PersistenceError> {
    let path = item_path(folder, item.id());

    if tokio::fs::try_exists(&path)
        .await
        .map_err(|e| PersistenceError::io(&path, e))?
    {
        return Err(PersistenceError::AlreadyExists(path));
    }

    let content = serde_json::to_vec_pretty(item).map_err(|source| PersistenceError::Serialization {
        path: path.clone(),
        source,
    })?;

    let tmp_path = folder.join(format!(".{}.{}.tmp", item.id(), QUEUE_FILE_EXTENSION));

    let write_result = async {
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)
            .await?;
        file.write_all(&content).await?;
        file.sync_all().await?;
        tokio::fs::rename(&tmp_path, &path).await
    }
    .await;

    if let Err(e) = write_result {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(PersistenceError::io(&path, e));
    }

    Ok(path)
}

/// Read and deserialize one persisted item
pub async fn read_item(path: &Path) -> Result<OutboundMessage, PersistenceError> {
    let content = tokio::fs::read(path)
        .await
        .map_err(|e| PersistenceError::io(path, e))?;

    serde_json::from_slice(&content).map_err(|source| PersistenceError::Serialization {
        path: path.to_path_buf(),
        source,
    })
}

/// List persisted item files (`*.msg`) in the folder, sorted by name
pub async fn list_items(folder: &Path) -> Result<Vec<PathBuf>, PersistenceError> {
    let mut entries = tokio::fs::read_dir(folder)
        .await
        .map_err(|e| PersistenceError::io(folder, e))?;

    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| PersistenceError::io(folder, e))?
    {
        let path = entry.path();
        let is_file = entry
            .file_type()
            .await
            .map(|file_type| file_type.is_file())
            .unwrap_or(false);

        if is_file && path.extension().and_then(|ext| ext.to_str()) == Some(QUEUE_FILE_EXTENSION) {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}
