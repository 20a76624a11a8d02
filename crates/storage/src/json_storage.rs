//! JSON file item source.
//!
//! A snapshot is a JSON array of items or an object with an `items` array.
//! Pointing the source at a directory loads every `*.json` file in it, in
//! file name order, as one set.

use crate::trait_::{ItemSource, Result, StorageError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use timeline_core::Item;
use tokio::fs;
use tracing::{debug, info};

#[derive(Deserialize)]
#[serde(untagged)]
enum SnapshotFile {
    Items(Vec<Item>),
    Envelope { items: Vec<Item> },
}

impl SnapshotFile {
    fn into_items(self) -> Vec<Item> {
        match self {
            SnapshotFile::Items(items) | SnapshotFile::Envelope { items } => items,
        }
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    items: &'a [Item],
}

/// File-based JSON item source.
pub struct JsonItemSource {
    path: PathBuf,
}

impl JsonItemSource {
    /// Create a source for a snapshot file or a directory of them.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Snapshot location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load_file(path: &Path) -> Result<Vec<Item>> {
        let snapshot: SnapshotFile = read_json(path)
            .await?
            .ok_or_else(|| StorageError::NotFound(path.display().to_string()))?;
        let items = snapshot.into_items();
        debug!("Loaded {} items from {}", items.len(), path.display());
        Ok(items)
    }

    async fn load_dir(dir: &Path) -> Result<Vec<Item>> {
        let mut files = Vec::new();
        let mut rd = fs::read_dir(dir).await?;
        while let Some(entry) = rd.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("json") {
                files.push(path);
            }
        }
        files.sort();

        let mut items = Vec::new();
        for file in files {
            items.extend(Self::load_file(&file).await?);
        }
        Ok(items)
    }
}

#[async_trait]
impl ItemSource for JsonItemSource {
    async fn load_items(&self) -> Result<Vec<Item>> {
        let is_dir = match fs::metadata(&self.path).await {
            Ok(meta) => meta.is_dir(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(self.path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let items = if is_dir {
            Self::load_dir(&self.path).await?
        } else {
            Self::load_file(&self.path).await?
        };
        info!("Loaded {} items from {}", items.len(), self.path.display());
        Ok(items)
    }

    async fn save_items(&mut self, items: &[Item]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(&Envelope { items })?;
        fs::write(&self.path, json.as_bytes()).await?;
        Ok(())
    }
}

/// Read and parse a JSON file; a missing file is `Ok(None)`.
pub async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read_to_string(path).await {
        Ok(json) => {
            let value = serde_json::from_str(&json)?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
