// # File Config Store
//
// TOML-file implementation of ConfigStore.
//
// ## Purpose
//
// The configuration file is both the operator's input and the place where
// the fingerprint of the last committed configuration lives (`past`).
//
// ## Write Path
//
// - Only the `past` key is changed; every other key (including ones this
//   version does not model) is carried over as-is
// - Atomic writes: write to `<file>.tmp`, then rename over the original
// - Backup: the previous document is copied to `<file>.backup` first
//
// Comments in the original document are not preserved by a write.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::Error;
use crate::config::DdnsuConfig;
use crate::traits::config_store::ConfigStore;

/// File-based config store with atomic fingerprint writes
///
/// # Example
///
/// ```rust,no_run
/// use ddnsu_core::store::FileConfigStore;
/// use ddnsu_core::traits::ConfigStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileConfigStore::new("/etc/ddnsu/ddnsu.toml");
///
///     let config = store.load().await?;
///     config.validate()?;
///
///     store.save_fingerprint("4f2a...").await?;
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    /// Create a store for the document at `path`
    ///
    /// Nothing is read until [`ConfigStore::load`] is called.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Path of the configuration document
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_document(&self) -> Result<String, Error> {
        fs::read_to_string(&self.path).await.map_err(|e| {
            Error::config_store(format!(
                "Failed to read configuration file {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    /// Write the document atomically, keeping a backup of the previous one
    async fn write_document(&self, content: &str) -> Result<(), Error> {
        let temp_path = Self::sibling(&self.path, "tmp");
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::config_store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.write_all(content.as_bytes()).await.map_err(|e| {
                Error::config_store(format!(
                    "Failed to write to temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.sync_all().await.map_err(|e| {
                Error::config_store(format!(
                    "Failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        if self.path.exists() {
            let backup_path = Self::sibling(&self.path, "backup");
            if let Err(e) = fs::copy(&self.path, &backup_path).await {
                tracing::warn!("Failed to create configuration backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::config_store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!("Configuration written to {}", self.path.display());
        Ok(())
    }

    /// `ddnsu.toml` -> `ddnsu.toml.<suffix>`
    fn sibling(path: &Path, suffix: &str) -> PathBuf {
        PathBuf::from(format!("{}.{}", path.display(), suffix))
    }
}

#[async_trait]
impl ConfigStore for FileConfigStore {
    async fn load(&self) -> Result<DdnsuConfig, Error> {
        let content = self.read_document().await?;
        DdnsuConfig::from_toml_str(&content).inspect_err(|_| {
            let backup_path = Self::sibling(&self.path, "backup");
            if backup_path.exists() {
                tracing::warn!(
                    "Configuration file {} is invalid; last written copy is at {}",
                    self.path.display(),
                    backup_path.display()
                );
            }
        })
    }

    async fn save_fingerprint(&self, fingerprint: &str) -> Result<(), Error> {
        let content = self.read_document().await?;
        let mut document: toml::Table = content.parse().map_err(|e| {
            Error::config_store(format!(
                "Failed to parse configuration file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        document.insert(
            "past".to_string(),
            toml::Value::String(fingerprint.to_string()),
        );

        let rendered = toml::to_string_pretty(&document)
            .map_err(|e| Error::config_store(format!("Failed to serialize configuration: {e}")))?;

        self.write_document(&rendered).await
    }
}
