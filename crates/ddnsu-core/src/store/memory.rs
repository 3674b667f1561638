// # Memory Config Store
//
// In-memory implementation of ConfigStore.
//
// Useful for tests and for embedding the engine in a program that owns
// its configuration some other way. Nothing survives a restart, so the
// first pass after a restart is always treated as a first run.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

use crate::Error;
use crate::config::DdnsuConfig;
use crate::traits::config_store::ConfigStore;

/// In-memory config store
///
/// Clones share the same underlying document, so a test can keep one
/// handle to edit the configuration between passes while the engine
/// owns another.
#[derive(Debug, Clone)]
pub struct MemoryConfigStore {
    inner: Arc<RwLock<DdnsuConfig>>,
    saves: Arc<AtomicUsize>,
}

impl MemoryConfigStore {
    /// Create a store holding `config`
    pub fn new(config: DdnsuConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
            saves: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Replace the document, keeping the stored fingerprint
    pub async fn replace(&self, mut config: DdnsuConfig) {
        let mut guard = self.inner.write().await;
        config.past = guard.past.take();
        *guard = config;
    }

    /// Edit the document in place
    pub async fn edit<F>(&self, f: F)
    where
        F: FnOnce(&mut DdnsuConfig),
    {
        let mut guard = self.inner.write().await;
        f(&mut guard);
    }

    /// Currently stored fingerprint
    pub async fn fingerprint(&self) -> Option<String> {
        self.inner.read().await.past.clone()
    }

    /// Number of fingerprint writes so far
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn load(&self) -> Result<DdnsuConfig, Error> {
        Ok(self.inner.read().await.clone())
    }

    async fn save_fingerprint(&self, fingerprint: &str) -> Result<(), Error> {
        self.inner.write().await.past = Some(fingerprint.to_string());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
