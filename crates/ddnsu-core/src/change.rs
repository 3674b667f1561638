//! Configuration change detection
//!
//! A fingerprint is the lowercase hex SHA-256 of the configuration
//! serialized as JSON, with the `past` field cleared so the stored
//! fingerprint never feeds into itself.
//!
//! The engine compares the fingerprint at the start of every pass:
//!
//! | stored | current | decision |
//! |---|---|---|
//! | none / empty | any | [`ChangeDecision::FirstRun`] |
//! | equal | equal | [`ChangeDecision::Unchanged`] |
//! | differs | | [`ChangeDecision::Rebuild`] |
//!
//! On a rebuild the engine purges first and commits after. A crash in
//! between leaves the old fingerprint in place, so the next run purges
//! again; purging an already-empty domain is a no-op.

use crate::config::DdnsuConfig;
use crate::error::Result;
use crate::traits::ConfigStore;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info};

/// Compute the fingerprint of a configuration
pub fn fingerprint(config: &DdnsuConfig) -> Result<String> {
    let canonical = serde_json::to_vec(&config.without_past())?;
    Ok(hex::encode(Sha256::digest(&canonical)))
}

/// What a pass should do about configuration drift
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeDecision {
    /// No fingerprint stored yet; nothing to purge
    FirstRun {
        /// Fingerprint of the current configuration
        current: String,
    },
    /// Configuration unchanged since the last commit
    Unchanged,
    /// Configuration changed; purge and rebuild
    Rebuild {
        /// Stored fingerprint
        previous: String,
        /// Fingerprint of the current configuration
        current: String,
    },
}

impl ChangeDecision {
    /// Whether a purge must run before reconciling
    pub fn requires_purge(&self) -> bool {
        matches!(self, ChangeDecision::Rebuild { .. })
    }
}

/// Compares configurations against the stored fingerprint
#[derive(Clone)]
pub struct ChangeDetector {
    store: Arc<dyn ConfigStore>,
}

impl ChangeDetector {
    /// Create a detector persisting through `store`
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self { store }
    }

    /// Decide between first run, incremental update and rebuild
    pub fn decide(&self, config: &DdnsuConfig) -> Result<ChangeDecision> {
        let current = fingerprint(config)?;
        let decision = match config.past.as_deref().filter(|p| !p.is_empty()) {
            None => ChangeDecision::FirstRun { current },
            Some(previous) if previous == current => ChangeDecision::Unchanged,
            Some(previous) => ChangeDecision::Rebuild {
                previous: previous.to_string(),
                current,
            },
        };
        debug!("Change decision: {:?}", decision);
        Ok(decision)
    }

    /// Whether the configuration changed since the last commit
    ///
    /// A first run is not a rebuild: there is nothing previous to purge.
    pub fn should_rebuild(&self, config: &DdnsuConfig) -> Result<bool> {
        Ok(self.decide(config)?.requires_purge())
    }

    /// Persist the fingerprint of `config`
    ///
    /// # Returns
    ///
    /// The fingerprint that was written
    pub async fn commit(&self, config: &DdnsuConfig) -> Result<String> {
        let current = fingerprint(config)?;
        self.store.save_fingerprint(&current).await?;
        info!("Committed configuration fingerprint {}", &current[..12]);
        Ok(current)
    }
}
