// # Config Store Trait
//
// Defines where the configuration comes from and where its fingerprint
// goes back to.
//
// ## Lifecycle
//
// - `load()` is called once at the start of every pass
// - `save_fingerprint()` is called at most once at the end of a pass
//
// There is a single writer (one process, one instance), so no locking
// beyond atomic replace is required.
//
// ## Implementations
//
// - [`crate::store::FileConfigStore`]: TOML file with atomic replace
// - [`crate::store::MemoryConfigStore`]: in-process, for tests and embedding

use crate::config::DdnsuConfig;
use async_trait::async_trait;

/// Trait for configuration persistence
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Load the current configuration, including the stored fingerprint
    async fn load(&self) -> Result<DdnsuConfig, crate::Error>;

    /// Persist a new fingerprint into the `past` field
    async fn save_fingerprint(&self, fingerprint: &str) -> Result<(), crate::Error>;
}
