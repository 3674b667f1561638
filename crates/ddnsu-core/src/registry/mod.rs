//! Provider registry
//!
//! Provider crates register a factory under their target name; the
//! daemon then builds exactly one provider from the configured target.
//! Selection happens once at startup, never per call.
//!
//! ## Registration
//!
//! ```rust,ignore
//! // In ddnsu-provider-cloudflare
//! pub fn register(registry: &ProviderRegistry) {
//!     registry.register_provider("cloudflare", Box::new(CloudflareFactory));
//! }
//! ```

use crate::config::ProviderConfig;
use crate::error::{Error, Result};
use crate::traits::{DnsProvider, DnsProviderFactory};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Registry of DNS provider factories keyed by target name
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: RwLock<HashMap<String, Box<dyn DnsProviderFactory>>>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a DNS provider factory
    ///
    /// # Parameters
    ///
    /// - `name`: Target name as written in configuration (e.g., "vercel")
    /// - `factory`: Factory object for creating provider instances
    pub fn register_provider(&self, name: impl Into<String>, factory: Box<dyn DnsProviderFactory>) {
        self.write().insert(name.into(), factory);
    }

    /// Create the provider for the configured target
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn DnsProvider>)`: Created provider instance
    /// - `Err(Error::Config)`: If the target has no registered factory
    pub fn create_provider(&self, config: &ProviderConfig) -> Result<Box<dyn DnsProvider>> {
        let name = config.target.as_str();
        let providers = self.read();

        let factory = providers.get(name).ok_or_else(|| {
            Error::config(format!(
                "Provider '{}' is not available in this build. Registered: {}",
                name,
                providers.keys().cloned().collect::<Vec<_>>().join(", ")
            ))
        })?;

        factory.create(config)
    }

    /// List all registered provider names
    pub fn list_providers(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    /// Check if a provider is registered
    pub fn has_provider(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Box<dyn DnsProviderFactory>>> {
        self.providers.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Box<dyn DnsProviderFactory>>> {
        self.providers.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
