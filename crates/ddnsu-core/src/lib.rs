// # ddnsu-core
//
// Core library for the DDNSU record reconciliation engine.
//
// ## Architecture Overview
//
// This library provides the provider-independent half of DDNSU:
// - **IpSource / IpResolver**: Public address lookup by consensus
// - **DnsProvider**: Trait for listing and mutating records via provider APIs
// - **Matcher**: Pairs desired records with the remote records they own
// - **Reconciler**: Applies create/update plans and purges owned records
// - **ChangeDetector**: Fingerprints the configuration to trigger rebuilds
// - **ConfigStore**: Loads configuration and persists the fingerprint
// - **DdnsuEngine**: Runs passes on a fixed interval
// - **ProviderRegistry**: Plugin-based registry for DNS providers
//
// ## Ownership
//
// A record belongs to DDNSU iff its provider-side comment starts with
// `DDNSU_`. Nothing else is ever modified or deleted.

pub mod change;
pub mod config;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod reconciler;
pub mod record;
pub mod registry;
pub mod resolver;
pub mod store;
pub mod traits;

// Re-export core types for convenience
pub use change::{ChangeDecision, ChangeDetector, fingerprint};
pub use config::{CloudflareSection, DdnsuConfig, ProviderConfig, Target, VercelSection};
pub use engine::{DdnsuEngine, EngineEvent, PassMode, PassReport};
pub use error::{Error, Result};
pub use matcher::{MatchPlan, match_records};
pub use reconciler::{BatchReport, DomainReport, Operation, Reconciler, RecordFailure, SkippedDomain};
pub use record::{DesiredRecord, OwnershipTag, RecordType, RemoteRecord, TAG_PREFIX, is_apex_name};
pub use registry::ProviderRegistry;
pub use resolver::{IpResolver, ResolvedAddress};
pub use store::{FileConfigStore, MemoryConfigStore};
pub use traits::{ConfigStore, DnsProvider, DnsProviderFactory, IpSource};
