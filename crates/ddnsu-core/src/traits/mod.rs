//! Core traits for DDNSU
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`IpSource`]: One "what is my IP" endpoint
//! - [`DnsProvider`]: List and mutate records via a provider API
//! - [`ConfigStore`]: Load configuration and persist its fingerprint

pub mod config_store;
pub mod dns_provider;
pub mod ip_source;

pub use config_store::ConfigStore;
pub use dns_provider::{DnsProvider, DnsProviderFactory};
pub use ip_source::IpSource;
