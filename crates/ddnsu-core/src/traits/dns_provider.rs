// # DNS Provider Trait
//
// Defines the interface every DNS hosting provider implements.
//
// ## Implementations
//
// - Cloudflare: `ddnsu-provider-cloudflare` crate
// - Vercel: `ddnsu-provider-vercel` crate
//
// ## Usage
//
// ```rust,ignore
// use ddnsu_core::{DesiredRecord, DnsProvider, RecordType};
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let provider = /* DnsProvider implementation */;
//
//     if !provider.verify_credentials().await? {
//         anyhow::bail!("invalid token");
//     }
//
//     let record = DesiredRecord::new(RecordType::A, "www", 60, "home");
//     let ip = std::net::IpAddr::from([192, 0, 2, 1]);
//     provider.create_record("example.com", &record, ip).await?;
//
//     Ok(())
// }
// ```

use crate::config::ProviderConfig;
use crate::record::{DesiredRecord, RemoteRecord};
use async_trait::async_trait;
use std::net::IpAddr;

/// Trait for DNS provider implementations
///
/// Each implementation maps the common record shape to its own wire
/// format. A provider is selected once at startup and used as a trait
/// object for the rest of the process.
///
/// # Contract
///
/// - Every failed network call (transport error, non-2xx, malformed JSON)
///   surfaces as an `Err`. Providers never retry; the scheduler is the
///   retry mechanism.
/// - `create_record` and `update_record` write the comment as
///   `DDNSU_<comment>` and translate apex names (`""` / `"*"`) to the
///   provider's own convention before building the request.
/// - `list_records` drains every page. Returning a partial listing is a
///   defect: a missing tagged record would be created a second time.
/// - Providers hold no state across calls beyond their HTTP client.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Check that the configured token is valid for the account
    ///
    /// An invalid token yields `Ok(false)`, never an error. Errors are
    /// reserved for transport failures.
    async fn verify_credentials(&self) -> Result<bool, crate::Error>;

    /// Full record listing for a domain, normalized to [`RemoteRecord`]
    async fn list_records(&self, domain: &str) -> Result<Vec<RemoteRecord>, crate::Error>;

    /// Create a record pointing at `address`
    ///
    /// # Returns
    ///
    /// The provider-assigned identifier of the new record
    async fn create_record(
        &self,
        domain: &str,
        record: &DesiredRecord,
        address: IpAddr,
    ) -> Result<String, crate::Error>;

    /// Update an owned record in place, keeping its ownership tag
    async fn update_record(
        &self,
        domain: &str,
        record_id: &str,
        record: &DesiredRecord,
        address: IpAddr,
    ) -> Result<(), crate::Error>;

    /// Delete a record by identifier
    async fn delete_record(&self, domain: &str, record_id: &str) -> Result<(), crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing DNS providers from configuration
pub trait DnsProviderFactory: Send + Sync {
    /// Create a DnsProvider instance from resolved provider settings
    fn create(&self, config: &ProviderConfig) -> Result<Box<dyn DnsProvider>, crate::Error>;
}
