// # IP Source Trait
//
// Defines the interface for a single "what is my IP" lookup.
//
// The resolver queries several independent sources and keeps the
// address most of them agree on; see [`crate::resolver::IpResolver`].
//
// ## Implementations
//
// - HTTP endpoints: `ddnsu-ip-http` crate

use async_trait::async_trait;
use std::net::IpAddr;

/// Trait for IP source implementations
///
/// A source performs one lookup per call and keeps no cache: the public
/// address is recomputed on every pass.
#[async_trait]
pub trait IpSource: Send + Sync {
    /// Look up the public address as seen by this source
    ///
    /// # Returns
    ///
    /// - `Ok(IpAddr)`: The address reported by the source
    /// - `Err(Error)`: Timeout, non-2xx status or malformed body
    async fn lookup(&self) -> Result<IpAddr, crate::Error>;

    /// Identifier used in logs (usually the endpoint URL)
    fn name(&self) -> &str;
}
