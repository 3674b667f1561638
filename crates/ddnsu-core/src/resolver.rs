//! Public IP consensus
//!
//! The [`IpResolver`] queries every configured [`IpSource`] concurrently
//! and keeps, per address family, the address reported most often.
//! Individual failures are logged and skipped; only a pass where every
//! source fails is fatal.
//!
//! IPv4 and IPv6 answers are tallied separately. `AAAA` records take the
//! IPv6 winner and every other record type takes the IPv4 one.
//!
//! ## Tie-breaking
//!
//! Results are tallied in the order the sources were declared, not the
//! order responses arrived. When two addresses share the highest count,
//! the one first reported by an earlier-declared source wins. This makes
//! the outcome independent of network timing.

use crate::error::{Error, Result};
use crate::record::RecordType;
use crate::traits::IpSource;
use futures::future::join_all;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use tracing::{debug, warn};

/// Consensus address of one pass, one winner per family
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolvedAddress {
    /// IPv4 winner, if any endpoint answered over IPv4
    pub v4: Option<Ipv4Addr>,
    /// IPv6 winner, if any endpoint answered over IPv6
    pub v6: Option<Ipv6Addr>,
}

impl ResolvedAddress {
    /// IPv4 winner as an [`IpAddr`]
    pub fn ipv4(&self) -> Option<IpAddr> {
        self.v4.map(IpAddr::V4)
    }

    /// IPv6 winner as an [`IpAddr`]
    pub fn ipv6(&self) -> Option<IpAddr> {
        self.v6.map(IpAddr::V6)
    }

    /// Address to write into a record of `record_type`
    ///
    /// `AAAA` takes the IPv6 winner; every other type takes the IPv4 one.
    /// `None` when that family has no consensus this pass.
    pub fn for_record_type(&self, record_type: RecordType) -> Option<IpAddr> {
        match record_type {
            RecordType::Aaaa => self.ipv6(),
            _ => self.ipv4(),
        }
    }

    /// Whether neither family resolved
    pub fn is_empty(&self) -> bool {
        self.v4.is_none() && self.v6.is_none()
    }
}

impl From<IpAddr> for ResolvedAddress {
    fn from(ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(v4) => Self { v4: Some(v4), v6: None },
            IpAddr::V6(v6) => Self { v4: None, v6: Some(v6) },
        }
    }
}

impl fmt::Display for ResolvedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.v4, self.v6) {
            (Some(v4), Some(v6)) => write!(f, "{v4} / {v6}"),
            (Some(v4), None) => write!(f, "{v4}"),
            (None, Some(v6)) => write!(f, "{v6}"),
            (None, None) => f.write_str("(none)"),
        }
    }
}

/// Consensus resolver over independent IP sources
pub struct IpResolver {
    sources: Vec<Box<dyn IpSource>>,
}

impl IpResolver {
    /// Create a resolver over `sources`, in declaration order
    pub fn new(sources: Vec<Box<dyn IpSource>>) -> Self {
        Self { sources }
    }

    /// Number of configured sources
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether no source is configured
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Resolve the consensus address of each family
    ///
    /// # Returns
    ///
    /// - `Ok(ResolvedAddress)`: The most reported address of each family
    ///   that at least one source answered with
    /// - `Err(Error::NoQuorum)`: No source produced an address
    pub async fn resolve(&self) -> Result<ResolvedAddress> {
        let results = join_all(self.sources.iter().map(|source| source.lookup())).await;

        let mut v4 = Vec::with_capacity(results.len());
        let mut v6 = Vec::new();
        for (source, result) in self.sources.iter().zip(results) {
            match result {
                Ok(IpAddr::V4(ip)) => {
                    debug!("{} reported {}", source.name(), ip);
                    v4.push(ip);
                }
                Ok(IpAddr::V6(ip)) => {
                    debug!("{} reported {}", source.name(), ip);
                    v6.push(ip);
                }
                Err(e) => {
                    warn!("Skipping {} endpoint: {}", source.name(), e);
                }
            }
        }

        let resolved = ResolvedAddress {
            v4: tally(&v4),
            v6: tally(&v6),
        };
        if resolved.is_empty() {
            return Err(Error::no_quorum(format!(
                "all {} IP lookup endpoints failed",
                self.sources.len()
            )));
        }
        Ok(resolved)
    }
}

/// Pick the address with the strictly highest count
///
/// Ties go to the address seen first in `addresses`.
pub fn tally<T: Copy + PartialEq>(addresses: &[T]) -> Option<T> {
    let mut counts: Vec<(T, usize)> = Vec::new();
    for ip in addresses {
        match counts.iter_mut().find(|(seen, _)| seen == ip) {
            Some((_, count)) => *count += 1,
            None => counts.push((*ip, 1)),
        }
    }

    let mut best: Option<(T, usize)> = None;
    for (ip, count) in counts {
        if best.is_none_or(|(_, top)| count > top) {
            best = Some((ip, count));
        }
    }
    best.map(|(ip, _)| ip)
}
