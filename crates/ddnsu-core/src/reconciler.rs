//! Converging one provider's records to the desired state
//!
//! Per domain, a reconcile runs `FetchRemote → Match → Apply`. The address
//! is resolved once per pass by the engine and passed in. Each record takes
//! the winner of its own family; a record whose family has no consensus
//! fails on its own.
//!
//! Failure scoping:
//! - a listing failure skips that domain only; other domains proceed
//! - a create/update/delete failure is recorded for that record only;
//!   sibling records in the same domain proceed
//!
//! Nothing is retried within a pass. The next scheduled pass retries.

use crate::error::Error;
use crate::matcher::{MatchPlan, match_records};
use crate::record::{DesiredRecord, RecordType};
use crate::resolver::ResolvedAddress;
use crate::traits::DnsProvider;
use futures::future::join_all;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Mutating provider operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        })
    }
}

/// A single record-level failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFailure {
    /// Desired record comment, or remote record id for deletions
    pub record: String,
    /// What was attempted
    pub operation: Operation,
    /// Error message
    pub error: String,
}

/// Outcome of reconciling or purging one domain
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainReport {
    /// Domain name
    pub domain: String,
    /// Comments of created records
    pub created: Vec<String>,
    /// Comments of updated records
    pub updated: Vec<String>,
    /// Ids of deleted records
    pub deleted: Vec<String>,
    /// Record-level failures
    pub failures: Vec<RecordFailure>,
}

impl DomainReport {
    fn new(domain: &str) -> Self {
        Self {
            domain: domain.to_string(),
            ..Self::default()
        }
    }

    /// Whether every record operation succeeded
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A domain left out of a pass because its listing could not be fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedDomain {
    /// Domain name
    pub domain: String,
    /// Why the listing failed
    pub error: String,
}

/// Reports for a set of domains
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Domains that were processed
    pub domains: Vec<DomainReport>,
    /// Domains that were skipped
    pub skipped: Vec<SkippedDomain>,
}

impl BatchReport {
    /// No skipped domains and no record failures
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty() && self.domains.iter().all(DomainReport::is_clean)
    }

    /// Total number of record failures
    pub fn failure_count(&self) -> usize {
        self.domains.iter().map(|d| d.failures.len()).sum()
    }
}

/// Orchestrates provider calls for one provider
#[derive(Clone)]
pub struct Reconciler {
    provider: Arc<dyn DnsProvider>,
}

impl Reconciler {
    /// Create a reconciler for `provider`
    pub fn new(provider: Arc<dyn DnsProvider>) -> Self {
        Self { provider }
    }

    /// The provider this reconciler drives
    pub fn provider(&self) -> &Arc<dyn DnsProvider> {
        &self.provider
    }

    /// Reconcile every domain
    ///
    /// Listings are fetched concurrently; each domain's apply step starts
    /// once its own listing is in.
    pub async fn reconcile_all(
        &self,
        domains: &[String],
        records: &[DesiredRecord],
        address: ResolvedAddress,
    ) -> BatchReport {
        let runs = domains
            .iter()
            .map(|domain| self.reconcile_domain(domain, records, address));
        collect(domains, join_all(runs).await)
    }

    /// Reconcile one domain: fetch, match, apply
    ///
    /// # Returns
    ///
    /// - `Ok(DomainReport)`: Per-record outcomes (which may include failures)
    /// - `Err(Error)`: The listing could not be fetched; nothing was applied
    pub async fn reconcile_domain(
        &self,
        domain: &str,
        records: &[DesiredRecord],
        address: ResolvedAddress,
    ) -> Result<DomainReport, Error> {
        let remote = self.provider.list_records(domain).await?;
        debug!(
            "{}: {} remote record(s), {} tagged",
            domain,
            remote.len(),
            remote.iter().filter(|r| r.is_tagged()).count()
        );

        let plan = match_records(records, &remote);
        Ok(self.apply(domain, plan, address).await)
    }

    /// Execute a match plan
    ///
    /// Every create and update is attempted regardless of earlier failures.
    pub async fn apply(
        &self,
        domain: &str,
        plan: MatchPlan,
        address: ResolvedAddress,
    ) -> DomainReport {
        let mut report = DomainReport::new(domain);
        let provider = self.provider.provider_name();

        for (record, remote) in &plan.to_update {
            let Some(address) = address_for(record, &address, Operation::Update, &mut report)
            else {
                continue;
            };
            match self
                .provider
                .update_record(domain, &remote.id, record, address)
                .await
            {
                Ok(()) => {
                    info!(
                        "[{}] Updated {} record '{}' on {} -> {} ({})",
                        provider, record.record_type, record.name, domain, address, record.tag()
                    );
                    report.updated.push(record.comment.clone());
                }
                Err(e) => {
                    error!(
                        "[{}] Failed to update '{}' on {}: {}",
                        provider, record.comment, domain, e
                    );
                    report.failures.push(RecordFailure {
                        record: record.comment.clone(),
                        operation: Operation::Update,
                        error: e.to_string(),
                    });
                }
            }
        }

        for record in &plan.to_create {
            let Some(address) = address_for(record, &address, Operation::Create, &mut report)
            else {
                continue;
            };
            match self.provider.create_record(domain, record, address).await {
                Ok(id) => {
                    info!(
                        "[{}] Created {} record '{}' on {} -> {} (id {}, {})",
                        provider,
                        record.record_type,
                        record.name,
                        domain,
                        address,
                        id,
                        record.tag()
                    );
                    report.created.push(record.comment.clone());
                }
                Err(e) => {
                    error!(
                        "[{}] Failed to create '{}' on {}: {}",
                        provider, record.comment, domain, e
                    );
                    report.failures.push(RecordFailure {
                        record: record.comment.clone(),
                        operation: Operation::Create,
                        error: e.to_string(),
                    });
                }
            }
        }

        report
    }

    /// Purge every domain
    pub async fn purge_all(&self, domains: &[String]) -> BatchReport {
        let runs = domains.iter().map(|domain| self.purge_domain(domain));
        collect(domains, join_all(runs).await)
    }

    /// Delete every tagged record on a domain
    ///
    /// A domain with no tagged records is a successful no-op. Untagged
    /// records are never touched.
    pub async fn purge_domain(&self, domain: &str) -> Result<DomainReport, Error> {
        let remote = self.provider.list_records(domain).await?;
        let mut report = DomainReport::new(domain);
        let provider = self.provider.provider_name();

        for record in remote.iter().filter(|r| r.is_tagged()) {
            match self.provider.delete_record(domain, &record.id).await {
                Ok(()) => {
                    info!(
                        "[{}] Deleted {} record '{}' on {} ({})",
                        provider,
                        record.record_type,
                        record.name,
                        domain,
                        record.comment.as_deref().unwrap_or_default()
                    );
                    report.deleted.push(record.id.clone());
                }
                Err(e) => {
                    error!(
                        "[{}] Failed to delete record {} on {}: {}",
                        provider, record.id, domain, e
                    );
                    report.failures.push(RecordFailure {
                        record: record.id.clone(),
                        operation: Operation::Delete,
                        error: e.to_string(),
                    });
                }
            }
        }

        if report.deleted.is_empty() && report.failures.is_empty() {
            debug!("{}: nothing to purge", domain);
        }
        Ok(report)
    }
}

/// Address for `record`, or a recorded failure when its family did not resolve
fn address_for(
    record: &DesiredRecord,
    address: &ResolvedAddress,
    operation: Operation,
    report: &mut DomainReport,
) -> Option<IpAddr> {
    let resolved = address.for_record_type(record.record_type);
    if resolved.is_none() {
        let family = if record.record_type == RecordType::Aaaa { "IPv6" } else { "IPv4" };
        warn!(
            "No {} consensus this pass; leaving {} record '{}' on {} as is",
            family, record.record_type, record.comment, report.domain
        );
        report.failures.push(RecordFailure {
            record: record.comment.clone(),
            operation,
            error: format!("no {family} address resolved"),
        });
    }
    resolved
}

fn collect(domains: &[String], results: Vec<Result<DomainReport, Error>>) -> BatchReport {
    let mut batch = BatchReport::default();
    for (domain, result) in domains.iter().zip(results) {
        match result {
            Ok(report) => batch.domains.push(report),
            Err(e) => {
                warn!("Skipping domain {} this pass: {}", domain, e);
                batch.skipped.push(SkippedDomain {
                    domain: domain.clone(),
                    error: e.to_string(),
                });
            }
        }
    }
    batch
}
