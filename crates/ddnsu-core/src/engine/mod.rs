//! Core DDNSU engine
//!
//! The DdnsuEngine is responsible for:
//! - Running one reconciliation pass immediately, then on a fixed interval
//! - Loading and validating configuration at the start of every pass
//! - Deciding between an incremental update and a purge-and-rebuild
//! - Persisting the configuration fingerprint at the end of a pass
//!
//! ## Architecture
//!
//! ```text
//!                            ┌──────────────┐
//!             tick ────────▶ │ DdnsuEngine  │ ◀──── ConfigStore (load / commit)
//!                            └──────────────┘
//!                                    │
//!         ┌──────────────────────────┼──────────────────────────┐
//!         │                          │                          │
//!         ▼                          ▼                          ▼
//! ┌───────────────┐         ┌────────────────┐         ┌────────────────┐
//! │ ChangeDetector│         │  IpResolver    │         │  Reconciler    │
//! │ (purge?)      │         │  (consensus)   │         │ (match, apply) │
//! └───────────────┘         └────────────────┘         └────────────────┘
//!                                                              │
//!                                                              ▼
//!                                                      ┌────────────────┐
//!                                                      │  DnsProvider   │
//!                                                      └────────────────┘
//! ```
//!
//! ## Pass Flow
//!
//! 1. Load configuration and validate it (fatal on integrity violations)
//! 2. Verify provider credentials (fatal when invalid)
//! 3. Resolve the consensus address (fatal on no quorum)
//! 4. Decide: first run, unchanged, or rebuild
//! 5. On rebuild, purge every tagged record on every domain, including the
//!    domains of configured providers that are not the current target
//! 6. Reconcile every domain
//! 7. Commit the fingerprint (first run, or rebuild with a clean purge)
//!
//! A fatal error stops the current pass only. The scheduler keeps going.
//!
//! ## Scheduling
//!
//! Passes never overlap. The loop awaits each pass before waiting for the
//! next tick, and ticks missed while a pass was running are skipped rather
//! than queued ([`MissedTickBehavior::Skip`]).

use crate::change::{ChangeDecision, ChangeDetector};
use crate::config::{DdnsuConfig, Target};
use crate::error::{Error, Result};
use crate::reconciler::{BatchReport, Operation, Reconciler, SkippedDomain};
use crate::resolver::{IpResolver, ResolvedAddress};
use crate::traits::{ConfigStore, DnsProvider};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Capacity of the engine event channel
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Events emitted by the DdnsuEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Scheduler started
    Started { interval_ms: u64 },

    /// A pass began
    PassStarted { pass: u64 },

    /// Consensus address for the pass
    AddressResolved { address: ResolvedAddress },

    /// Configuration changed since the last commit
    RebuildTriggered { previous: String, current: String },

    /// A record was created
    RecordCreated { domain: String, comment: String },

    /// A record was updated
    RecordUpdated { domain: String, comment: String },

    /// A tagged record was deleted by a purge
    RecordDeleted { domain: String, record_id: String },

    /// A record-level operation failed
    RecordFailed {
        domain: String,
        record: String,
        operation: Operation,
        error: String,
    },

    /// A domain's listing failed; it was skipped for this pass
    DomainSkipped { domain: String, error: String },

    /// A pass finished (possibly with record-level failures)
    PassCompleted { pass: u64, mode: PassMode, clean: bool },

    /// A pass was aborted by a fatal error
    PassFailed { pass: u64, error: String },

    /// Scheduler stopped
    Stopped { reason: String },
}

/// How a pass treated the configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassMode {
    /// No fingerprint was stored; recorded it and reconciled
    FirstRun,
    /// Configuration unchanged; incremental reconcile
    Incremental,
    /// Configuration changed; purged, then reconciled
    Rebuild,
}

/// Summary of one completed pass
#[derive(Debug, Clone)]
pub struct PassReport {
    /// Pass number, starting at 1
    pub pass: u64,
    /// Mode the pass ran in
    pub mode: PassMode,
    /// Consensus address of each family
    pub address: ResolvedAddress,
    /// Purge results, for rebuild passes
    pub purge: Option<BatchReport>,
    /// Reconcile results
    pub reconcile: BatchReport,
    /// Fingerprint written at the end of the pass, if any
    pub committed: Option<String>,
    /// When the pass started
    pub started_at: DateTime<Utc>,
    /// When the pass finished
    pub finished_at: DateTime<Utc>,
}

impl PassReport {
    /// No skipped domains and no record failures, purge included
    pub fn is_clean(&self) -> bool {
        self.reconcile.is_clean() && self.purge.as_ref().is_none_or(BatchReport::is_clean)
    }
}

/// Core DDNSU engine
///
/// ## Lifecycle
///
/// 1. Create with [`DdnsuEngine::new()`]
/// 2. Run with [`DdnsuEngine::start()`], [`DdnsuEngine::run_once()`]
///    or [`DdnsuEngine::purge_all()`]
/// 3. `start()` runs until SIGINT/ctrl-c
pub struct DdnsuEngine {
    /// Consensus resolver over the lookup endpoints
    resolver: IpResolver,

    /// Provider operations for the selected target
    reconciler: Reconciler,

    /// Other configured providers, only ever purged
    purge_only: Vec<Reconciler>,

    /// Configuration source and fingerprint sink
    store: Arc<dyn ConfigStore>,

    /// Fingerprint comparison
    detector: ChangeDetector,

    /// Held for the duration of a pass or purge
    pass_lock: Mutex<()>,

    /// Number of passes started
    passes: AtomicU64,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl DdnsuEngine {
    /// Create a new engine
    ///
    /// # Parameters
    ///
    /// - `resolver`: Consensus resolver
    /// - `provider`: DNS provider for the configured target
    /// - `store`: Configuration store
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        resolver: IpResolver,
        provider: Box<dyn DnsProvider>,
        store: Box<dyn ConfigStore>,
    ) -> (Self, mpsc::Receiver<EngineEvent>) {
        let (tx, rx) = mpsc::channel(DEFAULT_EVENT_CHANNEL_CAPACITY);
        let store: Arc<dyn ConfigStore> = Arc::from(store);

        let engine = Self {
            resolver,
            reconciler: Reconciler::new(Arc::from(provider)),
            purge_only: Vec::new(),
            detector: ChangeDetector::new(Arc::clone(&store)),
            store,
            pass_lock: Mutex::new(()),
            passes: AtomicU64::new(0),
            event_tx: tx,
        };

        (engine, rx)
    }

    /// Also purge `provider` on rebuilds and on [`DdnsuEngine::purge_all()`]
    ///
    /// Its domains are read from the matching configuration section on
    /// every purge. It is never reconciled.
    pub fn with_purge_provider(mut self, provider: Box<dyn DnsProvider>) -> Self {
        self.purge_only.push(Reconciler::new(Arc::from(provider)));
        self
    }

    /// Number of passes started so far
    pub fn pass_count(&self) -> u64 {
        self.passes.load(Ordering::SeqCst)
    }

    /// Run passes forever: one immediately, then every `interval_ms`
    ///
    /// Returns after SIGINT/ctrl-c. Pass failures are logged and do not
    /// stop the loop.
    pub async fn start(&self, interval_ms: u64) -> Result<()> {
        self.run_internal(interval_ms, None).await
    }

    /// Run the scheduler with a controlled shutdown signal
    ///
    /// Behaves like [`DdnsuEngine::start()`] but stops when `shutdown_rx`
    /// fires instead of on ctrl-c. Used by embedding code and tests.
    pub async fn run_with_shutdown(
        &self,
        interval_ms: u64,
        shutdown_rx: Option<oneshot::Receiver<()>>,
    ) -> Result<()> {
        self.run_internal(interval_ms, shutdown_rx).await
    }

    async fn run_internal(
        &self,
        interval_ms: u64,
        shutdown_rx: Option<oneshot::Receiver<()>>,
    ) -> Result<()> {
        if interval_ms == 0 {
            return Err(Error::config("update interval must be > 0"));
        }

        self.emit_event(EngineEvent::Started { interval_ms });
        info!("Updating every {}ms", interval_ms);

        let shutdown = async {
            match shutdown_rx {
                Some(rx) => {
                    let _ = rx.await;
                }
                None => {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        error!("Failed to listen for ctrl-c: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            }
        };
        tokio::pin!(shutdown);

        let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once().await {
                        debug!("Pass aborted, waiting for next tick: {}", e);
                    }
                }

                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    self.emit_event(EngineEvent::Stopped {
                        reason: "Shutdown signal".to_string(),
                    });
                    break;
                }
            }
        }

        Ok(())
    }

    /// Run a single reconciliation pass
    ///
    /// # Returns
    ///
    /// - `Ok(PassReport)`: The pass ran; the report may still contain
    ///   skipped domains or record failures
    /// - `Err(Error)`: A fatal error aborted the pass
    pub async fn run_once(&self) -> Result<PassReport> {
        let _guard = self.pass_lock.lock().await;
        let pass = self.passes.fetch_add(1, Ordering::SeqCst) + 1;
        self.emit_event(EngineEvent::PassStarted { pass });

        match self.run_pass(pass).await {
            Ok(report) => {
                info!(
                    "Pass {} finished ({:?}): {} created, {} updated, {} failed, {} domain(s) skipped",
                    pass,
                    report.mode,
                    report.reconcile.domains.iter().map(|d| d.created.len()).sum::<usize>(),
                    report.reconcile.domains.iter().map(|d| d.updated.len()).sum::<usize>(),
                    report.reconcile.failure_count(),
                    report.reconcile.skipped.len()
                );
                self.emit_event(EngineEvent::PassCompleted {
                    pass,
                    mode: report.mode,
                    clean: report.is_clean(),
                });
                Ok(report)
            }
            Err(e) => {
                error!("Pass {} aborted: {}", pass, e);
                self.emit_event(EngineEvent::PassFailed {
                    pass,
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn run_pass(&self, pass: u64) -> Result<PassReport> {
        let started_at = Utc::now();

        let config = self.store.load().await?;
        config.validate()?;
        let domains = config.domain_targets()?.to_vec();
        self.check_credentials(config.target()?.as_str()).await?;

        let address = self.resolver.resolve().await?;
        info!("Public IP consensus: {}", address);
        self.emit_event(EngineEvent::AddressResolved { address });

        let decision = self.detector.decide(&config)?;
        let mut committed = None;
        let mut purge = None;

        let mode = match decision {
            ChangeDecision::FirstRun { .. } => {
                info!("First run, recording configuration fingerprint");
                committed = Some(self.detector.commit(&config).await?);
                PassMode::FirstRun
            }
            ChangeDecision::Unchanged => PassMode::Incremental,
            ChangeDecision::Rebuild { previous, current } => {
                warn!("Configuration changed since last run, rebuilding");
                self.emit_event(EngineEvent::RebuildTriggered { previous, current });

                purge = Some(self.purge_everywhere(&config, &domains).await);
                PassMode::Rebuild
            }
        };

        let reconcile = self
            .reconciler
            .reconcile_all(&domains, &config.records, address)
            .await;
        self.emit_batch(&reconcile);

        if let Some(purge) = &purge {
            if purge.is_clean() {
                committed = Some(self.detector.commit(&config).await?);
            } else {
                warn!(
                    "Purge incomplete ({} failure(s), {} domain(s) skipped); \
                    fingerprint not committed, next pass rebuilds again",
                    purge.failure_count(),
                    purge.skipped.len()
                );
            }
        }

        Ok(PassReport {
            pass,
            mode,
            address,
            purge,
            reconcile,
            committed,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Delete every tagged record on every configured domain
    ///
    /// Covers the selected target and every purge-only provider. The
    /// stored fingerprint is left untouched.
    pub async fn purge_all(&self) -> Result<BatchReport> {
        let _guard = self.pass_lock.lock().await;

        let config = self.store.load().await?;
        let domains = config.domain_targets()?.to_vec();
        self.check_credentials(config.target()?.as_str()).await?;

        Ok(self.purge_everywhere(&config, &domains).await)
    }

    /// Purge the selected provider's `domains`, then every other configured provider
    ///
    /// A purge-only provider whose token is rejected is left out with a
    /// warning. Any other failure on it lands in the report as a skipped
    /// domain, so the rebuild is retried.
    async fn purge_everywhere(&self, config: &DdnsuConfig, domains: &[String]) -> BatchReport {
        info!(
            "Deleting DDNSU records on {} domain(s) [{}]",
            domains.len(),
            self.reconciler.provider().provider_name()
        );
        let mut report = self.reconciler.purge_all(domains).await;

        for reconciler in &self.purge_only {
            let provider = reconciler.provider();
            let Ok(target) = provider.provider_name().parse::<Target>() else {
                warn!("No configuration section for {}", provider.provider_name());
                continue;
            };
            if config.target().ok() == Some(target) {
                continue;
            }

            let domains = config.domains_for(target);
            if domains.is_empty() {
                continue;
            }

            match provider.verify_credentials().await {
                Ok(true) => {
                    info!(
                        "Deleting DDNSU records on {} domain(s) [{}]",
                        domains.len(),
                        target
                    );
                    let other = reconciler.purge_all(domains).await;
                    report.domains.extend(other.domains);
                    report.skipped.extend(other.skipped);
                }
                Ok(false) => {
                    warn!("{} auth token is invalid; its records were not purged", target);
                }
                Err(e) if e.is_fatal() => {
                    warn!("Not purging {} records: {}", target, e);
                }
                Err(e) => {
                    warn!("Could not reach {} to purge its records: {}", target, e);
                    report
                        .skipped
                        .extend(domains.iter().map(|domain| SkippedDomain {
                            domain: domain.clone(),
                            error: format!("{target}: {e}"),
                        }));
                }
            }
        }

        self.emit_batch(&report);
        report
    }

    /// Fail unless the provider matches the target and accepts its token
    async fn check_credentials(&self, target: &str) -> Result<()> {
        let provider = self.reconciler.provider();

        if provider.provider_name() != target {
            return Err(Error::config(format!(
                "Configured target changed from {} to {}; restart required",
                provider.provider_name(),
                target
            )));
        }

        if !provider.verify_credentials().await? {
            return Err(Error::auth(format!(
                "{} auth token is invalid",
                provider.provider_name()
            )));
        }
        Ok(())
    }

    fn emit_batch(&self, batch: &BatchReport) {
        for skipped in &batch.skipped {
            self.emit_event(EngineEvent::DomainSkipped {
                domain: skipped.domain.clone(),
                error: skipped.error.clone(),
            });
        }

        for report in &batch.domains {
            for comment in &report.created {
                self.emit_event(EngineEvent::RecordCreated {
                    domain: report.domain.clone(),
                    comment: comment.clone(),
                });
            }
            for comment in &report.updated {
                self.emit_event(EngineEvent::RecordUpdated {
                    domain: report.domain.clone(),
                    comment: comment.clone(),
                });
            }
            for record_id in &report.deleted {
                self.emit_event(EngineEvent::RecordDeleted {
                    domain: report.domain.clone(),
                    record_id: record_id.clone(),
                });
            }
            for failure in &report.failures {
                self.emit_event(EngineEvent::RecordFailed {
                    domain: report.domain.clone(),
                    record: failure.record.clone(),
                    operation: failure.operation,
                    error: failure.error.clone(),
                });
            }
        }
    }

    /// Emit an engine event
    fn emit_event(&self, event: EngineEvent) {
        deliver(&self.event_tx, event);
    }
}

/// What happened to an emitted event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Sent,
    /// Channel full; the event was dropped
    Dropped,
    /// Receiver gone
    NoListener,
}

fn deliver(tx: &mpsc::Sender<EngineEvent>, event: EngineEvent) -> Delivery {
    match tx.try_send(event) {
        Ok(()) => Delivery::Sent,
        Err(TrySendError::Full(_)) => {
            warn!("Event channel full, dropping event");
            Delivery::Dropped
        }
        Err(TrySendError::Closed(_)) => Delivery::NoListener,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_event_clone_eq() {
        let event = EngineEvent::RecordCreated {
            domain: "example.com".to_string(),
            comment: "home".to_string(),
        };
        assert_eq!(event.clone(), event);
    }

    #[test]
    fn test_clean_report() {
        let report = PassReport {
            pass: 1,
            mode: PassMode::Incremental,
            address: ResolvedAddress::from(std::net::IpAddr::from([192, 0, 2, 1])),
            purge: None,
            reconcile: BatchReport::default(),
            committed: None,
            started_at: Utc::now(),
            finished_at: Utc::now(),
        };
        assert!(report.is_clean());
    }

    #[test]
    fn test_delivery_distinguishes_full_from_closed() {
        let event = EngineEvent::PassStarted { pass: 1 };
        let (tx, rx) = mpsc::channel(1);

        assert_eq!(deliver(&tx, event.clone()), Delivery::Sent);
        assert_eq!(deliver(&tx, event.clone()), Delivery::Dropped);

        drop(rx);
        assert_eq!(deliver(&tx, event), Delivery::NoListener);
    }
}
