//! Test doubles and common utilities for contract tests
//!
//! The doubles keep their state behind `Arc`s so a test can hand one
//! handle to the engine and keep another for assertions
//! (`sharing_counters_with`).

#![allow(dead_code)]

use async_trait::async_trait;
use ddnsu_core::config::{CloudflareSection, DdnsuConfig, Target, VercelSection};
use ddnsu_core::error::{Error, Result};
use ddnsu_core::record::{DesiredRecord, RecordType, RemoteRecord};
use ddnsu_core::store::MemoryConfigStore;
use ddnsu_core::traits::{ConfigStore, DnsProvider, IpSource};
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const HOME: IpAddr = IpAddr::V4(std::net::Ipv4Addr::new(192, 0, 2, 10));
pub const OTHER: IpAddr = IpAddr::V4(std::net::Ipv4Addr::new(198, 51, 100, 20));
pub const HOME_V6: IpAddr = IpAddr::V6(std::net::Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1));

/// A provider call, in the order it was made
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Verify,
    List { domain: String },
    Create { domain: String, name: String, comment: String },
    Update { domain: String, id: String, name: String },
    Delete { domain: String, id: String },
}

#[derive(Default)]
struct ProviderState {
    records: HashMap<String, Vec<RemoteRecord>>,
    next_id: usize,
    failing_domains: HashSet<String>,
    failing_comments: HashSet<String>,
    failing_deletes: HashSet<String>,
    calls: Vec<Call>,
}

/// In-memory DNS provider with failure injection
pub struct MockDnsProvider {
    state: Arc<Mutex<ProviderState>>,
    credentials_valid: Arc<AtomicBool>,
    list_delay_ms: Arc<AtomicU64>,
    listing: Arc<AtomicUsize>,
    max_concurrent_listings: Arc<AtomicUsize>,
    pub name: &'static str,
}

impl MockDnsProvider {
    /// A provider that answers to the "cloudflare" target
    pub fn new() -> Self {
        Self::named("cloudflare")
    }

    pub fn named(name: &'static str) -> Self {
        Self {
            state: Arc::new(Mutex::new(ProviderState::default())),
            credentials_valid: Arc::new(AtomicBool::new(true)),
            list_delay_ms: Arc::new(AtomicU64::new(0)),
            listing: Arc::new(AtomicUsize::new(0)),
            max_concurrent_listings: Arc::new(AtomicUsize::new(0)),
            name,
        }
    }

    /// Create a new MockDnsProvider that shares state with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            state: Arc::clone(&other.state),
            credentials_valid: Arc::clone(&other.credentials_valid),
            list_delay_ms: Arc::clone(&other.list_delay_ms),
            listing: Arc::clone(&other.listing),
            max_concurrent_listings: Arc::clone(&other.max_concurrent_listings),
            name: other.name,
        }
    }

    /// Seed a record that exists before the engine runs
    pub fn seed(&self, domain: &str, name: &str, comment: Option<&str>) -> String {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("seed-{}", state.next_id);
        state
            .records
            .entry(domain.to_string())
            .or_default()
            .push(RemoteRecord {
                id: id.clone(),
                name: name.to_string(),
                record_type: "A".to_string(),
                value: "203.0.113.99".to_string(),
                ttl: Some(300),
                comment: comment.map(str::to_string),
            });
        id
    }

    pub fn records(&self, domain: &str) -> Vec<RemoteRecord> {
        self.state
            .lock()
            .unwrap()
            .records
            .get(domain)
            .cloned()
            .unwrap_or_default()
    }

    pub fn tagged(&self, domain: &str) -> Vec<RemoteRecord> {
        self.records(domain)
            .into_iter()
            .filter(|r| r.is_tagged())
            .collect()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    pub fn create_count(&self) -> usize {
        self.count(|c| matches!(c, Call::Create { .. }))
    }

    pub fn update_count(&self) -> usize {
        self.count(|c| matches!(c, Call::Update { .. }))
    }

    pub fn delete_count(&self) -> usize {
        self.count(|c| matches!(c, Call::Delete { .. }))
    }

    pub fn mutation_count(&self) -> usize {
        self.create_count() + self.update_count() + self.delete_count()
    }

    pub fn set_credentials_valid(&self, valid: bool) {
        self.credentials_valid.store(valid, Ordering::SeqCst);
    }

    pub fn fail_listing(&self, domain: &str, fail: bool) {
        let mut state = self.state.lock().unwrap();
        if fail {
            state.failing_domains.insert(domain.to_string());
        } else {
            state.failing_domains.remove(domain);
        }
    }

    pub fn fail_comment(&self, comment: &str, fail: bool) {
        let mut state = self.state.lock().unwrap();
        if fail {
            state.failing_comments.insert(comment.to_string());
        } else {
            state.failing_comments.remove(comment);
        }
    }

    pub fn fail_delete(&self, id: &str, fail: bool) {
        let mut state = self.state.lock().unwrap();
        if fail {
            state.failing_deletes.insert(id.to_string());
        } else {
            state.failing_deletes.remove(id);
        }
    }

    pub fn set_list_delay(&self, delay: Duration) {
        self.list_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn max_concurrent_listings(&self) -> usize {
        self.max_concurrent_listings.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DnsProvider for MockDnsProvider {
    async fn verify_credentials(&self) -> Result<bool> {
        self.state.lock().unwrap().calls.push(Call::Verify);
        Ok(self.credentials_valid.load(Ordering::SeqCst))
    }

    async fn list_records(&self, domain: &str) -> Result<Vec<RemoteRecord>> {
        let now = self.listing.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent_listings.fetch_max(now, Ordering::SeqCst);

        let delay = self.list_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.listing.fetch_sub(1, Ordering::SeqCst);

        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::List {
            domain: domain.to_string(),
        });
        if state.failing_domains.contains(domain) {
            return Err(Error::http(format!("listing {domain} failed")));
        }
        Ok(state.records.get(domain).cloned().unwrap_or_default())
    }

    async fn create_record(
        &self,
        domain: &str,
        record: &DesiredRecord,
        address: IpAddr,
    ) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Create {
            domain: domain.to_string(),
            name: record.name.clone(),
            comment: record.comment.clone(),
        });
        if state.failing_comments.contains(&record.comment) {
            return Err(Error::provider(self.name, "create rejected"));
        }

        state.next_id += 1;
        let id = format!("rec-{}", state.next_id);
        state
            .records
            .entry(domain.to_string())
            .or_default()
            .push(RemoteRecord {
                id: id.clone(),
                name: record.name.clone(),
                record_type: record.record_type.as_str().to_string(),
                value: address.to_string(),
                ttl: Some(record.ttl),
                comment: Some(record.tag().to_string()),
            });
        Ok(id)
    }

    async fn update_record(
        &self,
        domain: &str,
        record_id: &str,
        record: &DesiredRecord,
        address: IpAddr,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Update {
            domain: domain.to_string(),
            id: record_id.to_string(),
            name: record.name.clone(),
        });
        if state.failing_comments.contains(&record.comment) {
            return Err(Error::provider(self.name, "update rejected"));
        }

        let existing = state
            .records
            .get_mut(domain)
            .and_then(|records| records.iter_mut().find(|r| r.id == record_id))
            .ok_or_else(|| Error::not_found(record_id.to_string()))?;
        existing.name = record.name.clone();
        existing.record_type = record.record_type.as_str().to_string();
        existing.value = address.to_string();
        existing.ttl = Some(record.ttl);
        existing.comment = Some(record.tag().to_string());
        Ok(())
    }

    async fn delete_record(&self, domain: &str, record_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Delete {
            domain: domain.to_string(),
            id: record_id.to_string(),
        });
        if state.failing_deletes.contains(record_id) {
            return Err(Error::provider(self.name, "delete rejected"));
        }

        if let Some(records) = state.records.get_mut(domain) {
            records.retain(|r| r.id != record_id);
        }
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        self.name
    }
}

/// An IP source returning a fixed address, changeable from the test
pub struct StaticIpSource {
    address: Arc<Mutex<IpAddr>>,
    lookups: Arc<AtomicUsize>,
    name: String,
}

impl StaticIpSource {
    pub fn new(address: IpAddr) -> Self {
        Self {
            address: Arc::new(Mutex::new(address)),
            lookups: Arc::new(AtomicUsize::new(0)),
            name: format!("static-{address}"),
        }
    }

    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            address: Arc::clone(&other.address),
            lookups: Arc::clone(&other.lookups),
            name: other.name.clone(),
        }
    }

    pub fn set(&self, address: IpAddr) {
        *self.address.lock().unwrap() = address;
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IpSource for StaticIpSource {
    async fn lookup(&self) -> Result<IpAddr> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(*self.address.lock().unwrap())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// An IP source that always fails
pub struct FailingIpSource;

#[async_trait]
impl IpSource for FailingIpSource {
    async fn lookup(&self) -> Result<IpAddr> {
        Err(Error::http("connection refused"))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// A config store whose fingerprint writes can be made to fail
///
/// Simulates a process dying between the purge and the commit.
#[derive(Clone)]
pub struct FlakyConfigStore {
    pub inner: MemoryConfigStore,
    fail_saves: Arc<AtomicBool>,
}

impl FlakyConfigStore {
    pub fn new(inner: MemoryConfigStore) -> Self {
        Self {
            inner,
            fail_saves: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConfigStore for FlakyConfigStore {
    async fn load(&self) -> Result<DdnsuConfig> {
        self.inner.load().await
    }

    async fn save_fingerprint(&self, fingerprint: &str) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(Error::config_store("disk full"));
        }
        self.inner.save_fingerprint(fingerprint).await
    }
}

/// Helper to create a valid Cloudflare configuration
pub fn test_config(domains: &[&str], records: Vec<DesiredRecord>) -> DdnsuConfig {
    let mut config = DdnsuConfig::new(Target::Cloudflare, 50);
    config.cloudflare = Some(CloudflareSection {
        auth_token: Some("test-token".to_string()),
        domain_target: domains.iter().map(|d| d.to_string()).collect(),
    });
    config.records = records;
    config
}

pub fn a_record(name: &str, comment: &str) -> DesiredRecord {
    DesiredRecord::new(RecordType::A, name, 60, comment)
}

pub fn aaaa_record(name: &str, comment: &str) -> DesiredRecord {
    DesiredRecord::new(RecordType::Aaaa, name, 60, comment)
}

/// Add a `[vercel]` section listing `domains`
pub fn with_vercel(mut config: DdnsuConfig, domains: &[&str]) -> DdnsuConfig {
    config.vercel = Some(VercelSection {
        auth_token: Some("vercel-token".to_string()),
        domain_target: domains.iter().map(|d| d.to_string()).collect(),
        ..VercelSection::default()
    });
    config
}

/// Build an engine over a mock provider handle and a memory store
pub fn engine_with(
    provider: &MockDnsProvider,
    sources: Vec<Box<dyn IpSource>>,
    store: Box<dyn ConfigStore>,
) -> (
    ddnsu_core::DdnsuEngine,
    tokio::sync::mpsc::Receiver<ddnsu_core::EngineEvent>,
) {
    ddnsu_core::DdnsuEngine::new(
        ddnsu_core::IpResolver::new(sources),
        Box::new(MockDnsProvider::sharing_counters_with(provider)),
        store,
    )
}

/// Engine resolving to `address`, over `config`
pub fn simple_engine(
    provider: &MockDnsProvider,
    address: IpAddr,
    config: DdnsuConfig,
) -> (
    ddnsu_core::DdnsuEngine,
    tokio::sync::mpsc::Receiver<ddnsu_core::EngineEvent>,
    MemoryConfigStore,
) {
    let store = MemoryConfigStore::new(config);
    let (engine, rx) = engine_with(
        provider,
        vec![Box::new(StaticIpSource::new(address))],
        Box::new(store.clone()),
    );
    (engine, rx, store)
}

/// Drain every event currently buffered
pub fn drain(rx: &mut tokio::sync::mpsc::Receiver<ddnsu_core::EngineEvent>) -> Vec<ddnsu_core::EngineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
