//! Test doubles and common utilities for contract tests
//!
//! This module provides minimal test doubles that record every call the
//! engine makes, so tests can assert on counts and ordering.

#![allow(dead_code)]

use gddns_core::config::{EngineConfig, HostConfig, SchedulePolicy};
use gddns_core::engine::{ChangeApplicator, Reconciler};
use gddns_core::error::{Error, Result};
use gddns_core::traits::{
    ChangeHandle, ChangeOp, ChangeStatus, DnsProvider, IpSource, RecordSet, ZoneRef,
};
use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::fmt::MakeWriter;

/// Failure modes a test can inject into a double
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// Connection-level trouble
    Transient,
    /// Answer that could not be parsed
    Malformed,
    /// Rejected credentials
    Auth,
    /// Provider refused the change
    Precondition,
}

impl Failure {
    fn to_error(self) -> Error {
        match self {
            Failure::Transient => Error::http("connection reset by peer"),
            Failure::Malformed => Error::malformed("not an address"),
            Failure::Auth => Error::auth("403 Forbidden"),
            Failure::Precondition => Error::precondition("record does not match"),
        }
    }
}

/// An IpSource whose answer the test controls
#[derive(Clone)]
pub struct MockIpSource {
    ip: Arc<Mutex<IpAddr>>,
    failure: Arc<Mutex<Option<Failure>>>,
    calls: Arc<AtomicUsize>,
}

impl MockIpSource {
    pub fn new(ip: IpAddr) -> Self {
        Self {
            ip: Arc::new(Mutex::new(ip)),
            failure: Arc::new(Mutex::new(None)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Change the address returned from now on
    pub fn set_ip(&self, ip: IpAddr) {
        *self.ip.lock().unwrap() = ip;
    }

    /// Make every call fail (or succeed again with `None`)
    pub fn set_failure(&self, failure: Option<Failure>) {
        *self.failure.lock().unwrap() = failure;
    }

    /// Number of times current() was called
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IpSource for MockIpSource {
    async fn current(&self) -> Result<IpAddr> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = *self.failure.lock().unwrap() {
            return Err(failure.to_error());
        }
        Ok(*self.ip.lock().unwrap())
    }

    fn source_name(&self) -> &'static str {
        "mock"
    }
}

/// One call observed by the mock provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    /// Name and record type queried
    List(String, String),
    Submit(ChangeOp, RecordSet),
    Status(String),
}

/// A DnsProvider backed by an in-memory zone
///
/// Submitted changes are applied to the in-memory zone immediately, so a
/// second pass sees the result of the first. Change statuses are scripted:
/// the first queued status answers the submission, the rest answer polls,
/// and an empty queue answers `done`.
#[derive(Clone)]
pub struct MockDnsProvider {
    records: Arc<Mutex<HashMap<String, Vec<RecordSet>>>>,
    calls: Arc<Mutex<Vec<ProviderCall>>>,
    statuses: Arc<Mutex<VecDeque<ChangeStatus>>>,
    list_failure: Arc<Mutex<HashMap<String, Failure>>>,
    submit_failure: Arc<Mutex<HashMap<ChangeOp, Failure>>>,
    next_change_id: Arc<AtomicUsize>,
    ignore_type: bool,
}

impl MockDnsProvider {
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            statuses: Arc::new(Mutex::new(VecDeque::new())),
            list_failure: Arc::new(Mutex::new(HashMap::new())),
            submit_failure: Arc::new(Mutex::new(HashMap::new())),
            next_change_id: Arc::new(AtomicUsize::new(1)),
            ignore_type: false,
        }
    }

    /// Return every record set at the queried name, whatever its type
    pub fn ignoring_type_filter(mut self) -> Self {
        self.ignore_type = true;
        self
    }

    /// Seed the zone with a record returned for `query_name`
    pub fn with_record(self, query_name: &str, record: RecordSet) -> Self {
        self.records
            .lock()
            .unwrap()
            .entry(query_name.to_string())
            .or_default()
            .push(record);
        self
    }

    /// Queue change statuses (first answers submission, rest answer polls)
    pub fn with_statuses(self, statuses: impl IntoIterator<Item = ChangeStatus>) -> Self {
        self.statuses.lock().unwrap().extend(statuses);
        self
    }

    /// Fail list_records for `name`
    pub fn fail_list(&self, name: &str, failure: Failure) {
        self.list_failure
            .lock()
            .unwrap()
            .insert(name.to_string(), failure);
    }

    /// Fail submissions of `op`
    pub fn fail_submit(&self, op: ChangeOp, failure: Failure) {
        self.submit_failure.lock().unwrap().insert(op, failure);
    }

    /// Every call, in order
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Only the submissions, in order
    pub fn mutations(&self) -> Vec<(ChangeOp, RecordSet)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ProviderCall::Submit(op, record) => Some((op, record)),
                _ => None,
            })
            .collect()
    }

    /// Names passed to list_records, in order
    pub fn listed_names(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ProviderCall::List(name, _) => Some(name),
                _ => None,
            })
            .collect()
    }

    /// Record types passed to list_records, in order
    pub fn listed_types(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ProviderCall::List(_, record_type) => Some(record_type),
                _ => None,
            })
            .collect()
    }

    /// Number of change_status calls
    pub fn status_poll_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, ProviderCall::Status(_)))
            .count()
    }

    /// Current in-memory records for `name`
    pub fn records_for(&self, name: &str) -> Vec<RecordSet> {
        self.records
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    fn next_status(&self) -> ChangeStatus {
        self.statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ChangeStatus::Done)
    }
}

#[async_trait::async_trait]
impl DnsProvider for MockDnsProvider {
    async fn list_records(
        &self,
        _zone: &ZoneRef,
        name: &str,
        record_type: &str,
    ) -> Result<Vec<RecordSet>> {
        self.calls
            .lock()
            .unwrap()
            .push(ProviderCall::List(name.to_string(), record_type.to_string()));

        if let Some(failure) = self.list_failure.lock().unwrap().get(name) {
            return Err(failure.to_error());
        }

        Ok(self
            .records_for(name)
            .into_iter()
            .filter(|record| self.ignore_type || record.record_type == record_type)
            .collect())
    }

    async fn submit_change(
        &self,
        _zone: &ZoneRef,
        record: &RecordSet,
        op: ChangeOp,
    ) -> Result<ChangeHandle> {
        self.calls
            .lock()
            .unwrap()
            .push(ProviderCall::Submit(op, record.clone()));

        if let Some(failure) = self.submit_failure.lock().unwrap().get(&op) {
            return Err(failure.to_error());
        }

        {
            let mut records = self.records.lock().unwrap();
            let entry = records.entry(record.name.clone()).or_default();
            match op {
                ChangeOp::Create => entry.push(record.clone()),
                ChangeOp::Delete => entry.retain(|existing| existing != record),
            }
        }

        let id = self.next_change_id.fetch_add(1, Ordering::SeqCst);
        Ok(ChangeHandle {
            id: id.to_string(),
            status: self.next_status(),
        })
    }

    async fn change_status(&self, _zone: &ZoneRef, change_id: &str) -> Result<ChangeStatus> {
        self.calls
            .lock()
            .unwrap()
            .push(ProviderCall::Status(change_id.to_string()));
        Ok(self.next_status())
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

pub const POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Engine settings used across tests
pub fn engine_config(schedule: SchedulePolicy) -> EngineConfig {
    EngineConfig {
        poll_interval: POLL_INTERVAL,
        max_polls: None,
        schedule,
    }
}

/// A valid host entry in the test zone
pub fn host(name: &str) -> HostConfig {
    HostConfig::new("test-project", "test-zone", "example.com.", name)
        .with_ttl(300)
        .with_interval(60)
}

/// An address record as the provider would hold it
pub fn a_record(name: &str, ip: [u8; 4]) -> RecordSet {
    RecordSet::address(name, 300, IpAddr::from(ip))
}

/// A TXT record at `name`
pub fn txt_record(name: &str, text: &str) -> RecordSet {
    RecordSet {
        name: name.to_string(),
        record_type: "TXT".to_string(),
        ttl: 300,
        rrdatas: vec![format!("\"{}\"", text)],
    }
}

/// Reconciler wired to the given doubles
pub fn reconciler(
    ip_source: &MockIpSource,
    provider: &MockDnsProvider,
    shutdown: CancellationToken,
) -> Reconciler {
    let applicator = ChangeApplicator::new(&engine_config(SchedulePolicy::PerHost), shutdown);
    Reconciler::new(
        Box::new(ip_source.clone()),
        Box::new(provider.clone()),
        applicator,
    )
}

/// Collects formatted log output for assertions
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    /// Install as the thread's subscriber at INFO until the guard drops
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    /// Captured lines at ERROR level
    pub fn error_lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.0.lock().unwrap())
            .lines()
            .filter(|line| line.contains("ERROR"))
            .map(str::to_string)
            .collect()
    }
}

impl std::io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
