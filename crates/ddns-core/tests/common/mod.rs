//! Test doubles and common utilities for engine contract tests
//!
//! These doubles record every call so tests can assert on call counts and
//! arguments without any network access.

#![allow(dead_code)]

use ddns_core::error::{Error, ProviderError, Result};
use ddns_core::reconciler::{Reconcile, Summary};
use ddns_core::traits::{
    DnsProvider, IpSource, IpVersion, ManagedRecord, RecordFilter, RecordUpdate, Zone,
};
use ddns_core::{ResolvedTarget, Target};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// An IpSource returning a fixed answer per family
#[derive(Clone, Default)]
pub struct StaticIpSource {
    answers: Arc<Mutex<HashMap<IpVersion, std::result::Result<String, String>>>>,
    calls: Arc<AtomicUsize>,
}

impl StaticIpSource {
    pub fn v4(address: &str) -> Self {
        let source = Self::default();
        source.set(IpVersion::V4, address);
        source
    }

    /// Change the answer for one family
    pub fn set(&self, version: IpVersion, address: &str) {
        self.answers
            .lock()
            .unwrap()
            .insert(version, Ok(address.to_string()));
    }

    /// Make discovery fail for one family
    pub fn fail(&self, version: IpVersion, message: &str) {
        self.answers
            .lock()
            .unwrap()
            .insert(version, Err(message.to_string()));
    }

    /// Number of discover() calls
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IpSource for StaticIpSource {
    async fn discover(&self, version: IpVersion) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.answers.lock().unwrap().get(&version) {
            Some(Ok(address)) => Ok(address.clone()),
            Some(Err(message)) => Err(Error::discovery(message.clone())),
            None => Err(Error::discovery(format!("no {} service answered", version))),
        }
    }

    fn source_name(&self) -> &'static str {
        "static"
    }
}

/// One recorded update_record() call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateCall {
    pub zone_id: String,
    pub record_id: String,
    pub update: RecordUpdate,
}

/// A mock DnsProvider holding zones and records in memory
#[derive(Clone, Default)]
pub struct MockDnsProvider {
    zones: Arc<Mutex<Vec<Zone>>>,
    records: Arc<Mutex<Vec<(String, ManagedRecord)>>>,
    updates: Arc<Mutex<Vec<UpdateCall>>>,
    filters: Arc<Mutex<Vec<RecordFilter>>>,
    list_zones_calls: Arc<AtomicUsize>,
    get_records_calls: Arc<AtomicUsize>,
    get_error: Arc<Mutex<Option<ProviderError>>>,
    update_error: Arc<Mutex<Option<ProviderError>>>,
}

impl MockDnsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_zone(self, id: &str, name: &str) -> Self {
        self.zones.lock().unwrap().push(Zone {
            id: id.to_string(),
            name: name.to_string(),
        });
        self
    }

    pub fn with_record(self, zone_id: &str, record: ManagedRecord) -> Self {
        self.records
            .lock()
            .unwrap()
            .push((zone_id.to_string(), record));
        self
    }

    /// Make every get_records() call fail
    pub fn fail_lookups(&self, error: ProviderError) {
        *self.get_error.lock().unwrap() = Some(error);
    }

    /// Make every update_record() call fail
    pub fn fail_updates(&self, error: ProviderError) {
        *self.update_error.lock().unwrap() = Some(error);
    }

    pub fn update_calls(&self) -> Vec<UpdateCall> {
        self.updates.lock().unwrap().clone()
    }

    pub fn update_call_count(&self) -> usize {
        self.updates.lock().unwrap().len()
    }

    pub fn filters(&self) -> Vec<RecordFilter> {
        self.filters.lock().unwrap().clone()
    }

    pub fn list_zones_call_count(&self) -> usize {
        self.list_zones_calls.load(Ordering::SeqCst)
    }

    pub fn get_records_call_count(&self) -> usize {
        self.get_records_calls.load(Ordering::SeqCst)
    }

    /// Current content of a stored record
    pub fn content_of(&self, record_id: &str) -> Option<String> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|(_, r)| r.id == record_id)
            .map(|(_, r)| r.content.clone())
    }
}

#[async_trait::async_trait]
impl DnsProvider for MockDnsProvider {
    async fn list_zones(&self) -> std::result::Result<Vec<Zone>, ProviderError> {
        self.list_zones_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.zones.lock().unwrap().clone())
    }

    async fn get_records(
        &self,
        zone_id: &str,
        filter: &RecordFilter,
    ) -> std::result::Result<Vec<ManagedRecord>, ProviderError> {
        self.get_records_calls.fetch_add(1, Ordering::SeqCst);
        self.filters.lock().unwrap().push(filter.clone());
        if let Some(error) = self.get_error.lock().unwrap().clone() {
            return Err(error);
        }

        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|(zone, _)| zone == zone_id)
            .map(|(_, record)| record)
            .filter(|r| filter.name.as_ref().is_none_or(|n| &r.name == n))
            .filter(|r| filter.record_type.as_ref().is_none_or(|t| &r.record_type == t))
            .cloned()
            .collect())
    }

    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        update: &RecordUpdate,
    ) -> std::result::Result<ManagedRecord, ProviderError> {
        self.updates.lock().unwrap().push(UpdateCall {
            zone_id: zone_id.to_string(),
            record_id: record_id.to_string(),
            update: update.clone(),
        });
        if let Some(error) = self.update_error.lock().unwrap().clone() {
            return Err(error);
        }

        let mut records = self.records.lock().unwrap();
        let (_, record) = records
            .iter_mut()
            .find(|(zone, r)| zone == zone_id && r.id == record_id)
            .ok_or_else(|| ProviderError::rejected(Some(404), "Record not found"))?;

        record.content = update.content.clone();
        if let Some(ttl) = update.ttl {
            record.ttl = ttl;
        }
        if let Some(proxied) = update.proxied {
            record.proxied = proxied;
        }
        Ok(record.clone())
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

type Responder = dyn Fn(usize) -> Result<Summary> + Send + Sync;

/// A Reconcile double whose pass results are scripted by call number
#[derive(Clone)]
pub struct ScriptedReconcile {
    responder: Arc<Responder>,
    calls: Arc<Mutex<Vec<tokio::time::Instant>>>,
    addresses: Arc<Mutex<HashMap<IpVersion, String>>>,
    check_calls: Arc<AtomicUsize>,
    cancel_after: Option<(usize, CancellationToken)>,
}

impl ScriptedReconcile {
    /// `responder` receives the 1-based call number
    pub fn new(responder: impl Fn(usize) -> Result<Summary> + Send + Sync + 'static) -> Self {
        Self {
            responder: Arc::new(responder),
            calls: Arc::new(Mutex::new(Vec::new())),
            addresses: Arc::new(Mutex::new(HashMap::new())),
            check_calls: Arc::new(AtomicUsize::new(0)),
            cancel_after: None,
        }
    }

    /// Cancel `token` once `calls` passes have run
    pub fn cancel_after(mut self, calls: usize, token: CancellationToken) -> Self {
        self.cancel_after = Some((calls, token));
        self
    }

    /// Address reported by check_addresses()
    pub fn set_address(&self, version: IpVersion, address: &str) {
        self.addresses
            .lock()
            .unwrap()
            .insert(version, address.to_string());
    }

    pub fn pass_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn check_count(&self) -> usize {
        self.check_calls.load(Ordering::SeqCst)
    }

    /// Instants at which each pass attempt started
    pub fn call_instants(&self) -> Vec<tokio::time::Instant> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Reconcile for ScriptedReconcile {
    async fn run_pass(&self, _targets: &[ResolvedTarget]) -> Result<Summary> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(tokio::time::Instant::now());
            calls.len()
        };

        let result = (self.responder)(call);

        if let Some((after, token)) = &self.cancel_after
            && call >= *after
        {
            token.cancel();
        }
        result
    }

    async fn check_addresses(&self, versions: &[IpVersion]) -> HashMap<IpVersion, String> {
        self.check_calls.fetch_add(1, Ordering::SeqCst);
        let addresses = self.addresses.lock().unwrap();
        versions
            .iter()
            .filter_map(|v| addresses.get(v).map(|a| (*v, a.clone())))
            .collect()
    }
}

/// A clean summary for one updated-nothing pass
pub fn clean_summary() -> Summary {
    Summary {
        total: 1,
        skipped: 1,
        ..Summary::default()
    }
}

pub fn http_error(status: u16) -> Error {
    Error::Provider(ProviderError::Http {
        status,
        body: String::new(),
    })
}

pub fn zone(id: &str, name: &str) -> Zone {
    Zone {
        id: id.to_string(),
        name: name.to_string(),
    }
}

pub fn resolved(target: Target, zone_id: &str) -> ResolvedTarget {
    let zone = zone(zone_id, &target.zone);
    ResolvedTarget { target, zone }
}

pub fn record(id: &str, name: &str, record_type: &str, content: &str) -> ManagedRecord {
    ManagedRecord {
        id: id.to_string(),
        name: name.to_string(),
        record_type: record_type.to_string(),
        content: content.to_string(),
        ttl: 300,
        proxied: false,
        modified_on: None,
    }
}

/// Engine config with the minimum intervals
pub fn fast_engine_config() -> ddns_core::EngineConfig {
    ddns_core::EngineConfig {
        check_interval_secs: 10,
        sync_interval_secs: 3600,
        ..ddns_core::EngineConfig::default()
    }
}
