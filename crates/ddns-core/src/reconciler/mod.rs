//! Reconciler
//!
//! Compares the discovered address with the published record for every
//! target and updates only what differs.
//!
//! ## Per-target flow
//!
//! ```text
//! discover(family) ──▶ fetch record ──▶ compare ──┬─ equal ──▶ Skipped
//!        │                  │                     │
//!        ▼                  ▼                     └─ differ ──▶ update_record ──▶ Updated
//!      Failed             Failed                                    │
//!                   (never creates)                                 ▼
//!                                                                 Failed
//! ```
//!
//! A failure of one target is data in the [`Summary`]; it never aborts the
//! remaining targets and never surfaces as an `Err` from a pass.

use async_trait::async_trait;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::address;
use crate::error::{Error, ProviderError, Result};
use crate::startup::ResolvedTarget;
use crate::traits::{DnsProvider, IpSource, IpVersion, ManagedRecord, RecordFilter, RecordUpdate};

/// Result of reconciling one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The record was rewritten
    Updated {
        /// Previously published value
        old: String,
        /// Newly published value
        new: String,
    },

    /// The record already held the discovered address; nothing was written
    Skipped,

    /// The target could not be reconciled this pass
    Failed {
        /// What went wrong, with enough context to act on
        reason: String,
        /// Provider HTTP status, if the failure came from the provider
        status: Option<u16>,
    },
}

impl ReconcileOutcome {
    fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
            status: None,
        }
    }

    fn error(err: &Error) -> Self {
        Self::Failed {
            reason: err.to_string(),
            status: err.status(),
        }
    }

    fn provider_failure(context: &str, err: &ProviderError) -> Self {
        Self::Failed {
            reason: format!("{}: {}", context, err),
            status: err.status(),
        }
    }
}

/// A record rewritten during a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatedRecord {
    pub name: String,
    pub version: IpVersion,
    pub old: String,
    pub new: String,
}

/// A target that failed during a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedTarget {
    pub name: String,
    pub zone: String,
    pub reason: String,
    pub status: Option<u16>,
}

/// Outcome of one pass over all targets
///
/// Ephemeral: produced and logged once per pass, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub total: usize,
    pub updated: Vec<UpdatedRecord>,
    pub failed: Vec<FailedTarget>,
    pub skipped: usize,
    /// Addresses discovered during the pass, per family
    pub addresses: HashMap<IpVersion, String>,
}

impl Summary {
    /// Fold one target outcome into the summary
    pub fn record(&mut self, target: &ResolvedTarget, outcome: ReconcileOutcome) {
        self.total += 1;
        match outcome {
            ReconcileOutcome::Updated { old, new } => self.updated.push(UpdatedRecord {
                name: target.fqdn(),
                version: target.target.version,
                old,
                new,
            }),
            ReconcileOutcome::Skipped => self.skipped += 1,
            ReconcileOutcome::Failed { reason, status } => self.failed.push(FailedTarget {
                name: target.fqdn(),
                zone: target.zone.name.clone(),
                reason,
                status,
            }),
        }
    }

    /// First failure caused by rejected credentials, if any
    pub fn auth_failure(&self) -> Option<&FailedTarget> {
        self.failed
            .iter()
            .find(|f| matches!(f.status, Some(401 | 403)))
    }

    /// Log the summary once
    pub fn log(&self) {
        if self.failed.is_empty() {
            info!(
                total = self.total,
                updated = self.updated.len(),
                skipped = self.skipped,
                "Pass complete"
            );
        } else {
            warn!(
                total = self.total,
                updated = self.updated.len(),
                skipped = self.skipped,
                failed = self.failed.len(),
                "Pass complete with failures"
            );
        }
        for update in &self.updated {
            info!(record = %update.name, family = %update.version, "Updated {} -> {}", update.old, update.new);
        }
        for failure in &self.failed {
            warn!(zone = %failure.zone, record = %failure.name, "Failed: {}", failure.reason);
        }
    }
}

/// Pass execution as seen by the engine
///
/// The engine only needs these two operations, which keeps its retry and
/// shutdown logic testable against doubles.
#[async_trait]
pub trait Reconcile: Send + Sync {
    /// Run one pass over all targets
    ///
    /// Per-target failures are part of the returned [`Summary`]. An `Err`
    /// means the pass itself could not run.
    async fn run_pass(&self, targets: &[ResolvedTarget]) -> Result<Summary>;

    /// Cheap address check: discover each family, skipping failures
    async fn check_addresses(&self, versions: &[IpVersion]) -> HashMap<IpVersion, String>;
}

/// Discovered address per family, shared by all targets within one pass
type DiscoveryCache = HashMap<IpVersion, std::result::Result<String, String>>;

/// Reconciles targets using an IP source and a DNS provider
pub struct Reconciler {
    /// IP source for address discovery
    ip_source: Box<dyn IpSource>,

    /// DNS provider for reading and writing records
    provider: Box<dyn DnsProvider>,
}

impl Reconciler {
    /// Create a new reconciler
    pub fn new(ip_source: Box<dyn IpSource>, provider: Box<dyn DnsProvider>) -> Self {
        Self { ip_source, provider }
    }

    /// Reconcile every target in order
    ///
    /// Never fails: every problem ends up in the summary.
    pub async fn reconcile_all(&self, targets: &[ResolvedTarget]) -> Summary {
        let mut summary = Summary::default();
        let mut discovered = DiscoveryCache::new();

        for target in targets {
            let outcome = self.reconcile_target(target, &mut discovered).await;
            summary.record(target, outcome);
        }

        summary.addresses = discovered
            .into_iter()
            .filter_map(|(version, result)| result.ok().map(|address| (version, address)))
            .collect();
        summary
    }

    async fn reconcile_target(
        &self,
        target: &ResolvedTarget,
        discovered: &mut DiscoveryCache,
    ) -> ReconcileOutcome {
        let name = target.fqdn();
        let version = target.target.version;

        // Step 1: current address for the configured family
        let address = match self.discover_once(version, discovered).await {
            Ok(address) => address,
            Err(reason) => {
                warn!(zone = %target.zone.name, record = %name, family = %version, "Discovery failed: {}", reason);
                return ReconcileOutcome::failed(reason);
            }
        };

        // Step 2: the existing record; never created when missing
        let existing = match self.find_record(target).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                warn!(zone = %target.zone.name, record = %name, "Record not found, it will not be created");
                return ReconcileOutcome::error(&Error::not_found(format!(
                    "record not found in zone '{}'",
                    target.zone.name
                )));
            }
            Err(e) => {
                if e.is_auth_failure() {
                    warn!(zone = %target.zone.name, record = %name, "Record lookup rejected: check credentials");
                }
                return ReconcileOutcome::provider_failure(
                    &format!("record lookup failed for '{}'", name),
                    &e,
                );
            }
        };

        // Step 3/4: compare normalized literals
        if address::normalize(&existing.content) == address::normalize(&address) {
            debug!(record = %name, "Record already has address {}, skipping", existing.content);
            return ReconcileOutcome::Skipped;
        }

        // Step 5: rewrite, preserving name and TTL, and the proxy flag unless overridden
        let update = RecordUpdate {
            content: address.clone(),
            record_type: version.record_type().to_string(),
            name: Some(existing.name.clone()),
            ttl: Some(existing.ttl),
            proxied: Some(target.target.proxied.unwrap_or(existing.proxied)),
        };

        info!(zone = %target.zone.name, record = %name, "Updating {} -> {}", existing.content, address);
        match self
            .provider
            .update_record(&target.zone.id, &existing.id, &update)
            .await
        {
            Ok(_) => ReconcileOutcome::Updated {
                old: existing.content,
                new: address,
            },
            Err(e) => {
                warn!(zone = %target.zone.name, record = %name, "Update failed: {}", e);
                ReconcileOutcome::provider_failure(&format!("update of '{}' failed", name), &e)
            }
        }
    }

    async fn discover_once(
        &self,
        version: IpVersion,
        discovered: &mut DiscoveryCache,
    ) -> std::result::Result<String, String> {
        if let Some(cached) = discovered.get(&version) {
            return cached.clone();
        }

        let source = self.ip_source.source_name();
        let result = self
            .ip_source
            .discover(version)
            .await
            .map_err(|e| format!("{}: {}", source, e));
        discovered.insert(version, result.clone());
        result
    }

    async fn find_record(
        &self,
        target: &ResolvedTarget,
    ) -> std::result::Result<Option<ManagedRecord>, ProviderError> {
        let zone_id = &target.zone.id;

        if let Some(record_id) = &target.target.record_id {
            let records = self
                .provider
                .get_records(zone_id, &RecordFilter::default())
                .await?;
            return Ok(records.into_iter().find(|r| &r.id == record_id));
        }

        let filter = RecordFilter::exact(target.fqdn(), target.target.version.record_type());
        let records = self.provider.get_records(zone_id, &filter).await?;
        Ok(records.into_iter().next())
    }
}

#[async_trait]
impl Reconcile for Reconciler {
    async fn run_pass(&self, targets: &[ResolvedTarget]) -> Result<Summary> {
        Ok(self.reconcile_all(targets).await)
    }

    async fn check_addresses(&self, versions: &[IpVersion]) -> HashMap<IpVersion, String> {
        let mut addresses = HashMap::new();
        for &version in versions {
            match self.ip_source.discover(version).await {
                Ok(address) => {
                    addresses.insert(version, address);
                }
                Err(e) => debug!(family = %version, "Address check failed: {}", e),
            }
        }
        addresses
    }
}
