//! Core DDNS engine
//!
//! The DdnsEngine is responsible for:
//! - Driving reconciliation passes on a fixed tick
//! - Retrying passes that fail for transient reasons
//! - Tracking consecutive failures and staleness
//! - Owning shutdown, whether requested or fatal
//!
//! ## Architecture
//!
//! ```text
//!   Starting ──(zone resolution fails)──────────────────────▶ ShuttingDown(fatal)
//!      │
//!      ▼
//!   Running ◀──────▶ BackoffRetry (1s, 2s, 4s; 429/5xx/transport only)
//!      │
//!      ├──(401/403)──────────────────────────────────────────▶ ShuttingDown(fatal)
//!      ├──(consecutive failures reach the ceiling)───────────▶ ShuttingDown(fatal)
//!      └──(signal)───────────────────────────────────────────▶ ShuttingDown(clean)
//! ```
//!
//! ## Tick Flow
//!
//! 1. Every check interval the engine wakes up
//! 2. A full pass runs when the sync interval has elapsed, when the previous
//!    pass left something unreconciled, or when an address check shows a new
//!    address; otherwise the tick only checks addresses
//! 3. A shutdown request is observed between passes, never in the middle of
//!    one, so no record is left half-updated
//! 4. The next tick is scheduled from the end of the current one

use chrono::Utc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::address;
use crate::config::{EngineConfig, Target};
use crate::error::{Error, Result};
use crate::reconciler::{Reconcile, Reconciler, Summary};
use crate::startup::{ResolvedTarget, resolve_targets};
use crate::state::LoopState;
use crate::traits::{DnsProvider, IpSource, IpVersion};

/// Why the engine stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Termination signal or programmatic cancellation
    Requested,
    /// Zone resolution or engine construction failed before the first pass
    StartupFailed,
    /// The provider rejected the credentials
    AuthenticationFailed,
    /// Too many consecutive failed passes
    FailureCeiling,
}

impl ShutdownReason {
    /// Process exit status for this reason
    pub fn exit_code(&self) -> u8 {
        match self {
            ShutdownReason::Requested => 0,
            ShutdownReason::StartupFailed
            | ShutdownReason::AuthenticationFailed
            | ShutdownReason::FailureCeiling => 1,
        }
    }

    /// Whether the engine stopped because of an unrecoverable error
    pub fn is_fatal(&self) -> bool {
        self.exit_code() != 0
    }
}

impl std::fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ShutdownReason::Requested => "shutdown requested",
            ShutdownReason::StartupFailed => "startup failed",
            ShutdownReason::AuthenticationFailed => "authentication failed",
            ShutdownReason::FailureCeiling => "consecutive failure ceiling reached",
        })
    }
}

/// Core DDNS engine
///
/// ## Lifecycle
///
/// 1. Resolve targets with [`resolve_targets`] (or use [`run_daemon`])
/// 2. Create with [`DdnsEngine::new()`]
/// 3. Run with [`DdnsEngine::run()`] until cancelled or a fatal condition
///
/// ## Threading
///
/// One task drives the engine. Passes, retries and provider calls all run
/// sequentially; [`LoopState`] is only ever touched from that task.
pub struct DdnsEngine {
    /// Pass executor
    reconciler: Box<dyn Reconcile>,

    /// Resolved targets, fixed for the process lifetime
    targets: Vec<ResolvedTarget>,

    /// Engine settings
    config: EngineConfig,

    /// Loop bookkeeping
    state: LoopState,
}

impl DdnsEngine {
    /// Create a new DDNS engine
    ///
    /// # Parameters
    ///
    /// - `reconciler`: pass executor (normally a [`Reconciler`])
    /// - `targets`: targets with their zones already resolved
    /// - `config`: engine configuration
    pub fn new(
        reconciler: Box<dyn Reconcile>,
        targets: Vec<ResolvedTarget>,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;
        if targets.is_empty() {
            return Err(Error::config("No targets to reconcile"));
        }

        Ok(Self {
            reconciler,
            targets,
            config,
            state: LoopState::new(Utc::now()),
        })
    }

    /// Current loop state
    pub fn state(&self) -> &LoopState {
        &self.state
    }

    /// Run until `shutdown` is cancelled or a fatal condition occurs
    ///
    /// Cancellation is cooperative: a pass in flight (including its retries)
    /// completes before the engine stops.
    pub async fn run(&mut self, shutdown: CancellationToken) -> ShutdownReason {
        info!(
            targets = self.targets.len(),
            check_interval_secs = self.config.check_interval_secs,
            sync_interval_secs = self.config.sync_interval_secs,
            "Engine started"
        );

        let versions = self.versions();
        let reason = loop {
            if shutdown.is_cancelled() {
                break ShutdownReason::Requested;
            }

            if self.pass_due(&versions).await
                && let Some(reason) = self.run_pass().await
            {
                break reason;
            }

            self.check_health();

            tokio::select! {
                _ = shutdown.cancelled() => break ShutdownReason::Requested,
                _ = tokio::time::sleep(self.config.check_interval()) => {}
            }
        };

        self.shutdown(reason)
    }

    /// Distinct address families among the targets
    fn versions(&self) -> Vec<IpVersion> {
        let mut versions: Vec<IpVersion> = Vec::new();
        for target in &self.targets {
            if !versions.contains(&target.target.version) {
                versions.push(target.target.version);
            }
        }
        versions
    }

    /// Decide whether this tick runs a full pass
    async fn pass_due(&mut self, versions: &[IpVersion]) -> bool {
        if self.state.resync {
            return true;
        }
        if self.state.sync_due(Utc::now(), self.config.sync_interval()) {
            debug!("Sync interval elapsed");
            return true;
        }

        let current = self.reconciler.check_addresses(versions).await;
        let mut changed = false;
        for (version, address) in current {
            let previous = self.state.last_addresses.insert(version, address.clone());
            let same = previous
                .as_deref()
                .is_some_and(|known| address::normalize(known) == address::normalize(&address));
            if !same {
                info!(
                    family = %version,
                    "Address changed: {} -> {}",
                    previous.as_deref().unwrap_or("unknown"),
                    address
                );
                changed = true;
            }
        }
        changed
    }

    /// Run one pass with retries and fold the result into the loop state
    ///
    /// Returns a shutdown reason when the result is fatal.
    async fn run_pass(&mut self) -> Option<ShutdownReason> {
        self.state.begin_pass(Utc::now());
        debug!(pass = self.state.passes, "Starting pass");

        let result = self.attempt_with_retry().await;
        self.handle_pass_result(result)
    }

    /// Run a pass, retrying retryable failures with doubling delays
    async fn attempt_with_retry(&self) -> Result<Summary> {
        let base = self.config.retry_base_delay();
        let mut retries: usize = 0;

        loop {
            match self.reconciler.run_pass(&self.targets).await {
                Ok(summary) => return Ok(summary),
                Err(e) if e.is_retryable() && retries < self.config.max_retries => {
                    retries += 1;
                    let delay = backoff_delay(base, retries as u32);
                    warn!(
                        "Pass attempt {} failed: {}. Retrying in {:?}",
                        retries, e, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    if retries > 0 {
                        warn!("Pass failed after {} retries", retries);
                    }
                    return Err(e);
                }
            }
        }
    }

    fn handle_pass_result(&mut self, result: Result<Summary>) -> Option<ShutdownReason> {
        match result {
            Ok(summary) => {
                summary.log();

                if let Some(auth) = summary.auth_failure() {
                    self.state.record_failure();
                    error!(
                        zone = %auth.zone,
                        record = %auth.name,
                        "Authentication failed: {}. Check the API token or email/key pair.",
                        auth.reason
                    );
                    return Some(ShutdownReason::AuthenticationFailed);
                }

                self.state.record_success(Utc::now());
                self.state.resync = !summary.failed.is_empty();
                self.state.last_addresses.extend(summary.addresses);
                None
            }
            Err(e) => {
                let failures = self.state.record_failure();
                self.state.resync = true;

                if e.is_auth_failure() {
                    error!("Authentication failed: {}. Check the API token or email/key pair.", e);
                    return Some(ShutdownReason::AuthenticationFailed);
                }

                if failures >= self.config.failure_ceiling {
                    error!(
                        "Pass failed: {}. {} consecutive failures; check the configuration and network connectivity.",
                        e, failures
                    );
                    return Some(ShutdownReason::FailureCeiling);
                }

                warn!(
                    "Pass failed ({}/{} consecutive): {}",
                    failures, self.config.failure_ceiling, e
                );
                None
            }
        }
    }

    /// Passive staleness warning; never changes state
    fn check_health(&self) {
        let now = Utc::now();
        if self.state.is_stale(now, self.config.stale_after()) {
            let since = self.state.time_since_success(now);
            warn!(
                "No successful pass for {}s (threshold {}s)",
                since.as_secs(),
                self.config.stale_after_secs
            );
        }
    }

    fn shutdown(&mut self, reason: ShutdownReason) -> ShutdownReason {
        self.state.running = false;

        let last_success = self
            .state
            .last_success
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "never".to_string());

        if reason.is_fatal() {
            error!(
                passes = self.state.passes,
                consecutive_failures = self.state.consecutive_failures,
                last_success = %last_success,
                "Engine stopped: {}",
                reason
            );
        } else {
            info!(
                passes = self.state.passes,
                consecutive_failures = self.state.consecutive_failures,
                last_success = %last_success,
                "Engine stopped: {}",
                reason
            );
        }

        reason
    }
}

/// Resolve zones, then run the engine until shutdown
///
/// This is the whole daemon lifecycle minus configuration parsing: a zone
/// that cannot be resolved stops the process before any pass runs.
pub async fn run_daemon(
    ip_source: Box<dyn IpSource>,
    provider: Box<dyn DnsProvider>,
    targets: Vec<Target>,
    config: EngineConfig,
    shutdown: CancellationToken,
) -> ShutdownReason {
    let resolved = match resolve_targets(provider.as_ref(), targets).await {
        Ok(resolved) => resolved,
        Err(e) => {
            error!("Startup failed: {}", e);
            return ShutdownReason::StartupFailed;
        }
    };

    let reconciler = Reconciler::new(ip_source, provider);
    let mut engine = match DdnsEngine::new(Box::new(reconciler), resolved, config) {
        Ok(engine) => engine,
        Err(e) => {
            error!("Startup failed: {}", e);
            return ShutdownReason::StartupFailed;
        }
    };

    engine.run(shutdown).await
}

/// Delay before retry number `retry` (1-based) with the given base
pub fn backoff_delay(base: Duration, retry: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(retry.saturating_sub(1)))
}
