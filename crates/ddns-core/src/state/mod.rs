// # Loop State
//
// Process-lifetime bookkeeping for the engine.
//
// ## Ownership
//
// A `LoopState` is owned by exactly one `DdnsEngine` and mutated only from
// the engine's own task. Nothing here is persisted: it starts empty on every
// process start and is dropped at exit.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;

use crate::traits::IpVersion;

/// Mutable state of the reconciliation loop
#[derive(Debug, Clone)]
pub struct LoopState {
    /// Cleared when shutdown begins
    pub running: bool,

    /// Passes attempted so far (a retried pass counts once)
    pub passes: u64,

    /// Failed passes since the last successful one
    pub consecutive_failures: u32,

    /// When the engine started
    pub started_at: DateTime<Utc>,

    /// End of the last successful pass
    pub last_success: Option<DateTime<Utc>>,

    /// Start of the last attempted pass
    pub last_attempt: Option<DateTime<Utc>>,

    /// Addresses seen by the last check, per family
    pub last_addresses: HashMap<IpVersion, String>,

    /// Set when the next tick must run a full pass regardless of the sync
    /// interval (startup, or the previous pass left something unreconciled)
    pub resync: bool,
}

impl LoopState {
    /// Fresh state at `now`
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            running: true,
            passes: 0,
            consecutive_failures: 0,
            started_at: now,
            last_success: None,
            last_attempt: None,
            last_addresses: HashMap::new(),
            resync: true,
        }
    }

    /// Mark the start of a pass
    pub fn begin_pass(&mut self, now: DateTime<Utc>) {
        self.passes += 1;
        self.last_attempt = Some(now);
    }

    /// Record a successful pass
    pub fn record_success(&mut self, now: DateTime<Utc>) {
        self.consecutive_failures = 0;
        self.last_success = Some(now);
    }

    /// Record a failed pass and return the new consecutive-failure count
    pub fn record_failure(&mut self) -> u32 {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.consecutive_failures
    }

    /// Time since the last success, or since start if there never was one
    pub fn time_since_success(&self, now: DateTime<Utc>) -> Duration {
        let reference = self.last_success.unwrap_or(self.started_at);
        (now - reference).to_std().unwrap_or(Duration::ZERO)
    }

    /// Whether the last success is older than `threshold`
    pub fn is_stale(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        self.time_since_success(now) > threshold
    }

    /// Whether a full pass is due because `interval` elapsed since the last attempt
    pub fn sync_due(&self, now: DateTime<Utc>, interval: Duration) -> bool {
        match self.last_attempt {
            None => true,
            Some(at) => (now - at).to_std().unwrap_or(Duration::ZERO) >= interval,
        }
    }
}
