// # ddns-core
//
// Core library for the DDNS reconciliation daemon.
//
// ## Architecture Overview
//
// This library keeps DNS records pointed at the host's current public address:
// - **address**: Pure validation of IPv4/IPv6 literals
// - **IpSource**: Trait for discovering the current public address
// - **DnsProvider**: Trait for listing zones and reading/updating records
// - **Reconciler**: Compares discovered addresses with published records, per target
// - **DdnsEngine**: Drives passes on a timer with bounded retry and owns shutdown
// - **startup**: Resolves zone names to provider zones before the engine starts
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from implementations
// 2. **Write Avoidance**: A record is only written when its value differs
// 3. **Errors as Data**: Per-target failures are outcomes, not control flow
// 4. **Library-First**: All core functionality can be used as a library
// 5. **Stateless Restarts**: Nothing is persisted; every pass reads fresh state

pub mod address;
pub mod traits;
pub mod engine;
pub mod reconciler;
pub mod startup;
pub mod config;
pub mod error;
pub mod state;

// Re-export core types for convenience
pub use traits::{IpSource, DnsProvider, IpVersion};
pub use engine::{DdnsEngine, ShutdownReason, run_daemon};
pub use reconciler::{Reconcile, ReconcileOutcome, Reconciler, Summary};
pub use startup::{ResolvedTarget, resolve_targets};
pub use config::{DdnsConfig, EngineConfig, ProviderConfig, Target};
pub use error::{Error, ProviderError, Result};
pub use state::LoopState;
