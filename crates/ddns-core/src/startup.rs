//! Startup zone resolution
//!
//! Second phase of startup: configuration has already been parsed without
//! network access, and here each target's zone name is matched against the
//! zones visible to the provider credentials. The result is fixed for the
//! life of the process.

use tracing::{debug, error, info};

use crate::config::Target;
use crate::error::{Error, Result};
use crate::traits::{DnsProvider, Zone};

/// A target paired with its provider zone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    /// Operator-declared target
    pub target: Target,
    /// Zone the target's record lives in
    pub zone: Zone,
}

impl ResolvedTarget {
    /// Fully-qualified record name
    pub fn fqdn(&self) -> String {
        self.target.fqdn()
    }
}

/// Pair every target with its zone
///
/// Zone names are compared case-insensitively and without a trailing dot.
/// Any unresolvable zone fails the whole startup: the engine never runs
/// with a partial target list.
pub async fn resolve_targets(
    provider: &dyn DnsProvider,
    targets: Vec<Target>,
) -> Result<Vec<ResolvedTarget>> {
    let zones = provider.list_zones().await.map_err(|e| {
        if e.is_auth_failure() {
            error!(
                "Zone listing rejected by {}: check the API token or key pair",
                provider.provider_name()
            );
        }
        Error::from(e)
    })?;
    debug!("Provider {} returned {} zone(s)", provider.provider_name(), zones.len());

    let mut resolved = Vec::with_capacity(targets.len());
    for target in targets {
        let wanted = canonical(&target.zone);
        let zone = zones
            .iter()
            .find(|zone| canonical(&zone.name) == wanted)
            .cloned()
            .ok_or_else(|| {
                Error::config(format!(
                    "Zone '{}' not found in account ({} zone(s) visible)",
                    target.zone,
                    zones.len()
                ))
            })?;

        info!(zone = %zone.name, zone_id = %zone.id, record = %target.fqdn(), "Resolved target");
        resolved.push(ResolvedTarget { target, zone });
    }

    Ok(resolved)
}

fn canonical(name: &str) -> String {
    name.trim().trim_end_matches('.').to_ascii_lowercase()
}
