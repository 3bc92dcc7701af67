//! Configuration types for the DDNS system
//!
//! This module defines all configuration structures used throughout the crate.
//! Parsing never touches the network: zone names are only resolved later,
//! by [`crate::startup::resolve_targets`].

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::traits::IpVersion;

/// Smallest accepted check or sync interval
pub const MIN_INTERVAL_SECS: u64 = 10;

/// Main DDNS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DdnsConfig {
    /// DNS provider configuration
    pub provider: ProviderConfig,

    /// DNS records to keep in sync
    pub targets: Vec<Target>,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl DdnsConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.targets.is_empty() {
            return Err(crate::Error::config("No targets configured"));
        }

        for target in &self.targets {
            target.validate()?;
        }

        self.provider.validate()?;
        self.engine.validate()?;

        Ok(())
    }
}

/// DNS provider configuration
///
/// `Debug` output never contains secrets.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Cloudflare provider
    ///
    /// Either `api_token`, or both `email` and `api_key`, must be present.
    /// The token wins when both forms are given.
    Cloudflare {
        /// Scoped API token (bearer)
        #[serde(default)]
        api_token: Option<String>,
        /// Account email for the legacy global key
        #[serde(default)]
        email: Option<String>,
        /// Legacy global API key
        #[serde(default)]
        api_key: Option<String>,
    },
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |secret: &Option<String>| secret.as_ref().map(|_| "<REDACTED>");
        match self {
            ProviderConfig::Cloudflare {
                api_token,
                email,
                api_key,
            } => f
                .debug_struct("Cloudflare")
                .field("api_token", &redact(api_token))
                .field("email", email)
                .field("api_key", &redact(api_key))
                .finish(),
        }
    }
}

impl ProviderConfig {
    /// Cloudflare provider authenticated with a bearer token
    pub fn cloudflare_token(token: impl Into<String>) -> Self {
        ProviderConfig::Cloudflare {
            api_token: Some(token.into()),
            email: None,
            api_key: None,
        }
    }

    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ProviderConfig::Cloudflare {
                api_token,
                email,
                api_key,
            } => {
                let has_token = api_token.as_deref().is_some_and(|t| !t.is_empty());
                let has_key_pair = email.as_deref().is_some_and(|e| !e.is_empty())
                    && api_key.as_deref().is_some_and(|k| !k.is_empty());

                if !has_token && !has_key_pair {
                    return Err(crate::Error::config(
                        "Cloudflare credentials missing: set an API token, or both email and API key",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the provider type name
    pub fn type_name(&self) -> &str {
        match self {
            ProviderConfig::Cloudflare { .. } => "cloudflare",
        }
    }
}

/// One record the operator wants kept pointed at the current address
///
/// The address family is fixed here; it is never inferred from a
/// discovered address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// Zone (domain) the record lives in, e.g. `example.com`
    pub zone: String,

    /// Label below the zone; empty, `@` or absent means the apex
    #[serde(default)]
    pub subdomain: Option<String>,

    /// Address family / record type
    #[serde(default, rename = "type")]
    pub version: IpVersion,

    /// Proxy flag to enforce; `None` keeps whatever the record has
    #[serde(default)]
    pub proxied: Option<bool>,

    /// Provider record identifier; skips the name lookup when set
    #[serde(default)]
    pub record_id: Option<String>,
}

impl Target {
    /// Create a target for the zone apex
    pub fn new(zone: impl Into<String>) -> Self {
        Self {
            zone: zone.into(),
            subdomain: None,
            version: IpVersion::V4,
            proxied: None,
            record_id: None,
        }
    }

    /// Set the subdomain label
    pub fn with_subdomain(mut self, subdomain: impl Into<String>) -> Self {
        self.subdomain = Some(subdomain.into());
        self
    }

    /// Set the address family
    pub fn with_version(mut self, version: IpVersion) -> Self {
        self.version = version;
        self
    }

    /// Enforce a proxy flag
    pub fn with_proxied(mut self, proxied: bool) -> Self {
        self.proxied = Some(proxied);
        self
    }

    /// Pin the provider record identifier
    pub fn with_record_id(mut self, record_id: impl Into<String>) -> Self {
        self.record_id = Some(record_id.into());
        self
    }

    /// Fully-qualified record name
    pub fn fqdn(&self) -> String {
        match self.subdomain.as_deref().map(str::trim) {
            None | Some("") | Some("@") => self.zone.clone(),
            Some(label) => format!("{}.{}", label, self.zone),
        }
    }

    /// Validate the target
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.zone.trim().is_empty() {
            return Err(crate::Error::config("Target zone cannot be empty"));
        }
        if !self.zone.contains('.') {
            return Err(crate::Error::config(format!(
                "Target zone '{}' is not a domain name",
                self.zone
            )));
        }
        if let Some(sub) = &self.subdomain
            && sub.ends_with('.')
        {
            return Err(crate::Error::config(format!(
                "Target subdomain '{}' must be a label relative to '{}'",
                sub, self.zone
            )));
        }
        Ok(())
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Interval between address checks (in seconds)
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,

    /// Maximum interval between full reconciliation passes (in seconds)
    ///
    /// A pass also runs early whenever an address check sees a new address.
    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,

    /// Retries after the first failed attempt of a pass
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// First retry delay (in seconds); doubles on every retry
    #[serde(default = "default_retry_base_delay_secs")]
    pub retry_base_delay_secs: u64,

    /// Consecutive failed passes that shut the engine down
    #[serde(default = "default_failure_ceiling")]
    pub failure_ceiling: u32,

    /// Time without a successful pass before health warnings (in seconds)
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
}

impl EngineConfig {
    /// Validate the engine configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.check_interval_secs < MIN_INTERVAL_SECS {
            return Err(crate::Error::config(format!(
                "Check interval must be at least {}s, got {}s",
                MIN_INTERVAL_SECS, self.check_interval_secs
            )));
        }
        if self.sync_interval_secs < MIN_INTERVAL_SECS {
            return Err(crate::Error::config(format!(
                "Sync interval must be at least {}s, got {}s",
                MIN_INTERVAL_SECS, self.sync_interval_secs
            )));
        }
        if self.failure_ceiling == 0 {
            return Err(crate::Error::config("Failure ceiling must be > 0"));
        }
        Ok(())
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_secs(self.retry_base_delay_secs)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval_secs(),
            sync_interval_secs: default_sync_interval_secs(),
            max_retries: default_max_retries(),
            retry_base_delay_secs: default_retry_base_delay_secs(),
            failure_ceiling: default_failure_ceiling(),
            stale_after_secs: default_stale_after_secs(),
        }
    }
}

fn default_check_interval_secs() -> u64 {
    60
}

fn default_sync_interval_secs() -> u64 {
    300
}

fn default_max_retries() -> usize {
    3
}

fn default_retry_base_delay_secs() -> u64 {
    1
}

fn default_failure_ceiling() -> u32 {
    10
}

fn default_stale_after_secs() -> u64 {
    3600
}
