// # DNS Provider Trait
//
// Defines the interface for reading and updating DNS records via provider APIs.
//
// ## Implementations
//
// - Cloudflare: `ddns-provider-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use ddns_core::traits::{DnsProvider, RecordFilter, RecordUpdate};
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let provider = /* DnsProvider implementation */;
//
//     let zones = provider.list_zones().await?;
//     let records = provider
//         .get_records(&zones[0].id, &RecordFilter::exact("www.example.com", "A"))
//         .await?;
//
//     provider
//         .update_record(&zones[0].id, &records[0].id, &RecordUpdate::content("203.0.113.7", "A"))
//         .await?;
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// A provider administrative unit for one domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    /// Provider-assigned zone identifier
    pub id: String,
    /// Domain name of the zone
    pub name: String,
}

/// The provider's current view of a DNS record
///
/// Always fetched fresh; never cached across passes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedRecord {
    /// Provider-assigned record identifier
    pub id: String,
    /// Fully-qualified record name
    pub name: String,
    /// Record type (`A`, `AAAA`, ...)
    #[serde(rename = "type")]
    pub record_type: String,
    /// Current address value
    pub content: String,
    /// Time-to-live in seconds (1 means "automatic" on some providers)
    #[serde(default)]
    pub ttl: u32,
    /// Whether traffic is routed through the provider's proxy
    #[serde(default)]
    pub proxied: bool,
    /// Last modification time, when reported
    #[serde(default)]
    pub modified_on: Option<DateTime<Utc>>,
}

/// Optional filter for record listings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    /// Exact fully-qualified name
    pub name: Option<String>,
    /// Exact record type
    pub record_type: Option<String>,
}

impl RecordFilter {
    /// Match one name and type exactly
    pub fn exact(name: impl Into<String>, record_type: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            record_type: Some(record_type.into()),
        }
    }
}

/// Partial record update
///
/// Only the fields that are set are sent; omitted optional fields keep their
/// provider-side values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordUpdate {
    /// New address value
    pub content: String,
    /// Record type
    #[serde(rename = "type")]
    pub record_type: String,
    /// Record name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Time-to-live in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
    /// Proxy flag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxied: Option<bool>,
}

impl RecordUpdate {
    /// Update carrying only content and type
    pub fn content(content: impl Into<String>, record_type: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            record_type: record_type.into(),
            name: None,
            ttl: None,
            proxied: None,
        }
    }
}

/// Trait for DNS provider implementations
///
/// # Contract
///
/// - No retry, no backoff, no caching. The engine owns every retry decision
///   and needs the raw [`ProviderError`] kind.
/// - Every request is bounded by a timeout; a timed-out call is a
///   [`ProviderError::Transport`].
/// - A reported success without a result payload is an error.
/// - Credentials are fixed at construction and never logged.
///
/// Implementations must be thread-safe and usable across async tasks.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// List every zone visible to the configured credentials
    async fn list_zones(&self) -> Result<Vec<Zone>, ProviderError>;

    /// List records in a zone, optionally filtered by exact name and type
    async fn get_records(
        &self,
        zone_id: &str,
        filter: &RecordFilter,
    ) -> Result<Vec<ManagedRecord>, ProviderError>;

    /// Apply a partial update to one record and return the provider's new view
    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        update: &RecordUpdate,
    ) -> Result<ManagedRecord, ProviderError>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}
