// # IP Source Trait
//
// Defines the interface for discovering the host's current public address.
//
// ## Implementations
//
// - HTTP address-echo services: `ddns-ip-http` crate
//
// ## Usage
//
// ```rust,ignore
// use ddns_core::{IpSource, IpVersion};
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let source = /* IpSource implementation */;
//
//     let v4 = source.discover(IpVersion::V4).await?;
//     println!("public IPv4: {}", v4);
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Address family of a managed record
///
/// Serialized as the DNS record type it maps to (`A` / `AAAA`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IpVersion {
    /// IPv4, published as an A record
    #[default]
    #[serde(rename = "A", alias = "a", alias = "v4")]
    V4,
    /// IPv6, published as an AAAA record
    #[serde(rename = "AAAA", alias = "aaaa", alias = "v6")]
    V6,
}

impl IpVersion {
    /// DNS record type for this family
    pub fn record_type(&self) -> &'static str {
        match self {
            IpVersion::V4 => "A",
            IpVersion::V6 => "AAAA",
        }
    }
}

impl std::fmt::Display for IpVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            IpVersion::V4 => "IPv4",
            IpVersion::V6 => "IPv6",
        })
    }
}

/// Trait for IP source implementations
///
/// # Contract
///
/// - The requested family is a hard filter: `discover(V6)` must fail rather
///   than return an IPv4 literal.
/// - The returned string is a validated literal of the requested family.
/// - No retry beyond trying the next configured service; retrying a failed
///   discovery is owned by the engine.
/// - Implementations must bound every request with a timeout.
///
/// Implementations must be thread-safe and usable across async tasks.
#[async_trait]
pub trait IpSource: Send + Sync {
    /// Discover the current public address for `version`
    ///
    /// # Returns
    ///
    /// - `Ok(String)`: a valid address literal of the requested family
    /// - `Err(Error::Discovery)`: every service failed; the message lists each failure
    async fn discover(&self, version: IpVersion) -> Result<String, crate::Error>;

    /// Name used in logs
    fn source_name(&self) -> &'static str {
        "ip-source"
    }
}
