// # HTTP IP Source
//
// This crate discovers the host's public address by asking address-echo
// services over HTTP.
//
// ## Architecture
//
// Each address family has its own ordered list of services. A lookup walks
// the list in order and returns the first answer that validates as an
// address of the requested family:
//
// ```text
// ipify ──(fail)──▶ icanhazip ──(fail)──▶ ifconfig.me ──(fail)──▶ Error::Discovery
//   │                   │                     │
//   └─ok──────────────┴─ok──────────────────┴─ok──▶ address
// ```
//
// There is no quorum and no retry inside a lookup; retrying a failed pass
// is the engine's job.

use ddns_core::address;
use ddns_core::traits::{IpSource, IpVersion};
use ddns_core::{Error, Result};

use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Per-request timeout for echo services
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// How a service shapes its answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    /// JSON object with an `ip` string field
    Json,
    /// Body holding only the address
    Text,
}

/// One address-echo service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EchoService {
    /// Short name used in logs and error messages
    pub name: String,
    /// URL to GET
    pub url: String,
    /// Response shape
    pub format: ResponseFormat,
}

impl EchoService {
    pub fn json(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            format: ResponseFormat::Json,
        }
    }

    pub fn text(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            format: ResponseFormat::Text,
        }
    }
}

/// Default IPv4 services, in priority order
pub fn default_v4_services() -> Vec<EchoService> {
    vec![
        EchoService::json("ipify", "https://api.ipify.org?format=json"),
        EchoService::text("icanhazip", "https://ipv4.icanhazip.com"),
        EchoService::text("ifconfig.me", "https://ifconfig.me/ip"),
    ]
}

/// Default IPv6 services, in priority order
pub fn default_v6_services() -> Vec<EchoService> {
    vec![
        EchoService::json("ipify", "https://api6.ipify.org?format=json"),
        EchoService::text("icanhazip", "https://ipv6.icanhazip.com"),
    ]
}

#[derive(Deserialize)]
struct EchoResponse {
    ip: String,
}

/// HTTP-based IP source
pub struct HttpIpSource {
    v4: Vec<EchoService>,
    v6: Vec<EchoService>,
    timeout: Duration,
    client: reqwest::Client,
}

impl HttpIpSource {
    /// Create a source using the default public services
    pub fn new() -> Self {
        Self::with_services(default_v4_services(), default_v6_services())
    }

    /// Create a source with explicit service lists
    pub fn with_services(v4: Vec<EchoService>, v6: Vec<EchoService>) -> Self {
        Self::with_timeout(v4, v6, DEFAULT_TIMEOUT)
    }

    /// Create a source with explicit service lists and request timeout
    pub fn with_timeout(v4: Vec<EchoService>, v6: Vec<EchoService>, timeout: Duration) -> Self {
        Self {
            v4,
            v6,
            timeout,
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
        }
    }

    fn services(&self, version: IpVersion) -> &[EchoService] {
        match version {
            IpVersion::V4 => &self.v4,
            IpVersion::V6 => &self.v6,
        }
    }

    /// Ask one service; the error string is the service-level diagnosis
    async fn query(
        &self,
        service: &EchoService,
        version: IpVersion,
    ) -> std::result::Result<String, String> {
        let response = self.client.get(&service.url).send().await.map_err(|e| {
            if e.is_timeout() {
                format!("timed out after {}s", self.timeout.as_secs())
            } else {
                format!("request failed: {}", e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {}", status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| format!("failed to read response: {}", e))?;

        let candidate = match service.format {
            ResponseFormat::Json => {
                serde_json::from_str::<EchoResponse>(&body)
                    .map_err(|e| format!("malformed JSON: {}", e))?
                    .ip
            }
            ResponseFormat::Text => body,
        };
        let candidate = candidate.trim();

        if !address::is_valid_for(version, candidate) {
            return Err(format!("invalid {} address '{}'", version, candidate));
        }
        Ok(candidate.to_string())
    }
}

impl Default for HttpIpSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl IpSource for HttpIpSource {
    async fn discover(&self, version: IpVersion) -> Result<String> {
        let services = self.services(version);
        if services.is_empty() {
            return Err(Error::discovery(format!(
                "No {} services configured",
                version
            )));
        }

        let mut errors = Vec::with_capacity(services.len());
        for service in services {
            match self.query(service, version).await {
                Ok(address) => {
                    debug!(service = %service.name, family = %version, "Discovered {}", address);
                    return Ok(address);
                }
                Err(reason) => {
                    warn!(service = %service.name, family = %version, "Discovery failed: {}", reason);
                    errors.push(format!("{}: {}", service.name, reason));
                }
            }
        }

        Err(Error::discovery(format!(
            "All {} services failed: {}",
            version,
            errors.join("; ")
        )))
    }

    fn source_name(&self) -> &'static str {
        "http"
    }
}
