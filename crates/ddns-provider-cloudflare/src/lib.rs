// # Cloudflare DNS Provider
//
// This crate provides the Cloudflare API v4 implementation of
// `ddns_core::traits::DnsProvider`.
//
// ## Responsibilities
//
// - Authenticate every request (bearer token, or legacy email/key headers)
// - List zones, following `result_info` pagination
// - Read records with exact name/type filters
// - Rewrite one record with a partial body
// - Classify every response into success or one `ProviderError` kind
//
// Retry, backoff and scheduling are owned by the engine. This crate makes
// exactly the requests it is asked to make.
//
// ## Security Requirements
//
// - Credentials NEVER appear in logs or `Debug` output
// - Construction fails if no usable credential is configured
//
// ## API Reference
//
// - List Zones: GET `/zones?page=N&per_page=M`
// - List DNS Records: GET `/zones/:zone_id/dns_records?name=...&type=...`
// - Update DNS Record: PUT `/zones/:zone_id/dns_records/:record_id`
//
// Every response is wrapped in an envelope:
//
// ```json
// { "success": true, "errors": [], "messages": [], "result": ..., "result_info": {...} }
// ```

use async_trait::async_trait;
use ddns_core::config::ProviderConfig;
use ddns_core::error::ApiMessage;
use ddns_core::traits::{DnsProvider, ManagedRecord, RecordFilter, RecordUpdate, Zone};
use ddns_core::{Error, ProviderError, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Cloudflare API base URL
const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Page size for list requests
const PAGE_SIZE: u32 = 50;

/// How requests are authenticated
#[derive(Clone)]
pub enum Credentials {
    /// Scoped API token, sent as `Authorization: Bearer`
    Token(String),
    /// Global API key, sent as `X-Auth-Email` + `X-Auth-Key`
    KeyPair { email: String, key: String },
}

// Custom Debug implementation that hides secrets
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Token(_) => f.debug_tuple("Token").field(&"<REDACTED>").finish(),
            Credentials::KeyPair { email, .. } => f
                .debug_struct("KeyPair")
                .field("email", email)
                .field("key", &"<REDACTED>")
                .finish(),
        }
    }
}

impl Credentials {
    /// Pick credentials from provider configuration
    ///
    /// A non-empty token wins over a key pair.
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        match config {
            ProviderConfig::Cloudflare {
                api_token,
                email,
                api_key,
            } => {
                if let Some(token) = api_token.as_deref().filter(|t| !t.is_empty()) {
                    return Ok(Credentials::Token(token.to_string()));
                }
                match (
                    email.as_deref().filter(|e| !e.is_empty()),
                    api_key.as_deref().filter(|k| !k.is_empty()),
                ) {
                    (Some(email), Some(key)) => Ok(Credentials::KeyPair {
                        email: email.to_string(),
                        key: key.to_string(),
                    }),
                    _ => Err(Error::config(
                        "Cloudflare credentials missing: set an API token, or both email and API key",
                    )),
                }
            }
        }
    }

    fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            Credentials::Token(token) => request.bearer_auth(token),
            Credentials::KeyPair { email, key } => request
                .header("X-Auth-Email", email)
                .header("X-Auth-Key", key),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Credentials::Token(_) => "token",
            Credentials::KeyPair { .. } => "key-pair",
        }
    }
}

/// Response envelope shared by every Cloudflare v4 endpoint
#[derive(Debug, Deserialize)]
struct Envelope {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    result_info: Option<ResultInfo>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct ResultInfo {
    #[serde(default)]
    page: u32,
    #[serde(default)]
    total_pages: u32,
}

/// Cloudflare DNS provider
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the provider will:
/// - Perform all GET requests (zone listing, record lookup)
/// - Log the intended PUT payload
/// - **NOT** actually modify DNS records
pub struct CloudflareProvider {
    /// ⚠️ NEVER log this value
    credentials: Credentials,

    /// API root, overridable for tests
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Dry-run mode: if true, perform GET requests but skip PUT updates
    dry_run: bool,
}

// Custom Debug implementation that hides the credentials
impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("credentials", &self.credentials)
            .field("base_url", &self.base_url)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl CloudflareProvider {
    /// Create a provider with the default timeout
    pub fn new(credentials: Credentials, dry_run: bool) -> Result<Self> {
        Self::with_timeout(credentials, dry_run, DEFAULT_HTTP_TIMEOUT)
    }

    /// Create a provider with an explicit per-request timeout
    pub fn with_timeout(credentials: Credentials, dry_run: bool, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            credentials,
            base_url: CLOUDFLARE_API_BASE.to_string(),
            client,
            dry_run,
        })
    }

    /// Create a provider from configuration
    ///
    /// Fails immediately when no credential form is present.
    pub fn from_config(config: &ProviderConfig, dry_run: bool) -> Result<Self> {
        let credentials = Credentials::from_config(config)?;
        if dry_run {
            tracing::warn!("Cloudflare provider running in DRY-RUN mode - no changes will be made");
        }
        tracing::debug!(auth = credentials.kind(), "Cloudflare provider configured");
        Self::new(credentials, dry_run)
    }

    /// Point the provider at another API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request and classify the response
    async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> std::result::Result<(serde_json::Value, Option<ResultInfo>), ProviderError> {
        let response = self
            .credentials
            .apply(request)
            .send()
            .await
            .map_err(|e| ProviderError::transport(e.to_string(), e.is_timeout()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::transport(format!("failed to read response: {}", e), e.is_timeout()))?;

        let envelope = match serde_json::from_str::<Envelope>(&body) {
            Ok(envelope) => envelope,
            Err(_) => {
                return Err(ProviderError::Http {
                    status: status.as_u16(),
                    body,
                });
            }
        };

        if !status.is_success() || !envelope.success {
            return Err(ProviderError::ApiRejected {
                status: Some(status.as_u16()),
                errors: envelope.errors,
            });
        }

        match envelope.result {
            Some(result) if !result.is_null() => Ok((result, envelope.result_info)),
            _ => Err(ProviderError::ApiRejected {
                status: Some(status.as_u16()),
                errors: vec![ApiMessage {
                    code: 0,
                    message: "response reported success without a result".to_string(),
                }],
            }),
        }
    }

    /// Decode a classified result into the expected shape
    fn decode<T: DeserializeOwned>(
        result: serde_json::Value,
        what: &str,
    ) -> std::result::Result<T, ProviderError> {
        serde_json::from_value(result).map_err(|e| ProviderError::Http {
            status: 200,
            body: format!("unexpected {} shape: {}", what, e),
        })
    }

    /// GET every page of a list endpoint
    async fn get_all<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        what: &str,
    ) -> std::result::Result<Vec<T>, ProviderError> {
        let url = self.url(path);
        let mut items = Vec::new();
        let mut page: u32 = 1;

        loop {
            let request = self
                .client
                .get(&url)
                .query(query)
                .query(&[("page", page.to_string()), ("per_page", PAGE_SIZE.to_string())]);

            let (result, info) = self.send(request).await?;
            let batch: Vec<T> = Self::decode(result, what)?;
            let fetched = batch.len();
            items.extend(batch);

            match info {
                Some(info) if info.page.max(page) < info.total_pages && fetched > 0 => {
                    page = info.page.max(page) + 1;
                }
                _ => break,
            }
        }

        tracing::debug!("GET {} returned {} {}(s)", path, items.len(), what);
        Ok(items)
    }
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    async fn list_zones(&self) -> std::result::Result<Vec<Zone>, ProviderError> {
        self.get_all("/zones", &[], "zone").await
    }

    async fn get_records(
        &self,
        zone_id: &str,
        filter: &RecordFilter,
    ) -> std::result::Result<Vec<ManagedRecord>, ProviderError> {
        let mut query = Vec::new();
        if let Some(name) = &filter.name {
            query.push(("name", name.clone()));
        }
        if let Some(record_type) = &filter.record_type {
            query.push(("type", record_type.clone()));
        }

        self.get_all(&format!("/zones/{}/dns_records", zone_id), &query, "record")
            .await
    }

    /// Rewrite one record
    ///
    /// Only the fields present in `update` are sent; Cloudflare keeps the
    /// rest.
    ///
    /// ```http
    /// PUT /zones/:zone_id/dns_records/:record_id
    /// {
    ///   "content": "1.2.3.4",
    ///   "type": "A",
    ///   "ttl": 300
    /// }
    /// ```
    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        update: &RecordUpdate,
    ) -> std::result::Result<ManagedRecord, ProviderError> {
        let path = format!("/zones/{}/dns_records/{}", zone_id, record_id);

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send PUT request to {} with payload: {}",
                path,
                serde_json::to_string(update).unwrap_or_default()
            );
            return Ok(ManagedRecord {
                id: record_id.to_string(),
                name: update.name.clone().unwrap_or_default(),
                record_type: update.record_type.clone(),
                content: update.content.clone(),
                ttl: update.ttl.unwrap_or(1),
                proxied: update.proxied.unwrap_or(false),
                modified_on: None,
            });
        }

        let request = self.client.put(self.url(&path)).json(update);
        let (result, _) = self.send(request).await?;
        let record: ManagedRecord = Self::decode(result, "record")?;

        tracing::debug!(record = %record.name, "DNS record updated to {}", record.content);
        Ok(record)
    }

    fn provider_name(&self) -> &'static str {
        "cloudflare"
    }
}
