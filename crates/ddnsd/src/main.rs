// # ddnsd - DDNS Daemon
//
// Thin integration layer: all reconciliation, retry and shutdown logic
// lives in ddns-core.
//
// The ddnsd daemon is responsible for:
// 1. Reading configuration from environment variables (no network access)
// 2. Initializing logging and the runtime
// 3. Building the Cloudflare provider and the HTTP IP source
// 4. Running the engine until a signal or a fatal condition
// 5. Mapping the shutdown reason to the process exit code
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### DNS Provider
// - `DDNS_PROVIDER_API_TOKEN`: Cloudflare API token (preferred)
// - `DDNS_PROVIDER_EMAIL` + `DDNS_PROVIDER_API_KEY`: legacy global key pair
//
// ### Records
// - `DDNS_TARGETS`: JSON array of `{zone, subdomain?, type?, proxied?, record_id?}`
//
// ### Engine
// - `DDNS_CHECK_INTERVAL_SECS`: address check interval (>= 10, default 60)
// - `DDNS_SYNC_INTERVAL_SECS`: full reconciliation interval (>= 10, default 300)
//
// ### Runtime
// - `DDNS_LOG_LEVEL`: trace, debug, info, warn, error (default info)
// - `DDNS_MODE`: `dry-run` reads records but never writes them (default live)
//
// ## Example
//
// ```bash
// export DDNS_PROVIDER_API_TOKEN=your_token
// export DDNS_TARGETS='[{"zone":"example.com","subdomain":"www"},{"zone":"example.com","type":"AAAA"}]'
// export DDNS_CHECK_INTERVAL_SECS=60
//
// ddnsd
// ```
//
// ## Exit codes
//
// - 0: clean shutdown (SIGTERM/SIGINT)
// - 1: configuration, startup, authentication or failure-ceiling

use anyhow::{Context, Result};
use ddns_core::{DdnsConfig, EngineConfig, ProviderConfig, ShutdownReason, Target};
use ddns_ip_http::HttpIpSource;
use ddns_provider_cloudflare::CloudflareProvider;
use std::env;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
#[derive(Debug, Clone, Copy)]
enum DdnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration, startup or fatal runtime failure
    Failure = 1,
}

impl From<DdnsExitCode> for ExitCode {
    fn from(code: DdnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

impl From<ShutdownReason> for DdnsExitCode {
    fn from(reason: ShutdownReason) -> Self {
        if reason.is_fatal() {
            DdnsExitCode::Failure
        } else {
            DdnsExitCode::CleanShutdown
        }
    }
}

/// Application configuration
#[derive(Debug)]
struct Config {
    ddns: DdnsConfig,
    log_level: String,
    dry_run: bool,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`; empty values count as unset
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let provider = ProviderConfig::Cloudflare {
            api_token: get("DDNS_PROVIDER_API_TOKEN"),
            email: get("DDNS_PROVIDER_EMAIL"),
            api_key: get("DDNS_PROVIDER_API_KEY"),
        };

        let targets_json = get("DDNS_TARGETS").context(
            "DDNS_TARGETS is required. \
            Set it via: export DDNS_TARGETS='[{\"zone\":\"example.com\",\"subdomain\":\"www\"}]'",
        )?;
        let targets: Vec<Target> = serde_json::from_str(&targets_json)
            .context("DDNS_TARGETS must be a JSON array of {zone, subdomain?, type?, proxied?, record_id?}")?;

        let defaults = EngineConfig::default();
        let engine = EngineConfig {
            check_interval_secs: parse_secs(get("DDNS_CHECK_INTERVAL_SECS"), "DDNS_CHECK_INTERVAL_SECS")?
                .unwrap_or(defaults.check_interval_secs),
            sync_interval_secs: parse_secs(get("DDNS_SYNC_INTERVAL_SECS"), "DDNS_SYNC_INTERVAL_SECS")?
                .unwrap_or(defaults.sync_interval_secs),
            ..defaults
        };

        let dry_run = match get("DDNS_MODE").map(|m| m.to_lowercase()).as_deref() {
            None | Some("live") => false,
            Some("dry-run") => true,
            Some(other) => anyhow::bail!(
                "DDNS_MODE '{}' is not valid. Valid modes: live, dry-run",
                other
            ),
        };

        Ok(Self {
            ddns: DdnsConfig {
                provider,
                targets,
                engine,
            },
            log_level: get("DDNS_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            dry_run,
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        self.ddns.validate()?;

        for target in &self.ddns.targets {
            validate_domain_name(&target.fqdn())?;
        }

        self.level()?;
        Ok(())
    }

    fn level(&self) -> Result<Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(Level::TRACE),
            "debug" => Ok(Level::DEBUG),
            "info" => Ok(Level::INFO),
            "warn" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            _ => anyhow::bail!(
                "DDNS_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }
    }
}

fn parse_secs(value: Option<String>, key: &str) -> Result<Option<u64>> {
    value
        .map(|v| {
            v.parse::<u64>()
                .with_context(|| format!("{} must be a whole number of seconds. Got: {}", key, v))
        })
        .transpose()
}

/// Validate that a string is a valid domain name
///
/// Basic RFC 1035 checks; catches common mistakes before any request is made.
fn validate_domain_name(domain: &str) -> Result<()> {
    if domain.len() > 253 {
        anyhow::bail!(
            "Domain name too long: {} chars (max 253). Got: {}",
            domain.len(),
            domain
        );
    }

    for label in domain.split('.') {
        if label.is_empty() {
            anyhow::bail!("Domain name has empty label: '{}'", domain);
        }

        if label.len() > 63 {
            anyhow::bail!(
                "Domain label too long: {} chars (max 63). Label: '{}'",
                label.len(),
                label
            );
        }

        // Underscore is allowed for service-style labels such as _acme
        if !label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            anyhow::bail!(
                "Domain label contains invalid characters. Label: '{}'. \
                Valid: alphanumeric, hyphen and underscore only.",
                label
            );
        }

        if label.starts_with('-') || label.ends_with('-') {
            anyhow::bail!(
                "Domain label cannot start or end with hyphen. Label: '{}'",
                label
            );
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    // Parse configuration; no network access happens here
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return DdnsExitCode::Failure.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return DdnsExitCode::Failure.into();
    }

    let log_level = config.level().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DdnsExitCode::Failure.into();
    }

    info!("Starting ddnsd daemon");
    info!(
        provider = config.ddns.provider.type_name(),
        targets = config.ddns.targets.len(),
        check_interval_secs = config.ddns.engine.check_interval_secs,
        sync_interval_secs = config.ddns.engine.sync_interval_secs,
        mode = if config.dry_run { "dry-run" } else { "live" },
        "Configuration loaded"
    );

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DdnsExitCode::Failure.into();
        }
    };

    rt.block_on(supervise(run(config))).into()
}

/// Run the engine on its own task so a panic maps to a failure exit
async fn supervise<F>(engine: F) -> DdnsExitCode
where
    F: Future<Output = ShutdownReason> + Send + 'static,
{
    match tokio::spawn(engine).await {
        Ok(reason) => DdnsExitCode::from(reason),
        Err(e) => {
            error!("Engine task aborted: {}", e);
            DdnsExitCode::Failure
        }
    }
}

/// Build the components and run the engine until shutdown
async fn run(config: Config) -> ShutdownReason {
    let provider = match CloudflareProvider::from_config(&config.ddns.provider, config.dry_run) {
        Ok(provider) => provider,
        Err(e) => {
            error!("Failed to create Cloudflare provider: {}", e);
            return ShutdownReason::StartupFailed;
        }
    };
    let ip_source = HttpIpSource::new();

    for target in &config.ddns.targets {
        info!(zone = %target.zone, family = %target.version, "Managing record: {}", target.fqdn());
    }

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        match wait_for_shutdown().await {
            Ok(signal) => {
                info!("Received shutdown signal: {}", signal);
                trigger.cancel();
            }
            Err(e) => warn!("Signal handling unavailable: {}", e),
        }
    });

    ddns_core::run_daemon(
        Box::new(ip_source),
        Box::new(provider),
        config.ddns.targets,
        config.ddns.engine,
        shutdown,
    )
    .await
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
