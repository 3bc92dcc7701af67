//! Error types for the DDNS system
//!
//! This module defines all error types used throughout the crate.
//!
//! Two layers exist:
//! - [`ProviderError`]: what a DNS provider call can fail with, kept as three
//!   distinguishable kinds because retry and fatality decisions depend on them
//! - [`Error`]: the crate-wide error taxonomy

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for DDNS operations
pub type Result<T> = std::result::Result<T, Error>;

/// A single error or message entry returned by a provider API envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiMessage {
    /// Provider-specific error code
    #[serde(default)]
    pub code: i64,
    /// Human readable message
    #[serde(default)]
    pub message: String,
}

impl std::fmt::Display for ApiMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// Failure of a single DNS provider request
///
/// Every provider call is classified into exactly one of these kinds
/// (or success). The kind and the optional status code drive retry and
/// shutdown decisions in the engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The provider answered with a structured envelope whose success flag
    /// was false, or which reported success without carrying a result
    #[error("API rejected request{}: {}", fmt_status(.status), join_messages(.errors))]
    ApiRejected {
        /// HTTP status of the response, if known
        status: Option<u16>,
        /// Error entries reported by the provider
        errors: Vec<ApiMessage>,
    },

    /// Non-2xx response without a structured body
    #[error("HTTP error {status}: {body}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Raw response body (may be empty)
        body: String,
    },

    /// The request never produced a response (timeout, refused, reset)
    #[error("transport error{}: {message}", timeout_suffix(.timed_out))]
    Transport {
        /// Underlying error message
        message: String,
        /// Whether the request hit its deadline
        timed_out: bool,
    },
}

fn fmt_status(status: &Option<u16>) -> String {
    status.map(|s| format!(" (status {})", s)).unwrap_or_default()
}

fn timeout_suffix(timed_out: &bool) -> &'static str {
    if *timed_out { " (timed out)" } else { "" }
}

fn join_messages(errors: &[ApiMessage]) -> String {
    if errors.is_empty() {
        return "no error details".to_string();
    }
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ProviderError {
    /// Create an API-rejected error with a single message
    pub fn rejected(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::ApiRejected {
            status,
            errors: vec![ApiMessage {
                code: 0,
                message: message.into(),
            }],
        }
    }

    /// Create a transport error
    pub fn transport(message: impl Into<String>, timed_out: bool) -> Self {
        Self::Transport {
            message: message.into(),
            timed_out,
        }
    }

    /// HTTP status code, when the failure carried one
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ApiRejected { status, .. } => *status,
            Self::Http { status, .. } => Some(*status),
            Self::Transport { .. } => None,
        }
    }

    /// Whether retrying the same request may succeed
    ///
    /// Rate limiting (429) and server errors (5xx) are retryable whatever the
    /// kind; a transport failure has no status and is always retryable.
    pub fn is_retryable(&self) -> bool {
        match self.status() {
            Some(status) => status == 429 || status >= 500,
            None => matches!(self, Self::Transport { .. }),
        }
    }

    /// Whether the provider refused our credentials (401/403)
    pub fn is_auth_failure(&self) -> bool {
        matches!(self.status(), Some(401 | 403))
    }
}

/// Core error type for the DDNS system
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or missing settings, including zones that cannot be resolved
    #[error("Configuration error: {0}")]
    Config(String),

    /// Every address-echo service failed for the requested family
    #[error("Address discovery failed: {0}")]
    Discovery(String),

    /// DNS provider request failed
    #[error("DNS provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The record a target names does not exist in its zone; never created
    #[error("{0}")]
    NotFound(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a discovery error
    pub fn discovery(msg: impl Into<String>) -> Self {
        Self::Discovery(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// HTTP status code carried by a provider failure
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Provider(e) => e.status(),
            _ => None,
        }
    }

    /// Whether the engine should retry the pass that produced this error
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Provider(e) => e.is_retryable(),
            Self::Discovery(_) => true,
            _ => false,
        }
    }

    /// Whether this error means the configured credentials are rejected
    pub fn is_auth_failure(&self) -> bool {
        match self {
            Self::Provider(e) => e.is_auth_failure(),
            _ => false,
        }
    }
}
