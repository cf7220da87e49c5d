//! Error types for Prospector.
//!
//! Library crates use [`ProspectorError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! [`ProviderError`] is the normalized failure of a single provider call. It
//! deliberately has no "not found" variant: a provider that has no data
//! answers with an empty result, not an error.

use std::path::PathBuf;
use std::time::Duration;

/// Top-level error type for all Prospector operations.
#[derive(Debug, thiserror::Error)]
pub enum ProspectorError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error outside of a provider call (client construction etc.).
    #[error("network error: {0}")]
    Network(String),

    /// Input or payload parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// A provider call failed in a way the caller chose to surface.
    #[error("provider {provider} failed: {source}")]
    Provider {
        provider: String,
        source: ProviderError,
    },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad input row, unknown provider id, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Record sink failure.
    #[error("sink error: {0}")]
    Sink(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ProspectorError>;

impl ProspectorError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Attach a provider id to a [`ProviderError`].
    pub fn provider(provider: impl Into<String>, source: ProviderError) -> Self {
        Self::Provider {
            provider: provider.into(),
            source,
        }
    }
}

/// Normalized failure of one provider call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    /// The provider asked us to slow down. Retryable after `retry_after`
    /// (provider hint) or after exponential backoff when no hint was given.
    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    /// The account's quota is used up. Not retryable for the rest of the run.
    #[error("quota exceeded")]
    QuotaExceeded,

    /// Timeout, connection reset, 5xx. Retryable up to a bounded count.
    #[error("transient failure: {0}")]
    Transient(String),

    /// Malformed request or unexpected schema. Never retried.
    #[error("fatal failure: {0}")]
    Fatal(String),
}

impl ProviderError {
    /// Whether the same call may be issued again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Transient(_))
    }
}
