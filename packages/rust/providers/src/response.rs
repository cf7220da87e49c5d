//! Normalized provider response shape.
//!
//! Every adapter answer, whatever the provider's own schema, is reduced to a
//! [`ProviderResponse`]. This is also the value stored in the response cache,
//! so a cached `not_found` saves the same credits a cached hit does.

use std::time::Duration;

use prospector_shared::ProviderError;
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;

/// Outcome class of one provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Ok,
    RateLimited,
    QuotaExceeded,
    NotFound,
    TransientError,
    FatalError,
}

impl ResponseStatus {
    /// Map an HTTP status code onto the normalized status.
    pub fn from_http(code: u16) -> Self {
        match code {
            200..=203 | 205..=299 => Self::Ok,
            204 | 404 | 410 => Self::NotFound,
            429 => Self::RateLimited,
            402 => Self::QuotaExceeded,
            408 | 425 | 500..=599 => Self::TransientError,
            _ => Self::FatalError,
        }
    }

    /// Whether the provider actually answered (and so charges for the call).
    pub fn is_answered(&self) -> bool {
        matches!(self, Self::Ok | Self::NotFound)
    }
}

/// `{status, retry_after_seconds?, payload?}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    /// Diagnostic message for error statuses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ProviderResponse {
    /// Successful answer carrying a payload.
    pub fn ok(payload: serde_json::Value) -> Self {
        Self {
            status: ResponseStatus::Ok,
            retry_after_seconds: None,
            payload: Some(payload),
            message: None,
        }
    }

    /// The provider has no data for the query.
    pub fn not_found() -> Self {
        Self {
            status: ResponseStatus::NotFound,
            retry_after_seconds: None,
            payload: None,
            message: None,
        }
    }

    /// Normalize a typed adapter result. `Ok(None)` is `not_found`.
    pub fn from_result<T: Serialize>(
        result: &Result<Option<T>, ProviderError>,
    ) -> Result<Self, ProviderError> {
        match result {
            Ok(Some(value)) => {
                let payload = serde_json::to_value(value)
                    .map_err(|e| ProviderError::Fatal(format!("unserializable payload: {e}")))?;
                Ok(Self::ok(payload))
            }
            Ok(None) => Ok(Self::not_found()),
            Err(err) => Ok(Self::from_error(err)),
        }
    }

    /// Normalize a provider error.
    pub fn from_error(err: &ProviderError) -> Self {
        let (status, retry_after_seconds) = match err {
            ProviderError::RateLimited { retry_after } => {
                (ResponseStatus::RateLimited, retry_after.map(|d| d.as_secs()))
            }
            ProviderError::QuotaExceeded => (ResponseStatus::QuotaExceeded, None),
            ProviderError::Transient(_) => (ResponseStatus::TransientError, None),
            ProviderError::Fatal(_) => (ResponseStatus::FatalError, None),
        };
        Self {
            status,
            retry_after_seconds,
            payload: None,
            message: Some(err.to_string()),
        }
    }

    /// Back to a typed result. A payload that no longer decodes into `T` is fatal.
    pub fn into_result<T: DeserializeOwned>(self) -> Result<Option<T>, ProviderError> {
        let message = || self.message.clone().unwrap_or_default();
        match self.status {
            ResponseStatus::Ok => {
                let payload = self
                    .payload
                    .clone()
                    .ok_or_else(|| ProviderError::Fatal("ok response without payload".into()))?;
                serde_json::from_value(payload)
                    .map(Some)
                    .map_err(|e| ProviderError::Fatal(format!("unexpected payload shape: {e}")))
            }
            ResponseStatus::NotFound => Ok(None),
            ResponseStatus::RateLimited => Err(ProviderError::RateLimited {
                retry_after: self.retry_after_seconds.map(Duration::from_secs),
            }),
            ResponseStatus::QuotaExceeded => Err(ProviderError::QuotaExceeded),
            ResponseStatus::TransientError => Err(ProviderError::Transient(message())),
            ResponseStatus::FatalError => Err(ProviderError::Fatal(message())),
        }
    }
}
