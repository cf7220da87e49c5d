//! Shared HTTP plumbing for provider adapters.
//!
//! Centralizes status-code handling (429 with `Retry-After`, 402 quota,
//! 5xx/timeouts as transient, everything else fatal) so each adapter only
//! builds its request body and maps its own response schema.

use std::time::Duration;

use prospector_shared::{ProspectorError, ProviderError, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use url::Url;

use crate::response::ResponseStatus;

/// User-Agent string for provider requests.
const USER_AGENT: &str = concat!("Prospector/", env!("CARGO_PKG_VERSION"));

/// Longest error body kept in a `Fatal` message.
const MAX_ERROR_BODY: usize = 300;

/// Authenticated JSON client bound to one provider's base URL.
#[derive(Clone)]
pub struct ProviderHttp {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl ProviderHttp {
    /// Build a client for `base_url` with a per-request timeout.
    pub fn new(base_url: &str, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| ProspectorError::config(format!("invalid provider URL '{base_url}': {e}")))?;
        // Endpoint paths are joined relative to the base path.
        if !base_url.path().ends_with('/') {
            let with_slash = format!("{}/", base_url.path());
            base_url.set_path(&with_slash);
        }
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| {
                ProspectorError::Network(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            base_url,
            api_key: api_key.into(),
        })
    }

    /// POST a JSON body to `path` (relative, e.g. `v1/people/search`) and
    /// decode the answer.
    ///
    /// `Ok(None)` means the provider answered "no data" (404/204).
    pub async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> std::result::Result<Option<T>, ProviderError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| ProviderError::Fatal(format!("bad endpoint path '{path}': {e}")))?;

        let response = self
            .client
            .post(url.as_str())
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| classify_send_error(&url, e))?;

        let response = check_response(response).await?;
        let Some(response) = response else {
            return Ok(None);
        };

        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::Transient(format!("{url}: body read failed: {e}")))?;
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| ProviderError::Fatal(format!("{url}: unexpected response schema: {e}")))
    }
}

/// Map a transport failure. Timeouts and connection problems are transient.
fn classify_send_error(url: &Url, e: reqwest::Error) -> ProviderError {
    if e.is_builder() {
        ProviderError::Fatal(format!("{url}: {e}"))
    } else if e.is_timeout() {
        ProviderError::Transient(format!("{url}: timed out"))
    } else {
        ProviderError::Transient(format!("{url}: {e}"))
    }
}

/// Check an HTTP response for error conditions.
///
/// Returns `Some(response)` for answers with a body to decode, `None` for
/// "no data" answers.
pub async fn check_response(
    resp: reqwest::Response,
) -> std::result::Result<Option<reqwest::Response>, ProviderError> {
    let code = resp.status().as_u16();
    match ResponseStatus::from_http(code) {
        ResponseStatus::Ok => Ok(Some(resp)),
        ResponseStatus::NotFound => Ok(None),
        ResponseStatus::RateLimited => Err(ProviderError::RateLimited {
            retry_after: parse_retry_after(&resp),
        }),
        ResponseStatus::QuotaExceeded => Err(ProviderError::QuotaExceeded),
        ResponseStatus::TransientError => Err(ProviderError::Transient(format!("HTTP {code}"))),
        ResponseStatus::FatalError => {
            let body = resp.text().await.unwrap_or_default();
            let body: String = body.chars().take(MAX_ERROR_BODY).collect();
            Err(ProviderError::Fatal(format!("HTTP {code}: {body}")))
        }
    }
}

/// Parse the `Retry-After` header as whole seconds. `None` when absent or
/// not numeric, so the caller falls back to its own backoff.
fn parse_retry_after(resp: &reqwest::Response) -> Option<Duration> {
    resp.headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
