//! Content-addressed response cache over the storage layer.
//!
//! Key = SHA-256 of `(provider id, query type, normalized params)`. Values are
//! [`ProviderResponse`]s; only answered responses (`ok`, `not_found`) are
//! stored. Storage failures degrade to cache misses.

use std::sync::Arc;
use std::time::Duration;

use prospector_providers::{ProviderResponse, QueryType};
use prospector_shared::CacheConfig;
use prospector_storage::Storage;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

const HOUR: u64 = 60 * 60;

/// Response cache handle. Cheap to share behind an `Arc`.
pub struct ResponseCache {
    storage: Option<Arc<Storage>>,
    config: CacheConfig,
}

impl ResponseCache {
    pub fn new(storage: Arc<Storage>, config: CacheConfig) -> Self {
        let storage = config.enabled.then_some(storage);
        Self { storage, config }
    }

    /// A cache that never hits and never stores.
    pub fn disabled() -> Self {
        Self {
            storage: None,
            config: CacheConfig {
                enabled: false,
                ..CacheConfig::default()
            },
        }
    }

    /// Cache key for one provider request.
    pub fn key(provider: &str, query_type: QueryType, params: &Value) -> String {
        let normalized = normalize(params);
        let mut hasher = Sha256::new();
        hasher.update(provider.as_bytes());
        hasher.update([0]);
        hasher.update(query_type.as_str().as_bytes());
        hasher.update([0]);
        // serde_json maps are ordered by key, so this is canonical.
        hasher.update(normalized.to_string().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Time-to-live for a query type.
    pub fn ttl(&self, query_type: QueryType) -> Duration {
        let hours = match query_type {
            QueryType::Company => self.config.company_ttl_hours,
            QueryType::Search => self.config.search_ttl_hours,
            QueryType::Enrich => self.config.enrich_ttl_hours,
            QueryType::Verify => self.config.verify_ttl_hours,
        };
        Duration::from_secs(hours * HOUR)
    }

    /// Look up a live entry.
    pub async fn get(&self, key: &str) -> Option<ProviderResponse> {
        let storage = self.storage.as_ref()?;
        let raw = match storage.get_cached_response(key).await {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(error = %e, "cache read failed, treating as miss");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(response) => Some(response),
            Err(e) => {
                warn!(error = %e, "undecodable cache entry, treating as miss");
                None
            }
        }
    }

    /// Store an answered response. Error responses are never cached.
    pub async fn put(
        &self,
        key: &str,
        provider: &str,
        query_type: QueryType,
        response: &ProviderResponse,
    ) {
        let Some(storage) = self.storage.as_ref() else {
            return;
        };
        if !response.status.is_answered() {
            return;
        }
        let payload = match serde_json::to_string(response) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "unserializable response, not cached");
                return;
            }
        };
        let ttl = self.ttl(query_type).as_secs() as i64;
        if let Err(e) = storage
            .put_cached_response(key, provider, query_type.as_str(), &payload, ttl)
            .await
        {
            warn!(provider, error = %e, "cache write failed");
        } else {
            debug!(provider, query_type = %query_type, "cached response");
        }
    }
}

/// Trim and lowercase every string so trivially different spellings of the
/// same query share an entry.
fn normalize(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(s.trim().to_lowercase()),
        Value::Array(items) => Value::Array(items.iter().map(normalize).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), normalize(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}
