//! The single path every provider call takes.
//!
//! Order per call: cache lookup → provider worker-pool permit → credit
//! reservation → call under timeout → commit/release → cache store. Retryable
//! failures back off and go round again; the permit is not held while
//! sleeping.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use prospector_providers::{ProviderAdapter, ProviderResponse, QueryType};
use prospector_shared::ProviderError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Semaphore;
use tracing::{debug, error, warn};

use crate::cache::ResponseCache;
use crate::ledger::CreditLedger;
use crate::retry::RetryPolicy;

/// Result of one logical provider request after retries.
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome<T> {
    /// The provider returned data.
    Hit(T),
    /// The provider answered that it has no data.
    NotFound,
    /// The ledger refused the reservation; the call was never issued.
    Denied,
    /// The call was issued and failed.
    Failed(CallFailure),
}

/// Why an issued call produced no answer.
#[derive(Debug, Clone, PartialEq)]
pub enum CallFailure {
    QuotaExceeded,
    /// Rate limiting / transient errors outlasted the retry budget.
    RetriesExhausted(ProviderError),
    Fatal(String),
}

impl std::fmt::Display for CallFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::QuotaExceeded => f.write_str("quota exceeded"),
            Self::RetriesExhausted(err) => write!(f, "retries exhausted: {err}"),
            Self::Fatal(msg) => write!(f, "fatal: {msg}"),
        }
    }
}

impl<T> CallOutcome<T> {
    /// Short label for logs and unresolved reasons.
    pub fn describe(&self) -> String {
        match self {
            Self::Hit(_) => "hit".into(),
            Self::NotFound => "not found".into(),
            Self::Denied => "budget denied".into(),
            Self::Failed(failure) => failure.to_string(),
        }
    }
}

/// Shared provider-call gateway: worker pools, ledger, cache and retries.
pub struct ProviderGateway {
    ledger: Arc<CreditLedger>,
    cache: ResponseCache,
    pools: HashMap<String, Arc<Semaphore>>,
    retry: RetryPolicy,
    fatal_errors: AtomicU64,
}

impl ProviderGateway {
    /// `concurrency` maps provider id → maximum in-flight calls.
    pub fn new(
        ledger: Arc<CreditLedger>,
        cache: ResponseCache,
        concurrency: impl IntoIterator<Item = (String, usize)>,
        retry: RetryPolicy,
    ) -> Self {
        let pools = concurrency
            .into_iter()
            .map(|(id, n)| (id, Arc::new(Semaphore::new(n.max(1)))))
            .collect();
        Self {
            ledger,
            cache,
            pools,
            retry,
            fatal_errors: AtomicU64::new(0),
        }
    }

    pub fn ledger(&self) -> &Arc<CreditLedger> {
        &self.ledger
    }

    /// Fatal provider errors seen so far.
    pub fn fatal_errors(&self) -> u64 {
        self.fatal_errors.load(Ordering::Relaxed)
    }

    fn pool(&self, provider: &str) -> Arc<Semaphore> {
        self.pools
            .get(provider)
            .cloned()
            .unwrap_or_else(|| Arc::new(Semaphore::new(1)))
    }

    /// Issue one logical request.
    ///
    /// `params` identifies the request for caching; `op` performs it and may
    /// be invoked several times. `Ok(None)` from `op` is "not found".
    pub async fn call<T, F, Fut>(
        &self,
        adapter: &dyn ProviderAdapter,
        query_type: QueryType,
        params: serde_json::Value,
        op: F,
    ) -> CallOutcome<T>
    where
        T: Serialize + DeserializeOwned,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<Option<T>, ProviderError>>,
    {
        let provider = adapter.id();
        let key = ResponseCache::key(provider, query_type, &params);

        if let Some(cached) = self.cache.get(&key).await {
            match cached.into_result::<T>() {
                Ok(Some(value)) => {
                    self.ledger.record_cache_hit(provider);
                    debug!(provider, query_type = %query_type, "cache hit");
                    return CallOutcome::Hit(value);
                }
                Ok(None) => {
                    self.ledger.record_cache_hit(provider);
                    debug!(provider, query_type = %query_type, "cache hit (not found)");
                    return CallOutcome::NotFound;
                }
                Err(e) => {
                    warn!(provider, error = %e, "stale cache entry shape, refetching");
                }
            }
        }

        if self.ledger.is_exhausted(provider) {
            return CallOutcome::Failed(CallFailure::QuotaExceeded);
        }

        let pool = self.pool(provider);
        let cost = adapter.cost_per_call();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            let result = {
                let Ok(_permit) = pool.acquire().await else {
                    return CallOutcome::Failed(CallFailure::Fatal("worker pool closed".into()));
                };
                let Some(reservation) = self.ledger.reserve(provider, cost) else {
                    return CallOutcome::Denied;
                };

                let result = match tokio::time::timeout(adapter.timeout(), op()).await {
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::Transient(format!(
                        "no answer within {:?}",
                        adapter.timeout()
                    ))),
                };

                match &result {
                    Ok(_) => self.ledger.commit(reservation, cost),
                    Err(_) => self.ledger.release(reservation),
                }
                result
            };

            match result {
                Ok(answer) => {
                    match ProviderResponse::from_result(&Ok::<_, ProviderError>(answer.as_ref())) {
                        Ok(response) => {
                            self.cache.put(&key, provider, query_type, &response).await;
                        }
                        Err(e) => warn!(provider, error = %e, "response not cacheable"),
                    }
                    return match answer {
                        Some(value) => CallOutcome::Hit(value),
                        None => CallOutcome::NotFound,
                    };
                }
                Err(ProviderError::QuotaExceeded) => {
                    self.ledger.mark_exhausted(provider);
                    return CallOutcome::Failed(CallFailure::QuotaExceeded);
                }
                Err(ProviderError::Fatal(message)) => {
                    self.fatal_errors.fetch_add(1, Ordering::Relaxed);
                    error!(provider, query_type = %query_type, %params, error = %message, "fatal provider error");
                    return CallOutcome::Failed(CallFailure::Fatal(message));
                }
                Err(err) => {
                    if !self.retry.should_retry(attempt, &err) {
                        warn!(provider, query_type = %query_type, attempt, error = %err, "giving up after retries");
                        return CallOutcome::Failed(CallFailure::RetriesExhausted(err));
                    }
                    let delay = self.retry.delay_after(attempt, &err);
                    debug!(provider, attempt, ?delay, error = %err, "retrying provider call");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use crate::ledger::ProviderBudget;
    use crate::testing::ScriptedAdapter;
    use prospector_providers::Capability;
    use prospector_storage::Storage;
    use serde_json::json;
    use uuid::Uuid;

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            multiplier: 2.0,
        }
    }

    fn gateway_with(cap: u64, cache: ResponseCache) -> ProviderGateway {
        let ledger = Arc::new(CreditLedger::new([ProviderBudget {
            provider: "p".into(),
            monthly_cap: cap,
            already_spent: 0,
            critical: false,
        }]));
        ProviderGateway::new(ledger, cache, [("p".to_string(), 2)], fast_retry())
    }

    fn adapter() -> ScriptedAdapter {
        ScriptedAdapter::new("p", &[Capability::Search]).with_cost(2)
    }

    #[tokio::test]
    async fn hit_commits_cost() {
        let gw = gateway_with(10, ResponseCache::disabled());
        let out = gw
            .call(&adapter(), QueryType::Search, json!({}), move || async move {
                Ok::<_, ProviderError>(Some(5u32))
            })
            .await;
        assert_eq!(out, CallOutcome::Hit(5));
        assert_eq!(gw.ledger().total_spent(), 2);
    }

    #[tokio::test]
    async fn not_found_is_charged() {
        let gw = gateway_with(10, ResponseCache::disabled());
        let out: CallOutcome<u32> = gw
            .call(&adapter(), QueryType::Search, json!({}), move || async move { Ok(None) })
            .await;
        assert_eq!(out, CallOutcome::NotFound);
        assert_eq!(gw.ledger().total_spent(), 2);
    }

    #[tokio::test]
    async fn transient_errors_retry_then_succeed() {
        let gw = gateway_with(10, ResponseCache::disabled());
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let out = gw
            .call(&adapter(), QueryType::Search, json!({}), move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(ProviderError::Transient("reset".into()))
                } else {
                    Ok(Some("ok".to_string()))
                }
            })
            .await;
        assert_eq!(out, CallOutcome::Hit("ok".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Failed attempts are released, only the answer is charged.
        assert_eq!(gw.ledger().total_spent(), 2);
        assert_eq!(gw.ledger().snapshot()[0].calls_made, 3);
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let gw = gateway_with(10, ResponseCache::disabled());
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let out: CallOutcome<u32> = gw
            .call(&adapter(), QueryType::Search, json!({}), move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ProviderError::RateLimited { retry_after: None })
            })
            .await;
        assert!(matches!(
            out,
            CallOutcome::Failed(CallFailure::RetriesExhausted(_))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(gw.ledger().total_spent(), 0);
    }

    #[tokio::test]
    async fn fatal_is_not_retried_and_counted() {
        let gw = gateway_with(10, ResponseCache::disabled());
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let out: CallOutcome<u32> = gw
            .call(&adapter(), QueryType::Search, json!({}), move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ProviderError::Fatal("bad schema".into()))
            })
            .await;
        assert_eq!(out, CallOutcome::Failed(CallFailure::Fatal("bad schema".into())));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(gw.fatal_errors(), 1);
    }

    #[tokio::test]
    async fn quota_exceeded_stops_future_calls() {
        let gw = gateway_with(10, ResponseCache::disabled());
        let out: CallOutcome<u32> = gw
            .call(&adapter(), QueryType::Enrich, json!({"n": 1}), move || async move {
                Err(ProviderError::QuotaExceeded)
            })
            .await;
        assert_eq!(out, CallOutcome::Failed(CallFailure::QuotaExceeded));

        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let out: CallOutcome<u32> = gw
            .call(&adapter(), QueryType::Enrich, json!({"n": 2}), move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Some(1))
            })
            .await;
        assert_eq!(out, CallOutcome::Failed(CallFailure::QuotaExceeded));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn denied_when_over_budget() {
        let gw = gateway_with(1, ResponseCache::disabled());
        let out: CallOutcome<u32> = gw
            .call(&adapter(), QueryType::Search, json!({}), move || async move { Ok(Some(1)) })
            .await;
        assert_eq!(out, CallOutcome::Denied);
    }

    #[tokio::test]
    async fn timeout_is_transient() {
        let gw = gateway_with(10, ResponseCache::disabled());
        let slow = adapter().with_timeout(Duration::from_millis(10));
        let out: CallOutcome<u32> = gw
            .call(&slow, QueryType::Search, json!({}), move || async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(Some(1))
            })
            .await;
        assert!(matches!(
            out,
            CallOutcome::Failed(CallFailure::RetriesExhausted(ProviderError::Transient(_)))
        ));
    }

    #[tokio::test]
    async fn cached_answers_are_free() {
        let tmp = std::env::temp_dir().join(format!("prospector_gw_{}.db", Uuid::now_v7()));
        let storage = Arc::new(Storage::open(&tmp).await.unwrap());
        let gw = gateway_with(10, ResponseCache::new(storage, Default::default()));

        let counter = AtomicUsize::new(0);
        let calls = &counter;
        for _ in 0..3 {
            let out = gw
                .call(&adapter(), QueryType::Search, json!({"q": "acme"}), move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ProviderError>(Some(vec!["jane".to_string()]))
                })
                .await;
            assert_eq!(out, CallOutcome::Hit(vec!["jane".to_string()]));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(gw.ledger().total_spent(), 2);
        assert_eq!(gw.ledger().snapshot()[0].cache_hits, 2);
    }
}
