//! In-process scripted provider for pipeline tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use prospector_providers::{Capability, IdentityEvidence, ProviderAdapter};
use prospector_shared::{
    Candidate, Channel, ChannelType, CompanyTarget, ProviderConfig, ProviderError, ProviderKind,
    SearchStrategy, Seniority,
};

type ResolveFn = Box<dyn Fn(&CompanyTarget) -> Result<Option<String>, ProviderError> + Send + Sync>;
type SearchFn =
    Box<dyn Fn(&SearchStrategy, &CompanyTarget) -> Result<Vec<Candidate>, ProviderError> + Send + Sync>;
/// Receives the 1-based call number so scripts can change behaviour mid-run.
type EnrichFn =
    Box<dyn Fn(&Candidate, ChannelType, usize) -> Result<Option<Channel>, ProviderError> + Send + Sync>;
type VerifyFn =
    Box<dyn Fn(&Candidate, &Channel) -> Result<Option<IdentityEvidence>, ProviderError> + Send + Sync>;

/// A provider whose answers are closures.
pub struct ScriptedAdapter {
    id: String,
    capabilities: Vec<Capability>,
    cost: u64,
    timeout: Duration,
    delay: Duration,
    resolve: Option<ResolveFn>,
    search: Option<SearchFn>,
    enrich: Option<EnrichFn>,
    verify: Option<VerifyFn>,
    pub resolve_calls: AtomicUsize,
    pub search_calls: AtomicUsize,
    pub enrich_calls: AtomicUsize,
    pub verify_calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl ScriptedAdapter {
    pub fn new(id: &str, capabilities: &[Capability]) -> Self {
        Self {
            id: id.into(),
            capabilities: capabilities.to_vec(),
            cost: 1,
            timeout: Duration::from_secs(5),
            delay: Duration::ZERO,
            resolve: None,
            search: None,
            enrich: None,
            verify: None,
            resolve_calls: AtomicUsize::new(0),
            search_calls: AtomicUsize::new(0),
            enrich_calls: AtomicUsize::new(0),
            verify_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_cost(mut self, cost: u64) -> Self {
        self.cost = cost;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sleep this long inside every call (to observe concurrency).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn on_resolve(
        mut self,
        f: impl Fn(&CompanyTarget) -> Result<Option<String>, ProviderError> + Send + Sync + 'static,
    ) -> Self {
        self.resolve = Some(Box::new(f));
        self
    }

    pub fn on_search(
        mut self,
        f: impl Fn(&SearchStrategy, &CompanyTarget) -> Result<Vec<Candidate>, ProviderError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.search = Some(Box::new(f));
        self
    }

    pub fn on_enrich(
        mut self,
        f: impl Fn(&Candidate, ChannelType, usize) -> Result<Option<Channel>, ProviderError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.enrich = Some(Box::new(f));
        self
    }

    pub fn on_verify(
        mut self,
        f: impl Fn(&Candidate, &Channel) -> Result<Option<IdentityEvidence>, ProviderError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.verify = Some(Box::new(f));
        self
    }

    async fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn unscripted(&self, op: &str) -> ProviderError {
        ProviderError::Fatal(format!("{} has no script for {op}", self.id))
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    fn cost_per_call(&self) -> u64 {
        self.cost
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn resolve_company(&self, target: &CompanyTarget) -> Result<Option<String>, ProviderError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        self.enter().await;
        match &self.resolve {
            Some(f) => f(target),
            None => Err(self.unscripted("resolve")),
        }
    }

    async fn search(
        &self,
        strategy: &SearchStrategy,
        target: &CompanyTarget,
    ) -> Result<Vec<Candidate>, ProviderError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.enter().await;
        match &self.search {
            Some(f) => f(strategy, target),
            None => Err(self.unscripted("search")),
        }
    }

    async fn enrich_channel(
        &self,
        candidate: &Candidate,
        _company: &CompanyTarget,
        channel_type: ChannelType,
    ) -> Result<Option<Channel>, ProviderError> {
        let n = self.enrich_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.enter().await;
        match &self.enrich {
            Some(f) => f(candidate, channel_type, n),
            None => Err(self.unscripted("enrich")),
        }
    }

    async fn verify(
        &self,
        candidate: &Candidate,
        _company: &CompanyTarget,
        channel: &Channel,
    ) -> Result<Option<IdentityEvidence>, ProviderError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        self.enter().await;
        match &self.verify {
            Some(f) => f(candidate, channel),
            None => Err(self.unscripted("verify")),
        }
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn candidate(id: &str, name: &str, title: &str, decision_maker: bool) -> Candidate {
    Candidate {
        id: id.into(),
        provider: "people".into(),
        full_name: name.into(),
        title: title.into(),
        department: None,
        is_decision_maker: decision_maker,
        seniority: Seniority::from_title(title),
        strategy: "c-level".into(),
        profile_url: None,
    }
}

pub fn channel(channel_type: ChannelType, value: &str, source: &str) -> Channel {
    Channel {
        channel_type,
        value: value.into(),
        source_provider: source.into(),
    }
}

pub fn evidence(company: &str, title: &str) -> IdentityEvidence {
    IdentityEvidence {
        current_company: Some(company.into()),
        current_title: Some(title.into()),
        channel_confirmed: None,
    }
}

pub fn provider_config(id: &str, kind: ProviderKind, monthly_cap: u64, concurrency: usize) -> ProviderConfig {
    ProviderConfig {
        id: id.into(),
        kind,
        base_url: format!("https://{id}.example.test"),
        api_key_env: "UNUSED".into(),
        cost_per_call: 1,
        monthly_cap,
        concurrency,
        timeout_secs: 5,
        critical: None,
        enabled: true,
    }
}
