//! Candidate search: a handful of narrow, role-targeted queries per company.
//!
//! Strategies run sequentially for one company. Each strategy tries the
//! search providers in priority order and stops at the first one that
//! answers. Hits are deduplicated by provider-native id and trimmed to the
//! per-company candidate budget before any paid enrichment happens.

use std::collections::HashMap;
use std::sync::Arc;

use prospector_providers::{Capability, ProviderAdapter, QueryType};
use prospector_shared::{Candidate, CompanyTarget, SearchStrategy};
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use crate::gateway::{CallOutcome, ProviderGateway};

/// What the search stage produced for one company.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// The target, with its provider company id filled in when resolved.
    pub target: CompanyTarget,
    /// Deduplicated, prioritized candidates.
    pub candidates: Vec<Candidate>,
    /// Strategies no provider could answer, with the last reason.
    pub unresolved: Vec<(String, String)>,
    /// Number of strategies that applied to this company.
    pub strategies_run: usize,
}

impl SearchOutcome {
    /// Every applicable strategy failed: there is no usable search result.
    pub fn is_failed(&self) -> bool {
        self.strategies_run > 0 && self.unresolved.len() == self.strategies_run
    }
}

pub struct CandidateSearchEngine {
    gateway: Arc<ProviderGateway>,
    resolvers: Vec<Arc<dyn ProviderAdapter>>,
    searchers: Vec<Arc<dyn ProviderAdapter>>,
    strategies: Vec<SearchStrategy>,
    max_candidates: usize,
}

impl CandidateSearchEngine {
    pub fn new(
        gateway: Arc<ProviderGateway>,
        adapters: &[Arc<dyn ProviderAdapter>],
        strategies: Vec<SearchStrategy>,
        max_candidates: usize,
    ) -> Self {
        let with = |cap| {
            adapters
                .iter()
                .filter(|a| a.supports(cap))
                .cloned()
                .collect::<Vec<_>>()
        };
        Self {
            gateway,
            resolvers: with(Capability::ResolveCompany),
            searchers: with(Capability::Search),
            strategies,
            max_candidates,
        }
    }

    /// Resolve, search with every applicable strategy, dedupe and prioritize.
    #[instrument(skip_all, fields(company = %target.name))]
    pub async fn discover(&self, target: &CompanyTarget) -> SearchOutcome {
        let target = self.resolve(target).await;

        let mut found = Vec::new();
        let mut unresolved = Vec::new();
        let mut strategies_run = 0;

        for strategy in self.strategies.iter().filter(|s| s.applies_to(&target)) {
            strategies_run += 1;
            let strategy = strategy.tuned_for(&target);
            match self.run_strategy(&strategy, &target).await {
                Ok(mut hits) => found.append(&mut hits),
                Err(reason) => {
                    warn!(strategy = %strategy.name, %reason, "strategy unresolved");
                    unresolved.push((strategy.name.clone(), reason));
                }
            }
        }

        let raw = found.len();
        let mut candidates = dedupe_candidates(found);
        prioritize(&mut candidates, self.max_candidates);

        info!(
            strategies = strategies_run,
            unresolved = unresolved.len(),
            raw_hits = raw,
            candidates = candidates.len(),
            "search complete"
        );

        SearchOutcome {
            target,
            candidates,
            unresolved,
            strategies_run,
        }
    }

    /// Fill in the provider company id. Failure is not fatal: strategies
    /// still run by name/website.
    async fn resolve(&self, target: &CompanyTarget) -> CompanyTarget {
        if target.provider_company_id.is_some() {
            return target.clone();
        }
        let params = json!({"name": target.name, "domain": target.domain()});

        for adapter in &self.resolvers {
            let adapter = adapter.as_ref();
            let outcome = self
                .gateway
                .call(adapter, QueryType::Company, params.clone(), move || async move {
                    adapter.resolve_company(target).await
                })
                .await;
            match outcome {
                CallOutcome::Hit(id) => {
                    debug!(provider = adapter.id(), company_id = %id, "company resolved");
                    return target.resolved(id);
                }
                CallOutcome::NotFound => {
                    debug!(provider = adapter.id(), "company not known to provider");
                    return target.clone();
                }
                other => {
                    warn!(provider = adapter.id(), outcome = %other.describe(), "company resolution failed");
                }
            }
        }
        target.clone()
    }

    /// Run one strategy against the first search provider that answers.
    async fn run_strategy(
        &self,
        strategy: &SearchStrategy,
        target: &CompanyTarget,
    ) -> Result<Vec<Candidate>, String> {
        if self.searchers.is_empty() {
            return Err("no search provider configured".into());
        }
        // Candidates carry the strategy name, so it is part of the cache key.
        let params = json!({
            "strategy": strategy.name,
            "company_id": target.provider_company_id,
            "company": target.name,
            "domain": target.domain(),
            "departments": strategy.departments,
            "titles": strategy.titles,
            "decision_makers_only": strategy.decision_makers_only,
            "max_results": strategy.max_results,
        });

        let mut last_reason = String::new();
        for adapter in &self.searchers {
            let adapter = adapter.as_ref();
            let outcome = self
                .gateway
                .call(adapter, QueryType::Search, params.clone(), move || async move {
                    adapter
                        .search(strategy, target)
                        .await
                        .map(|hits| (!hits.is_empty()).then_some(hits))
                })
                .await;
            match outcome {
                CallOutcome::Hit(hits) => return Ok(hits),
                CallOutcome::NotFound => return Ok(Vec::new()),
                other => {
                    last_reason = format!("{}: {}", adapter.id(), other.describe());
                }
            }
        }
        Err(last_reason)
    }
}

/// Merge candidates sharing a provider-native id.
///
/// First-seen order is kept. The decision-maker flag is OR-ed across
/// duplicates, missing fields are filled from later duplicates, and the more
/// senior reading wins.
pub fn dedupe_candidates(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut merged: Vec<Candidate> = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        match index.get(&candidate.id) {
            Some(&i) => {
                let kept = &mut merged[i];
                kept.is_decision_maker |= candidate.is_decision_maker;
                if kept.department.is_none() {
                    kept.department = candidate.department;
                }
                if kept.profile_url.is_none() {
                    kept.profile_url = candidate.profile_url;
                }
                if kept.title.trim().is_empty() {
                    kept.title = candidate.title;
                }
                if candidate.seniority.rank() > kept.seniority.rank() {
                    kept.seniority = candidate.seniority;
                }
            }
            None => {
                index.insert(candidate.id.clone(), merged.len());
                merged.push(candidate);
            }
        }
    }
    merged
}

/// Decision makers first, then by seniority; keep at most `limit`.
pub fn prioritize(candidates: &mut Vec<Candidate>, limit: usize) {
    // Stable sort keeps discovery order among equals.
    candidates.sort_by(|a, b| {
        b.is_decision_maker
            .cmp(&a.is_decision_maker)
            .then_with(|| b.seniority.rank().cmp(&a.seniority.rank()))
    });
    candidates.truncate(limit);
}
