//! Top-level run driver.
//!
//! Companies are processed in fixed-size batches. Within a batch every
//! company runs as its own task (search → enrich → verify → classify per
//! candidate); provider calls from all tasks share the per-provider worker
//! pools and the credit ledger. A budget-exhausted signal stops new batches
//! from starting but never aborts a batch in flight, so the sink always sees
//! a prefix of the input.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::future::join_all;
use prospector_providers::{ProviderAdapter, ProviderRegistry};
use prospector_shared::{
    BuyerGroupSummary, Candidate, CompanyFailure, CompanyResult, CompanyStatus, CompanyTarget,
    ContactResult, PipelineConfig, ProviderConfig, ProviderKind, Result, RunId, RunReport,
};
use prospector_storage::Storage;
use tracing::{error, info, instrument, warn};

use crate::cache::ResponseCache;
use crate::classify::classify;
use crate::enrich::ContactEnricher;
use crate::gateway::ProviderGateway;
use crate::ledger::{CreditLedger, ProviderBudget};
use crate::progress::ProgressReporter;
use crate::retry::RetryPolicy;
use crate::search::CandidateSearchEngine;
use crate::sink::RecordSink;
use crate::verify::CrossSourceVerifier;

/// The per-company stages, shared by every task of a run.
struct Stages {
    search: CandidateSearchEngine,
    enricher: ContactEnricher,
    verifier: CrossSourceVerifier,
}

impl Stages {
    async fn process_company(&self, index: usize, target: CompanyTarget) -> CompanyResult {
        let found = self.search.discover(&target).await;
        let unresolved_strategies: Vec<String> =
            found.unresolved.iter().map(|(name, _)| name.clone()).collect();

        if found.is_failed() {
            let reason = found
                .unresolved
                .iter()
                .map(|(name, why)| format!("{name}: {why}"))
                .collect::<Vec<_>>()
                .join("; ");
            warn!(company = %target.name, %reason, "company failed");
            return CompanyResult {
                index,
                target: found.target,
                status: CompanyStatus::Failed,
                failure_reason: Some(reason),
                contacts: Vec::new(),
                buyer_group: BuyerGroupSummary::from_roles(std::iter::empty()),
                unresolved_strategies,
            };
        }

        let company = found.target;
        let contacts = join_all(
            found
                .candidates
                .into_iter()
                .map(|candidate| self.process_candidate(candidate, &company)),
        )
        .await;

        let any_unresolved_channel = contacts.iter().any(|c| !c.contact.unresolved.is_empty());
        let status = if unresolved_strategies.is_empty() && !any_unresolved_channel {
            CompanyStatus::Complete
        } else {
            CompanyStatus::Partial
        };
        let buyer_group = BuyerGroupSummary::from_roles(contacts.iter().map(|c| &c.role));

        info!(
            company = %company.name,
            contacts = contacts.len(),
            status = ?status,
            "company processed"
        );

        CompanyResult {
            index,
            target: company,
            status,
            failure_reason: None,
            contacts,
            buyer_group,
            unresolved_strategies,
        }
    }

    async fn process_candidate(&self, candidate: Candidate, company: &CompanyTarget) -> ContactResult {
        let enriched = self.enricher.enrich(candidate, company).await;
        let contact = self.verifier.verify(enriched, company).await;
        let role = classify(&contact.candidate);
        ContactResult { contact, role }
    }
}

/// Running tallies for the report.
#[derive(Default)]
struct Tally {
    complete: usize,
    partial: usize,
    failures: Vec<CompanyFailure>,
}

impl Tally {
    fn record(&mut self, result: &CompanyResult) {
        match result.status {
            CompanyStatus::Complete => self.complete += 1,
            CompanyStatus::Partial => self.partial += 1,
            CompanyStatus::Failed => self.failures.push(CompanyFailure {
                company: result.target.name.clone(),
                reason: result.failure_reason.clone().unwrap_or_default(),
            }),
        }
    }
}

/// Drives whole runs over a provider registry.
pub struct Orchestrator {
    registry: ProviderRegistry,
    providers: Vec<ProviderConfig>,
    config: PipelineConfig,
    storage: Option<Arc<Storage>>,
}

impl Orchestrator {
    /// `providers` supplies caps, concurrency and criticality for the
    /// registry's adapters (matched by id).
    pub fn new(registry: ProviderRegistry, providers: &[ProviderConfig], config: PipelineConfig) -> Self {
        Self {
            registry,
            providers: providers.to_vec(),
            config,
            storage: None,
        }
    }

    /// Enable the response cache, monthly spend tracking and run history.
    pub fn with_storage(mut self, storage: Arc<Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Build the ledger, seeding each provider with this month's prior spend.
    async fn ledger(&self, month: &str) -> CreditLedger {
        let mut budgets = Vec::new();
        for adapter in self.registry.all() {
            let Some(cfg) = self.providers.iter().find(|p| p.id == adapter.id()) else {
                warn!(provider = adapter.id(), "no provider config, every reservation will be denied");
                continue;
            };
            let already_spent = match &self.storage {
                Some(storage) => match storage.get_monthly_spend(&cfg.id, month).await {
                    Ok(spent) => spent,
                    Err(e) => {
                        warn!(provider = %cfg.id, error = %e, "could not read monthly spend, assuming 0");
                        0
                    }
                },
                None => 0,
            };
            budgets.push(ProviderBudget {
                provider: cfg.id.clone(),
                monthly_cap: cfg.monthly_cap,
                already_spent,
                critical: cfg.critical.unwrap_or_else(|| self.is_sole_search_provider(cfg)),
            });
        }
        CreditLedger::new(budgets)
    }

    /// Without an explicit setting, a provider is critical when it is the only
    /// enabled people-search provider: nothing can run without it.
    fn is_sole_search_provider(&self, cfg: &ProviderConfig) -> bool {
        cfg.kind == ProviderKind::PeopleSearch
            && self
                .providers
                .iter()
                .filter(|p| p.enabled && p.kind == ProviderKind::PeopleSearch)
                .count()
                == 1
    }

    fn stages(&self, gateway: Arc<ProviderGateway>) -> Stages {
        let adapters: &[Arc<dyn ProviderAdapter>] = self.registry.all();
        Stages {
            search: CandidateSearchEngine::new(
                gateway.clone(),
                adapters,
                self.config.strategies.clone(),
                self.config.max_candidates_per_company,
            ),
            enricher: ContactEnricher::new(gateway.clone(), adapters),
            verifier: CrossSourceVerifier::new(gateway, adapters, self.config.verification.clone()),
        }
    }

    /// Process `targets` in input order, writing each company to `sink`.
    ///
    /// Individual company failures never abort the run; only a sink failure
    /// is returned as an error (after spend has been persisted).
    #[instrument(skip_all, fields(companies = targets.len(), batch_size = self.config.batch_size))]
    pub async fn run(
        &self,
        targets: Vec<CompanyTarget>,
        sink: &mut dyn RecordSink,
        progress: &dyn ProgressReporter,
    ) -> Result<RunReport> {
        let start = Instant::now();
        let started_at = Utc::now();
        let run_id = RunId::new();
        let month = prospector_storage::current_month();

        let ledger = Arc::new(self.ledger(&month).await);
        let cache = match &self.storage {
            Some(storage) => ResponseCache::new(storage.clone(), self.config.cache.clone()),
            None => ResponseCache::disabled(),
        };
        let concurrency = self.providers.iter().map(|p| (p.id.clone(), p.concurrency));
        let gateway = Arc::new(ProviderGateway::new(
            ledger.clone(),
            cache,
            concurrency,
            RetryPolicy::from(&self.config.retry),
        ));
        let stages = Arc::new(self.stages(gateway.clone()));
        let budget_signal = ledger.budget_signal();

        let total = targets.len();
        let batch_size = self.config.batch_size.max(1);
        info!(%run_id, total, batch_size, "starting run");

        let mut tally = Tally::default();
        let mut started = 0usize;
        let mut completed = 0usize;
        let mut sink_error = None;

        let indexed: Vec<(usize, CompanyTarget)> = targets.into_iter().enumerate().collect();
        for (batch_no, batch) in indexed.chunks(batch_size).enumerate() {
            if budget_signal.is_cancelled() {
                warn!(
                    batch = batch_no,
                    skipped = total - started,
                    "budget exhausted, not starting further batches"
                );
                break;
            }
            progress.batch_started(batch_no, batch.len(), completed, total);
            started += batch.len();

            let mut handles = Vec::with_capacity(batch.len());
            for (index, target) in batch.iter().cloned() {
                let stages = stages.clone();
                let name = target.name.clone();
                handles.push((
                    index,
                    target.clone(),
                    name,
                    tokio::spawn(async move { stages.process_company(index, target).await }),
                ));
            }

            // Awaited in input order.
            for (index, target, name, handle) in handles {
                let result = match handle.await {
                    Ok(result) => result,
                    Err(e) => {
                        error!(company = %name, error = %e, "company task failed");
                        CompanyResult {
                            index,
                            target,
                            status: CompanyStatus::Failed,
                            failure_reason: Some(format!("task failed: {e}")),
                            contacts: Vec::new(),
                            buyer_group: BuyerGroupSummary::from_roles(std::iter::empty()),
                            unresolved_strategies: Vec::new(),
                        }
                    }
                };
                tally.record(&result);
                completed += 1;

                if sink_error.is_none() {
                    if let Err(e) = sink.write(&result) {
                        error!(company = %name, error = %e, "sink write failed");
                        sink_error = Some(e);
                    }
                }
                progress.company_finished(&result, completed, total);
            }
        }

        if sink_error.is_none() {
            if let Err(e) = sink.finish() {
                sink_error = Some(e);
            }
        }

        let per_provider_spend = ledger.snapshot();
        let hits: u64 = per_provider_spend.iter().map(|e| e.cache_hits).sum();
        let calls: u64 = per_provider_spend.iter().map(|e| e.calls_made).sum();
        let cache_hit_rate = if hits + calls == 0 {
            0.0
        } else {
            hits as f64 / (hits + calls) as f64
        };

        let report = RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            companies_total: total,
            companies_processed: tally.complete + tally.partial,
            companies_complete: tally.complete,
            companies_partial: tally.partial,
            companies_failed: tally.failures.len(),
            companies_skipped: total - started,
            failures: tally.failures,
            budget_exhausted: ledger.is_budget_exhausted(),
            total_credits_spent: ledger.total_spent(),
            per_provider_spend,
            remaining_budget: ledger.remaining_by_provider(),
            cache_hit_rate,
            fatal_errors: gateway.fatal_errors(),
            duration_ms: start.elapsed().as_millis() as u64,
        };

        self.persist(&report, &month).await;

        info!(
            %report.run_id,
            processed = report.companies_processed,
            failed = report.companies_failed,
            skipped = report.companies_skipped,
            credits = report.total_credits_spent,
            cache_hit_rate = report.cache_hit_rate,
            duration_ms = report.duration_ms,
            "run complete"
        );
        progress.done(&report);

        match sink_error {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    async fn persist(&self, report: &RunReport, month: &str) {
        let Some(storage) = &self.storage else {
            return;
        };
        for entry in &report.per_provider_spend {
            if entry.calls_made == 0 && entry.credits_spent == 0 {
                continue;
            }
            if let Err(e) = storage
                .add_monthly_spend(&entry.provider, month, entry.credits_spent, entry.calls_made)
                .await
            {
                error!(provider = %entry.provider, error = %e, "failed to persist monthly spend");
            }
        }
        if let Err(e) = storage.insert_run(report).await {
            warn!(error = %e, "failed to store run history");
        }
    }
}
