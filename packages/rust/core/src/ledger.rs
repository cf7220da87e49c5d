//! Per-provider credit ledger.
//!
//! The ledger is the single source of truth for spend during a run. Every
//! provider call reserves its estimated cost first; the check and the
//! increment happen under one lock, so concurrent callers can never jointly
//! overshoot a provider's monthly cap.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use prospector_shared::RunLedgerEntry;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Budget limits for one provider at run start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderBudget {
    pub provider: String,
    pub monthly_cap: u64,
    /// Credits already spent this month before the run started.
    pub already_spent: u64,
    /// Denial halts intake of new companies (no fallback provider exists).
    pub critical: bool,
}

#[derive(Debug)]
struct Account {
    cap: u64,
    prior_spend: u64,
    critical: bool,
    /// Credits committed during this run.
    spent: u64,
    /// Credits reserved by in-flight calls.
    reserved: u64,
    calls: u64,
    cache_hits: u64,
    /// Set on `QuotaExceeded`; no further reservations are granted.
    exhausted: bool,
}

impl Account {
    fn committed_total(&self) -> u64 {
        self.prior_spend.saturating_add(self.spent)
    }

    fn available(&self) -> u64 {
        self.cap
            .saturating_sub(self.committed_total())
            .saturating_sub(self.reserved)
    }
}

/// A granted reservation. Must be passed to [`CreditLedger::commit`] or
/// [`CreditLedger::release`].
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a reservation must be committed or released"]
pub struct Reservation {
    provider: String,
    amount: u64,
}

impl Reservation {
    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn amount(&self) -> u64 {
        self.amount
    }
}

/// Atomic reserve/commit credit accounting across all providers.
#[derive(Debug)]
pub struct CreditLedger {
    accounts: Mutex<BTreeMap<String, Account>>,
    budget_exhausted: CancellationToken,
}

impl CreditLedger {
    pub fn new(budgets: impl IntoIterator<Item = ProviderBudget>) -> Self {
        let accounts = budgets
            .into_iter()
            .map(|b| {
                (
                    b.provider,
                    Account {
                        cap: b.monthly_cap,
                        prior_spend: b.already_spent,
                        critical: b.critical,
                        spent: 0,
                        reserved: 0,
                        calls: 0,
                        cache_hits: 0,
                        exhausted: false,
                    },
                )
            })
            .collect();
        Self {
            accounts: Mutex::new(accounts),
            budget_exhausted: CancellationToken::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Account>> {
        self.accounts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reserve `estimated` credits for one call. `None` means the call must
    /// not be issued.
    pub fn reserve(&self, provider: &str, estimated: u64) -> Option<Reservation> {
        let mut accounts = self.lock();
        let Some(account) = accounts.get_mut(provider) else {
            warn!(provider, "reservation for unknown provider denied");
            return None;
        };

        if !account.exhausted && account.available() >= estimated {
            account.reserved += estimated;
            return Some(Reservation {
                provider: provider.to_string(),
                amount: estimated,
            });
        }

        let critical = account.critical;
        let remaining = account.available();
        drop(accounts);

        warn!(provider, estimated, remaining, critical, "credit reservation denied");
        if critical {
            self.signal_budget_exhausted(provider);
        }
        None
    }

    /// Charge `actual` credits for a call that was answered.
    pub fn commit(&self, reservation: Reservation, actual: u64) {
        let mut accounts = self.lock();
        if let Some(account) = accounts.get_mut(&reservation.provider) {
            account.reserved = account.reserved.saturating_sub(reservation.amount);
            account.spent = account.spent.saturating_add(actual);
            account.calls += 1;
        }
    }

    /// Return the reservation of a call that was issued but not charged.
    pub fn release(&self, reservation: Reservation) {
        let mut accounts = self.lock();
        if let Some(account) = accounts.get_mut(&reservation.provider) {
            account.reserved = account.reserved.saturating_sub(reservation.amount);
            account.calls += 1;
        }
    }

    /// Credits left under the monthly cap (in-flight reservations excluded).
    pub fn remaining_budget(&self, provider: &str) -> u64 {
        let accounts = self.lock();
        accounts
            .get(provider)
            .map(|a| if a.exhausted { 0 } else { a.available() })
            .unwrap_or(0)
    }

    /// Stop reserving for a provider for the rest of the run.
    pub fn mark_exhausted(&self, provider: &str) {
        let mut accounts = self.lock();
        let Some(account) = accounts.get_mut(provider) else {
            return;
        };
        if account.exhausted {
            return;
        }
        account.exhausted = true;
        let critical = account.critical;
        drop(accounts);

        warn!(provider, "provider quota exceeded, no further reservations this run");
        if critical {
            self.signal_budget_exhausted(provider);
        }
    }

    pub fn is_exhausted(&self, provider: &str) -> bool {
        self.lock().get(provider).is_some_and(|a| a.exhausted)
    }

    pub fn record_cache_hit(&self, provider: &str) {
        if let Some(account) = self.lock().get_mut(provider) {
            account.cache_hits += 1;
        }
    }

    /// Token cancelled once a critical provider runs out of budget.
    pub fn budget_signal(&self) -> CancellationToken {
        self.budget_exhausted.clone()
    }

    pub fn is_budget_exhausted(&self) -> bool {
        self.budget_exhausted.is_cancelled()
    }

    fn signal_budget_exhausted(&self, provider: &str) {
        if !self.budget_exhausted.is_cancelled() {
            info!(provider, "critical provider out of budget, halting intake of new companies");
            self.budget_exhausted.cancel();
        }
    }

    /// Per-provider usage for this run, ordered by provider id.
    pub fn snapshot(&self) -> Vec<RunLedgerEntry> {
        self.lock()
            .iter()
            .map(|(provider, a)| RunLedgerEntry {
                provider: provider.clone(),
                calls_made: a.calls,
                credits_spent: a.spent,
                cache_hits: a.cache_hits,
            })
            .collect()
    }

    /// Remaining monthly budget for every provider.
    pub fn remaining_by_provider(&self) -> BTreeMap<String, u64> {
        self.lock()
            .iter()
            .map(|(provider, a)| {
                let left = if a.exhausted { 0 } else { a.available() };
                (provider.clone(), left)
            })
            .collect()
    }

    /// Credits committed during this run across all providers.
    pub fn total_spent(&self) -> u64 {
        self.lock().values().map(|a| a.spent).sum()
    }
}
