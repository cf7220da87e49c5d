//! Core domain types for the executive discovery pipeline.
//!
//! Lifecycle of one company through a run:
//! [`CompanyTarget`] → [`Candidate`]s → [`EnrichedContact`]s →
//! [`VerifiedContact`]s → [`ContactResult`]s (with a [`RoleAssignment`]) →
//! [`CompanyResult`] → [`SinkRecord`].

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for pipeline run identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// CompanyTarget
// ---------------------------------------------------------------------------

/// One input row: a company whose buyer group we want to discover.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyTarget {
    /// Company display name.
    pub name: String,
    /// Canonical website, if known (`acme.com` or `https://www.acme.com/`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    /// Industry hint used to pick strategies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    /// Headcount hint used to size strategy result limits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_count: Option<u32>,
    /// Provider-specific company id, set once resolution succeeds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_company_id: Option<String>,
}

impl CompanyTarget {
    /// A target with only a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            website: None,
            industry: None,
            employee_count: None,
            provider_company_id: None,
        }
    }

    /// Builder-style website setter.
    pub fn with_website(mut self, website: impl Into<String>) -> Self {
        self.website = Some(website.into());
        self
    }

    /// Copy of this target carrying a resolved provider company id.
    pub fn resolved(&self, company_id: impl Into<String>) -> Self {
        Self {
            provider_company_id: Some(company_id.into()),
            ..self.clone()
        }
    }

    /// Bare registrable host of the website (`www.` stripped, lowercase).
    pub fn domain(&self) -> Option<String> {
        let raw = self.website.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }
        let with_scheme = if raw.contains("://") {
            raw.to_string()
        } else {
            format!("https://{raw}")
        };
        let url = Url::parse(&with_scheme).ok()?;
        let host = url.host_str()?.to_lowercase();
        Some(host.trim_start_matches("www.").to_string())
    }
}

// ---------------------------------------------------------------------------
// SearchStrategy
// ---------------------------------------------------------------------------

/// A named, narrow, role-targeted search query template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchStrategy {
    /// Strategy name (e.g. `c-level`), carried on every candidate it finds.
    pub name: String,
    /// Departments to filter on (provider vocabulary, case-insensitive).
    #[serde(default)]
    pub departments: BTreeSet<String>,
    /// Title keywords/patterns to filter on.
    #[serde(default)]
    pub titles: BTreeSet<String>,
    /// Only return people the provider flags as decision makers.
    #[serde(default)]
    pub decision_makers_only: bool,
    /// Maximum number of results to request.
    pub max_results: u32,
    /// Industry hints this strategy applies to. Empty = every company.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub industries: BTreeSet<String>,
}

/// Companies below this headcount get smaller result limits.
const SMALL_COMPANY_HEADCOUNT: u32 = 50;
/// Result cap applied to small companies.
const SMALL_COMPANY_MAX_RESULTS: u32 = 5;

impl SearchStrategy {
    /// Whether this strategy should run for the given company.
    pub fn applies_to(&self, target: &CompanyTarget) -> bool {
        if self.industries.is_empty() {
            return true;
        }
        let Some(industry) = target.industry.as_deref() else {
            return false;
        };
        let industry = industry.to_lowercase();
        self.industries
            .iter()
            .any(|i| industry.contains(&i.to_lowercase()))
    }

    /// Copy of this strategy with limits tuned for the company's size hint.
    pub fn tuned_for(&self, target: &CompanyTarget) -> Self {
        let mut tuned = self.clone();
        if matches!(target.employee_count, Some(n) if n < SMALL_COMPANY_HEADCOUNT) {
            tuned.max_results = tuned.max_results.min(SMALL_COMPANY_MAX_RESULTS);
        }
        tuned
    }
}

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

/// Built-in strategy list used when the config file defines none.
pub fn default_strategies() -> Vec<SearchStrategy> {
    vec![
        SearchStrategy {
            name: "c-level".into(),
            departments: set(&["executive"]),
            titles: set(&["ceo", "cfo", "coo", "cto", "chief", "president", "founder"]),
            decision_makers_only: false,
            max_results: 10,
            industries: BTreeSet::new(),
        },
        SearchStrategy {
            name: "engineering-leadership".into(),
            departments: set(&["engineering", "it"]),
            titles: set(&["vp", "vice president", "director", "head of"]),
            decision_makers_only: false,
            max_results: 10,
            industries: BTreeSet::new(),
        },
        SearchStrategy {
            name: "product-leadership".into(),
            departments: set(&["product"]),
            titles: set(&["vp", "director", "head of", "principal"]),
            decision_makers_only: false,
            max_results: 8,
            industries: BTreeSet::new(),
        },
        SearchStrategy {
            name: "revenue-leadership".into(),
            departments: set(&["sales", "marketing", "business development"]),
            titles: set(&["vp", "director", "head of", "chief revenue"]),
            decision_makers_only: false,
            max_results: 8,
            industries: BTreeSet::new(),
        },
        SearchStrategy {
            name: "risk-and-procurement".into(),
            departments: set(&["legal", "security", "procurement", "finance"]),
            titles: set(&["counsel", "compliance", "procurement", "security", "controller"]),
            decision_makers_only: false,
            max_results: 6,
            industries: BTreeSet::new(),
        },
        SearchStrategy {
            name: "high-salary-decision-makers".into(),
            departments: BTreeSet::new(),
            titles: BTreeSet::new(),
            decision_makers_only: true,
            max_results: 10,
            industries: BTreeSet::new(),
        },
    ]
}

// ---------------------------------------------------------------------------
// Seniority
// ---------------------------------------------------------------------------

/// Management level of a person, ordered from most to least senior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Seniority {
    CLevel,
    Vp,
    Director,
    Manager,
    Individual,
}

impl Seniority {
    /// Higher rank = more senior.
    pub fn rank(self) -> u8 {
        match self {
            Self::CLevel => 4,
            Self::Vp => 3,
            Self::Director => 2,
            Self::Manager => 1,
            Self::Individual => 0,
        }
    }

    /// Derive a seniority from a free-text title.
    pub fn from_title(title: &str) -> Self {
        let lower = title.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        let has = |w: &str| words.contains(&w);

        if lower.contains("chief")
            || has("ceo")
            || has("cfo")
            || has("coo")
            || has("cto")
            || has("cio")
            || has("cmo")
            || has("cro")
            || (has("president") && !lower.contains("vice president"))
            || has("founder")
        {
            Self::CLevel
        } else if has("vp") || has("svp") || has("evp") || lower.contains("vice president") {
            Self::Vp
        } else if has("director") || lower.contains("head of") {
            Self::Director
        } else if has("manager") || has("lead") {
            Self::Manager
        } else {
            Self::Individual
        }
    }

    /// Parse a provider-supplied management level, tolerating common spellings.
    pub fn parse_level(level: &str) -> Option<Self> {
        match level.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "c_level" | "c_suite" | "cxo" | "owner" | "founder" | "partner" => Some(Self::CLevel),
            "vp" | "vice_president" => Some(Self::Vp),
            "director" | "head" => Some(Self::Director),
            "manager" | "lead" | "senior" => Some(Self::Manager),
            "individual" | "entry" | "ic" | "individual_contributor" => Some(Self::Individual),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Candidate
// ---------------------------------------------------------------------------

/// A raw provider hit: an unverified person at the target company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Provider-native person id (dedup key within one company).
    pub id: String,
    /// Provider that returned the hit.
    pub provider: String,
    /// Full name.
    pub full_name: String,
    /// Current title.
    pub title: String,
    /// Department, if the provider reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    /// Provider-supplied decision-maker flag.
    pub is_decision_maker: bool,
    /// Management level.
    pub seniority: Seniority,
    /// Name of the strategy that first produced this hit.
    pub strategy: String,
    /// Profile URL (e.g. a social handle), if supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_url: Option<String>,
}

// ---------------------------------------------------------------------------
// Channels & enrichment
// ---------------------------------------------------------------------------

/// Kind of contact channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    Email,
    Phone,
}

impl ChannelType {
    /// Stable string form used in cache keys and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Phone => "phone",
        }
    }
}

impl std::fmt::Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single contact method attached to a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    #[serde(rename = "type")]
    pub channel_type: ChannelType,
    pub value: String,
    /// Provider that supplied the value.
    pub source_provider: String,
}

/// A candidate plus whatever channels enrichment found.
///
/// Zero channels is legitimate: the candidate is kept with a "no contact"
/// status because name + role is still useful downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedContact {
    pub candidate: Candidate,
    pub channels: Vec<Channel>,
    /// Channel types where some provider failed (not merely "not found").
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unresolved: Vec<ChannelType>,
}

impl EnrichedContact {
    /// Whether no channel was found at all.
    pub fn has_no_contact(&self) -> bool {
        self.channels.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

/// Outcome class of cross-source verification for one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    /// No independent source answered either way.
    Unverified,
    /// At least one confirmation, no contradictions.
    Verified,
    /// At least one contradiction, no confirmations.
    Contradicted,
    /// Sources disagree with each other.
    Disputed,
}

impl VerificationStatus {
    /// Classify from vote counts.
    pub fn from_votes(agreeing: u32, disagreeing: u32) -> Self {
        match (agreeing, disagreeing) {
            (0, 0) => Self::Unverified,
            (_, 0) => Self::Verified,
            (0, _) => Self::Contradicted,
            _ => Self::Disputed,
        }
    }
}

/// Consolidated verification of one contact channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    /// 0–100, derived only from actual votes.
    pub confidence: u8,
    pub agreeing_sources: u32,
    pub disagreeing_sources: u32,
    /// Providers that answered.
    pub verification_providers: Vec<String>,
    /// When the last vote was cast; `None` if nothing answered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,
    pub status: VerificationStatus,
    /// Why sources disagreed (e.g. `different_company`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contradictions: Vec<String>,
}

impl VerificationResult {
    /// Result for a channel no independent source has spoken about.
    pub fn unverified() -> Self {
        Self {
            confidence: 0,
            agreeing_sources: 0,
            disagreeing_sources: 0,
            verification_providers: Vec::new(),
            verified_at: None,
            status: VerificationStatus::Unverified,
            contradictions: Vec::new(),
        }
    }
}

/// A channel with its verification attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifiedChannel {
    pub channel: Channel,
    pub verification: VerificationResult,
}

/// An enriched contact after verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifiedContact {
    pub candidate: Candidate,
    pub channels: Vec<VerifiedChannel>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unresolved: Vec<ChannelType>,
}

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

/// Buyer-group role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuyerRole {
    DecisionMaker,
    Champion,
    Stakeholder,
    Blocker,
    Introducer,
}

impl BuyerRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DecisionMaker => "decision_maker",
            Self::Champion => "champion",
            Self::Stakeholder => "stakeholder",
            Self::Blocker => "blocker",
            Self::Introducer => "introducer",
        }
    }
}

impl std::fmt::Display for BuyerRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exactly one role per candidate; recomputed every run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub candidate_id: String,
    pub role: BuyerRole,
    pub confidence: u8,
    pub reasoning_tags: BTreeSet<String>,
}

/// A fully processed contact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactResult {
    pub contact: VerifiedContact,
    pub role: RoleAssignment,
}

/// How to approach a buyer group, from its role composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementStrategy {
    ExecutiveSponsor,
    ChampionLed,
    BlockerMitigation,
    StakeholderConsensus,
}

/// Role counts and engagement strategy for one company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuyerGroupSummary {
    pub role_counts: BTreeMap<BuyerRole, usize>,
    pub engagement: EngagementStrategy,
}

impl BuyerGroupSummary {
    /// Summarize a set of role assignments.
    pub fn from_roles<'a>(roles: impl IntoIterator<Item = &'a RoleAssignment>) -> Self {
        let mut role_counts = BTreeMap::new();
        for r in roles {
            *role_counts.entry(r.role).or_insert(0) += 1;
        }
        let has = |role: BuyerRole| role_counts.get(&role).copied().unwrap_or(0) > 0;
        let engagement = if has(BuyerRole::DecisionMaker) {
            EngagementStrategy::ExecutiveSponsor
        } else if has(BuyerRole::Champion) {
            EngagementStrategy::ChampionLed
        } else if has(BuyerRole::Blocker) {
            EngagementStrategy::BlockerMitigation
        } else {
            EngagementStrategy::StakeholderConsensus
        };
        Self {
            role_counts,
            engagement,
        }
    }
}

// ---------------------------------------------------------------------------
// Company results
// ---------------------------------------------------------------------------

/// Final processing state of one company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompanyStatus {
    /// Every strategy ran and every channel lookup resolved.
    Complete,
    /// Completed, but some strategies or channels are unresolved.
    Partial,
    /// No usable search result at all.
    Failed,
}

/// Per-company pipeline output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyResult {
    /// Position in the run input.
    pub index: usize,
    pub target: CompanyTarget,
    pub status: CompanyStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub contacts: Vec<ContactResult>,
    pub buyer_group: BuyerGroupSummary,
    /// Strategy names that could not be completed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unresolved_strategies: Vec<String>,
}

impl CompanyResult {
    /// Project into the sink contract shape.
    pub fn sink_record(&self) -> SinkRecord {
        SinkRecord {
            company: self.target.name.clone(),
            website: self.target.website.clone(),
            status: self.status,
            contacts: self
                .contacts
                .iter()
                .map(|c| SinkContact {
                    name: c.contact.candidate.full_name.clone(),
                    title: c.contact.candidate.title.clone(),
                    department: c.contact.candidate.department.clone(),
                    role: c.role.role,
                    role_confidence: c.role.confidence,
                    channels: c
                        .contact
                        .channels
                        .iter()
                        .map(|vc| SinkChannel {
                            channel_type: vc.channel.channel_type,
                            value: vc.channel.value.clone(),
                            confidence: vc.verification.confidence,
                            status: vc.verification.status,
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

/// Channel as emitted to the CRM sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinkChannel {
    #[serde(rename = "type")]
    pub channel_type: ChannelType,
    pub value: String,
    pub confidence: u8,
    pub status: VerificationStatus,
}

/// Contact as emitted to the CRM sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinkContact {
    pub name: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    pub role: BuyerRole,
    pub role_confidence: u8,
    pub channels: Vec<SinkChannel>,
}

/// One company as emitted to the CRM sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinkRecord {
    pub company: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    pub status: CompanyStatus,
    pub contacts: Vec<SinkContact>,
}

// ---------------------------------------------------------------------------
// Run ledger & report
// ---------------------------------------------------------------------------

/// Per-provider usage accumulated over one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunLedgerEntry {
    pub provider: String,
    pub calls_made: u64,
    pub credits_spent: u64,
    pub cache_hits: u64,
}

/// A company that failed, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyFailure {
    pub company: String,
    pub reason: String,
}

/// Run-level report shown to the operator and stored in run history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub companies_total: usize,
    /// Complete + partial.
    pub companies_processed: usize,
    pub companies_complete: usize,
    pub companies_partial: usize,
    pub companies_failed: usize,
    /// Never started because the budget ran out.
    pub companies_skipped: usize,
    pub failures: Vec<CompanyFailure>,
    pub budget_exhausted: bool,
    pub total_credits_spent: u64,
    pub per_provider_spend: Vec<RunLedgerEntry>,
    /// Monthly budget left per provider after the run.
    pub remaining_budget: BTreeMap<String, u64>,
    /// Cache hits / (cache hits + live calls), 0 when nothing was called.
    pub cache_hit_rate: f64,
    /// Fatal provider errors seen during the run.
    pub fatal_errors: u64,
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_id_roundtrip() {
        let id = RunId::new();
        let parsed: RunId = id.to_string().parse().expect("parse RunId");
        assert_eq!(id, parsed);
    }

    #[test]
    fn company_domain_normalization() {
        let t = CompanyTarget::new("Acme").with_website("https://www.Acme.com/about");
        assert_eq!(t.domain().as_deref(), Some("acme.com"));

        let t = CompanyTarget::new("Acme").with_website("acme.io");
        assert_eq!(t.domain().as_deref(), Some("acme.io"));

        assert_eq!(CompanyTarget::new("Acme").domain(), None);
    }

    #[test]
    fn resolved_keeps_other_fields() {
        let t = CompanyTarget::new("Acme").with_website("acme.com");
        let r = t.resolved("co_123");
        assert_eq!(r.provider_company_id.as_deref(), Some("co_123"));
        assert_eq!(r.website, t.website);
        assert!(t.provider_company_id.is_none());
    }

    #[test]
    fn seniority_from_title() {
        assert_eq!(Seniority::from_title("CFO"), Seniority::CLevel);
        assert_eq!(Seniority::from_title("Chief Revenue Officer"), Seniority::CLevel);
        assert_eq!(Seniority::from_title("Vice President, Sales"), Seniority::Vp);
        assert_eq!(Seniority::from_title("VP Engineering"), Seniority::Vp);
        assert_eq!(Seniority::from_title("Head of Product"), Seniority::Director);
        assert_eq!(Seniority::from_title("Engineering Manager"), Seniority::Manager);
        assert_eq!(Seniority::from_title("Software Engineer"), Seniority::Individual);
        assert!(Seniority::CLevel.rank() > Seniority::Director.rank());
    }

    #[test]
    fn seniority_level_parsing() {
        assert_eq!(Seniority::parse_level("C-Level"), Some(Seniority::CLevel));
        assert_eq!(Seniority::parse_level("vice president"), Some(Seniority::Vp));
        assert_eq!(Seniority::parse_level("unknown"), None);
    }

    #[test]
    fn strategy_tuning() {
        let strategy = default_strategies().remove(0);
        let small = CompanyTarget {
            employee_count: Some(12),
            ..CompanyTarget::new("Tiny")
        };
        assert_eq!(strategy.tuned_for(&small).max_results, 5);
        let big = CompanyTarget {
            employee_count: Some(5000),
            ..CompanyTarget::new("Big")
        };
        assert_eq!(strategy.tuned_for(&big).max_results, strategy.max_results);
    }

    #[test]
    fn strategy_industry_filter() {
        let mut strategy = default_strategies().remove(0);
        assert!(strategy.applies_to(&CompanyTarget::new("Any")));

        strategy.industries = set(&["software"]);
        let saas = CompanyTarget {
            industry: Some("Enterprise Software".into()),
            ..CompanyTarget::new("SaaS Co")
        };
        assert!(strategy.applies_to(&saas));
        assert!(!strategy.applies_to(&CompanyTarget::new("Unknown")));
    }

    #[test]
    fn verification_status_from_votes() {
        assert_eq!(VerificationStatus::from_votes(0, 0), VerificationStatus::Unverified);
        assert_eq!(VerificationStatus::from_votes(1, 0), VerificationStatus::Verified);
        assert_eq!(VerificationStatus::from_votes(0, 1), VerificationStatus::Contradicted);
        assert_eq!(VerificationStatus::from_votes(2, 1), VerificationStatus::Disputed);
    }

    #[test]
    fn buyer_group_engagement() {
        let role = |r| RoleAssignment {
            candidate_id: "x".into(),
            role: r,
            confidence: 50,
            reasoning_tags: BTreeSet::new(),
        };
        let roles = [role(BuyerRole::Champion), role(BuyerRole::Blocker)];
        let summary = BuyerGroupSummary::from_roles(&roles);
        assert_eq!(summary.engagement, EngagementStrategy::ChampionLed);
        assert_eq!(summary.role_counts[&BuyerRole::Champion], 1);

        let empty = BuyerGroupSummary::from_roles(Vec::<RoleAssignment>::new().iter());
        assert_eq!(empty.engagement, EngagementStrategy::StakeholderConsensus);
    }

    #[test]
    fn channel_serializes_type_field() {
        let channel = Channel {
            channel_type: ChannelType::Email,
            value: "jane.doe@acme.com".into(),
            source_provider: "email-a".into(),
        };
        let json = serde_json::to_string(&channel).expect("serialize");
        assert!(json.contains(r#""type":"email""#));
    }
}
