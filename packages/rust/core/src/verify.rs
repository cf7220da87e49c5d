//! Cross-source verification and confidence consolidation.
//!
//! Each enriched channel is re-checked against up to `max_sources`
//! independent providers (never the one that supplied the channel). Every
//! answering source casts one vote: it confirms the name + company + title
//! association, contradicts it, or abstains. Confidence is computed from the
//! votes alone, so a channel nobody spoke about stays at 0 and `unverified`.
//! A channel whose sources all failed is also listed as unresolved on the
//! contact.

use std::sync::Arc;

use chrono::Utc;
use prospector_providers::{Capability, IdentityEvidence, ProviderAdapter, QueryType};
use prospector_shared::{
    Candidate, Channel, ChannelType, CompanyTarget, EnrichedContact, VerificationConfig,
    VerificationResult, VerificationStatus, VerifiedChannel, VerifiedContact,
};
use serde_json::json;
use tracing::{debug, instrument};

use crate::gateway::{CallOutcome, ProviderGateway};

/// One source's verdict on a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Vote {
    Confirm,
    /// Carries the contradiction tag (`different_company`, ...).
    Contradict(&'static str),
    /// The source answered but said nothing checkable.
    Abstain,
}

pub struct CrossSourceVerifier {
    gateway: Arc<ProviderGateway>,
    email: Vec<Arc<dyn ProviderAdapter>>,
    phone: Vec<Arc<dyn ProviderAdapter>>,
    config: VerificationConfig,
}

impl CrossSourceVerifier {
    pub fn new(
        gateway: Arc<ProviderGateway>,
        adapters: &[Arc<dyn ProviderAdapter>],
        config: VerificationConfig,
    ) -> Self {
        let with = |t| {
            adapters
                .iter()
                .filter(|a| a.supports(Capability::Verify(t)))
                .cloned()
                .collect::<Vec<_>>()
        };
        Self {
            gateway,
            email: with(ChannelType::Email),
            phone: with(ChannelType::Phone),
            config,
        }
    }

    /// Verify every channel of one contact.
    #[instrument(skip_all, fields(candidate = %contact.candidate.id))]
    pub async fn verify(&self, contact: EnrichedContact, company: &CompanyTarget) -> VerifiedContact {
        let mut unresolved = contact.unresolved;
        let mut channels = Vec::with_capacity(contact.channels.len());
        for channel in contact.channels {
            let (verification, errored) =
                self.verify_channel(&contact.candidate, company, &channel).await;
            if errored && !unresolved.contains(&channel.channel_type) {
                unresolved.push(channel.channel_type);
            }
            channels.push(VerifiedChannel {
                channel,
                verification,
            });
        }
        VerifiedContact {
            candidate: contact.candidate,
            channels,
            unresolved,
        }
    }

    /// The flag is set when no source answered and at least one failed.
    async fn verify_channel(
        &self,
        candidate: &Candidate,
        company: &CompanyTarget,
        channel: &Channel,
    ) -> (VerificationResult, bool) {
        let pool = match channel.channel_type {
            ChannelType::Email => &self.email,
            ChannelType::Phone => &self.phone,
        };
        let sources = pool
            .iter()
            .filter(|a| a.id() != channel.source_provider)
            .take(self.config.max_sources);

        let params = json!({
            "person_id": candidate.id,
            "name": candidate.full_name,
            "company": company.name,
            "title": candidate.title,
            "channel": channel.channel_type,
            "value": channel.value,
        });

        let mut agreeing = 0u32;
        let mut disagreeing = 0u32;
        let mut providers = Vec::new();
        let mut contradictions = Vec::new();
        let mut errored = false;

        for adapter in sources {
            let adapter = adapter.as_ref();
            let outcome = self
                .gateway
                .call(adapter, QueryType::Verify, params.clone(), move || async move {
                    adapter.verify(candidate, company, channel).await
                })
                .await;

            let vote = match outcome {
                CallOutcome::Hit(evidence) => judge(
                    candidate,
                    company,
                    &evidence,
                    self.config.similarity_threshold,
                ),
                // A positive claim the source has never heard of.
                CallOutcome::NotFound => Vote::Contradict("not_found"),
                other => {
                    debug!(provider = adapter.id(), outcome = %other.describe(), "verification source unavailable");
                    errored = true;
                    continue;
                }
            };

            providers.push(adapter.id().to_string());
            match vote {
                Vote::Confirm => agreeing += 1,
                Vote::Contradict(tag) => {
                    disagreeing += 1;
                    contradictions.push(tag.to_string());
                }
                Vote::Abstain => {}
            }
        }

        let verified_at = (!providers.is_empty()).then(Utc::now);
        let unresolved = errored && providers.is_empty();
        let result = VerificationResult {
            confidence: consolidate(
                agreeing,
                disagreeing,
                self.config.confirm_increment,
                self.config.contradict_decrement,
            ),
            agreeing_sources: agreeing,
            disagreeing_sources: disagreeing,
            verification_providers: providers,
            verified_at,
            status: VerificationStatus::from_votes(agreeing, disagreeing),
            contradictions,
        };
        (result, unresolved)
    }
}

/// `agreeing * increment - disagreeing * decrement`, clamped to 0..=100.
pub fn consolidate(agreeing: u32, disagreeing: u32, increment: u8, decrement: u8) -> u8 {
    let score =
        i64::from(agreeing) * i64::from(increment) - i64::from(disagreeing) * i64::from(decrement);
    score.clamp(0, 100) as u8
}

/// Compare a source's evidence with what we believe about the candidate.
pub fn judge(
    candidate: &Candidate,
    company: &CompanyTarget,
    evidence: &IdentityEvidence,
    threshold: f64,
) -> Vote {
    if evidence.channel_confirmed == Some(false) {
        return Vote::Contradict("channel_rejected");
    }

    let claimed_company = evidence.current_company.as_deref().filter(|c| !c.trim().is_empty());
    let claimed_title = evidence.current_title.as_deref().filter(|t| !t.trim().is_empty());

    if claimed_company.is_some_and(|c| company_similarity(c, &company.name) < threshold) {
        return Vote::Contradict("different_company");
    }
    if claimed_title.is_some_and(|t| title_similarity(t, &candidate.title) < threshold) {
        return Vote::Contradict("different_title");
    }

    if claimed_company.is_none() && claimed_title.is_none() && evidence.channel_confirmed.is_none() {
        Vote::Abstain
    } else {
        Vote::Confirm
    }
}

const COMPANY_SUFFIXES: &[&str] = &[
    "inc", "incorporated", "llc", "ltd", "limited", "corp", "corporation", "co", "company",
    "gmbh", "plc", "sa", "ag", "bv", "group", "holdings",
];

fn words(s: &str) -> Vec<String> {
    s.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

fn normalize_company(name: &str) -> String {
    let mut parts = words(name);
    if parts.first().is_some_and(|w| w == "the") && parts.len() > 1 {
        parts.remove(0);
    }
    while parts.len() > 1 && parts.last().is_some_and(|w| COMPANY_SUFFIXES.contains(&w.as_str())) {
        parts.pop();
    }
    parts.join(" ")
}

fn expand_title_word(word: &str) -> &str {
    match word {
        "ceo" => "chief executive officer",
        "cfo" => "chief financial officer",
        "coo" => "chief operating officer",
        "cto" => "chief technology officer",
        "cio" => "chief information officer",
        "cmo" => "chief marketing officer",
        "cro" => "chief revenue officer",
        "vp" => "vice president",
        "svp" => "senior vice president",
        "evp" => "executive vice president",
        "sr" => "senior",
        "dir" => "director",
        "mgr" => "manager",
        "eng" => "engineering",
        "ops" => "operations",
        other => other,
    }
}

fn normalize_title(title: &str) -> String {
    words(title)
        .iter()
        .filter(|w| !matches!(w.as_str(), "of" | "the" | "and" | "for"))
        .map(|w| expand_title_word(w))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Jaro-Winkler over legal-suffix-stripped names (typo tolerant).
pub fn company_similarity(a: &str, b: &str) -> f64 {
    strsim::jaro_winkler(&normalize_company(a), &normalize_company(b))
}

/// Similarity of abbreviation-expanded titles.
///
/// A title whose words all appear in the other (`CFO` within
/// `CFO & Treasurer`) is the same role and scores 1.0. Otherwise normalized
/// Levenshtein decides.
pub fn title_similarity(a: &str, b: &str) -> f64 {
    let (a, b) = (normalize_title(a), normalize_title(b));
    let (shorter, longer) = if a.len() <= b.len() { (&a, &b) } else { (&b, &a) };
    let longer_words: Vec<&str> = longer.split(' ').collect();
    if !shorter.is_empty() && shorter.split(' ').all(|w| longer_words.contains(&w)) {
        return 1.0;
    }
    strsim::normalized_levenshtein(&a, &b)
}
