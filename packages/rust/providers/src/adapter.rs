//! The provider adapter trait.
//!
//! One implementation per external data source. Adapters normalize the
//! provider's request/response shape and error codes; they never retry,
//! cache, or check budgets themselves (the pipeline's gateway does that).

use std::time::Duration;

use async_trait::async_trait;
use prospector_shared::{
    Candidate, Channel, ChannelType, CompanyTarget, ProviderError, SearchStrategy,
};
use serde::{Deserialize, Serialize};

/// Kind of request sent to a provider. Part of every cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    /// Company identity lookup.
    Company,
    Search,
    Enrich,
    Verify,
}

impl QueryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Company => "company",
            Self::Search => "search",
            Self::Enrich => "enrich",
            Self::Verify => "verify",
        }
    }
}

impl std::fmt::Display for QueryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An operation an adapter supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    ResolveCompany,
    Search,
    Enrich(ChannelType),
    Verify(ChannelType),
}

/// What an independent source currently believes about a person.
///
/// The verifier compares this against the candidate to cast a vote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityEvidence {
    /// Employer the source associates with the person, if any.
    #[serde(default)]
    pub current_company: Option<String>,
    /// Title the source associates with the person, if any.
    #[serde(default)]
    pub current_title: Option<String>,
    /// Whether the source confirms the channel belongs to the person.
    /// `None` when the source says nothing about the channel.
    #[serde(default)]
    pub channel_confirmed: Option<bool>,
}

fn unsupported(id: &str, op: &str) -> ProviderError {
    ProviderError::Fatal(format!("provider '{id}' does not support {op}"))
}

/// Trait for external data providers.
///
/// "No data" is always `Ok(None)` / an empty vec, never an error.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Stable provider id (config id, cache key component, ledger key).
    fn id(&self) -> &str;

    /// Operations this adapter implements.
    fn capabilities(&self) -> &[Capability];

    /// Credits charged per answered call.
    fn cost_per_call(&self) -> u64;

    /// Upper bound on a single call.
    fn timeout(&self) -> Duration;

    fn supports(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    /// Resolve the provider-specific company id.
    async fn resolve_company(
        &self,
        _target: &CompanyTarget,
    ) -> Result<Option<String>, ProviderError> {
        Err(unsupported(self.id(), "company resolution"))
    }

    /// Run one targeted people search.
    async fn search(
        &self,
        _strategy: &SearchStrategy,
        _target: &CompanyTarget,
    ) -> Result<Vec<Candidate>, ProviderError> {
        Err(unsupported(self.id(), "people search"))
    }

    /// Look up one contact channel for a candidate.
    async fn enrich_channel(
        &self,
        _candidate: &Candidate,
        _company: &CompanyTarget,
        channel_type: ChannelType,
    ) -> Result<Option<Channel>, ProviderError> {
        Err(unsupported(self.id(), &format!("{channel_type} enrichment")))
    }

    /// Independently re-check a candidate and one of their channels.
    async fn verify(
        &self,
        _candidate: &Candidate,
        _company: &CompanyTarget,
        channel: &Channel,
    ) -> Result<Option<IdentityEvidence>, ProviderError> {
        Err(unsupported(
            self.id(),
            &format!("{} verification", channel.channel_type),
        ))
    }
}

/// Split a full name into (first, last) for providers that want them apart.
pub(crate) fn split_name(full_name: &str) -> (String, String) {
    let mut parts = full_name.split_whitespace();
    let first = parts.next().unwrap_or_default().to_string();
    let last = parts.last().unwrap_or_default().to_string();
    (first, last)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SearchOnly;

    #[async_trait]
    impl ProviderAdapter for SearchOnly {
        fn id(&self) -> &str {
            "search-only"
        }
        fn capabilities(&self) -> &[Capability] {
            &[Capability::Search]
        }
        fn cost_per_call(&self) -> u64 {
            1
        }
        fn timeout(&self) -> Duration {
            Duration::from_secs(1)
        }
    }

    #[tokio::test]
    async fn unsupported_operations_are_fatal() {
        let adapter = SearchOnly;
        let err = adapter
            .resolve_company(&CompanyTarget::new("Acme"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Fatal(m) if m.contains("search-only")));
        assert!(adapter.supports(Capability::Search));
        assert!(!adapter.supports(Capability::Verify(ChannelType::Email)));
    }

    #[test]
    fn name_splitting() {
        assert_eq!(split_name("Jane Doe"), ("Jane".into(), "Doe".into()));
        assert_eq!(split_name("Jane Q. Doe"), ("Jane".into(), "Doe".into()));
        assert_eq!(split_name("Cher"), ("Cher".into(), String::new()));
    }

    #[test]
    fn query_type_strings() {
        assert_eq!(QueryType::Company.to_string(), "company");
        assert_eq!(QueryType::Verify.as_str(), "verify");
    }
}
