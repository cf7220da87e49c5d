//! External data provider adapters.
//!
//! Each adapter normalizes one third-party API behind [`ProviderAdapter`].
//! The [`ProviderRegistry`] holds the configured adapters in priority order.

mod adapter;
mod contact_finder;
mod fact_check;
mod http;
mod people_search;
mod response;

use std::sync::Arc;

use prospector_shared::{AppConfig, ChannelType, ProspectorError, ProviderKind, Result};

pub use adapter::{Capability, IdentityEvidence, ProviderAdapter, QueryType};
pub use contact_finder::ContactFinderAdapter;
pub use fact_check::FactCheckAdapter;
pub use http::ProviderHttp;
pub use people_search::PeopleSearchAdapter;
pub use response::{ProviderResponse, ResponseStatus};

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Holds configured adapters in priority (config) order.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    adapters: Vec<Arc<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    /// Create a registry from already-built adapters.
    pub fn new(adapters: Vec<Arc<dyn ProviderAdapter>>) -> Self {
        Self { adapters }
    }

    /// Build one adapter per enabled provider in the config.
    ///
    /// API keys are read from each provider's `api_key_env` variable.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let mut adapters: Vec<Arc<dyn ProviderAdapter>> = Vec::new();
        for provider in config.providers.iter().filter(|p| p.enabled) {
            let api_key = std::env::var(&provider.api_key_env).map_err(|_| {
                ProspectorError::config(format!(
                    "provider '{}': environment variable {} is not set",
                    provider.id, provider.api_key_env
                ))
            })?;

            let adapter: Arc<dyn ProviderAdapter> = match provider.kind {
                ProviderKind::PeopleSearch => Arc::new(PeopleSearchAdapter::new(provider, api_key)?),
                ProviderKind::EmailFinder => Arc::new(ContactFinderAdapter::new(
                    provider,
                    api_key,
                    ChannelType::Email,
                )?),
                ProviderKind::PhoneFinder => Arc::new(ContactFinderAdapter::new(
                    provider,
                    api_key,
                    ChannelType::Phone,
                )?),
                ProviderKind::FactCheck => Arc::new(FactCheckAdapter::new(provider, api_key)?),
            };
            tracing::debug!(provider = %provider.id, kind = provider.kind.as_str(), "registered provider");
            adapters.push(adapter);
        }
        Ok(Self { adapters })
    }

    /// All adapters, in priority order.
    pub fn all(&self) -> &[Arc<dyn ProviderAdapter>] {
        &self.adapters
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}
