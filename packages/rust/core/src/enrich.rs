//! Contact enrichment: email, then phone, over priority-ordered providers.

use std::sync::Arc;

use prospector_providers::{Capability, ProviderAdapter, QueryType};
use prospector_shared::{Candidate, ChannelType, CompanyTarget, EnrichedContact};
use serde_json::json;
use tracing::{debug, instrument};

use crate::gateway::{CallOutcome, ProviderGateway};

/// Channel types looked up for every candidate, in order.
pub const CHANNEL_ORDER: [ChannelType; 2] = [ChannelType::Email, ChannelType::Phone];

pub struct ContactEnricher {
    gateway: Arc<ProviderGateway>,
    email: Vec<Arc<dyn ProviderAdapter>>,
    phone: Vec<Arc<dyn ProviderAdapter>>,
}

impl ContactEnricher {
    /// `adapters` is in priority order; each channel type keeps the ones that
    /// can enrich it.
    pub fn new(gateway: Arc<ProviderGateway>, adapters: &[Arc<dyn ProviderAdapter>]) -> Self {
        let with = |t| {
            adapters
                .iter()
                .filter(|a| a.supports(Capability::Enrich(t)))
                .cloned()
                .collect::<Vec<_>>()
        };
        Self {
            gateway,
            email: with(ChannelType::Email),
            phone: with(ChannelType::Phone),
        }
    }

    fn providers(&self, channel_type: ChannelType) -> &[Arc<dyn ProviderAdapter>] {
        match channel_type {
            ChannelType::Email => &self.email,
            ChannelType::Phone => &self.phone,
        }
    }

    /// Look up every channel type for one candidate.
    ///
    /// Never fails: a channel no provider could answer is listed in
    /// `unresolved`, one every provider answered "not found" for is simply
    /// absent.
    #[instrument(skip_all, fields(candidate = %candidate.id))]
    pub async fn enrich(&self, candidate: Candidate, company: &CompanyTarget) -> EnrichedContact {
        let mut channels = Vec::new();
        let mut unresolved = Vec::new();

        for channel_type in CHANNEL_ORDER {
            let params = json!({
                "person_id": candidate.id,
                "name": candidate.full_name,
                "company": company.name,
                "domain": company.domain(),
                "channel": channel_type,
            });

            let mut errored = false;
            let mut found = None;
            for adapter in self.providers(channel_type) {
                let adapter = adapter.as_ref();
                let person = &candidate;
                let outcome = self
                    .gateway
                    .call(adapter, QueryType::Enrich, params.clone(), move || async move {
                        adapter.enrich_channel(person, company, channel_type).await
                    })
                    .await;
                match outcome {
                    CallOutcome::Hit(channel) => {
                        found = Some(channel);
                        break;
                    }
                    CallOutcome::NotFound => {}
                    other => {
                        debug!(provider = adapter.id(), channel = %channel_type, outcome = %other.describe(), "enrichment fell through");
                        errored = true;
                    }
                }
            }

            match found {
                Some(channel) => channels.push(channel),
                None if errored => unresolved.push(channel_type),
                None => {}
            }
        }

        EnrichedContact {
            candidate,
            channels,
            unresolved,
        }
    }
}
