//! Fact-check provider: independent identity verification only.
//!
//! `POST v1/verify/person` `{full_name, company, title, channel: {type, value}}`
//! → `{match: {current_company, current_title, channel_confirmed}}`

use std::time::Duration;

use async_trait::async_trait;
use prospector_shared::{
    Candidate, Channel, ChannelType, CompanyTarget, ProviderConfig, ProviderError, Result,
};
use serde::Deserialize;
use serde_json::json;

use crate::adapter::{Capability, IdentityEvidence, ProviderAdapter};
use crate::http::ProviderHttp;

const CAPABILITIES: &[Capability] = &[
    Capability::Verify(ChannelType::Email),
    Capability::Verify(ChannelType::Phone),
];

#[derive(Debug, Deserialize)]
struct VerifyPersonResponse {
    #[serde(rename = "match", default)]
    matched: Option<IdentityEvidence>,
}

/// Adapter for a person fact-checking API.
pub struct FactCheckAdapter {
    id: String,
    cost_per_call: u64,
    timeout: Duration,
    http: ProviderHttp,
}

impl FactCheckAdapter {
    pub fn new(config: &ProviderConfig, api_key: String) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        Ok(Self {
            id: config.id.clone(),
            cost_per_call: config.cost_per_call,
            timeout,
            http: ProviderHttp::new(&config.base_url, api_key, timeout)?,
        })
    }
}

#[async_trait]
impl ProviderAdapter for FactCheckAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    fn capabilities(&self) -> &[Capability] {
        CAPABILITIES
    }

    fn cost_per_call(&self) -> u64 {
        self.cost_per_call
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn verify(
        &self,
        candidate: &Candidate,
        company: &CompanyTarget,
        channel: &Channel,
    ) -> std::result::Result<Option<IdentityEvidence>, ProviderError> {
        let body = json!({
            "full_name": candidate.full_name,
            "company": company.name,
            "domain": company.domain(),
            "title": candidate.title,
            "channel": channel,
        });
        let response: Option<VerifyPersonResponse> =
            self.http.post_json("v1/verify/person", &body).await?;
        Ok(response.and_then(|r| r.matched))
    }
}
