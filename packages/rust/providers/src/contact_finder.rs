//! Email/phone finder providers.
//!
//! Both families expose the same API shape, parameterized by channel:
//! - `POST v1/{email|phone}/find` → `{value, score?}`
//! - `POST v1/{email|phone}/verify` → `{person: {company, title}?, valid?}`
//!
//! A finder can verify channels sourced elsewhere, which makes it one of
//! the independent sources available to cross-source verification.

use std::time::Duration;

use async_trait::async_trait;
use prospector_shared::{
    Candidate, Channel, ChannelType, CompanyTarget, ProviderConfig, ProviderError, Result,
};
use serde::Deserialize;
use serde_json::json;

use crate::adapter::{Capability, IdentityEvidence, ProviderAdapter, split_name};
use crate::http::ProviderHttp;

#[derive(Debug, Deserialize)]
struct FindResponse {
    #[serde(default)]
    value: Option<String>,
    /// Provider's own 0-100 score; low-score guesses are discarded.
    #[serde(default)]
    score: Option<u8>,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    #[serde(default)]
    person: Option<PersonMatch>,
    #[serde(default)]
    valid: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct PersonMatch {
    #[serde(default)]
    company: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

/// Scores below this are treated as "not found".
const MIN_FIND_SCORE: u8 = 50;

/// Adapter for an email-finder or phone-finder API.
pub struct ContactFinderAdapter {
    id: String,
    channel_type: ChannelType,
    capabilities: [Capability; 2],
    cost_per_call: u64,
    timeout: Duration,
    http: ProviderHttp,
}

impl ContactFinderAdapter {
    pub fn new(config: &ProviderConfig, api_key: String, channel_type: ChannelType) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        Ok(Self {
            id: config.id.clone(),
            channel_type,
            capabilities: [
                Capability::Enrich(channel_type),
                Capability::Verify(channel_type),
            ],
            cost_per_call: config.cost_per_call,
            timeout,
            http: ProviderHttp::new(&config.base_url, api_key, timeout)?,
        })
    }

    fn wrong_channel(&self, requested: ChannelType) -> ProviderError {
        ProviderError::Fatal(format!(
            "provider '{}' handles {} only, not {requested}",
            self.id, self.channel_type
        ))
    }
}

fn person_body(candidate: &Candidate, company: &CompanyTarget) -> serde_json::Value {
    let (first_name, last_name) = split_name(&candidate.full_name);
    json!({
        "first_name": first_name,
        "last_name": last_name,
        "full_name": candidate.full_name,
        "company": company.name,
        "domain": company.domain(),
        "profile_url": candidate.profile_url,
    })
}

#[async_trait]
impl ProviderAdapter for ContactFinderAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    fn cost_per_call(&self) -> u64 {
        self.cost_per_call
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn enrich_channel(
        &self,
        candidate: &Candidate,
        company: &CompanyTarget,
        channel_type: ChannelType,
    ) -> std::result::Result<Option<Channel>, ProviderError> {
        if channel_type != self.channel_type {
            return Err(self.wrong_channel(channel_type));
        }
        let endpoint = format!("v1/{}/find", self.channel_type);
        let response: Option<FindResponse> = self
            .http
            .post_json(&endpoint, &person_body(candidate, company))
            .await?;

        let found = response.filter(|r| r.score.is_none_or(|s| s >= MIN_FIND_SCORE));
        Ok(found
            .and_then(|r| r.value)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(|value| Channel {
                channel_type,
                value,
                source_provider: self.id.clone(),
            }))
    }

    async fn verify(
        &self,
        candidate: &Candidate,
        company: &CompanyTarget,
        channel: &Channel,
    ) -> std::result::Result<Option<IdentityEvidence>, ProviderError> {
        if channel.channel_type != self.channel_type {
            return Err(self.wrong_channel(channel.channel_type));
        }
        let mut body = person_body(candidate, company);
        body["value"] = json!(channel.value);
        let endpoint = format!("v1/{}/verify", self.channel_type);
        let response: Option<VerifyResponse> = self.http.post_json(&endpoint, &body).await?;

        // An empty 200 answer yields all-`None` evidence (the source
        // abstains); only a 404 means the person is unknown to it.
        Ok(response.map(|r| {
            let (current_company, current_title) = r
                .person
                .map(|p| (p.company, p.title))
                .unwrap_or_default();
            IdentityEvidence {
                current_company,
                current_title,
                channel_confirmed: r.valid,
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prospector_shared::{ProviderKind, Seniority};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: &str) -> ProviderConfig {
        ProviderConfig {
            id: "email-a".into(),
            kind: ProviderKind::EmailFinder,
            base_url: base_url.into(),
            api_key_env: "UNUSED".into(),
            cost_per_call: 2,
            monthly_cap: 100,
            concurrency: 4,
            timeout_secs: 5,
            critical: None,
            enabled: true,
        }
    }

    fn jane() -> Candidate {
        Candidate {
            id: "p1".into(),
            provider: "people".into(),
            full_name: "Jane Doe".into(),
            title: "CFO".into(),
            department: None,
            is_decision_maker: true,
            seniority: Seniority::CLevel,
            strategy: "c-level".into(),
            profile_url: None,
        }
    }

    fn acme() -> CompanyTarget {
        CompanyTarget::new("Acme Corp").with_website("acme.com")
    }

    #[tokio::test]
    async fn finds_email() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/email/find"))
            .and(body_partial_json(json!({"first_name": "Jane", "domain": "acme.com"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"value": "jane.doe@acme.com", "score": 92})),
            )
            .mount(&server)
            .await;

        let adapter =
            ContactFinderAdapter::new(&config(&server.uri()), "k".into(), ChannelType::Email)
                .unwrap();
        let channel = adapter
            .enrich_channel(&jane(), &acme(), ChannelType::Email)
            .await
            .unwrap()
            .expect("channel");
        assert_eq!(channel.value, "jane.doe@acme.com");
        assert_eq!(channel.source_provider, "email-a");
    }

    #[tokio::test]
    async fn low_score_and_null_value_are_not_found() {
        let server = MockServer::start().await;
        Mock::given(path("/v1/email/find"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"value": "j@acme.com", "score": 10})),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(path("/v1/email/find"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": null})))
            .mount(&server)
            .await;

        let adapter =
            ContactFinderAdapter::new(&config(&server.uri()), "k".into(), ChannelType::Email)
                .unwrap();
        for _ in 0..2 {
            let out = adapter
                .enrich_channel(&jane(), &acme(), ChannelType::Email)
                .await
                .unwrap();
            assert!(out.is_none());
        }
    }

    #[tokio::test]
    async fn wrong_channel_type_is_fatal() {
        let adapter =
            ContactFinderAdapter::new(&config("http://127.0.0.1:9"), "k".into(), ChannelType::Email)
                .unwrap();
        let err = adapter
            .enrich_channel(&jane(), &acme(), ChannelType::Phone)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Fatal(_)));
    }

    #[tokio::test]
    async fn verify_returns_evidence() {
        let server = MockServer::start().await;
        Mock::given(path("/v1/email/verify"))
            .and(body_partial_json(json!({"value": "jane.doe@acme.com"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "person": {"company": "Acme Corp", "title": "Chief Financial Officer"},
                "valid": true
            })))
            .mount(&server)
            .await;

        let adapter =
            ContactFinderAdapter::new(&config(&server.uri()), "k".into(), ChannelType::Email)
                .unwrap();
        let channel = Channel {
            channel_type: ChannelType::Email,
            value: "jane.doe@acme.com".into(),
            source_provider: "email-b".into(),
        };
        let evidence = adapter
            .verify(&jane(), &acme(), &channel)
            .await
            .unwrap()
            .expect("evidence");
        assert_eq!(evidence.current_company.as_deref(), Some("Acme Corp"));
        assert_eq!(evidence.channel_confirmed, Some(true));
    }

    #[tokio::test]
    async fn verify_with_empty_answer_says_nothing() {
        let server = MockServer::start().await;
        Mock::given(path("/v1/email/verify"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let adapter =
            ContactFinderAdapter::new(&config(&server.uri()), "k".into(), ChannelType::Email)
                .unwrap();
        let channel = Channel {
            channel_type: ChannelType::Email,
            value: "x@acme.com".into(),
            source_provider: "email-b".into(),
        };
        let evidence = adapter
            .verify(&jane(), &acme(), &channel)
            .await
            .unwrap()
            .expect("evidence");
        assert_eq!(
            evidence,
            IdentityEvidence {
                current_company: None,
                current_title: None,
                channel_confirmed: None,
            }
        );
    }

    #[tokio::test]
    async fn verify_unknown_person_is_none() {
        let server = MockServer::start().await;
        Mock::given(path("/v1/email/verify"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let adapter =
            ContactFinderAdapter::new(&config(&server.uri()), "k".into(), ChannelType::Email)
                .unwrap();
        let channel = Channel {
            channel_type: ChannelType::Email,
            value: "x@acme.com".into(),
            source_provider: "email-b".into(),
        };
        assert!(adapter.verify(&jane(), &acme(), &channel).await.unwrap().is_none());
    }
}
