//! People-search provider: company resolution and filtered people search.
//!
//! Endpoints:
//! - `POST v1/companies/resolve` `{name, domain?}` → `{company: {id, name}}`
//! - `POST v1/people/search` → `{people: [...]}`

use std::time::Duration;

use async_trait::async_trait;
use prospector_shared::{
    Candidate, CompanyTarget, ProviderConfig, ProviderError, Result, SearchStrategy, Seniority,
};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::adapter::{Capability, ProviderAdapter};
use crate::http::ProviderHttp;

const CAPABILITIES: &[Capability] = &[Capability::ResolveCompany, Capability::Search];

#[derive(Debug, Deserialize)]
struct ResolveResponse {
    company: Option<CompanyRecord>,
}

#[derive(Debug, Deserialize)]
struct CompanyRecord {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    people: Vec<PersonRecord>,
}

#[derive(Debug, Deserialize)]
struct PersonRecord {
    id: String,
    name: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    department: Option<String>,
    #[serde(default)]
    is_decision_maker: bool,
    #[serde(default)]
    seniority: Option<String>,
    #[serde(default)]
    profile_url: Option<String>,
}

impl PersonRecord {
    fn into_candidate(self, provider: &str, strategy: &str) -> Candidate {
        let title = self.title.unwrap_or_default();
        let seniority = self
            .seniority
            .as_deref()
            .and_then(Seniority::parse_level)
            .unwrap_or_else(|| Seniority::from_title(&title));
        Candidate {
            id: self.id,
            provider: provider.to_string(),
            full_name: self.name,
            title,
            department: self.department.filter(|d| !d.trim().is_empty()),
            is_decision_maker: self.is_decision_maker,
            seniority,
            strategy: strategy.to_string(),
            profile_url: self.profile_url,
        }
    }
}

/// Adapter for a people-search API.
pub struct PeopleSearchAdapter {
    id: String,
    cost_per_call: u64,
    timeout: Duration,
    http: ProviderHttp,
}

impl PeopleSearchAdapter {
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
impl ProviderAdapter for PeopleSearchAdapter {
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

    async fn resolve_company(
        &self,
        target: &CompanyTarget,
    ) -> std::result::Result<Option<String>, ProviderError> {
        let body = json!({
            "name": target.name,
            "domain": target.domain(),
        });
        let response: Option<ResolveResponse> =
            self.http.post_json("v1/companies/resolve", &body).await?;
        Ok(response.and_then(|r| r.company).map(|c| c.id))
    }

    async fn search(
        &self,
        strategy: &SearchStrategy,
        target: &CompanyTarget,
    ) -> std::result::Result<Vec<Candidate>, ProviderError> {
        let body = json!({
            "company_id": target.provider_company_id,
            "company_name": target.name,
            "domain": target.domain(),
            "departments": strategy.departments,
            "titles": strategy.titles,
            "decision_makers_only": strategy.decision_makers_only,
            "limit": strategy.max_results,
        });
        let response: Option<SearchResponse> =
            self.http.post_json("v1/people/search", &body).await?;

        let people = response.map(|r| r.people).unwrap_or_default();
        debug!(
            provider = %self.id,
            company = %target.name,
            strategy = %strategy.name,
            hits = people.len(),
            "people search returned"
        );
        Ok(people
            .into_iter()
            .filter(|p| !p.id.is_empty() && !p.name.trim().is_empty())
            .take(strategy.max_results as usize)
            .map(|p| p.into_candidate(&self.id, &strategy.name))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prospector_shared::{ProviderKind, default_strategies};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: &str) -> ProviderConfig {
        ProviderConfig {
            id: "people".into(),
            kind: ProviderKind::PeopleSearch,
            base_url: base_url.into(),
            api_key_env: "UNUSED".into(),
            cost_per_call: 1,
            monthly_cap: 100,
            concurrency: 4,
            timeout_secs: 5,
            critical: None,
            enabled: true,
        }
    }

    #[tokio::test]
    async fn resolves_company_by_domain() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/companies/resolve"))
            .and(body_partial_json(json!({"domain": "acme.com"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"company": {"id": "co_1", "name": "Acme Corp"}})),
            )
            .mount(&server)
            .await;

        let adapter = PeopleSearchAdapter::new(&config(&server.uri()), "k".into()).unwrap();
        let target = CompanyTarget::new("Acme Corp").with_website("https://www.acme.com");
        let id = adapter.resolve_company(&target).await.unwrap();
        assert_eq!(id.as_deref(), Some("co_1"));
    }

    #[tokio::test]
    async fn unknown_company_is_none() {
        let server = MockServer::start().await;
        Mock::given(path("/v1/companies/resolve"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let adapter = PeopleSearchAdapter::new(&config(&server.uri()), "k".into()).unwrap();
        let id = adapter
            .resolve_company(&CompanyTarget::new("Nobody Inc"))
            .await
            .unwrap();
        assert!(id.is_none());
    }

    #[tokio::test]
    async fn search_maps_people_to_candidates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/people/search"))
            .and(body_partial_json(json!({"company_id": "co_1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "people": [
                    {"id": "p1", "name": "Jane Doe", "title": "CFO", "is_decision_maker": true},
                    {"id": "p2", "name": "John Roe", "title": "VP Engineering",
                     "department": "Engineering", "seniority": "vice president"},
                    {"id": "", "name": "No Id"}
                ]
            })))
            .mount(&server)
            .await;

        let adapter = PeopleSearchAdapter::new(&config(&server.uri()), "k".into()).unwrap();
        let strategy = default_strategies().remove(0);
        let target = CompanyTarget::new("Acme Corp").resolved("co_1");
        let candidates = adapter.search(&strategy, &target).await.unwrap();

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].full_name, "Jane Doe");
        assert!(candidates[0].is_decision_maker);
        assert_eq!(candidates[0].seniority, Seniority::CLevel);
        assert_eq!(candidates[0].strategy, strategy.name);
        assert_eq!(candidates[0].provider, "people");
        assert_eq!(candidates[1].seniority, Seniority::Vp);
        assert_eq!(candidates[1].department.as_deref(), Some("Engineering"));
    }

    #[tokio::test]
    async fn empty_search_is_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(path("/v1/people/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"people": []})))
            .mount(&server)
            .await;

        let adapter = PeopleSearchAdapter::new(&config(&server.uri()), "k".into()).unwrap();
        let strategy = default_strategies().remove(0);
        let out = adapter
            .search(&strategy, &CompanyTarget::new("Acme"))
            .await
            .unwrap();
        assert!(out.is_empty());
    }
}
