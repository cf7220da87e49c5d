//! Application configuration for Prospector.
//!
//! User config lives at `~/.prospector/prospector.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ProspectorError, Result};
use crate::types::{SearchStrategy, default_strategies};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "prospector.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".prospector";

// ---------------------------------------------------------------------------
// Config structs (matching prospector.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// External data providers, in priority order per capability.
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderConfig>,

    /// Candidate search strategies. Empty means the built-in list.
    #[serde(default)]
    pub strategies: Vec<SearchStrategy>,

    /// Retry/backoff policy for provider calls.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Cross-source verification tuning.
    #[serde(default)]
    pub verification: VerificationConfig,

    /// Response cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            defaults: DefaultsConfig::default(),
            providers: default_providers(),
            strategies: Vec::new(),
            retry: RetryConfig::default(),
            verification: VerificationConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl AppConfig {
    /// Look up a provider by id.
    pub fn provider(&self, id: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.id == id)
    }

    /// Configured strategies, or the built-in list when none are configured.
    pub fn effective_strategies(&self) -> Vec<SearchStrategy> {
        if self.strategies.is_empty() {
            default_strategies()
        } else {
            self.strategies.clone()
        }
    }
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Database file holding the cache, spend ledger and run history.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Companies processed concurrently per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Deduplicated candidates enriched per company.
    #[serde(default = "default_max_candidates")]
    pub max_candidates_per_company: usize,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            batch_size: default_batch_size(),
            max_candidates_per_company: default_max_candidates(),
        }
    }
}

fn default_database_path() -> String {
    "~/.prospector/prospector.db".into()
}
fn default_batch_size() -> usize {
    20
}
fn default_max_candidates() -> usize {
    25
}

/// What an external provider is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Company resolution + people search.
    PeopleSearch,
    /// Email lookup (also verifies emails sourced elsewhere).
    EmailFinder,
    /// Phone lookup.
    PhoneFinder,
    /// Independent identity verification.
    FactCheck,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PeopleSearch => "people_search",
            Self::EmailFinder => "email_finder",
            Self::PhoneFinder => "phone_finder",
            Self::FactCheck => "fact_check",
        }
    }
}

/// `[[providers]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Unique id used in logs, cache keys and the spend ledger.
    pub id: String,
    /// Provider role.
    pub kind: ProviderKind,
    /// API base URL.
    pub base_url: String,
    /// Name of the env var holding the API key (never store the key itself).
    pub api_key_env: String,
    /// Credits charged per answered call.
    #[serde(default = "default_cost_per_call")]
    pub cost_per_call: u64,
    /// Monthly credit cap.
    pub monthly_cap: u64,
    /// Concurrent in-flight calls allowed.
    #[serde(default = "default_provider_concurrency")]
    pub concurrency: usize,
    /// Per-call timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Whether running out of this provider's budget halts intake of new
    /// companies. `None` = critical when it is the only provider of its kind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critical: Option<bool>,
    /// Disabled providers are ignored entirely.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_cost_per_call() -> u64 {
    1
}
fn default_provider_concurrency() -> usize {
    5
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_true() -> bool {
    true
}

fn provider(
    id: &str,
    kind: ProviderKind,
    base_url: &str,
    api_key_env: &str,
    cost_per_call: u64,
    monthly_cap: u64,
    concurrency: usize,
) -> ProviderConfig {
    ProviderConfig {
        id: id.into(),
        kind,
        base_url: base_url.into(),
        api_key_env: api_key_env.into(),
        cost_per_call,
        monthly_cap,
        concurrency,
        timeout_secs: default_timeout_secs(),
        critical: None,
        enabled: true,
    }
}

/// Provider set written by `config init`; URLs must be edited before use.
fn default_providers() -> Vec<ProviderConfig> {
    vec![
        provider(
            "people-search",
            ProviderKind::PeopleSearch,
            "https://api.people-search.example.com",
            "PROSPECTOR_PEOPLE_SEARCH_KEY",
            1,
            10_000,
            8,
        ),
        provider(
            "email-finder-a",
            ProviderKind::EmailFinder,
            "https://api.email-finder-a.example.com",
            "PROSPECTOR_EMAIL_A_KEY",
            1,
            5_000,
            10,
        ),
        provider(
            "email-finder-b",
            ProviderKind::EmailFinder,
            "https://api.email-finder-b.example.com",
            "PROSPECTOR_EMAIL_B_KEY",
            2,
            2_500,
            6,
        ),
        provider(
            "phone-finder",
            ProviderKind::PhoneFinder,
            "https://api.phone-finder.example.com",
            "PROSPECTOR_PHONE_KEY",
            5,
            2_000,
            6,
        ),
        provider(
            "fact-check",
            ProviderKind::FactCheck,
            "https://api.fact-check.example.com",
            "PROSPECTOR_FACT_CHECK_KEY",
            1,
            5_000,
            5,
        ),
    ]
}

/// `[retry]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum attempts per call, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Cap on any single delay, including provider `Retry-After` hints.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Backoff growth factor between attempts.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    500
}
fn default_max_delay_ms() -> u64 {
    30_000
}
fn default_multiplier() -> f64 {
    2.0
}

/// `[verification]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationConfig {
    /// Confidence added per confirming source.
    #[serde(default = "default_confirm_increment")]
    pub confirm_increment: u8,
    /// Confidence removed per contradicting source.
    #[serde(default = "default_contradict_decrement")]
    pub contradict_decrement: u8,
    /// Independent sources consulted per channel.
    #[serde(default = "default_max_sources")]
    pub max_sources: usize,
    /// Jaro-Winkler similarity at which titles/companies count as the same.
    #[serde(default = "default_similarity")]
    pub similarity_threshold: f64,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            confirm_increment: default_confirm_increment(),
            contradict_decrement: default_contradict_decrement(),
            max_sources: default_max_sources(),
            similarity_threshold: default_similarity(),
        }
    }
}

fn default_confirm_increment() -> u8 {
    30
}
fn default_contradict_decrement() -> u8 {
    30
}
fn default_max_sources() -> usize {
    2
}
fn default_similarity() -> f64 {
    0.85
}

/// `[cache]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether provider responses are cached at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// TTL for company identity lookups.
    #[serde(default = "default_company_ttl")]
    pub company_ttl_hours: u64,
    /// TTL for people searches.
    #[serde(default = "default_search_ttl")]
    pub search_ttl_hours: u64,
    /// TTL for channel enrichment.
    #[serde(default = "default_enrich_ttl")]
    pub enrich_ttl_hours: u64,
    /// TTL for verification answers.
    #[serde(default = "default_verify_ttl")]
    pub verify_ttl_hours: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            company_ttl_hours: default_company_ttl(),
            search_ttl_hours: default_search_ttl(),
            enrich_ttl_hours: default_enrich_ttl(),
            verify_ttl_hours: default_verify_ttl(),
        }
    }
}

fn default_company_ttl() -> u64 {
    24 * 30
}
fn default_search_ttl() -> u64 {
    24
}
fn default_enrich_ttl() -> u64 {
    24 * 7
}
fn default_verify_ttl() -> u64 {
    24
}

// ---------------------------------------------------------------------------
// Pipeline config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime pipeline configuration, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Companies processed concurrently per batch.
    pub batch_size: usize,
    /// Deduplicated candidates enriched per company.
    pub max_candidates_per_company: usize,
    /// Search strategies, in execution order.
    pub strategies: Vec<SearchStrategy>,
    pub retry: RetryConfig,
    pub verification: VerificationConfig,
    pub cache: CacheConfig,
}

impl From<&AppConfig> for PipelineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            batch_size: config.defaults.batch_size.max(1),
            max_candidates_per_company: config.defaults.max_candidates_per_company,
            strategies: config.effective_strategies(),
            retry: config.retry.clone(),
            verification: config.verification.clone(),
            cache: config.cache.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.prospector/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ProspectorError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.prospector/prospector.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> Result<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => {
            let home = dirs::home_dir()
                .ok_or_else(|| ProspectorError::config("could not determine home directory"))?;
            Ok(home.join(rest))
        }
        None => Ok(PathBuf::from(path)),
    }
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ProspectorError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        ProspectorError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Structural checks that serde cannot express.
fn validate_config(config: &AppConfig) -> Result<()> {
    let mut seen = std::collections::HashSet::new();
    for p in &config.providers {
        if !seen.insert(p.id.as_str()) {
            return Err(ProspectorError::config(format!(
                "duplicate provider id '{}'",
                p.id
            )));
        }
        if p.concurrency == 0 {
            return Err(ProspectorError::config(format!(
                "provider '{}' must allow at least one concurrent call",
                p.id
            )));
        }
    }
    if config.retry.max_attempts == 0 {
        return Err(ProspectorError::config("retry.max_attempts must be >= 1"));
    }
    Ok(())
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ProspectorError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig {
        strategies: default_strategies(),
        ..AppConfig::default()
    };
    let content =
        toml::to_string_pretty(&config).map_err(|e| ProspectorError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ProspectorError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check that every enabled provider's API key env var is set and non-empty.
pub fn validate_api_keys(config: &AppConfig) -> Result<()> {
    let missing: Vec<&str> = config
        .providers
        .iter()
        .filter(|p| p.enabled)
        .map(|p| p.api_key_env.as_str())
        .filter(|var| !matches!(std::env::var(var), Ok(val) if !val.is_empty()))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ProspectorError::config(format!(
            "provider API keys not found. Set these environment variables: {}",
            missing.join(", ")
        )))
    }
}
