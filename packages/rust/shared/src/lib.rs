//! Shared types, error model, and configuration for Prospector.
//!
//! This crate is the foundation depended on by all other Prospector crates.
//! It provides:
//! - [`ProspectorError`] and [`ProviderError`]: error types
//! - Domain types ([`CompanyTarget`], [`Candidate`], [`EnrichedContact`],
//!   [`VerificationResult`], [`RoleAssignment`], [`RunReport`], ...)
//! - Configuration ([`AppConfig`], [`PipelineConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CacheConfig, DefaultsConfig, PipelineConfig, ProviderConfig, ProviderKind,
    RetryConfig, VerificationConfig, config_dir, config_file_path, expand_home, init_config,
    load_config, load_config_from, validate_api_keys,
};
pub use error::{ProspectorError, ProviderError, Result};
pub use types::{
    BuyerGroupSummary, BuyerRole, Candidate, Channel, ChannelType, CompanyFailure, CompanyResult,
    CompanyStatus, CompanyTarget, ContactResult, EngagementStrategy, EnrichedContact, RoleAssignment,
    RunId, RunLedgerEntry, RunReport, SearchStrategy, Seniority, SinkChannel, SinkContact,
    SinkRecord, VerificationResult, VerificationStatus, VerifiedChannel, VerifiedContact,
    default_strategies,
};
