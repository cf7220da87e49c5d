//! SQL migration definitions for the Prospector database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Initial schema: response_cache, provider_spend, runs",
            sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Provider responses keyed by (provider, query type, normalized params) hash
CREATE TABLE IF NOT EXISTS response_cache (
    cache_key    TEXT PRIMARY KEY,
    provider     TEXT NOT NULL,
    query_type   TEXT NOT NULL,
    payload_json TEXT NOT NULL,
    created_at   INTEGER NOT NULL,
    expires_at   INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_cache_expires ON response_cache(expires_at);
CREATE INDEX IF NOT EXISTS idx_cache_provider ON response_cache(provider);

-- Credits spent per provider per calendar month (YYYY-MM)
CREATE TABLE IF NOT EXISTS provider_spend (
    provider   TEXT NOT NULL,
    month      TEXT NOT NULL,
    credits    INTEGER NOT NULL DEFAULT 0,
    calls      INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (provider, month)
);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
        },
        Migration {
            version: 2,
            description: "Run history",
            sql: r#"
CREATE TABLE IF NOT EXISTS runs (
    id                  TEXT PRIMARY KEY,
    started_at          TEXT NOT NULL,
    finished_at         TEXT NOT NULL,
    companies_total     INTEGER NOT NULL,
    companies_processed INTEGER NOT NULL,
    companies_failed    INTEGER NOT NULL,
    credits_spent       INTEGER NOT NULL,
    budget_exhausted    INTEGER NOT NULL,
    report_json         TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_runs_started ON runs(started_at);

INSERT INTO schema_migrations (version) VALUES (2);
"#,
        },
    ]
}
