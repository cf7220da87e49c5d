//! Turso Embedded / libSQL storage layer (offline mode).
//!
//! The [`Storage`] struct wraps a libSQL database holding the provider
//! response cache, the monthly per-provider spend ledger, and run history.
//!
//! **Access rules:**
//! - `prospector run` / `cache purge`: read-write via [`Storage::open`]
//! - `budget`, `runs`, `cache stats`: read-only via [`Storage::open_readonly`]

mod migrations;

use std::path::Path;

use chrono::{DateTime, Utc};
use libsql::{Connection, Database, params};
use prospector_shared::{ProspectorError, Result, RunReport};

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

fn storage_err(e: impl std::fmt::Display) -> ProspectorError {
    ProspectorError::Storage(e.to_string())
}

/// Calendar month key (`YYYY-MM`) used by the spend ledger.
pub fn month_key(at: DateTime<Utc>) -> String {
    at.format("%Y-%m").to_string()
}

/// Month key for "now".
pub fn current_month() -> String {
    month_key(Utc::now())
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ProspectorError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open a database at `path` in read-only mode (reporting commands).
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ProspectorError::Storage(format!(
                "database not found at {}",
                path.display()
            )));
        }
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        ProspectorError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(ProspectorError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Response cache
    // -----------------------------------------------------------------------

    /// Look up a live (unexpired) cache entry.
    pub async fn get_cached_response(&self, cache_key: &str) -> Result<Option<String>> {
        let now = Utc::now().timestamp();
        let mut rows = self
            .conn
            .query(
                "SELECT payload_json FROM response_cache
                 WHERE cache_key = ?1 AND expires_at > ?2",
                params![cache_key, now],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row.get::<String>(0).map_err(storage_err)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(storage_err(e)),
        }
    }

    /// Store a provider response (upserts). `ttl_secs` of 0 stores nothing.
    pub async fn put_cached_response(
        &self,
        cache_key: &str,
        provider: &str,
        query_type: &str,
        payload_json: &str,
        ttl_secs: i64,
    ) -> Result<()> {
        self.check_writable()?;
        if ttl_secs <= 0 {
            return Ok(());
        }
        let now = Utc::now().timestamp();
        self.conn
            .execute(
                "INSERT INTO response_cache (cache_key, provider, query_type, payload_json, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(cache_key) DO UPDATE SET
                   payload_json = excluded.payload_json,
                   created_at = excluded.created_at,
                   expires_at = excluded.expires_at",
                params![
                    cache_key,
                    provider,
                    query_type,
                    payload_json,
                    now,
                    now + ttl_secs
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    /// Delete cache entries. With `expired_only`, only entries past their TTL.
    /// Returns the number of rows removed.
    pub async fn purge_cache(&self, expired_only: bool) -> Result<u64> {
        self.check_writable()?;
        let removed = if expired_only {
            self.conn
                .execute(
                    "DELETE FROM response_cache WHERE expires_at <= ?1",
                    params![Utc::now().timestamp()],
                )
                .await
        } else {
            self.conn
                .execute("DELETE FROM response_cache", params![])
                .await
        }
        .map_err(storage_err)?;
        Ok(removed)
    }

    /// Entry counts per provider and query type.
    pub async fn cache_stats(&self) -> Result<Vec<CacheStatsRow>> {
        let now = Utc::now().timestamp();
        let mut rows = self
            .conn
            .query(
                "SELECT provider, query_type, COUNT(*),
                        SUM(CASE WHEN expires_at <= ?1 THEN 1 ELSE 0 END)
                 FROM response_cache
                 GROUP BY provider, query_type
                 ORDER BY provider, query_type",
                params![now],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            results.push(CacheStatsRow {
                provider: row.get::<String>(0).map_err(storage_err)?,
                query_type: row.get::<String>(1).map_err(storage_err)?,
                entries: row.get::<i64>(2).map_err(storage_err)? as u64,
                expired: row.get::<i64>(3).unwrap_or(0) as u64,
            });
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Spend ledger
    // -----------------------------------------------------------------------

    /// Credits already spent on `provider` during `month`.
    pub async fn get_monthly_spend(&self, provider: &str, month: &str) -> Result<u64> {
        let mut rows = self
            .conn
            .query(
                "SELECT credits FROM provider_spend WHERE provider = ?1 AND month = ?2",
                params![provider, month],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(row.get::<i64>(0).map_err(storage_err)?.max(0) as u64),
            Ok(None) => Ok(0),
            Err(e) => Err(storage_err(e)),
        }
    }

    /// Add credits and calls to the running monthly total for `provider`.
    pub async fn add_monthly_spend(
        &self,
        provider: &str,
        month: &str,
        credits: u64,
        calls: u64,
    ) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO provider_spend (provider, month, credits, calls, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(provider, month) DO UPDATE SET
                   credits = credits + excluded.credits,
                   calls = calls + excluded.calls,
                   updated_at = excluded.updated_at",
                params![provider, month, credits as i64, calls as i64, now.as_str()],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    /// All provider totals for `month`.
    pub async fn list_monthly_spend(&self, month: &str) -> Result<Vec<SpendRow>> {
        let mut rows = self
            .conn
            .query(
                "SELECT provider, credits, calls FROM provider_spend
                 WHERE month = ?1 ORDER BY provider",
                params![month],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            results.push(SpendRow {
                provider: row.get::<String>(0).map_err(storage_err)?,
                credits: row.get::<i64>(1).map_err(storage_err)?.max(0) as u64,
                calls: row.get::<i64>(2).map_err(storage_err)?.max(0) as u64,
            });
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Run history
    // -----------------------------------------------------------------------

    /// Persist a finished run's report.
    pub async fn insert_run(&self, report: &RunReport) -> Result<()> {
        self.check_writable()?;
        let report_json = serde_json::to_string(report).map_err(storage_err)?;
        self.conn
            .execute(
                "INSERT INTO runs (id, started_at, finished_at, companies_total, companies_processed,
                                   companies_failed, credits_spent, budget_exhausted, report_json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    report.run_id.to_string(),
                    report.started_at.to_rfc3339(),
                    report.finished_at.to_rfc3339(),
                    report.companies_total as i64,
                    report.companies_processed as i64,
                    report.companies_failed as i64,
                    report.total_credits_spent as i64,
                    i64::from(report.budget_exhausted),
                    report_json
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    /// Most recent runs first.
    pub async fn list_runs(&self, limit: u32) -> Result<Vec<RunSummary>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, started_at, companies_total, companies_processed,
                        companies_failed, credits_spent, budget_exhausted
                 FROM runs ORDER BY started_at DESC LIMIT ?1",
                params![limit],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            results.push(RunSummary {
                id: row.get::<String>(0).map_err(storage_err)?,
                started_at: parse_timestamp(&row.get::<String>(1).map_err(storage_err)?)?,
                companies_total: row.get::<i64>(2).map_err(storage_err)? as u64,
                companies_processed: row.get::<i64>(3).map_err(storage_err)? as u64,
                companies_failed: row.get::<i64>(4).map_err(storage_err)? as u64,
                credits_spent: row.get::<i64>(5).map_err(storage_err)? as u64,
                budget_exhausted: row.get::<i64>(6).map_err(storage_err)? != 0,
            });
        }
        Ok(results)
    }

    /// Full report for one run.
    pub async fn get_run(&self, id: &str) -> Result<Option<RunReport>> {
        let mut rows = self
            .conn
            .query("SELECT report_json FROM runs WHERE id = ?1", params![id])
            .await
            .map_err(storage_err)?;

        match rows.next().await {
            Ok(Some(row)) => {
                let json: String = row.get(0).map_err(storage_err)?;
                let report = serde_json::from_str(&json)
                    .map_err(|e| ProspectorError::parse(format!("stored run {id}: {e}")))?;
                Ok(Some(report))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(storage_err(e)),
        }
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ProspectorError::Storage(format!("invalid date: {e}")))
}

/// Cache occupancy for one provider/query type pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStatsRow {
    pub provider: String,
    pub query_type: String,
    pub entries: u64,
    /// Entries past their TTL but not yet purged.
    pub expired: u64,
}

/// Monthly spend for one provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpendRow {
    pub provider: String,
    pub credits: u64,
    pub calls: u64,
}

/// One line of run history.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub companies_total: u64,
    pub companies_processed: u64,
    pub companies_failed: u64,
    pub credits_spent: u64,
    pub budget_exhausted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use chrono::TimeZone;
    use prospector_shared::{RunId, RunLedgerEntry};
    use uuid::Uuid;

    /// Create a temp file storage for testing.
    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("prospector_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn sample_report() -> RunReport {
        let now = Utc::now();
        RunReport {
            run_id: RunId::new(),
            started_at: now,
            finished_at: now,
            companies_total: 3,
            companies_processed: 2,
            companies_complete: 1,
            companies_partial: 1,
            companies_failed: 1,
            companies_skipped: 0,
            failures: Vec::new(),
            budget_exhausted: false,
            total_credits_spent: 42,
            per_provider_spend: vec![RunLedgerEntry {
                provider: "people-search".into(),
                calls_made: 10,
                credits_spent: 42,
                cache_hits: 3,
            }],
            remaining_budget: BTreeMap::new(),
            cache_hit_rate: 0.23,
            fatal_errors: 0,
            duration_ms: 1200,
        }
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        assert_eq!(storage.get_schema_version().await, 2);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("prospector_test_{}.db", Uuid::now_v7()));
        let s1 = Storage::open(&tmp).await.expect("first open");
        drop(s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 2);
    }

    #[test]
    fn month_key_format() {
        let at = Utc.with_ymd_and_hms(2026, 3, 9, 12, 0, 0).unwrap();
        assert_eq!(month_key(at), "2026-03");
    }

    #[tokio::test]
    async fn cache_roundtrip_and_upsert() {
        let storage = test_storage().await;

        assert!(storage.get_cached_response("k1").await.unwrap().is_none());

        storage
            .put_cached_response("k1", "people-search", "search", r#"{"status":"ok"}"#, 3600)
            .await
            .expect("put");
        let hit = storage.get_cached_response("k1").await.unwrap();
        assert_eq!(hit.as_deref(), Some(r#"{"status":"ok"}"#));

        storage
            .put_cached_response("k1", "people-search", "search", r#"{"status":"not_found"}"#, 3600)
            .await
            .expect("upsert");
        let hit = storage.get_cached_response("k1").await.unwrap().unwrap();
        assert!(hit.contains("not_found"));
    }

    #[tokio::test]
    async fn zero_ttl_is_not_stored() {
        let storage = test_storage().await;
        storage
            .put_cached_response("k0", "p", "search", "{}", 0)
            .await
            .unwrap();
        assert!(storage.get_cached_response("k0").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_entries_are_misses_and_purgeable() {
        let storage = test_storage().await;
        storage
            .put_cached_response("live", "p", "search", "{}", 3600)
            .await
            .unwrap();
        // Backdate a row directly.
        storage
            .conn
            .execute(
                "INSERT INTO response_cache VALUES ('stale', 'p', 'enrich', '{}', 0, 1)",
                params![],
            )
            .await
            .unwrap();

        assert!(storage.get_cached_response("stale").await.unwrap().is_none());

        let stats = storage.cache_stats().await.unwrap();
        let expired: u64 = stats.iter().map(|s| s.expired).sum();
        let entries: u64 = stats.iter().map(|s| s.entries).sum();
        assert_eq!((entries, expired), (2, 1));

        assert_eq!(storage.purge_cache(true).await.unwrap(), 1);
        assert!(storage.get_cached_response("live").await.unwrap().is_some());
        assert_eq!(storage.purge_cache(false).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn spend_accumulates_per_month() {
        let storage = test_storage().await;
        assert_eq!(storage.get_monthly_spend("email-a", "2026-01").await.unwrap(), 0);

        storage.add_monthly_spend("email-a", "2026-01", 10, 10).await.unwrap();
        storage.add_monthly_spend("email-a", "2026-01", 5, 3).await.unwrap();
        storage.add_monthly_spend("email-a", "2026-02", 7, 7).await.unwrap();

        assert_eq!(storage.get_monthly_spend("email-a", "2026-01").await.unwrap(), 15);
        assert_eq!(storage.get_monthly_spend("email-a", "2026-02").await.unwrap(), 7);

        let rows = storage.list_monthly_spend("2026-01").await.unwrap();
        assert_eq!(
            rows,
            vec![SpendRow {
                provider: "email-a".into(),
                credits: 15,
                calls: 13
            }]
        );
    }

    #[tokio::test]
    async fn run_history() {
        let storage = test_storage().await;
        let report = sample_report();
        storage.insert_run(&report).await.expect("insert run");

        let runs = storage.list_runs(10).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].id, report.run_id.to_string());
        assert_eq!(runs[0].credits_spent, 42);
        assert!(!runs[0].budget_exhausted);

        let stored = storage
            .get_run(&report.run_id.to_string())
            .await
            .unwrap()
            .expect("stored report");
        assert_eq!(stored.per_provider_spend, report.per_provider_spend);
        assert!(storage.get_run("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn readonly_rejects_writes() {
        let tmp = std::env::temp_dir().join(format!("prospector_test_{}.db", Uuid::now_v7()));
        let rw = Storage::open(&tmp).await.unwrap();
        rw.add_monthly_spend("p", "2026-01", 1, 1).await.unwrap();
        drop(rw);

        let ro = Storage::open_readonly(&tmp).await.unwrap();
        assert_eq!(ro.get_monthly_spend("p", "2026-01").await.unwrap(), 1);
        let result = ro.add_monthly_spend("p", "2026-01", 1, 1).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("read-only"));
    }

    #[tokio::test]
    async fn readonly_requires_existing_file() {
        let tmp = std::env::temp_dir().join(format!("prospector_missing_{}.db", Uuid::now_v7()));
        assert!(Storage::open_readonly(&tmp).await.is_err());
    }
}
