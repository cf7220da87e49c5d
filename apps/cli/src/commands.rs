//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use prospector_core::{JsonLinesSink, Orchestrator, ProgressReporter, RecordFormat};
use prospector_providers::ProviderRegistry;
use prospector_shared::{
    AppConfig, CompanyResult, CompanyStatus, PipelineConfig, RunReport, expand_home, init_config,
    load_config, load_config_from, validate_api_keys,
};
use prospector_storage::{Storage, current_month};
use tracing::info;

use crate::input::load_targets;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Prospector: find and verify buyer groups at target companies.
#[derive(Parser)]
#[command(
    name = "prospector",
    version,
    about = "Discover, verify and classify executive contacts across metered data providers.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.prospector/prospector.toml).
    #[arg(long, global = true, env = "PROSPECTOR_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the pipeline over a list of companies.
    Run {
        /// Input file: JSON array or JSON lines of {name, website?, industry?, employee_count?}.
        #[arg(short, long)]
        input: PathBuf,

        /// Output JSON-lines file, one record per company.
        #[arg(short, long)]
        out: PathBuf,

        /// Write full records (verification detail, buyer group) instead of the CRM shape.
        #[arg(long)]
        full: bool,

        /// Companies processed concurrently per batch.
        #[arg(long)]
        batch_size: Option<usize>,

        /// Deduplicated candidates enriched per company.
        #[arg(long)]
        max_candidates: Option<usize>,

        /// Bypass the response cache for this run.
        #[arg(long)]
        no_cache: bool,
    },

    /// Show this month's credit budget per provider.
    Budget,

    /// Show run history.
    Runs {
        /// Number of runs to list.
        #[arg(long, default_value = "10")]
        limit: u32,

        /// Print the full report of one run.
        #[arg(long)]
        id: Option<String>,
    },

    /// Response cache maintenance.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Cache subcommands.
#[derive(Subcommand)]
pub(crate) enum CacheAction {
    /// Entry counts per provider and query type.
    Stats,
    /// Delete cache entries.
    Purge {
        /// Only delete entries past their TTL.
        #[arg(long)]
        expired: bool,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "prospector=info",
        1 => "prospector=debug",
        _ => "prospector=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config;
    match cli.command {
        Command::Run {
            input,
            out,
            full,
            batch_size,
            max_candidates,
            no_cache,
        } => {
            let overrides = RunOverrides {
                batch_size,
                max_candidates,
                no_cache,
            };
            cmd_run(config_path.as_deref(), &input, &out, full, overrides).await
        }
        Command::Budget => cmd_budget(config_path.as_deref()).await,
        Command::Runs { limit, id } => cmd_runs(config_path.as_deref(), limit, id.as_deref()).await,
        Command::Cache { action } => match action {
            CacheAction::Stats => cmd_cache_stats(config_path.as_deref()).await,
            CacheAction::Purge { expired } => cmd_cache_purge(config_path.as_deref(), expired).await,
        },
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(config_path.as_deref()).await,
        },
    }
}

fn config_from(path: Option<&Path>) -> Result<AppConfig> {
    Ok(match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    })
}

fn database_path(config: &AppConfig) -> Result<PathBuf> {
    Ok(expand_home(&config.defaults.database_path)?)
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

/// CLI flags that override `[defaults]` / `[cache]` for one run.
struct RunOverrides {
    batch_size: Option<usize>,
    max_candidates: Option<usize>,
    no_cache: bool,
}

async fn cmd_run(
    config_path: Option<&Path>,
    input: &Path,
    out: &Path,
    full: bool,
    overrides: RunOverrides,
) -> Result<()> {
    // Validate API keys before doing anything
    let config = config_from(config_path)?;
    validate_api_keys(&config)?;

    let targets = load_targets(input)?;
    if targets.is_empty() {
        return Err(eyre!("no companies found in '{}'", input.display()));
    }

    let mut pipeline = PipelineConfig::from(&config);
    if let Some(n) = overrides.batch_size {
        pipeline.batch_size = n.max(1);
    }
    if let Some(n) = overrides.max_candidates {
        pipeline.max_candidates_per_company = n;
    }
    if overrides.no_cache {
        pipeline.cache.enabled = false;
    }

    let registry = ProviderRegistry::from_config(&config)?;
    if registry.is_empty() {
        return Err(eyre!("no providers enabled in config"));
    }

    let storage = Arc::new(Storage::open(&database_path(&config)?).await?);
    let orchestrator =
        Orchestrator::new(registry, &config.providers, pipeline).with_storage(storage);

    let format = if full {
        RecordFormat::Full
    } else {
        RecordFormat::Contract
    };
    let mut sink = JsonLinesSink::create(out, format)?;

    info!(
        input = %input.display(),
        out = %out.display(),
        companies = targets.len(),
        "starting run"
    );

    let reporter = CliProgress::new(targets.len());
    let report = orchestrator.run(targets, &mut sink, &reporter).await?;

    print_report(&report, out);
    Ok(())
}

fn print_report(report: &RunReport, out: &Path) {
    println!();
    println!("  Run {} finished", report.run_id);
    println!("  Companies:  {}", report.companies_total);
    println!("    complete: {}", report.companies_complete);
    println!("    partial:  {}", report.companies_partial);
    println!("    failed:   {}", report.companies_failed);
    if report.companies_skipped > 0 {
        println!("    skipped:  {} (budget exhausted)", report.companies_skipped);
    }
    println!("  Credits:    {}", report.total_credits_spent);
    println!("  Cache hits: {:.1}%", report.cache_hit_rate * 100.0);
    if report.fatal_errors > 0 {
        println!("  Fatal provider errors: {}", report.fatal_errors);
    }
    println!("  Time:       {:.1}s", report.duration_ms as f64 / 1000.0);
    println!("  Output:     {}", out.display());
    println!();

    println!(
        "  {:<20} {:>8} {:>8} {:>10} {:>10}",
        "provider", "calls", "credits", "cache hits", "remaining"
    );
    for entry in &report.per_provider_spend {
        let remaining = report
            .remaining_budget
            .get(&entry.provider)
            .copied()
            .unwrap_or(0);
        println!(
            "  {:<20} {:>8} {:>8} {:>10} {:>10}",
            entry.provider, entry.calls_made, entry.credits_spent, entry.cache_hits, remaining
        );
    }

    if !report.failures.is_empty() {
        println!();
        println!("  Failed companies:");
        for failure in &report.failures {
            println!("    {}: {}", failure.company, failure.reason);
        }
    }
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif bar.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new(total: usize) -> Self {
        let bar = ProgressBar::new(total as u64);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        bar.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { bar }
    }
}

impl ProgressReporter for CliProgress {
    fn batch_started(&self, batch: usize, size: usize, _completed: usize, _total: usize) {
        self.bar
            .set_message(format!("batch {} ({size} companies)", batch + 1));
    }

    fn company_finished(&self, result: &CompanyResult, completed: usize, _total: usize) {
        let status = match result.status {
            CompanyStatus::Complete => "ok",
            CompanyStatus::Partial => "partial",
            CompanyStatus::Failed => "failed",
        };
        self.bar.set_position(completed as u64);
        self.bar.set_message(format!(
            "{} [{status}, {} contacts]",
            result.target.name,
            result.contacts.len()
        ));
    }

    fn done(&self, _report: &RunReport) {
        self.bar.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// budget / runs / cache
// ---------------------------------------------------------------------------

async fn cmd_budget(config_path: Option<&Path>) -> Result<()> {
    let config = config_from(config_path)?;
    let month = current_month();

    // A missing database just means nothing was spent yet.
    let spend = match Storage::open_readonly(&database_path(&config)?).await {
        Ok(storage) => storage.list_monthly_spend(&month).await?,
        Err(_) => Vec::new(),
    };

    println!();
    println!("  Budget for {month}");
    println!(
        "  {:<20} {:>10} {:>10} {:>10} {:>8}",
        "provider", "cap", "spent", "remaining", "calls"
    );
    for provider in &config.providers {
        let row = spend.iter().find(|r| r.provider == provider.id);
        let spent = row.map(|r| r.credits).unwrap_or(0);
        let calls = row.map(|r| r.calls).unwrap_or(0);
        let flag = if provider.enabled { "" } else { "  (disabled)" };
        println!(
            "  {:<20} {:>10} {:>10} {:>10} {:>8}{flag}",
            provider.id,
            provider.monthly_cap,
            spent,
            provider.monthly_cap.saturating_sub(spent),
            calls
        );
    }
    println!();
    Ok(())
}

async fn cmd_runs(config_path: Option<&Path>, limit: u32, id: Option<&str>) -> Result<()> {
    let config = config_from(config_path)?;
    let storage = Storage::open_readonly(&database_path(&config)?).await?;

    if let Some(id) = id {
        let report = storage
            .get_run(id)
            .await?
            .ok_or_else(|| eyre!("no run with id '{id}'"))?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let runs = storage.list_runs(limit).await?;
    if runs.is_empty() {
        println!("No runs recorded yet.");
        return Ok(());
    }
    println!(
        "  {:<38} {:<20} {:>7} {:>9} {:>7} {:>8}",
        "id", "started", "total", "processed", "failed", "credits"
    );
    for run in runs {
        let exhausted = if run.budget_exhausted { "  budget exhausted" } else { "" };
        println!(
            "  {:<38} {:<20} {:>7} {:>9} {:>7} {:>8}{exhausted}",
            run.id,
            run.started_at.format("%Y-%m-%d %H:%M:%S"),
            run.companies_total,
            run.companies_processed,
            run.companies_failed,
            run.credits_spent
        );
    }
    Ok(())
}

async fn cmd_cache_stats(config_path: Option<&Path>) -> Result<()> {
    let config = config_from(config_path)?;
    let storage = Storage::open_readonly(&database_path(&config)?).await?;
    let rows = storage.cache_stats().await?;

    if rows.is_empty() {
        println!("Cache is empty.");
        return Ok(());
    }
    println!(
        "  {:<20} {:<10} {:>8} {:>8}",
        "provider", "query", "entries", "expired"
    );
    for row in rows {
        println!(
            "  {:<20} {:<10} {:>8} {:>8}",
            row.provider, row.query_type, row.entries, row.expired
        );
    }
    Ok(())
}

async fn cmd_cache_purge(config_path: Option<&Path>, expired_only: bool) -> Result<()> {
    let config = config_from(config_path)?;
    let storage = Storage::open(&database_path(&config)?).await?;
    let removed = storage.purge_cache(expired_only).await?;
    let what = if expired_only { "expired " } else { "" };
    println!("Removed {removed} {what}cache entries.");
    Ok(())
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = config_from(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
