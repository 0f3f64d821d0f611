use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use jobharvest::config::Config;
use jobharvest::crawler::{CrawlEngine, CrawlRunner, HttpFetcher};
use jobharvest::dedup::DedupStrategy;
use jobharvest::models::{CrawlSite, ExtractionRules, PaginationConfig};
use jobharvest::scheduler::CrawlScheduler;
use jobharvest::storage::{
    CrawlLogRepository, JobRepository, SiteRepository, SqliteCrawlLogRepository,
    SqliteJobRepository, SqliteSiteRepository,
};
use jobharvest::sync::SyncService;

#[derive(Parser)]
#[command(
    name = "jobharvest",
    version,
    about = "Configuration-driven job listing crawler with scheduled sync",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    /// SQLite database path (overrides JOBHARVEST_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler and periodic sync until interrupted
    Run,

    /// Crawl a single site once
    Crawl {
        /// Site id to crawl
        #[arg(short, long)]
        site: String,
    },

    /// Push unsynced jobs to the downstream job board
    Sync,

    /// Register a crawl site from a JSON definition file
    AddSite {
        /// Path to the site definition
        #[arg(short, long)]
        file: PathBuf,
    },

    /// List all registered sites
    ListSites,

    /// Delete a site by id
    RemoveSite {
        /// Site id to delete
        id: String,
    },

    /// Show crawl logs for a site
    Logs {
        /// Site id
        #[arg(short, long)]
        site: String,

        /// Only the most recent log
        #[arg(long, default_value = "false")]
        latest: bool,
    },
}

/// Site definition accepted by `add-site`; identifiers and timestamps are
/// assigned on insert
#[derive(Deserialize)]
struct SiteDefinition {
    name: String,
    base_url: String,
    #[serde(default)]
    backend_startup_id: String,
    #[serde(default = "default_active")]
    active: bool,
    schedule: String,
    #[serde(default)]
    crawl_interval: String,
    #[serde(default)]
    pagination_config: PaginationConfig,
    #[serde(default)]
    extraction_rules: ExtractionRules,
    #[serde(default)]
    deduplication_key: DedupStrategy,
    #[serde(default)]
    request_delay: u64,
    #[serde(default)]
    user_agent: String,
}

fn default_active() -> bool {
    true
}

struct Repositories {
    sites: Arc<SqliteSiteRepository>,
    jobs: Arc<SqliteJobRepository>,
    logs: Arc<SqliteCrawlLogRepository>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_tracing(&cli.log_format, cli.verbose)?;

    let mut config = Config::from_env();
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    config.validate()?;

    let repos = open_repositories(&config)?;

    match cli.command {
        Commands::Run => run(&config, &repos).await?,
        Commands::Crawl { site } => crawl(&config, &repos, &site).await?,
        Commands::Sync => sync(&config, &repos).await?,
        Commands::AddSite { file } => add_site(&repos, &file).await?,
        Commands::ListSites => list_sites(&repos).await?,
        Commands::RemoveSite { id } => remove_site(&repos, &id).await?,
        Commands::Logs { site, latest } => logs(&repos, &site, latest).await?,
    }

    Ok(())
}

fn setup_tracing(format: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("jobharvest=debug,info")
    } else {
        tracing_subscriber::EnvFilter::new("jobharvest=info,warn")
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    Ok(())
}

fn open_repositories(config: &Config) -> Result<Repositories> {
    if let Some(parent) = config.db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }

    Ok(Repositories {
        sites: Arc::new(SqliteSiteRepository::new(&config.db_path)?),
        jobs: Arc::new(SqliteJobRepository::new(&config.db_path)?),
        logs: Arc::new(SqliteCrawlLogRepository::new(&config.db_path)?),
    })
}

fn build_runner(config: &Config, repos: &Repositories) -> Result<Arc<CrawlRunner>> {
    let fetcher = Arc::new(HttpFetcher::with_timeout(config.http_timeout())?);
    let engine = Arc::new(CrawlEngine::new(fetcher, repos.jobs.clone()));
    Ok(Arc::new(CrawlRunner::new(
        engine,
        repos.sites.clone(),
        repos.logs.clone(),
    )))
}

async fn run(config: &Config, repos: &Repositories) -> Result<()> {
    tracing::info!(db = %config.db_path.display(), "jobharvest starting");

    let runner = build_runner(config, repos)?;
    let mut scheduler = CrawlScheduler::new(runner, repos.sites.clone()).await?;
    scheduler.start().await?;

    let sync_service = Arc::new(
        SyncService::new(
            config.backend_url.clone(),
            config.api_token.clone(),
            repos.jobs.clone() as Arc<dyn JobRepository>,
            repos.sites.clone() as Arc<dyn SiteRepository>,
        )?,
    );

    let sync_cancel = CancellationToken::new();
    let sync_handle = {
        let sync_service = sync_service.clone();
        let cancel = sync_cancel.clone();
        let interval = config.sync_interval();
        tokio::spawn(async move {
            sync_service.run_periodic(interval, cancel).await;
        })
    };

    tracing::info!(
        sites = scheduler.scheduled_count().await,
        sync_interval_secs = config.sync_interval_secs,
        "running; press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    tracing::info!("shutting down");
    sync_cancel.cancel();
    scheduler.shutdown().await?;
    sync_handle.await.ok();

    Ok(())
}

async fn crawl(config: &Config, repos: &Repositories, site_id: &str) -> Result<()> {
    let runner = build_runner(config, repos)?;
    let result = runner.run(site_id, &CancellationToken::new()).await?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn sync(config: &Config, repos: &Repositories) -> Result<()> {
    let sync_service = SyncService::new(
        config.backend_url.clone(),
        config.api_token.clone(),
        repos.jobs.clone() as Arc<dyn JobRepository>,
        repos.sites.clone() as Arc<dyn SiteRepository>,
    )?;

    let result = sync_service.sync_jobs().await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn add_site(repos: &Repositories, file: &PathBuf) -> Result<()> {
    let raw = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let definition: SiteDefinition =
        serde_json::from_str(&raw).context("invalid site definition")?;

    let now = Utc::now();
    let site = CrawlSite {
        id: Uuid::new_v4().to_string(),
        name: definition.name,
        base_url: definition.base_url,
        backend_startup_id: definition.backend_startup_id,
        active: definition.active,
        schedule: definition.schedule,
        last_crawled_at: None,
        next_crawl_at: None,
        crawl_interval: definition.crawl_interval,
        pagination_config: definition.pagination_config,
        extraction_rules: definition.extraction_rules,
        deduplication_key: definition.deduplication_key,
        request_delay: definition.request_delay,
        user_agent: definition.user_agent,
        created_at: now,
        updated_at: now,
    };

    repos.sites.create(&site).await?;
    println!("registered site {} ({})", site.name, site.id);
    Ok(())
}

async fn list_sites(repos: &Repositories) -> Result<()> {
    let sites = repos.sites.find_all().await?;
    if sites.is_empty() {
        println!("no sites registered");
        return Ok(());
    }

    for site in sites {
        println!(
            "{}  {}  active={}  schedule={:?}  last_crawled={}",
            site.id,
            site.name,
            site.active,
            site.schedule,
            site.last_crawled_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "never".to_string()),
        );
    }
    Ok(())
}

async fn remove_site(repos: &Repositories, id: &str) -> Result<()> {
    repos.sites.delete(id).await?;
    println!("removed site {id}");
    Ok(())
}

async fn logs(repos: &Repositories, site_id: &str, latest: bool) -> Result<()> {
    if latest {
        match repos.logs.find_latest_by_site(site_id).await? {
            Some(log) => println!("{}", serde_json::to_string_pretty(&log)?),
            None => println!("no crawl logs for site {site_id}"),
        }
        return Ok(());
    }

    let entries = repos.logs.find_by_site(site_id).await?;
    if entries.is_empty() {
        println!("no crawl logs for site {site_id}");
        return Ok(());
    }
    println!("{}", serde_json::to_string_pretty(&entries)?);
    Ok(())
}
