use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tubesearch::{
    config::Config,
    credentials::FileCredentialStore,
    database::Database,
    errors::GatewayError,
    maintenance::MaintenanceScheduler,
    models::ResultRecord,
    repositories::{ResultCache, UsageLedger},
    services::Gateway,
    sources::YouTubeClient,
    utils::SystemClock,
};

#[derive(Parser)]
#[command(name = "tubesearch")]
#[command(version)]
#[command(about = "Quota-aware YouTube search with API key rotation and a persistent cache")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Database URL (overrides config file)
    #[arg(short = 'd', long, value_name = "URL")]
    database_url: Option<String>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Search for one query
    Search {
        query: String,
        #[arg(short = 'n', long)]
        max_results: Option<u32>,
    },
    /// Search every line of a file, stopping when all keys are spent
    Batch {
        file: PathBuf,
        #[arg(short = 'n', long)]
        max_results: Option<u32>,
    },
    /// Replace and persist the API key list
    SetKeys {
        #[arg(required = true)]
        keys: Vec<String>,
    },
    /// Show today's per-key usage
    Usage,
    /// Delete cached searches, thumbnails and usage records
    ClearCache,
    /// Run scheduled maintenance until interrupted
    Maintain,
    /// Print placeholder results without touching the network
    Synthetic {
        query: String,
        #[arg(short = 'n', long, default_value_t = 5)]
        count: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = format!("tubesearch={}", cli.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    std::env::set_var("CONFIG_FILE", &cli.config);
    let mut config = Config::load()?;
    info!("Configuration loaded from: {}", cli.config);

    if let Some(database_url) = cli.database_url {
        config.database.url = database_url;
    }

    let database = Database::new(&config.database).await?;
    database.migrate().await?;
    info!("Using database: {}", config.database.url);

    let ledger = UsageLedger::new(database.pool());
    let cache = ResultCache::new(database.pool());
    let gateway = Gateway::new(
        ledger.clone(),
        cache.clone(),
        Arc::new(
            YouTubeClient::new(&config.youtube).context("Failed to build YouTube HTTP client")?,
        ),
        Arc::new(FileCredentialStore::new(&config.credentials.key_file)),
        config.youtube.daily_quota,
    );
    gateway
        .load_credentials()
        .await
        .context("Failed to load API credentials")?;

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, shutting down");
            signal_token.cancel();
        }
    });

    let default_max = config.youtube.default_max_results;
    match cli.command {
        Command::Search { query, max_results } => {
            let results = gateway
                .search_with_cancel(&query, max_results.unwrap_or(default_max), &shutdown)
                .await?;
            if results.is_empty() {
                println!("No results for '{}'", query);
            }
            for (position, record) in results.iter().enumerate() {
                print_record(position + 1, record);
            }
        }
        Command::Batch { file, max_results } => {
            let contents = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            run_batch(&gateway, &contents, max_results.unwrap_or(default_max), &shutdown).await;
        }
        Command::SetKeys { keys } => {
            if gateway.set_credentials(&keys).await {
                println!("Stored {} API keys", gateway.credentials().await.len());
            } else {
                warn!("No usable keys given; key list unchanged");
            }
        }
        Command::Usage => {
            let usage = gateway.usage_snapshot().await;
            if usage.is_empty() {
                println!("No API keys configured");
            }
            for entry in usage {
                println!(
                    "{} #{} {}  calls={} remaining={}{}",
                    if entry.is_current { "*" } else { " " },
                    entry.index,
                    entry.fingerprint,
                    entry.call_count,
                    entry.remaining,
                    if entry.exhausted { "  EXHAUSTED" } else { "" }
                );
            }
            let stats = cache.stats().await;
            println!(
                "cache: {} searches, {} thumbnails ({} bytes)",
                stats.search_entries, stats.thumbnail_entries, stats.thumbnail_bytes
            );
        }
        Command::ClearCache => {
            if gateway.clear_cache().await {
                println!("Cache cleared");
            } else {
                anyhow::bail!("Failed to clear cache");
            }
        }
        Command::Maintain => {
            let scheduler = MaintenanceScheduler::new(
                &config.maintenance,
                ledger,
                cache,
                Arc::new(SystemClock),
            )?;
            scheduler.run_once().await;
            scheduler.run(shutdown).await;
        }
        Command::Synthetic { query, count } => {
            for (position, record) in gateway
                .generate_synthetic_results(&query, count)
                .iter()
                .enumerate()
            {
                print_record(position + 1, record);
            }
        }
    }

    Ok(())
}

/// One search per non-empty line; the first hit's URL is printed per line
async fn run_batch(gateway: &Gateway, contents: &str, max_results: u32, shutdown: &CancellationToken) {
    let titles: Vec<&str> = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    info!("Searching {} titles", titles.len());

    for (position, title) in titles.iter().enumerate() {
        match gateway.search_with_cancel(title, max_results, shutdown).await {
            Ok(results) => match results.first() {
                Some(first) => println!(
                    "{}\t{}\t[{}]",
                    title,
                    first.video_url(),
                    first.provenance.label()
                ),
                None => println!("{}\t-", title),
            },
            Err(e @ GatewayError::ExhaustedPool { .. }) => {
                error!("{}; stopping batch", e);
                println!(
                    "Stopped after {} of {} titles: all API keys are out of quota",
                    position,
                    titles.len()
                );
                return;
            }
            Err(GatewayError::Cancelled) => {
                warn!("Batch cancelled after {} titles", position);
                return;
            }
            Err(e) => {
                warn!("Search for '{}' failed: {}", title, e);
                println!("{}\t!", title);
            }
        }
    }
}

fn print_record(position: usize, record: &ResultRecord) {
    println!(
        "{:>2}. [{}] {} ({})\n    {}  {}  views={} duration={}",
        position,
        record.provenance.label(),
        record.title,
        record.channel_title,
        record.video_url(),
        record.published_at.format("%Y-%m-%d"),
        record.view_count,
        record.duration
    );
}
