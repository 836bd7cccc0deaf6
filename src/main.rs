//! Catalog Crawler main entry point
//!
//! This is the command-line interface that triggers catalog crawls.

use anyhow::Context;
use catalog_crawler::config::{load_config_with_hash, Config};
use catalog_crawler::crawler::{run_crawl, CrawlTarget};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Catalog Crawler: mirrors solved.ac catalog metadata into SQLite
///
/// Crawls problems (by class and difficulty level), tags, classes, and the
/// source/contest hierarchy, upserting everything into a local database.
#[derive(Parser, Debug)]
#[command(name = "catalog-crawler")]
#[command(version = "1.0.0")]
#[command(about = "Mirrors solved.ac catalog metadata into SQLite", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl every class, then every difficulty level
    Problems,
    /// Crawl the whole source tree
    Sources,
    /// Crawl sources, then problems
    All,
    /// Refresh a single problem
    Problem { id: i64 },
    /// Refresh a single source and its contests
    Source { id: i64 },
    /// Refresh a single contest and its problems
    Contest { id: i64 },
    /// Show statistics from the database and exit
    Stats,
    /// Validate the configuration and exit
    Check,
}

impl Command {
    fn target(&self) -> Option<CrawlTarget> {
        match self {
            Self::Problems => Some(CrawlTarget::Problems),
            Self::Sources => Some(CrawlTarget::Sources),
            Self::All => Some(CrawlTarget::Everything),
            Self::Problem { id } => Some(CrawlTarget::Problem(*id)),
            Self::Source { id } => Some(CrawlTarget::Source(*id)),
            Self::Contest { id } => Some(CrawlTarget::Contest(*id)),
            Self::Stats | Self::Check => None,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("catalog-crawler: operation failed, see log for details");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    match cli.command.target() {
        Some(target) => handle_crawl(&config, &config_hash, target).await,
        None if matches!(cli.command, Command::Stats) => handle_stats(&config),
        None => {
            handle_check(&config);
            Ok(())
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("catalog_crawler=info,warn"),
            1 => EnvFilter::new("catalog_crawler=debug,info"),
            2 => EnvFilter::new("catalog_crawler=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Prints the effective configuration
fn handle_check(config: &Config) {
    println!("=== Catalog Crawler Configuration ===\n");

    println!("API:");
    println!("  Base URL: {}", config.api.base_url);
    println!("  Max retries: {}", config.api.max_retries);
    println!("  Base delay: {}ms", config.api.base_delay_ms);
    println!("  Request timeout: {}s", config.api.request_timeout_secs);

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nCrawler:");
    println!("  Page delay: {}ms", config.crawler.page_delay_ms);
    println!("  Unit delay: {}ms", config.crawler.unit_delay_ms);
    println!("  Failure cool-down: {}ms", config.crawler.failure_cooldown_ms);
    println!(
        "  Tag sub-batches: {} (delay {}ms)",
        config.crawler.tag_batch_size, config.crawler.tag_batch_delay_ms
    );

    println!("\nDatabase:");
    println!("  Path: {}", config.database.path);
    println!(
        "  Transaction timeout: {}ms",
        config.database.transaction_timeout_ms
    );

    println!("\n✓ Configuration is valid");
}

/// Shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    use catalog_crawler::output::{load_statistics, print_statistics};
    use catalog_crawler::storage::SqliteStorage;

    println!("Database: {}\n", config.database.path);

    let storage = SqliteStorage::new(Path::new(&config.database.path))
        .context("failed to open database")?;
    let stats = load_statistics(&storage).context("failed to load statistics")?;
    print_statistics(&stats);

    Ok(())
}

/// Runs one crawl trigger
async fn handle_crawl(config: &Config, config_hash: &str, target: CrawlTarget) -> anyhow::Result<()> {
    tracing::info!("Crawling {} from {}", target.kind(), config.api.base_url);

    let stats = run_crawl(config, config_hash, target)
        .await
        .with_context(|| format!("{} crawl failed", target.kind()))?;

    if stats.failures() > 0 {
        tracing::warn!("Crawl finished with {} skipped items", stats.failures());
    }
    println!("{}", stats);
    Ok(())
}
