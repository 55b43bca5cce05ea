//! Chan-Archiver main entry point
//!
//! This is the command-line interface for the Chan-Archiver thread archiver.

use anyhow::{bail, Context};
use chan_archiver::config::{load_config_with_hash, Config};
use chan_archiver::crawler::Archiver;
use chan_archiver::output::{load_history, print_history};
use chan_archiver::storage::open_storage;
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Number of runs shown by --history
const HISTORY_LIMIT: usize = 20;

/// Chan-Archiver: an incremental, polite thread archiver
///
/// Chan-Archiver reads the catalog of every active board, archives the
/// threads with enough replies, downloads their images and applies the
/// configured triggers to every new post.
#[derive(Parser, Debug)]
#[command(name = "chan-archiver")]
#[command(version = "1.0.0")]
#[command(about = "An incremental, polite thread archiver", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Only crawl this board
    #[arg(long, value_name = "NAME")]
    board: Option<String>,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "history")]
    dry_run: bool,

    /// Show recent crawl runs from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    history: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config, cli.board.as_deref())
    } else if cli.history {
        handle_history(&config)
    } else {
        handle_crawl(config, cli.board.as_deref()).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("chan_archiver=info,warn"),
            1 => EnvFilter::new("chan_archiver=debug,info"),
            2 => EnvFilter::new("chan_archiver=trace,debug"),
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

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config, only_board: Option<&str>) -> anyhow::Result<()> {
    println!("=== Chan-Archiver Dry Run ===\n");

    println!("Scraper Configuration:");
    println!("  API interval: {}ms", config.scraper.api_wait_ms);
    println!("  File interval: {}ms", config.scraper.file_wait_ms);
    println!("  Max concurrency: {}", config.scraper.max_concurrency);
    println!(
        "  Connection timeout: {}s",
        config.scraper.connection_timeout_secs
    );

    println!("\nRemote API:");
    println!("  API: {}", config.remote.api_base_url);
    println!("  Images: {}", config.remote.image_base_url);
    println!("  Thumbnails: {}", config.remote.thumbnail_base_url);

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.crawler_name);
    println!("  Version: {}", config.user_agent.crawler_version);
    println!("  Contact URL: {}", config.user_agent.contact_url);
    println!("  Contact Email: {}", config.user_agent.contact_email);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Media root: {}", config.output.media_root);

    let boards: Vec<_> = config
        .boards
        .iter()
        .filter(|b| only_board.map_or(b.active, |name| b.name == name))
        .collect();

    if let Some(name) = only_board {
        if boards.is_empty() {
            bail!("Board '{}' is not listed in the configuration", name);
        }
    }

    println!("\nBoards ({}):", config.boards.len());
    for entry in &config.boards {
        println!(
            "  - /{}/ {} (reply threshold {}, retention {}h)",
            entry.name,
            if entry.active { "active" } else { "inactive" },
            entry.reply_threshold,
            entry.retention_hours
        );
    }

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would crawl {} board(s): {}",
        boards.len(),
        boards
            .iter()
            .map(|b| b.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    Ok(())
}

/// Handles the --history mode: shows recent runs from the database
fn handle_history(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))?;
    let history = load_history(&storage, HISTORY_LIMIT)?;
    print_history(&history);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, only_board: Option<&str>) -> anyhow::Result<()> {
    tracing::info!(
        "Boards configured: {}, workers per board: {}",
        config.boards.len(),
        config.scraper.max_concurrency
    );

    let archiver = Archiver::new(config)?;

    let reports = match only_board {
        Some(name) => vec![archiver.run_board_named(name).await?],
        None => archiver.run_all().await?,
    };

    for report in &reports {
        println!("/{}/ {}", report.board, report.summary_text());
        if let Some(error) = &report.error {
            println!("/{}/ run failed: {}", report.board, error);
        }
    }

    let failed = reports.iter().filter(|r| !r.is_success()).count();
    if failed > 0 {
        tracing::warn!("{} of {} board runs failed", failed, reports.len());
    } else {
        tracing::info!("Crawl completed successfully");
    }

    Ok(())
}
