//! Skillfeed Runtime
//!
//! The entry point for the skills catalog refresher. Handles CLI args,
//! bootstrapping, and orchestrating the refresh daemon or a one-shot
//! run.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use tokio::signal;
use tracing::Level;

use skillfeed::config::{get_config_path, get_feed_dir, load_config, resolve_path, save_config};
use skillfeed::daemon::{create_refresh_daemon, RefreshDaemonOptions};
use skillfeed::fetch::client::HttpFetcher;
use skillfeed::pipeline::run_once;
use skillfeed::sources::{load_sources, write_default_sources};
use skillfeed::types::{default_config, LogLevel, MarketplaceSource, RefresherConfig};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Skillfeed -- Skills Catalog Refresher
#[derive(Parser, Debug)]
#[command(
    name = "skillfeed",
    version = VERSION,
    about = "Skillfeed -- Skills Catalog Refresher",
    long_about = "Aggregates skill metadata from configured marketplaces and keeps the published catalog documents up to date."
)]
struct Cli {
    /// Start the scheduled refresh daemon
    #[arg(long)]
    run: bool,

    /// Run a single refresh now and exit
    #[arg(long)]
    once: bool,

    /// Write default config and sources files
    #[arg(long)]
    init: bool,

    /// Show current configuration and source status
    #[arg(long)]
    status: bool,
}

// ---- Bootstrap --------------------------------------------------------------

fn init_tracing(level: LogLevel) {
    let max_level = match level {
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Info => Level::INFO,
        LogLevel::Warn => Level::WARN,
        LogLevel::Error => Level::ERROR,
    };
    tracing_subscriber::fmt().with_max_level(max_level).init();
}

/// Load config + sources, or fail with a pointer at `--init`.
fn load_runtime() -> Result<(RefresherConfig, Vec<MarketplaceSource>)> {
    let config = load_config().with_context(|| {
        format!(
            "No config found at {}. Run: skillfeed --init",
            get_config_path().display()
        )
    })?;

    let sources_path = resolve_path(&config.sources_path);
    let sources = load_sources(Path::new(&sources_path))?;

    Ok((config, sources))
}

// ---- Init Command -----------------------------------------------------------

/// Write the default config and sources files, without overwriting.
fn run_init() -> Result<()> {
    let config_path = get_config_path();

    if config_path.exists() {
        println!("Config already exists at {}", config_path.display());
    } else {
        let config = default_config();
        save_config(&config)?;
        println!("Wrote default config to {}", config_path.display());
    }

    let config = load_config().context("Failed to reload config after init")?;
    let sources_path = resolve_path(&config.sources_path);
    write_default_sources(Path::new(&sources_path))?;
    println!("Sources file: {}", sources_path);
    println!();
    println!("Next steps:");
    println!("  1. Point repoPath at a checkout of the catalog repository.");
    println!(
        "  2. Export the push credential: {}",
        config.credential_env
    );
    println!("  3. Run: skillfeed --once");

    Ok(())
}

// ---- Status Command ---------------------------------------------------------

/// Display the current refresher status.
fn show_status() {
    let Some(config) = load_config() else {
        println!(
            "Skillfeed is not configured. Run: skillfeed --init ({})",
            get_feed_dir().display()
        );
        return;
    };

    println!();
    println!("=== SKILLFEED STATUS ===");
    println!("Repo:       {}", resolve_path(&config.repo_path));
    println!(
        "Remote:     {}",
        if config.remote_url.is_empty() {
            "origin"
        } else {
            config.remote_url.as_str()
        }
    );
    println!("Branch:     {}", config.branch);
    println!("Index:      {}", config.index_file);
    println!("Listing:    {}", config.listing_file);
    println!("Schedule:   {}", config.refresh_schedule);
    println!("Credential: ${}", config.credential_env);
    println!("Version:    {}", VERSION);

    let sources_path = resolve_path(&config.sources_path);
    match load_sources(Path::new(&sources_path)) {
        Ok(sources) => {
            println!();
            println!("Sources ({}):", sources.len());
            for source in &sources {
                let state = if source.enabled {
                    "enabled".green()
                } else {
                    "disabled".red()
                };
                println!(
                    "  [{}] {} {} ({:?}, priority {})",
                    state, source.id, source.endpoint, source.format, source.priority
                );
            }
        }
        Err(e) => println!("Failed to load sources: {:#}", e),
    }
    println!("========================");
    println!();
}

// ---- Daemon Mode ------------------------------------------------------------

/// Start the refresh daemon and block until a shutdown signal arrives.
async fn run_daemon() -> Result<()> {
    let (config, sources) = load_runtime()?;

    let fetcher = Arc::new(HttpFetcher::new(config.fetch_timeout_secs));
    let mut daemon = create_refresh_daemon(RefreshDaemonOptions {
        tick_interval_secs: config.tick_interval_secs,
        schedule: config.refresh_schedule.clone(),
    });

    daemon.start(config, sources, fetcher);

    // Handle graceful shutdown
    let ctrl_c = signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("Failed to register SIGTERM handler")?;

        tokio::select! {
            _ = ctrl_c => {
                println!("\nReceived SIGINT, shutting down...");
            }
            _ = sigterm.recv() => {
                println!("\nReceived SIGTERM, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.context("Failed to register Ctrl+C handler")?;
        println!("\nReceived shutdown signal...");
    }

    daemon.stop();
    Ok(())
}

// ---- One-shot Mode ----------------------------------------------------------

/// Run a single refresh and print the summary.
async fn run_single() -> Result<()> {
    let (config, sources) = load_runtime()?;

    let fetcher = Arc::new(HttpFetcher::new(config.fetch_timeout_secs));
    let summary = run_once(fetcher, &config, &sources).await?;

    println!(
        "Refresh {} complete: {} skills, {} of {} sources failed, {}",
        summary.run_id,
        summary.skills_total,
        summary.sources_failed,
        summary.sources_total,
        match &summary.commit {
            Some(commit) => format!("published {}", commit),
            None => "no changes".to_string(),
        }
    );

    Ok(())
}

// ---- Entry Point ------------------------------------------------------------

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = load_config()
        .map(|c| c.log_level)
        .unwrap_or(LogLevel::Info);
    init_tracing(level);

    if cli.init {
        if let Err(e) = run_init() {
            eprintln!("Init failed: {:#}", e);
            std::process::exit(1);
        }
        return;
    }

    if cli.status {
        show_status();
        return;
    }

    if cli.once {
        if let Err(e) = run_single().await {
            eprintln!("Refresh failed: {:#}", e);
            std::process::exit(1);
        }
        return;
    }

    if cli.run {
        if let Err(e) = run_daemon().await {
            eprintln!("Fatal: {:#}", e);
            std::process::exit(1);
        }
        return;
    }

    // Default: show help
    println!("Run \"skillfeed --help\" for usage information.");
    println!("Run \"skillfeed --once\" for a single refresh.");
    println!("Run \"skillfeed --run\" to start the scheduled daemon.");
}
