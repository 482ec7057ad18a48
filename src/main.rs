//! Site-Mirror main entry point
//!
//! This is the command-line interface for the Site-Mirror offline website mirror.

use anyhow::Context;
use clap::Parser;
use site_mirror::config::{load_config_with_hash, Config};
use site_mirror::output::print_statistics;
use site_mirror::{Mirror, MirrorOptions};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Denied URLs listed in the final summary
const SUMMARY_TOP_DENIED: usize = 10;

/// Site-Mirror: an offline website mirror
///
/// Site-Mirror downloads a website starting from one entry URL, rewrites the
/// links in HTML and CSS so the copy can be browsed from disk, and follows
/// every link the admission filter allows.
#[derive(Parser, Debug)]
#[command(name = "site-mirror")]
#[command(version = "1.0.0")]
#[command(about = "An offline website mirror", long_about = None)]
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

    /// Remove the mirror root before starting
    #[arg(long)]
    clean: bool,

    /// Validate config and show what would be mirrored without fetching anything
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    let mut options = MirrorOptions::from_config(&config)?;
    if cli.clean {
        options.clean_local = true;
    }

    if cli.dry_run {
        handle_dry_run(&config, &options);
        return Ok(());
    }

    handle_mirror(options).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("site_mirror=info,warn"),
            1 => EnvFilter::new("site_mirror=debug,info"),
            2 => EnvFilter::new("site_mirror=trace,debug"),
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

/// Handles the --dry-run mode: shows the resolved settings
fn handle_dry_run(config: &Config, options: &MirrorOptions) {
    println!("=== Site-Mirror Dry Run ===\n");

    println!("Mirror:");
    println!("  Entry: {}", options.entry);
    println!("  Local root: {}", options.local.display());
    println!("  Staging: {}", options.temp_dir.display());
    println!("  Default index: {}", options.default_index);
    println!("  Clean before run: {}", options.clean_local);
    println!("  Skip unchanged: {}", options.skip_existing);
    println!("  Link aliases: {}", options.link_aliases);
    println!("  Workers: {}", options.workers);

    println!("\nTimeouts:");
    println!("  Headers: {:?}", options.header_timeout);
    println!("  Body: {:?}", options.body_timeout);

    println!("\nHTTP:");
    println!("  User agent: {}", options.http.user_agent);
    println!("  Max idle per host: {}", options.http.max_idle_per_host);
    println!("  Idle timeout: {:?}", options.http.idle_timeout);

    if config.filter.allow.is_empty() {
        println!("\nAdmission: same host as entry ({})", options.entry.host_str().unwrap_or_default());
    } else {
        println!("\nAdmission ({} patterns):", config.filter.allow.len());
        for pattern in &config.filter.allow {
            println!("  - {}", pattern);
        }
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the main mirror operation
async fn handle_mirror(options: MirrorOptions) -> Result<(), Box<dyn std::error::Error>> {
    let mut mirror = Mirror::new(options)?;

    let stop = mirror.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing in-flight resources");
            stop.stop();
        }
    });

    match mirror.start().await {
        Ok(summary) => {
            if summary.completed {
                tracing::info!("Mirror completed successfully");
            } else {
                tracing::info!("Mirror stopped before the queue was drained");
            }
            println!();
            print_statistics(&summary.stats, &mirror.filter_analysis(), SUMMARY_TOP_DENIED);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Mirror failed: {}", e);
            Err(e.into())
        }
    }
}
