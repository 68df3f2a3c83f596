//! DevRank crawler main entry point
//!
//! This is the command-line interface for running a crawl worker and for
//! inspecting or maintaining the shared queue.

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use devrank_crawler::config::{load_config_with_hash, Config};
use devrank_crawler::crawler::default_worker_id;
use devrank_crawler::output::{export_graph_to_file, load_statistics, print_statistics};
use devrank_crawler::storage::{SqliteStorage, TaskQueue};
use devrank_crawler::{NewTask, TaskKind, Worker};
use std::path::{Path, PathBuf};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

/// DevRank crawler: a distributed GitHub graph crawler
///
/// Any number of workers can run against the same database. Each claims one
/// task at a time from the shared queue and releases it if processing fails.
#[derive(Parser, Debug)]
#[command(name = "devrank-crawler")]
#[command(version)]
#[command(about = "A distributed GitHub graph crawler", long_about = None)]
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

    /// Queue identity for this worker (default: gh_<host>_<pid>)
    #[arg(long, value_name = "ID")]
    worker_id: Option<String>,

    /// Queue `user` tasks for these logins and exit
    #[arg(long, value_name = "LOGIN", num_args = 1.., conflicts_with_all = ["stats", "requeue_stale", "export"])]
    seed: Vec<String>,

    /// Show queue statistics and exit
    #[arg(long, conflicts_with_all = ["requeue_stale", "export"])]
    stats: bool,

    /// Release tasks claimed more than MINUTES ago and never finished, then exit
    #[arg(long, value_name = "MINUTES", conflicts_with = "export")]
    requeue_stale: Option<u32>,

    /// Write the ranking input file and exit
    #[arg(long, value_name = "PATH")]
    export: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    if !cli.seed.is_empty() {
        handle_seed(&config, &cli.seed)
    } else if cli.stats {
        handle_stats(&config)
    } else if let Some(minutes) = cli.requeue_stale {
        handle_requeue_stale(&config, minutes)
    } else if let Some(path) = &cli.export {
        handle_export(&config, path)
    } else {
        let worker_id = cli.worker_id.unwrap_or_else(default_worker_id);
        handle_run(&config, worker_id).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("devrank_crawler=info,warn"),
            1 => EnvFilter::new("devrank_crawler=debug,info"),
            2 => EnvFilter::new("devrank_crawler=trace,debug"),
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

fn open_storage(config: &Config) -> anyhow::Result<SqliteStorage> {
    let path = Path::new(&config.storage.database_path);
    SqliteStorage::new(path).with_context(|| format!("failed to open {}", path.display()))
}

/// Handles --seed: queues a `user` task per login
fn handle_seed(config: &Config, logins: &[String]) -> anyhow::Result<()> {
    let mut storage = open_storage(config)?;

    let mut added = 0;
    for login in logins {
        let task = NewTask::new(TaskKind::User, login.as_str()).with_root(login.as_str());
        if storage.enqueue(&task)? {
            added += 1;
        } else {
            tracing::info!("{} is already queued", login);
        }
    }

    println!("✓ Queued {} of {} login(s)", added, logins.len());
    Ok(())
}

/// Handles --stats: shows per-method queue counts
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.storage.database_path);

    let storage = open_storage(config)?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles --requeue-stale: releases claims abandoned by dead workers
fn handle_requeue_stale(config: &Config, minutes: u32) -> anyhow::Result<()> {
    let mut storage = open_storage(config)?;

    let cutoff = Utc::now() - chrono::Duration::minutes(i64::from(minutes));
    let released = storage.requeue_stale(cutoff)?;

    println!(
        "✓ Released {} task(s) claimed before {}",
        released,
        cutoff.format("%Y-%m-%d %H:%M:%S UTC")
    );
    Ok(())
}

/// Handles --export: writes the ranking input file
fn handle_export(config: &Config, path: &Path) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    let summary = export_graph_to_file(&storage, path)?;

    println!(
        "✓ Exported {} account(s), {} contribution, {} star and {} watch line(s) to {}",
        summary.users,
        summary.contributions,
        summary.stars,
        summary.watches,
        path.display()
    );
    Ok(())
}

/// Runs the worker loop until interrupted
///
/// The first Ctrl-C asks the worker to stop after its current task. A second
/// one drops the worker future; the claim guard then releases the held task.
async fn handle_run(config: &Config, worker_id: String) -> anyhow::Result<()> {
    let mut worker = Worker::from_config(config, worker_id)?;
    tracing::info!(
        "Worker {} using {} credential(s) against {}",
        worker.worker_id(),
        worker.client().credentials().len(),
        config.api.base_url
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let run = worker.run(shutdown_rx);
    tokio::pin!(run);

    tokio::select! {
        stats = &mut run => {
            tracing::info!("Worker exited ({} succeeded)", stats.succeeded);
            return Ok(());
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for Ctrl-C")?;
            tracing::info!("Interrupt received, finishing current task (Ctrl-C again to abort)");
            let _ = shutdown_tx.send(true);
        }
    }

    tokio::select! {
        _ = &mut run => {}
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for Ctrl-C")?;
            tracing::warn!("Second interrupt, abandoning current task");
        }
    }

    Ok(())
}
