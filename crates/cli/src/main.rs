//! Operator trigger surface for the scheduler.
//!
//! Meant to run from an external scheduler (a single cron entry, per the
//! at-most-one-batch contract): `syndica upcoming` previews what is queued,
//! `syndica process` publishes everything that is due and exits non-zero
//! when any post failed.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use syndica_core::{DuePostProcessor, PlatformDispatcher, SystemClock};
use syndica_core::scheduling::ports::SchedulingStore;
use syndica_infra::{build_registry, DbManager, HttpClient, SqliteSchedulingStore};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Syndica — deferred multi-channel publishing scheduler.
#[derive(Debug, Parser)]
#[command(name = "syndica", version, about)]
struct Cli {
    /// Path to the configuration file (TOML or JSON).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List upcoming pending posts without publishing anything.
    Upcoming {
        /// Maximum number of posts to show.
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Publish every due post and report the batch outcome.
    Process,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = syndica_infra::config::load(cli.config.clone())?;

    let db = Arc::new(DbManager::new(&config.database.path, config.database.pool_size)?);
    db.run_migrations()?;
    let store: Arc<dyn SchedulingStore> = Arc::new(SqliteSchedulingStore::new(db));

    match cli.command {
        Command::Upcoming { limit } => show_upcoming(store.as_ref(), limit).await,
        Command::Process => {
            let http = HttpClient::from_config(&config.http)?;
            let registry = build_registry(&config.platforms, &http);
            let dispatcher = PlatformDispatcher::new(registry);
            let processor = DuePostProcessor::new(store, dispatcher, Arc::new(SystemClock));
            run_batch(&processor).await
        }
    }
}

/// Dry-run listing of pending posts whose publish instant is still ahead.
async fn show_upcoming(store: &dyn SchedulingStore, limit: usize) -> anyhow::Result<()> {
    let pending = store.find_pending(chrono::Utc::now(), limit).await?;

    if pending.is_empty() {
        println!("No upcoming posts.");
        return Ok(());
    }

    println!("{:<6} {:<4} {:<20} {:<24} CONTENT", "ID", "PRI", "PUBLISH AT (UTC)", "PLATFORMS");
    for post in pending {
        let mut content: String = post.content.chars().take(30).collect();
        if content.len() < post.content.len() {
            content.push('…');
        }
        println!(
            "{:<6} {:<4} {:<20} {:<24} {content}",
            post.id,
            post.priority,
            post.publish_at.format("%Y-%m-%d %H:%M"),
            post.platforms.join(","),
        );
    }
    Ok(())
}

/// Live batch run; exits non-zero when any post-level failure occurred.
async fn run_batch(processor: &DuePostProcessor) -> anyhow::Result<()> {
    let run_id = Uuid::new_v4();
    tracing::info!(%run_id, "processing scheduled posts");

    let summary = processor.process_due().await?;

    println!("Processed:  {}", summary.processed);
    println!("Successful: {}", summary.successful);

    if summary.failed > 0 {
        println!("Failed:     {}", summary.failed);
        for failure in &summary.errors {
            println!("  Post #{}: {}", failure.post_id, failure.error);
        }
        std::process::exit(1);
    }
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
