//! postsync command line
//!
//! Submits posts through the outbox and inspects or drains it.

use clap::{Parser, Subcommand};
use postsync::client::{Config, HttpTransport, OperationId, SyncContext};
use postsync::shared::config::AppConfig;
use postsync::shared::error::Result;
use postsync::shared::event::{DrainReport, SyncTrigger};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "postsync")]
#[command(about = "Offline-first post submission and sync")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Print machine-readable JSON
    #[arg(long, global = true, default_value_t = false)]
    json: bool,
    /// Treat the backend as unreachable
    #[arg(long, global = true, default_value_t = false)]
    offline: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Publish a post, or save it to the outbox
    Post {
        #[arg(long)]
        title: String,
        #[arg(long)]
        content: String,
    },
    /// Drain the outbox now
    Sync,
    /// Show connectivity and outbox counts
    Status,
    /// List operations that reached the attempt ceiling
    Failed,
    /// Put failed operations back in the queue
    Retry {
        /// Only this operation; every failed one otherwise
        #[arg(long)]
        id: Option<i64>,
    },
    /// Drop failed operations
    Purge {
        #[arg(long)]
        id: Option<i64>,
    },
    /// Keep running, draining whenever the backend comes back
    Watch {
        /// Health probe interval in seconds
        #[arg(long, default_value_t = 15)]
        interval: u64,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&env_filter))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut app = AppConfig::load(cli.config.as_deref())?;
    if let Commands::Watch { interval } = &cli.command {
        app.probe_interval_secs = Some(*interval);
    }
    let config = Config::from_app(app);
    let transport = Arc::new(HttpTransport::new(config.clone()));
    let context = SyncContext::open(config, transport).await?;
    if cli.offline {
        context.monitor().set_online(false);
    }
    let manager = context.manager();

    match cli.command {
        Commands::Post { title, content } => {
            let outcome = context.post_service().send_post(&title, &content).await?;
            if cli.json {
                print_json(&outcome)?;
            } else {
                println!("{}", outcome.message);
            }
        }
        Commands::Sync => match manager.request_manual_sync().await.into_result() {
            Ok(report) if cli.json => print_json(&report)?,
            Ok(report) => println!(
                "processed {}, delivered {}, failed {}",
                report.processed, report.success_count, report.error_count
            ),
            Err(e) => println!("{e}"),
        },
        Commands::Status => {
            let status = manager.sync_status().await;
            if cli.json {
                print_json(&status)?;
            } else {
                println!("online:   {}", status.online);
                println!("pending:  {}", status.pending_operations);
                println!("failed:   {}", status.failed_operations);
                println!("last sync: {}", status.last_sync_label());
            }
        }
        Commands::Failed => {
            let failed = manager.failed_items().await;
            if cli.json {
                print_json(&failed)?;
            } else if failed.is_empty() {
                println!("no failed operations");
            } else {
                for op in failed {
                    let reason = op.failure().map(|e| e.to_string()).unwrap_or_default();
                    println!(
                        "{}  {} {}  {}  last error: {}",
                        op.id,
                        op.method,
                        op.endpoint,
                        reason,
                        op.last_error.as_deref().unwrap_or("-")
                    );
                }
            }
        }
        Commands::Retry { id: Some(id) } => {
            manager.retry_failed(OperationId(id)).await?;
            println!("operation {id} queued for retry");
        }
        Commands::Retry { id: None } => {
            let count = manager.retry_all_failed().await?;
            println!("{count} operations queued for retry");
        }
        Commands::Purge { id: Some(id) } => {
            manager.discard_failed(OperationId(id)).await?;
            println!("operation {id} discarded");
        }
        Commands::Purge { id: None } => {
            let count = manager.purge_failed().await?;
            println!("{count} failed operations discarded");
        }
        Commands::Watch { .. } => {
            let _handles = context.start().await;
            let engine = Arc::clone(context.engine());
            engine
                .on_drain_complete(|trigger: SyncTrigger, report: DrainReport| {
                    println!(
                        "[{trigger}] delivered {} of {}",
                        report.success_count, report.processed
                    );
                })
                .await;
            tracing::info!("watching connectivity, press Ctrl-C to stop");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
