use std::io::stdout;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use ticket_watch::config::{WatchConfig, load_config_path};
use ticket_watch::cycle::CycleSettings;
use ticket_watch::deliver::{JsonLinesSink, LogSink};
use ticket_watch::diff::run_cycle;
use ticket_watch::scheduler::{Scheduler, Watcher};
use ticket_watch::snapshot::{LiveTicket, ensure_unique_ids};
use ticket_watch::store::{SnapshotStore, SqliteSnapshotStore};
use zammad_client::TicketSource;
use zammad_client::rest::ZammadRestSource;

#[derive(Parser)]
#[command(version, about = "Zammad ticket watcher")]
struct Cli {
    /// TOML config file; built-in defaults apply when omitted.
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Run one polling cycle and print the notification as a JSON line.
    Once,
    /// Poll on the configured interval until Ctrl-C.
    Watch,
    /// Fetch and diff against the stored snapshot without saving or notifying.
    Diff,
    Snapshot(SnapshotCmd),
}

#[derive(Args)]
struct SnapshotCmd {
    #[command(subcommand)]
    sub: SnapshotSub,
}

#[derive(Subcommand)]
enum SnapshotSub {
    /// Print the stored snapshot.
    Show {
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; real deployments set the variables directly.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = match &cli.config {
        Some(path) => load_config_path(path)?,
        None => WatchConfig::default(),
    };

    match cli.cmd {
        Cmd::Once => {
            let cancel = cancel_on_ctrl_c();
            let mut watcher = Watcher::new(
                Box::new(ZammadRestSource::from_env()?),
                Box::new(SqliteSnapshotStore::open(&cfg.store.database_url)?),
                Box::new(JsonLinesSink::new(stdout())),
                CycleSettings::from_config(&cfg),
            );
            let report = watcher.run_once(&cancel).await?;
            tracing::info!(status = ?report.status, events = report.events.len(), "done");
        }
        Cmd::Watch => {
            let cancel = cancel_on_ctrl_c();
            let watcher = Watcher::new(
                Box::new(ZammadRestSource::from_env()?),
                Box::new(SqliteSnapshotStore::open(&cfg.store.database_url)?),
                Box::new(LogSink),
                CycleSettings::from_config(&cfg),
            );
            let stats = Scheduler::new(watcher, cfg.schedule.interval())
                .run(cancel)
                .await;
            tracing::info!(?stats, "ticket watcher stopped");
        }
        Cmd::Diff => {
            let source = ZammadRestSource::from_env()?;
            let mut store = SqliteSnapshotStore::open(&cfg.store.database_url)?;

            let (user_id, tickets) = tokio::time::timeout(
                cfg.schedule.deadline(),
                source.fetch_open_tickets_and_user(&cfg.source.query),
            )
            .await
            .context("fetch exceeded the cycle deadline")??;
            let live: Vec<LiveTicket> = tickets.into_iter().map(LiveTicket::from).collect();
            ensure_unique_ids(&live)?;

            let previous = store.load()?;
            let outcome = run_cycle(&previous, &live, user_id, &cfg.preferences, &cfg.messages);
            println!("{outcome}");
        }
        Cmd::Snapshot(SnapshotCmd {
            sub: SnapshotSub::Show { json },
        }) => {
            let mut store = SqliteSnapshotStore::open(&cfg.store.database_url)?;
            let snapshots = store.load()?.sorted();
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshots)?);
            } else {
                match store.last_saved_at()? {
                    Some(at) => println!("saved at {}", at.to_rfc3339()),
                    None => println!("never saved"),
                }
                for s in &snapshots {
                    println!(
                        "{:>8}  owner {:>6}  updated {}",
                        s.id,
                        s.owner_id,
                        s.updated_at.to_rfc3339()
                    );
                }
                println!("{} tickets", snapshots.len());
            }
        }
    }

    Ok(())
}

/// Token that is cancelled on the first Ctrl-C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received; shutting down");
            on_signal.cancel();
        }
    });
    cancel
}
