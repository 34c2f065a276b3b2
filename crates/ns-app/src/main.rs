//! Interactive place-name explorer
//!
//! Loads a CSV of places into an in-memory backend and drives the explorer
//! from line commands on stdin, printing the visible views after each one.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use ns_core::{Breakpoint, Explorer, FetchUpdate, Services, SnapshotSubscriber, SystemClock};
use ns_data::MemoryBackend;
use ns_views::{SharedViewport, Viewport};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::Command;
use config::AppConfig;

/// How long to wait for an outstanding request before handing control back
const SETTLE_WAIT: Duration = Duration::from_secs(2);

#[derive(Debug, Parser)]
#[command(name = "namesampo", about = "Explore place-name datasets from the terminal")]
struct Args {
    /// CSV file with an `id` and a `dataset` column
    #[arg(long)]
    data: PathBuf,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Initial window width in pixels
    #[arg(long, default_value_t = 1440)]
    width: u32,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building runtime")?;
    runtime.block_on(run(args, config))
}

async fn run(args: Args, config: AppConfig) -> Result<()> {
    let places = ns_data::load_places(&args.data).await?;
    let backend = Arc::new(MemoryBackend::new(places, config.backend.clone()));
    info!("Datasets available: {}", backend.datasets().join(", "));

    let mut explorer = Explorer::create(config.explorer.clone(), Services::from_backend(backend), Arc::new(SystemClock))?;

    let viewport = Arc::new(SharedViewport::new(Viewport::new(
        explorer.dispatcher(),
        explorer.sync_manager().clone(),
        config.views.clone(),
    )));
    let subscriber: Arc<dyn SnapshotSubscriber> = viewport.clone();
    explorer.sync_manager().subscribe(Arc::downgrade(&subscriber));
    viewport.on_snapshot(&explorer.snapshot());

    explorer.set_breakpoint(Breakpoint::from_width(args.width));
    settle(&mut explorer).await?;
    print!("{}", viewport.lock().render_text());
    println!("{}", commands::HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match commands::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(err) => {
                println!("{err}");
                continue;
            }
        };

        match command {
            Command::Intent(intent) => explorer.dispatch(intent)?,
            Command::Width(width) => {
                explorer.set_breakpoint(Breakpoint::from_width(width));
            }
            Command::Freeze(kind, frozen) => viewport.lock().set_frozen(kind, frozen),
            Command::Show => {}
            Command::Errors => {
                for notice in explorer.errors() {
                    println!("{} failed at {}: {}", notice.channel, notice.at.format("%H:%M:%S"), notice.error);
                }
                continue;
            }
            Command::Help => {
                println!("{}", commands::HELP);
                continue;
            }
            Command::Quit => break,
        }

        settle(&mut explorer).await?;
        print!("{}", viewport.lock().render_text());
    }

    explorer.dispose();
    Ok(())
}

/// Run queued intents and apply responses until nothing is left in flight,
/// a deferred suggestion trigger included.
async fn settle(explorer: &mut Explorer) -> Result<()> {
    loop {
        explorer.process_intents()?;
        for update in explorer.drain_updates() {
            report(&update);
        }

        if let Some(deadline) = explorer.next_deadline() {
            tokio::time::sleep_until(deadline.into()).await;
            explorer.poll_deferred();
            continue;
        }

        match tokio::time::timeout(SETTLE_WAIT, explorer.next_update()).await {
            Ok(Some(update)) => report(&update),
            Ok(None) => {
                // responses may have queued more intents
                if explorer.process_intents()? == 0 {
                    return Ok(());
                }
            }
            Err(_) => {
                warn!("Requests still outstanding after {:?}", SETTLE_WAIT);
                return Ok(());
            }
        }
    }
}

fn report(update: &FetchUpdate) {
    match update {
        FetchUpdate::Suggestions(suggestions) if !suggestions.is_empty() => {
            let labels: Vec<&str> = suggestions.iter().map(|s| s.label.as_str()).collect();
            println!("suggestions: {}", labels.join(", "));
        }
        FetchUpdate::Failed(notice) => println!("{} failed: {}", notice.channel, notice.error),
        FetchUpdate::GeometryFailed { key, notice } => println!("geometry {key} failed: {}", notice.error),
        _ => {}
    }
}
