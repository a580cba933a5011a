use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use stillcast_observer::{
    ApiClient, DepartureGuard, LocalCache, Observer, ObserverConfig, ObserverEvent, StopReason,
};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Turn a song and its cover art into a video, and follow the job.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Server base URL (overrides STILLCAST_URL)
    #[arg(long, global = true)]
    url: Option<String>,

    /// Local job cache file (overrides STILLCAST_CACHE)
    #[arg(long, global = true)]
    cache: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload an mp3 and a cover image, then wait for the video
    Submit { audio: PathBuf, image: PathBuf },
    /// Show cached jobs and follow the unfinished ones
    Watch,
    /// Download a finished video
    Download {
        output_file_name: String,
        /// Destination directory
        #[arg(long, default_value = ".")]
        dest: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stillcast_observer=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = ObserverConfig::from_env();
    if let Some(url) = cli.url {
        config.base_url = url.trim_end_matches('/').to_string();
    }
    if let Some(cache) = cli.cache {
        config.cache_path = cache;
    }
    tracing::debug!(base_url = %config.base_url, cache = %config.cache_path.display(), "Loaded observer configuration");

    let client = Arc::new(ApiClient::new(&config.base_url));

    match cli.command {
        Command::Download {
            output_file_name,
            dest,
        } => {
            let path = client
                .download(&output_file_name, &dest)
                .await
                .with_context(|| format!("Failed to download {output_file_name}"))?;
            println!("Saved {}", path.display());
            Ok(())
        }
        Command::Submit { audio, image } => {
            let submitted = client
                .submit(&audio, &image)
                .await
                .context("Failed to submit job")?;
            println!("Submitted \"{}\" ({})", submitted.title, submitted.id);

            let (observer, events, guard) = build_observer(client, &config).await;
            observer.record_submission(&submitted).await;
            follow(&observer, events, &guard).await;
            Ok(())
        }
        Command::Watch => {
            let (observer, events, guard) = build_observer(client, &config).await;
            observer.restore().await;
            follow(&observer, events, &guard).await;
            Ok(())
        }
    }
}

async fn build_observer(
    client: Arc<ApiClient>,
    config: &ObserverConfig,
) -> (
    Observer,
    mpsc::UnboundedReceiver<ObserverEvent>,
    Arc<DepartureGuard>,
) {
    let cache = LocalCache::load(&config.cache_path).await;
    let guard = Arc::new(DepartureGuard::new());
    let (observer, events) = Observer::new(client, cache, guard.clone(), config.poll_interval);
    (observer, events, guard)
}

/// Render events until every poll loop stops or the user leaves.
///
/// While videos are still processing the first Ctrl-C only warns.
async fn follow(
    observer: &Observer,
    mut events: mpsc::UnboundedReceiver<ObserverEvent>,
    guard: &DepartureGuard,
) {
    let idle = observer.wait();
    tokio::pin!(idle);
    let mut warned = false;

    loop {
        tokio::select! {
            Some(event) = events.recv() => render(&event),
            _ = &mut idle => break,
            _ = tokio::signal::ctrl_c() => {
                if guard.is_armed() && !warned {
                    println!("Videos are still being processed. Press Ctrl-C again to leave.");
                    warned = true;
                } else {
                    observer.shutdown().await;
                    break;
                }
            }
        }
    }

    while let Ok(event) = events.try_recv() {
        render(&event);
    }
}

fn render(event: &ObserverEvent) {
    match event {
        ObserverEvent::Listed(entries) if entries.is_empty() => println!("No jobs yet."),
        ObserverEvent::Listed(entries) => {
            for entry in entries {
                println!(
                    "{:<8}  {}  {}  {}",
                    entry.status.as_str(),
                    entry.id.short(),
                    entry.timestamp.format("%Y-%m-%d %H:%M"),
                    entry.title
                );
            }
        }
        ObserverEvent::StatusChanged { id, status } => println!("[{}] {status}", id.short()),
        ObserverEvent::DownloadReady { id, url, .. } => {
            println!("[{}] ready: {url}", id.short())
        }
        ObserverEvent::PollStopped {
            id,
            reason: StopReason::Transport(error),
        } => eprintln!("[{}] stopped watching: {error}", id.short()),
        ObserverEvent::PollStopped { .. } => {}
    }
}
