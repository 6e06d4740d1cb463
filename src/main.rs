//! Main entry point for the rytm CLI

use anyhow::{bail, Context};
use clap::Parser;
use rytm::cache::ContentCache;
use rytm::cipher::FileProfileStore;
use rytm::cli::output::{format_bytes, OutputFormatter};
use rytm::cli::{Args, Command};
use rytm::core::Song;
use rytm::platform::MusicClient;
use rytm::utils::extract_video_id;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging()?;

    let args = Args::parse();
    debug!("Starting rytm with args: {:?}", args);

    let formatter = OutputFormatter::new(args.verbosity_level());
    let store = Arc::new(FileProfileStore::new(args.profile_path()));
    let client = MusicClient::new(args.client_config(), store)
        .context("failed to build HTTP client")?;

    match &args.command {
        Command::Search { query } => {
            let spinner = formatter.spinner(&format!("Searching for '{}'", query));
            let result = client.try_search(query).await;
            spinner.finish_and_clear();

            let mut songs = match result {
                Ok(songs) => songs,
                Err(e) => bail!("search failed: {}", e),
            };
            if let Ok(cache) = open_cache(&args, &client) {
                cache.annotate(&mut songs);
            }
            formatter.print_songs(&songs);
        }
        Command::Resolve { target } => {
            let id = extract_video_id(target)?;
            let spinner = formatter.spinner(&format!("Resolving {}", id));
            let stream = client.try_resolve_audio(&id).await;
            spinner.finish_and_clear();

            let stream = stream.with_context(|| format!("could not resolve {}", id))?;
            info!("Resolved {} as {}", id, stream.mime_type);
            println!("{}", stream.url);
        }
        Command::Cache { target } => {
            let id = extract_video_id(target)?;
            let cache = open_cache(&args, &client)?;
            let swept = cache.sweep_orphans();
            if swept > 0 {
                formatter.info(&format!("Removed {} interrupted downloads", swept));
            }

            let spinner = formatter.spinner(&format!("Caching {}", id));
            let mut song = Song::new(id.clone(), "", "");
            let outcome = cache.cache_song(&mut song).await;
            spinner.finish_and_clear();

            formatter.print_cache_outcome(&id, &outcome, cache.size_of(&id));
            if !outcome.is_success() {
                std::process::exit(1);
            }
        }
        Command::Remove { target } => {
            let id = extract_video_id(target).unwrap_or_else(|_| target.clone());
            let cache = open_cache(&args, &client)?;
            if cache.remove(&id) {
                formatter.success(&format!("Removed {}", id));
            } else {
                formatter.warning(&format!("{} is not cached", id));
            }
        }
        Command::Size { target } => {
            let cache = open_cache(&args, &client)?;
            match target {
                Some(target) => {
                    let id = extract_video_id(target).unwrap_or_else(|_| target.clone());
                    match cache.size_of(&id) {
                        Some(size) => println!("{}\t{}", id, format_bytes(size)),
                        None => formatter.warning(&format!("{} is not cached", id)),
                    }
                }
                None => println!(
                    "{}\t{}",
                    cache.dir().display(),
                    format_bytes(cache.total_size())
                ),
            }
        }
        Command::Cipher { force } => {
            let spinner = formatter.spinner("Checking cipher profile");
            let profile = if *force {
                client.cipher().force_refresh().await
            } else {
                client.cipher().current_profile().await
            };
            spinner.finish_and_clear();

            let profile = profile.context("cipher extraction failed")?;
            formatter.print_profile(&profile);
        }
    }

    Ok(())
}

fn open_cache(args: &Args, client: &MusicClient) -> anyhow::Result<ContentCache> {
    let config = args.cache_config();
    let dir = config.dir.clone();
    ContentCache::new(config, Arc::new(client.clone()))
        .with_context(|| format!("failed to open cache at {}", dir.display()))
}

fn init_logging() -> anyhow::Result<()> {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .compact(),
        )
        .try_init()?;

    Ok(())
}
