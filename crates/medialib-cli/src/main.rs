//! medialib - command-line front end for the media library engine.
//!
//! Mirrors a folder of a remote asset store, keeps it in sync in the
//! background, and runs searches and bulk deletes against the local copy.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use tokio::time::Instant;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use medialib_core::api::GatewayClient;
use medialib_core::auth::{resolve_token, CredentialStore, TOKEN_ENV_VAR};
use medialib_core::cache::{FileStore, ResponseCache};
use medialib_core::config::Config;
use medialib_core::filter::{DateRange, SortDirection, SortKey};
use medialib_core::models::Asset;
use medialib_core::selection::{BulkAction, HttpDownloader};
use medialib_core::utils::{format_bytes, format_date, truncate_string};
use medialib_core::MediaLibrary;

// ============================================================================
// Constants
// ============================================================================

/// How often `watch` checks for sync updates
const WATCH_POLL_INTERVAL_MS: u64 = 500;

/// Set to "1" to also log to a daily rolling file in the cache directory
const LOG_FILE_ENV_VAR: &str = "MEDIALIB_LOG_FILE";

/// Width of the filename column in listings
const FILENAME_WIDTH: usize = 40;

const USAGE: &str = "\
Usage: medialib <command> [args]

Commands:
  sync                          Run one sync pass and print new assets
  watch                         Keep syncing and print new assets until Ctrl-C
  search <term> [--sort name|date|size|type] [--desc|--asc] [--range all|today|week|month]
                                Search the folder listing
  delete <id>...                Delete assets by id
  login <token> [--gateway URL] Store the gateway token in the keychain
  logout                        Remove the stored token
  clear-cache                   Drop cached listing responses";

/// Initialize the tracing subscriber. Returns the file writer guard when
/// file logging is enabled; it must live as long as the program.
fn init_tracing(config: &Config) -> Option<WorkerGuard> {
    // RUST_LOG controls the level (e.g. RUST_LOG=medialib_core=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let stderr_layer = fmt::layer().with_writer(io::stderr);

    let log_dir = std::env::var(LOG_FILE_ENV_VAR)
        .ok()
        .filter(|v| v == "1")
        .and_then(|_| config.cache_dir().ok())
        .map(|dir| dir.join("logs"));

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "medialib.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let config = Config::load()?.apply_env();
    let _log_guard = init_tracing(&config);

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some((command, rest)) = args.split_first() else {
        eprintln!("{}", USAGE);
        return Ok(());
    };

    info!(command = %command, "medialib starting");
    match command.as_str() {
        "sync" => cmd_sync(&config).await,
        "watch" => cmd_watch(&config).await,
        "search" => cmd_search(&config, rest).await,
        "delete" => cmd_delete(&config, rest).await,
        "login" => cmd_login(config, rest),
        "logout" => cmd_logout(&config),
        "clear-cache" => cmd_clear_cache(&config),
        "-h" | "--help" | "help" => {
            println!("{}", USAGE);
            Ok(())
        }
        other => bail!("Unknown command '{}'\n\n{}", other, USAGE),
    }
}

/// Wire the engine up from configuration
fn build_library(config: &Config) -> Result<MediaLibrary> {
    let gateway_url = config
        .gateway_url
        .clone()
        .ok_or_else(|| anyhow!("No gateway URL configured. Set MEDIALIB_GATEWAY_URL or run `medialib login <token> --gateway URL`."))?;

    let mut client = GatewayClient::new(gateway_url)?;
    if let Some(token) = resolve_token(std::env::var(TOKEN_ENV_VAR).ok(), config.account_name()) {
        client.set_token(token);
    }

    let store = FileStore::new(config.cache_dir()?.join("responses"))
        .context("Failed to open response cache")?;
    let downloader = HttpDownloader::new(config.download_dir())?;

    Ok(MediaLibrary::new(
        Arc::new(client),
        Arc::new(downloader),
        ResponseCache::new(Box::new(store)),
        config.listing_query(),
        config.sync_interval(),
    ))
}

fn print_asset(asset: &Asset) {
    let dimensions = asset.dimensions.map(|d| d.display()).unwrap_or_default();
    println!(
        "{:<24} {:<width$} {:<5} {:>11} {:>9}  {}",
        truncate_string(&asset.id, 24),
        truncate_string(&asset.filename, FILENAME_WIDTH),
        asset.type_label(),
        dimensions,
        format_bytes(asset.byte_size),
        format_date(&asset.uploaded_at),
        width = FILENAME_WIDTH,
    );
}

async fn cmd_sync(config: &Config) -> Result<()> {
    let mut library = build_library(config)?;
    let added = library.sync_now().await?;

    for asset in &added {
        print_asset(asset);
    }
    let total = library.view().await.total();
    eprintln!("{} new, {} total", added.len(), total);
    Ok(())
}

async fn cmd_watch(config: &Config) -> Result<()> {
    let mut library = build_library(config)?;
    library.start_sync();
    eprintln!(
        "Watching '{}' every {} min. Press Ctrl-C to stop.",
        config.folder,
        config.sync_interval().as_secs() / 60
    );

    let mut ticker = tokio::time::interval(Duration::from_millis(WATCH_POLL_INTERVAL_MS));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                for asset in library.poll(Instant::now()).await {
                    print_asset(&asset);
                }
            }
        }
    }

    library.stop_sync();
    if let Some(at) = library.last_sync_time() {
        eprintln!("Last sync {}", format_date(&at));
    }
    Ok(())
}

async fn cmd_search(config: &Config, args: &[String]) -> Result<()> {
    let mut term: Option<&str> = None;
    let mut sort = SortKey::Date;
    let mut direction = SortDirection::Descending;
    let mut range = DateRange::All;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--sort" => {
                let value = iter.next().ok_or_else(|| anyhow!("--sort needs a value"))?;
                sort = value.parse().map_err(|e: String| anyhow!(e))?;
            }
            "--range" => {
                let value = iter.next().ok_or_else(|| anyhow!("--range needs a value"))?;
                range = value.parse().map_err(|e: String| anyhow!(e))?;
            }
            "--desc" => direction = SortDirection::Descending,
            "--asc" => direction = SortDirection::Ascending,
            other if term.is_none() => term = Some(other),
            other => bail!("Unexpected argument '{}'", other),
        }
    }
    let term = term.ok_or_else(|| anyhow!("Usage: medialib search <term> [options]"))?;

    let mut library = build_library(config)?;
    let response = library.browse(&config.listing_query()).await?;
    info!(listed = response.resources.len(), "Listing loaded");

    library.set_sort(sort, direction);
    library.set_date_range(range);
    library.set_search_term(term, Instant::now());
    library.search_ready().await;
    library.poll(Instant::now()).await;

    let view = library.view().await;
    eprintln!(
        "{} by {} ({}), {}",
        term,
        sort.label(),
        if direction == SortDirection::Ascending { "ascending" } else { "descending" },
        range.label()
    );
    for asset in view.displayed() {
        print_asset(asset);
    }
    if view.has_more() {
        eprintln!("Showing {} of {} matches", view.displayed().len(), view.total());
    } else {
        eprintln!("{} matches", view.total());
    }
    Ok(())
}

async fn cmd_delete(config: &Config, ids: &[String]) -> Result<()> {
    if ids.is_empty() {
        bail!("Usage: medialib delete <id>...");
    }

    let mut library = build_library(config)?;
    library.sync_now().await?;

    for id in ids {
        if !library.toggle_selection(id).await {
            eprintln!("Skipping unknown asset '{}'", id);
        }
    }
    if library.selection().is_empty() {
        bail!("Nothing to delete");
    }

    let outcome = library.apply_bulk(BulkAction::Delete).await?;
    if outcome.is_failure() {
        eprintln!("Warning: {}", outcome.toast_message());
    } else {
        eprintln!("{}", outcome.toast_message());
    }
    Ok(())
}

fn cmd_login(mut config: Config, args: &[String]) -> Result<()> {
    let mut token: Option<&str> = None;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--gateway" => {
                let url = iter.next().ok_or_else(|| anyhow!("--gateway needs a URL"))?;
                config.gateway_url = Some(url.clone());
                config.save()?;
            }
            other if token.is_none() => token = Some(other),
            other => bail!("Unexpected argument '{}'", other),
        }
    }
    let token = token.ok_or_else(|| anyhow!("Usage: medialib login <token> [--gateway URL]"))?;

    CredentialStore::store(config.account_name(), token)?;
    eprintln!("Token stored for account '{}'", config.account_name());
    Ok(())
}

fn cmd_logout(config: &Config) -> Result<()> {
    CredentialStore::delete(config.account_name())?;
    eprintln!("Token removed for account '{}'", config.account_name());
    Ok(())
}

fn cmd_clear_cache(config: &Config) -> Result<()> {
    let store = FileStore::new(config.cache_dir()?.join("responses"))?;
    ResponseCache::new(Box::new(store)).clear()?;
    eprintln!("Response cache cleared");
    Ok(())
}
