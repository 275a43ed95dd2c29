//! # Linkarr Server
//!
//! HTTP front-end for the Linkarr media organizer: a REST API over the
//! ingestion pipeline plus a live SSE event stream consumed by the UI.
//!
//! ## Architecture
//!
//! The server is built on Axum and wires together:
//! - SQLite (via sqlx) for the durable record store
//! - a JSON config document for runtime-mutable settings
//! - TMDB/TVDB for metadata matching
//! - the ingestion engine for discovery, linking, and the orphan sweep

mod errors;
mod handlers;
mod routes;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use linkarr_config::ConfigStore;
use linkarr_core::{
    AutoScanner, EventBus, FileLinker, IngestionEngine, MetadataMatcher, RadarrClient,
    RecordStore, SonarrClient, TmdbClient, TvdbClient,
};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::state::AppState;

/// Command line arguments for the Linkarr server.
#[derive(Parser, Debug)]
#[command(name = "linkarr-server")]
#[command(about = "Media organizer for debrid setups - hardlinks downloads into a Plex/Jellyfin-compatible library")]
struct Args {
    /// Listen address
    #[arg(long, env = "LINKARR_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Listen port
    #[arg(short, long, env = "LINKARR_PORT", default_value_t = 8080)]
    port: u16,

    /// Directory holding the config document and the record database
    #[arg(long, env = "LINKARR_DATA_DIR", default_value = "./data")]
    data_dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "linkarr_server=debug,linkarr_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tokio::fs::create_dir_all(&args.data_dir).await?;

    let config = Arc::new(ConfigStore::new(args.data_dir.join("config.json")));
    let document = config.load();
    tokio::fs::create_dir_all(document.movies_path()).await?;
    tokio::fs::create_dir_all(document.tv_path()).await?;

    let store = RecordStore::connect(&args.data_dir.join("linkarr.db")).await?;
    let bus = Arc::new(EventBus::new());

    let matcher = Arc::new(MetadataMatcher::new(
        TmdbClient::new(Arc::clone(&config)),
        TvdbClient::new(Arc::clone(&config)),
    ));
    let engine = Arc::new(IngestionEngine::new(
        Arc::clone(&config),
        store,
        matcher,
        FileLinker::new(Arc::clone(&config)),
        RadarrClient::new(Arc::clone(&config)),
        SonarrClient::new(Arc::clone(&config)),
        Arc::clone(&bus),
    ));

    let auto_scanner = Arc::new(AutoScanner::new(Arc::clone(&config), Arc::clone(&engine)));
    auto_scanner.start().await;

    let state = AppState {
        config,
        bus,
        engine,
        auto_scanner: Arc::clone(&auto_scanner),
    };
    let router = routes::create_router(state);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    info!(%addr, "linkarr server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    auto_scanner.stop().await;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
