use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

mod config;
mod db;
mod error;
mod feed;
mod matching;
mod status;
mod tracker;

use config::Config;
use db::Database;
use feed::OddsFeedClient;
use matching::TrackMatcher;
use status::StatusBoard;
use tracker::{
    ActivityPolicy, BatchWriter, ChangeDetector, RunnerCache, Scheduler, SystemClock, Tracker,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;
    let tz = config.tz()?;

    // Open database
    let db = Database::open(&config.database_path)?;
    info!("Database opened: {}", config.database_path);
    if config.init_schema {
        db.ensure_schema()?;
        info!("Runners schema ensured");
    }

    let feed = OddsFeedClient::new(
        config.feed_url(),
        &config.feed_path,
        config.feed_proxy_secret.clone(),
        config.feed_timeout(),
    )?;
    info!("Odds feed: {}", feed.url());

    // Status server
    let board = StatusBoard::new(Utc::now());
    let addr: SocketAddr = config.status_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Status server listening on http://{}", addr);
    let app = status::router(board.clone());
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Status server stopped: {}", e);
        }
    });

    let tracks = if config.match_track_aliases {
        TrackMatcher::with_catalogue_aliases()
    } else {
        TrackMatcher::default()
    };
    let detector = ChangeDetector::new(
        config.odds_change_threshold,
        tracks,
        ActivityPolicy::new(config.unparsable_race_time, config.active_grace(), tz),
    );

    let mut tracker = Tracker::new(
        Arc::new(feed),
        Arc::new(db),
        RunnerCache::new(config.cache_ttl()),
        detector,
        BatchWriter::new(config.batch_size),
        config.active_window(),
        tz,
        Arc::new(SystemClock),
        board,
    );

    info!(
        "Tracking odds every {}s between {:02}:00 and {:02}:59 {}",
        config.poll_interval_secs, config.active_start_hour, config.active_end_hour, tz
    );
    Scheduler::new(config.poll_interval())
        .run(&mut tracker, shutdown_signal())
        .await;

    info!("Releasing {} cached runners", tracker.cache().len());
    tracker.teardown();
    info!("Shutdown complete");
    Ok(())
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Ctrl-C received, shutting down"),
        _ = terminate => info!("SIGTERM received, shutting down"),
    }
}
