//! usercollect Server Binary
//!
//! Opens the store and serves the HTTP API until interrupted.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};
use usercollect::{Config, SyncStrategy, UserStore};

/// usercollect Server
#[derive(Parser, Debug)]
#[command(name = "usercollect-server")]
#[command(about = "Collects user records over HTTP into an embedded store")]
#[command(version)]
struct Args {
    /// Path of the store file
    #[arg(short, long, default_value = "./usercollect.db")]
    db: PathBuf,

    /// Listen address (host:port)
    #[arg(short, long, default_value = "0.0.0.0:8080")]
    addr: String,

    /// Log level used when RUST_LOG is not set (off|error|warn|info|debug|trace)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Seconds to wait for the store file lock
    #[arg(long, default_value = "10")]
    lock_timeout_secs: u64,

    /// Skip fsync on each commit
    #[arg(long)]
    no_sync: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},tower_http=info", args.log_level)));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    tracing::info!("usercollect Server v{}", usercollect::VERSION);
    tracing::info!("Store file: {}", args.db.display());
    tracing::info!("Listen address: {}", args.addr);

    let config = Config::builder()
        .db_path(&args.db)
        .listen_addr(&args.addr)
        .lock_timeout(Duration::from_secs(args.lock_timeout_secs))
        .sync_strategy(if args.no_sync {
            SyncStrategy::OsBuffered
        } else {
            SyncStrategy::EveryCommit
        })
        .build();

    // Open and initialise the store
    let store = match UserStore::open_path(&config.db_path, config.db_options()) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::error!("Could not open the store: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Store initialized successfully");

    if let Err(e) = usercollect::http::serve(&config, Arc::clone(&store), shutdown_signal()).await {
        tracing::error!("Server error: {}", e);
    }

    if let Err(e) = store.close() {
        tracing::error!("Could not close the store: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Shutdown usercollect service at address: {}", config.listen_addr);
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Could not listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Could not listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("Received exit signal - shutting down");
}
