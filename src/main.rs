//! Application entry point and server initialization
//!
//! This module contains the main function that:
//! - Loads environment configuration
//! - Initializes the database
//! - Either imports CSV reference data or starts the HTTP server with
//!   graceful shutdown support

mod cli;

use clap::Parser;
use dotenvy::dotenv;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use foodgram::config::Config;
use foodgram::database::{init_db, AppState};
use foodgram::import::import_dir;
use foodgram::route::create_app;

use crate::cli::Cli;

/// Application entry point
///
/// This asynchronous main function:
/// 1. Loads environment variables from .env file
/// 2. Sets up logging (`RUST_LOG` overrides the default filter)
/// 3. Parses the command line and reads [`Config`] from the environment
/// 4. Initializes the embedded database
/// 5. With `--import DIR`, loads the CSV files and exits
/// 6. Otherwise creates the application state and router and serves it
///    until a shutdown signal arrives
///
/// # Environment Variables
///
/// - `PORT` - Server port number (default: 8080)
/// - `DATABASE_URL` - Path to database file (default: "data.db")
/// - `PUBLIC_URL`, `AUTHORIZATION`, `PAGE_SIZE` - see [`foodgram::config`]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if it exists
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("foodgram=debug,tower_http=debug")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    // Tables are created on first open
    let db = init_db(&config.database_path)?;

    if let Some(dir) = cli.import {
        let summary = import_dir(&db, &dir)?;
        info!(
            ingredients = summary.ingredients_created,
            tags = summary.tags_created,
            "reference data loaded"
        );
        return Ok(());
    }

    let addr = format!("0.0.0.0:{}", config.port);
    info!(
        database = %config.database_path,
        public_url = %config.public_url,
        auth = config.api_key.is_some(),
        "starting server"
    );

    // Request/response logging wraps every route
    let app = create_app(AppState::new(db, config)).layer(TraceLayer::new_for_http());

    // Bind to all network interfaces on the configured port
    let listener = TcpListener::bind(&addr).await?;
    info!("listening on {}", addr);

    // Runs until SIGTERM or SIGINT, then lets open requests finish
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

/// Handles graceful shutdown signals
///
/// Returns when one of these arrives:
/// - SIGINT (Ctrl+C) - Interrupt signal from terminal
/// - SIGTERM - Termination signal (common in Docker/Kubernetes), Unix only
///
/// When it returns:
/// 1. The server stops accepting connections
/// 2. Open requests are allowed to complete
/// 3. No redb write transaction is cut off midway
///
/// If a handler cannot be installed, that signal is simply never awaited.
async fn shutdown_signal() {
    // Handle Ctrl+C (SIGINT)
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    // Handle SIGTERM on Unix systems (Linux, macOS)
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    // On non-Unix systems (Windows), only handle Ctrl+C
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    // Wait for either signal to be received
    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received, stopping server");
}
