//! Application entry point and server initialization
//!
//! This module contains the main function that:
//! - Loads environment configuration
//! - Initializes the database and the waterfall router
//! - Optionally spawns the background health prober
//! - Starts the HTTP server with graceful shutdown support

use std::env;
use std::sync::Arc;
use std::time::Duration;

use dotenvy::dotenv;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;

// Module declarations
mod database;
mod error;
mod handler;
mod health;
mod model;
mod params;
mod prober;
mod route;
mod router;
mod store;

use database::{init_db, AppState};
use prober::spawn_health_prober;
use route::create_app;
use router::{ThreadRngDraw, WaterfallRouter};
use store::RedbLinkStore;

/// Application entry point
///
/// # Environment Variables
///
/// - `PORT` - Server port number (default: 8080)
/// - `DATABASE_URL` - Path to database file (default: "data.db")
/// - `LOOKUP_TIMEOUT_MS` - Per-lookup deadline inside the router (default: 50)
/// - `HEALTH_CHECK_INTERVAL_MS` - Probe interval for the background health
///   checker; 0 disables it (default: 0)
#[tokio::main]
async fn main() {
    // Load environment variables from .env file if it exists
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter("linkrouter=debug,tower_http=debug")
        .init();

    let port_str = env::var("PORT").unwrap_or_else(|_| "8080".to_string());
    let port: u16 = port_str.parse().unwrap_or(8080);

    let db_name = env::var("DATABASE_URL").unwrap_or_else(|_| "data.db".to_string());

    let lookup_timeout_ms: u64 = env::var("LOOKUP_TIMEOUT_MS")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(50);

    let probe_interval_ms: u64 = env::var("HEALTH_CHECK_INTERVAL_MS")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(0);

    // Initialize the embedded database with the specified path
    let db = init_db(&db_name).expect("Failed to initialize database");
    let store = RedbLinkStore::new(Arc::new(db));

    // The prober refreshes the cached health state the router reads
    if probe_interval_ms > 0 {
        spawn_health_prober(store.clone(), probe_interval_ms);
    }

    let waterfall = WaterfallRouter::with_parts(
        Arc::new(store),
        Arc::new(ThreadRngDraw),
        Duration::from_millis(lookup_timeout_ms),
    );

    let state = AppState {
        router: Arc::new(waterfall),
    };

    // Create the Axum router with all routes configured
    let app = create_app(state).layer(TraceLayer::new_for_http());

    // Bind to all network interfaces on the specified port
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await.unwrap();

    println!("🚀 Link router running at http://localhost:{}", port);
    println!("📂 Using database: {}", db_name);

    // Start the server with graceful shutdown support
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();
}

/// Handles graceful shutdown signals
///
/// Returns when SIGINT (Ctrl+C) or SIGTERM is received, letting open
/// connections complete and database transactions close cleanly.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    println!("\n🛑 Shutdown signal received, stopping server.");
}
