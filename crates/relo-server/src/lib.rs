//! Reload coordination server.
//!
//! The build-process half of relo. Listens on a fixed local WebSocket
//! endpoint for the extension agent, watches the build output directory, and
//! pushes reload commands while rate-limiting them so the browser does not
//! disable the extension for reloading too often.
//!
//! # Architecture
//!
//! ```text
//! build output ──notify──► BuildWatcher ──BuildCompleted──┐
//!                                                         ▼
//! extension agent ◄──ws──► socket task ◄──────► ConnectionManager
//!                                                         │
//!                                                   ReloadThrottle
//! ```
//!
//! All connection and throttle state is owned by a single manager task;
//! sockets, the watcher and the backoff countdown only exchange events with
//! it.

mod app;
mod error;
mod manager;
mod state;
mod throttle;
mod watch;
mod ws;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use relo_protocol::ReloadCommand;
use tokio::time::Duration;

pub use error::ServerError;

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Reload every open page along with the extension runtime.
    pub reload_page: bool,
    /// Build output directory to watch (`None` disables watching; reloads
    /// must then be triggered by an external build hook).
    pub watch_dir: Option<PathBuf>,
    /// Glob patterns that identify build output of interest.
    pub watch_patterns: Vec<String>,
    /// Quiet period in milliseconds before a burst counts as one build.
    pub debounce_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: relo_protocol::DEFAULT_HOST.to_owned(),
            port: relo_protocol::DEFAULT_PORT,
            reload_page: true,
            watch_dir: None,
            watch_patterns: Vec::new(),
            debounce_ms: 300,
        }
    }
}

/// Run the reload server until shutdown.
///
/// # Errors
///
/// Returns an error if the listen address is invalid, the watcher cannot be
/// started, or binding fails.
pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let command = if config.reload_page {
        ReloadCommand::All
    } else {
        ReloadCommand::ExtensionOnly
    };

    let (manager, events) = manager::ConnectionManager::new(command);
    tokio::spawn(manager.run());

    // The notify watcher lives inside BuildWatcher; keep it alive for the
    // whole serve call.
    let _watcher = match &config.watch_dir {
        Some(dir) => {
            let mut watcher = watch::BuildWatcher::new(
                dir.clone(),
                config.watch_patterns.clone(),
                Duration::from_millis(config.debounce_ms),
                events.clone(),
            );
            watcher.start()?;
            Some(watcher)
        }
        None => None,
    };

    let state = Arc::new(state::AppState { manager: events });
    let app = app::create_router(state);

    let addr = SocketAddr::from_str(&format!("{}:{}", config.host, config.port))?;
    tracing::info!(address = %addr, "Starting reload server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Wait for shutdown signal (Ctrl-C).
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}

/// Create server configuration from relo config.
#[must_use]
pub fn server_config_from_config(config: &relo_config::Config) -> ServerConfig {
    ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
        reload_page: config.reload.reload_page,
        watch_dir: config
            .watch_resolved
            .enabled
            .then(|| config.watch_resolved.dir.clone()),
        watch_patterns: config.watch_resolved.patterns.clone(),
        debounce_ms: config.watch_resolved.debounce_ms,
    }
}
