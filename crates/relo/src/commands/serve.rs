//! `relo serve` command implementation.

use std::path::PathBuf;

use clap::Args;
use relo_config::{CliSettings, Config};
use relo_server::{run_server, server_config_from_config};

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the serve command.
#[derive(Args)]
pub(crate) struct ServeArgs {
    /// Path to configuration file (default: auto-discover relo.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host to bind to (overrides config).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind to (overrides config).
    #[arg(short, long)]
    port: Option<u16>,

    /// Build output directory to watch (overrides config).
    #[arg(short, long)]
    watch_dir: Option<PathBuf>,

    /// Quiet period in milliseconds before a burst of file changes counts as
    /// one build (overrides config).
    #[arg(long)]
    debounce_ms: Option<u64>,

    /// Enable verbose output (show reload and connection logs).
    #[arg(short, long)]
    pub verbose: bool,

    /// Reload open pages along with the extension (default: enabled).
    #[arg(long)]
    reload_page: Option<bool>,

    /// Only reload the extension runtime, never open pages.
    #[arg(long, conflicts_with = "reload_page")]
    no_reload_page: bool,

    /// Enable build output watching (default: enabled).
    #[arg(long)]
    watch: Option<bool>,

    /// Disable build output watching.
    #[arg(long, conflicts_with = "watch")]
    no_watch: bool,
}

impl ServeArgs {
    /// Execute the serve command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails or the server fails to start.
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        // Resolve flags before moving into CliSettings
        let reload_page = self.resolve_reload_page();
        let watch_enabled = self.resolve_watch_enabled();

        let cli_settings = CliSettings {
            host: self.host,
            port: self.port,
            watch_dir: self.watch_dir,
            debounce_ms: self.debounce_ms,
            watch_enabled,
            reload_page,
            agent_name: None,
        };

        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;

        output.info(&format!(
            "Reload server listening on ws://{}:{}",
            config.server.host, config.server.port
        ));

        if config.watch_resolved.enabled {
            output.info(&format!(
                "Watching build output: {}",
                config.watch_resolved.dir.display()
            ));
        } else {
            output.warning("Build watching disabled; no reloads will be triggered");
        }

        if config.reload.reload_page {
            output.info("On change: reload extension and open pages");
        } else {
            output.info("On change: reload extension only");
        }

        run_server(server_config_from_config(&config)).await?;

        Ok(())
    }

    /// Resolve `reload_page` from --reload-page/--no-reload-page flags.
    fn resolve_reload_page(&self) -> Option<bool> {
        self.no_reload_page.then_some(false).or(self.reload_page)
    }

    /// Resolve `watch_enabled` from --watch/--no-watch flags.
    fn resolve_watch_enabled(&self) -> Option<bool> {
        self.no_watch.then_some(false).or(self.watch)
    }
}
