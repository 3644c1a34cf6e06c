//! `relo agent` command implementation.
//!
//! Runs the extension-side agent in-process with simulated runtime and
//! pages, so the whole reload loop can be exercised against `relo serve`
//! without loading anything into a browser.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use relo_agent::{AgentConfig, ExtensionHost, PageAgent, PageBus, ReloadAgent};
use relo_config::{CliSettings, Config};

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the agent command.
#[derive(Args)]
pub(crate) struct AgentArgs {
    /// Path to configuration file (default: auto-discover relo.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Server host to connect to (overrides config).
    #[arg(long)]
    host: Option<String>,

    /// Server port to connect to (overrides config).
    #[arg(short, long)]
    port: Option<u16>,

    /// Display name announced to the server (overrides config).
    #[arg(short, long)]
    name: Option<String>,

    /// Number of simulated open pages.
    #[arg(long, default_value_t = 1)]
    pages: usize,

    /// Enable verbose output (show connection state changes).
    #[arg(short, long)]
    pub verbose: bool,
}

/// Simulated extension runtime that just reports reloads.
struct SimulatedHost;

impl ExtensionHost for SimulatedHost {
    fn reload_runtime(&self) {
        Output::new().success("extension runtime reloaded");
    }
}

impl AgentArgs {
    /// Execute the agent command. Runs until interrupted.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails.
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = CliSettings {
            host: self.host,
            port: self.port,
            agent_name: self.name,
            ..Default::default()
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;

        let agent_config = AgentConfig::new(
            &config.server.host,
            config.server.port,
            config.agent.name.clone(),
        );

        output.info(&format!(
            "Simulating {:?} against {}",
            config.agent.name, agent_config.url
        ));

        let bus = PageBus::new();
        for page in 0..self.pages {
            let page_output = Output::new();
            PageAgent::new().attach(Some(&bus), move || {
                page_output.info(&format!("page {page} reloaded"));
            });
        }

        ReloadAgent::new(agent_config, Arc::new(SimulatedHost), bus)
            .run()
            .await;

        Ok(())
    }
}
