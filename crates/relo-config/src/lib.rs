//! Configuration management for relo.
//!
//! Parses `relo.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override server host.
    pub host: Option<String>,
    /// Override server port.
    pub port: Option<u16>,
    /// Override build output directory to watch.
    pub watch_dir: Option<PathBuf>,
    /// Override watch debounce duration.
    pub debounce_ms: Option<u64>,
    /// Override whether watching is enabled.
    pub watch_enabled: Option<bool>,
    /// Override whether pages reload along with the extension runtime.
    pub reload_page: Option<bool>,
    /// Override the display name the agent simulator announces.
    pub agent_name: Option<String>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "relo.toml";

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Reload server configuration.
    pub server: ServerConfig,
    /// Reload command configuration.
    pub reload: ReloadConfig,
    /// Build output watching (paths are relative strings from TOML).
    watch: WatchConfigRaw,
    /// Extension agent simulator configuration.
    pub agent: AgentConfig,

    /// Resolved watch configuration (set after loading).
    #[serde(skip)]
    pub watch_resolved: WatchConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Reload server configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: relo_protocol::DEFAULT_HOST.to_owned(),
            port: relo_protocol::DEFAULT_PORT,
        }
    }
}

/// Reload command configuration.
///
/// The bundle names are the contract with the build tooling that injects the
/// agent into the extension's output bundles; they also seed the default watch
/// patterns.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ReloadConfig {
    /// Name of the content-script bundle.
    pub content_script: String,
    /// Name of the background-script bundle.
    pub background_script: String,
    /// Reload every open page along with the extension runtime.
    pub reload_page: bool,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            content_script: "content".to_owned(),
            background_script: "background".to_owned(),
            reload_page: true,
        }
    }
}

/// Raw watch configuration as parsed from TOML (paths as strings).
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct WatchConfigRaw {
    dir: Option<String>,
    patterns: Option<Vec<String>>,
    debounce_ms: Option<u64>,
    enabled: Option<bool>,
}

/// Default quiet period before a burst of file events counts as one build.
const DEFAULT_DEBOUNCE_MS: u64 = 300;

/// Resolved watch configuration with absolute paths.
#[derive(Debug, Default)]
pub struct WatchConfig {
    /// Build output directory to watch.
    pub dir: PathBuf,
    /// Glob patterns that identify build output of interest.
    pub patterns: Vec<String>,
    /// Quiet period in milliseconds before firing a build-completed trigger.
    pub debounce_ms: u64,
    /// Whether watching is enabled.
    pub enabled: bool,
}

/// Extension agent simulator configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Display name announced to the server.
    pub name: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "Extension".to_owned(),
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `relo.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading and path resolution, allowing CLI
    /// arguments to take precedence over config file values.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist or parsing fails.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }

        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(host) = &settings.host {
            self.server.host.clone_from(host);
        }
        if let Some(port) = settings.port {
            self.server.port = port;
        }
        if let Some(watch_dir) = &settings.watch_dir {
            self.watch_resolved.dir.clone_from(watch_dir);
        }
        if let Some(debounce_ms) = settings.debounce_ms {
            self.watch_resolved.debounce_ms = debounce_ms;
        }
        if let Some(watch_enabled) = settings.watch_enabled {
            self.watch_resolved.enabled = watch_enabled;
        }
        if let Some(reload_page) = settings.reload_page {
            self.reload.reload_page = reload_page;
        }
        if let Some(agent_name) = &settings.agent_name {
            self.agent.name.clone_from(agent_name);
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Create default config with paths relative to current working directory.
    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    /// Create default config with paths relative to given base directory.
    fn default_with_base(base: &Path) -> Self {
        let mut config = Self {
            server: ServerConfig::default(),
            reload: ReloadConfig::default(),
            watch: WatchConfigRaw::default(),
            agent: AgentConfig::default(),
            watch_resolved: WatchConfig::default(),
            config_path: None,
        };
        config.resolve_watch(base);
        config
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_watch(config_dir);
        config.config_path = Some(path.to_path_buf());

        config.validate()?;

        Ok(config)
    }

    /// Resolve the watch section against the config directory.
    ///
    /// When no patterns are configured, they default to the bundle script
    /// names so an unrelated asset write doesn't trigger a reload.
    fn resolve_watch(&mut self, config_dir: &Path) {
        let patterns = self.watch.patterns.clone().unwrap_or_else(|| {
            vec![
                format!("**/{}*.js", self.reload.content_script),
                format!("**/{}*.js", self.reload.background_script),
            ]
        });

        self.watch_resolved = WatchConfig {
            dir: config_dir.join(self.watch.dir.as_deref().unwrap_or("dist")),
            patterns,
            debounce_ms: self.watch.debounce_ms.unwrap_or(DEFAULT_DEBOUNCE_MS),
            enabled: self.watch.enabled.unwrap_or(true),
        };
    }

    /// Validate configuration values.
    ///
    /// Called automatically after loading from file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.server.host, "server.host")?;

        // Port 0 is technically valid (OS assigns a random port), but the
        // agent could never find the server on it
        if self.server.port == 0 {
            return Err(ConfigError::Validation(
                "server.port cannot be 0".to_owned(),
            ));
        }

        require_non_empty(&self.reload.content_script, "reload.content_script")?;
        require_non_empty(&self.reload.background_script, "reload.background_script")?;
        require_non_empty(&self.agent.name, "agent.name")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default_with_base(Path::new("/test"));
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 1337);
        assert_eq!(config.reload.content_script, "content");
        assert_eq!(config.reload.background_script, "background");
        assert!(config.reload.reload_page);
        assert_eq!(config.watch_resolved.dir, PathBuf::from("/test/dist"));
        assert_eq!(config.watch_resolved.debounce_ms, 300);
        assert!(config.watch_resolved.enabled);
        assert_eq!(config.agent.name, "Extension");
    }

    #[test]
    fn test_parse_minimal_config() {
        let toml = "";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 1337);
    }

    #[test]
    fn test_parse_server_config() {
        let toml = r#"
[server]
host = "0.0.0.0"
port = 9000
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9000);
    }

    #[test]
    fn test_parse_reload_config() {
        let toml = r#"
[reload]
content_script = "content-main"
background_script = "worker"
reload_page = false
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.reload.content_script, "content-main");
        assert_eq!(config.reload.background_script, "worker");
        assert!(!config.reload.reload_page);
    }

    #[test]
    fn test_resolve_watch_paths() {
        let toml = r#"
[watch]
dir = "build/out"
debounce_ms = 150
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.resolve_watch(Path::new("/project"));

        assert_eq!(
            config.watch_resolved.dir,
            PathBuf::from("/project/build/out")
        );
        assert_eq!(config.watch_resolved.debounce_ms, 150);
        assert!(config.watch_resolved.enabled);
    }

    #[test]
    fn test_default_patterns_follow_script_names() {
        let toml = r#"
[reload]
content_script = "page"
background_script = "bg"
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.resolve_watch(Path::new("/project"));

        assert_eq!(
            config.watch_resolved.patterns,
            vec!["**/page*.js".to_owned(), "**/bg*.js".to_owned()]
        );
    }

    #[test]
    fn test_explicit_patterns_win() {
        let toml = r#"
[watch]
patterns = ["**/*.js", "**/*.json"]
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.resolve_watch(Path::new("/project"));

        assert_eq!(
            config.watch_resolved.patterns,
            vec!["**/*.js".to_owned(), "**/*.json".to_owned()]
        );
    }

    #[test]
    fn test_apply_cli_settings_port() {
        let mut config = Config::default_with_base(Path::new("/test"));
        let overrides = CliSettings {
            port: Some(9000),
            ..Default::default()
        };

        config.apply_cli_settings(&overrides);

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1"); // Unchanged
    }

    #[test]
    fn test_apply_cli_settings_watch_dir() {
        let mut config = Config::default_with_base(Path::new("/test"));
        let overrides = CliSettings {
            watch_dir: Some(PathBuf::from("/custom/dist")),
            ..Default::default()
        };

        config.apply_cli_settings(&overrides);

        assert_eq!(config.watch_resolved.dir, PathBuf::from("/custom/dist"));
    }

    #[test]
    fn test_apply_cli_settings_reload_page() {
        let mut config = Config::default_with_base(Path::new("/test"));
        let overrides = CliSettings {
            reload_page: Some(false),
            ..Default::default()
        };

        config.apply_cli_settings(&overrides);

        assert!(!config.reload.reload_page);
    }

    #[test]
    fn test_validate_rejects_port_zero() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.server.port = 0;

        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("server.port"));
    }

    #[test]
    fn test_validate_rejects_empty_script_name() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.reload.background_script = String::new();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("background_script"));
    }
}
