use colloquy_controller::{ControllerConfig, StreamTargetAllocator, ToggleMode};
use colloquy_remote::RemoteConfig;
use config::{Config as ConfigLoader, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub remote: RemoteSection,
    pub chat: ChatSection,
    #[serde(default)]
    pub snapshot: SnapshotSection,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteSection {
    pub base_url: String,
    pub request_timeout_ms: u64,
    pub connect_timeout_ms: u64,
}

impl RemoteSection {
    pub fn remote_config(&self) -> RemoteConfig {
        RemoteConfig::new(self.base_url.clone())
            .with_request_timeout(Duration::from_millis(self.request_timeout_ms))
            .with_connect_timeout(Duration::from_millis(self.connect_timeout_ms))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatSection {
    /// Start the REPL in streaming mode
    pub streaming: bool,
    #[serde(default)]
    pub toggle_mode: ToggleMode,
    #[serde(default)]
    pub stream_target: StreamTargetAllocator,
    #[serde(default)]
    pub reply_template: Option<String>,
    #[serde(default)]
    pub reply_delay_ms: u64,
    pub open_timeout_ms: u64,
}

impl ChatSection {
    pub fn controller_config(&self) -> ControllerConfig {
        let config = ControllerConfig::new()
            .with_toggle_mode(self.toggle_mode)
            .with_stream_target(self.stream_target)
            .with_reply_delay(Duration::from_millis(self.reply_delay_ms))
            .with_open_timeout(Duration::from_millis(self.open_timeout_ms));

        match &self.reply_template {
            Some(template) => config.with_reply_template(template.clone()),
            None => config,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SnapshotSection {
    /// JSON file the threads are restored from at start and saved to on exit
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Config {
    /// Load configuration from TOML files and environment variables
    ///
    /// Hierarchy (weakest to strongest):
    /// 1. config/default.toml
    /// 2. config/{ENV}.toml (if ENV is set)
    /// 3. Environment variables, e.g. `COLLOQUY_REMOTE__BASE_URL`
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("ENV").unwrap_or_else(|_| "dev".to_string());

        let config = ConfigLoader::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(
                Environment::with_prefix("COLLOQUY")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load config from a specific path (useful for testing)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        ConfigLoader::builder()
            .add_source(File::from(path.as_ref()))
            .build()?
            .try_deserialize()
    }
}
