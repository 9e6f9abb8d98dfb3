//! CLI argument definitions for the Dynabot server.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

use dynabot_core::config::DynabotConfig;

/// Dynabot: a conversational assistant backed by the Gemini API.
#[derive(Parser, Debug)]
#[command(name = "dynabot", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// API server port.
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Directory for the conversation log, analytics and error log.
    #[arg(short = 'd', long = "data-dir")]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Gemini model identifier.
    #[arg(short = 'm', long = "model")]
    pub model: Option<String>,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > DYNABOT_CONFIG env var > ~/.dynabot/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("DYNABOT_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the API server port.
    ///
    /// Priority: --port flag > DYNABOT_PORT env var > config file value > 5000.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        if let Some(p) = self.port {
            return p;
        }
        if let Ok(val) = std::env::var("DYNABOT_PORT") {
            if let Ok(p) = val.parse::<u16>() {
                return p;
            }
        }
        if config_port != 0 {
            return config_port;
        }
        5000
    }

    /// Resolve the Gemini API key.
    ///
    /// Priority: GEMINI_API_KEY env var > config file value. There is no flag.
    pub fn resolve_api_key(&self, config_key: &str) -> String {
        match std::env::var("GEMINI_API_KEY") {
            Ok(key) if !key.trim().is_empty() => key,
            _ => config_key.to_string(),
        }
    }

    /// Load the resolved config file and fold in every override.
    ///
    /// A missing or malformed file falls back to defaults with a warning.
    pub fn load_config(&self) -> (PathBuf, DynabotConfig) {
        let path = self.resolve_config_path();
        let mut config = DynabotConfig::load_or_default(&path);
        self.apply(&mut config);
        (path, config)
    }

    /// Fold every override into `config`.
    pub fn apply(&self, config: &mut DynabotConfig) {
        config.general.port = self.resolve_port(config.general.port);
        config.provider.api_key = self.resolve_api_key(&config.provider.api_key);
        if let Some(ref dir) = self.data_dir {
            config.general.data_dir = dir.to_string_lossy().to_string();
        }
        if let Some(ref level) = self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(ref model) = self.model {
            config.provider.model = model.clone();
        }
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".dynabot").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".dynabot").join("config.toml");
    }
    PathBuf::from("config.toml")
}
