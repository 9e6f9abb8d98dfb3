use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{DynabotError, Result};
use crate::types::DataDir;

/// Default system instruction given to the generation provider.
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are a smart AI assistant. Follow these principles:
- Understand and remember context.
- Identify intents and extract entities.
- Adjust tone based on sentiment.
- Provide short and accurate responses.";

/// Top-level configuration for the Dynabot application.
///
/// Loaded from `~/.dynabot/config.toml` by default. Each section corresponds
/// to one subsystem.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DynabotConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub voice: VoiceConfig,
}

impl DynabotConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: DynabotConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| DynabotError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Resolve the three store paths against the data directory.
    pub fn store_paths(&self) -> StorePaths {
        let base = DataDir::new(self.general.data_dir.clone()).path();
        StorePaths {
            conversation_log: base.join(&self.storage.conversation_log),
            analytics: base.join(&self.storage.analytics_file),
            error_log: base.join(&self.storage.error_log),
        }
    }
}

/// Absolute locations of the durable stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    pub conversation_log: PathBuf,
    pub analytics: PathBuf,
    pub error_log: PathBuf,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory holding the conversation log, analytics snapshot and error log.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// HTTP server port.
    pub port: u16,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.dynabot/data".to_string(),
            log_level: "info".to_string(),
            port: 5000,
        }
    }
}

/// Generation provider (Gemini REST API) settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// API key. Empty means "read from GEMINI_API_KEY at startup".
    pub api_key: String,
    /// Model identifier.
    pub model: String,
    /// Base URL of the models endpoint.
    pub base_url: String,
    /// System instruction sent with every request.
    pub system_instruction: String,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("system_instruction", &self.system_instruction)
            .finish()
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gemini-1.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta/models".to_string(),
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
        }
    }
}

/// File names of the durable stores, relative to `general.data_dir`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// JSON array of interaction records.
    pub conversation_log: String,
    /// JSON object holding the analytics snapshot.
    pub analytics_file: String,
    /// Newline-delimited JSON error records.
    pub error_log: String,
    /// Flush the analytics snapshot after every chat turn.
    pub flush_every_turn: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            conversation_log: "chat_history.json".to_string(),
            analytics_file: "chat_analytics.json".to_string(),
            error_log: "system_errors.json".to_string(),
            flush_every_turn: true,
        }
    }
}

/// Chat input limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Maximum user message length in characters.
    pub max_message_length: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_message_length: 2000,
        }
    }
}

/// Voice input configuration.
///
/// Read by `VoiceInput` when a front-end wires in a speech recognizer. The
/// `dynabot` server binary has no voice front-end and ignores this section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Whether voice input is offered at all.
    pub enabled: bool,
    /// Seconds to wait for speech before giving up.
    pub listen_timeout_secs: u64,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_timeout_secs: 5,
        }
    }
}
