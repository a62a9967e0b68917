use crate::defaults;
use crate::error::ParleyError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
#[cfg(feature = "cli")]
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub speech: SpeechConfig,
    pub dialogue: DialogueConfig,
    pub service: ServiceConfig,
}

/// Recognition and synthesis voice settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SpeechConfig {
    pub language: String,
    pub rate: f32,
    pub pitch: f32,
}

/// Turn-taking configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DialogueConfig {
    pub silence_ms: u64,
    pub goodbye: String,
    pub max_input_restarts: u32,
    pub restart_backoff_ms: u64,
}

/// Assistant backend configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    pub url: String,
    pub timeout_secs: u64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            language: defaults::LANGUAGE.to_string(),
            rate: defaults::SPEECH_RATE,
            pitch: defaults::SPEECH_PITCH,
        }
    }
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            silence_ms: defaults::SILENCE_MS,
            goodbye: defaults::GOODBYE.to_string(),
            max_input_restarts: defaults::MAX_INPUT_RESTARTS,
            restart_backoff_ms: defaults::RESTART_BACKOFF_MS,
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            url: defaults::SERVICE_URL.to_string(),
            timeout_secs: defaults::SERVICE_TIMEOUT_SECS,
        }
    }
}

impl DialogueConfig {
    /// Quiet period after the last fragment before an utterance is final.
    pub fn silence(&self) -> Duration {
        Duration::from_millis(self.silence_ms)
    }

    pub fn restart_backoff(&self) -> Duration {
        Duration::from_millis(self.restart_backoff_ms)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Returns errors for invalid TOML.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e) => {
                if e.downcast_ref::<std::io::Error>()
                    .map(|io_err| io_err.kind() == std::io::ErrorKind::NotFound)
                    .unwrap_or(false)
                {
                    Ok(Self::default())
                } else {
                    Err(e.context(format!("Failed to load config from {}", path.display())))
                }
            }
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - PARLEY_SERVICE_URL → service.url
    /// - PARLEY_LANGUAGE → speech.language
    /// - PARLEY_SILENCE_MS → dialogue.silence_ms (ignored unless a positive integer)
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("PARLEY_SERVICE_URL")
            && !url.is_empty()
        {
            self.service.url = url;
        }

        if let Ok(language) = std::env::var("PARLEY_LANGUAGE")
            && !language.is_empty()
        {
            self.speech.language = language;
        }

        if let Ok(silence) = std::env::var("PARLEY_SILENCE_MS")
            && let Ok(ms) = silence.trim().parse::<u64>()
            && ms > 0
        {
            self.dialogue.silence_ms = ms;
        }

        self
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.dialogue.silence_ms == 0 {
            return Err(invalid("dialogue.silence_ms", "must be greater than zero"));
        }
        if !(0.1..=10.0).contains(&self.speech.rate) {
            return Err(invalid("speech.rate", "must be between 0.1 and 10.0"));
        }
        if !(0.0..=2.0).contains(&self.speech.pitch) {
            return Err(invalid("speech.pitch", "must be between 0.0 and 2.0"));
        }
        if self.speech.language.trim().is_empty() {
            return Err(invalid("speech.language", "must not be empty"));
        }
        if !(self.service.url.starts_with("http://") || self.service.url.starts_with("https://"))
        {
            return Err(invalid("service.url", "must start with http:// or https://"));
        }
        if self.service.timeout_secs == 0 {
            return Err(invalid("service.timeout_secs", "must be greater than zero"));
        }
        Ok(())
    }

    /// Look up a value by dotted key path (e.g. `dialogue.silence_ms`).
    ///
    /// Strings are returned without quotes; sections are rendered as TOML.
    pub fn get_value_by_path(&self, key: &str) -> crate::error::Result<String> {
        let root = toml::Value::try_from(self).map_err(|e| ParleyError::ConfigParse {
            message: e.to_string(),
        })?;

        let mut current = &root;
        for part in key.split('.') {
            current = current
                .get(part)
                .ok_or_else(|| invalid(key, "unknown configuration key"))?;
        }

        Ok(match current {
            toml::Value::String(s) => s.clone(),
            toml::Value::Table(table) => {
                toml::to_string_pretty(table).map_err(|e| ParleyError::ConfigParse {
                    message: e.to_string(),
                })?
            }
            other => other.to_string(),
        })
    }

    /// Render the full configuration as TOML.
    pub fn to_toml(&self) -> crate::error::Result<String> {
        toml::to_string_pretty(self).map_err(|e| ParleyError::ConfigParse {
            message: e.to_string(),
        })
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/parley/config.toml on Linux
    #[cfg(feature = "cli")]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("parley")
            .join("config.toml")
    }
}

fn invalid(key: &str, message: &str) -> ParleyError {
    ParleyError::ConfigInvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}
