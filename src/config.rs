//! Configuration module for textchat.

use serde::Deserialize;
use std::path::Path;

use crate::{Result, TextChatError};

/// Transport credentials.
///
/// Set once before a session is constructed and passed unchanged to the
/// transport on every join.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    /// API key for the transport account.
    #[serde(default)]
    pub api_key: String,
    /// Identifier of the channel to join.
    #[serde(default)]
    pub session_id: String,
    /// Token authorizing this participant.
    #[serde(default)]
    pub token: String,
}

impl Credentials {
    /// Create a new set of credentials.
    pub fn new(
        api_key: impl Into<String>,
        session_id: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            session_id: session_id.into(),
            token: token.into(),
        }
    }

    /// Validate that no credential is empty.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("api_key", &self.api_key),
            ("session_id", &self.session_id),
            ("token", &self.token),
        ] {
            if value.trim().is_empty() {
                return Err(TextChatError::Validation(format!(
                    "credentials.{name} is not set"
                )));
            }
        }
        Ok(())
    }
}

/// Chat behaviour configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    /// Initial local display name.
    #[serde(default = "default_alias")]
    pub alias: String,
    /// Maximum outbound message length in characters.
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,
    /// Number of events buffered for each subscriber.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

/// Largest accepted `event_capacity`.
pub const MAX_EVENT_CAPACITY: usize = 65_536;

fn default_alias() -> String {
    "Me".to_string()
}

fn default_max_message_length() -> usize {
    8196
}

fn default_event_capacity() -> usize {
    100
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            alias: default_alias(),
            max_message_length: default_max_message_length(),
            event_capacity: default_event_capacity(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/textchat.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Transport credentials.
    #[serde(default)]
    pub credentials: Credentials,
    /// Chat configuration.
    #[serde(default)]
    pub chat: ChatConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Create a configuration with the given credentials and defaults elsewhere.
    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            credentials,
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(TextChatError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| TextChatError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `TEXTCHAT_API_KEY`
    /// - `TEXTCHAT_SESSION_ID`
    /// - `TEXTCHAT_TOKEN`
    ///
    /// Empty values are ignored.
    pub fn apply_env_overrides(&mut self) {
        let overrides = [
            ("TEXTCHAT_API_KEY", &mut self.credentials.api_key),
            ("TEXTCHAT_SESSION_ID", &mut self.credentials.session_id),
            ("TEXTCHAT_TOKEN", &mut self.credentials.token),
        ];
        for (var, field) in overrides {
            if let Ok(value) = std::env::var(var) {
                if !value.is_empty() {
                    *field = value;
                }
            }
        }
    }

    /// Validate the configuration.
    ///
    /// Returns an error if:
    /// - Any credential is empty
    /// - `max_message_length` or `event_capacity` is zero
    /// - `event_capacity` exceeds [`MAX_EVENT_CAPACITY`]
    pub fn validate(&self) -> Result<()> {
        self.credentials.validate()?;
        if self.chat.max_message_length == 0 {
            return Err(TextChatError::Validation(
                "chat.max_message_length must be greater than zero".to_string(),
            ));
        }
        if self.chat.event_capacity == 0 {
            return Err(TextChatError::Validation(
                "chat.event_capacity must be greater than zero".to_string(),
            ));
        }
        if self.chat.event_capacity > MAX_EVENT_CAPACITY {
            return Err(TextChatError::Validation(format!(
                "chat.event_capacity too large (max {MAX_EVENT_CAPACITY})"
            )));
        }
        Ok(())
    }
}
