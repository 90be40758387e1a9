//! Configuration management for Polymode
//!
//! This module handles loading, parsing, and validating configuration
//! from a YAML file with per-field defaults, so a missing file or a
//! partial file both yield a usable configuration.

use crate::error::{PolymodeError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure for Polymode
///
/// Holds backend connection settings, conversation storage settings,
/// chat pathway tuning, and the local user profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Generation backend configuration
    #[serde(default)]
    pub backend: BackendConfig,

    /// Conversation storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Chat pathway configuration
    #[serde(default)]
    pub chat: ChatConfig,

    /// Local user profile configuration
    #[serde(default)]
    pub user: UserConfig,
}

/// Generation backend configuration
///
/// Specifies the backend host, the credential source, and which model
/// serves each modality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the generation backend
    #[serde(default = "default_backend_host")]
    pub host: String,

    /// Environment variable holding the API credential
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Fast-tier chat model
    #[serde(default = "default_fast_model")]
    pub fast_model: String,

    /// Capable-tier chat model (video analysis, extended reasoning)
    #[serde(default = "default_capable_model")]
    pub capable_model: String,

    /// Image generation/editing model
    #[serde(default = "default_image_model")]
    pub image_model: String,

    /// Video generation model
    #[serde(default = "default_video_model")]
    pub video_model: String,

    /// Speech synthesis model
    #[serde(default = "default_speech_model")]
    pub speech_model: String,

    /// Reasoning token budget requested when the thinking flag is set
    #[serde(default = "default_thinking_budget")]
    pub thinking_budget: u32,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

fn default_backend_host() -> String {
    "http://localhost:8787".to_string()
}

fn default_api_key_env() -> String {
    "POLYMODE_API_KEY".to_string()
}

fn default_fast_model() -> String {
    "aurora-flash".to_string()
}

fn default_capable_model() -> String {
    "aurora-pro".to_string()
}

fn default_image_model() -> String {
    "aurora-image".to_string()
}

fn default_video_model() -> String {
    "aurora-video".to_string()
}

fn default_speech_model() -> String {
    "aurora-speech".to_string()
}

fn default_thinking_budget() -> u32 {
    8192
}

fn default_request_timeout() -> u64 {
    120
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            host: default_backend_host(),
            api_key_env: default_api_key_env(),
            fast_model: default_fast_model(),
            capable_model: default_capable_model(),
            image_model: default_image_model(),
            video_model: default_video_model(),
            speech_model: default_speech_model(),
            thinking_budget: default_thinking_budget(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

/// Conversation storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the conversation database directory
    ///
    /// When unset, a platform data directory is used.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Directory where fetched video and synthesized audio files land
    ///
    /// When unset, a `media` directory next to the database is used.
    #[serde(default)]
    pub media_dir: Option<PathBuf>,
}

impl StorageConfig {
    /// Resolve the database directory, falling back to the platform data dir
    pub fn data_path(&self) -> PathBuf {
        if let Some(path) = &self.path {
            return path.clone();
        }
        directories::ProjectDirs::from("dev", "polymode", "polymode")
            .map(|dirs| dirs.data_dir().join("conversations.db"))
            .unwrap_or_else(|| PathBuf::from("polymode-conversations.db"))
    }

    /// Resolve the media directory, falling back to a sibling of the database
    pub fn media_path(&self) -> PathBuf {
        if let Some(dir) = &self.media_dir {
            return dir.clone();
        }
        self.data_path()
            .parent()
            .map(|p| p.join("media"))
            .unwrap_or_else(|| PathBuf::from("media"))
    }
}

/// Chat pathway configuration
///
/// Tuning knobs for the streaming, video, and bootstrap behavior of the
/// turn orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Maximum number of prior turns included in the chat history payload
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Interval between video operation polls, in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Maximum attempts for the long-running video pathway
    #[serde(default = "default_video_attempts")]
    pub video_attempts: u32,

    /// Greeting message placed in a user's first conversation
    #[serde(default = "default_greeting")]
    pub greeting: String,

    /// Title assigned to conversations before their first user turn
    #[serde(default = "default_title")]
    pub default_title: String,
}

fn default_history_limit() -> usize {
    32
}

fn default_poll_interval_ms() -> u64 {
    10_000
}

fn default_video_attempts() -> u32 {
    2
}

fn default_greeting() -> String {
    "Hello! How can I help you today?".to_string()
}

fn default_title() -> String {
    "New Chat".to_string()
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
            poll_interval_ms: default_poll_interval_ms(),
            video_attempts: default_video_attempts(),
            greeting: default_greeting(),
            default_title: default_title(),
        }
    }
}

/// Local user profile configuration
///
/// The identity collaborator resolves the session user from these fields;
/// only `uid` matters to the core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserConfig {
    /// Stable user identifier; defaults to "local" when unset
    #[serde(default)]
    pub uid: Option<String>,

    /// Display name
    #[serde(default)]
    pub name: Option<String>,

    /// Email address
    #[serde(default)]
    pub email: Option<String>,

    /// Avatar URL
    #[serde(default)]
    pub photo_url: Option<String>,
}

impl Config {
    /// Load configuration from a YAML file
    ///
    /// A missing file yields the default configuration; a present file is
    /// parsed with per-field defaults filling any gaps.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns `PolymodeError::Yaml` if the file exists but cannot be parsed.
    ///
    /// # Examples
    ///
    /// ```
    /// use polymode::config::Config;
    ///
    /// let config = Config::load("does-not-exist.yaml").unwrap();
    /// assert_eq!(config.chat.video_attempts, 2);
    /// ```
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(PolymodeError::Io)?;
        let config: Config = serde_yaml::from_str(&contents).map_err(PolymodeError::Yaml)?;
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns `PolymodeError::Configuration` if any field is out of range
    /// or the backend host is not a valid URL.
    pub fn validate(&self) -> Result<()> {
        if self.backend.host.is_empty() {
            return Err(PolymodeError::Configuration("backend host must not be empty".to_string()).into());
        }
        url::Url::parse(&self.backend.host).map_err(|e| {
            PolymodeError::Configuration(format!(
                "backend host is not a valid URL: {}: {}",
                self.backend.host, e
            ))
        })?;
        if self.chat.history_limit == 0 {
            return Err(
                PolymodeError::Configuration("history_limit must be greater than 0".to_string())
                    .into(),
            );
        }
        if self.chat.video_attempts == 0 {
            return Err(
                PolymodeError::Configuration("video_attempts must be greater than 0".to_string())
                    .into(),
            );
        }
        if self.chat.poll_interval_ms == 0 {
            return Err(
                PolymodeError::Configuration("poll_interval_ms must be greater than 0".to_string())
                    .into(),
            );
        }
        Ok(())
    }
}
