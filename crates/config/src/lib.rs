//! Configuration loading, validation, and management for Docent.
//!
//! Loads configuration from `docent.toml` in the working directory with
//! environment variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `docent.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model provider. Only `ollama` is supported.
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Replaces the built-in system prompt sent to the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Document and index storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Retrieval and indexing configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Ollama backend configuration
    #[serde(default)]
    pub ollama: OllamaConfig,
}

fn default_provider() -> String {
    "ollama".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the source documents served at `/data`
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Directory the generated index is persisted into
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,

    /// Public base URL of the file server used in citation links.
    /// Citations fall back to bare metadata when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fileserver_url_prefix: Option<String>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_storage_dir() -> PathBuf {
    PathBuf::from("storage")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            storage_dir: default_storage_dir(),
            fileserver_url_prefix: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// How many passages to retrieve per turn. 0 selects the engine default.
    #[serde(default)]
    pub top_k: u32,

    /// Chunk window size in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,

    /// Overlap between consecutive chunks in characters
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: u32,

    /// How long a loaded index stays fresh before it is re-read from disk
    #[serde(default = "default_index_ttl_secs")]
    pub index_ttl_secs: u64,
}

fn default_chunk_size() -> u32 {
    1024
}
fn default_chunk_overlap() -> u32 {
    20
}
fn default_index_ttl_secs() -> u64 {
    300
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 0,
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            index_ttl_secs: default_index_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Chat model name
    #[serde(default = "default_model")]
    pub model: String,

    /// Embedding model name
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://127.0.0.1:11434".into()
}
fn default_model() -> String {
    "llama3.1".into()
}
fn default_embedding_model() -> String {
    "nomic-embed-text".into()
}
fn default_request_timeout_secs() -> u64 {
    120
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            embedding_model: default_embedding_model(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `docent.toml` in the working directory,
    /// apply environment variable overrides, and validate the result.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(Path::new("docent.toml"))?;
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    ///
    /// A missing file is not an error; defaults are used instead.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError::ReadError {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                });
            }
        };

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Apply environment variable overrides on top of the file values.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from `lookup`, keyed by environment variable name.
    fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(provider) = lookup("MODEL_PROVIDER") {
            self.provider = provider;
        }
        if let Some(prompt) = lookup("SYSTEM_PROMPT") {
            self.system_prompt = Some(prompt);
        }
        if let Some(host) = lookup("APP_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("APP_PORT") {
            self.server.port = parse_env("APP_PORT", &port)?;
        }
        if let Some(dir) = lookup("DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("STORAGE_DIR") {
            self.storage.storage_dir = PathBuf::from(dir);
        }
        if let Some(prefix) = lookup("FILESERVER_URL_PREFIX") {
            self.storage.fileserver_url_prefix = if prefix.is_empty() {
                None
            } else {
                Some(prefix)
            };
        }
        if let Some(top_k) = lookup("TOP_K") {
            self.retrieval.top_k = parse_env("TOP_K", &top_k)?;
        }
        if let Some(size) = lookup("CHUNK_SIZE") {
            self.retrieval.chunk_size = parse_env("CHUNK_SIZE", &size)?;
        }
        if let Some(overlap) = lookup("CHUNK_OVERLAP") {
            self.retrieval.chunk_overlap = parse_env("CHUNK_OVERLAP", &overlap)?;
        }
        if let Some(ttl) = lookup("INDEX_TTL_SECS") {
            self.retrieval.index_ttl_secs = parse_env("INDEX_TTL_SECS", &ttl)?;
        }
        if let Some(url) = lookup("OLLAMA_BASE_URL") {
            self.ollama.base_url = url;
        }
        if let Some(model) = lookup("MODEL") {
            self.ollama.model = model;
        }
        if let Some(model) = lookup("EMBEDDING_MODEL") {
            self.ollama.embedding_model = model;
        }
        if let Some(timeout) = lookup("OLLAMA_REQUEST_TIMEOUT") {
            self.ollama.request_timeout_secs = parse_env("OLLAMA_REQUEST_TIMEOUT", &timeout)?;
        }
        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider != "ollama" {
            return Err(ConfigError::ValidationError(format!(
                "Invalid model provider: {}",
                self.provider
            )));
        }
        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "server.port must not be 0".into(),
            ));
        }
        if self.ollama.model.is_empty() {
            return Err(ConfigError::ValidationError(
                "ollama.model must not be empty".into(),
            ));
        }
        if self.ollama.embedding_model.is_empty() {
            return Err(ConfigError::ValidationError(
                "ollama.embedding_model must not be empty".into(),
            ));
        }
        if self.ollama.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "ollama.request_timeout_secs must be > 0".into(),
            ));
        }
        if self.retrieval.chunk_size == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.chunk_size must be > 0".into(),
            ));
        }
        if self.retrieval.chunk_overlap >= self.retrieval.chunk_size {
            return Err(ConfigError::ValidationError(
                "retrieval.chunk_overlap must be smaller than chunk_size".into(),
            ));
        }
        if self.retrieval.index_ttl_secs == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.index_ttl_secs must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// The address the HTTP server binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            system_prompt: None,
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            retrieval: RetrievalConfig::default(),
            ollama: OllamaConfig::default(),
        }
    }
}

fn parse_env<T>(name: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e| ConfigError::InvalidEnv {
        name: name.into(),
        reason: format!("{e}"),
    })
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Config file {path} is not valid TOML: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Invalid environment override {name}: {reason}")]
    InvalidEnv { name: String, reason: String },

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}
