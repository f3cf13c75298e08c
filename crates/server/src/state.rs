//! Shared state handed to every request handler.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use docent_config::AppConfig;
use docent_core::GenerationEngine;

/// Per-process state. The engine and both path/prefix fields are read-only
/// after construction, so many request tasks can share one instance.
pub struct AppState {
    pub engine: Arc<dyn GenerationEngine>,

    /// Canonical data directory, absolutized once so citation links stay
    /// stable regardless of the process working directory.
    pub data_dir: PathBuf,

    /// Public base URL of the file server, when one is configured.
    pub url_prefix: Option<String>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(engine: Arc<dyn GenerationEngine>, config: &AppConfig) -> Self {
        let data_dir = std::path::absolute(&config.storage.data_dir)
            .unwrap_or_else(|_| config.storage.data_dir.clone());
        Self {
            engine,
            data_dir,
            url_prefix: config.storage.fileserver_url_prefix.clone(),
        }
    }
}

/// JSON body for error responses.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
