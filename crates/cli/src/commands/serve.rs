//! `docent serve` — Start the chat API server.

use std::sync::Arc;

use docent_config::AppConfig;
use docent_engine::ChatEngine;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.server.port = port;
    }

    println!("📚 Docent Server");
    println!("   Listening: {}:{}", config.server.host, config.server.port);
    println!(
        "   Model:     {} via {}",
        config.ollama.model, config.provider
    );
    println!("   Embedding: {}", config.ollama.embedding_model);
    println!("   Data dir:  {}", config.storage.data_dir.display());

    let engine = Arc::new(ChatEngine::new(&config));
    docent_server::start(&config, engine).await?;

    Ok(())
}
