//! `docent generate` — Build the vector index from the data directory.

use docent_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    println!("📚 Docent Generate");
    println!("   Data dir:    {}", config.storage.data_dir.display());
    println!("   Storage dir: {}", config.storage.storage_dir.display());
    println!("   Embedding:   {}", config.ollama.embedding_model);
    println!();

    let stats = docent_engine::build_index(&config).await?;

    println!(
        "  ✅ Indexed {} chunks from {} documents",
        stats.chunks, stats.documents
    );
    println!("     Run `docent serve` to start answering questions.");

    Ok(())
}
