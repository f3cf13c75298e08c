//! Index generation pipeline: load, chunk, embed, persist.
//!
//! This is what `docent generate` runs. It rebuilds the index from scratch
//! on every invocation; the server picks the new file up when its handle's
//! TTL expires.

use docent_config::AppConfig;
use docent_core::Result;
use tracing::{debug, info};
use uuid::Uuid;

use crate::index::{IndexedChunk, VectorIndex};
use crate::loader::{chunk_text, load_documents};
use crate::ollama::OllamaClient;

/// Summary of a completed index build.
#[derive(Debug, Clone, Copy)]
pub struct IndexStats {
    pub documents: usize,
    pub chunks: usize,
}

/// Build the vector index for the configured data directory and persist it
/// into the configured storage directory.
pub async fn build_index(config: &AppConfig) -> Result<IndexStats> {
    let documents = load_documents(&config.storage.data_dir)?;
    let client = OllamaClient::new(&config.ollama);
    let mut index = VectorIndex::new(&config.ollama.embedding_model);

    for document in &documents {
        let chunks = chunk_text(
            &document.text,
            config.retrieval.chunk_size as usize,
            config.retrieval.chunk_overlap as usize,
        );
        if chunks.is_empty() {
            continue;
        }

        let embeddings = client.embed(&chunks).await?;
        for (text, embedding) in chunks.into_iter().zip(embeddings) {
            index.chunks.push(IndexedChunk {
                id: Uuid::new_v4().to_string(),
                document_id: document.id.clone(),
                text,
                embedding,
                metadata: document.metadata.clone(),
            });
        }
        debug!(document = %document.id, "Document embedded");
    }

    index.persist(&config.storage.storage_dir)?;
    info!(
        documents = documents.len(),
        chunks = index.chunks.len(),
        "Index generation complete"
    );

    Ok(IndexStats {
        documents: documents.len(),
        chunks: index.chunks.len(),
    })
}
