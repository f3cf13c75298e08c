//! The persisted vector index and its shared runtime handle.
//!
//! `docent generate` writes the index as a single JSON file under the storage
//! directory; the server reads it through an [`IndexHandle`] that caches the
//! parsed index for a configurable TTL so edits on disk are picked up without
//! a restart.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use docent_core::error::IndexError;
use docent_core::node::SourceNode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tracing::{debug, info};

/// One embedded chunk of a source document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedChunk {
    pub id: String,

    /// Stable id of the document this chunk came from.
    pub document_id: String,

    pub text: String,

    pub embedding: Vec<f32>,

    /// Source-document metadata carried into citations.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// The persisted vector index: every chunk of every document plus build info.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorIndex {
    pub chunks: Vec<IndexedChunk>,

    /// Embedding model the chunks were embedded with.
    pub embedding_model: String,

    pub created_at: DateTime<Utc>,
}

impl VectorIndex {
    /// Create an empty index for the given embedding model.
    pub fn new(embedding_model: impl Into<String>) -> Self {
        Self {
            chunks: Vec::new(),
            embedding_model: embedding_model.into(),
            created_at: Utc::now(),
        }
    }

    /// Path of the index file inside a storage directory.
    pub fn index_path(storage_dir: &Path) -> PathBuf {
        storage_dir.join("index.json")
    }

    /// Load the index from a storage directory.
    ///
    /// A missing directory or index file is not an error: it means the index
    /// has not been generated yet, reported as `None`.
    pub fn load(storage_dir: &Path) -> Result<Option<Self>, IndexError> {
        let path = Self::index_path(storage_dir);
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path).map_err(|e| {
            IndexError::Storage(format!("Failed to read {}: {e}", path.display()))
        })?;
        let index: Self = serde_json::from_str(&content)
            .map_err(|e| IndexError::Malformed(format!("{}: {e}", path.display())))?;

        debug!(chunks = index.chunks.len(), path = %path.display(), "Index loaded");
        Ok(Some(index))
    }

    /// Persist the index into a storage directory, creating it if needed.
    pub fn persist(&self, storage_dir: &Path) -> Result<(), IndexError> {
        std::fs::create_dir_all(storage_dir).map_err(|e| {
            IndexError::Storage(format!("Failed to create storage directory: {e}"))
        })?;

        let path = Self::index_path(storage_dir);
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| IndexError::Storage(format!("Failed to encode index: {e}")))?;
        std::fs::write(&path, content).map_err(|e| {
            IndexError::Storage(format!("Failed to write {}: {e}", path.display()))
        })?;

        info!(chunks = self.chunks.len(), path = %path.display(), "Index persisted");
        Ok(())
    }

    /// The `top_k` chunks most similar to the query embedding, as source
    /// nodes sorted by descending score.
    ///
    /// A non-empty `document_ids` list restricts the search to chunks of
    /// those documents.
    pub fn retrieve(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        document_ids: &[String],
    ) -> Vec<SourceNode> {
        let mut scored: Vec<(f32, &IndexedChunk)> = self
            .chunks
            .iter()
            .filter(|chunk| {
                document_ids.is_empty() || document_ids.contains(&chunk.document_id)
            })
            .map(|chunk| (cosine_similarity(query_embedding, &chunk.embedding), chunk))
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);

        scored
            .into_iter()
            .map(|(score, chunk)| SourceNode {
                id: chunk.id.clone(),
                metadata: chunk.metadata.clone(),
                score: Some(score),
                text: chunk.text.clone(),
            })
            .collect()
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 for mismatched lengths or zero-magnitude vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    // Accumulate in f64; f32 sums drift noticeably at embedding dimensions.
    let (dot, mag_a, mag_b) = a.iter().zip(b).fold(
        (0.0f64, 0.0f64, 0.0f64),
        |(dot, mag_a, mag_b), (&x, &y)| {
            let (x, y) = (x as f64, y as f64);
            (dot + x * y, mag_a + x * x, mag_b + y * y)
        },
    );

    let denom = mag_a.sqrt() * mag_b.sqrt();
    if denom < 1e-10 {
        0.0
    } else {
        (dot / denom) as f32
    }
}

/// Shared handle to the on-disk index with reload-on-expiry.
///
/// The parsed index is cached for `ttl`. Once stale, the next caller re-reads
/// it from disk; the lock guarantees a single refresh in flight while other
/// callers wait for its result.
pub struct IndexHandle {
    storage_dir: PathBuf,
    ttl: Duration,
    cached: Mutex<Option<CachedIndex>>,
}

struct CachedIndex {
    index: Arc<VectorIndex>,
    loaded_at: Instant,
}

impl IndexHandle {
    pub fn new(storage_dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            ttl,
            cached: Mutex::new(None),
        }
    }

    /// The current index, reloading from disk when the cached copy expired.
    ///
    /// `None` means the index has not been generated yet.
    pub async fn current(&self) -> Result<Option<Arc<VectorIndex>>, IndexError> {
        let mut cached = self.cached.lock().await;

        if let Some(entry) = cached.as_ref() {
            if entry.loaded_at.elapsed() < self.ttl {
                return Ok(Some(entry.index.clone()));
            }
        }

        match VectorIndex::load(&self.storage_dir)? {
            Some(index) => {
                let index = Arc::new(index);
                *cached = Some(CachedIndex {
                    index: index.clone(),
                    loaded_at: Instant::now(),
                });
                Ok(Some(index))
            }
            None => {
                *cached = None;
                Ok(None)
            }
        }
    }
}
