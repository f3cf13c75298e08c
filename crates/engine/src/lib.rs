//! # Docent Engine
//!
//! The retrieval-augmented generation engine behind the chat endpoints:
//! - [`OllamaClient`] — chat completions and embeddings over Ollama's
//!   OpenAI-compatible API
//! - [`VectorIndex`] / [`IndexHandle`] — the persisted index and its
//!   TTL-cached runtime handle
//! - [`ChatEngine`] — condense-plus-context orchestration implementing
//!   [`docent_core::GenerationEngine`]
//! - [`build_index`] — the `docent generate` pipeline

pub mod builder;
pub mod chat_engine;
pub mod index;
pub mod loader;
pub mod ollama;

pub use builder::{IndexStats, build_index};
pub use chat_engine::ChatEngine;
pub use index::{IndexHandle, IndexedChunk, VectorIndex, cosine_similarity};
pub use loader::{Document, chunk_text, load_documents};
pub use ollama::OllamaClient;
