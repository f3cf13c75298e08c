//! The generation engine abstraction consumed by the HTTP layer.
//!
//! Implementations retrieve context, call the model backend, and hand back
//! tokens plus the source nodes the answer is grounded on. The HTTP layer
//! never sees how either happens.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::EngineError;
use crate::message::ChatMessage;
use crate::node::SourceNode;

/// A streaming reply: retrieval metadata up front, tokens as they arrive.
#[derive(Debug)]
pub struct StreamingChatResponse {
    /// Incremental fragments of the generated answer. The channel closes when
    /// generation completes; an `Err` item aborts the turn.
    pub tokens: mpsc::Receiver<Result<String, EngineError>>,

    /// The retrieved passages the answer is grounded on.
    pub source_nodes: Vec<SourceNode>,
}

/// A fully materialized reply.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub source_nodes: Vec<SourceNode>,
}

/// Produces answers for conversation turns, grounded on retrieved context.
///
/// Implementations are shared read-only across concurrent request tasks.
#[async_trait]
pub trait GenerationEngine: Send + Sync {
    /// Stream an answer token by token.
    async fn stream_chat(
        &self,
        message: String,
        history: Vec<ChatMessage>,
        document_ids: Vec<String>,
    ) -> Result<StreamingChatResponse, EngineError>;

    /// Produce the full answer in one call.
    async fn chat(
        &self,
        message: String,
        history: Vec<ChatMessage>,
        document_ids: Vec<String>,
    ) -> Result<ChatResponse, EngineError>;
}
