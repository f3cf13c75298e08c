//! The condense-plus-context chat engine.
//!
//! Each turn:
//! 1. Rewrite the follow-up question into a standalone one (when there is
//!    history) so retrieval is not confused by pronouns.
//! 2. Embed the question and retrieve the most similar chunks, optionally
//!    scoped to the conversation's document ids.
//! 3. Answer with the retrieved chunks folded into the system prompt.

use async_trait::async_trait;
use docent_config::AppConfig;
use docent_core::engine::{ChatResponse, GenerationEngine, StreamingChatResponse};
use docent_core::error::EngineError;
use docent_core::message::{ChatMessage, Role};
use docent_core::node::SourceNode;
use tokio::time::Duration;
use tracing::debug;

use crate::index::IndexHandle;
use crate::ollama::OllamaClient;

const DEFAULT_TOP_K: usize = 2;

const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful assistant that answers questions about the indexed documents.";

const CONDENSE_PROMPT: &str = "Given the following conversation and a follow up question, \
rephrase the follow up question to be a standalone question that carries all relevant context.\n\n\
Chat history:\n{chat_history}\n\nFollow up question: {question}\n\nStandalone question:";

const CONTEXT_PROMPT: &str = "Here are the relevant documents for the context:\n\n{context_str}\n\n\
Instruction: Answer the user question using the documents above. \
If the answer is not in the documents, say that you don't know.";

/// Retrieval-augmented engine backed by one Ollama instance and the on-disk
/// vector index.
pub struct ChatEngine {
    client: OllamaClient,
    index: IndexHandle,
    top_k: usize,
    system_prompt: Option<String>,
}

impl ChatEngine {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: OllamaClient::new(&config.ollama),
            index: IndexHandle::new(
                config.storage.storage_dir.clone(),
                Duration::from_secs(config.retrieval.index_ttl_secs),
            ),
            top_k: effective_top_k(config.retrieval.top_k),
            system_prompt: config.system_prompt.clone(),
        }
    }

    /// Retrieval and prompt assembly shared by both chat modes.
    async fn prepare(
        &self,
        message: &str,
        history: &[ChatMessage],
        document_ids: &[String],
    ) -> Result<(Vec<ChatMessage>, Vec<SourceNode>), EngineError> {
        let index = self
            .index
            .current()
            .await?
            .ok_or(EngineError::IndexNotBuilt)?;

        let question = if history.is_empty() {
            message.to_string()
        } else {
            self.condense(history, message).await?
        };

        let embeddings = self.client.embed(std::slice::from_ref(&question)).await?;
        let query_embedding = embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EngineError::Parse("no embedding returned for query".into()))?;

        let nodes = index.retrieve(&query_embedding, self.top_k, document_ids);
        debug!(retrieved = nodes.len(), question = %question, "Context retrieved");

        let mut messages = vec![ChatMessage::system(self.context_system_prompt(&nodes))];
        messages.extend_from_slice(history);
        messages.push(ChatMessage::user(message));

        Ok((messages, nodes))
    }

    /// Rewrite a follow-up question into a standalone one using the history.
    async fn condense(
        &self,
        history: &[ChatMessage],
        question: &str,
    ) -> Result<String, EngineError> {
        let prompt = condense_prompt(history, question);
        let condensed = self.client.chat(&[ChatMessage::user(prompt)]).await?;
        let condensed = condensed.trim();
        // Some models answer with nothing; retrieval then falls back to the
        // raw question.
        if condensed.is_empty() {
            Ok(question.to_string())
        } else {
            Ok(condensed.to_string())
        }
    }

    fn context_system_prompt(&self, nodes: &[SourceNode]) -> String {
        let context: Vec<&str> = nodes.iter().map(|n| n.text.as_str()).collect();
        let base = self
            .system_prompt
            .as_deref()
            .unwrap_or(DEFAULT_SYSTEM_PROMPT);
        format!(
            "{base}\n\n{}",
            CONTEXT_PROMPT.replace("{context_str}", &context.join("\n\n"))
        )
    }
}

#[async_trait]
impl GenerationEngine for ChatEngine {
    async fn stream_chat(
        &self,
        message: String,
        history: Vec<ChatMessage>,
        document_ids: Vec<String>,
    ) -> Result<StreamingChatResponse, EngineError> {
        let (messages, source_nodes) = self.prepare(&message, &history, &document_ids).await?;
        let tokens = self.client.stream_chat(&messages).await?;
        Ok(StreamingChatResponse {
            tokens,
            source_nodes,
        })
    }

    async fn chat(
        &self,
        message: String,
        history: Vec<ChatMessage>,
        document_ids: Vec<String>,
    ) -> Result<ChatResponse, EngineError> {
        let (messages, source_nodes) = self.prepare(&message, &history, &document_ids).await?;
        let content = self.client.chat(&messages).await?;
        Ok(ChatResponse {
            content,
            source_nodes,
        })
    }
}

fn effective_top_k(configured: u32) -> usize {
    if configured == 0 {
        DEFAULT_TOP_K
    } else {
        configured as usize
    }
}

fn condense_prompt(history: &[ChatMessage], question: &str) -> String {
    let transcript: Vec<String> = history
        .iter()
        .map(|m| format!("{}: {}", role_label(m.role), m.content))
        .collect();
    CONDENSE_PROMPT
        .replace("{chat_history}", &transcript.join("\n"))
        .replace("{question}", question)
}

fn role_label(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::System => "system",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn node(text: &str) -> SourceNode {
        SourceNode {
            id: "n".into(),
            metadata: Map::new(),
            score: Some(1.0),
            text: text.into(),
        }
    }

    #[test]
    fn zero_top_k_selects_the_default() {
        assert_eq!(effective_top_k(0), 2);
        assert_eq!(effective_top_k(5), 5);
    }

    #[test]
    fn condense_prompt_includes_history_and_question() {
        let history = vec![
            ChatMessage::user("What is the capital of France?"),
            ChatMessage::assistant("Paris."),
        ];
        let prompt = condense_prompt(&history, "How many people live there?");
        assert!(prompt.contains("user: What is the capital of France?"));
        assert!(prompt.contains("assistant: Paris."));
        assert!(prompt.contains("Follow up question: How many people live there?"));
    }

    #[test]
    fn context_prompt_contains_retrieved_passages() {
        let engine = ChatEngine::new(&AppConfig::default());
        let prompt = engine.context_system_prompt(&[node("first passage"), node("second passage")]);
        assert!(prompt.starts_with(DEFAULT_SYSTEM_PROMPT));
        assert!(prompt.contains("first passage\n\nsecond passage"));
    }

    #[test]
    fn configured_system_prompt_replaces_the_default() {
        let config = AppConfig {
            system_prompt: Some("Answer like a pirate.".into()),
            ..AppConfig::default()
        };
        let engine = ChatEngine::new(&config);
        let prompt = engine.context_system_prompt(&[]);
        assert!(prompt.starts_with("Answer like a pirate."));
        assert!(!prompt.contains(DEFAULT_SYSTEM_PROMPT));
    }
}
