//! Ollama client over its OpenAI-compatible API.
//!
//! Talks to `<base_url>/v1` for chat completions (whole-response and
//! streaming SSE) and for embeddings.

use docent_core::error::EngineError;
use docent_core::message::{ChatMessage, Role};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

/// A client for one Ollama instance.
///
/// Ollama exposes an OpenAI-compatible `/v1/chat/completions` and
/// `/v1/embeddings` surface, which is what this client speaks.
pub struct OllamaClient {
    base_url: String,
    model: String,
    embedding_model: String,
    client: reqwest::Client,
}

impl OllamaClient {
    /// Create a client from the Ollama section of the configuration.
    pub fn new(config: &docent_config::OllamaConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: format!("{}/v1", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            embedding_model: config.embedding_model.clone(),
            client,
        }
    }

    /// Convert our message types to the OpenAI API format.
    fn to_api_messages(messages: &[ChatMessage]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                    Role::System => "system",
                };
                ApiMessage {
                    role: role.into(),
                    content: m.content.clone(),
                }
            })
            .collect()
    }

    /// Request a full completion in one call.
    pub async fn chat(&self, messages: &[ChatMessage]) -> Result<String, EngineError> {
        let url = format!("{}/chat/completions", self.base_url);

        let body = serde_json::json!({
            "model": self.model,
            "messages": Self::to_api_messages(messages),
            "stream": false,
        });

        debug!(model = %self.model, count = messages.len(), "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Model backend returned error");
            return Err(EngineError::Api {
                status_code: status,
                message: error_body,
            });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| EngineError::Parse(e.to_string()))?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| EngineError::Parse("no choices in response".into()))?;

        Ok(choice.message.content.unwrap_or_default())
    }

    /// Request a streaming completion.
    ///
    /// Returns a channel of content deltas. The channel closes when the
    /// backend signals completion; dropping the receiver stops the reader.
    pub async fn stream_chat(
        &self,
        messages: &[ChatMessage],
    ) -> Result<tokio::sync::mpsc::Receiver<Result<String, EngineError>>, EngineError> {
        let url = format!("{}/chat/completions", self.base_url);

        let body = serde_json::json!({
            "model": self.model,
            "messages": Self::to_api_messages(messages),
            "stream": true,
        });

        debug!(model = %self.model, count = messages.len(), "Sending streaming request");

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Model backend streaming error");
            return Err(EngineError::Api {
                status_code: status,
                message: error_body,
            });
        }

        let (tx, rx) = tokio::sync::mpsc::channel(64);

        // Reader task: decodes SSE lines off the response body until the
        // backend signals completion or the receiver goes away.
        tokio::spawn(async move {
            let mut body = response.bytes_stream();
            let mut pending: Vec<u8> = Vec::new();

            while let Some(next) = body.next().await {
                let bytes = match next {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        let _ = tx
                            .send(Err(EngineError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                pending.extend_from_slice(&bytes);

                for line in drain_lines(&mut pending) {
                    // SSE keepalive comments start with ':'
                    if line.is_empty() || line.starts_with(':') {
                        continue;
                    }

                    if let Some(data) = line.strip_prefix("data: ") {
                        let data = data.trim();

                        if data == "[DONE]" {
                            return;
                        }

                        match serde_json::from_str::<StreamResponse>(data) {
                            Ok(chunk) => {
                                let delta = chunk
                                    .choices
                                    .first()
                                    .and_then(|c| c.delta.content.as_deref())
                                    .unwrap_or("");
                                if !delta.is_empty()
                                    && tx.send(Ok(delta.to_string())).await.is_err()
                                {
                                    // Nobody is listening anymore.
                                    return;
                                }
                            }
                            Err(e) => {
                                trace!(data = %data, error = %e, "Ignoring unparseable SSE chunk");
                            }
                        }
                    }
                }
            }
        });

        Ok(rx)
    }

    /// Embed a batch of texts, one vector per input, in input order.
    pub async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, EngineError> {
        let url = format!("{}/embeddings", self.base_url);

        let body = serde_json::json!({
            "model": self.embedding_model,
            "input": inputs,
            "encoding_format": "float",
        });

        debug!(model = %self.embedding_model, count = inputs.len(), "Sending embedding request");

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Embedding request failed");
            return Err(EngineError::Api {
                status_code: status,
                message: error_body,
            });
        }

        let api_response: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| EngineError::Parse(e.to_string()))?;

        if api_response.data.len() != inputs.len() {
            return Err(EngineError::Parse(format!(
                "embedding count mismatch: sent {}, received {}",
                inputs.len(),
                api_response.data.len()
            )));
        }

        Ok(api_response.data.into_iter().map(|d| d.embedding).collect())
    }
}

/// Every complete line in `pending`, decoded; bytes after the last newline
/// stay buffered. Splitting happens before UTF-8 decoding, so a multi-byte
/// character arriving in two network chunks decodes whole.
fn drain_lines(pending: &mut Vec<u8>) -> Vec<String> {
    let mut lines = Vec::new();
    while let Some(pos) = pending.iter().position(|&b| b == b'\n') {
        let line: Vec<u8> = pending.drain(..=pos).collect();
        lines.push(String::from_utf8_lossy(&line).trim_end().to_string());
    }
    lines
}

// --- Chat completion wire types ---

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

// --- Streaming wire types ---

/// One decoded `data:` payload from a streaming completion.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

// --- Embedding wire types ---

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingRow {
    embedding: Vec<f32>,
}
