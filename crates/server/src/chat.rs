//! Conversation endpoints.

use axum::Json;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::{debug, error, info};

use docent_core::{ChatMessage, Citation, ConversationRequest, EngineError, RequestError};

use crate::state::{ErrorResponse, SharedState};
use crate::stream;

/// Reply of the non-streaming endpoint.
#[derive(Debug, Serialize)]
pub struct ChatResult {
    pub result: ChatMessage,
    pub nodes: Vec<Citation>,
}

/// `POST /api/chat` — stream the reply as wire frames, sources last.
pub async fn chat_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ConversationRequest>,
) -> Result<Response, (StatusCode, Json<ErrorResponse>)> {
    info!(turns = payload.messages.len(), "streaming chat request");
    let (message, history, document_ids) = prepare(&payload)?;

    let response = state
        .engine
        .stream_chat(message, history, document_ids)
        .await
        .map_err(engine_failure)?;

    let body = stream::stream_response(response, state.data_dir.clone(), state.url_prefix.clone());
    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response())
}

/// `POST /api/chat/request` — the full reply in one JSON document.
pub async fn chat_request_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ConversationRequest>,
) -> Result<Json<ChatResult>, (StatusCode, Json<ErrorResponse>)> {
    info!(turns = payload.messages.len(), "chat request");
    let (message, history, document_ids) = prepare(&payload)?;

    let response = state
        .engine
        .chat(message, history, document_ids)
        .await
        .map_err(engine_failure)?;

    let nodes = stream::resolve_citations(
        response.source_nodes,
        &state.data_dir,
        state.url_prefix.as_deref(),
    );
    Ok(Json(ChatResult {
        result: ChatMessage::assistant(response.content),
        nodes,
    }))
}

/// Validate the conversation and derive what the engine needs from it.
fn prepare(
    payload: &ConversationRequest,
) -> Result<(String, Vec<ChatMessage>, Vec<String>), (StatusCode, Json<ErrorResponse>)> {
    payload.validate().map_err(bad_request)?;
    let message = payload.prompt_text().map_err(bad_request)?;
    debug!(prompt_chars = message.len(), "conversation prepared");
    Ok((message, payload.history(), payload.document_ids()))
}

fn bad_request(err: RequestError) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

fn engine_failure(err: EngineError) -> (StatusCode, Json<ErrorResponse>) {
    error!(error = %err, "chat engine failed");
    // The missing-index message is an operator instruction and goes out as is.
    let error = match &err {
        EngineError::IndexNotBuilt => err.to_string(),
        _ => format!("Error in chat engine: {err}"),
    };
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse { error }),
    )
}
