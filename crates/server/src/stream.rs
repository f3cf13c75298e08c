//! Frame multiplexer for streaming chat responses.
//!
//! Drives the engine's token channel to completion, framing each token as a
//! `0:` line, then appends exactly one `8:` sources line. Frames cross a
//! bounded channel into the response body; a failed send means the client
//! hung up, and the task stops without pulling anything further from the
//! engine. A truncated stream (no trailing sources frame) is the failure
//! signal for mid-generation errors.

use std::convert::Infallible;
use std::path::{Path, PathBuf};

use axum::body::Body;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error};

use docent_core::{Citation, Frame, SourceNode, StreamingChatResponse};

/// Resolve every source node's public URL against the data directory.
pub(crate) fn resolve_citations(
    nodes: Vec<SourceNode>,
    data_dir: &Path,
    url_prefix: Option<&str>,
) -> Vec<Citation> {
    nodes
        .into_iter()
        .map(|node| Citation::from_node(node, data_dir, url_prefix))
        .collect()
}

/// Turn a streaming engine reply into a framed response body.
///
/// The disconnect check happens once per frame: every frame is forwarded
/// through a capacity-1 channel, so a dropped body surfaces as a send error
/// on the very next frame and no further tokens are consumed.
pub fn stream_response(
    response: StreamingChatResponse,
    data_dir: PathBuf,
    url_prefix: Option<String>,
) -> Body {
    let StreamingChatResponse {
        mut tokens,
        source_nodes,
    } = response;

    let (tx, rx) = mpsc::channel::<String>(1);
    tokio::spawn(async move {
        // One synthetic empty text frame precedes the first real frame so
        // the client observes liveness immediately.
        let mut started = false;
        let mut full_response = String::new();

        while let Some(item) = tokens.recv().await {
            let token = match item {
                Ok(token) => token,
                Err(e) => {
                    error!(error = %e, "token stream failed, truncating response");
                    return;
                }
            };
            if !started {
                started = true;
                if tx.send(Frame::Text(String::new()).encode()).await.is_err() {
                    debug!("client disconnected before first token");
                    return;
                }
            }
            full_response.push_str(&token);
            if tx.send(Frame::Text(token).encode()).await.is_err() {
                debug!("client disconnected, dropping remaining tokens");
                return;
            }
        }

        if !started && tx.send(Frame::Text(String::new()).encode()).await.is_err() {
            return;
        }

        debug!(response_chars = full_response.len(), "token stream complete");

        let citations = resolve_citations(source_nodes, &data_dir, url_prefix.as_deref());
        let _ = tx.send(Frame::sources(&citations).encode()).await;
    });

    Body::from_stream(ReceiverStream::new(rx).map(Ok::<_, Infallible>))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use serde_json::json;

    fn node(id: &str, metadata: serde_json::Value) -> SourceNode {
        SourceNode {
            id: id.to_string(),
            metadata: metadata.as_object().cloned().unwrap_or_default(),
            score: Some(0.5),
            text: "passage".to_string(),
        }
    }

    fn streaming(
        items: Vec<Result<String, docent_core::EngineError>>,
        source_nodes: Vec<SourceNode>,
    ) -> StreamingChatResponse {
        let (tx, rx) = mpsc::channel(items.len().max(1));
        for item in items {
            tx.try_send(item).unwrap();
        }
        drop(tx);
        StreamingChatResponse {
            tokens: rx,
            source_nodes,
        }
    }

    #[tokio::test]
    async fn empty_token_stream_still_emits_liveness_and_sources() {
        let body = stream_response(streaming(vec![], vec![]), PathBuf::from("/data"), None);
        let bytes = body.collect().await.unwrap().to_bytes();
        assert_eq!(
            &bytes[..],
            b"0:\"\"\n8:[{\"type\":\"sources\",\"data\":{\"nodes\":[]}}]\n"
        );
    }

    #[tokio::test]
    async fn tokens_are_framed_in_order_with_sources_last() {
        let items = vec![Ok("Hel".to_string()), Ok("lo".to_string())];
        let body = stream_response(streaming(items, vec![]), PathBuf::from("/data"), None);
        let bytes = body.collect().await.unwrap().to_bytes();
        assert_eq!(
            &bytes[..],
            b"0:\"\"\n0:\"Hel\"\n0:\"lo\"\n8:[{\"type\":\"sources\",\"data\":{\"nodes\":[]}}]\n"
        );
    }

    #[tokio::test]
    async fn mid_stream_error_truncates_without_sources_frame() {
        let items = vec![
            Ok("Hel".to_string()),
            Err(docent_core::EngineError::StreamInterrupted(
                "connection reset".to_string(),
            )),
        ];
        let body = stream_response(streaming(items, vec![]), PathBuf::from("/data"), None);
        let text = String::from_utf8(body.collect().await.unwrap().to_bytes().to_vec()).unwrap();
        assert_eq!(text, "0:\"\"\n0:\"Hel\"\n");
        assert!(!text.contains("8:"));
    }

    #[tokio::test]
    async fn sources_frame_carries_resolved_urls() {
        let nodes = vec![node(
            "n1",
            json!({"file_name": "report.pdf", "private": "true"}),
        )];
        let body = stream_response(
            streaming(vec![Ok("ok".to_string())], nodes),
            PathBuf::from("/data"),
            Some("http://files.example".to_string()),
        );
        let text = String::from_utf8(body.collect().await.unwrap().to_bytes().to_vec()).unwrap();
        let sources_line = text.lines().last().unwrap();
        assert!(sources_line.starts_with("8:["));
        assert!(sources_line.contains("http://files.example/output/uploaded/report.pdf"));
    }
}
