//! `docent chat` — Terminal client for a running server.

use std::io::Write;

use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use docent_config::AppConfig;
use docent_core::{ChatMessage, ConversationRequest, Frame};

pub async fn run(message: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let url = chat_url(&config.server.host, config.server.port);
    let client = reqwest::Client::new();

    if let Some(msg) = message {
        // Single message mode
        let mut history = Vec::new();
        send_turn(&client, &url, &mut history, msg).await?;
        return Ok(());
    }

    // Interactive mode
    println!();
    println!("  📚 Docent — Interactive Chat");
    println!();
    println!("  Server:  {url}");
    println!("  Type your question and press Enter.");
    println!("  Type 'exit' or 'quit' to leave.");
    println!();

    let mut history: Vec<ChatMessage> = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question == "exit" || question == "quit" {
            break;
        }

        if let Err(e) = send_turn(&client, &url, &mut history, question.to_string()).await {
            eprintln!("  [Error] {e}");
        }
    }

    println!();
    println!("  Goodbye! 👋");
    println!();

    Ok(())
}

/// The streaming endpoint of the configured server. A wildcard bind address
/// is not connectable, so it maps to loopback.
fn chat_url(host: &str, port: u16) -> String {
    let host = if host == "0.0.0.0" { "127.0.0.1" } else { host };
    format!("http://{host}:{port}/api/chat")
}

/// Send one user turn and print the streamed reply. Both sides of the
/// exchange are appended to the rolling history.
async fn send_turn(
    client: &reqwest::Client,
    url: &str,
    history: &mut Vec<ChatMessage>,
    question: String,
) -> Result<(), Box<dyn std::error::Error>> {
    history.push(ChatMessage::user(question));
    let request = ConversationRequest {
        messages: history.clone(),
        data: None,
    };

    let response = client.post(url).json(&request).send().await?;
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        history.pop();
        return Err(format!("server returned {status}: {body}").into());
    }

    print!("  Docent > ");
    std::io::stdout().flush()?;

    let mut answer = String::new();
    let mut sources: Vec<String> = Vec::new();
    let mut buffer: Vec<u8> = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        buffer.extend_from_slice(&chunk);
        for frame in drain_frames(&mut buffer) {
            match frame {
                Frame::Text(token) => {
                    answer.push_str(&token);
                    print!("{token}");
                    std::io::stdout().flush()?;
                }
                Frame::Data(payload) => {
                    if let Some(names) = source_names(&payload) {
                        sources = names;
                    }
                }
            }
        }
    }
    println!();
    if !sources.is_empty() {
        println!("  [sources: {}]", sources.join(", "));
    }
    println!();

    history.push(ChatMessage::assistant(answer));
    Ok(())
}

/// Decode every complete line buffered so far, keeping any partial line for
/// the next chunk. Buffering raw bytes keeps a multi-byte character that
/// arrives in two chunks intact.
fn drain_frames(buffer: &mut Vec<u8>) -> Vec<Frame> {
    let mut frames = Vec::new();
    while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
        let line: Vec<u8> = buffer.drain(..=pos).collect();
        let line = String::from_utf8_lossy(&line);
        match Frame::decode(&line) {
            Some(frame) => frames.push(frame),
            None => debug!(line = %line.trim_end(), "Skipping undecodable frame line"),
        }
    }
    frames
}

/// File names carried in a decoded sources frame, deduplicated in order.
fn source_names(payload: &serde_json::Value) -> Option<Vec<String>> {
    let nodes = payload.get("data")?.get("nodes")?.as_array()?;
    let mut names: Vec<String> = Vec::new();
    for node in nodes {
        if let Some(name) = node
            .get("metadata")
            .and_then(|m| m.get("file_name"))
            .and_then(|n| n.as_str())
        {
            if !names.iter().any(|seen| seen == name) {
                names.push(name.to_string());
            }
        }
    }
    if names.is_empty() { None } else { Some(names) }
}
