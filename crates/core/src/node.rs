//! Retrieved source nodes and citation URL resolution.
//!
//! The generation engine returns [`SourceNode`]s describing the passages an
//! answer is grounded on. Before they reach the client each node is turned
//! into a [`Citation`] carrying a public-facing URL derived from the node's
//! metadata and the file server configuration.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// A retrieved passage backing a generated answer, as produced by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceNode {
    pub id: String,

    /// Source-document metadata: file names, paths, origin flags.
    #[serde(default)]
    pub metadata: Map<String, Value>,

    pub score: Option<f32>,

    pub text: String,
}

/// A [`SourceNode`] with its public URL resolved, ready for serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    pub id: String,
    pub metadata: Map<String, Value>,
    pub score: Option<f32>,
    pub text: String,
    pub url: Option<String>,
}

impl Citation {
    /// Resolve the node's public URL and attach it.
    pub fn from_node(node: SourceNode, data_dir: &Path, url_prefix: Option<&str>) -> Self {
        let url = resolve_url(&node.metadata, data_dir, url_prefix);
        Self {
            id: node.id,
            metadata: node.metadata,
            score: node.score,
            text: node.text,
            url,
        }
    }
}

/// Map a source node's metadata to a public-facing URL.
///
/// Precedence, first matching rule wins:
/// 1. no file server configured: fall back to the `URL` metadata field
/// 2. no `file_name`: same fallback
/// 3. `pipeline_id` present: the file lives in a managed external index
/// 4. `private == "true"`: the file was uploaded by the client
/// 5. otherwise: the file came from the data directory, link relative to it
///
/// Pure function over its inputs; never touches the filesystem.
pub fn resolve_url(
    metadata: &Map<String, Value>,
    data_dir: &Path,
    url_prefix: Option<&str>,
) -> Option<String> {
    let url_fallback = || metadata.get("URL").and_then(Value::as_str).map(String::from);

    let Some(prefix) = url_prefix else {
        warn!("FILESERVER_URL_PREFIX is not set, cannot build file links for citations");
        return url_fallback();
    };
    let Some(file_name) = metadata.get("file_name").and_then(Value::as_str) else {
        return url_fallback();
    };
    if let Some(pipeline_id) = metadata.get("pipeline_id").and_then(Value::as_str) {
        return Some(format!("{prefix}/output/llamacloud/{pipeline_id}${file_name}"));
    }
    if metadata.get("private").and_then(Value::as_str) == Some("true") {
        return Some(format!("{prefix}/output/uploaded/{file_name}"));
    }
    if let Some(file_path) = metadata.get("file_path").and_then(Value::as_str) {
        let relative = relative_to(Path::new(file_path), data_dir);
        return Some(format!("{prefix}/data/{}", relative.display()));
    }
    url_fallback()
}

/// Lexical relative path from `base` to `path`: shared leading components are
/// stripped and every remaining `base` component becomes a `..` segment.
fn relative_to(path: &Path, base: &Path) -> PathBuf {
    let path_parts: Vec<Component> = path.components().collect();
    let base_parts: Vec<Component> = base.components().collect();
    let shared = path_parts
        .iter()
        .zip(base_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let mut relative = PathBuf::new();
    for _ in shared..base_parts.len() {
        relative.push("..");
    }
    for part in &path_parts[shared..] {
        relative.push(part);
    }
    if relative.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        relative
    }
}
