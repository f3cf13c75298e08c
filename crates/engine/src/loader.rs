//! Document loading and chunking for index generation.
//!
//! Walks the data directory recursively, reads every supported text file,
//! and splits each document into fixed-size character windows with overlap.

use std::path::Path;

use docent_core::error::IndexError;
use serde_json::{Map, Value};
use tracing::warn;

/// File extensions read as plain text. Everything else is skipped.
const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "csv"];

/// One source document read from the data directory.
#[derive(Debug, Clone)]
pub struct Document {
    /// Stable id: the file's absolute path.
    pub id: String,

    pub text: String,

    /// Metadata carried through the index into citations.
    pub metadata: Map<String, Value>,
}

/// Read every supported document under `data_dir`, recursively.
///
/// A missing or empty directory is not an error; it yields an empty list
/// with a warning, matching the "nothing indexed yet" startup state.
/// Hidden files and directories are skipped. Results are sorted by id so
/// index builds are deterministic.
pub fn load_documents(data_dir: &Path) -> Result<Vec<Document>, IndexError> {
    if !data_dir.exists() {
        warn!(path = %data_dir.display(), "Data directory does not exist, nothing to index");
        return Ok(Vec::new());
    }

    let mut documents = Vec::new();
    walk(data_dir, &mut documents)?;

    if documents.is_empty() {
        warn!(path = %data_dir.display(), "No readable documents found in data directory");
    }

    documents.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(documents)
}

fn walk(dir: &Path, documents: &mut Vec<Document>) -> Result<(), IndexError> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| IndexError::Storage(format!("Failed to read {}: {e}", dir.display())))?;

    for entry in entries {
        let entry = entry
            .map_err(|e| IndexError::Storage(format!("Failed to read {}: {e}", dir.display())))?;
        let path = entry.path();

        let name = entry.file_name();
        if name.to_string_lossy().starts_with('.') {
            continue;
        }

        if path.is_dir() {
            walk(&path, documents)?;
            continue;
        }

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        if !extension.is_some_and(|e| TEXT_EXTENSIONS.contains(&e.as_str())) {
            warn!(path = %path.display(), "Skipping unsupported file type");
            continue;
        }

        let text = std::fs::read_to_string(&path)
            .map_err(|e| IndexError::Storage(format!("Failed to read {}: {e}", path.display())))?;
        let absolute = std::path::absolute(&path)
            .map_err(|e| IndexError::Storage(format!("Failed to resolve {}: {e}", path.display())))?;

        let mut metadata = Map::new();
        metadata.insert(
            "file_name".into(),
            Value::from(name.to_string_lossy().into_owned()),
        );
        metadata.insert(
            "file_path".into(),
            Value::from(absolute.display().to_string()),
        );

        documents.push(Document {
            id: absolute.display().to_string(),
            text,
            metadata,
        });
    }

    Ok(())
}

/// Split text into windows of at most `chunk_size` characters with
/// `chunk_overlap` characters shared between consecutive windows.
///
/// A full window ends at its last whitespace when it has one, so words stay
/// intact; a window with no usable whitespace splits at the size limit.
/// Boundaries count characters, so multi-byte text never splits inside a
/// code point.
pub fn chunk_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    if text.is_empty() || chunk_size == 0 {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let mut end = (start + chunk_size).min(chars.len());
        if end < chars.len() {
            if let Some(ws) = chars[start..end].iter().rposition(|c| c.is_whitespace()) {
                if ws > 0 {
                    end = start + ws + 1;
                }
            }
        }
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start = end.saturating_sub(chunk_overlap).max(start + 1);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_a_single_chunk() {
        assert_eq!(chunk_text("hello", 1024, 20), vec!["hello".to_string()]);
        assert!(chunk_text("", 1024, 20).is_empty());
    }

    #[test]
    fn chunks_overlap_by_the_configured_amount() {
        let chunks = chunk_text("abcdefghij", 4, 2);
        assert_eq!(chunks, vec!["abcd", "cdef", "efgh", "ghij"]);
    }

    #[test]
    fn chunks_prefer_whitespace_boundaries() {
        let chunks = chunk_text("hello world peace", 8, 0);
        assert_eq!(chunks, vec!["hello ", "world ", "peace"]);
    }

    #[test]
    fn final_partial_chunk_is_kept() {
        let chunks = chunk_text("abcdefg", 4, 0);
        assert_eq!(chunks, vec!["abcd", "efg"]);
    }

    #[test]
    fn chunking_respects_character_boundaries() {
        let chunks = chunk_text("héllo wörld", 4, 1);
        assert_eq!(chunks[0], "héll");
        let total: String = chunk_text("héllo wörld", 100, 0).concat();
        assert_eq!(total, "héllo wörld");
    }

    #[test]
    fn loads_supported_files_recursively() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "alpha").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/b.md"), "beta").unwrap();
        std::fs::write(dir.path().join("image.png"), [0u8; 4]).unwrap();
        std::fs::write(dir.path().join(".hidden.txt"), "secret").unwrap();

        let documents = load_documents(dir.path()).unwrap();
        assert_eq!(documents.len(), 2);

        let names: Vec<&str> = documents
            .iter()
            .map(|d| d.metadata["file_name"].as_str().unwrap())
            .collect();
        assert!(names.contains(&"a.txt"));
        assert!(names.contains(&"b.md"));
    }

    #[test]
    fn document_metadata_points_back_at_the_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("doc.txt"), "content").unwrap();

        let documents = load_documents(dir.path()).unwrap();
        assert_eq!(documents.len(), 1);
        let doc = &documents[0];
        assert_eq!(doc.text, "content");
        assert_eq!(doc.metadata["file_name"], "doc.txt");
        assert_eq!(doc.metadata["file_path"].as_str().unwrap(), doc.id);
        assert!(doc.id.ends_with("doc.txt"));
    }

    #[test]
    fn missing_or_empty_directory_yields_no_documents() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_documents(dir.path()).unwrap().is_empty());
        assert!(load_documents(&dir.path().join("absent")).unwrap().is_empty());
    }
}
