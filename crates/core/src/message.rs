//! Conversation payload types and prompt assembly.
//!
//! These are the value objects received on the chat endpoint: an ordered list
//! of [`ChatMessage`]s, optionally carrying file [`Annotation`]s whose content
//! is folded into the prompt sent to the generation engine.

use std::collections::BTreeSet;

use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::warn;

use crate::error::RequestError;

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person asking questions
    User,
    /// A reply produced by the model
    Assistant,
    /// Instructions injected ahead of the conversation
    System,
}

/// A single message in a conversation, as supplied by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who wrote it
    pub role: Role,

    /// Plain text body
    pub content: String,

    /// Client-attached structured context (uploaded files etc.)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Vec<Annotation>>,
}

impl ChatMessage {
    /// Create a user message without annotations.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            annotations: None,
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            annotations: None,
        }
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            annotations: None,
        }
    }
}

/// The content of an uploaded file: either the raw text inline, or a list of
/// document ids pointing into the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum FileContent {
    Text(String),
    Ref(Vec<String>),
}

/// One uploaded file attached to a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRef {
    pub id: String,
    pub content: FileContent,
    pub filename: String,
    pub filesize: u64,
    pub filetype: String,
}

/// Payload of a `document_file` annotation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationFileData {
    #[serde(default)]
    pub files: Vec<FileRef>,
}

/// Structured context attached to a message by the client.
///
/// The wire format is `{"type": <tag>, "data": <payload>}` with an open tag.
/// Only `document_file` carries semantics here; any other tag is kept as
/// [`Annotation::Unrecognized`] so prompt assembly can log what it skipped.
#[derive(Debug, Clone)]
pub enum Annotation {
    /// Files uploaded alongside the conversation.
    DocumentFile(AnnotationFileData),
    /// An annotation type this backend does not understand. The payload is
    /// kept as is so the message round-trips losslessly.
    Unrecognized {
        kind: String,
        data: serde_json::Value,
    },
}

#[derive(Deserialize)]
struct RawAnnotation {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

impl<'de> Deserialize<'de> for Annotation {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = RawAnnotation::deserialize(deserializer)?;
        if raw.kind == "document_file" {
            let data = serde_json::from_value(raw.data).map_err(D::Error::custom)?;
            Ok(Annotation::DocumentFile(data))
        } else {
            Ok(Annotation::Unrecognized {
                kind: raw.kind,
                data: raw.data,
            })
        }
    }
}

impl Serialize for Annotation {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(2))?;
        match self {
            Annotation::DocumentFile(data) => {
                map.serialize_entry("type", "document_file")?;
                map.serialize_entry("data", data)?;
            }
            Annotation::Unrecognized { kind, data } => {
                map.serialize_entry("type", kind)?;
                map.serialize_entry("data", data)?;
            }
        }
        map.end()
    }
}

impl Annotation {
    /// Convert this annotation into prompt context, if it has any.
    ///
    /// Only `document_file` annotations contribute, and only through files
    /// with inline CSV content. Every other annotation type logs a warning
    /// and contributes nothing.
    pub fn context_content(&self) -> Option<String> {
        match self {
            Annotation::DocumentFile(data) => {
                let blocks: Vec<String> = data
                    .files
                    .iter()
                    .filter(|file| file.filetype == "csv")
                    .filter_map(|file| match &file.content {
                        FileContent::Text(value) => Some(format!("```csv\n{value}\n```")),
                        FileContent::Ref(_) => None,
                    })
                    .collect();
                if blocks.is_empty() {
                    None
                } else {
                    Some(format!(
                        "Use data from following CSV raw content\n{}",
                        blocks.join("\n")
                    ))
                }
            }
            Annotation::Unrecognized { kind, .. } => {
                warn!(
                    "The annotation {} is not supported for generating context content",
                    kind
                );
                None
            }
        }
    }
}

/// The request payload for the chat endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRequest {
    pub messages: Vec<ChatMessage>,

    /// Opaque frontend state forwarded with the conversation; never
    /// interpreted by the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ConversationRequest {
    /// Reject conversations the engine must not be invoked for.
    pub fn validate(&self) -> Result<(), RequestError> {
        let last = self
            .messages
            .last()
            .ok_or(RequestError::EmptyConversation)?;
        if last.role != Role::User {
            return Err(RequestError::LastMessageNotUser);
        }
        Ok(())
    }

    /// The prompt for the current turn: the last message's content plus any
    /// context contributed by file annotations.
    ///
    /// Messages are scanned newest-first and the scan stops at the first user
    /// message carrying annotations, whether or not those annotations produce
    /// content. Earlier annotated turns are never consulted.
    pub fn prompt_text(&self) -> Result<String, RequestError> {
        let last = self
            .messages
            .last()
            .ok_or(RequestError::EmptyConversation)?;
        let mut prompt = last.content.clone();
        for message in self.messages.iter().rev() {
            if message.role != Role::User {
                continue;
            }
            let Some(annotations) = &message.annotations else {
                continue;
            };
            if annotations.is_empty() {
                continue;
            }
            let contents: Vec<String> = annotations
                .iter()
                .filter_map(Annotation::context_content)
                .collect();
            let joined = contents.join("\n");
            if !joined.is_empty() {
                prompt = format!("{prompt}\n{joined}");
            }
            break;
        }
        Ok(prompt)
    }

    /// Every message except the last, reduced to role and content.
    pub fn history(&self) -> Vec<ChatMessage> {
        let end = self.messages.len().saturating_sub(1);
        self.messages[..end]
            .iter()
            .map(|message| ChatMessage {
                role: message.role,
                content: message.content.clone(),
                annotations: None,
            })
            .collect()
    }

    /// All document ids referenced by uploaded files across the user's
    /// messages, deduplicated and sorted.
    pub fn document_ids(&self) -> Vec<String> {
        let mut ids = BTreeSet::new();
        for message in &self.messages {
            if message.role != Role::User {
                continue;
            }
            let Some(annotations) = &message.annotations else {
                continue;
            };
            for annotation in annotations {
                if let Annotation::DocumentFile(data) = annotation {
                    for file in &data.files {
                        if let FileContent::Ref(values) = &file.content {
                            ids.extend(values.iter().cloned());
                        }
                    }
                }
            }
        }
        ids.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn csv_file(id: &str, value: &str) -> FileRef {
        FileRef {
            id: id.into(),
            content: FileContent::Text(value.into()),
            filename: format!("{id}.csv"),
            filesize: value.len() as u64,
            filetype: "csv".into(),
        }
    }

    fn ref_file(id: &str, document_ids: &[&str]) -> FileRef {
        FileRef {
            id: id.into(),
            content: FileContent::Ref(document_ids.iter().map(|d| d.to_string()).collect()),
            filename: format!("{id}.pdf"),
            filesize: 1024,
            filetype: "pdf".into(),
        }
    }

    fn annotated_user(content: &str, files: Vec<FileRef>) -> ChatMessage {
        ChatMessage {
            role: Role::User,
            content: content.into(),
            annotations: Some(vec![Annotation::DocumentFile(AnnotationFileData { files })]),
        }
    }

    #[test]
    fn prompt_is_last_message_content_without_annotations() {
        let request = ConversationRequest {
            messages: vec![
                ChatMessage::user("first"),
                ChatMessage::assistant("reply"),
                ChatMessage::user("second"),
            ],
            data: None,
        };
        assert_eq!(request.prompt_text().unwrap(), "second");
    }

    #[test]
    fn prompt_appends_csv_content_from_last_user_message() {
        let request = ConversationRequest {
            messages: vec![annotated_user("What is in the file?", vec![csv_file("1", "a,b\n1,2")])],
            data: None,
        };
        assert_eq!(
            request.prompt_text().unwrap(),
            "What is in the file?\nUse data from following CSV raw content\n```csv\na,b\n1,2\n```"
        );
    }

    #[test]
    fn ref_only_files_leave_prompt_unchanged() {
        let request = ConversationRequest {
            messages: vec![annotated_user("Summarize", vec![ref_file("1", &["doc-1"])])],
            data: None,
        };
        assert_eq!(request.prompt_text().unwrap(), "Summarize");
    }

    #[test]
    fn scan_stops_at_most_recent_annotated_user_message() {
        // The newer annotated message yields no content, but it still ends
        // the scan: the CSV on the older message must not be appended.
        let request = ConversationRequest {
            messages: vec![
                annotated_user("older", vec![csv_file("1", "x,y")]),
                ChatMessage::assistant("reply"),
                annotated_user("newer", vec![ref_file("2", &["doc-2"])]),
            ],
            data: None,
        };
        assert_eq!(request.prompt_text().unwrap(), "newer");
    }

    #[test]
    fn annotations_on_earlier_turns_apply_when_later_turns_have_none() {
        let request = ConversationRequest {
            messages: vec![
                annotated_user("look at this", vec![csv_file("1", "a,b")]),
                ChatMessage::assistant("ok"),
                ChatMessage::user("and now?"),
            ],
            data: None,
        };
        assert_eq!(
            request.prompt_text().unwrap(),
            "and now?\nUse data from following CSV raw content\n```csv\na,b\n```"
        );
    }

    #[test]
    fn multiple_csv_files_share_one_preamble() {
        let request = ConversationRequest {
            messages: vec![annotated_user(
                "compare",
                vec![csv_file("1", "a"), csv_file("2", "b")],
            )],
            data: None,
        };
        assert_eq!(
            request.prompt_text().unwrap(),
            "compare\nUse data from following CSV raw content\n```csv\na\n```\n```csv\nb\n```"
        );
    }

    #[test]
    fn unrecognized_annotation_contributes_nothing() {
        let annotation: Annotation =
            serde_json::from_str(r#"{"type":"image","data":{"url":"x.png"}}"#).unwrap();
        assert!(matches!(annotation, Annotation::Unrecognized { ref kind, .. } if kind == "image"));
        assert_eq!(annotation.context_content(), None);
    }

    #[test]
    fn unrecognized_annotation_round_trips_its_payload() {
        let wire = r#"{"type":"image","data":{"url":"x.png"}}"#;
        let annotation: Annotation = serde_json::from_str(wire).unwrap();
        assert_eq!(serde_json::to_string(&annotation).unwrap(), wire);
    }

    #[test]
    fn document_file_annotation_deserializes_from_wire_shape() {
        let json = r#"{
            "type": "document_file",
            "data": {
                "files": [{
                    "id": "1",
                    "content": {"type": "text", "value": "a,b\n1,2"},
                    "filename": "x.csv",
                    "filesize": 10,
                    "filetype": "csv"
                }]
            }
        }"#;
        let annotation: Annotation = serde_json::from_str(json).unwrap();
        let Annotation::DocumentFile(data) = annotation else {
            panic!("expected document_file annotation");
        };
        assert_eq!(data.files.len(), 1);
        assert_eq!(data.files[0].content, FileContent::Text("a,b\n1,2".into()));
    }

    #[test]
    fn history_drops_last_message_and_annotations() {
        let request = ConversationRequest {
            messages: vec![
                annotated_user("first", vec![csv_file("1", "a,b")]),
                ChatMessage::assistant("reply"),
                ChatMessage::user("second"),
            ],
            data: None,
        };
        let history = request.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "first");
        assert!(history[0].annotations.is_none());
        assert_eq!(history[1].role, Role::Assistant);
    }

    #[test]
    fn document_ids_are_deduplicated_and_sorted() {
        let request = ConversationRequest {
            messages: vec![
                annotated_user("a", vec![ref_file("1", &["doc-b", "doc-a"])]),
                ChatMessage::assistant("ok"),
                annotated_user("b", vec![ref_file("2", &["doc-a", "doc-c"])]),
            ],
            data: None,
        };
        assert_eq!(request.document_ids(), vec!["doc-a", "doc-b", "doc-c"]);
    }

    #[test]
    fn validate_rejects_empty_conversation() {
        let request = ConversationRequest {
            messages: vec![],
            data: None,
        };
        assert_eq!(
            request.validate().unwrap_err(),
            RequestError::EmptyConversation
        );
    }

    #[test]
    fn validate_rejects_non_user_last_message() {
        let request = ConversationRequest {
            messages: vec![ChatMessage::user("hi"), ChatMessage::assistant("hello")],
            data: None,
        };
        assert_eq!(
            request.validate().unwrap_err(),
            RequestError::LastMessageNotUser
        );
    }

    #[test]
    fn request_deserializes_without_annotations_or_data() {
        let request: ConversationRequest =
            serde_json::from_str(r#"{"messages":[{"role":"user","content":"Hi"}]}"#).unwrap();
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, Role::User);
        assert!(request.data.is_none());
    }
}
