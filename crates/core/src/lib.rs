//! # Docent Core
//!
//! Domain types, traits, and error definitions for the Docent chat backend.
//! This crate has **zero framework dependencies** — it defines the domain
//! model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! The streaming protocol, conversation payloads, and citation rules live
//! here as plain types and pure functions. I/O-bearing implementations live
//! in their respective crates. This enables:
//! - Testing the wire protocol against literal byte fixtures
//! - Swapping the generation engine via the [`GenerationEngine`] trait
//! - Clean dependency graph (all crates depend inward on core)

pub mod engine;
pub mod error;
pub mod frame;
pub mod message;
pub mod node;

// Re-export key types at crate root for ergonomics
pub use engine::{ChatResponse, GenerationEngine, StreamingChatResponse};
pub use error::{EngineError, Error, IndexError, RequestError, Result};
pub use frame::Frame;
pub use message::{
    Annotation, AnnotationFileData, ChatMessage, ConversationRequest, FileContent, FileRef, Role,
};
pub use node::{Citation, SourceNode, resolve_url};
