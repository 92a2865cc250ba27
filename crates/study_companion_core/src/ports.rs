//! crates/study_companion_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the local store and the hosted generative API.

use crate::domain::{FilePart, MessageRole};
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Stored value under '{0}' could not be read")]
    Corrupted(String),
    #[error("API_KEY is not configured.")]
    MissingCredential,
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// A stream of text deltas produced by a streamed reply.
pub type ReplyStream = Pin<Box<dyn Stream<Item = PortResult<String>> + Send>>;

//=========================================================================================
// Local Store Port
//=========================================================================================

/// Key/value persistence of JSON snapshots.
///
/// Values are opaque to the store. A `get` that cannot decode its payload returns
/// `PortError::Corrupted`; callers treat that as "absent" and clear the key.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> PortResult<Option<serde_json::Value>>;
    async fn set(&self, key: &str, value: &serde_json::Value) -> PortResult<()>;
    async fn remove(&self, key: &str) -> PortResult<()>;
}

//=========================================================================================
// Gateway Request/Response Shapes
//=========================================================================================

/// One prior turn of a conversation as sent to the assistant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: MessageRole,
    pub text: String,
}

/// A persona chat request: instructions, history, the current turn and its files.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsultRequest {
    pub persona: String,
    pub history: Vec<Turn>,
    pub query: String,
    pub attachments: Vec<FilePart>,
    /// Selects the higher-cost reasoning tier.
    pub deep_reasoning: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssistantReply {
    pub text: String,
    pub grounding: Option<Vec<serde_json::Value>>,
}

/// A single-shot text generation request used by the non-chat features.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TextRequest {
    pub system: Option<String>,
    pub prompt: String,
    pub attachments: Vec<FilePart>,
    /// Ask the model for a JSON object instead of prose.
    pub json_output: bool,
}

//=========================================================================================
// Gateway Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait AssistantService: Send + Sync {
    /// Runs a persona chat turn.
    async fn consult(&self, request: &ConsultRequest) -> PortResult<AssistantReply>;

    /// Runs a persona chat turn, yielding the reply text as it is produced.
    async fn consult_streaming(&self, request: &ConsultRequest) -> PortResult<ReplyStream>;

    /// Generates text for book Q&A, desk synthesis, podcasts, translations and quotes.
    async fn generate_text(&self, request: &TextRequest) -> PortResult<String>;
}

#[async_trait]
pub trait SpeechService: Send + Sync {
    /// Generates playable audio (WAV) from a string of text.
    async fn generate_audio(&self, text: &str) -> PortResult<Vec<u8>>;
}

#[async_trait]
pub trait ImageService: Send + Sync {
    /// Generates an illustration and returns it as a `data:` URL, if the model produced one.
    async fn generate_image(&self, prompt: &str) -> PortResult<Option<String>>;
}
