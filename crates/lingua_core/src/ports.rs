//! crates/lingua_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use crate::domain::{
    ChatMessage, ChatSession, Lesson, Module, SubscriptionStatus,
};
use async_trait::async_trait;
use uuid::Uuid;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// The error taxonomy shared by every port operation and every application
/// flow built on top of them.
///
/// Upstream variants distinguish the provider failing outright
/// (`UpstreamGeneration`, `UpstreamTranscription`) from the provider
/// responding with a payload that fails structural validation
/// (`UpstreamFormat`) — the latter is provider drift, not a caller error.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("{0} not found")]
    NotFound(String),
    #[error("Upstream generation failed: {0}")]
    UpstreamGeneration(String),
    #[error("Upstream transcription failed: {0}")]
    UpstreamTranscription(String),
    #[error("Upstream response violated the expected format: {0}")]
    UpstreamFormat(String),
    #[error("All requested skills failed to generate")]
    GenerationFailed,
    #[error("Persistence failure: {0}")]
    Persistence(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Document-style persistence over the three core collections.
///
/// Every update is a read-modify-write against a single document identified
/// by its id; there are no cross-document transactions, and last-write-wins
/// applies when two updates race on the same document.
#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Lesson Management ---
    async fn create_lesson(&self, lesson: &Lesson) -> PortResult<()>;

    async fn get_lesson(&self, lesson_id: Uuid) -> PortResult<Lesson>;

    async fn update_lesson(&self, lesson: &Lesson) -> PortResult<()>;

    // --- Module Management ---
    async fn create_module(&self, module: &Module) -> PortResult<()>;

    async fn get_module(&self, module_id: Uuid) -> PortResult<Module>;

    async fn update_module(&self, module: &Module) -> PortResult<()>;

    // --- Chat Session Management ---
    async fn create_chat_session(&self, session: &ChatSession) -> PortResult<()>;

    /// `findOne` semantics: the first session matching the module and owner.
    /// The owner must match exactly; `None` matches only unowned sessions,
    /// so one user's conversation is never served for another identity.
    async fn find_chat_session(
        &self,
        module_id: Uuid,
        user_id: Option<Uuid>,
    ) -> PortResult<Option<ChatSession>>;

    async fn update_chat_session(&self, session: &ChatSession) -> PortResult<()>;

    // --- Saved-Lesson Bookkeeping (set semantics, no duplicates) ---
    async fn add_saved_lesson(&self, user_id: Uuid, lesson_id: Uuid) -> PortResult<()>;

    async fn remove_saved_lesson(&self, user_id: Uuid, lesson_id: Uuid) -> PortResult<()>;

    async fn saved_lessons(&self, user_id: Uuid) -> PortResult<Vec<Lesson>>;
}

/// Thin interface to the external generative text model. Responses are
/// opaque and unreliable; callers must validate before trusting them.
#[async_trait]
pub trait ChatModelService: Send + Sync {
    /// Runs a completion over a system instruction plus role-tagged history.
    async fn complete(&self, system: &str, history: &[ChatMessage]) -> PortResult<String>;

    /// Like `complete`, but constrains the provider to emit a JSON object.
    async fn complete_json(&self, system: &str, history: &[ChatMessage]) -> PortResult<String>;
}

#[async_trait]
pub trait SpeechToTextService: Send + Sync {
    /// Transcribes a slice of audio data into text.
    async fn transcribe_audio(&self, audio_data: &[u8]) -> PortResult<String>;
}

#[async_trait]
pub trait TextToSpeechService: Send + Sync {
    /// Generates audio data from a string of text.
    async fn generate_audio(&self, text: &str) -> PortResult<Vec<u8>>;
}

/// Answers "does this user currently hold an active paid entitlement".
/// Resolved live on every call; never cached across requests.
#[async_trait]
pub trait SubscriptionService: Send + Sync {
    async fn check(&self, user_id: Uuid) -> PortResult<SubscriptionStatus>;
}

/// Stores audio artifacts (learner uploads and synthesized replies) and
/// returns a URL the client can retrieve them from.
#[async_trait]
pub trait AudioStorageService: Send + Sync {
    async fn store_audio(&self, file_name: &str, bytes: &[u8]) -> PortResult<String>;
}
