//! services/api/src/lesson/mod.rs
//!
//! The module-generation and feedback-aggregation pipeline: per-skill
//! generators, feedback evaluators, the fan-out/fan-in lesson orchestrator,
//! and the speaking conversation engine. Everything here is written against
//! the core ports, so the whole pipeline runs unchanged over mocked services
//! in tests.

pub mod conversation;
pub mod feedback;
pub mod generators;
pub mod orchestrator;
pub mod params;
pub mod prompts;

#[cfg(test)]
pub mod harness;

use lingua_core::ports::{
    AudioStorageService, ChatModelService, DatabaseService, PortError, PortResult,
    SpeechToTextService, SubscriptionService, TextToSpeechService,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// The injected collaborators every pipeline operation runs against.
/// Built once at startup; no ambient global clients.
#[derive(Clone)]
pub struct LessonDeps {
    pub db: Arc<dyn DatabaseService>,
    pub chat: Arc<dyn ChatModelService>,
    pub sst: Arc<dyn SpeechToTextService>,
    pub tts: Arc<dyn TextToSpeechService>,
    pub subscriptions: Arc<dyn SubscriptionService>,
    pub audio_store: Arc<dyn AudioStorageService>,
}

/// Parses a provider response that is required to be JSON of shape `T`.
///
/// Providers occasionally wrap their output in a Markdown code fence despite
/// instructions; the fence is stripped before parsing. Anything that still
/// fails to deserialize is an `UpstreamFormat` error — garbled output is
/// rejected here, before anything is persisted.
pub fn parse_model_json<T: DeserializeOwned>(raw: &str) -> PortResult<T> {
    let mut text = raw.trim();
    if let Some(stripped) = text.strip_prefix("```") {
        let stripped = stripped.strip_prefix("json").unwrap_or(stripped);
        text = stripped.strip_suffix("```").unwrap_or(stripped).trim();
    }
    serde_json::from_str(text)
        .map_err(|e| PortError::UpstreamFormat(format!("{} in response: {}", e, raw)))
}

#[cfg(test)]
mod tests {
    use super::parse_model_json;
    use lingua_core::ports::PortError;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Payload {
        prompt: String,
    }

    #[test]
    fn parses_plain_json() {
        let parsed: Payload = parse_model_json(r#"{"prompt": "Erzähl mir von..."}"#).unwrap();
        assert_eq!(parsed.prompt, "Erzähl mir von...");
    }

    #[test]
    fn strips_markdown_fences() {
        let raw = "```json\n{\"prompt\": \"Beschreibe deinen Tag\"}\n```";
        let parsed: Payload = parse_model_json(raw).unwrap();
        assert_eq!(parsed.prompt, "Beschreibe deinen Tag");
    }

    #[test]
    fn rejects_non_json() {
        let err = parse_model_json::<Payload>("Here is your exercise!").unwrap_err();
        assert!(matches!(err, PortError::UpstreamFormat(_)));
    }
}
