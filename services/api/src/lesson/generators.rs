//! services/api/src/lesson/generators.rs
//!
//! Per-skill exercise generators. Each builds a provider prompt from the
//! validated generation request, requires the response to parse into the
//! skill's payload shape, and only then persists a new module. Garbled or
//! partial provider output is never written.

use crate::lesson::{params::GenerationRequest, parse_model_json, prompts, LessonDeps};
use lingua_core::domain::{ChatMessage, ChatSession, Module, SkillType};
use lingua_core::ports::{PortError, PortResult};
use serde::Deserialize;
use tracing::{error, info};
use uuid::Uuid;

/// Reading and listening modules must carry exactly this many questions.
pub const QUESTION_COUNT: usize = 4;

/// The payload shape required from the provider for comprehension skills.
#[derive(Debug, Deserialize)]
struct ComprehensionPayload {
    comprehension: String,
    questions: Vec<String>,
}

/// The payload shape required from the provider for task skills.
#[derive(Debug, Deserialize)]
struct TaskPayload {
    prompt: String,
}

/// Generates one module of the given skill and returns its id.
///
/// Dispatch is a closed, exhaustive match over `SkillType`; adding a skill
/// without a generator is a compile error.
pub async fn generate_module(
    deps: &LessonDeps,
    skill: SkillType,
    request: &GenerationRequest,
) -> PortResult<Uuid> {
    let result = match skill {
        SkillType::Reading => generate_reading(deps, request).await,
        SkillType::Listening => generate_listening(deps, request).await,
        SkillType::Writing => generate_writing(deps, request).await,
        SkillType::Speaking => generate_speaking(deps, request).await,
    };

    match &result {
        Ok(module_id) => info!("Generated {} module {}", skill, module_id),
        Err(e) => error!("Failed to generate {} module: {}", skill, e),
    }
    result
}

fn fill(template: &str, request: &GenerationRequest) -> String {
    template
        .replace("{topic}", &request.topic)
        .replace("{level}", &request.level)
        .replace("{formality}", &request.formality)
        .replace("{style}", &request.style)
        .replace("{language}", &request.language)
        .replace("{word_count}", &request.word_count.to_string())
}

/// Parses and validates a comprehension payload: a non-empty passage plus
/// exactly four questions.
fn validate_comprehension(skill: SkillType, raw: &str) -> PortResult<ComprehensionPayload> {
    let payload: ComprehensionPayload = parse_model_json(raw)?;
    if payload.comprehension.trim().is_empty() {
        return Err(PortError::UpstreamFormat(format!(
            "{} response is missing the comprehension passage",
            skill
        )));
    }
    if payload.questions.len() != QUESTION_COUNT {
        return Err(PortError::UpstreamFormat(format!(
            "{} response contained {} questions, expected {}",
            skill,
            payload.questions.len(),
            QUESTION_COUNT
        )));
    }
    Ok(payload)
}

/// Parses and validates a task payload: a non-empty task prompt string.
fn validate_task(skill: SkillType, raw: &str) -> PortResult<TaskPayload> {
    let payload: TaskPayload = parse_model_json(raw)?;
    if payload.prompt.trim().is_empty() {
        return Err(PortError::UpstreamFormat(format!(
            "{} response is missing a valid \"prompt\" field",
            skill
        )));
    }
    Ok(payload)
}

async fn generate_reading(deps: &LessonDeps, request: &GenerationRequest) -> PortResult<Uuid> {
    let prompt = fill(prompts::READING_PROMPT, request);
    let raw = deps
        .chat
        .complete(prompts::READING_SYSTEM, &[ChatMessage::user(prompt)])
        .await?;

    let payload = validate_comprehension(SkillType::Reading, &raw)?;
    let module = Module::with_comprehension(
        SkillType::Reading,
        payload.comprehension,
        payload.questions,
    );
    deps.db.create_module(&module).await?;
    Ok(module.id)
}

async fn generate_listening(deps: &LessonDeps, request: &GenerationRequest) -> PortResult<Uuid> {
    let system = fill(prompts::LISTENING_SYSTEM, request);
    let prompt = fill(prompts::LISTENING_PROMPT, request);
    let raw = deps
        .chat
        .complete(&system, &[ChatMessage::user(prompt)])
        .await?;

    let payload = validate_comprehension(SkillType::Listening, &raw)?;
    let module = Module::with_comprehension(
        SkillType::Listening,
        payload.comprehension,
        payload.questions,
    );
    deps.db.create_module(&module).await?;
    Ok(module.id)
}

async fn generate_writing(deps: &LessonDeps, request: &GenerationRequest) -> PortResult<Uuid> {
    let system = fill(prompts::WRITING_SYSTEM, request);
    let prompt = fill(prompts::WRITING_PROMPT, request).replace(
        "{writing_type}",
        request.writing_type.as_deref().unwrap_or("essay"),
    );
    let raw = deps
        .chat
        .complete(&system, &[ChatMessage::user(prompt)])
        .await?;

    let payload = validate_task(SkillType::Writing, &raw)?;
    let module = Module::with_task(SkillType::Writing, payload.prompt);
    deps.db.create_module(&module).await?;
    Ok(module.id)
}

/// Speaking modules also get an empty conversation session up front so the
/// module carries its back-reference from the start.
async fn generate_speaking(deps: &LessonDeps, request: &GenerationRequest) -> PortResult<Uuid> {
    let system = fill(prompts::SPEAKING_SYSTEM, request);
    let prompt = fill(prompts::SPEAKING_PROMPT, request);
    let raw = deps
        .chat
        .complete(&system, &[ChatMessage::user(prompt)])
        .await?;

    let payload = validate_task(SkillType::Speaking, &raw)?;
    let mut module = Module::with_task(SkillType::Speaking, payload.prompt);
    deps.db.create_module(&module).await?;

    let session = ChatSession::new(module.id, None);
    deps.db.create_chat_session(&session).await?;
    module.chat_session_id = Some(session.id);
    deps.db.update_module(&module).await?;

    Ok(module.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lesson::harness::{request, scripted_deps, FnChat};
    use lingua_core::ports::PortError;

    const READING_JSON: &str = r#"{
        "comprehension": "Der Umweltschutz ist ein wichtiges Thema in Deutschland.",
        "questions": ["Worum geht es?", "Was ist wichtig?", "Warum?", "Welches Wort passt?"]
    }"#;

    #[tokio::test]
    async fn reading_module_is_persisted_with_four_questions() {
        let deps = scripted_deps(FnChat::always(READING_JSON));

        let module_id = generate_module(&deps, SkillType::Reading, &request())
            .await
            .unwrap();

        let module = deps.db.get_module(module_id).await.unwrap();
        assert_eq!(module.skill, SkillType::Reading);
        assert_eq!(module.questions.len(), QUESTION_COUNT);
        assert!(module.comprehension.is_some());
        assert!(module.feedback.is_none());
    }

    #[tokio::test]
    async fn wrong_question_count_fails_and_persists_nothing() {
        let deps = scripted_deps(FnChat::always(
            r#"{"comprehension": "Text", "questions": ["Nur eine Frage?"]}"#,
        ));

        let err = generate_module(&deps, SkillType::Listening, &request())
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::UpstreamFormat(_)));
        assert_eq!(deps.module_count(), 0);
    }

    #[tokio::test]
    async fn non_json_response_fails_and_persists_nothing() {
        let deps = scripted_deps(FnChat::always("Sure! Here is your paragraph: ..."));

        let err = generate_module(&deps, SkillType::Reading, &request())
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::UpstreamFormat(_)));
        assert_eq!(deps.module_count(), 0);
    }

    #[tokio::test]
    async fn provider_failure_maps_to_upstream_generation() {
        let deps = scripted_deps(FnChat::failing("connection reset"));

        let err = generate_module(&deps, SkillType::Writing, &request())
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::UpstreamGeneration(_)));
        assert_eq!(deps.module_count(), 0);
    }

    #[tokio::test]
    async fn speaking_module_gets_a_session_back_reference() {
        let deps = scripted_deps(FnChat::always(
            r#"{"prompt": "Du bist im Café. Bestell etwas und erzähl von deinem Tag."}"#,
        ));

        let module_id = generate_module(&deps, SkillType::Speaking, &request())
            .await
            .unwrap();

        let module = deps.db.get_module(module_id).await.unwrap();
        assert!(module.task.is_some());
        let session_id = module.chat_session_id.expect("session back-reference");
        let session = deps
            .db
            .find_chat_session(module_id, None)
            .await
            .unwrap()
            .expect("pre-created session");
        assert_eq!(session.id, session_id);
        assert!(session.turns.is_empty());
    }

    #[tokio::test]
    async fn writing_module_carries_a_task_prompt() {
        let deps = scripted_deps(FnChat::always(
            r#"{"prompt": "Schreib eine E-Mail an deinen Vermieter."}"#,
        ));

        let module_id = generate_module(&deps, SkillType::Writing, &request())
            .await
            .unwrap();
        let module = deps.db.get_module(module_id).await.unwrap();
        assert_eq!(module.task.as_deref(), Some("Schreib eine E-Mail an deinen Vermieter."));
        assert!(module.questions.is_empty());
    }
}
