//! services/api/src/lesson/conversation.rs
//!
//! The speaking conversation engine. A turn is one full exchange: store the
//! learner's audio, transcribe it, score the utterance against the rubric,
//! produce a tutor reply, synthesize the reply to audio, and append the
//! completed turn to the session. Also serves paginated turn history and the
//! end-of-conversation summary that merges averaged rubric scores with a
//! qualitative evaluation.

use crate::lesson::{parse_model_json, prompts, LessonDeps};
use chrono::Utc;
use lingua_core::domain::{
    ChatMessage, ChatSession, ChatTurn, Module, SkillType, TurnAssistant, TurnScores, TurnUser,
};
use lingua_core::ports::{PortError, PortResult};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

pub const DEFAULT_PAGE: usize = 1;
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// One page of conversation history. `turns` holds the page contents in
/// ascending chronological order; page 1 is the most recent page.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnsPage {
    pub turns: Vec<ChatTurn>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
}

/// Runs one full speaking turn against the module's conversation session and
/// returns the appended turn.
pub async fn submit_turn(
    deps: &LessonDeps,
    module_id: Uuid,
    user_id: Option<Uuid>,
    audio: &[u8],
) -> PortResult<ChatTurn> {
    if audio.is_empty() {
        return Err(PortError::InvalidInput("Audio data is required.".to_string()));
    }
    let mut module = load_speaking_module(deps, module_id).await?;

    let user_audio_url = deps
        .audio_store
        .store_audio(&format!("user_{}.webm", Uuid::new_v4()), audio)
        .await?;
    let transcription = deps.sst.transcribe_audio(audio).await?;

    let mut session = resolve_or_create_session(deps, module_id, user_id).await?;

    // Scoring looks at the latest utterance alone; the tutor reply sees the
    // whole conversation.
    let raw_scores = deps
        .chat
        .complete_json(
            prompts::TURN_SCORING_SYSTEM,
            &[ChatMessage::user(transcription.clone())],
        )
        .await?;
    let scores: TurnScores = parse_model_json(&raw_scores)?;
    if !scores.in_range() {
        return Err(PortError::UpstreamFormat(format!(
            "Rubric scores out of the 1-5 range: {:?}",
            scores
        )));
    }

    let mut history = flatten_history(&session);
    history.push(ChatMessage::user(transcription.clone()));
    let reply = deps
        .chat
        .complete(prompts::TUTOR_REPLY_SYSTEM, &history)
        .await?;

    let reply_audio = deps.tts.generate_audio(&reply).await?;
    let reply_audio_url = deps
        .audio_store
        .store_audio(&format!("assistant_{}.mp3", Uuid::new_v4()), &reply_audio)
        .await?;

    let turn = ChatTurn {
        user: TurnUser {
            audio_url: user_audio_url,
            transcription,
        },
        assistant: TurnAssistant {
            content: reply,
            audio_url: reply_audio_url,
            scores: Some(scores),
        },
        timestamp: Utc::now(),
    };
    session.turns.push(turn.clone());
    deps.db.update_chat_session(&session).await?;

    if module.chat_session_id != Some(session.id) {
        module.chat_session_id = Some(session.id);
        deps.db.update_module(&module).await?;
    }

    info!(
        "Appended turn {} to session {} (module {})",
        session.turns.len(),
        session.id,
        module_id
    );
    Ok(turn)
}

/// Returns one page of the module's conversation, newest pages first with
/// each page's contents in chronological order.
pub async fn get_turns(
    deps: &LessonDeps,
    module_id: Uuid,
    user_id: Option<Uuid>,
    page: Option<usize>,
    page_size: Option<usize>,
) -> PortResult<TurnsPage> {
    let page = page.unwrap_or(DEFAULT_PAGE).max(1);
    let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE).max(1);

    load_speaking_module(deps, module_id).await?;
    let turns = match resolve_session(deps, module_id, user_id).await? {
        Some(session) => session.turns,
        None => Vec::new(),
    };
    let total = turns.len();
    let total_pages = total.div_ceil(page_size);

    // Page 1 holds the newest turns. Walk the list backwards, take the page
    // window, then flip it back into chronological order.
    let mut window: Vec<ChatTurn> = turns
        .into_iter()
        .rev()
        .skip((page - 1) * page_size)
        .take(page_size)
        .collect();
    window.reverse();

    Ok(TurnsPage {
        turns: window,
        total,
        page,
        page_size,
        total_pages,
    })
}

/// Produces the end-of-conversation summary: per-category averages over the
/// scored turns merged with a qualitative evaluation from the model, stored
/// as the speaking module's feedback.
pub async fn summarize(
    deps: &LessonDeps,
    module_id: Uuid,
    user_id: Option<Uuid>,
    language: &str,
) -> PortResult<serde_json::Value> {
    let mut module = load_speaking_module(deps, module_id).await?;
    let task = module.task.clone().ok_or_else(|| {
        PortError::InvalidInput("Module does not contain a speaking task.".to_string())
    })?;

    let session = resolve_session(deps, module_id, user_id)
        .await?
        .ok_or_else(|| PortError::NotFound(format!("Conversation for module {}", module_id)))?;
    if session.turns.is_empty() {
        return Err(PortError::InvalidInput(
            "No conversation turns to evaluate.".to_string(),
        ));
    }

    let averages = average_scores(&session.turns);

    let conversation = session
        .turns
        .iter()
        .map(|t| {
            format!(
                "Student: {}\nAssistant: {}",
                t.user.transcription, t.assistant.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let system = prompts::SPEAKING_SUMMARY_SYSTEM.replace("{language}", language);
    let prompt = prompts::SPEAKING_SUMMARY_PROMPT
        .replace("{language}", language)
        .replace("{task}", &task)
        .replace("{conversation}", &conversation);

    let raw = deps
        .chat
        .complete(&system, &[ChatMessage::user(prompt)])
        .await?;
    let mut feedback: serde_json::Value = parse_model_json(&raw)?;
    if !feedback.is_object() {
        return Err(PortError::UpstreamFormat(
            "Summary response is not a JSON object".to_string(),
        ));
    }
    feedback["scores"] =
        serde_json::to_value(&averages).map_err(|e| PortError::UpstreamFormat(e.to_string()))?;

    module.feedback = Some(feedback.clone());
    deps.db.update_module(&module).await?;

    Ok(feedback)
}

/// Per-category arithmetic means over the turns that carry scores.
#[derive(Debug, Default, Serialize)]
pub struct AverageScores {
    pub relevance: f64,
    pub vocabulary: f64,
    pub fluency: f64,
    pub pronunciation: f64,
    pub structure: f64,
}

fn average_scores(turns: &[ChatTurn]) -> AverageScores {
    let scored: Vec<&TurnScores> = turns
        .iter()
        .filter_map(|t| t.assistant.scores.as_ref())
        .collect();
    if scored.is_empty() {
        return AverageScores::default();
    }
    let n = scored.len() as f64;
    AverageScores {
        relevance: scored.iter().map(|s| s.relevance as f64).sum::<f64>() / n,
        vocabulary: scored.iter().map(|s| s.vocabulary as f64).sum::<f64>() / n,
        fluency: scored.iter().map(|s| s.fluency as f64).sum::<f64>() / n,
        pronunciation: scored.iter().map(|s| s.pronunciation as f64).sum::<f64>() / n,
        structure: scored.iter().map(|s| s.structure as f64).sum::<f64>() / n,
    }
}

async fn load_speaking_module(deps: &LessonDeps, module_id: Uuid) -> PortResult<Module> {
    let module = deps.db.get_module(module_id).await?;
    if module.skill != SkillType::Speaking {
        return Err(PortError::NotFound(format!(
            "speaking module {}",
            module_id
        )));
    }
    Ok(module)
}

/// Finds the caller's session for a module. An identified caller gets their
/// own session, falling back to the unowned pre-created one; an anonymous
/// caller only ever sees unowned sessions. A session claimed by one user is
/// never served for another identity.
async fn resolve_session(
    deps: &LessonDeps,
    module_id: Uuid,
    user_id: Option<Uuid>,
) -> PortResult<Option<ChatSession>> {
    if user_id.is_some() {
        if let Some(session) = deps.db.find_chat_session(module_id, user_id).await? {
            return Ok(Some(session));
        }
    }
    deps.db.find_chat_session(module_id, None).await
}

/// Finds or creates the session a submitted turn belongs to. The empty
/// session pre-created at generation time is unowned; the first identified
/// caller to speak claims it. Once claimed it matches only its owner, so
/// both a different user and an anonymous caller get a fresh one.
async fn resolve_or_create_session(
    deps: &LessonDeps,
    module_id: Uuid,
    user_id: Option<Uuid>,
) -> PortResult<ChatSession> {
    if user_id.is_some() {
        if let Some(session) = deps.db.find_chat_session(module_id, user_id).await? {
            return Ok(session);
        }
    }
    if let Some(mut session) = deps.db.find_chat_session(module_id, None).await? {
        session.user_id = user_id;
        return Ok(session);
    }
    let session = ChatSession::new(module_id, user_id);
    deps.db.create_chat_session(&session).await?;
    Ok(session)
}

fn flatten_history(session: &ChatSession) -> Vec<ChatMessage> {
    let mut history = Vec::with_capacity(session.turns.len() * 2);
    for turn in &session.turns {
        history.push(ChatMessage::user(turn.user.transcription.clone()));
        history.push(ChatMessage::assistant(turn.assistant.content.clone()));
    }
    history
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lesson::harness::{scripted_deps, FnChat, TRANSCRIPT};

    const SCORES_JSON: &str =
        r#"{"relevance": 4, "vocabulary": 4, "fluency": 3, "pronunciation": 4, "structure": 3}"#;

    /// Scores on JSON-mode calls, a plain reply otherwise.
    fn tutor_chat() -> FnChat {
        FnChat::with(|_, _, json| {
            Ok(if json {
                SCORES_JSON.to_string()
            } else {
                "Gerne! Welche Größe möchtest du?".to_string()
            })
        })
    }

    async fn seeded_speaking_module(deps: &crate::lesson::LessonDeps) -> Uuid {
        let mut module =
            Module::with_task(SkillType::Speaking, "Bestell etwas im Café.".to_string());
        let session = ChatSession::new(module.id, None);
        module.chat_session_id = Some(session.id);
        deps.db.create_module(&module).await.unwrap();
        deps.db.create_chat_session(&session).await.unwrap();
        module.id
    }

    fn scored_turn(i: usize, relevance: u8) -> ChatTurn {
        ChatTurn {
            user: TurnUser {
                audio_url: format!("http://test.local/uploads/user_{}.webm", i),
                transcription: format!("Äußerung {}", i),
            },
            assistant: TurnAssistant {
                content: format!("Antwort {}", i),
                audio_url: format!("http://test.local/uploads/assistant_{}.mp3", i),
                scores: Some(TurnScores {
                    relevance,
                    vocabulary: 3,
                    fluency: 3,
                    pronunciation: 3,
                    structure: 3,
                }),
            },
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn empty_audio_is_rejected() {
        let deps = scripted_deps(tutor_chat());
        let module_id = seeded_speaking_module(&deps).await;

        let err = submit_turn(&deps, module_id, None, &[]).await.unwrap_err();
        assert!(matches!(err, PortError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn turn_on_non_speaking_module_is_not_found() {
        let deps = scripted_deps(tutor_chat());
        let module = Module::with_task(SkillType::Writing, "Aufgabe".to_string());
        let module_id = module.id;
        deps.db.create_module(&module).await.unwrap();

        let err = submit_turn(&deps, module_id, None, &[1, 2, 3])
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::NotFound(_)));
    }

    #[tokio::test]
    async fn a_turn_is_scored_transcribed_and_appended() {
        let deps = scripted_deps(tutor_chat());
        let module_id = seeded_speaking_module(&deps).await;

        let turn = submit_turn(&deps, module_id, None, &[1, 2, 3])
            .await
            .unwrap();

        assert_eq!(turn.user.transcription, TRANSCRIPT);
        assert!(turn.user.audio_url.contains("/uploads/user_"));
        assert!(turn.assistant.audio_url.contains("/uploads/assistant_"));
        let scores = turn.assistant.scores.unwrap();
        assert_eq!(scores.relevance, 4);

        let session = deps
            .db
            .find_chat_session(module_id, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(session.turns.len(), 1);
    }

    #[tokio::test]
    async fn first_identified_caller_claims_the_precreated_session() {
        let deps = scripted_deps(tutor_chat());
        let module_id = seeded_speaking_module(&deps).await;
        let user = Uuid::new_v4();

        submit_turn(&deps, module_id, Some(user), &[1, 2, 3])
            .await
            .unwrap();
        submit_turn(&deps, module_id, Some(user), &[4, 5, 6])
            .await
            .unwrap();

        let session = deps
            .db
            .find_chat_session(module_id, Some(user))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(session.user_id, Some(user));
        assert_eq!(session.turns.len(), 2);

        // A second user does not see the claimed session; they get their own.
        let other = Uuid::new_v4();
        submit_turn(&deps, module_id, Some(other), &[7, 8, 9])
            .await
            .unwrap();
        let theirs = deps
            .db
            .find_chat_session(module_id, Some(other))
            .await
            .unwrap()
            .unwrap();
        assert_ne!(theirs.id, session.id);
        assert_eq!(theirs.turns.len(), 1);
    }

    #[tokio::test]
    async fn a_claimed_session_is_hidden_from_anonymous_callers() {
        let deps = scripted_deps(tutor_chat());
        let module_id = seeded_speaking_module(&deps).await;
        let owner = Uuid::new_v4();

        submit_turn(&deps, module_id, Some(owner), &[1, 2, 3])
            .await
            .unwrap();
        submit_turn(&deps, module_id, Some(owner), &[4, 5, 6])
            .await
            .unwrap();

        // Anonymous history reads see none of the owner's turns.
        let page = get_turns(&deps, module_id, None, None, None).await.unwrap();
        assert_eq!(page.total, 0);
        assert!(page.turns.is_empty());

        // An anonymous turn lands in a fresh unowned session, not the
        // owner's conversation.
        submit_turn(&deps, module_id, None, &[7, 8, 9]).await.unwrap();
        let owned = deps
            .db
            .find_chat_session(module_id, Some(owner))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(owned.turns.len(), 2);
        let unowned = deps
            .db
            .find_chat_session(module_id, None)
            .await
            .unwrap()
            .unwrap();
        assert_ne!(unowned.id, owned.id);
        assert_eq!(unowned.turns.len(), 1);
    }

    #[tokio::test]
    async fn out_of_range_scores_are_rejected() {
        let deps = scripted_deps(FnChat::with(|_, _, json| {
            Ok(if json {
                r#"{"relevance": 9, "vocabulary": 4, "fluency": 3, "pronunciation": 4, "structure": 3}"#
                    .to_string()
            } else {
                "Antwort".to_string()
            })
        }));
        let module_id = seeded_speaking_module(&deps).await;

        let err = submit_turn(&deps, module_id, None, &[1]).await.unwrap_err();
        assert!(matches!(err, PortError::UpstreamFormat(_)));
        let session = deps
            .db
            .find_chat_session(module_id, None)
            .await
            .unwrap()
            .unwrap();
        assert!(session.turns.is_empty());
    }

    #[tokio::test]
    async fn pagination_serves_newest_page_first_in_chronological_order() {
        let deps = scripted_deps(tutor_chat());
        let module_id = seeded_speaking_module(&deps).await;
        let mut session = deps
            .db
            .find_chat_session(module_id, None)
            .await
            .unwrap()
            .unwrap();
        for i in 1..=15 {
            session.turns.push(scored_turn(i, 3));
        }
        deps.db.update_chat_session(&session).await.unwrap();

        let first = get_turns(&deps, module_id, None, None, None).await.unwrap();
        assert_eq!(first.total, 15);
        assert_eq!(first.total_pages, 2);
        assert_eq!(first.turns.len(), 10);
        assert_eq!(first.turns[0].user.transcription, "Äußerung 6");
        assert_eq!(first.turns[9].user.transcription, "Äußerung 15");

        let second = get_turns(&deps, module_id, None, Some(2), None)
            .await
            .unwrap();
        assert_eq!(second.turns.len(), 5);
        assert_eq!(second.turns[0].user.transcription, "Äußerung 1");
        assert_eq!(second.turns[4].user.transcription, "Äußerung 5");

        let beyond = get_turns(&deps, module_id, None, Some(3), None)
            .await
            .unwrap();
        assert!(beyond.turns.is_empty());
    }

    #[tokio::test]
    async fn history_is_empty_without_a_session() {
        let deps = scripted_deps(tutor_chat());
        let module = Module::with_task(SkillType::Speaking, "Aufgabe".to_string());
        let module_id = module.id;
        deps.db.create_module(&module).await.unwrap();

        let page = get_turns(&deps, module_id, None, None, None).await.unwrap();
        assert_eq!(page.total, 0);
        assert_eq!(page.total_pages, 0);
        assert!(page.turns.is_empty());
    }

    #[tokio::test]
    async fn summary_merges_averages_with_the_qualitative_evaluation() {
        let deps = scripted_deps(FnChat::always(
            r#"{
                "overall": "3/5 (Okay)",
                "evaluation": {"Fluency": "Solide."},
                "tips": ["Mehr sprechen."]
            }"#,
        ));
        let module_id = seeded_speaking_module(&deps).await;
        let mut session = deps
            .db
            .find_chat_session(module_id, None)
            .await
            .unwrap()
            .unwrap();
        session.turns.push(scored_turn(1, 4));
        session.turns.push(scored_turn(2, 2));
        deps.db.update_chat_session(&session).await.unwrap();

        let feedback = summarize(&deps, module_id, None, "german").await.unwrap();
        assert_eq!(feedback["overall"], "3/5 (Okay)");
        assert_eq!(feedback["scores"]["relevance"], 3.0);
        assert_eq!(feedback["scores"]["vocabulary"], 3.0);

        let module = deps.db.get_module(module_id).await.unwrap();
        assert_eq!(module.feedback, Some(feedback));
    }

    #[tokio::test]
    async fn summary_without_turns_is_invalid() {
        let deps = scripted_deps(tutor_chat());
        let module_id = seeded_speaking_module(&deps).await;

        let err = summarize(&deps, module_id, None, "german").await.unwrap_err();
        assert!(matches!(err, PortError::InvalidInput(_)));
    }
}
