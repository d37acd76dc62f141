//! services/api/src/lesson/feedback.rs
//!
//! Per-skill feedback evaluators. Each loads the stored module, embeds the
//! original passage/task and the learner's submission into an evaluation
//! prompt, and requires the provider's response to parse into the skill's
//! feedback shape before anything is written back. Prior feedback is
//! overwritten; partial feedback is never saved.

use crate::lesson::{conversation, parse_model_json, prompts, LessonDeps};
use lingua_core::domain::{ChatMessage, Module, SkillType};
use lingua_core::ports::{PortError, PortResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{error, info};
use uuid::Uuid;

/// The learner's submission for a feedback call. Reading/listening send one
/// answer per stored question; writing sends the composed text; speaking
/// sends nothing (its material is the conversation session).
#[derive(Debug, Clone)]
pub struct FeedbackInput {
    pub module_id: Uuid,
    /// The caller's identity, used to locate their speaking session.
    pub user_id: Option<Uuid>,
    pub answers: Option<Vec<String>>,
    pub response: Option<String>,
    pub language: String,
}

/// One graded answer in a reading/listening verdict array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerVerdict {
    pub question: String,
    pub answer: String,
    pub correct: bool,
    pub suggestion: String,
}

/// The rubric object returned for writing submissions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RubricFeedback {
    pub overall: String,
    pub evaluation: BTreeMap<String, String>,
    pub tips: Vec<String>,
}

/// Evaluates a learner submission against a stored module and persists the
/// parsed feedback. Returns the feedback exactly as persisted.
pub async fn evaluate_module(
    deps: &LessonDeps,
    skill: SkillType,
    input: FeedbackInput,
) -> PortResult<serde_json::Value> {
    let result = match skill {
        SkillType::Reading | SkillType::Listening => {
            evaluate_comprehension(deps, skill, &input).await
        }
        SkillType::Writing => evaluate_writing(deps, &input).await,
        SkillType::Speaking => {
            conversation::summarize(deps, input.module_id, input.user_id, &input.language).await
        }
    };

    match &result {
        Ok(_) => info!("Stored {} feedback on module {}", skill, input.module_id),
        Err(e) => error!(
            "Feedback evaluation failed for {} module {}: {}",
            skill, input.module_id, e
        ),
    }
    result
}

/// Loads a module and checks it actually holds the expected skill.
async fn load_module(deps: &LessonDeps, module_id: Uuid, skill: SkillType) -> PortResult<Module> {
    let module = deps.db.get_module(module_id).await?;
    if module.skill != skill {
        return Err(PortError::NotFound(format!("{} module {}", skill, module_id)));
    }
    Ok(module)
}

async fn evaluate_comprehension(
    deps: &LessonDeps,
    skill: SkillType,
    input: &FeedbackInput,
) -> PortResult<serde_json::Value> {
    let answers = input
        .answers
        .as_ref()
        .ok_or_else(|| PortError::InvalidInput("answers[] are required.".to_string()))?;

    let mut module = load_module(deps, input.module_id, skill).await?;
    let passage = module.comprehension.clone().ok_or_else(|| {
        PortError::InvalidInput("Module does not contain a comprehension passage.".to_string())
    })?;

    if module.questions.len() != answers.len() {
        return Err(PortError::InvalidInput(
            "questions and answers arrays must be of equal length.".to_string(),
        ));
    }

    let pairs = module
        .questions
        .iter()
        .zip(answers.iter())
        .enumerate()
        .map(|(i, (q, a))| format!("Question {}: {}\nStudent answer: {}", i + 1, q, a))
        .collect::<Vec<_>>()
        .join("\n\n");

    let system = prompts::COMPREHENSION_FEEDBACK_SYSTEM.replace("{language}", &input.language);
    let prompt = prompts::COMPREHENSION_FEEDBACK_PROMPT
        .replace("{language}", &input.language)
        .replace("{passage}", &passage)
        .replace("{pairs}", &pairs);

    let raw = deps
        .chat
        .complete(&system, &[ChatMessage::user(prompt)])
        .await?;

    let verdicts: Vec<AnswerVerdict> = parse_model_json(&raw)?;
    if verdicts.len() != module.questions.len() {
        return Err(PortError::UpstreamFormat(format!(
            "Expected {} verdicts, provider returned {}",
            module.questions.len(),
            verdicts.len()
        )));
    }

    let feedback = serde_json::to_value(&verdicts)
        .map_err(|e| PortError::UpstreamFormat(e.to_string()))?;
    module.answers = answers.clone();
    module.feedback = Some(feedback.clone());
    deps.db.update_module(&module).await?;

    Ok(feedback)
}

async fn evaluate_writing(deps: &LessonDeps, input: &FeedbackInput) -> PortResult<serde_json::Value> {
    let submission = input
        .response
        .as_ref()
        .filter(|r| !r.trim().is_empty())
        .ok_or_else(|| {
            PortError::InvalidInput("A written response is required.".to_string())
        })?;

    let mut module = load_module(deps, input.module_id, SkillType::Writing).await?;
    let task = module.task.clone().ok_or_else(|| {
        PortError::InvalidInput("Module does not contain a writing task.".to_string())
    })?;

    let system = prompts::WRITING_FEEDBACK_SYSTEM.replace("{language}", &input.language);
    let prompt = prompts::WRITING_FEEDBACK_PROMPT
        .replace("{language}", &input.language)
        .replace("{task}", &task)
        .replace("{submission}", submission);

    let raw = deps
        .chat
        .complete(&system, &[ChatMessage::user(prompt)])
        .await?;

    let rubric: RubricFeedback = parse_model_json(&raw)?;
    let feedback = serde_json::to_value(&rubric)
        .map_err(|e| PortError::UpstreamFormat(e.to_string()))?;
    module.answers = vec![submission.clone()];
    module.feedback = Some(feedback.clone());
    deps.db.update_module(&module).await?;

    Ok(feedback)
}
