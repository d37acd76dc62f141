//! crates/lingua_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or HTTP framework; they are
//! serde-enabled because lessons, modules, and chat sessions are persisted as
//! JSON documents and rendered directly into API responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The four exercise skills the platform can generate and grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillType {
    Reading,
    Listening,
    Writing,
    Speaking,
}

impl SkillType {
    pub const ALL: [SkillType; 4] = [
        SkillType::Reading,
        SkillType::Listening,
        SkillType::Writing,
        SkillType::Speaking,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SkillType::Reading => "reading",
            SkillType::Listening => "listening",
            SkillType::Writing => "writing",
            SkillType::Speaking => "speaking",
        }
    }

    pub fn parse(s: &str) -> Option<SkillType> {
        match s {
            "reading" => Some(SkillType::Reading),
            "listening" => Some(SkillType::Listening),
            "writing" => Some(SkillType::Writing),
            "speaking" => Some(SkillType::Speaking),
            _ => None,
        }
    }

    /// Listening and speaking content is gated behind an active subscription.
    pub fn requires_subscription(&self) -> bool {
        matches!(self, SkillType::Listening | SkillType::Speaking)
    }
}

impl std::fmt::Display for SkillType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a lesson targets a single skill or the full four-skill set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LessonKind {
    Single(SkillType),
    Full,
}

impl LessonKind {
    /// Parses the lesson-type segment of a creation request.
    /// `lessonBuilder` selects all four skills; a skill name selects one.
    pub fn parse(s: &str) -> Option<LessonKind> {
        if s == "lessonBuilder" {
            return Some(LessonKind::Full);
        }
        SkillType::parse(s).map(LessonKind::Single)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LessonKind::Full => "lessonBuilder",
            LessonKind::Single(skill) => skill.as_str(),
        }
    }

    /// The skill types a lesson of this kind must generate.
    pub fn skills(&self) -> Vec<SkillType> {
        match self {
            LessonKind::Full => SkillType::ALL.to_vec(),
            LessonKind::Single(skill) => vec![*skill],
        }
    }
}

/// A `{skill, module}` entry inside a lesson's module list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleRef {
    #[serde(rename = "type")]
    pub skill: SkillType,
    pub module_id: Uuid,
}

/// A parent record grouping up to one module per skill type around a shared
/// topic, level, and style. May be created anonymously and claimed later.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub id: Uuid,
    pub topic: String,
    pub level: String,
    pub formality: String,
    pub style: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub writing_type: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub modules: Vec<ModuleRef>,
    pub user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Lesson {
    /// Attaches a module reference, replacing any existing entry for the same
    /// skill. A lesson holds at most one module per skill type.
    pub fn attach_module(&mut self, skill: SkillType, module_id: Uuid) {
        self.modules.retain(|m| m.skill != skill);
        self.modules.push(ModuleRef { skill, module_id });
    }

    pub fn module_for(&self, skill: SkillType) -> Option<&ModuleRef> {
        self.modules.iter().find(|m| m.skill == skill)
    }
}

/// A single generated exercise plus its learner answers and AI feedback.
///
/// Reading and listening modules carry a comprehension passage and exactly
/// four questions; writing and speaking modules carry a task prompt. The
/// skill type is fixed at creation. `feedback` stays `None` until evaluated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub skill: SkillType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comprehension: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    pub questions: Vec<String>,
    pub answers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_session_id: Option<Uuid>,
    pub subscription_required: bool,
    pub created_at: DateTime<Utc>,
}

impl Module {
    /// A comprehension-style module (reading or listening).
    pub fn with_comprehension(skill: SkillType, passage: String, questions: Vec<String>) -> Self {
        Module {
            id: Uuid::new_v4(),
            skill,
            comprehension: Some(passage),
            task: None,
            questions,
            answers: Vec::new(),
            feedback: None,
            chat_session_id: None,
            subscription_required: skill.requires_subscription(),
            created_at: Utc::now(),
        }
    }

    /// A task-style module (writing or speaking).
    pub fn with_task(skill: SkillType, task: String) -> Self {
        Module {
            id: Uuid::new_v4(),
            skill,
            comprehension: None,
            task: Some(task),
            questions: Vec::new(),
            answers: Vec::new(),
            feedback: None,
            chat_session_id: None,
            subscription_required: skill.requires_subscription(),
            created_at: Utc::now(),
        }
    }
}

/// Per-turn rubric scores returned by the evaluator model. Each category is
/// an integer between 1 and 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnScores {
    pub relevance: u8,
    pub vocabulary: u8,
    pub fluency: u8,
    pub pronunciation: u8,
    pub structure: u8,
}

impl TurnScores {
    pub fn in_range(&self) -> bool {
        [
            self.relevance,
            self.vocabulary,
            self.fluency,
            self.pronunciation,
            self.structure,
        ]
        .iter()
        .all(|v| (1..=5).contains(v))
    }
}

/// The learner half of a conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnUser {
    pub audio_url: String,
    pub transcription: String,
}

/// The assistant half of a conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnAssistant {
    pub content: String,
    pub audio_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scores: Option<TurnScores>,
}

/// One user-utterance/assistant-reply exchange within a speaking session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurn {
    pub user: TurnUser,
    pub assistant: TurnAssistant,
    pub timestamp: DateTime<Utc>,
}

/// A per-user, per-module speaking conversation. Turns are append-only and
/// ordered by creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: Uuid,
    pub module_id: Uuid,
    pub user_id: Option<Uuid>,
    pub turns: Vec<ChatTurn>,
    pub created_at: DateTime<Utc>,
}

impl ChatSession {
    pub fn new(module_id: Uuid, user_id: Option<Uuid>) -> Self {
        ChatSession {
            id: Uuid::new_v4(),
            module_id,
            user_id,
            turns: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

/// A role tag for provider conversation history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
}

/// One entry of role-tagged history handed to the chat model.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        ChatMessage {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// The subscription gate's verdict. Derived on demand from billing records,
/// never stored as a standalone entity.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionStatus {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl SubscriptionStatus {
    pub fn active() -> Self {
        SubscriptionStatus {
            valid: true,
            reason: None,
        }
    }

    pub fn inactive(reason: impl Into<String>) -> Self {
        SubscriptionStatus {
            valid: false,
            reason: Some(reason.into()),
        }
    }
}
