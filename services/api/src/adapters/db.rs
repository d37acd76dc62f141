//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.
//!
//! Lessons, modules, and chat sessions are stored document-style: scalar
//! columns for the identifying fields, JSONB for the nested parts (module
//! refs, AI feedback, conversation turns). Updates rewrite the whole
//! document row, matching the read-modify-write contract of the port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lingua_core::domain::{ChatSession, ChatTurn, Lesson, Module, ModuleRef, SkillType};
use lingua_core::ports::{DatabaseService, PortError, PortResult};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn persistence(e: sqlx::Error) -> PortError {
    PortError::Persistence(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct LessonRecord {
    id: Uuid,
    topic: String,
    level: String,
    formality: String,
    style: String,
    writing_type: Option<String>,
    kind: String,
    modules: Json<Vec<ModuleRef>>,
    user_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl LessonRecord {
    fn to_domain(self) -> Lesson {
        Lesson {
            id: self.id,
            topic: self.topic,
            level: self.level,
            formality: self.formality,
            style: self.style,
            writing_type: self.writing_type,
            kind: self.kind,
            modules: self.modules.0,
            user_id: self.user_id,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct ModuleRecord {
    id: Uuid,
    skill: String,
    comprehension: Option<String>,
    task: Option<String>,
    questions: Vec<String>,
    answers: Vec<String>,
    feedback: Option<Json<serde_json::Value>>,
    chat_session_id: Option<Uuid>,
    subscription_required: bool,
    created_at: DateTime<Utc>,
}

impl ModuleRecord {
    fn to_domain(self) -> PortResult<Module> {
        let skill = SkillType::parse(&self.skill).ok_or_else(|| {
            PortError::Persistence(format!(
                "Module {} has unknown skill type '{}'",
                self.id, self.skill
            ))
        })?;
        Ok(Module {
            id: self.id,
            skill,
            comprehension: self.comprehension,
            task: self.task,
            questions: self.questions,
            answers: self.answers,
            feedback: self.feedback.map(|f| f.0),
            chat_session_id: self.chat_session_id,
            subscription_required: self.subscription_required,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct ChatSessionRecord {
    id: Uuid,
    module_id: Uuid,
    user_id: Option<Uuid>,
    turns: Json<Vec<ChatTurn>>,
    created_at: DateTime<Utc>,
}

impl ChatSessionRecord {
    fn to_domain(self) -> ChatSession {
        ChatSession {
            id: self.id,
            module_id: self.module_id,
            user_id: self.user_id,
            turns: self.turns.0,
            created_at: self.created_at,
        }
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_lesson(&self, lesson: &Lesson) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO lessons (id, topic, level, formality, style, writing_type, kind, modules, user_id, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(lesson.id)
        .bind(&lesson.topic)
        .bind(&lesson.level)
        .bind(&lesson.formality)
        .bind(&lesson.style)
        .bind(&lesson.writing_type)
        .bind(&lesson.kind)
        .bind(Json(&lesson.modules))
        .bind(lesson.user_id)
        .bind(lesson.created_at)
        .execute(&self.pool)
        .await
        .map_err(persistence)?;
        Ok(())
    }

    async fn get_lesson(&self, lesson_id: Uuid) -> PortResult<Lesson> {
        let record = sqlx::query_as::<_, LessonRecord>(
            "SELECT id, topic, level, formality, style, writing_type, kind, modules, user_id, created_at
             FROM lessons WHERE id = $1",
        )
        .bind(lesson_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(persistence)?
        .ok_or_else(|| PortError::NotFound(format!("Lesson {}", lesson_id)))?;
        Ok(record.to_domain())
    }

    async fn update_lesson(&self, lesson: &Lesson) -> PortResult<()> {
        sqlx::query(
            "UPDATE lessons SET modules = $1, user_id = $2, updated_at = now() WHERE id = $3",
        )
        .bind(Json(&lesson.modules))
        .bind(lesson.user_id)
        .bind(lesson.id)
        .execute(&self.pool)
        .await
        .map_err(persistence)?;
        Ok(())
    }

    async fn create_module(&self, module: &Module) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO modules (id, skill, comprehension, task, questions, answers, feedback, chat_session_id, subscription_required, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(module.id)
        .bind(module.skill.as_str())
        .bind(&module.comprehension)
        .bind(&module.task)
        .bind(&module.questions)
        .bind(&module.answers)
        .bind(module.feedback.as_ref().map(Json))
        .bind(module.chat_session_id)
        .bind(module.subscription_required)
        .bind(module.created_at)
        .execute(&self.pool)
        .await
        .map_err(persistence)?;
        Ok(())
    }

    async fn get_module(&self, module_id: Uuid) -> PortResult<Module> {
        let record = sqlx::query_as::<_, ModuleRecord>(
            "SELECT id, skill, comprehension, task, questions, answers, feedback, chat_session_id, subscription_required, created_at
             FROM modules WHERE id = $1",
        )
        .bind(module_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(persistence)?
        .ok_or_else(|| PortError::NotFound(format!("Module {}", module_id)))?;
        record.to_domain()
    }

    async fn update_module(&self, module: &Module) -> PortResult<()> {
        sqlx::query(
            "UPDATE modules SET answers = $1, feedback = $2, chat_session_id = $3, updated_at = now() WHERE id = $4",
        )
        .bind(&module.answers)
        .bind(module.feedback.as_ref().map(Json))
        .bind(module.chat_session_id)
        .bind(module.id)
        .execute(&self.pool)
        .await
        .map_err(persistence)?;
        Ok(())
    }

    async fn create_chat_session(&self, session: &ChatSession) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO chat_sessions (id, module_id, user_id, turns, created_at)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(session.id)
        .bind(session.module_id)
        .bind(session.user_id)
        .bind(Json(&session.turns))
        .bind(session.created_at)
        .execute(&self.pool)
        .await
        .map_err(persistence)?;
        Ok(())
    }

    async fn find_chat_session(
        &self,
        module_id: Uuid,
        user_id: Option<Uuid>,
    ) -> PortResult<Option<ChatSession>> {
        let record = sqlx::query_as::<_, ChatSessionRecord>(
            "SELECT id, module_id, user_id, turns, created_at
             FROM chat_sessions
             WHERE module_id = $1 AND user_id IS NOT DISTINCT FROM $2
             ORDER BY created_at ASC
             LIMIT 1",
        )
        .bind(module_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(persistence)?;
        Ok(record.map(|r| r.to_domain()))
    }

    async fn update_chat_session(&self, session: &ChatSession) -> PortResult<()> {
        sqlx::query(
            "UPDATE chat_sessions SET turns = $1, user_id = $2, updated_at = now() WHERE id = $3",
        )
            .bind(Json(&session.turns))
            .bind(session.user_id)
            .bind(session.id)
            .execute(&self.pool)
            .await
            .map_err(persistence)?;
        Ok(())
    }

    async fn add_saved_lesson(&self, user_id: Uuid, lesson_id: Uuid) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO saved_lessons (user_id, lesson_id) VALUES ($1, $2)
             ON CONFLICT (user_id, lesson_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(lesson_id)
        .execute(&self.pool)
        .await
        .map_err(persistence)?;
        Ok(())
    }

    async fn remove_saved_lesson(&self, user_id: Uuid, lesson_id: Uuid) -> PortResult<()> {
        sqlx::query("DELETE FROM saved_lessons WHERE user_id = $1 AND lesson_id = $2")
            .bind(user_id)
            .bind(lesson_id)
            .execute(&self.pool)
            .await
            .map_err(persistence)?;
        Ok(())
    }

    async fn saved_lessons(&self, user_id: Uuid) -> PortResult<Vec<Lesson>> {
        let records = sqlx::query_as::<_, LessonRecord>(
            "SELECT l.id, l.topic, l.level, l.formality, l.style, l.writing_type, l.kind, l.modules, l.user_id, l.created_at
             FROM lessons l
             JOIN saved_lessons s ON s.lesson_id = l.id
             WHERE s.user_id = $1
             ORDER BY s.created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(persistence)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }
}
