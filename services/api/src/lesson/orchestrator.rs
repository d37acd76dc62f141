//! services/api/src/lesson/orchestrator.rs
//!
//! The lesson orchestrator: fans a lesson request out to one concurrent
//! generation task per required skill, joins the settled results, records the
//! surviving modules on the parent lesson, and applies subscription-based
//! redaction to the response. Also owns the lesson ownership operations
//! (link/unlink) and redacted per-module retrieval.

use crate::lesson::{generators, params::GenerationRequest, LessonDeps};
use chrono::Utc;
use lingua_core::domain::{Lesson, LessonKind, Module, SkillType, SubscriptionStatus};
use lingua_core::ports::{PortError, PortResult};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{error, info, warn};
use uuid::Uuid;

/// A module as rendered to the caller: either the full document, or a
/// redacted stub when the content is gated and the caller is unsubscribed.
/// Stored documents are never redacted — only the response payload is.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ModuleView {
    Full(Module),
    Redacted {
        id: Uuid,
        #[serde(rename = "type")]
        skill: SkillType,
        #[serde(rename = "subscriptionRequired")]
        subscription_required: bool,
    },
}

impl ModuleView {
    /// Applies the redaction rule for one module given the caller's
    /// subscription verdict.
    fn render(module: Module, subscription: &SubscriptionStatus) -> Self {
        if module.skill.requires_subscription() && !subscription.valid {
            ModuleView::Redacted {
                id: module.id,
                skill: module.skill,
                subscription_required: true,
            }
        } else {
            ModuleView::Full(module)
        }
    }
}

/// The result of a lesson-creation call.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonOutcome {
    pub lesson_id: Uuid,
    pub modules: BTreeMap<SkillType, ModuleView>,
}

/// A single module fetched through its parent lesson.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleFetch {
    pub title: String,
    pub module_id: Uuid,
    #[serde(rename = "type")]
    pub skill: SkillType,
    pub module: ModuleView,
}

/// Creates a lesson and generates its modules concurrently.
///
/// In the full-lesson variant a failed skill is omitted from the result and
/// only an all-skills failure aborts the call; in the single-skill variant
/// the generator's failure propagates directly.
pub async fn create_lesson(
    deps: &LessonDeps,
    kind: LessonKind,
    request: GenerationRequest,
    user_id: Option<Uuid>,
) -> PortResult<LessonOutcome> {
    let skills = kind.skills();

    // Step 1: persist the empty lesson synchronously.
    let mut lesson = Lesson {
        id: Uuid::new_v4(),
        topic: request.topic.clone(),
        level: request.level.clone(),
        formality: request.formality.clone(),
        style: request.style.clone(),
        writing_type: request.writing_type.clone(),
        kind: kind.as_str().to_string(),
        modules: Vec::new(),
        user_id,
        created_at: Utc::now(),
    };
    deps.db.create_lesson(&lesson).await?;

    // Step 2: one subscription check per call, not per module. Anonymous
    // callers are unsubscribed by definition.
    let subscription = resolve_subscription(deps, user_id).await;

    // Step 3: fan out, one task per skill. Tasks own a clone of the deps and
    // the shared request struct; they run concurrently and are joined below.
    let mut tasks = Vec::with_capacity(skills.len());
    for skill in skills.iter().copied() {
        let deps = deps.clone();
        let request = request.clone();
        tasks.push(tokio::spawn(async move {
            let module_id = generators::generate_module(&deps, skill, &request).await?;
            deps.db.get_module(module_id).await
        }));
    }
    let settled = futures::future::join_all(tasks).await;

    // Step 4: explicit post-join reduction over the settled outcomes.
    let mut generated: Vec<(SkillType, Module)> = Vec::new();
    let mut failures: Vec<(SkillType, PortError)> = Vec::new();
    for (skill, outcome) in skills.iter().copied().zip(settled) {
        match outcome {
            Ok(Ok(module)) => generated.push((skill, module)),
            Ok(Err(e)) => failures.push((skill, e)),
            Err(join_err) => failures.push((
                skill,
                PortError::UpstreamGeneration(format!("generation task aborted: {}", join_err)),
            )),
        }
    }

    for (skill, e) in &failures {
        warn!("Lesson {}: {} generation failed: {}", lesson.id, skill, e);
    }

    if generated.is_empty() {
        if let LessonKind::Single(_) = kind {
            // Propagate the single generator's own failure unchanged.
            let (_, e) = failures.pop().ok_or(PortError::GenerationFailed)?;
            return Err(e);
        }
        error!("Lesson {}: every skill failed to generate", lesson.id);
        return Err(PortError::GenerationFailed);
    }
    if let (LessonKind::Single(_), Some((_, e))) = (kind, failures.pop()) {
        return Err(e);
    }

    // Step 5: attach the surviving modules and persist the lesson.
    for (skill, module) in &generated {
        lesson.attach_module(*skill, module.id);
    }
    deps.db.update_lesson(&lesson).await?;
    info!(
        "Lesson {} created with {} of {} modules",
        lesson.id,
        generated.len(),
        kind.skills().len()
    );

    // Step 6: redact gated content for unsubscribed callers.
    let modules = generated
        .into_iter()
        .map(|(skill, module)| (skill, ModuleView::render(module, &subscription)))
        .collect();

    Ok(LessonOutcome {
        lesson_id: lesson.id,
        modules,
    })
}

/// Fetches one module through its parent lesson, applying the same live
/// subscription check and redaction as lesson creation.
pub async fn fetch_module(
    deps: &LessonDeps,
    lesson_id: Uuid,
    skill: SkillType,
    user_id: Option<Uuid>,
) -> PortResult<ModuleFetch> {
    let lesson = deps.db.get_lesson(lesson_id).await?;
    let entry = lesson
        .module_for(skill)
        .ok_or_else(|| PortError::NotFound(format!("{} module in lesson {}", skill, lesson_id)))?;

    let module = deps.db.get_module(entry.module_id).await?;
    let subscription = resolve_subscription(deps, user_id).await;

    Ok(ModuleFetch {
        title: lesson.topic,
        module_id: module.id,
        skill,
        module: ModuleView::render(module, &subscription),
    })
}

pub async fn get_lesson(deps: &LessonDeps, lesson_id: Uuid) -> PortResult<Lesson> {
    deps.db.get_lesson(lesson_id).await
}

pub async fn list_saved_lessons(deps: &LessonDeps, user_id: Uuid) -> PortResult<Vec<Lesson>> {
    deps.db.saved_lessons(user_id).await
}

/// Links a lesson to a user: the lesson's owner becomes `user_id` and the
/// lesson joins the user's saved set. Idempotent — linking twice leaves the
/// same final state as linking once.
pub async fn link_user(deps: &LessonDeps, lesson_id: Uuid, user_id: Uuid) -> PortResult<()> {
    let mut lesson = deps.db.get_lesson(lesson_id).await?;

    deps.db.add_saved_lesson(user_id, lesson_id).await?;

    if lesson.user_id != Some(user_id) {
        lesson.user_id = Some(user_id);
        deps.db.update_lesson(&lesson).await?;
    }
    Ok(())
}

/// The inverse of `link_user`; succeeds even when one side (or both) is
/// already unlinked.
pub async fn unlink_user(deps: &LessonDeps, lesson_id: Uuid, user_id: Uuid) -> PortResult<()> {
    let mut lesson = deps.db.get_lesson(lesson_id).await?;

    deps.db.remove_saved_lesson(user_id, lesson_id).await?;

    if lesson.user_id == Some(user_id) {
        lesson.user_id = None;
        deps.db.update_lesson(&lesson).await?;
    }
    Ok(())
}

async fn resolve_subscription(deps: &LessonDeps, user_id: Option<Uuid>) -> SubscriptionStatus {
    match user_id {
        Some(user_id) => match deps.subscriptions.check(user_id).await {
            Ok(status) => status,
            Err(e) => {
                // Treat a broken gate as "unsubscribed" rather than failing
                // the whole lesson call.
                error!("Subscription check failed for user {}: {}", user_id, e);
                SubscriptionStatus::inactive("Subscription check failed")
            }
        },
        None => SubscriptionStatus::inactive("Anonymous caller"),
    }
}
