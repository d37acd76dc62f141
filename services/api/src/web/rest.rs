//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.
//!
//! Every response uses the same envelope: `{"success": true, "data": ...}`
//! on success, `{"success": false, "error": "..."}` on failure. Callers
//! identify themselves with an optional `x-user-id` header; routes that act
//! on a user's behalf require it.

use crate::lesson::{
    conversation,
    feedback::{self, FeedbackInput},
    orchestrator,
    params::{GenerationRequest, LessonParams},
};
use crate::web::state::AppState;
use axum::{
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use lingua_core::domain::{LessonKind, SkillType};
use lingua_core::ports::PortError;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::error;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        create_lesson_handler,
    ),
    components(
        schemas(LessonParams)
    ),
    tags(
        (name = "Lingua Lesson API", description = "API endpoints for AI-generated language exercises.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Response Envelope and Error Mapping
//=========================================================================================

type HandlerError = (StatusCode, Json<Value>);

fn success(data: impl serde::Serialize) -> Json<Value> {
    Json(json!({ "success": true, "data": data }))
}

fn failure(status: StatusCode, message: impl Into<String>) -> HandlerError {
    (
        status,
        Json(json!({ "success": false, "error": message.into() })),
    )
}

fn status_for(e: &PortError) -> StatusCode {
    match e {
        PortError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        PortError::Unauthorized => StatusCode::UNAUTHORIZED,
        PortError::NotFound(_) => StatusCode::NOT_FOUND,
        PortError::UpstreamGeneration(_) | PortError::UpstreamTranscription(_) => {
            StatusCode::BAD_GATEWAY
        }
        PortError::UpstreamFormat(_)
        | PortError::GenerationFailed
        | PortError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn port_failure(e: PortError) -> HandlerError {
    if status_for(&e).is_server_error() {
        error!("Request failed: {}", e);
    }
    failure(status_for(&e), e.to_string())
}

//=========================================================================================
// x-user-id Identity Helpers
//=========================================================================================

fn optional_user_id(headers: &HeaderMap) -> Result<Option<Uuid>, HandlerError> {
    match headers.get("x-user-id").map(|v| v.to_str()) {
        None => Ok(None),
        Some(Ok(raw)) => Uuid::parse_str(raw)
            .map(Some)
            .map_err(|_| failure(StatusCode::BAD_REQUEST, "Invalid x-user-id format")),
        Some(Err(_)) => Err(failure(StatusCode::BAD_REQUEST, "Invalid x-user-id format")),
    }
}

fn required_user_id(headers: &HeaderMap) -> Result<Uuid, HandlerError> {
    optional_user_id(headers)?.ok_or_else(|| {
        failure(StatusCode::UNAUTHORIZED, "x-user-id header is required")
    })
}

// Path ids are parsed by hand rather than extracted as `Path<Uuid>` so a
// malformed id gets the same response envelope as every other failure.
fn parse_uuid(raw: &str) -> Result<Uuid, HandlerError> {
    Uuid::parse_str(raw).map_err(|_| {
        failure(
            StatusCode::BAD_REQUEST,
            format!("Invalid id '{}' in path", raw),
        )
    })
}

fn parse_skill(raw: &str) -> Result<SkillType, HandlerError> {
    SkillType::parse(raw).ok_or_else(|| {
        failure(
            StatusCode::BAD_REQUEST,
            format!("Unknown skill type '{}'", raw),
        )
    })
}

//=========================================================================================
// Lesson Handlers
//=========================================================================================

/// Create a lesson and generate its exercise modules.
///
/// The path segment selects a single skill (`reading`, `listening`,
/// `writing`, `speaking`) or `lessonBuilder` for all four at once. An
/// optional `x-user-id` header links the lesson to a user and unlocks
/// subscription-gated content.
#[utoipa::path(
    post,
    path = "/lessons/{lesson_type}",
    request_body = LessonParams,
    responses(
        (status = 201, description = "Lesson created; generated modules returned"),
        (status = 400, description = "Invalid lesson type or parameters"),
        (status = 500, description = "All requested skills failed to generate"),
        (status = 502, description = "The generation provider failed")
    ),
    params(
        ("lesson_type" = String, Path, description = "A skill name or 'lessonBuilder'."),
        ("x-user-id" = Option<Uuid>, Header, description = "The caller's user id.")
    )
)]
pub async fn create_lesson_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(lesson_type): Path<String>,
    Json(params): Json<LessonParams>,
) -> Result<impl IntoResponse, HandlerError> {
    let user_id = optional_user_id(&headers)?;
    let kind = LessonKind::parse(&lesson_type).ok_or_else(|| {
        failure(
            StatusCode::BAD_REQUEST,
            format!("Unknown lesson type '{}'", lesson_type),
        )
    })?;
    let request = GenerationRequest::new(params).map_err(port_failure)?;

    let outcome = orchestrator::create_lesson(&app_state.lesson, kind, request, user_id)
        .await
        .map_err(port_failure)?;
    Ok((StatusCode::CREATED, success(outcome)))
}

/// List the lessons saved by the calling user.
pub async fn list_lessons_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, HandlerError> {
    let user_id = required_user_id(&headers)?;
    let lessons = orchestrator::list_saved_lessons(&app_state.lesson, user_id)
        .await
        .map_err(port_failure)?;
    Ok(success(lessons))
}

/// Fetch one lesson document (its module references, not their content).
pub async fn get_lesson_handler(
    State(app_state): State<Arc<AppState>>,
    Path(lesson_id): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    let lesson_id = parse_uuid(&lesson_id)?;
    let lesson = orchestrator::get_lesson(&app_state.lesson, lesson_id)
        .await
        .map_err(port_failure)?;
    Ok(success(lesson))
}

/// Fetch one module through its parent lesson, with subscription gating.
pub async fn get_module_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((lesson_id, skill)): Path<(String, String)>,
) -> Result<impl IntoResponse, HandlerError> {
    let user_id = optional_user_id(&headers)?;
    let lesson_id = parse_uuid(&lesson_id)?;
    let skill = parse_skill(&skill)?;
    let fetched = orchestrator::fetch_module(&app_state.lesson, lesson_id, skill, user_id)
        .await
        .map_err(port_failure)?;
    Ok(success(fetched))
}

/// Claim a lesson for the calling user. Idempotent.
pub async fn link_lesson_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(lesson_id): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    let user_id = required_user_id(&headers)?;
    let lesson_id = parse_uuid(&lesson_id)?;
    orchestrator::link_user(&app_state.lesson, lesson_id, user_id)
        .await
        .map_err(port_failure)?;
    Ok(success(json!({ "lessonId": lesson_id, "linked": true })))
}

/// Release a lesson from the calling user. Idempotent.
pub async fn unlink_lesson_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(lesson_id): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    let user_id = required_user_id(&headers)?;
    let lesson_id = parse_uuid(&lesson_id)?;
    orchestrator::unlink_user(&app_state.lesson, lesson_id, user_id)
        .await
        .map_err(port_failure)?;
    Ok(success(json!({ "lessonId": lesson_id, "linked": false })))
}

//=========================================================================================
// Feedback Handler
//=========================================================================================

/// The learner's submission body for a feedback request.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackBody {
    /// One answer per stored question (reading/listening).
    pub answers: Option<Vec<String>>,
    /// The composed text (writing).
    pub response: Option<String>,
    pub language: Option<String>,
}

/// Evaluate a learner submission against a lesson's module for one skill.
/// For `speaking` this summarizes the recorded conversation instead.
pub async fn feedback_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((lesson_id, skill)): Path<(String, String)>,
    Json(body): Json<FeedbackBody>,
) -> Result<impl IntoResponse, HandlerError> {
    let user_id = optional_user_id(&headers)?;
    let lesson_id = parse_uuid(&lesson_id)?;
    let skill = parse_skill(&skill)?;
    let lesson = orchestrator::get_lesson(&app_state.lesson, lesson_id)
        .await
        .map_err(port_failure)?;
    let module_ref = lesson.module_for(skill).ok_or_else(|| {
        failure(
            StatusCode::NOT_FOUND,
            format!("{} module in lesson {} not found", skill, lesson_id),
        )
    })?;

    let input = FeedbackInput {
        module_id: module_ref.module_id,
        user_id,
        answers: body.answers,
        response: body.response,
        language: body.language.unwrap_or_else(|| "german".to_string()),
    };
    let feedback = feedback::evaluate_module(&app_state.lesson, skill, input)
        .await
        .map_err(port_failure)?;
    Ok(success(feedback))
}

//=========================================================================================
// Speaking Conversation Handlers
//=========================================================================================

/// Submit one spoken turn as multipart form data with an `audio` file part.
pub async fn submit_turn_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(module_id): Path<String>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, HandlerError> {
    let user_id = optional_user_id(&headers)?;
    let module_id = parse_uuid(&module_id)?;

    let mut audio: Option<Vec<u8>> = None;
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        failure(
            StatusCode::BAD_REQUEST,
            format!("Failed to read multipart data: {}", e),
        )
    })? {
        if field.name() == Some("audio") || field.file_name().is_some() {
            let bytes = field.bytes().await.map_err(|e| {
                failure(
                    StatusCode::BAD_REQUEST,
                    format!("Failed to read audio bytes: {}", e),
                )
            })?;
            audio = Some(bytes.to_vec());
            break;
        }
    }
    let audio = audio
        .ok_or_else(|| failure(StatusCode::BAD_REQUEST, "Multipart form must include audio"))?;

    let turn = conversation::submit_turn(&app_state.lesson, module_id, user_id, &audio)
        .await
        .map_err(port_failure)?;
    Ok((StatusCode::CREATED, success(turn)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnsQuery {
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

/// Fetch one page of the module's conversation history, newest page first.
pub async fn get_turns_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(module_id): Path<String>,
    Query(query): Query<TurnsQuery>,
) -> Result<impl IntoResponse, HandlerError> {
    let user_id = optional_user_id(&headers)?;
    let module_id = parse_uuid(&module_id)?;
    let page = conversation::get_turns(
        &app_state.lesson,
        module_id,
        user_id,
        query.page,
        query.page_size,
    )
    .await
    .map_err(port_failure)?;
    Ok(success(page))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_path_ids_get_the_error_envelope() {
        let (status, Json(body)) = parse_uuid("not-a-uuid").unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("not-a-uuid"));

        assert!(parse_uuid(&Uuid::new_v4().to_string()).is_ok());
    }

    #[test]
    fn user_id_header_is_optional_but_must_be_well_formed() {
        let mut headers = HeaderMap::new();
        assert_eq!(optional_user_id(&headers).unwrap(), None);

        headers.insert("x-user-id", "garbage".parse().unwrap());
        let (status, Json(body)) = optional_user_id(&headers).unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        let user = Uuid::new_v4();
        headers.insert("x-user-id", user.to_string().parse().unwrap());
        assert_eq!(optional_user_id(&headers).unwrap(), Some(user));
    }
}
