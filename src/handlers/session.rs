// src/handlers/session.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    engine::{SessionEvent, SessionHandle, SessionRegistry, SessionStart},
    error::AppError,
    models::question::{OptionTag, PublicQuestion},
    state::AppState,
    utils::{jwt::Claims, permissions::ensure_permission},
};

/// DTO for starting or resuming a test session.
#[derive(Debug, Deserialize, Validate)]
pub struct StartSessionRequest {
    #[validate(length(min = 1, max = 64))]
    pub test_id: String,
    /// Existing session to resume. A fresh id is generated when absent.
    #[validate(length(min = 1, max = 64))]
    pub session_id: Option<String>,
    /// Connectivity at start. Defaults to online.
    pub online: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct SelectAnswerRequest {
    pub option: String,
}

#[derive(Debug, Deserialize)]
pub struct NavigateRequest {
    /// Target question index. Out-of-range values are clamped.
    pub index: i64,
}

#[derive(Debug, Deserialize)]
pub struct ConnectivityRequest {
    pub online: bool,
}

/// Looks up a live session owned by the caller.
/// A session of another user is reported as missing.
async fn owned_session(
    registry: &SessionRegistry,
    session_id: &str,
    claims: &Claims,
) -> Result<Arc<SessionHandle>, AppError> {
    let user_id = claims.user_id()?;
    match registry.get(session_id).await {
        Some(handle) if handle.user_id() == user_id => Ok(handle),
        _ => Err(AppError::NotFound("Session not found".to_string())),
    }
}

/// Logs what happens to a session between requests.
fn spawn_event_logger(handle: &SessionHandle) {
    let mut events = handle.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                SessionEvent::TimeExpired { session_id } => {
                    tracing::info!("Session {} ran out of time", session_id)
                }
                SessionEvent::AutoSubmitted { result } => tracing::info!(
                    "Session {} auto-submitted with {}%",
                    result.session_id,
                    result.percentage
                ),
                SessionEvent::AutoSubmitFailed { session_id, error } => {
                    tracing::error!("Session {} could not be auto-submitted: {}", session_id, error)
                }
                SessionEvent::SaveFailed { session_id, error } => {
                    tracing::warn!("Session {} has unsaved progress: {}", session_id, error)
                }
            }
        }
    });
}

/// Starts a test session, or resumes one from its saved progress.
///
/// * Requires `tests.take`.
/// * The test must exist and be active.
/// * A live instance with the same id is exited first so only one copy runs.
pub async fn start_session(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<StartSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    ensure_permission(&claims, "tests.take")?;
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }
    let user_id = claims.user_id()?;

    let survey = state
        .stores
        .catalog
        .survey(&payload.test_id)
        .await?
        .ok_or(AppError::NotFound("Test not found".to_string()))?;

    if !survey.is_open() {
        return Err(AppError::BadRequest("Test is not open".to_string()));
    }

    let session_id = match payload.session_id {
        Some(id) => {
            let live_owner = state.sessions.get(&id).await.map(|live| live.user_id());
            let saved_owner = state.stores.progress.load(&id).await?.map(|saved| saved.user_id);
            if live_owner.into_iter().chain(saved_owner).any(|owner| owner != user_id) {
                return Err(AppError::NotFound("Session not found".to_string()));
            }
            id
        }
        None => Uuid::new_v4().to_string(),
    };

    let questions = state.stores.catalog.questions(&survey.id).await?;
    let public_questions: Vec<PublicQuestion> = questions.iter().map(PublicQuestion::from).collect();

    state.sessions.discard(&session_id).await?;

    let handle = SessionHandle::start(
        SessionStart {
            session_id,
            user_id,
            survey,
            questions,
            online: payload.online.unwrap_or(true),
        },
        state.stores.progress.clone(),
        state.stores.submissions.clone(),
        &state.config.session,
    )
    .await?;
    spawn_event_logger(&handle);

    let handle = state.sessions.insert(handle).await;
    let view = handle.view().await;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "session": view,
            "questions": public_questions,
        })),
    ))
}

/// Current state of a session, with its result once submitted.
pub async fn get_session(
    State(registry): State<Arc<SessionRegistry>>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let handle = owned_session(&registry, &session_id, &claims).await?;
    Ok(Json(json!({
        "session": handle.view().await,
        "result": handle.result(),
    })))
}

pub async fn select_answer(
    State(registry): State<Arc<SessionRegistry>>,
    Extension(claims): Extension<Claims>,
    Path((session_id, index)): Path<(String, usize)>,
    Json(payload): Json<SelectAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let option = OptionTag::parse(&payload.option)
        .ok_or(AppError::BadRequest(format!("Invalid option '{}'", payload.option)))?;

    let handle = owned_session(&registry, &session_id, &claims).await?;
    handle.select_answer(index, option).await?;
    Ok(Json(handle.view().await))
}

pub async fn toggle_review(
    State(registry): State<Arc<SessionRegistry>>,
    Extension(claims): Extension<Claims>,
    Path((session_id, index)): Path<(String, usize)>,
) -> Result<impl IntoResponse, AppError> {
    let handle = owned_session(&registry, &session_id, &claims).await?;
    let marked = handle.toggle_review(index).await?;
    Ok(Json(json!({ "index": index, "marked": marked })))
}

pub async fn navigate(
    State(registry): State<Arc<SessionRegistry>>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<String>,
    Json(payload): Json<NavigateRequest>,
) -> Result<impl IntoResponse, AppError> {
    let handle = owned_session(&registry, &session_id, &claims).await?;
    handle.navigate(payload.index).await?;
    Ok(Json(handle.view().await))
}

/// Reports a connectivity change. Going offline freezes the countdown.
pub async fn set_connectivity(
    State(registry): State<Arc<SessionRegistry>>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<String>,
    Json(payload): Json<ConnectivityRequest>,
) -> Result<impl IntoResponse, AppError> {
    let handle = owned_session(&registry, &session_id, &claims).await?;
    handle.set_online(payload.online).await;
    Ok(Json(handle.view().await))
}

pub async fn save_progress(
    State(registry): State<Arc<SessionRegistry>>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let handle = owned_session(&registry, &session_id, &claims).await?;
    handle.save_now().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Leaves the test without submitting. Progress stays resumable.
pub async fn exit_session(
    State(registry): State<Arc<SessionRegistry>>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let handle = owned_session(&registry, &session_id, &claims).await?;
    handle.exit().await?;
    registry.remove(&session_id).await;
    Ok(StatusCode::NO_CONTENT)
}

/// Submits the attempt and returns the graded result.
///
/// A failed submission keeps the session live so the call can be retried.
pub async fn submit_session(
    State(registry): State<Arc<SessionRegistry>>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let handle = owned_session(&registry, &session_id, &claims).await?;
    let result = handle.submit().await?;
    registry.remove(&session_id).await;
    Ok(Json(result))
}

/// Pauses any live session. Requires `tests.manage_sessions` (checked by middleware).
pub async fn pause_session(
    State(registry): State<Arc<SessionRegistry>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let handle = registry
        .get(&session_id)
        .await
        .ok_or(AppError::NotFound("Session not found".to_string()))?;
    handle.pause().await?;
    Ok(Json(handle.view().await))
}

pub async fn resume_session(
    State(registry): State<Arc<SessionRegistry>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let handle = registry
        .get(&session_id)
        .await
        .ok_or(AppError::NotFound("Session not found".to_string()))?;
    handle.resume().await?;
    Ok(Json(handle.view().await))
}
