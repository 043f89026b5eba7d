use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::conversation::SessionStore;
use crate::error::SupportError;
use crate::models::Message;
use crate::service::{SupportService, TurnOutcome};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<SupportService>,
    pub sessions: Arc<SessionStore>,
}

impl AppState {
    pub fn new(service: SupportService) -> Self {
        Self {
            service: Arc::new(service),
            sessions: Arc::new(SessionStore::new()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PostMessage {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct SessionCreated {
    pub session_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
pub struct SummaryView {
    pub summary: String,
}

/// JSON error body with a status derived from the error kind.
pub struct ApiError(SupportError);

impl From<SupportError> for ApiError {
    fn from(e: SupportError) -> Self {
        Self(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            SupportError::UnknownSession(_) => StatusCode::NOT_FOUND,
            SupportError::Session(_) => StatusCode::BAD_REQUEST,
            SupportError::Transport(_) | SupportError::MalformedResponse(_) => {
                StatusCode::BAD_GATEWAY
            }
            SupportError::Config(_) | SupportError::Internal(_) | SupportError::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self.0);
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

pub fn router(state: AppState, bearer_token: Option<String>) -> Router {
    let mut router = Router::new()
        .route("/sessions", post(create_session))
        .route("/sessions/:id", get(get_session).delete(end_session))
        .route("/sessions/:id/messages", post(post_message))
        .route("/sessions/:id/summary", post(summarize_session))
        .with_state(state);

    if let Some(expected) = bearer_token {
        router = router.layer(middleware::from_fn_with_state(
            Arc::new(expected),
            require_bearer,
        ));
    }

    router.route("/health", get(|| async { "ok" }))
}

pub async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<SessionCreated>) {
    let session_id = state.sessions.create().await;
    (StatusCode::CREATED, Json(SessionCreated { session_id }))
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<SessionView> {
    let conversation = state.sessions.snapshot(id).await?;
    Ok(Json(SessionView {
        session_id: conversation.id(),
        started_at: conversation.started_at(),
        messages: conversation.all().to_vec(),
    }))
}

pub async fn end_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.sessions.end(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn post_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<PostMessage>,
) -> ApiResult<TurnOutcome> {
    let handle = state.sessions.get(id).await?;
    let mut conversation = handle.lock().await;
    let outcome = state.service.handle_turn(&mut conversation, &body.message).await?;
    Ok(Json(outcome))
}

pub async fn summarize_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<SummaryView> {
    let conversation = state.sessions.snapshot(id).await?;
    let summary = state.service.summarize(&conversation).await?;
    Ok(Json(SummaryView { summary }))
}

async fn require_bearer(
    State(expected): State<Arc<String>>,
    req: Request<Body>,
    next: Next,
) -> impl IntoResponse {
    let headers: &HeaderMap = req.headers();
    let authorized = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {}", expected.as_str()));
    if !authorized {
        return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    }
    next.run(req).await
}
