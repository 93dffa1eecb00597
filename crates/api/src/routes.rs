use std::path::PathBuf;
use std::sync::Arc;

use assess::{AnalysisReport, AnalysisRun};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, patch, post},
    Json, Router,
};
use extract::RiskFinding;
use ingest::{AttachedDocument, DocumentId};
use pipeline::MetricsSnapshot;
use serde::{Deserialize, Serialize};
use session::{ClientRecord, ClientUpdate, Message, SessionError, SessionState, SessionStore};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::error::ApiError;
use crate::state::AppState;

type ApiResult<T> = Result<T, ApiError>;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/config", get(get_config))
        .route("/stats", get(get_stats))
        .route("/clients", get(list_clients).post(add_client))
        .route("/clients/:id", patch(update_client).delete(remove_client))
        .route("/clients/:id/select", post(select_client))
        .route("/session", get(get_session))
        .route("/documents", post(attach_document))
        .route("/documents/:id", delete(remove_document))
        .route("/documents/:id/toggle", post(toggle_document))
        .route("/chat", post(chat))
        .route("/analysis", post(run_analysis))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    ollama: String,
    model: String,
    model_available: bool,
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let model = state.ollama.model().to_string();
    let (ollama, model_available) = match state.ollama.list_models().await {
        Ok(models) => ("ok".to_string(), models.iter().any(|m| *m == model)),
        Err(e) => (format!("error: {e:#}"), false),
    };

    Json(HealthResponse {
        ollama,
        model,
        model_available,
    })
}

async fn get_config(State(state): State<Arc<AppState>>) -> Json<AppConfig> {
    Json(state.config.clone())
}

async fn get_stats(State(state): State<Arc<AppState>>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClientsResponse {
    clients: Vec<ClientRecord>,
    active_client_id: Option<String>,
}

async fn list_clients(State(state): State<Arc<AppState>>) -> Json<ClientsResponse> {
    let workspace = state.workspace.lock().await;
    Json(ClientsResponse {
        clients: workspace.roster.clients().to_vec(),
        active_client_id: workspace.roster.active_id().map(str::to_string),
    })
}

#[derive(Deserialize)]
struct AddClientRequest {
    name: String,
}

/// Adds the client and opens its session.
async fn add_client(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AddClientRequest>,
) -> ApiResult<(StatusCode, Json<ClientRecord>)> {
    let mut workspace = state.workspace.lock().await;
    let record = workspace.roster.add_client(&req.name)?.clone();
    workspace.sessions.select_client(&record.id)?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn update_client(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(update): Json<ClientUpdate>,
) -> ApiResult<Json<ClientRecord>> {
    let mut workspace = state.workspace.lock().await;
    let record = workspace.roster.update_client(&id, update)?.clone();
    Ok(Json(record))
}

async fn remove_client(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let mut guard = state.workspace.lock().await;
    let workspace = &mut *guard;

    workspace.roster.remove_client(&id)?;
    workspace.sessions.delete_client(&id)?;

    if workspace.sessions.current().is_none()
        && let Some(next) = workspace.roster.active_id()
    {
        workspace.sessions.select_client(next)?;
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn select_client(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<SessionView>> {
    let mut guard = state.workspace.lock().await;
    let workspace = &mut *guard;

    workspace.roster.set_active(&id)?;
    workspace.sessions.select_client(&id)?;
    session_view(&workspace.sessions)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DocumentView {
    id: DocumentId,
    name: String,
    is_active: bool,
    summarized: bool,
    characters: usize,
}

impl DocumentView {
    fn new(doc: &AttachedDocument, summarized: bool) -> Self {
        Self {
            id: doc.id,
            name: doc.name.clone(),
            is_active: doc.is_active,
            summarized,
            characters: doc.raw_text.chars().count(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionView {
    client_id: String,
    state: SessionState,
    documents: Vec<DocumentView>,
    chat_transcript: Vec<Message>,
    last_analysis: Vec<RiskFinding>,
}

fn session_view(sessions: &SessionStore) -> ApiResult<Json<SessionView>> {
    let session = sessions.current().ok_or(SessionError::NoActiveClient)?;
    Ok(Json(SessionView {
        client_id: session.client_id.clone(),
        state: sessions.state(),
        documents: session
            .documents
            .iter()
            .map(|doc| DocumentView::new(doc, session.summaries.contains(&doc.id)))
            .collect(),
        chat_transcript: session.chat_transcript.clone(),
        last_analysis: session.last_analysis.clone(),
    }))
}

async fn get_session(State(state): State<Arc<AppState>>) -> ApiResult<Json<SessionView>> {
    let workspace = state.workspace.lock().await;
    session_view(&workspace.sessions)
}

#[derive(Deserialize)]
struct AttachRequest {
    path: String,
}

/// Nothing is added when text extraction fails.
async fn attach_document(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AttachRequest>,
) -> ApiResult<(StatusCode, Json<DocumentView>)> {
    let path = PathBuf::from(&req.path);
    let doc = ingest::attach_file(&path).await?;
    let view = DocumentView::new(&doc, false);

    state.workspace.lock().await.sessions.add_document(doc)?;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn remove_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<DocumentId>,
) -> ApiResult<StatusCode> {
    state.workspace.lock().await.sessions.remove_document(id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ToggleResponse {
    id: DocumentId,
    is_active: bool,
}

async fn toggle_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<DocumentId>,
) -> ApiResult<Json<ToggleResponse>> {
    let is_active = state.workspace.lock().await.sessions.toggle_document(id)?;
    Ok(Json(ToggleResponse { id, is_active }))
}

#[derive(Deserialize)]
struct ChatRequest {
    message: String,
}

/// The user message is stored before the model call, the reply after it.
async fn chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> ApiResult<Json<Message>> {
    let text = req.message.trim();
    if text.is_empty() {
        return Err(ApiError::BadRequest("Message must not be empty".to_string()));
    }

    let (client_id, transcript) = {
        let mut workspace = state.workspace.lock().await;
        workspace.sessions.push_message(Message::user(text))?;
        let session = workspace
            .sessions
            .current()
            .ok_or(SessionError::NoActiveClient)?;
        (session.client_id.clone(), session.transcript_for_model())
    };

    let reply = state
        .assistant
        .reply(&transcript)
        .await
        .map_err(|e| ApiError::Upstream(format!("{e:#}")))?;
    let message = Message::bot(reply);

    let mut workspace = state.workspace.lock().await;
    if workspace.sessions.current_client_id() == Some(client_id.as_str()) {
        workspace.sessions.push_message(message.clone())?;
    } else {
        tracing::warn!(client_id = %client_id, "Client switched during chat, reply not stored");
    }
    Ok(Json(message))
}

/// The workspace lock is released while the model is working.
async fn run_analysis(State(state): State<Arc<AppState>>) -> ApiResult<Json<AnalysisReport>> {
    let Ok(_running) = state.analysis_lock.try_lock() else {
        return Err(ApiError::Conflict("An analysis is already running".to_string()));
    };

    let (client_id, documents, summaries, metadata) = {
        let workspace = state.workspace.lock().await;
        let session = workspace
            .sessions
            .current()
            .ok_or(SessionError::NoActiveClient)?;
        let metadata = workspace
            .roster
            .get(&session.client_id)
            .map(ClientRecord::metadata)
            .unwrap_or_default();
        (
            session.client_id.clone(),
            session.documents.clone(),
            session.summaries.detached(),
            metadata,
        )
    };

    let mut run = AnalysisRun::new(&documents);
    let report = state.analyzer.run(&mut run, &summaries, &metadata).await;

    state
        .workspace
        .lock()
        .await
        .sessions
        .record_analysis(&client_id, report.findings.clone(), &summaries)?;

    Ok(Json(report))
}
