//! HTTP server for the travel chat API

use crate::agent::TravelAssistant;
use crate::config::Config;
use crate::core::{spawn_sweeper, ChatError, InMemorySessionStore, SessionStore};
use crate::llm::{LlmProvider, Message, OllamaProvider};
use crate::services::{OpenWeatherClient, WeatherProvider};
use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

pub const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    env!("TRAVEL_ASSISTANT_VERSION_SUFFIX")
);

/// Shared application state
pub struct AppState {
    assistant: TravelAssistant,
    /// Used for `/models`; absent when the provider is not an Ollama server
    ollama: Option<OllamaProvider>,
    history_view: usize,
}

impl AppState {
    pub fn new(assistant: TravelAssistant, history_view: usize) -> Self {
        Self {
            assistant,
            ollama: None,
            history_view,
        }
    }

    pub fn with_ollama(mut self, ollama: OllamaProvider) -> Self {
        self.ollama = Some(ollama);
        self
    }
}

/// Request for chat
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest {
    #[serde(default)]
    message: String,
    #[serde(default)]
    session_id: Option<String>,
}

/// Response for chat
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatResponse {
    reply: String,
    session_id: String,
    message_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionView<'a> {
    session_id: &'a str,
    message_count: usize,
    history: &'a [Message],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: String,
    version: String,
    model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    ollama_reachable: Option<bool>,
}

/// Build the API router over `state`
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/models", get(list_models))
        .route("/chat", post(handle_chat))
        .route("/new-chat", post(new_chat))
        .route("/session/:id", get(get_session).delete(delete_session))
        .route("/cancel/:id", post(cancel_request))
        .route("/status/:id", get(request_status))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Wire the assistant from `config` and serve until the process exits
pub async fn run_http_server(config: Config) -> Result<()> {
    let ollama = OllamaProvider::new(&config.llm);
    let llm: Arc<dyn LlmProvider> = Arc::new(ollama.clone());
    let weather: Arc<dyn WeatherProvider> = Arc::new(OpenWeatherClient::new(&config.weather));
    let sessions: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());

    let sweeper = spawn_sweeper(
        Arc::clone(&sessions),
        config.session.sweep_interval(),
        config.session.max_age(),
    );

    let assistant = TravelAssistant::from_config(&config, llm, weather, sessions);
    let state = Arc::new(
        AppState::new(assistant, config.session.history_view).with_ollama(ollama),
    );
    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!(
        "Travel assistant {} listening on {} (model {} at {})",
        VERSION,
        addr,
        config.llm.model,
        config.llm.base_url
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let served = axum::serve(listener, app).await;
    sweeper.abort();
    served?;

    Ok(())
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let ollama_reachable = match state.ollama.as_ref() {
        Some(ollama) => Some(ollama.is_available().await),
        None => None,
    };
    Json(HealthResponse {
        status: "ok".to_string(),
        version: VERSION.to_string(),
        model: state.assistant.provider().model().to_string(),
        ollama_reachable,
    })
}

async fn list_models(State(state): State<Arc<AppState>>) -> Response {
    let Some(ollama) = state.ollama.as_ref() else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "Model listing is not available" })),
        )
            .into_response();
    };

    match ollama.list_models().await {
        Ok(models) => (StatusCode::OK, Json(json!({ "models": models }))).into_response(),
        Err(e) => {
            tracing::error!("Failed to list models: {}", e);
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": "Failed to list models", "details": e.to_string() })),
            )
                .into_response()
        }
    }
}

async fn handle_chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Response {
    tracing::debug!(
        "Chat request: session={:?}, {} chars",
        req.session_id,
        req.message.len()
    );

    match state
        .assistant
        .chat(req.session_id.as_deref(), &req.message)
        .await
    {
        Ok(outcome) => (
            StatusCode::OK,
            Json(ChatResponse {
                reply: outcome.reply,
                session_id: outcome.session_id,
                message_count: outcome.message_count,
            }),
        )
            .into_response(),
        Err(e) => chat_error_response(e),
    }
}

fn chat_error_response(err: ChatError) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = match &err {
        ChatError::EmptyMessage => json!({ "error": err.label() }),
        ChatError::Cancelled => json!({ "error": err.label(), "cancelled": true }),
        ChatError::Timeout(_) | ChatError::Llm(_) => {
            tracing::error!("Chat error: {}", err);
            json!({ "error": err.label(), "details": err.to_string() })
        }
    };
    (status, Json(body)).into_response()
}

async fn new_chat(State(state): State<Arc<AppState>>) -> Response {
    let session = state.assistant.new_session();
    (StatusCode::OK, Json(json!({ "sessionId": session.id }))).into_response()
}

async fn get_session(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    let Some(session) = state.assistant.get_session(&id) else {
        return session_not_found();
    };
    let start = session.turns.len().saturating_sub(state.history_view);
    (
        StatusCode::OK,
        Json(SessionView {
            session_id: &session.id,
            message_count: session.message_count(),
            history: &session.turns[start..],
        }),
    )
        .into_response()
}

async fn delete_session(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match state.assistant.delete_session(&id) {
        Some(true) => (
            StatusCode::OK,
            Json(json!({ "message": "Session deleted", "cancelled": true })),
        )
            .into_response(),
        Some(false) => {
            (StatusCode::OK, Json(json!({ "message": "Session deleted" }))).into_response()
        }
        None => session_not_found(),
    }
}

async fn cancel_request(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    if state.assistant.cancel(&id) {
        (
            StatusCode::OK,
            Json(json!({ "message": "Request cancelled", "cancelled": true })),
        )
            .into_response()
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "No active request for this session" })),
        )
            .into_response()
    }
}

async fn request_status(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    (StatusCode::OK, Json(state.assistant.request_status(&id))).into_response()
}

fn session_not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Session not found" })),
    )
        .into_response()
}
