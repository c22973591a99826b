//! Router, handlers and server startup.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::types::{
    ChatRequest, ChatResponse, ConversationListResponse, ConversationResponse, ErrorResponse,
    HealthResponse,
};
use crate::agent::{AgentError, SearchAgent, DEFAULT_THREAD_ID};
use crate::config::Config;

/// Shared application state.
pub struct AppState {
    pub agent: Arc<SearchAgent>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error_response(status: StatusCode, detail: String) -> ApiError {
    (status, Json(ErrorResponse { detail }))
}

/// Map run failures so callers can tell a model outage from a storage one.
fn agent_error(err: AgentError) -> ApiError {
    let status = match &err {
        AgentError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        AgentError::Model(_) => StatusCode::BAD_GATEWAY,
        AgentError::LoopExceeded { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        AgentError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
    };
    if status.is_server_error() {
        tracing::error!(error = %err, "Agent request failed");
    }
    error_response(status, err.to_string())
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/chat", post(chat))
        .route("/conversations", get(list_conversations))
        .route("/conversations/:thread_id", get(get_conversation))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Build the agent from config and serve until shutdown.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let agent = SearchAgent::from_config(&config)?;
    let state = Arc::new(AppState {
        agent: Arc::new(agent),
    });

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        persistent_store: state.agent.store_is_persistent(),
    })
}

async fn chat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(req) = payload.map_err(|rejection| {
        error_response(rejection.status(), rejection.body_text())
    })?;

    if req.message.trim().is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "message is required".to_string(),
        ));
    }

    let thread_id = req
        .thread_id
        .unwrap_or_else(|| DEFAULT_THREAD_ID.to_string());

    let messages = state
        .agent
        .run(&req.message, &thread_id)
        .await
        .map_err(agent_error)?;

    Ok(Json(ChatResponse {
        thread_id,
        messages,
    }))
}

async fn list_conversations(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ConversationListResponse>, ApiError> {
    let mut threads = state
        .agent
        .list_conversations()
        .await
        .map_err(agent_error)?;
    threads.sort();
    Ok(Json(ConversationListResponse { threads }))
}

async fn get_conversation(
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<String>,
) -> Result<Json<ConversationResponse>, ApiError> {
    let messages = state
        .agent
        .get_conversation(&thread_id)
        .await
        .map_err(agent_error)?;
    Ok(Json(ConversationResponse {
        thread_id,
        messages,
    }))
}
