//! HTTP endpoints
//!
//! REST surface for health checks and session inspection; the chat itself
//! runs over the WebSocket route.

use axum::{
    extract::{Path, State},
    http::{HeaderValue, Method, StatusCode},
    routing::{delete, get},
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::websocket::ws_handler;

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let cors_layer = build_cors_layer(
        &state.config.server.cors_origins,
        state.config.server.cors_enabled,
    );

    Router::new()
        .route("/", get(root))
        // Session endpoints
        .route("/api/sessions", get(list_sessions))
        .route("/api/sessions/:id", get(get_session))
        .route("/api/sessions/:id", delete(delete_session))
        .route("/api/sessions/:id/messages", get(session_messages))
        .route("/api/sessions/:id/events", get(session_events))
        .route("/api/sessions/:id/customer", get(session_customer))
        // Health check
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        // WebSocket
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
}

/// Build the CORS layer from configured origins.
///
/// - Disabled = permissive (dev only)
/// - No valid origins configured = localhost:3000 fallback
fn build_cors_layer(origins: &[String], enabled: bool) -> CorsLayer {
    if !enabled {
        tracing::warn!("CORS is disabled - allowing all origins (NOT FOR PRODUCTION)");
        return CorsLayer::permissive();
    }

    let parsed_origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!("Invalid CORS origin: {}", origin);
                None
            })
        })
        .collect();

    if parsed_origins.is_empty() {
        tracing::info!("No valid CORS origins configured, defaulting to localhost:3000");
        return CorsLayer::new()
            .allow_origin("http://localhost:3000".parse::<HeaderValue>().unwrap())
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers(Any);
    }

    tracing::info!("CORS configured with {} origins", parsed_origins.len());
    CorsLayer::new()
        .allow_origin(parsed_origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
        .allow_credentials(true)
}

/// Service welcome
async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "service": "sales-agent",
        "version": env!("CARGO_PKG_VERSION"),
        "websocket": "/ws",
    }))
}

/// List live sessions
async fn list_sessions(State(state): State<AppState>) -> Json<serde_json::Value> {
    let sessions = state.sessions.list();
    Json(serde_json::json!({
        "sessions": sessions,
        "count": sessions.len(),
    }))
}

/// Get live session info
async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let session = state.sessions.get(&id).ok_or(StatusCode::NOT_FOUND)?;
    let session_state = session.state.lock().await;

    Ok(Json(serde_json::json!({
        "session_id": session.id,
        "active": session.is_active(),
        "current_node_id": session_state.current_node_id,
        "turn_count": session_state.turn_count(),
        "age_secs": session.age().as_secs(),
    })))
}

/// Delete a live session
async fn delete_session(State(state): State<AppState>, Path(id): Path<String>) -> StatusCode {
    state.sessions.remove(&id);
    StatusCode::NO_CONTENT
}

/// Stored transcript for a session (also serves past sessions)
async fn session_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    match state.persistence.messages.messages_for_session(&id).await {
        Ok(messages) => Ok(Json(serde_json::json!({
            "session_id": id,
            "count": messages.len(),
            "messages": messages,
        }))),
        Err(e) => {
            tracing::error!(session_id = %id, error = %e, "Failed to read messages");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Stored events for a session, newest first
async fn session_events(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    match state.persistence.events.events_for_session(&id).await {
        Ok(events) => Ok(Json(serde_json::json!({
            "session_id": id,
            "count": events.len(),
            "events": events,
        }))),
        Err(e) => {
            tracing::error!(session_id = %id, error = %e, "Failed to read events");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Stored customer record for a session
async fn session_customer(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    match state.persistence.customers.customer_for_session(&id).await {
        Ok(Some(customer)) => Ok(Json(serde_json::json!(customer))),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!(session_id = %id, error = %e, "Failed to read customer");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Health check
async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "sessions": state.sessions.count(),
        "max_sessions": state.config.server.max_sessions,
    }))
}

/// Readiness check: the conversation graph must be loaded
async fn readiness_check(
    State(state): State<AppState>,
) -> (StatusCode, Json<serde_json::Value>) {
    let nodes = state.orchestrator.graph().len();
    let ready = nodes > 0;

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(serde_json::json!({
            "ready": ready,
            "graph_nodes": nodes,
        })),
    )
}
