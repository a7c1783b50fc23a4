//! # Agents API
//!
//! `POST /run` streams one query's progress as server-sent events;
//! `GET /status` returns the latest status per entity.

use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tokio_stream::wrappers::ReceiverStream;
use utoipa::ToSchema;

use waypoint_core::swarm::ProgressEvent;

use super::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct RunRequest {
    /// Natural-language question
    pub query: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiError {
    pub error: String,
}

impl ApiError {
    pub fn response(status: StatusCode, error: impl Into<String>) -> (StatusCode, Json<ApiError>) {
        (status, Json(ApiError { error: error.into() }))
    }
}

fn to_sse(event: ProgressEvent) -> Result<Event, Infallible> {
    let sse = Event::default().event(event.event_name());
    Ok(sse.json_data(&event).unwrap_or_else(|e| {
        tracing::error!("Failed to encode progress event: {}", e);
        Event::default().event("error").data(
            serde_json::json!({"type": "error", "error_message": e.to_string()}).to_string(),
        )
    }))
}

fn event_stream(state: &AppState, query: &str) -> impl Stream<Item = Result<Event, Infallible>> {
    ReceiverStream::new(state.bridge.stream(query)).map(to_sse)
}

/// Run the pipeline for a query, streaming progress
#[utoipa::path(
    post,
    path = "/api/v1/agents/run",
    tag = "agents",
    request_body = RunRequest,
    responses(
        (status = 200, description = "text/event-stream of start, agent_update, then complete or error"),
        (status = 400, description = "Empty query", body = ApiError)
    )
)]
pub async fn run_agents(State(state): State<AppState>, Json(req): Json<RunRequest>) -> Response {
    let query = req.query.trim();
    if query.is_empty() {
        return ApiError::response(StatusCode::BAD_REQUEST, "query must not be empty").into_response();
    }
    tracing::info!(query, "Run requested");

    Sse::new(event_stream(&state, query))
        .keep_alive(KeepAlive::default())
        .into_response()
}

/// Latest status per entity
#[utoipa::path(
    get,
    path = "/api/v1/agents/status",
    tag = "agents",
    responses(
        (status = 200, description = "JSON object mapping entity name to its latest status")
    )
)]
pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.coordinator.registry().snapshot())
}
