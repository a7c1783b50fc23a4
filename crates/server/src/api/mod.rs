//! # HTTP API
//!
//! Router assembly, shared application state and the OpenAPI document.

pub mod agents;
pub mod health;
pub mod settings;

use axum::{
    body::Body,
    http::{header, HeaderValue, Method, Response, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;

use waypoint_core::swarm::{Coordinator, ProgressBridge};

use crate::config::{PersistedConfig, Settings};

/// Application state shared by all handlers
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Coordinator,
    pub bridge: ProgressBridge,
    pub settings: Arc<Settings>,
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Waypoint API",
        version = "1.0.0",
        description = "Query-answering pipeline with live progress streaming"
    ),
    paths(
        agents::run_agents,
        agents::get_status,
        health::health,
        settings::get_config,
        settings::update_config
    ),
    components(schemas(
        agents::RunRequest,
        agents::ApiError,
        health::HealthResponse,
        Settings,
        PersistedConfig
    )),
    tags(
        (name = "agents", description = "Pipeline runs and status"),
        (name = "config", description = "Configuration"),
        (name = "health", description = "Liveness")
    )
)]
pub struct ApiDoc;

async fn serve_openapi() -> impl IntoResponse {
    match ApiDoc::openapi().to_json() {
        Ok(spec) => Response::builder()
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(spec))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response()),
        Err(e) => {
            tracing::error!("Failed to render OpenAPI document: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PATCH])
        .allow_headers(Any)
}

/// Build the full application router
pub fn router(state: AppState) -> Router {
    let agent_routes = Router::new()
        .route("/run", axum::routing::post(agents::run_agents))
        .route("/status", get(agents::get_status));

    Router::new()
        .nest("/api/v1/agents", agent_routes)
        .route("/api/v1/health", get(health::health))
        .route(
            "/api/v1/config",
            get(settings::get_config).patch(settings::update_config),
        )
        .route("/api/v1/openapi.json", get(serve_openapi))
        .layer(cors_layer(&state.settings.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
