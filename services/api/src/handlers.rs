//! Axum Handlers for the REST API
//!
//! This module contains the read-only catalog and health endpoints. It uses
//! `utoipa` doc comments to generate OpenAPI documentation.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use titia_core::tool::{ToolConfig, ToolKind, catalog};

use crate::{
    config::Provider,
    models::{ErrorResponse, HealthResponse, ToolSummary},
    state::AppState,
};

pub enum ApiError {
    NotFound(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(ErrorResponse { message })).into_response()
            }
        }
    }
}

/// Report service liveness and the configured provider.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let provider = match state.config.provider {
        Provider::Gemini => "gemini",
        Provider::Offline => "offline",
    };
    Json(HealthResponse {
        status: "ok".to_string(),
        provider: provider.to_string(),
    })
}

/// List every tool a session can be started with.
#[utoipa::path(
    get,
    path = "/tools",
    responses(
        (status = 200, description = "The tool catalog", body = [ToolSummary])
    )
)]
pub async fn list_tools() -> Json<Vec<ToolSummary>> {
    Json(catalog().iter().map(ToolSummary::from).collect())
}

/// Get one tool by its identifier.
#[utoipa::path(
    get,
    path = "/tools/{id}",
    responses(
        (status = 200, description = "Tool details", body = ToolSummary),
        (status = 404, description = "Tool not found", body = ErrorResponse)
    ),
    params(
        ("id" = String, Path, description = "Tool identifier, e.g. FIGMA or C_PROG")
    )
)]
pub async fn get_tool(Path(id): Path<String>) -> Result<Json<ToolSummary>, ApiError> {
    let kind = id
        .parse::<ToolKind>()
        .map_err(|e| ApiError::NotFound(e.to_string()))?;
    Ok(Json(ToolSummary::from(&ToolConfig::for_kind(kind))))
}
