use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub services: HashMap<String, String>,
}

/// Health check endpoint
///
/// Reports `degraded` when the metadata store cannot be reached.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let mut services = HashMap::new();

    let metadata = match state.conversations.list("_health_check", 0, 1).await {
        Ok(_) => "connected",
        Err(e) => {
            tracing::warn!(error = %e, "metadata store health check failed");
            "disconnected"
        }
    };
    services.insert("metadata_store".to_string(), metadata.to_string());
    services.insert("model".to_string(), state.config.llm.model.clone());

    let status = if metadata == "connected" { "healthy" } else { "degraded" };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        services,
    })
}
