use axum::{
    extract::{Path, Query, State},
    Json,
};
use genesis_graph::StateSnapshot;
use genesis_persist::CheckpointSummary;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    auth::Principal,
    error::{ApiError, ApiResult},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct ListCheckpointsQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    20
}

#[derive(Debug, Serialize)]
pub struct ListCheckpointsResponse {
    pub checkpoints: Vec<CheckpointSummary>,
}

/// Checkpoint history, newest first
pub async fn list_checkpoints(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(conversation_id): Path<String>,
    Query(query): Query<ListCheckpointsQuery>,
) -> ApiResult<Json<ListCheckpointsResponse>> {
    let checkpoints = state
        .conversations
        .checkpoints(&conversation_id, principal.id(), query.limit.clamp(1, 100))
        .await?;

    Ok(Json(ListCheckpointsResponse { checkpoints }))
}

/// Full pipeline state recorded by one checkpoint
pub async fn get_checkpoint(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path((conversation_id, checkpoint_id)): Path<(String, String)>,
) -> ApiResult<Json<StateSnapshot>> {
    state
        .conversations
        .checkpoint(&conversation_id, principal.id(), &checkpoint_id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}
