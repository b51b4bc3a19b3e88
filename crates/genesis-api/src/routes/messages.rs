use axum::{
    extract::{Path, State},
    Json,
};
use genesis_llm::Message;
use serde::Serialize;
use std::sync::Arc;

use crate::{auth::Principal, error::ApiResult, state::AppState};

#[derive(Debug, Serialize)]
pub struct ListMessagesResponse {
    pub messages: Vec<Message>,
}

/// Message history as of the latest checkpoint
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(conversation_id): Path<String>,
) -> ApiResult<Json<ListMessagesResponse>> {
    let messages = state
        .conversations
        .history(&conversation_id, principal.id())
        .await?;

    Ok(Json(ListMessagesResponse { messages }))
}
