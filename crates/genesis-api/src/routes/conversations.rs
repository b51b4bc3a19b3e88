use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use genesis_persist::ConversationRecord;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{auth::Principal, error::ApiResult, state::AppState};

const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CreateConversationRequest {
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RenameConversationRequest {
    pub title: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationResponse {
    pub conversation_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ConversationRecord> for ConversationResponse {
    fn from(record: ConversationRecord) -> Self {
        Self {
            conversation_id: record.id,
            title: record.title,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListConversationsQuery {
    #[serde(default)]
    pub skip: u64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    20
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListConversationsResponse {
    pub conversations: Vec<ConversationResponse>,
    pub has_more: bool,
}

/// Create a conversation owned by the caller
///
/// Only metadata is written; execution state appears with the first message.
pub async fn create_conversation(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    body: Option<Json<CreateConversationRequest>>,
) -> ApiResult<(StatusCode, Json<ConversationResponse>)> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let record = state
        .conversations
        .create(principal.id(), req.title.as_deref())
        .await?;

    Ok((StatusCode::CREATED, Json(record.into())))
}

/// List the caller's conversations, most recently active first
pub async fn list_conversations(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Query(query): Query<ListConversationsQuery>,
) -> ApiResult<Json<ListConversationsResponse>> {
    let limit = query.limit.clamp(1, MAX_PAGE_SIZE);

    let records = state
        .conversations
        .list(principal.id(), query.skip, limit)
        .await?;

    let has_more = records.len() as i64 == limit;
    Ok(Json(ListConversationsResponse {
        conversations: records.into_iter().map(ConversationResponse::from).collect(),
        has_more,
    }))
}

pub async fn get_conversation(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(conversation_id): Path<String>,
) -> ApiResult<Json<ConversationResponse>> {
    let record = state
        .conversations
        .get(&conversation_id, principal.id())
        .await?;

    Ok(Json(record.into()))
}

pub async fn rename_conversation(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(conversation_id): Path<String>,
    Json(req): Json<RenameConversationRequest>,
) -> ApiResult<Json<ConversationResponse>> {
    let record = state
        .conversations
        .rename(&conversation_id, principal.id(), &req.title)
        .await?;

    Ok(Json(record.into()))
}

/// Delete a conversation together with its execution state
pub async fn delete_conversation(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(conversation_id): Path<String>,
) -> ApiResult<StatusCode> {
    state
        .conversations
        .delete(&conversation_id, principal.id())
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
