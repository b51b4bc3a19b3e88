use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::stream::{Stream, StreamExt};
use genesis_graph::OutputEvent;
use serde::Deserialize;
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;

use crate::{auth::Principal, error::ApiResult, state::AppState};

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

/// Run one turn and stream its events as Server-Sent Events
///
/// Event names are `token`, `complete` and `error`; each data payload is the
/// JSON form of the event. Authorization and queue admission happen before
/// the stream opens, so they surface as plain HTTP errors. Closing the
/// connection does not cancel the turn.
pub async fn send_message_stream(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(conversation_id): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, axum::Error>>>> {
    let handle = state
        .conversations
        .send_message(&conversation_id, principal.id(), req.content)
        .await?;

    tracing::info!(
        thread_id = %conversation_id,
        owner_id = %principal.id(),
        run_id = %handle.run_id,
        "streaming turn"
    );

    // the completion is tracked by the service; only events are forwarded
    let (events, _completion) = handle.split();
    let sse_stream = ReceiverStream::new(events).map(|event| to_sse_event(&event));

    Ok(Sse::new(sse_stream).keep_alive(KeepAlive::default()))
}

fn to_sse_event(event: &OutputEvent) -> Result<Event, axum::Error> {
    Event::default().event(event.kind()).json_data(event)
}
