mod common;

use common::{collect_events, Harness, ScriptedModel};
use genesis_graph::{EngineConfig, EngineError, ErrorCategory, NodeKind, OutputEvent, PipelineState};
use genesis_llm::Role;
use genesis_persist::CheckpointStore;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

#[tokio::test]
async fn test_first_turn_hello() {
    let h = Harness::new(ScriptedModel::replying(&["Hi", " there"]));
    let conv = h.conversation("alice").await;

    let mut handle = h.service.send_message(&conv.id, "alice", "Hello").await.unwrap();
    let events = collect_events(&mut handle).await;
    let report = handle.finish().await.unwrap();

    assert_eq!(
        report.path,
        vec![NodeKind::ValidateInput, NodeKind::InvokeModel, NodeKind::FormatOutput]
    );
    assert!(report.failure.is_none());
    assert_eq!(report.sequence, 1);

    assert_eq!(events.len(), 3);
    assert_eq!(events[0], OutputEvent::Token { content: "Hi".to_string() });
    assert_eq!(events[1], OutputEvent::Token { content: " there".to_string() });
    match &events[2] {
        OutputEvent::Complete { message, checkpoint_id } => {
            assert_eq!(message.content, "Hi there");
            assert_eq!(message.role, Role::Assistant);
            assert_eq!(checkpoint_id, &report.checkpoint_id);
        }
        other => panic!("unexpected event {:?}", other),
    }

    let checkpoint = h.latest(&conv.id).await.unwrap();
    assert_eq!(checkpoint.checkpoint_id, report.checkpoint_id);
    assert!(checkpoint.parent_checkpoint_id.is_none());

    let state = PipelineState::from_snapshot(&checkpoint).unwrap();
    assert_eq!(state.message_history.len(), 2);
    assert_eq!(state.message_history[0].role, Role::User);
    assert_eq!(state.message_history[0].content, "Hello");
    assert_eq!(state.message_history[1].content, "Hi there");
    assert!(state.turn_input.is_none());
    assert!(state.pending_output.is_none());
    assert!(state.failure.is_none());
}

#[tokio::test]
async fn test_empty_input_routes_to_end() {
    let h = Harness::new(ScriptedModel::replying(&["ok"]));
    let conv = h.conversation("alice").await;

    h.service.send_message(&conv.id, "alice", "Hello").await.unwrap().finish().await.unwrap();
    let before = h.latest(&conv.id).await.unwrap();

    let mut handle = h.service.send_message(&conv.id, "alice", "   ").await.unwrap();
    let events = collect_events(&mut handle).await;
    let report = handle.finish().await.unwrap();

    assert_eq!(report.path, vec![NodeKind::ValidateInput]);
    assert_eq!(report.failure.as_ref().map(|f| f.category), Some(ErrorCategory::Validation));
    assert_eq!(h.model.calls(), 1);

    assert_eq!(events.len(), 1);
    assert!(matches!(
        &events[0],
        OutputEvent::Error { category: ErrorCategory::Validation, checkpoint_id: Some(_), .. }
    ));

    let after = h.latest(&conv.id).await.unwrap();
    assert_eq!(after.sequence, 2);
    assert_eq!(after.parent_checkpoint_id.as_deref(), Some(before.checkpoint_id.as_str()));

    let prior = PipelineState::from_snapshot(&before).unwrap();
    let state = PipelineState::from_snapshot(&after).unwrap();
    assert!(state.failure.is_some());
    assert_eq!(state.message_history, prior.message_history);
}

#[tokio::test]
async fn test_mid_stream_failure_keeps_user_turn() {
    let h = Harness::new(ScriptedModel::replying(&["par", "tial", "never"]).failing_after(2));
    let conv = h.conversation("alice").await;

    let mut handle = h.service.send_message(&conv.id, "alice", "Tell me a story").await.unwrap();
    let events = collect_events(&mut handle).await;
    let report = handle.finish().await.unwrap();

    let kinds: Vec<&str> = events.iter().map(|e| e.kind()).collect();
    assert_eq!(kinds, vec!["token", "token", "error"]);
    assert!(matches!(
        &events[2],
        OutputEvent::Error { category: ErrorCategory::Capability, checkpoint_id: Some(_), .. }
    ));
    assert_eq!(report.path, vec![NodeKind::ValidateInput, NodeKind::InvokeModel]);

    let state = PipelineState::from_snapshot(&h.latest(&conv.id).await.unwrap()).unwrap();
    assert_eq!(state.failure.as_ref().map(|f| f.category), Some(ErrorCategory::Capability));
    assert_eq!(state.message_history.len(), 1);
    assert_eq!(state.message_history[0].role, Role::User);
    assert!(state.pending_output.is_none());
}

#[tokio::test]
async fn test_failed_commit_leaves_prior_checkpoint() {
    let h = Harness::new(ScriptedModel::replying(&["fine"]));
    let conv = h.conversation("alice").await;

    h.service.send_message(&conv.id, "alice", "first").await.unwrap().finish().await.unwrap();
    let before = h.latest(&conv.id).await.unwrap();

    h.checkpoints.fail_puts.store(true, Ordering::SeqCst);
    let mut handle = h.service.send_message(&conv.id, "alice", "second").await.unwrap();
    let events = collect_events(&mut handle).await;
    let result = handle.finish().await;

    assert!(matches!(result, Err(EngineError::Persistence(_))));
    assert_eq!(events.first().map(|e| e.kind()), Some("token"));
    assert!(matches!(
        events.last(),
        Some(OutputEvent::Error { category: ErrorCategory::Persistence, checkpoint_id: None, .. })
    ));

    assert_eq!(h.latest(&conv.id).await.unwrap(), before);
}

#[tokio::test]
async fn test_load_failure_skips_pipeline() {
    let h = Harness::new(ScriptedModel::replying(&["unused"]));
    let conv = h.conversation("alice").await;
    h.checkpoints.fail_reads.store(true, Ordering::SeqCst);

    let mut handle = h.service.send_message(&conv.id, "alice", "Hello").await.unwrap();
    let events = collect_events(&mut handle).await;
    let result = handle.finish().await;

    assert_eq!(result.unwrap_err().category(), ErrorCategory::Persistence);
    assert_eq!(h.model.calls(), 0);
    assert_eq!(events.len(), 1);
    h.checkpoints.fail_reads.store(false, Ordering::SeqCst);
    assert!(h.latest(&conv.id).await.is_none());
}

#[tokio::test]
async fn test_same_thread_runs_are_serialized() {
    let gate = Arc::new(Semaphore::new(0));
    let h = Harness::new(ScriptedModel::replying(&["reply"]).gated(gate.clone()));
    let conv = h.conversation("alice").await;

    let first = h.service.send_message(&conv.id, "alice", "one").await.unwrap();
    let second = h.service.send_message(&conv.id, "alice", "two").await.unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(h.model.calls(), 1);

    gate.add_permits(2);
    let first = first.finish().await.unwrap();
    let second = second.finish().await.unwrap();

    assert_eq!(h.model.max_active.load(Ordering::SeqCst), 1);
    assert_eq!((first.sequence, second.sequence), (1, 2));

    let checkpoints = h.checkpoints.inner.list(&conv.id, 10).await.unwrap();
    assert_eq!(checkpoints.len(), 2);
    assert!(checkpoints[1].created_at < checkpoints[0].created_at);

    let state = PipelineState::from_snapshot(&checkpoints[0]).unwrap();
    let contents: Vec<&str> = state.message_history.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["one", "reply", "two", "reply"]);
}

#[tokio::test]
async fn test_pending_limit_rejects_with_busy() {
    let gate = Arc::new(Semaphore::new(0));
    let config = EngineConfig::default().with_max_pending_runs(1);
    let h = Harness::with_config(ScriptedModel::replying(&["reply"]).gated(gate.clone()), config);
    let conv = h.conversation("alice").await;

    let first = h.service.send_message(&conv.id, "alice", "one").await.unwrap();
    let second = h.service.send_message(&conv.id, "alice", "two").await;
    assert!(matches!(second, Err(EngineError::Busy)));

    gate.add_permits(1);
    first.finish().await.unwrap();

    // Slot is free again once the run has committed
    gate.add_permits(1);
    let third = h.service.send_message(&conv.id, "alice", "three").await.unwrap();
    assert_eq!(third.finish().await.unwrap().sequence, 2);
}

#[tokio::test]
async fn test_panicking_run_frees_its_slot() {
    let config = EngineConfig::default().with_max_pending_runs(1);
    let h = Harness::with_config(ScriptedModel::replying(&["reply"]).panicking_once(), config);
    let conv = h.conversation("alice").await;

    let first = h.service.send_message(&conv.id, "alice", "one").await.unwrap();
    assert!(matches!(first.finish().await, Err(EngineError::Shutdown)));
    assert!(h.latest(&conv.id).await.is_none());

    // The thread accepts and commits new turns afterwards
    let second = h.service.send_message(&conv.id, "alice", "two").await.unwrap();
    let report = second.finish().await.unwrap();
    assert_eq!(report.sequence, 1);
    assert_eq!(h.model.calls(), 2);
}

#[tokio::test]
async fn test_different_threads_run_concurrently() {
    let gate = Arc::new(Semaphore::new(0));
    let h = Harness::new(ScriptedModel::replying(&["reply"]).gated(gate.clone()));
    let a = h.conversation("alice").await;
    let b = h.conversation("alice").await;

    let run_a = h.service.send_message(&a.id, "alice", "a").await.unwrap();
    let run_b = h.service.send_message(&b.id, "alice", "b").await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while h.model.active.load(Ordering::SeqCst) < 2 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("both runs should reach the model");

    gate.add_permits(2);
    assert!(run_a.finish().await.is_ok());
    assert!(run_b.finish().await.is_ok());
}

#[tokio::test]
async fn test_disconnected_client_still_commits() {
    let h = Harness::new(ScriptedModel::replying(&["a", "b", "c"]));
    let conv = h.conversation("alice").await;

    let handle = h.service.send_message(&conv.id, "alice", "Hello").await.unwrap();
    let (events, completion) = handle.split();
    drop(events);

    let report = completion.wait().await.unwrap();
    let checkpoint = h.latest(&conv.id).await.unwrap();
    assert_eq!(checkpoint.checkpoint_id, report.checkpoint_id);

    let state = PipelineState::from_snapshot(&checkpoint).unwrap();
    assert_eq!(state.message_history.last().map(|m| m.content.as_str()), Some("abc"));
}

#[tokio::test(start_paused = true)]
async fn test_model_timeout_follows_failure_path() {
    let config = EngineConfig::default().with_model_timeout(Duration::from_secs(5));
    let h = Harness::with_config(ScriptedModel::replying(&["late"]).hanging(), config);
    let conv = h.conversation("alice").await;

    let report = h
        .service
        .send_message(&conv.id, "alice", "Hello")
        .await
        .unwrap()
        .finish()
        .await
        .unwrap();

    let failure = report.failure.unwrap();
    assert_eq!(failure.category, ErrorCategory::Capability);
    assert_eq!(failure.message, "The model did not respond in time");
    assert!(h.latest(&conv.id).await.is_some());
}

#[tokio::test]
async fn test_system_prompt_is_not_persisted() {
    let config = EngineConfig::default().with_system_prompt("You are terse.");
    let h = Harness::with_config(ScriptedModel::replying(&["ok"]), config);
    let conv = h.conversation("alice").await;

    h.service.send_message(&conv.id, "alice", "Hello").await.unwrap().finish().await.unwrap();

    let input = h.model.last_input();
    assert_eq!(input[0].role, Role::System);
    assert_eq!(input[0].content, "You are terse.");
    assert_eq!(input[1].content, "Hello");

    let history = h.service.history(&conv.id, "alice").await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|m| m.role != Role::System));
}

#[tokio::test]
async fn test_non_streaming_capability_emits_single_event() {
    let h = Harness::new(ScriptedModel::replying(&["whole ", "answer"]).non_streaming());
    let conv = h.conversation("alice").await;

    let mut handle = h.service.send_message(&conv.id, "alice", "Hello").await.unwrap();
    let events = collect_events(&mut handle).await;
    handle.finish().await.unwrap();

    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], OutputEvent::Complete { message, .. } if message.content == "whole answer"));
}

#[tokio::test]
async fn test_versioned_reads() {
    let h = Harness::new(ScriptedModel::replying(&["r"]));
    let conv = h.conversation("alice").await;

    let mut reports = Vec::new();
    for input in ["one", "two", "three"] {
        let handle = h.service.send_message(&conv.id, "alice", input).await.unwrap();
        reports.push(handle.finish().await.unwrap());
    }

    let summaries = h.service.checkpoints(&conv.id, "alice", 2).await.unwrap();
    let sequences: Vec<i64> = summaries.iter().map(|s| s.sequence).collect();
    assert_eq!(sequences, vec![3, 2]);

    let snapshot = h
        .service
        .checkpoint(&conv.id, "alice", &reports[0].checkpoint_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(snapshot.checkpoint.sequence, 1);
    assert_eq!(snapshot.state.message_history.len(), 2);

    assert!(h.service.checkpoint(&conv.id, "alice", "missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_history_limit_prunes_old_checkpoints() {
    let config = EngineConfig::default().with_history_limit(2);
    let h = Harness::with_config(ScriptedModel::replying(&["r"]), config);
    let conv = h.conversation("alice").await;

    for input in ["one", "two", "three"] {
        h.service.send_message(&conv.id, "alice", input).await.unwrap().finish().await.unwrap();
    }

    let remaining = h.checkpoints.inner.list(&conv.id, 10).await.unwrap();
    assert_eq!(remaining.len(), 2);
    assert_eq!(remaining[0].sequence, 3);

    let history = h.service.history(&conv.id, "alice").await.unwrap();
    assert_eq!(history.len(), 6);
}
