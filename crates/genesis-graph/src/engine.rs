use genesis_llm::{Message, Role};
use genesis_persist::{Checkpoint, CheckpointStore, CheckpointSummary};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};

use crate::auth::AccessGrant;
use crate::builder::EngineBuilder;
use crate::error::{EngineError, ErrorCategory, Result};
use crate::graph::CompiledPipeline;
use crate::node::{EventSender, NodeContext, NodeKind};
use crate::types::{EngineConfig, Failure, OutputEvent, PipelineState};

/// Outcome of a committed run
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub run_id: String,
    pub checkpoint_id: String,
    pub sequence: i64,
    /// Set when the run ended through a routed failure; the checkpoint was still written
    pub failure: Option<Failure>,
    pub path: Vec<NodeKind>,
}

/// Resolves once the run's checkpoint is committed or the run failed
#[derive(Debug)]
pub struct RunCompletion {
    rx: oneshot::Receiver<Result<RunReport>>,
}

impl RunCompletion {
    pub async fn wait(self) -> Result<RunReport> {
        self.rx.await.unwrap_or_else(|_| Err(EngineError::Shutdown))
    }
}

/// Handle to a queued run
///
/// Events must be drained or dropped: the engine waits on a full event
/// buffer, but a dropped receiver never stops the run.
#[derive(Debug)]
pub struct RunHandle {
    pub run_id: String,
    pub events: mpsc::Receiver<OutputEvent>,
    completion: RunCompletion,
}

impl RunHandle {
    pub(crate) fn new(
        run_id: String,
        events: mpsc::Receiver<OutputEvent>,
        completion: oneshot::Receiver<Result<RunReport>>,
    ) -> Self {
        Self {
            run_id,
            events,
            completion: RunCompletion { rx: completion },
        }
    }

    pub fn split(self) -> (mpsc::Receiver<OutputEvent>, RunCompletion) {
        (self.events, self.completion)
    }

    /// Discard events and wait for the outcome
    pub async fn finish(self) -> Result<RunReport> {
        drop(self.events);
        self.completion.wait().await
    }
}

/// Point-in-time view of a thread
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateSnapshot {
    pub checkpoint: CheckpointSummary,
    pub state: PipelineState,
}

struct RunJob {
    run_id: String,
    grant: AccessGrant,
    turn_input: String,
    events: EventSender,
    reply: oneshot::Sender<Result<RunReport>>,
}

struct PurgeJob {
    /// Runs in the worker right after the checkpoints are gone
    then: BoxFuture<'static, Result<()>>,
    reply: oneshot::Sender<Result<u64>>,
}

enum Job {
    Run(RunJob),
    Purge(PurgeJob),
}

/// Single-writer queue of one thread; `pending` counts queued and running jobs
struct ThreadQueue {
    tx: mpsc::UnboundedSender<Job>,
    pending: usize,
}

struct EngineInner {
    pipeline: CompiledPipeline,
    checkpoints: Arc<dyn CheckpointStore>,
    config: EngineConfig,
    queues: Mutex<HashMap<String, ThreadQueue>>,
}

/// Orchestration engine
///
/// Runs of different threads proceed concurrently. Runs and purges of the
/// same thread go through one queue drained by a single worker task, so at
/// most one of them touches that thread's checkpoints at a time and they
/// apply in submission order. Every run ends with exactly one checkpoint
/// write, unless loading the previous state or the write itself fails.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    pub fn new(
        pipeline: CompiledPipeline,
        checkpoints: Arc<dyn CheckpointStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                pipeline,
                checkpoints,
                config,
                queues: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Queue one user turn for an authorized thread
    ///
    /// Fails with `Busy` when `max_pending_runs` runs are already queued or
    /// running for the thread.
    pub fn run(&self, grant: &AccessGrant, turn_input: impl Into<String>) -> Result<RunHandle> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let (events_tx, events_rx) = mpsc::channel(self.inner.config.event_buffer);
        let (reply_tx, reply_rx) = oneshot::channel();

        let job = Job::Run(RunJob {
            run_id: run_id.clone(),
            grant: grant.clone(),
            turn_input: turn_input.into(),
            events: events_tx,
            reply: reply_tx,
        });

        self.inner.enqueue(grant.thread_id(), job, true)?;
        tracing::debug!(thread_id = %grant.thread_id(), run_id = %run_id, "run queued");

        Ok(RunHandle::new(run_id, events_rx, reply_rx))
    }

    /// Delete all checkpoints of a thread once earlier queued runs finish,
    /// then run `then` inside the same queue slot
    ///
    /// `then` is skipped when the purge fails. Runs queued behind it start
    /// only after it completes.
    pub async fn purge_then<F>(&self, grant: &AccessGrant, then: F) -> Result<u64>
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job = Job::Purge(PurgeJob {
            then: then.boxed(),
            reply: reply_tx,
        });
        self.inner.enqueue(grant.thread_id(), job, false)?;
        reply_rx.await.unwrap_or_else(|_| Err(EngineError::Shutdown))
    }

    /// Message history of the latest checkpoint
    pub async fn history(&self, grant: &AccessGrant) -> Result<Vec<Message>> {
        match self.inner.checkpoints.get_latest(grant.thread_id()).await? {
            Some(checkpoint) => Ok(PipelineState::from_snapshot(&checkpoint)?.message_history),
            None => Ok(Vec::new()),
        }
    }

    /// Most recent checkpoints, newest first
    pub async fn checkpoint_history(&self, grant: &AccessGrant, limit: usize) -> Result<Vec<CheckpointSummary>> {
        let checkpoints = self.inner.checkpoints.list(grant.thread_id(), limit).await?;
        Ok(checkpoints.iter().map(CheckpointSummary::from).collect())
    }

    /// State as recorded by one specific checkpoint
    pub async fn checkpoint_at(&self, grant: &AccessGrant, checkpoint_id: &str) -> Result<Option<StateSnapshot>> {
        let Some(checkpoint) = self.inner.checkpoints.get(grant.thread_id(), checkpoint_id).await? else {
            return Ok(None);
        };

        Ok(Some(StateSnapshot {
            checkpoint: CheckpointSummary::from(&checkpoint),
            state: PipelineState::from_snapshot(&checkpoint)?,
        }))
    }
}

impl EngineInner {
    fn lock_queues(&self) -> MutexGuard<'_, HashMap<String, ThreadQueue>> {
        self.queues.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a job to the thread's queue, starting a worker if none is running
    fn enqueue(self: &Arc<Self>, thread_id: &str, job: Job, bounded: bool) -> Result<()> {
        let mut queues = self.lock_queues();

        let job = match queues.get_mut(thread_id) {
            Some(queue) if queue.tx.is_closed() => {
                tracing::warn!(thread_id, "thread worker stopped, starting a new one");
                job
            }
            Some(queue) => {
                if bounded && queue.pending >= self.config.max_pending_runs {
                    tracing::warn!(thread_id, pending = queue.pending, "run rejected, thread busy");
                    return Err(EngineError::Busy);
                }
                match queue.tx.send(job) {
                    Ok(()) => {
                        queue.pending += 1;
                        return Ok(());
                    }
                    // Worker is gone; replace it below
                    Err(mpsc::error::SendError(job)) => job,
                }
            }
            None => job,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        if tx.send(job).is_err() {
            return Err(EngineError::Shutdown);
        }
        queues.insert(thread_id.to_string(), ThreadQueue { tx, pending: 1 });
        drop(queues);

        let inner = Arc::clone(self);
        let thread_id = thread_id.to_string();
        tokio::spawn(async move { inner.drain(thread_id, rx).await });

        Ok(())
    }

    async fn drain(self: Arc<Self>, thread_id: String, mut rx: mpsc::UnboundedReceiver<Job>) {
        loop {
            // Senders enqueue under the same lock, so an empty queue observed
            // here stays empty until the entry is removed
            let job = {
                let mut queues = self.lock_queues();
                match rx.try_recv() {
                    Ok(job) => job,
                    Err(_) => {
                        queues.remove(&thread_id);
                        return;
                    }
                }
            };

            match job {
                Job::Run(job) => {
                    let RunJob {
                        run_id,
                        grant,
                        turn_input,
                        events,
                        reply,
                    } = job;
                    let run = self.execute_run(&thread_id, run_id.clone(), grant, turn_input, events);
                    let result = match AssertUnwindSafe(run).catch_unwind().await {
                        Ok(result) => result,
                        Err(_) => {
                            tracing::error!(thread_id = %thread_id, run_id = %run_id, "run panicked");
                            Err(EngineError::Shutdown)
                        }
                    };
                    self.release(&thread_id);
                    let _ = reply.send(result);
                }
                Job::Purge(job) => {
                    let result = self.execute_purge(&thread_id, job.then).await;
                    self.release(&thread_id);
                    let _ = job.reply.send(result);
                }
            }
        }
    }

    async fn execute_purge(&self, thread_id: &str, then: BoxFuture<'static, Result<()>>) -> Result<u64> {
        let removed = match self.checkpoints.delete_thread(thread_id).await {
            Ok(removed) => removed,
            Err(e) => {
                tracing::error!(thread_id, error = %e, "checkpoint purge failed");
                return Err(e.into());
            }
        };
        tracing::info!(thread_id, removed, "checkpoints purged");

        then.await?;
        Ok(removed)
    }

    /// Free the job's slot before its caller is notified
    fn release(&self, thread_id: &str) {
        if let Some(queue) = self.lock_queues().get_mut(thread_id) {
            queue.pending = queue.pending.saturating_sub(1);
        }
    }

    async fn execute_run(
        &self,
        thread_id: &str,
        run_id: String,
        grant: AccessGrant,
        turn_input: String,
        events: EventSender,
    ) -> Result<RunReport> {
        let ctx = NodeContext { run_id, events };

        let result = self.run_pipeline(thread_id, &grant, turn_input, &ctx).await;

        if let Err(e) = &result {
            tracing::error!(thread_id, run_id = %ctx.run_id, error = %e, "run failed without a checkpoint");
            ctx.emit(OutputEvent::Error {
                category: e.category(),
                message: e.public_message(),
                checkpoint_id: None,
            })
            .await;
        }

        result
    }

    async fn run_pipeline(
        &self,
        thread_id: &str,
        grant: &AccessGrant,
        turn_input: String,
        ctx: &NodeContext,
    ) -> Result<RunReport> {
        let started = Instant::now();
        tracing::info!(thread_id, run_id = %ctx.run_id, "run started");

        // The conversation may have been deleted while this run was queued
        grant.revalidate().await?;

        let parent = self.checkpoints.get_latest(thread_id).await?;
        let mut state = PipelineState::resume(parent.as_ref(), grant.thread_context())?;
        state.turn_input = Some(turn_input);

        let path = self.pipeline.execute(&mut state, ctx).await?;

        let checkpoint = Checkpoint::next(thread_id, parent.as_ref(), ctx.run_id.clone(), state.to_snapshot()?);
        let checkpoint_id = checkpoint.checkpoint_id.clone();
        let sequence = checkpoint.sequence;
        self.checkpoints.put(checkpoint).await?;

        tracing::info!(
            thread_id,
            run_id = %ctx.run_id,
            checkpoint_id = %checkpoint_id,
            sequence,
            failed = state.is_failed(),
            duration_ms = started.elapsed().as_millis() as u64,
            "checkpoint committed"
        );

        self.apply_retention(thread_id).await;

        let reply = state
            .message_history
            .last()
            .filter(|m| m.role == Role::Assistant);

        let event = match (&state.failure, reply) {
            (Some(failure), _) => OutputEvent::Error {
                category: failure.category,
                message: failure.message.clone(),
                checkpoint_id: Some(checkpoint_id.clone()),
            },
            (None, Some(message)) => OutputEvent::Complete {
                message: message.clone(),
                checkpoint_id: checkpoint_id.clone(),
            },
            (None, None) => OutputEvent::Error {
                category: ErrorCategory::Capability,
                message: "The model produced no reply".to_string(),
                checkpoint_id: Some(checkpoint_id.clone()),
            },
        };
        ctx.emit(event).await;

        Ok(RunReport {
            run_id: ctx.run_id.clone(),
            checkpoint_id,
            sequence,
            failure: state.failure,
            path,
        })
    }

    async fn apply_retention(&self, thread_id: &str) {
        let Some(limit) = self.config.history_limit else {
            return;
        };
        match self.checkpoints.prune(thread_id, limit).await {
            Ok(0) => {}
            Ok(removed) => tracing::debug!(thread_id, removed, "old checkpoints pruned"),
            Err(e) => tracing::warn!(thread_id, error = %e, "checkpoint pruning failed"),
        }
    }
}
