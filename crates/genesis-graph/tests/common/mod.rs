#![allow(dead_code)]

use async_trait::async_trait;
use genesis_graph::{ConversationService, Engine, EngineConfig, OutputEvent, RunHandle};
use genesis_llm::{CapabilityError, Message, ModelCapability, Result as CapabilityResult, TokenStream};
use genesis_persist::{
    Checkpoint, CheckpointStore, ConversationRecord, InMemoryCheckpointStore, InMemoryMetadataStore,
    MetadataStore, PersistError, Result as PersistResult,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

/// Model fake replaying a fixed token script
pub struct ScriptedModel {
    tokens: Vec<String>,
    fail_after: Option<usize>,
    streaming: bool,
    hang: bool,
    gate: Option<Arc<Semaphore>>,
    panic_once: AtomicBool,
    pub calls: AtomicUsize,
    pub active: Arc<AtomicUsize>,
    pub max_active: Arc<AtomicUsize>,
    pub inputs: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedModel {
    pub fn replying(tokens: &[&str]) -> Self {
        Self {
            tokens: tokens.iter().map(|t| t.to_string()).collect(),
            fail_after: None,
            streaming: true,
            hang: false,
            gate: None,
            panic_once: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            active: Arc::new(AtomicUsize::new(0)),
            max_active: Arc::new(AtomicUsize::new(0)),
            inputs: Mutex::new(Vec::new()),
        }
    }

    /// Emit `n` tokens, then fail the stream
    pub fn failing_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    pub fn non_streaming(mut self) -> Self {
        self.streaming = false;
        self
    }

    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    /// Every call waits for one permit before producing output
    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// The first stream call panics
    pub fn panicking_once(self) -> Self {
        self.panic_once.store(true, Ordering::SeqCst);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_input(&self) -> Vec<Message> {
        self.inputs.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl ModelCapability for ScriptedModel {
    async fn generate(&self, messages: &[Message]) -> CapabilityResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inputs.lock().unwrap().push(messages.to_vec());
        if self.hang {
            futures::future::pending::<()>().await;
        }
        if self.fail_after.is_some() {
            return Err(CapabilityError::Unavailable("scripted outage".to_string()));
        }
        Ok(self.tokens.concat())
    }

    async fn stream(&self, messages: &[Message]) -> CapabilityResult<TokenStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inputs.lock().unwrap().push(messages.to_vec());
        if self.panic_once.swap(false, Ordering::SeqCst) {
            panic!("scripted model panic");
        }

        let tokens = self.tokens.clone();
        let fail_after = self.fail_after;
        let hang = self.hang;
        let gate = self.gate.clone();
        let active = Arc::clone(&self.active);
        let max_active = Arc::clone(&self.max_active);

        Ok(Box::pin(async_stream::stream! {
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            max_active.fetch_max(now, Ordering::SeqCst);

            if let Some(gate) = gate {
                if let Ok(permit) = gate.acquire().await {
                    permit.forget();
                }
            }
            if hang {
                futures::future::pending::<()>().await;
            }

            for (i, token) in tokens.into_iter().enumerate() {
                if fail_after == Some(i) {
                    active.fetch_sub(1, Ordering::SeqCst);
                    yield Err(CapabilityError::Stream("connection reset".to_string()));
                    return;
                }
                yield Ok(token);
            }
            active.fetch_sub(1, Ordering::SeqCst);
        }))
    }

    fn supports_streaming(&self) -> bool {
        self.streaming
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Checkpoint store wrapper counting calls and injecting failures
#[derive(Default)]
pub struct CountingStore {
    pub inner: InMemoryCheckpointStore,
    pub calls: AtomicUsize,
    pub fail_reads: AtomicBool,
    pub fail_puts: AtomicBool,
    pub fail_deletes: AtomicBool,
}

impl CountingStore {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn check(&self, flag: &AtomicBool) -> PersistResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if flag.load(Ordering::SeqCst) {
            Err(PersistError::Unavailable("injected failure".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CheckpointStore for CountingStore {
    async fn put(&self, checkpoint: Checkpoint) -> PersistResult<()> {
        self.check(&self.fail_puts)?;
        self.inner.put(checkpoint).await
    }

    async fn get_latest(&self, thread_id: &str) -> PersistResult<Option<Checkpoint>> {
        self.check(&self.fail_reads)?;
        self.inner.get_latest(thread_id).await
    }

    async fn get(&self, thread_id: &str, checkpoint_id: &str) -> PersistResult<Option<Checkpoint>> {
        self.check(&self.fail_reads)?;
        self.inner.get(thread_id, checkpoint_id).await
    }

    async fn list(&self, thread_id: &str, limit: usize) -> PersistResult<Vec<Checkpoint>> {
        self.check(&self.fail_reads)?;
        self.inner.list(thread_id, limit).await
    }

    async fn delete_thread(&self, thread_id: &str) -> PersistResult<u64> {
        self.check(&self.fail_deletes)?;
        self.inner.delete_thread(thread_id).await
    }

    async fn prune(&self, thread_id: &str, keep_latest: usize) -> PersistResult<u64> {
        self.check(&self.fail_deletes)?;
        self.inner.prune(thread_id, keep_latest).await
    }
}

pub struct Harness {
    pub model: Arc<ScriptedModel>,
    pub checkpoints: Arc<CountingStore>,
    pub metadata: Arc<InMemoryMetadataStore>,
    pub service: ConversationService,
}

impl Harness {
    pub fn new(model: ScriptedModel) -> Self {
        Self::with_config(model, EngineConfig::default())
    }

    pub fn with_config(model: ScriptedModel, config: EngineConfig) -> Self {
        let model = Arc::new(model);
        let checkpoints = Arc::new(CountingStore::default());
        let metadata = Arc::new(InMemoryMetadataStore::new());

        let engine = Engine::builder()
            .capability(model.clone())
            .checkpoints(checkpoints.clone())
            .config(config)
            .build()
            .unwrap();
        let service = ConversationService::new(metadata.clone(), engine);

        Self {
            model,
            checkpoints,
            metadata,
            service,
        }
    }

    pub async fn conversation(&self, owner_id: &str) -> ConversationRecord {
        self.metadata
            .create(ConversationRecord::new(owner_id, None).unwrap())
            .await
            .unwrap()
    }

    pub async fn latest(&self, thread_id: &str) -> Option<Checkpoint> {
        self.checkpoints.inner.get_latest(thread_id).await.unwrap()
    }
}

/// Drain all events of a run
pub async fn collect_events(handle: &mut RunHandle) -> Vec<OutputEvent> {
    let mut events = Vec::new();
    while let Some(event) = handle.events.recv().await {
        events.push(event);
    }
    events
}
