use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use genesis_llm::ModelCapability;
use genesis_persist::CheckpointStore;

use crate::engine::Engine;
use crate::error::PipelineError;
use crate::graph::CompiledPipeline;
use crate::node::{Node, NodeKind};
use crate::nodes::{FormatOutputNode, InvokeModelNode, ValidateInputNode};
use crate::router::{Edge, FailureRouter, NextNode, Router};
use crate::types::EngineConfig;

/// Assembles nodes and edges, then validates them into a [`CompiledPipeline`]
#[derive(Default)]
pub struct PipelineBuilder {
    entry: Option<NodeKind>,
    nodes: HashMap<NodeKind, Arc<dyn Node>>,
    edges: HashMap<NodeKind, Edge>,
    duplicates: Vec<NodeKind>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// validate_input → invoke_model → format_output → END, with failures
    /// after the first two steps routed straight to END
    pub fn conversational(
        capability: Arc<dyn ModelCapability>,
        config: &EngineConfig,
    ) -> Result<CompiledPipeline, PipelineError> {
        let invoke = InvokeModelNode::new(capability, config.model_timeout)
            .with_system_prompt(config.system_prompt.clone());

        Self::new()
            .node(Arc::new(ValidateInputNode))
            .node(Arc::new(invoke))
            .node(Arc::new(FormatOutputNode))
            .entry(NodeKind::ValidateInput)
            .conditional_edge(
                NodeKind::ValidateInput,
                Arc::new(FailureRouter::new(NextNode::Node(NodeKind::InvokeModel))),
            )
            .conditional_edge(
                NodeKind::InvokeModel,
                Arc::new(FailureRouter::new(NextNode::Node(NodeKind::FormatOutput))),
            )
            .edge(NodeKind::FormatOutput, NextNode::End)
            .compile()
    }

    pub fn node(mut self, node: Arc<dyn Node>) -> Self {
        let kind = node.kind();
        if self.nodes.insert(kind, node).is_some() {
            self.duplicates.push(kind);
        }
        self
    }

    pub fn entry(mut self, kind: NodeKind) -> Self {
        self.entry = Some(kind);
        self
    }

    pub fn edge(mut self, from: NodeKind, to: NextNode) -> Self {
        self.edges.insert(from, Edge::Always(to));
        self
    }

    pub fn conditional_edge(mut self, from: NodeKind, router: Arc<dyn Router>) -> Self {
        self.edges.insert(from, Edge::Conditional(router));
        self
    }

    pub fn compile(self) -> Result<CompiledPipeline, PipelineError> {
        if let Some(kind) = self.duplicates.first() {
            return Err(PipelineError::DuplicateNode(*kind));
        }

        let entry = self.entry.ok_or(PipelineError::MissingEntry)?;
        if !self.nodes.contains_key(&entry) {
            return Err(PipelineError::UnknownNode(entry));
        }

        for from in self.edges.keys() {
            if !self.nodes.contains_key(from) {
                return Err(PipelineError::UnknownNode(*from));
            }
        }

        let mut adjacency: HashMap<NodeKind, Vec<NodeKind>> = HashMap::new();
        for kind in self.nodes.keys() {
            let edge = self.edges.get(kind).ok_or(PipelineError::MissingEdge(*kind))?;
            let mut next = Vec::new();
            for target in edge.targets() {
                if let NextNode::Node(to) = target {
                    if !self.nodes.contains_key(&to) {
                        return Err(PipelineError::UnknownNode(to));
                    }
                    next.push(to);
                }
            }
            adjacency.insert(*kind, next);
        }

        let mut visited = HashSet::new();
        let mut on_path = HashSet::new();
        detect_cycle(entry, &adjacency, &mut visited, &mut on_path)?;

        // visited now holds everything reachable from the entry
        for kind in self.nodes.keys() {
            if !visited.contains(kind) {
                return Err(PipelineError::Unreachable(*kind));
            }
        }

        Ok(CompiledPipeline::new(entry, self.nodes, self.edges))
    }
}

fn detect_cycle(
    kind: NodeKind,
    adjacency: &HashMap<NodeKind, Vec<NodeKind>>,
    visited: &mut HashSet<NodeKind>,
    on_path: &mut HashSet<NodeKind>,
) -> Result<(), PipelineError> {
    if on_path.contains(&kind) {
        return Err(PipelineError::Cycle(kind));
    }
    if !visited.insert(kind) {
        return Ok(());
    }

    on_path.insert(kind);
    for next in adjacency.get(&kind).into_iter().flatten() {
        detect_cycle(*next, adjacency, visited, on_path)?;
    }
    on_path.remove(&kind);

    Ok(())
}

/// Builder for the standard engine
pub struct EngineBuilder {
    capability: Option<Arc<dyn ModelCapability>>,
    checkpoints: Option<Arc<dyn CheckpointStore>>,
    config: EngineConfig,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            capability: None,
            checkpoints: None,
            config: EngineConfig::default(),
        }
    }

    pub fn capability(mut self, capability: Arc<dyn ModelCapability>) -> Self {
        self.capability = Some(capability);
        self
    }

    pub fn checkpoints(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.checkpoints = Some(store);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<Engine, PipelineError> {
        let capability = self
            .capability
            .ok_or(PipelineError::MissingComponent("Model capability"))?;
        let checkpoints = self
            .checkpoints
            .ok_or(PipelineError::MissingComponent("Checkpoint store"))?;

        let pipeline = PipelineBuilder::conversational(capability, &self.config)?;
        Ok(Engine::new(pipeline, checkpoints, self.config))
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
