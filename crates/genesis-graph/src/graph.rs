use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::error::PipelineError;
use crate::node::{Node, NodeContext, NodeKind};
use crate::router::{Edge, NextNode};
use crate::types::PipelineState;

/// Validated pipeline, resolved once and shared by every run
pub struct CompiledPipeline {
    entry: NodeKind,
    nodes: HashMap<NodeKind, Arc<dyn Node>>,
    edges: HashMap<NodeKind, Edge>,
}

impl CompiledPipeline {
    pub(crate) fn new(
        entry: NodeKind,
        nodes: HashMap<NodeKind, Arc<dyn Node>>,
        edges: HashMap<NodeKind, Edge>,
    ) -> Self {
        Self { entry, nodes, edges }
    }

    pub fn entry(&self) -> NodeKind {
        self.entry
    }

    pub fn contains(&self, kind: NodeKind) -> bool {
        self.nodes.contains_key(&kind)
    }

    /// Run nodes from the entry until END, applying each node's update
    ///
    /// A set `failure` ends the walk regardless of the edge that follows.
    /// Returns the nodes visited, in order.
    pub async fn execute(
        &self,
        state: &mut PipelineState,
        ctx: &NodeContext,
    ) -> Result<Vec<NodeKind>, PipelineError> {
        let mut path = Vec::with_capacity(self.nodes.len());
        let mut current = self.entry;

        loop {
            let node = self
                .nodes
                .get(&current)
                .ok_or(PipelineError::UnknownNode(current))?;

            let started = Instant::now();
            let update = node.execute(state, ctx).await;
            state.apply(update);
            path.push(current);

            tracing::debug!(
                run_id = %ctx.run_id,
                node = %current,
                duration_ms = started.elapsed().as_millis() as u64,
                failed = state.is_failed(),
                "node executed"
            );

            if state.is_failed() {
                break;
            }

            let edge = self
                .edges
                .get(&current)
                .ok_or(PipelineError::MissingEdge(current))?;

            match edge.resolve(state) {
                NextNode::End => break,
                NextNode::Node(next) => current = next,
            }

            // Compiled graphs are acyclic, so a longer walk means a broken router
            if path.len() > self.nodes.len() {
                return Err(PipelineError::Cycle(current));
            }
        }

        Ok(path)
    }
}
