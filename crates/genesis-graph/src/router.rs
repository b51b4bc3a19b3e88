use std::sync::Arc;

use crate::node::NodeKind;
use crate::types::PipelineState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NextNode {
    Node(NodeKind),
    End,
}

/// Decides which node to execute next based on current state
pub trait Router: Send + Sync {
    fn next(&self, state: &PipelineState) -> NextNode;

    /// Every target `next` can return; used to validate the graph at compile time
    fn targets(&self) -> Vec<NextNode>;
}

/// Continue to `on_success`, or end the run once `failure` is set
pub struct FailureRouter {
    on_success: NextNode,
}

impl FailureRouter {
    pub fn new(on_success: NextNode) -> Self {
        Self { on_success }
    }
}

impl Router for FailureRouter {
    fn next(&self, state: &PipelineState) -> NextNode {
        if state.is_failed() {
            NextNode::End
        } else {
            self.on_success
        }
    }

    fn targets(&self) -> Vec<NextNode> {
        vec![self.on_success, NextNode::End]
    }
}

/// Outgoing transition of a node
#[derive(Clone)]
pub enum Edge {
    Always(NextNode),
    Conditional(Arc<dyn Router>),
}

impl Edge {
    pub fn resolve(&self, state: &PipelineState) -> NextNode {
        match self {
            Self::Always(next) => *next,
            Self::Conditional(router) => router.next(state),
        }
    }

    pub fn targets(&self) -> Vec<NextNode> {
        match self {
            Self::Always(next) => vec![*next],
            Self::Conditional(router) => router.targets(),
        }
    }
}
