//! The analysis node trait every committee member implements

use crate::error::NodeError;
use crate::signal::Signal;
use crate::state::{StatePatch, StateSnapshot};
use async_trait::async_trait;
use std::time::Duration;

/// What one node evaluation yields: an optional signal and a state patch
#[derive(Debug, Default)]
pub struct NodeOutput {
    /// Directional opinion, if this node produces one
    pub signal: Option<Signal>,
    /// Writes to merge into the shared state at the wave barrier
    pub patch: StatePatch,
}

impl NodeOutput {
    /// Output with neither a signal nor any writes
    pub fn empty() -> Self {
        Self::default()
    }

    /// Output carrying only a signal
    pub fn from_signal(signal: Signal) -> Self {
        Self {
            signal: Some(signal),
            patch: StatePatch::new(),
        }
    }

    /// Attach a patch
    pub fn with_patch(mut self, patch: StatePatch) -> Self {
        self.patch = patch;
        self
    }

    /// Attach a signal
    pub fn with_signal(mut self, signal: Signal) -> Self {
        self.signal = Some(signal);
        self
    }
}

/// One unit of analysis in the committee graph
///
/// Nodes are stateless across runs; all run-scoped data lives in the shared
/// state. `reads` and `produces` are a declared contract, validated at graph
/// finalization: a read may name a seed key, a key another node produces, or
/// another node's id (a dependency on that node's signal). A node's patch may
/// only write keys in its `produces` set.
#[async_trait]
pub trait AnalysisNode: Send + Sync {
    /// Unique id within a graph
    fn id(&self) -> &str;

    /// State keys and node ids this node depends on
    fn reads(&self) -> Vec<String> {
        Vec::new()
    }

    /// State keys this node may write
    fn produces(&self) -> Vec<String> {
        Vec::new()
    }

    /// Per-node evaluation timeout override; `None` uses the engine default
    fn timeout(&self) -> Option<Duration> {
        None
    }

    /// Evaluate against a read-only snapshot of the merged state
    ///
    /// The snapshot is consistent as of the start of the node's wave; writes
    /// from sibling nodes in the same wave are never visible.
    async fn evaluate(&self, state: StateSnapshot) -> Result<NodeOutput, NodeError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::Direction;
    use crate::state::AnalysisState;
    use std::sync::Arc;

    struct EchoNode;

    #[async_trait]
    impl AnalysisNode for EchoNode {
        fn id(&self) -> &str {
            "echo"
        }

        async fn evaluate(&self, state: StateSnapshot) -> Result<NodeOutput, NodeError> {
            let signal = Signal::new(self.id(), Direction::Neutral, 0.5)
                .with_rationale(format!("observed {}", state.instrument_id));
            Ok(NodeOutput::from_signal(signal))
        }
    }

    #[tokio::test]
    async fn test_default_contract_is_empty() {
        let node = EchoNode;
        assert!(node.reads().is_empty());
        assert!(node.produces().is_empty());
        assert!(node.timeout().is_none());

        let state = Arc::new(AnalysisState::new("ACME", chrono::Utc::now()));
        let output = node.evaluate(state).await.unwrap();
        assert!(output.patch.is_empty());
        assert_eq!(output.signal.unwrap().source, "echo");
    }
}
