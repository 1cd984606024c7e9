//! Run result types returned to callers

use quorum_core::{Decision, NodeFailure, Signal};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Overall outcome of one analysis run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Every node completed
    Complete,
    /// Some nodes failed or the run was cancelled, but results exist
    Partial,
    /// No decision could be produced; callers should treat this as
    /// "no recommendation", not retry blindly
    Failed,
}

/// Everything one run produced, returned to the caller and not retained by
/// the engine
///
/// A `partial` status with populated `node_failures` is a normal outcome
/// (e.g. one data source down); failures are inspection data, not errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// Unique id of this run
    pub run_id: Uuid,
    /// Overall outcome
    pub status: RunStatus,
    /// The aggregated recommendation, absent when aggregation was impossible
    pub decision: Option<Decision>,
    /// Every merged signal, in node registration order
    pub all_signals: Vec<Signal>,
    /// Per-node failures, keyed by node id
    pub node_failures: BTreeMap<String, NodeFailure>,
}

impl RunResult {
    /// Whether the caller has a decision to act on
    pub fn is_actionable(&self) -> bool {
        self.decision.is_some() && self.status != RunStatus::Failed
    }

    /// The signal a given node emitted, if any
    pub fn signal_from(&self, node_id: &str) -> Option<&Signal> {
        self.all_signals.iter().find(|s| s.source == node_id)
    }
}
