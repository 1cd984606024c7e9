//! Node execution errors and the recorded failure forms

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Error raised by a node's `evaluate` or by output validation at merge time
#[derive(Debug, Error)]
pub enum NodeError {
    /// The node's analysis could not be carried out
    #[error("evaluation failed: {0}")]
    Evaluation(String),

    /// The node tried to write a state key outside its declared `produces` set
    #[error("undeclared write to key '{key}'")]
    UndeclaredWrite { key: String },

    /// The node returned output the engine could not accept
    #[error("malformed output: {0}")]
    MalformedOutput(String),
}

impl NodeError {
    /// Shorthand for an evaluation failure carrying a source error's message
    pub fn evaluation(err: impl std::fmt::Display) -> Self {
        NodeError::Evaluation(err.to_string())
    }
}

/// Classification of a recorded per-node failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The node's evaluation raised an error or panicked
    Execution,
    /// The node wrote a key outside its declared `produces` set
    UndeclaredWrite,
    /// The node returned output the engine rejected
    MalformedOutput,
    /// The node exceeded its evaluation timeout
    Timeout,
    /// A declared dependency failed, so the node never ran
    Skipped,
    /// The run was cancelled before the node's wave was admitted
    Cancelled,
}

/// A per-node failure as recorded in the run result
///
/// Failures are data, not control flow: a node failing never aborts the run,
/// it only degrades the branch below it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl NodeFailure {
    pub fn execution(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Execution,
            message: message.into(),
        }
    }

    pub fn timeout(limit: Duration) -> Self {
        Self {
            kind: FailureKind::Timeout,
            message: format!("evaluation exceeded {limit:?}"),
        }
    }

    pub fn skipped(failed_dependency: &str) -> Self {
        Self {
            kind: FailureKind::Skipped,
            message: format!("skipped: dependency '{failed_dependency}' failed"),
        }
    }

    pub fn cancelled() -> Self {
        Self {
            kind: FailureKind::Cancelled,
            message: "run cancelled before node was scheduled".to_string(),
        }
    }
}

impl From<NodeError> for NodeFailure {
    fn from(err: NodeError) -> Self {
        let kind = match &err {
            NodeError::Evaluation(_) => FailureKind::Execution,
            NodeError::UndeclaredWrite { .. } => FailureKind::UndeclaredWrite,
            NodeError::MalformedOutput(_) => FailureKind::MalformedOutput,
        };
        Self {
            kind,
            message: err.to_string(),
        }
    }
}

impl std::fmt::Display for NodeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kind_from_node_error() {
        let failure: NodeFailure = NodeError::Evaluation("adapter down".to_string()).into();
        assert_eq!(failure.kind, FailureKind::Execution);
        assert!(failure.message.contains("adapter down"));

        let failure: NodeFailure = NodeError::UndeclaredWrite {
            key: "surprise".to_string(),
        }
        .into();
        assert_eq!(failure.kind, FailureKind::UndeclaredWrite);
        assert!(failure.message.contains("surprise"));
    }

    #[test]
    fn test_skip_names_dependency() {
        let failure = NodeFailure::skipped("valuation");
        assert_eq!(failure.kind, FailureKind::Skipped);
        assert!(failure.message.contains("valuation"));
    }

    #[test]
    fn test_failure_serializes_kind_snake_case() {
        let failure = NodeFailure::timeout(Duration::from_secs(5));
        let value = serde_json::to_value(&failure).unwrap();
        assert_eq!(value["kind"], "timeout");
    }
}
