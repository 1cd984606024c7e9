//! Core abstractions for the quorum analysis committee
//!
//! This crate defines the fundamental types shared across the quorum workspace:
//! the `Signal` and `Decision` value types, the shared per-run `AnalysisState`
//! with its patch-based merge model, the `AnalysisNode` trait every committee
//! member implements, and the error taxonomy for node execution.

pub mod error;
pub mod node;
pub mod signal;
pub mod state;

pub use error::{FailureKind, NodeError, NodeFailure};
pub use node::{AnalysisNode, NodeOutput};
pub use signal::{Action, Decision, Direction, Signal};
pub use state::{AnalysisState, StatePatch, StateSnapshot, keys};
