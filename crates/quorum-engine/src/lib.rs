//! Wave-based execution engine for the quorum analysis committee
//!
//! The engine walks a finalized dependency graph in synchronized waves: every
//! ready node runs concurrently against a read-only snapshot of the shared
//! state, patches merge at the wave barrier, and newly ready nodes form the
//! next wave. Node failures never abort a run; they degrade the branch below
//! them and are reported in the run result.

pub mod coordinator;
pub mod engine;
pub mod result;

pub use coordinator::{RunCoordinator, RunSeed};
pub use engine::{EngineConfig, EngineConfigBuilder, EngineOutcome, ExecutionEngine};
pub use result::{RunResult, RunStatus};
