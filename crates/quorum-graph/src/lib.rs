//! Dependency graph for the quorum analysis committee
//!
//! Nodes declare what they read and what they produce; this crate converts
//! those declarations into a validated, immutable DAG. All structural errors
//! (duplicate ids, unknown dependencies, write conflicts, cycles) are caught
//! at construction time, so nothing structural can fail mid-run.

pub mod error;
pub mod graph;

pub use error::{GraphError, Result};
pub use graph::{DependencyGraph, GraphBuilder};
