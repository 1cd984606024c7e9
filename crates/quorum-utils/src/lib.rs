//! Shared utilities for the quorum workspace
//!
//! Common functionality used across the workspace, currently logging setup.

pub mod logging;

pub use logging::init_tracing;
