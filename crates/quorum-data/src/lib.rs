//! External collaborator boundaries for the quorum analysis committee
//!
//! The orchestration core treats data providers and portfolio constraints as
//! external, thread-safe collaborators. This crate defines those seams: the
//! `DataAdapter` trait with caching and fixture implementations, and the
//! `ConstraintProvider` trait with the standard percent-of-portfolio limits.

pub mod adapter;
pub mod constraints;

pub use adapter::{CachedAdapter, DataAdapter, DataError, FixtureAdapter};
pub use constraints::{
    ConstraintProvider, PORTFOLIO_KEY, PercentOfPortfolioLimits, PortfolioContext, Position,
    RiskLimits,
};
