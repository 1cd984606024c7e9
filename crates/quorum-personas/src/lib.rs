//! Analysis personas and aggregators for the quorum committee
//!
//! Each persona is one independent analytical strategy behind the single
//! `AnalysisNode` capability: it reads fetched metrics from the shared state
//! and emits a directional signal with a rationale. New personas are added by
//! registering another node; the engine never changes.
//!
//! The committee ends in two aggregation nodes: the risk manager computes
//! position limits from the portfolio context, and the portfolio manager
//! folds every persona signal into the final decision under those limits.
//!
//! # Example
//!
//! ```rust,ignore
//! use quorum_data::{FixtureAdapter, PercentOfPortfolioLimits};
//! use quorum_engine::{RunCoordinator, RunSeed};
//! use quorum_personas::committee;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let adapter = Arc::new(FixtureAdapter::new());
//! let constraints = Arc::new(PercentOfPortfolioLimits::default());
//! let graph = committee::standard_graph(adapter, constraints)?;
//!
//! let result = RunCoordinator::default()
//!     .execute(&graph, RunSeed::now("ACME"))
//!     .await;
//! println!("{:?}", result.decision);
//! # Ok(())
//! # }
//! ```

pub mod committee;
pub mod contrarian_investor;
pub mod fundamentals;
pub mod growth_investor;
pub mod market_data;
pub mod metrics;
pub mod portfolio_manager;
pub mod risk_manager;
pub mod score;
pub mod sentiment;
pub mod technicals;
pub mod valuation;
pub mod value_investor;

pub use committee::standard_graph;
pub use contrarian_investor::ContrarianInvestorNode;
pub use fundamentals::FundamentalsNode;
pub use growth_investor::GrowthInvestorNode;
pub use market_data::MarketDataNode;
pub use portfolio_manager::{CombinePolicy, ConfidenceWeighted, Consensus, PortfolioManagerNode};
pub use risk_manager::RiskManagerNode;
pub use score::Scorecard;
pub use sentiment::SentimentNode;
pub use technicals::TechnicalsNode;
pub use valuation::ValuationNode;
pub use value_investor::ValueInvestorNode;
