//! Standard committee wiring

use crate::contrarian_investor::ContrarianInvestorNode;
use crate::fundamentals::FundamentalsNode;
use crate::growth_investor::GrowthInvestorNode;
use crate::market_data::MarketDataNode;
use crate::portfolio_manager::{ConfidenceWeighted, PortfolioManagerNode};
use crate::risk_manager::RiskManagerNode;
use crate::sentiment::SentimentNode;
use crate::technicals::TechnicalsNode;
use crate::valuation::ValuationNode;
use crate::value_investor::ValueInvestorNode;
use quorum_data::{ConstraintProvider, DataAdapter, PORTFOLIO_KEY};
use quorum_graph::{DependencyGraph, GraphBuilder};
use std::sync::Arc;

/// Persona ids the standard portfolio manager aggregates
pub fn standard_personas() -> Vec<String> {
    vec![
        FundamentalsNode::ID.to_string(),
        TechnicalsNode::ID.to_string(),
        SentimentNode::ID.to_string(),
        ValuationNode::ID.to_string(),
        ValueInvestorNode::ID.to_string(),
        GrowthInvestorNode::ID.to_string(),
        ContrarianInvestorNode::ID.to_string(),
    ]
}

/// Build and finalize the standard analysis committee
///
/// One market-data node feeds seven personas; the risk manager computes
/// limits from the seeded portfolio context; the portfolio manager folds
/// everything into the decision under a confidence-weighted vote.
pub fn standard_graph(
    adapter: Arc<dyn DataAdapter>,
    constraints: Arc<dyn ConstraintProvider>,
) -> quorum_graph::Result<DependencyGraph> {
    let mut builder = GraphBuilder::new().seed_key(PORTFOLIO_KEY);
    builder.register(Arc::new(MarketDataNode::new(adapter)))?;
    builder.register(Arc::new(FundamentalsNode))?;
    builder.register(Arc::new(TechnicalsNode))?;
    builder.register(Arc::new(SentimentNode))?;
    builder.register(Arc::new(ValuationNode))?;
    builder.register(Arc::new(ValueInvestorNode))?;
    builder.register(Arc::new(GrowthInvestorNode))?;
    builder.register(Arc::new(ContrarianInvestorNode))?;
    builder.register(Arc::new(RiskManagerNode::new(constraints)))?;
    builder.register(Arc::new(PortfolioManagerNode::new(
        standard_personas(),
        Arc::new(ConfidenceWeighted::default()),
    )))?;
    builder.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics;
    use async_trait::async_trait;
    use quorum_core::{
        Action, AnalysisNode, Direction, FailureKind, NodeError, NodeOutput, Signal, StateSnapshot,
    };
    use quorum_data::{FixtureAdapter, PercentOfPortfolioLimits, PortfolioContext};
    use quorum_engine::{RunCoordinator, RunSeed, RunStatus};
    use serde_json::json;

    /// Healthy, cheaply priced company in a steady uptrend
    fn bullish_fixture() -> FixtureAdapter {
        let closes: Vec<f64> = (0..60).map(|i| 30.0 + f64::from(i) * 0.2).collect();
        FixtureAdapter::new()
            .with("ACME", metrics::CURRENT_PRICE, json!(42.0))
            .with("ACME", metrics::PRICE_HISTORY, json!(closes))
            .with("ACME", metrics::MARKET_CAP, json!(8.0e8))
            .with("ACME", metrics::RETURN_ON_EQUITY, json!(0.22))
            .with("ACME", metrics::DEBT_TO_EQUITY, json!(0.3))
            .with("ACME", metrics::OPERATING_MARGIN, json!(0.25))
            .with("ACME", metrics::CURRENT_RATIO, json!(2.0))
            .with("ACME", metrics::REVENUE_GROWTH, json!(0.15))
            .with("ACME", metrics::EARNINGS_GROWTH, json!(0.20))
            .with("ACME", metrics::PE_RATIO, json!(15.0))
            .with("ACME", metrics::FREE_CASH_FLOW, json!(1.2e8))
            .with("ACME", metrics::NET_INCOME, json!(1.0e8))
            .with("ACME", metrics::DEPRECIATION_AND_AMORTIZATION, json!(3.0e7))
            .with("ACME", metrics::CAPITAL_EXPENDITURE, json!(2.0e7))
            .with("ACME", metrics::WORKING_CAPITAL_CHANGE, json!(5.0e6))
            .with("ACME", metrics::TOTAL_ASSETS, json!(5.0e9))
            .with("ACME", metrics::TOTAL_LIABILITIES, json!(2.0e9))
            .with("ACME", metrics::WEEK_52_HIGH, json!(45.0))
            .with("ACME", metrics::INSIDER_BUY_VALUE, json!(9.0e5))
            .with("ACME", metrics::INSIDER_SELL_VALUE, json!(1.0e5))
            .with("ACME", metrics::NEWS_SENTIMENT, json!(0.5))
    }

    fn graph_with(adapter: FixtureAdapter, cap_pct: f64) -> DependencyGraph {
        standard_graph(
            Arc::new(adapter),
            Arc::new(PercentOfPortfolioLimits::new(cap_pct)),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_full_committee_run_is_complete_and_actionable() {
        let graph = graph_with(bullish_fixture(), 0.20);
        let result = RunCoordinator::default()
            .execute(&graph, RunSeed::now("ACME"))
            .await;

        assert_eq!(result.status, RunStatus::Complete);
        assert!(result.node_failures.is_empty());
        assert!(result.is_actionable());

        let decision = result.decision.unwrap();
        assert_eq!(decision.action, Action::Buy);
        assert_eq!(decision.contributing_signals.len(), 7);
        // Nine signal emitters; the market-data node only writes state.
        assert_eq!(result.all_signals.len(), 9);
    }

    #[tokio::test]
    async fn test_signals_come_back_in_committee_order() {
        let graph = graph_with(bullish_fixture(), 0.20);
        let result = RunCoordinator::default()
            .execute(&graph, RunSeed::now("ACME"))
            .await;

        let sources: Vec<&str> = result.all_signals.iter().map(|s| s.source.as_str()).collect();
        assert_eq!(
            sources,
            [
                FundamentalsNode::ID,
                TechnicalsNode::ID,
                SentimentNode::ID,
                ValuationNode::ID,
                ValueInvestorNode::ID,
                GrowthInvestorNode::ID,
                ContrarianInvestorNode::ID,
                RiskManagerNode::ID,
                PortfolioManagerNode::ID,
            ]
        );
    }

    #[tokio::test]
    async fn test_position_cap_clamps_the_buy() {
        // Cap positions at 5% of the seeded 100k portfolio.
        let graph = graph_with(bullish_fixture(), 0.05);
        let seed = RunSeed::now("ACME")
            .with_value_typed(PORTFOLIO_KEY, &PortfolioContext::new(100_000.0))
            .unwrap();
        let result = RunCoordinator::default().execute(&graph, seed).await;

        let decision = result.decision.unwrap();
        assert_eq!(decision.action, Action::Buy);
        assert!(decision.size.unwrap() <= 5_000.0);
        assert!(!decision.constraints_applied.is_empty());
    }

    #[tokio::test]
    async fn test_dead_data_source_degrades_the_whole_committee() {
        // Price data is required, so the market-data node fails and every
        // persona behind it is skipped; no decision can be produced.
        let graph = graph_with(FixtureAdapter::new(), 0.20);
        let result = RunCoordinator::default()
            .execute(&graph, RunSeed::now("ACME"))
            .await;

        assert_eq!(result.status, RunStatus::Failed);
        assert!(result.decision.is_none());
        assert_eq!(
            result.node_failures[MarketDataNode::ID].kind,
            FailureKind::Execution
        );
        assert_eq!(
            result.node_failures[PortfolioManagerNode::ID].kind,
            FailureKind::Skipped
        );
    }

    // Minimal two-node committee from the orchestration contract: a
    // valuation node that fetches its own data and a decision node behind it.
    struct FetchingValuation {
        adapter: Arc<dyn quorum_data::DataAdapter>,
    }

    #[async_trait]
    impl AnalysisNode for FetchingValuation {
        fn id(&self) -> &str {
            "valuation"
        }

        async fn evaluate(&self, state: StateSnapshot) -> Result<NodeOutput, NodeError> {
            let price = self
                .adapter
                .fetch(&state.instrument_id, metrics::CURRENT_PRICE, state.as_of_time)
                .await
                .map_err(NodeError::evaluation)?;
            let price = price
                .as_f64()
                .ok_or_else(|| NodeError::Evaluation("price is not numeric".to_string()))?;
            let direction = if price < 50.0 {
                Direction::Bullish
            } else {
                Direction::Bearish
            };
            Ok(NodeOutput::from_signal(Signal::new("valuation", direction, 0.7)))
        }
    }

    struct RiskDecision;

    #[async_trait]
    impl AnalysisNode for RiskDecision {
        fn id(&self) -> &str {
            "risk"
        }

        fn reads(&self) -> Vec<String> {
            vec!["valuation".to_string()]
        }

        fn produces(&self) -> Vec<String> {
            vec![quorum_core::keys::DECISION.to_string()]
        }

        async fn evaluate(&self, state: StateSnapshot) -> Result<NodeOutput, NodeError> {
            let upstream = state
                .signal_from("valuation")
                .ok_or_else(|| NodeError::Evaluation("valuation signal missing".to_string()))?;
            let mut decision = quorum_core::Decision::new(Action::Buy, upstream.confidence)
                .with_size(5_000.0)
                .with_contributing_signals(vec![upstream.clone()]);
            decision.record_constraint("position size capped at 5% of portfolio");

            let mut patch = quorum_core::StatePatch::new();
            patch.insert_derived_typed(quorum_core::keys::DECISION, &decision)?;
            Ok(NodeOutput::default()
                .with_patch(patch)
                .with_signal(Signal::new("risk", upstream.direction, upstream.confidence)))
        }
    }

    fn two_node_graph(adapter: FixtureAdapter) -> DependencyGraph {
        let mut builder = GraphBuilder::new();
        builder
            .register(Arc::new(FetchingValuation {
                adapter: Arc::new(adapter),
            }))
            .unwrap();
        builder.register(Arc::new(RiskDecision)).unwrap();
        builder.finalize().unwrap()
    }

    #[tokio::test]
    async fn test_adapter_failure_skips_downstream_and_fails_run() {
        let result = RunCoordinator::default()
            .execute(&two_node_graph(FixtureAdapter::new()), RunSeed::now("ACME"))
            .await;

        assert_eq!(result.status, RunStatus::Failed);
        assert!(result.decision.is_none());
        assert_eq!(result.node_failures["valuation"].kind, FailureKind::Execution);
        assert!(result.node_failures["valuation"].message.contains("data unavailable"));
        assert_eq!(result.node_failures["risk"].kind, FailureKind::Skipped);
        assert!(result.node_failures["risk"].message.contains("valuation"));
    }

    #[tokio::test]
    async fn test_bullish_valuation_becomes_constrained_buy() {
        let adapter = FixtureAdapter::new().with("ACME", metrics::CURRENT_PRICE, json!(42.0));
        let result = RunCoordinator::default()
            .execute(&two_node_graph(adapter), RunSeed::now("ACME"))
            .await;

        assert_eq!(result.status, RunStatus::Complete);
        let decision = result.decision.unwrap();
        assert_eq!(decision.action, Action::Buy);
        assert!(decision.size.unwrap() <= 5_000.0);
        assert!(!decision.constraints_applied.is_empty());
        assert_eq!(decision.contributing_signals[0].direction, Direction::Bullish);
    }
}
