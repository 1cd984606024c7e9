//! Risk manager aggregation node: position limits from portfolio context

use crate::metrics;
use async_trait::async_trait;
use quorum_core::{
    AnalysisNode, Direction, NodeError, NodeOutput, Signal, StatePatch, StateSnapshot,
};
use quorum_data::{ConstraintProvider, PORTFOLIO_KEY, PortfolioContext};
use std::sync::Arc;

/// Computes the position limits the portfolio manager must respect
///
/// Reads the portfolio context from the seed state, asks the constraint
/// provider for limits, and writes them for the decision stage. The emitted
/// signal is always neutral: risk capacity is conviction-free, its
/// confidence tracks how much room remains under the cap.
pub struct RiskManagerNode {
    constraints: Arc<dyn ConstraintProvider>,
}

impl RiskManagerNode {
    pub const ID: &'static str = "risk_manager";
    pub const OUTPUT_KEY: &'static str = "risk_limits";

    /// Node applying the given constraint provider
    pub fn new(constraints: Arc<dyn ConstraintProvider>) -> Self {
        Self { constraints }
    }
}

#[async_trait]
impl AnalysisNode for RiskManagerNode {
    fn id(&self) -> &str {
        Self::ID
    }

    fn reads(&self) -> Vec<String> {
        vec![metrics::CURRENT_PRICE.to_string(), PORTFOLIO_KEY.to_string()]
    }

    fn produces(&self) -> Vec<String> {
        vec![Self::OUTPUT_KEY.to_string()]
    }

    async fn evaluate(&self, state: StateSnapshot) -> Result<NodeOutput, NodeError> {
        let price = state
            .get_f64(metrics::CURRENT_PRICE)
            .ok_or_else(|| NodeError::Evaluation("current price unavailable".to_string()))?;
        let portfolio: PortfolioContext = state.get_typed(PORTFOLIO_KEY)?.unwrap_or_default();

        let limits = self
            .constraints
            .limits_for(&state.instrument_id, &portfolio, price);

        // Capacity bands: how much of the cap is still open determines the
        // confidence of the (always neutral) risk read.
        let open_ratio = if limits.max_risk_exposure > 0.0 {
            (limits.max_position_size / limits.max_risk_exposure).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let score = if open_ratio >= 0.8 {
            10.0
        } else if open_ratio >= 0.6 {
            8.0
        } else if open_ratio >= 0.4 {
            6.0
        } else if open_ratio >= 0.2 {
            4.0
        } else {
            2.0
        };

        let rationale = format!(
            "portfolio value {:.2}, position cap {:.2}, remaining capacity {:.2}",
            portfolio.total_value(),
            limits.max_risk_exposure,
            limits.max_position_size
        );

        let signal = Signal::new(Self::ID, Direction::Neutral, score / 10.0)
            .with_rationale(rationale)
            .with_metric("position_limit", limits.max_risk_exposure)
            .with_metric("remaining_position_limit", limits.max_position_size)
            .with_metric("portfolio_value", portfolio.total_value());

        let mut patch = StatePatch::new();
        patch.insert_derived_typed(Self::OUTPUT_KEY, &limits)?;
        Ok(NodeOutput::from_signal(signal).with_patch(patch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use quorum_core::AnalysisState;
    use quorum_data::{PercentOfPortfolioLimits, RiskLimits};
    use serde_json::json;

    fn snapshot(portfolio: Option<&PortfolioContext>) -> StateSnapshot {
        let mut state = AnalysisState::new("ACME", Utc::now())
            .with_seed_value(metrics::CURRENT_PRICE, json!(40.0));
        if let Some(portfolio) = portfolio {
            state = state.with_seed_value(PORTFOLIO_KEY, serde_json::to_value(portfolio).unwrap());
        }
        Arc::new(state)
    }

    fn node() -> RiskManagerNode {
        RiskManagerNode::new(Arc::new(PercentOfPortfolioLimits::default()))
    }

    #[tokio::test]
    async fn test_limits_written_for_decision_stage() {
        let portfolio = PortfolioContext::new(100_000.0);
        let output = node().evaluate(snapshot(Some(&portfolio))).await.unwrap();

        assert!(output.patch.keys().any(|k| k == RiskManagerNode::OUTPUT_KEY));
        let signal = output.signal.unwrap();
        assert_eq!(signal.direction, Direction::Neutral);
        assert_eq!(signal.metrics["position_limit"], 20_000.0);
        assert_eq!(signal.metrics["remaining_position_limit"], 20_000.0);
        assert_eq!(signal.confidence, 1.0);
    }

    #[tokio::test]
    async fn test_full_position_leaves_no_capacity() {
        let portfolio = PortfolioContext::new(10_000.0).with_position("ACME", 400.0, 0.0, 40.0);
        let output = node().evaluate(snapshot(Some(&portfolio))).await.unwrap();

        let signal = output.signal.unwrap();
        assert_eq!(signal.metrics["remaining_position_limit"], 0.0);
        assert_eq!(signal.confidence, 0.2);
    }

    #[tokio::test]
    async fn test_missing_portfolio_uses_default_context() {
        let output = node().evaluate(snapshot(None)).await.unwrap();
        let signal = output.signal.unwrap();
        // Default portfolio: 100k cash, nothing held.
        assert_eq!(signal.metrics["portfolio_value"], 100_000.0);
    }

    #[tokio::test]
    async fn test_missing_price_fails_node() {
        let state = Arc::new(AnalysisState::new("ACME", Utc::now()));
        let err = node().evaluate(state).await.unwrap_err();
        assert!(matches!(err, NodeError::Evaluation(msg) if msg.contains("price")));
    }

    #[tokio::test]
    async fn test_limits_round_trip_through_state() {
        let portfolio = PortfolioContext::new(100_000.0);
        let output = node().evaluate(snapshot(Some(&portfolio))).await.unwrap();

        let mut state = AnalysisState::new("ACME", Utc::now());
        state.apply_patch(output.patch);
        let limits: RiskLimits = state
            .get_typed(RiskManagerNode::OUTPUT_KEY)
            .unwrap()
            .unwrap();
        assert_eq!(limits.max_risk_exposure, 20_000.0);
    }
}
