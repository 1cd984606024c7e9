//! Value investor persona: quality at a discount

use crate::fundamentals::FundamentalsNode;
use crate::metrics;
use crate::score::{Scorecard, signal_from_ratio};
use crate::valuation::ValuationNode;
use async_trait::async_trait;
use quorum_core::{AnalysisNode, NodeError, NodeOutput, Signal, StatePatch, StateSnapshot};

/// Composite of business quality, earnings consistency, and price discipline
///
/// Builds on the fundamentals and valuation scorecards rather than re-deriving
/// them: four points for quality, four for the intrinsic-value margin, two for
/// consistent earnings growth.
pub struct ValueInvestorNode;

impl ValueInvestorNode {
    pub const ID: &'static str = "value_investor";
    pub const OUTPUT_KEY: &'static str = "value_analysis";
}

#[async_trait]
impl AnalysisNode for ValueInvestorNode {
    fn id(&self) -> &str {
        Self::ID
    }

    fn reads(&self) -> Vec<String> {
        vec![
            FundamentalsNode::OUTPUT_KEY.to_string(),
            ValuationNode::OUTPUT_KEY.to_string(),
            metrics::EARNINGS_GROWTH.to_string(),
            metrics::DEBT_TO_EQUITY.to_string(),
        ]
    }

    fn produces(&self) -> Vec<String> {
        vec![Self::OUTPUT_KEY.to_string()]
    }

    async fn evaluate(&self, state: StateSnapshot) -> Result<NodeOutput, NodeError> {
        let quality: Scorecard = state
            .get_typed(FundamentalsNode::OUTPUT_KEY)?
            .ok_or_else(|| NodeError::Evaluation("fundamentals analysis missing".to_string()))?;
        let pricing: Scorecard = state
            .get_typed(ValuationNode::OUTPUT_KEY)?
            .ok_or_else(|| NodeError::Evaluation("valuation analysis missing".to_string()))?;

        let mut card = Scorecard::new(10.0);

        let quality_points = quality.ratio() * 4.0;
        if quality.ratio() >= 0.7 {
            card.award(quality_points, "wonderful business fundamentals");
        } else if quality.ratio() <= 0.3 {
            card.award(quality_points, "business quality below my bar");
        } else {
            card.award(quality_points, "fair business quality");
        }

        let pricing_points = pricing.ratio() * 4.0;
        if pricing.ratio() >= 0.7 {
            card.award(pricing_points, "trading well below intrinsic value");
        } else if pricing.ratio() <= 0.3 {
            card.award(pricing_points, "price leaves no margin of safety");
        } else {
            card.award(pricing_points, "fairly priced against intrinsic value");
        }

        match state.get_f64(metrics::EARNINGS_GROWTH) {
            Some(growth) if growth > 0.0 => {
                card.award(2.0, format!("earnings growing {:.1}% a year", growth * 100.0));
            }
            Some(_) => card.note("earnings shrinking"),
            None => card.note("earnings growth data not available"),
        }

        let (direction, confidence) = signal_from_ratio(card.ratio());
        let signal = Signal::new(Self::ID, direction, confidence)
            .with_rationale(card.rationale())
            .with_metric("quality_ratio", quality.ratio())
            .with_metric("pricing_ratio", pricing.ratio())
            .with_metric("score", card.score);

        let mut patch = StatePatch::new();
        patch.insert_derived_typed(Self::OUTPUT_KEY, &card)?;
        Ok(NodeOutput::from_signal(signal).with_patch(patch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use quorum_core::{AnalysisState, Direction};
    use serde_json::json;
    use std::sync::Arc;

    fn scorecard(score: f64, max: f64) -> serde_json::Value {
        json!({ "score": score, "max_score": max, "details": [] })
    }

    fn snapshot(
        quality: serde_json::Value,
        pricing: serde_json::Value,
        growth: Option<f64>,
    ) -> StateSnapshot {
        let mut state = AnalysisState::new("ACME", Utc::now())
            .with_seed_value(FundamentalsNode::OUTPUT_KEY, quality)
            .with_seed_value(ValuationNode::OUTPUT_KEY, pricing);
        if let Some(growth) = growth {
            state = state.with_seed_value(metrics::EARNINGS_GROWTH, json!(growth));
        }
        Arc::new(state)
    }

    #[tokio::test]
    async fn test_quality_at_a_discount_is_bullish() {
        let state = snapshot(scorecard(7.0, 7.0), scorecard(9.0, 10.0), Some(0.12));
        let output = ValueInvestorNode.evaluate(state).await.unwrap();
        let signal = output.signal.unwrap();

        assert_eq!(signal.direction, Direction::Bullish);
        assert!(signal.rationale.contains("wonderful business"));
    }

    #[tokio::test]
    async fn test_expensive_poor_business_is_bearish() {
        let state = snapshot(scorecard(1.0, 7.0), scorecard(1.0, 10.0), Some(-0.05));
        let output = ValueInvestorNode.evaluate(state).await.unwrap();
        let signal = output.signal.unwrap();

        assert_eq!(signal.direction, Direction::Bearish);
        assert!(signal.rationale.contains("earnings shrinking"));
    }

    #[tokio::test]
    async fn test_missing_upstream_scorecard_fails() {
        let state = Arc::new(
            AnalysisState::new("ACME", Utc::now())
                .with_seed_value(ValuationNode::OUTPUT_KEY, scorecard(5.0, 10.0)),
        );
        let err = ValueInvestorNode.evaluate(state).await.unwrap_err();
        assert!(matches!(err, NodeError::Evaluation(msg) if msg.contains("fundamentals")));
    }
}
