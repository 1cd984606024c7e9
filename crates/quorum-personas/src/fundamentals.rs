//! Fundamentals persona: balance-sheet quality scoring

use crate::metrics;
use crate::score::{Scorecard, signal_from_ratio};
use async_trait::async_trait;
use quorum_core::{AnalysisNode, NodeError, NodeOutput, Signal, StatePatch, StateSnapshot};

/// Scores profitability, leverage, margins, and liquidity
///
/// Criteria and weights: ROE above 15% (+2), debt-to-equity below 0.5 (+2),
/// operating margin above 15% (+2), current ratio above 1.5 (+1), out of 7.
pub struct FundamentalsNode;

impl FundamentalsNode {
    pub const ID: &'static str = "fundamentals";
    pub const OUTPUT_KEY: &'static str = "fundamentals_analysis";
}

#[async_trait]
impl AnalysisNode for FundamentalsNode {
    fn id(&self) -> &str {
        Self::ID
    }

    fn reads(&self) -> Vec<String> {
        vec![
            metrics::RETURN_ON_EQUITY.to_string(),
            metrics::DEBT_TO_EQUITY.to_string(),
            metrics::OPERATING_MARGIN.to_string(),
            metrics::CURRENT_RATIO.to_string(),
        ]
    }

    fn produces(&self) -> Vec<String> {
        vec![Self::OUTPUT_KEY.to_string()]
    }

    async fn evaluate(&self, state: StateSnapshot) -> Result<NodeOutput, NodeError> {
        let mut card = Scorecard::new(7.0);

        match state.get_f64(metrics::RETURN_ON_EQUITY) {
            Some(roe) if roe > 0.15 => card.award(2.0, format!("strong ROE of {:.1}%", roe * 100.0)),
            Some(roe) => card.note(format!("weak ROE of {:.1}%", roe * 100.0)),
            None => card.note("ROE data not available"),
        }

        match state.get_f64(metrics::DEBT_TO_EQUITY) {
            Some(dte) if dte < 0.5 => card.award(2.0, "conservative debt levels"),
            Some(dte) => card.note(format!("high debt to equity ratio of {dte:.1}")),
            None => card.note("debt to equity data not available"),
        }

        match state.get_f64(metrics::OPERATING_MARGIN) {
            Some(margin) if margin > 0.15 => card.award(2.0, "strong operating margins"),
            Some(margin) => card.note(format!("weak operating margin of {:.1}%", margin * 100.0)),
            None => card.note("operating margin data not available"),
        }

        match state.get_f64(metrics::CURRENT_RATIO) {
            Some(ratio) if ratio > 1.5 => card.award(1.0, "good liquidity position"),
            Some(ratio) => card.note(format!("weak liquidity with current ratio of {ratio:.1}")),
            None => card.note("current ratio data not available"),
        }

        let (direction, confidence) = signal_from_ratio(card.ratio());
        let signal = Signal::new(Self::ID, direction, confidence)
            .with_rationale(card.rationale())
            .with_metric("score", card.score)
            .with_metric("max_score", card.max_score);

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

    fn snapshot(entries: &[(&str, serde_json::Value)]) -> StateSnapshot {
        let mut state = AnalysisState::new("ACME", Utc::now());
        for (key, value) in entries {
            state = state.with_seed_value(*key, value.clone());
        }
        Arc::new(state)
    }

    #[tokio::test]
    async fn test_quality_company_scores_bullish() {
        let state = snapshot(&[
            (metrics::RETURN_ON_EQUITY, json!(0.22)),
            (metrics::DEBT_TO_EQUITY, json!(0.3)),
            (metrics::OPERATING_MARGIN, json!(0.25)),
            (metrics::CURRENT_RATIO, json!(2.1)),
        ]);

        let output = FundamentalsNode.evaluate(state).await.unwrap();
        let signal = output.signal.unwrap();
        assert_eq!(signal.direction, Direction::Bullish);
        assert_eq!(signal.metrics["score"], 7.0);
        assert!(signal.rationale.contains("strong ROE"));
    }

    #[tokio::test]
    async fn test_leveraged_low_margin_company_scores_bearish() {
        let state = snapshot(&[
            (metrics::RETURN_ON_EQUITY, json!(0.04)),
            (metrics::DEBT_TO_EQUITY, json!(2.4)),
            (metrics::OPERATING_MARGIN, json!(0.03)),
            (metrics::CURRENT_RATIO, json!(0.8)),
        ]);

        let output = FundamentalsNode.evaluate(state).await.unwrap();
        let signal = output.signal.unwrap();
        assert_eq!(signal.direction, Direction::Bearish);
        assert!(signal.rationale.contains("high debt to equity"));
    }

    #[tokio::test]
    async fn test_missing_metrics_degrade_to_neutral_notes() {
        let state = snapshot(&[(metrics::RETURN_ON_EQUITY, json!(0.22))]);

        let output = FundamentalsNode.evaluate(state).await.unwrap();
        let signal = output.signal.unwrap();
        // Only 2 of 7 points attainable; the absences are spelled out.
        assert!(signal.rationale.contains("not available"));
        assert_eq!(signal.metrics["score"], 2.0);
    }

    #[tokio::test]
    async fn test_scorecard_written_to_state() {
        let state = snapshot(&[(metrics::RETURN_ON_EQUITY, json!(0.22))]);
        let output = FundamentalsNode.evaluate(state).await.unwrap();
        assert!(
            output
                .patch
                .keys()
                .any(|key| key == FundamentalsNode::OUTPUT_KEY)
        );
    }
}
