//! Growth investor persona: growth at a reasonable price

use crate::metrics;
use crate::score::{Scorecard, signal_from_ratio};
use async_trait::async_trait;
use quorum_core::{AnalysisNode, NodeError, NodeOutput, Signal, StatePatch, StateSnapshot};

/// Looks for durable earnings growth that the market has not fully priced
///
/// Earnings growth carries up to four points, revenue growth two, and the
/// PEG ratio four: below 1 is a bargain, below 2 acceptable, above that the
/// growth is already paid for.
pub struct GrowthInvestorNode;

impl GrowthInvestorNode {
    pub const ID: &'static str = "growth_investor";
    pub const OUTPUT_KEY: &'static str = "growth_analysis";
}

#[async_trait]
impl AnalysisNode for GrowthInvestorNode {
    fn id(&self) -> &str {
        Self::ID
    }

    fn reads(&self) -> Vec<String> {
        vec![
            metrics::REVENUE_GROWTH.to_string(),
            metrics::EARNINGS_GROWTH.to_string(),
            metrics::PE_RATIO.to_string(),
        ]
    }

    fn produces(&self) -> Vec<String> {
        vec![Self::OUTPUT_KEY.to_string()]
    }

    async fn evaluate(&self, state: StateSnapshot) -> Result<NodeOutput, NodeError> {
        let mut card = Scorecard::new(10.0);

        let earnings_growth = state.get_f64(metrics::EARNINGS_GROWTH);
        match earnings_growth {
            Some(growth) if growth > 0.25 => {
                card.award(4.0, format!("exceptional earnings growth of {:.0}%", growth * 100.0));
            }
            Some(growth) if growth > 0.15 => {
                card.award(3.0, format!("strong earnings growth of {:.0}%", growth * 100.0));
            }
            Some(growth) if growth > 0.05 => {
                card.award(1.0, format!("moderate earnings growth of {:.0}%", growth * 100.0));
            }
            Some(growth) => card.note(format!("weak earnings growth of {:.0}%", growth * 100.0)),
            None => card.note("earnings growth data not available"),
        }

        match state.get_f64(metrics::REVENUE_GROWTH) {
            Some(growth) if growth > 0.10 => {
                card.award(2.0, format!("revenue growing {:.0}% a year", growth * 100.0));
            }
            Some(growth) => card.note(format!("slow revenue growth of {:.0}%", growth * 100.0)),
            None => card.note("revenue growth data not available"),
        }

        let mut peg = None;
        match (state.get_f64(metrics::PE_RATIO), earnings_growth) {
            (Some(pe), Some(growth)) if pe > 0.0 && growth > 0.0 => {
                let ratio = pe / (growth * 100.0);
                peg = Some(ratio);
                if ratio < 1.0 {
                    card.award(4.0, format!("PEG of {ratio:.2}, growth going cheap"));
                } else if ratio < 2.0 {
                    card.award(2.0, format!("PEG of {ratio:.2}, reasonably priced"));
                } else {
                    card.note(format!("PEG of {ratio:.2}, growth fully priced in"));
                }
            }
            _ => card.note("cannot compute PEG ratio"),
        }

        let (direction, confidence) = signal_from_ratio(card.ratio());
        let mut signal = Signal::new(Self::ID, direction, confidence)
            .with_rationale(card.rationale())
            .with_metric("score", card.score);
        if let Some(peg) = peg {
            signal = signal.with_metric("peg", peg);
        }

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
    async fn test_fast_grower_at_low_peg_is_bullish() {
        let state = snapshot(&[
            (metrics::EARNINGS_GROWTH, json!(0.30)),
            (metrics::REVENUE_GROWTH, json!(0.20)),
            (metrics::PE_RATIO, json!(18.0)),
        ]);

        let output = GrowthInvestorNode.evaluate(state).await.unwrap();
        let signal = output.signal.unwrap();
        assert_eq!(signal.direction, Direction::Bullish);
        assert!(signal.metrics["peg"] < 1.0);
        assert!(signal.rationale.contains("going cheap"));
    }

    #[tokio::test]
    async fn test_stalled_grower_is_bearish() {
        let state = snapshot(&[
            (metrics::EARNINGS_GROWTH, json!(0.01)),
            (metrics::REVENUE_GROWTH, json!(0.02)),
            (metrics::PE_RATIO, json!(40.0)),
        ]);

        let output = GrowthInvestorNode.evaluate(state).await.unwrap();
        let signal = output.signal.unwrap();
        assert_eq!(signal.direction, Direction::Bearish);
    }

    #[tokio::test]
    async fn test_missing_pe_still_scores_growth() {
        let state = snapshot(&[
            (metrics::EARNINGS_GROWTH, json!(0.30)),
            (metrics::REVENUE_GROWTH, json!(0.15)),
        ]);

        let output = GrowthInvestorNode.evaluate(state).await.unwrap();
        let signal = output.signal.unwrap();
        assert!(signal.rationale.contains("cannot compute PEG"));
        assert_eq!(signal.metrics["score"], 6.0);
    }
}
