//! Contrarian investor persona: deep value in out-of-favor names

use crate::metrics;
use crate::score::{Scorecard, signal_from_ratio};
use async_trait::async_trait;
use quorum_core::{AnalysisNode, NodeError, NodeOutput, Signal, StatePatch, StateSnapshot};

/// Hunts for heavily sold-off companies whose balance sheet still holds
///
/// Drawdown from the 52-week high carries up to four points, balance-sheet
/// solvency three, and free-cash-flow yield three. High scores mean the
/// market has overshot to the downside.
pub struct ContrarianInvestorNode;

impl ContrarianInvestorNode {
    pub const ID: &'static str = "contrarian_investor";
    pub const OUTPUT_KEY: &'static str = "contrarian_analysis";
}

#[async_trait]
impl AnalysisNode for ContrarianInvestorNode {
    fn id(&self) -> &str {
        Self::ID
    }

    fn reads(&self) -> Vec<String> {
        vec![
            metrics::CURRENT_PRICE.to_string(),
            metrics::WEEK_52_HIGH.to_string(),
            metrics::TOTAL_ASSETS.to_string(),
            metrics::TOTAL_LIABILITIES.to_string(),
            metrics::FREE_CASH_FLOW.to_string(),
            metrics::MARKET_CAP.to_string(),
        ]
    }

    fn produces(&self) -> Vec<String> {
        vec![Self::OUTPUT_KEY.to_string()]
    }

    async fn evaluate(&self, state: StateSnapshot) -> Result<NodeOutput, NodeError> {
        let mut card = Scorecard::new(10.0);
        let mut drawdown = None;

        match (
            state.get_f64(metrics::CURRENT_PRICE),
            state.get_f64(metrics::WEEK_52_HIGH),
        ) {
            (Some(price), Some(high)) if high > 0.0 => {
                let dd = (1.0 - price / high).max(0.0);
                drawdown = Some(dd);
                if dd >= 0.40 {
                    card.award(4.0, format!("{:.0}% off the 52-week high, deeply out of favor", dd * 100.0));
                } else if dd >= 0.25 {
                    card.award(2.0, format!("{:.0}% off the 52-week high", dd * 100.0));
                } else {
                    card.note("trading near the 52-week high, no dislocation");
                }
            }
            _ => card.note("52-week range data not available"),
        }

        match (
            state.get_f64(metrics::TOTAL_ASSETS),
            state.get_f64(metrics::TOTAL_LIABILITIES),
        ) {
            (Some(assets), Some(liabilities)) if liabilities > 0.0 => {
                let coverage = assets / liabilities;
                if coverage > 2.0 {
                    card.award(3.0, format!("assets cover liabilities {coverage:.1}x"));
                } else if coverage > 1.5 {
                    card.award(2.0, format!("adequate asset coverage of {coverage:.1}x"));
                } else if coverage > 1.0 {
                    card.note(format!("thin asset coverage of {coverage:.1}x"));
                } else {
                    card.note("liabilities exceed assets, balance sheet distressed");
                }
            }
            _ => card.note("balance sheet data not available"),
        }

        match (
            state.get_f64(metrics::FREE_CASH_FLOW),
            state.get_f64(metrics::MARKET_CAP),
        ) {
            (Some(fcf), Some(cap)) if cap > 0.0 && fcf > 0.0 => {
                let fcf_yield = fcf / cap;
                if fcf_yield >= 0.10 {
                    card.award(3.0, format!("free cash flow yield of {:.0}%", fcf_yield * 100.0));
                } else if fcf_yield >= 0.05 {
                    card.award(1.0, format!("free cash flow yield of {:.0}%", fcf_yield * 100.0));
                } else {
                    card.note(format!("thin free cash flow yield of {:.1}%", fcf_yield * 100.0));
                }
            }
            (Some(fcf), Some(_)) if fcf <= 0.0 => card.note("burning cash"),
            _ => card.note("free cash flow data not available"),
        }

        let (direction, confidence) = signal_from_ratio(card.ratio());
        let mut signal = Signal::new(Self::ID, direction, confidence)
            .with_rationale(card.rationale())
            .with_metric("score", card.score);
        if let Some(drawdown) = drawdown {
            signal = signal.with_metric("drawdown", drawdown);
        }

        let mut patch = StatePatch::new();
        patch.insert_derived_typed(Self::OUTPUT_KEY, &card)?;
        Ok(NodeOutput::from_signal(signal).with_patch(patch))
    }
}
