//! Valuation persona: DCF and owner-earnings intrinsic value versus price

use crate::metrics;
use crate::score::{Scorecard, signal_from_ratio};
use async_trait::async_trait;
use quorum_core::{AnalysisNode, NodeError, NodeOutput, Signal, StatePatch, StateSnapshot};

const DISCOUNT_RATE: f64 = 0.10;
const TERMINAL_GROWTH: f64 = 0.02;
const PROJECTION_YEARS: i32 = 5;
const DCF_SAFETY: f64 = 0.8;
const OWNER_EARNINGS_RETURN: f64 = 0.15;
const OWNER_EARNINGS_SAFETY: f64 = 0.25;
const GAP_THRESHOLD: f64 = 0.15;

/// Present value of a growing cash flow stream plus its terminal value
fn discounted_value(
    base_flow: f64,
    growth_rate: f64,
    discount_rate: f64,
    terminal_growth: f64,
    years: i32,
) -> f64 {
    if base_flow <= 0.0 {
        return 0.0;
    }
    let mut pv = 0.0;
    for year in 1..=years {
        let future = base_flow * (1.0 + growth_rate).powi(year);
        pv += future / (1.0 + discount_rate).powi(year);
    }
    let terminal = (base_flow * (1.0 + growth_rate).powi(years) * (1.0 + terminal_growth))
        / (discount_rate - terminal_growth);
    pv + terminal / (1.0 + discount_rate).powi(years)
}

/// Compares market cap against two intrinsic value estimates
///
/// A classic DCF on free cash flow (growth capped at 10%, 20% haircut) and a
/// Buffett-style owner-earnings valuation (15% required return, 25% margin
/// of safety). Each method with a value gap beyond 15% moves the score away
/// from its neutral center.
pub struct ValuationNode;

impl ValuationNode {
    pub const ID: &'static str = "valuation";
    pub const OUTPUT_KEY: &'static str = "valuation_analysis";
}

#[async_trait]
impl AnalysisNode for ValuationNode {
    fn id(&self) -> &str {
        Self::ID
    }

    fn reads(&self) -> Vec<String> {
        vec![
            metrics::FREE_CASH_FLOW.to_string(),
            metrics::NET_INCOME.to_string(),
            metrics::DEPRECIATION_AND_AMORTIZATION.to_string(),
            metrics::CAPITAL_EXPENDITURE.to_string(),
            metrics::WORKING_CAPITAL_CHANGE.to_string(),
            metrics::EARNINGS_GROWTH.to_string(),
            metrics::MARKET_CAP.to_string(),
        ]
    }

    fn produces(&self) -> Vec<String> {
        vec![Self::OUTPUT_KEY.to_string()]
    }

    async fn evaluate(&self, state: StateSnapshot) -> Result<NodeOutput, NodeError> {
        let market_cap = state
            .get_f64(metrics::MARKET_CAP)
            .ok_or_else(|| NodeError::Evaluation("market cap unavailable".to_string()))?;
        if market_cap <= 0.0 {
            return Err(NodeError::Evaluation("market cap is not positive".to_string()));
        }

        let mut card = Scorecard::new(10.0);
        card.score = 5.0;
        let growth = state
            .get_f64(metrics::EARNINGS_GROWTH)
            .unwrap_or(0.05)
            .min(0.10);

        let mut dcf_value = None;
        match state.get_f64(metrics::FREE_CASH_FLOW) {
            Some(fcf) if fcf > 0.0 => {
                let intrinsic =
                    discounted_value(fcf, growth, DISCOUNT_RATE, TERMINAL_GROWTH, PROJECTION_YEARS)
                        * DCF_SAFETY;
                let gap = (intrinsic - market_cap) / market_cap;
                dcf_value = Some(intrinsic);
                if gap > GAP_THRESHOLD {
                    card.award(2.5, format!("DCF value {:.0}% above market cap", gap * 100.0));
                } else if gap < -GAP_THRESHOLD {
                    card.award(-2.5, format!("DCF value {:.0}% below market cap", -gap * 100.0));
                } else {
                    card.note("DCF value near market cap");
                }
            }
            _ => card.note("insufficient free cash flow data for DCF analysis"),
        }

        let mut owner_earnings_value = None;
        let owner_earnings_inputs = (
            state.get_f64(metrics::NET_INCOME),
            state.get_f64(metrics::DEPRECIATION_AND_AMORTIZATION),
            state.get_f64(metrics::CAPITAL_EXPENDITURE),
            state.get_f64(metrics::WORKING_CAPITAL_CHANGE),
        );
        if let (Some(net_income), Some(depreciation), Some(capex), Some(wc_change)) =
            owner_earnings_inputs
        {
            let owner_earnings = net_income + depreciation - capex - wc_change;
            if owner_earnings > 0.0 {
                let intrinsic = discounted_value(
                    owner_earnings,
                    growth,
                    OWNER_EARNINGS_RETURN,
                    growth.min(0.03),
                    PROJECTION_YEARS,
                ) * (1.0 - OWNER_EARNINGS_SAFETY);
                let gap = (intrinsic - market_cap) / market_cap;
                owner_earnings_value = Some(intrinsic);
                if gap > GAP_THRESHOLD {
                    card.award(
                        2.5,
                        format!("owner earnings value {:.0}% above market cap", gap * 100.0),
                    );
                } else if gap < -GAP_THRESHOLD {
                    card.award(
                        -2.5,
                        format!("owner earnings value {:.0}% below market cap", -gap * 100.0),
                    );
                } else {
                    card.note("owner earnings value near market cap");
                }
            } else {
                card.note("owner earnings not positive");
            }
        } else {
            card.note("insufficient data for owner earnings analysis");
        }
        card.score = card.score.max(0.0);

        let (direction, confidence) = signal_from_ratio(card.ratio());
        let mut signal = Signal::new(Self::ID, direction, confidence)
            .with_rationale(card.rationale())
            .with_metric("market_cap", market_cap)
            .with_metric("growth_rate", growth);
        if let Some(value) = dcf_value {
            signal = signal.with_metric("dcf_value", value);
        }
        if let Some(value) = owner_earnings_value {
            signal = signal.with_metric("owner_earnings_value", value);
        }

        let mut patch = StatePatch::new();
        patch.insert_derived_typed(Self::OUTPUT_KEY, &card)?;
        Ok(NodeOutput::from_signal(signal).with_patch(patch))
    }
}
