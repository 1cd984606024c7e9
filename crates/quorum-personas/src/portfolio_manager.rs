//! Portfolio manager: terminal aggregation into the final decision

use crate::metrics;
use crate::risk_manager::RiskManagerNode;
use async_trait::async_trait;
use quorum_core::{
    Action, AnalysisNode, Decision, Direction, NodeError, NodeOutput, Signal, StatePatch,
    StateSnapshot, keys,
};
use quorum_data::{PORTFOLIO_KEY, PortfolioContext, RiskLimits};
use std::sync::Arc;
use tracing::debug;

/// Committee consensus produced by a combination policy
#[derive(Debug, Clone, Copy)]
pub struct Consensus {
    pub direction: Direction,
    pub confidence: f64,
    /// Net directional weight in `[-1, 1]`
    pub net_score: f64,
}

/// Pluggable rule for folding persona signals into one consensus
///
/// The shipped default weighs conviction; alternatives (straight majority,
/// rule-based overrides) can be supplied per graph without touching the
/// engine.
pub trait CombinePolicy: Send + Sync {
    fn combine(&self, signals: &[Signal]) -> Consensus;
}

/// Confidence-weighted directional vote
///
/// Sums bullish confidence against bearish confidence, normalized by total
/// conviction; a net weight beyond the threshold carries the direction.
#[derive(Debug, Clone, Copy)]
pub struct ConfidenceWeighted {
    pub threshold: f64,
}

impl Default for ConfidenceWeighted {
    fn default() -> Self {
        Self { threshold: 0.25 }
    }
}

impl CombinePolicy for ConfidenceWeighted {
    fn combine(&self, signals: &[Signal]) -> Consensus {
        let total: f64 = signals.iter().map(|s| s.confidence).sum();
        if total <= 0.0 {
            return Consensus {
                direction: Direction::Neutral,
                confidence: 0.0,
                net_score: 0.0,
            };
        }
        let net_score: f64 =
            signals.iter().map(Signal::directional_weight).sum::<f64>() / total;

        let (direction, confidence) = if net_score >= self.threshold {
            (Direction::Bullish, net_score.abs())
        } else if net_score <= -self.threshold {
            (Direction::Bearish, net_score.abs())
        } else {
            (Direction::Neutral, 1.0 - net_score.abs())
        };

        Consensus {
            direction,
            confidence: confidence.clamp(0.0, 1.0),
            net_score,
        }
    }
}

/// Terminal node: folds every persona signal into the run's decision
///
/// An ordinary analysis node with the same failure-isolation semantics as
/// the rest of the committee; it additionally applies the risk limits before
/// emitting the decision, recording every clamp in `constraints_applied`.
pub struct PortfolioManagerNode {
    persona_ids: Vec<String>,
    policy: Arc<dyn CombinePolicy>,
}

impl PortfolioManagerNode {
    pub const ID: &'static str = "portfolio_manager";

    /// Node aggregating the given persona signals under the given policy
    pub fn new(persona_ids: Vec<String>, policy: Arc<dyn CombinePolicy>) -> Self {
        Self {
            persona_ids,
            policy,
        }
    }

    /// Decide what to do about a directional consensus given the portfolio
    fn decide(
        &self,
        consensus: Consensus,
        limits: &RiskLimits,
        portfolio: &PortfolioContext,
        instrument_id: &str,
    ) -> Decision {
        match consensus.direction {
            Direction::Bullish => {
                let action = if portfolio.is_long(instrument_id) {
                    Action::Increase
                } else {
                    Action::Buy
                };
                let desired = consensus.confidence * portfolio.total_value();
                let mut decision = Decision::new(action, consensus.confidence);
                if desired > limits.max_position_size {
                    decision = decision.with_size(limits.max_position_size);
                    decision.record_constraint(format!(
                        "proposed size {desired:.2} capped at {:.2} by position limit",
                        limits.max_position_size
                    ));
                } else {
                    decision = decision.with_size(desired);
                }
                if limits.max_position_size <= 0.0 {
                    decision.action = Action::Hold;
                    decision.size = None;
                    decision.record_constraint(
                        "no remaining position capacity, holding instead".to_string(),
                    );
                }
                decision
            }
            Direction::Bearish => {
                if portfolio.is_long(instrument_id) {
                    let action = if consensus.confidence >= 0.75 {
                        Action::Sell
                    } else {
                        Action::Reduce
                    };
                    Decision::new(action, consensus.confidence)
                } else {
                    // Nothing held to sell; shorting is a policy decision the
                    // committee does not take on its own.
                    Decision::new(Action::Hold, consensus.confidence)
                }
            }
            Direction::Neutral => Decision::new(Action::Hold, consensus.confidence),
        }
    }
}

#[async_trait]
impl AnalysisNode for PortfolioManagerNode {
    fn id(&self) -> &str {
        Self::ID
    }

    fn reads(&self) -> Vec<String> {
        let mut reads = self.persona_ids.clone();
        reads.push(RiskManagerNode::OUTPUT_KEY.to_string());
        reads.push(metrics::CURRENT_PRICE.to_string());
        reads.push(PORTFOLIO_KEY.to_string());
        reads
    }

    fn produces(&self) -> Vec<String> {
        vec![keys::DECISION.to_string()]
    }

    async fn evaluate(&self, state: StateSnapshot) -> Result<NodeOutput, NodeError> {
        let contributing: Vec<Signal> = self
            .persona_ids
            .iter()
            .filter_map(|id| state.signal_from(id).cloned())
            .collect();
        if contributing.is_empty() {
            return Err(NodeError::Evaluation(
                "no persona signals available to aggregate".to_string(),
            ));
        }

        let limits: RiskLimits = state
            .get_typed(RiskManagerNode::OUTPUT_KEY)?
            .ok_or_else(|| NodeError::Evaluation("risk limits missing".to_string()))?;
        let portfolio: PortfolioContext = state.get_typed(PORTFOLIO_KEY)?.unwrap_or_default();

        let consensus = self.policy.combine(&contributing);
        debug!(
            direction = %consensus.direction,
            net_score = consensus.net_score,
            signals = contributing.len(),
            "committee consensus"
        );

        let mut decision = self.decide(consensus, &limits, &portfolio, &state.instrument_id);
        decision = decision.with_contributing_signals(contributing.clone());

        let bullish = contributing.iter().filter(|s| s.direction.is_bullish()).count();
        let bearish = contributing.iter().filter(|s| s.direction.is_bearish()).count();
        let rationale = format!(
            "{bullish} bullish / {bearish} bearish of {} personas, net weight {:.2}: {}",
            contributing.len(),
            consensus.net_score,
            decision.action
        );

        let signal = Signal::new(Self::ID, consensus.direction, consensus.confidence)
            .with_rationale(rationale)
            .with_metric("net_score", consensus.net_score)
            .with_metric("signal_count", contributing.len() as f64);

        let mut patch = StatePatch::new();
        patch.insert_derived_typed(keys::DECISION, &decision)?;
        Ok(NodeOutput::from_signal(signal).with_patch(patch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use quorum_core::AnalysisState;
    use serde_json::json;

    fn signal(source: &str, direction: Direction, confidence: f64) -> Signal {
        Signal::new(source, direction, confidence)
    }

    fn policy() -> ConfidenceWeighted {
        ConfidenceWeighted::default()
    }

    #[test]
    fn test_weighted_vote_bullish() {
        let consensus = policy().combine(&[
            signal("a", Direction::Bullish, 0.9),
            signal("b", Direction::Bullish, 0.7),
            signal("c", Direction::Bearish, 0.3),
        ]);
        assert_eq!(consensus.direction, Direction::Bullish);
        assert!(consensus.net_score > 0.25);
    }

    #[test]
    fn test_weighted_vote_disagreement_is_neutral() {
        let consensus = policy().combine(&[
            signal("a", Direction::Bullish, 0.6),
            signal("b", Direction::Bearish, 0.6),
        ]);
        assert_eq!(consensus.direction, Direction::Neutral);
        assert_eq!(consensus.net_score, 0.0);
    }

    #[test]
    fn test_conviction_outweighs_headcount() {
        // Two lukewarm bulls against one emphatic bear.
        let consensus = policy().combine(&[
            signal("a", Direction::Bullish, 0.3),
            signal("b", Direction::Bullish, 0.3),
            signal("c", Direction::Bearish, 1.0),
        ]);
        assert_eq!(consensus.direction, Direction::Bearish);
    }

    #[test]
    fn test_empty_vote_is_neutral() {
        let consensus = policy().combine(&[]);
        assert_eq!(consensus.direction, Direction::Neutral);
        assert_eq!(consensus.confidence, 0.0);
    }

    fn node() -> PortfolioManagerNode {
        PortfolioManagerNode::new(
            vec!["alpha".to_string(), "beta".to_string()],
            Arc::new(ConfidenceWeighted::default()),
        )
    }

    fn state_with(
        signals: Vec<Signal>,
        limits: RiskLimits,
        portfolio: &PortfolioContext,
    ) -> StateSnapshot {
        let mut state = AnalysisState::new("ACME", Utc::now())
            .with_seed_value(
                RiskManagerNode::OUTPUT_KEY,
                serde_json::to_value(limits).unwrap(),
            )
            .with_seed_value(PORTFOLIO_KEY, serde_json::to_value(portfolio).unwrap())
            .with_seed_value(metrics::CURRENT_PRICE, json!(40.0));
        for (position, signal) in signals.into_iter().enumerate() {
            state.insert_signal(position, signal);
        }
        Arc::new(state)
    }

    #[tokio::test]
    async fn test_bullish_consensus_buys_within_limits() {
        let state = state_with(
            vec![
                signal("alpha", Direction::Bullish, 0.8),
                signal("beta", Direction::Bullish, 0.6),
            ],
            RiskLimits {
                max_position_size: 5_000.0,
                max_risk_exposure: 5_000.0,
            },
            &PortfolioContext::new(100_000.0),
        );

        let output = node().evaluate(state).await.unwrap();
        let decision: Decision = {
            let mut scratch = AnalysisState::new("ACME", Utc::now());
            scratch.apply_patch(output.patch);
            scratch.get_typed(keys::DECISION).unwrap().unwrap()
        };

        assert_eq!(decision.action, Action::Buy);
        // Desired size (confidence x portfolio) exceeds the cap, so the cap
        // binds and is recorded.
        assert_eq!(decision.size, Some(5_000.0));
        assert!(decision.is_constrained());
        assert_eq!(decision.contributing_signals.len(), 2);
    }

    #[tokio::test]
    async fn test_bearish_consensus_with_position_reduces() {
        let portfolio = PortfolioContext::new(50_000.0).with_position("ACME", 100.0, 0.0, 40.0);
        let state = state_with(
            vec![
                signal("alpha", Direction::Bearish, 0.6),
                signal("beta", Direction::Neutral, 0.5),
            ],
            RiskLimits {
                max_position_size: 5_000.0,
                max_risk_exposure: 10_000.0,
            },
            &portfolio,
        );

        let output = node().evaluate(state).await.unwrap();
        let signal = output.signal.unwrap();
        assert_eq!(signal.direction, Direction::Bearish);
        assert!(signal.rationale.contains("reduce"));
    }

    #[tokio::test]
    async fn test_bearish_without_position_holds() {
        let state = state_with(
            vec![signal("alpha", Direction::Bearish, 0.9)],
            RiskLimits {
                max_position_size: 5_000.0,
                max_risk_exposure: 10_000.0,
            },
            &PortfolioContext::new(50_000.0),
        );

        let output = node().evaluate(state).await.unwrap();
        assert!(output.signal.unwrap().rationale.contains("hold"));
    }

    #[tokio::test]
    async fn test_exhausted_capacity_overrides_to_hold() {
        let state = state_with(
            vec![signal("alpha", Direction::Bullish, 0.9)],
            RiskLimits {
                max_position_size: 0.0,
                max_risk_exposure: 10_000.0,
            },
            &PortfolioContext::new(50_000.0),
        );

        let output = node().evaluate(state).await.unwrap();
        let mut scratch = AnalysisState::new("ACME", Utc::now());
        scratch.apply_patch(output.patch);
        let decision: Decision = scratch.get_typed(keys::DECISION).unwrap().unwrap();

        assert_eq!(decision.action, Action::Hold);
        assert!(decision.size.is_none());
        assert!(decision.constraints_applied.iter().any(|c| c.contains("no remaining")));
    }

    #[tokio::test]
    async fn test_no_persona_signals_is_an_error() {
        let state = state_with(
            Vec::new(),
            RiskLimits {
                max_position_size: 5_000.0,
                max_risk_exposure: 10_000.0,
            },
            &PortfolioContext::new(50_000.0),
        );
        let err = node().evaluate(state).await.unwrap_err();
        assert!(matches!(err, NodeError::Evaluation(msg) if msg.contains("no persona signals")));
    }
}
