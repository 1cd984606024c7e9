//! Sentiment persona: insider activity and news tone

use crate::metrics;
use crate::score::{Scorecard, signal_from_ratio};
use async_trait::async_trait;
use quorum_core::{AnalysisNode, NodeError, NodeOutput, Signal, StatePatch, StateSnapshot};

const INSIDER_WEIGHT: f64 = 0.3;
const NEWS_WEIGHT: f64 = 0.7;

/// Weighs insider buying against selling and folds in aggregate news tone
///
/// Insider net activity and news tone each map onto a 0-10 scale centered at
/// 5; the composite weighs news at 70% and insiders at 30%. Missing inputs
/// fall back to the neutral center.
pub struct SentimentNode;

impl SentimentNode {
    pub const ID: &'static str = "sentiment";
    pub const OUTPUT_KEY: &'static str = "sentiment_analysis";
}

#[async_trait]
impl AnalysisNode for SentimentNode {
    fn id(&self) -> &str {
        Self::ID
    }

    fn reads(&self) -> Vec<String> {
        vec![
            metrics::INSIDER_BUY_VALUE.to_string(),
            metrics::INSIDER_SELL_VALUE.to_string(),
            metrics::NEWS_SENTIMENT.to_string(),
        ]
    }

    fn produces(&self) -> Vec<String> {
        vec![Self::OUTPUT_KEY.to_string()]
    }

    async fn evaluate(&self, state: StateSnapshot) -> Result<NodeOutput, NodeError> {
        let mut card = Scorecard::new(10.0);

        let insider_score = match (
            state.get_f64(metrics::INSIDER_BUY_VALUE),
            state.get_f64(metrics::INSIDER_SELL_VALUE),
        ) {
            (Some(buy), Some(sell)) if buy + sell > 0.0 => {
                let net_ratio = (buy - sell) / (buy + sell);
                if net_ratio > 0.0 {
                    card.note(format!(
                        "insiders net buyers ({:.0}% of activity)",
                        net_ratio * 100.0
                    ));
                } else {
                    card.note(format!(
                        "insiders net sellers ({:.0}% of activity)",
                        -net_ratio * 100.0
                    ));
                }
                5.0 + net_ratio * 5.0
            }
            _ => {
                card.note("no recent insider transaction data");
                5.0
            }
        };

        let news_score = match state.get_f64(metrics::NEWS_SENTIMENT) {
            Some(tone) => {
                let tone = tone.clamp(-1.0, 1.0);
                if tone > 0.0 {
                    card.note(format!("news tone positive ({tone:.2})"));
                } else if tone < 0.0 {
                    card.note(format!("news tone negative ({tone:.2})"));
                } else {
                    card.note("news tone flat");
                }
                5.0 + tone * 5.0
            }
            None => {
                card.note("no recent news data");
                5.0
            }
        };

        card.score = insider_score * INSIDER_WEIGHT + news_score * NEWS_WEIGHT;

        let (direction, confidence) = signal_from_ratio(card.ratio());
        let signal = Signal::new(Self::ID, direction, confidence)
            .with_rationale(card.rationale())
            .with_metric("insider_score", insider_score)
            .with_metric("news_score", news_score)
            .with_metric("composite_score", card.score);

        let mut patch = StatePatch::new();
        patch.insert_derived_typed(Self::OUTPUT_KEY, &card)?;
        Ok(NodeOutput::from_signal(signal).with_patch(patch))
    }
}
