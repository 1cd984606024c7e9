//! Technicals persona: indicator-based trend and momentum read

use crate::metrics;
use async_trait::async_trait;
use quorum_core::{
    AnalysisNode, Direction, NodeError, NodeOutput, Signal, StatePatch, StateSnapshot,
};
use serde::{Deserialize, Serialize};
use ta::Next;
use ta::indicators::{ExponentialMovingAverage, RelativeStrengthIndex, SimpleMovingAverage};

const RSI_PERIOD: usize = 14;
const SMA_PERIOD: usize = 20;
const MIN_HISTORY: usize = 26;

/// Indicator snapshot the persona derives from the price history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnicalRead {
    pub rsi: f64,
    pub sma: f64,
    pub macd_line: f64,
    pub close: f64,
    pub details: Vec<String>,
}

/// Votes three indicators and takes the majority
///
/// RSI(14) below 30 reads oversold (bullish) and above 70 overbought
/// (bearish); price versus SMA(20) reads trend; the EMA(12/26) difference
/// reads momentum. Two agreeing indicators carry the direction.
pub struct TechnicalsNode;

impl TechnicalsNode {
    pub const ID: &'static str = "technicals";
    pub const OUTPUT_KEY: &'static str = "technicals_analysis";
}

#[async_trait]
impl AnalysisNode for TechnicalsNode {
    fn id(&self) -> &str {
        Self::ID
    }

    fn reads(&self) -> Vec<String> {
        vec![
            metrics::PRICE_HISTORY.to_string(),
            metrics::CURRENT_PRICE.to_string(),
        ]
    }

    fn produces(&self) -> Vec<String> {
        vec![Self::OUTPUT_KEY.to_string()]
    }

    async fn evaluate(&self, state: StateSnapshot) -> Result<NodeOutput, NodeError> {
        let closes: Vec<f64> = state
            .get_typed(metrics::PRICE_HISTORY)?
            .ok_or_else(|| NodeError::Evaluation("price history unavailable".to_string()))?;
        if closes.len() < MIN_HISTORY {
            return Err(NodeError::Evaluation(format!(
                "insufficient price history: {} closes, need at least {MIN_HISTORY}",
                closes.len()
            )));
        }
        let close = state
            .get_f64(metrics::CURRENT_PRICE)
            .or_else(|| closes.last().copied())
            .ok_or_else(|| NodeError::Evaluation("current price unavailable".to_string()))?;

        let mut rsi = RelativeStrengthIndex::new(RSI_PERIOD)
            .map_err(|e| NodeError::Evaluation(e.to_string()))?;
        let mut sma = SimpleMovingAverage::new(SMA_PERIOD)
            .map_err(|e| NodeError::Evaluation(e.to_string()))?;
        let mut ema_fast =
            ExponentialMovingAverage::new(12).map_err(|e| NodeError::Evaluation(e.to_string()))?;
        let mut ema_slow =
            ExponentialMovingAverage::new(26).map_err(|e| NodeError::Evaluation(e.to_string()))?;

        let mut last_rsi = 0.0;
        let mut last_sma = 0.0;
        let mut macd_line = 0.0;
        for value in &closes {
            last_rsi = rsi.next(*value);
            last_sma = sma.next(*value);
            macd_line = ema_fast.next(*value) - ema_slow.next(*value);
        }

        let mut details = Vec::new();
        let mut votes: Vec<Direction> = Vec::new();

        if last_rsi < 30.0 {
            votes.push(Direction::Bullish);
            details.push(format!("RSI {last_rsi:.1} oversold"));
        } else if last_rsi > 70.0 {
            votes.push(Direction::Bearish);
            details.push(format!("RSI {last_rsi:.1} overbought"));
        } else {
            votes.push(Direction::Neutral);
            details.push(format!("RSI {last_rsi:.1} neutral"));
        }

        if close > last_sma {
            votes.push(Direction::Bullish);
            details.push(format!("price above SMA{SMA_PERIOD} ({last_sma:.2})"));
        } else if close < last_sma {
            votes.push(Direction::Bearish);
            details.push(format!("price below SMA{SMA_PERIOD} ({last_sma:.2})"));
        } else {
            votes.push(Direction::Neutral);
            details.push(format!("price at SMA{SMA_PERIOD}"));
        }

        if macd_line > 0.0 {
            votes.push(Direction::Bullish);
            details.push(format!("MACD line positive ({macd_line:.3})"));
        } else {
            votes.push(Direction::Bearish);
            details.push(format!("MACD line negative ({macd_line:.3})"));
        }

        let bullish = votes.iter().filter(|v| v.is_bullish()).count();
        let bearish = votes.iter().filter(|v| v.is_bearish()).count();
        let (direction, confidence) = if bullish > bearish {
            (Direction::Bullish, bullish as f64 / votes.len() as f64)
        } else if bearish > bullish {
            (Direction::Bearish, bearish as f64 / votes.len() as f64)
        } else {
            (Direction::Neutral, 0.5)
        };

        let read = TechnicalRead {
            rsi: last_rsi,
            sma: last_sma,
            macd_line,
            close,
            details: details.clone(),
        };

        let signal = Signal::new(Self::ID, direction, confidence)
            .with_rationale(details.join("; "))
            .with_metric("rsi", last_rsi)
            .with_metric("sma", last_sma)
            .with_metric("macd_line", macd_line);

        let mut patch = StatePatch::new();
        patch.insert_derived_typed(Self::OUTPUT_KEY, &read)?;
        Ok(NodeOutput::from_signal(signal).with_patch(patch))
    }
}
