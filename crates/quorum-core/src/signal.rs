//! Signal and decision value types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Directional opinion emitted by an analysis node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Bullish,
    Bearish,
    Neutral,
}

impl Direction {
    /// Whether this direction argues for increasing exposure
    pub fn is_bullish(self) -> bool {
        matches!(self, Direction::Bullish)
    }

    /// Whether this direction argues for decreasing exposure
    pub fn is_bearish(self) -> bool {
        matches!(self, Direction::Bearish)
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Bullish => write!(f, "bullish"),
            Direction::Bearish => write!(f, "bearish"),
            Direction::Neutral => write!(f, "neutral"),
        }
    }
}

/// Immutable output of one analysis node for one run
///
/// A signal is created once by its node and never mutated afterwards; the
/// builder-style methods consume `self` so all construction happens before
/// the signal enters the run's result set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    /// Id of the node that emitted this signal
    #[serde(rename = "source_node_id")]
    pub source: String,
    /// Directional opinion
    pub direction: Direction,
    /// Conviction in the direction, in `[0, 1]`
    pub confidence: f64,
    /// Human-readable reasoning behind the opinion
    pub rationale: String,
    /// Numeric evidence backing the rationale
    pub metrics: HashMap<String, f64>,
    /// Emission time
    pub produced_at: DateTime<Utc>,
}

impl Signal {
    /// Create a new signal; confidence is clamped into `[0, 1]`
    pub fn new(source: impl Into<String>, direction: Direction, confidence: f64) -> Self {
        Self {
            source: source.into(),
            direction,
            confidence: confidence.clamp(0.0, 1.0),
            rationale: String::new(),
            metrics: HashMap::new(),
            produced_at: Utc::now(),
        }
    }

    /// Attach the reasoning text
    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = rationale.into();
        self
    }

    /// Attach one numeric metric backing the signal
    pub fn with_metric(mut self, key: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(key.into(), value);
        self
    }

    /// Weight of this signal in a directional vote: positive for bullish,
    /// negative for bearish, zero for neutral
    pub fn directional_weight(&self) -> f64 {
        match self.direction {
            Direction::Bullish => self.confidence,
            Direction::Bearish => -self.confidence,
            Direction::Neutral => 0.0,
        }
    }
}

/// Actionable recommendation produced by the aggregation stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Buy,
    Sell,
    Hold,
    Reduce,
    Increase,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Buy => write!(f, "buy"),
            Action::Sell => write!(f, "sell"),
            Action::Hold => write!(f, "hold"),
            Action::Reduce => write!(f, "reduce"),
            Action::Increase => write!(f, "increase"),
        }
    }
}

/// The run's final recommendation, combining all contributing signals under
/// the portfolio constraints that were in force
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    /// Recommended action
    pub action: Action,
    /// Position size in account currency, if the action implies one
    pub size: Option<f64>,
    /// Conviction in the recommendation, in `[0, 1]`
    pub confidence: f64,
    /// Signals that fed the aggregation, in committee order
    pub contributing_signals: Vec<Signal>,
    /// Constraint clamps and overrides applied during aggregation
    pub constraints_applied: Vec<String>,
}

impl Decision {
    /// Create a new decision; confidence is clamped into `[0, 1]`
    pub fn new(action: Action, confidence: f64) -> Self {
        Self {
            action,
            size: None,
            confidence: confidence.clamp(0.0, 1.0),
            contributing_signals: Vec::new(),
            constraints_applied: Vec::new(),
        }
    }

    /// Set the position size
    pub fn with_size(mut self, size: f64) -> Self {
        self.size = Some(size);
        self
    }

    /// Attach the signals that fed this decision
    pub fn with_contributing_signals(mut self, signals: Vec<Signal>) -> Self {
        self.contributing_signals = signals;
        self
    }

    /// Record a constraint that clamped or overrode the proposed action
    pub fn record_constraint(&mut self, description: impl Into<String>) {
        self.constraints_applied.push(description.into());
    }

    /// Whether any constraint altered the proposed action or size
    pub fn is_constrained(&self) -> bool {
        !self.constraints_applied.is_empty()
    }
}
