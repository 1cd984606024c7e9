//! Score accumulation shared by the persona analyzers

use quorum_core::Direction;
use serde::{Deserialize, Serialize};

/// Accumulated analysis score with the reasoning behind each point awarded
///
/// Personas award points against a fixed maximum and keep one detail line per
/// criterion; the scorecard is written to the shared state as the persona's
/// derived analysis and its ratio drives the emitted signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scorecard {
    pub score: f64,
    pub max_score: f64,
    pub details: Vec<String>,
}

impl Scorecard {
    /// Empty scorecard against a maximum
    pub fn new(max_score: f64) -> Self {
        Self {
            score: 0.0,
            max_score,
            details: Vec::new(),
        }
    }

    /// Award points with the reasoning
    pub fn award(&mut self, points: f64, detail: impl Into<String>) {
        self.score += points;
        self.details.push(detail.into());
    }

    /// Record reasoning without awarding points
    pub fn note(&mut self, detail: impl Into<String>) {
        self.details.push(detail.into());
    }

    /// Score as a fraction of the maximum, clamped into `[0, 1]`
    pub fn ratio(&self) -> f64 {
        if self.max_score <= 0.0 {
            return 0.0;
        }
        (self.score / self.max_score).clamp(0.0, 1.0)
    }

    /// All detail lines joined into one rationale string
    pub fn rationale(&self) -> String {
        self.details.join("; ")
    }
}

/// Map a score ratio onto a directional opinion
///
/// Committee convention: a ratio of 0.7 or better is a bullish read with the
/// ratio as conviction, 0.3 or worse is bearish with inverted conviction,
/// and everything between is neutral at half conviction.
pub fn signal_from_ratio(ratio: f64) -> (Direction, f64) {
    if ratio >= 0.7 {
        (Direction::Bullish, ratio.clamp(0.0, 1.0))
    } else if ratio <= 0.3 {
        (Direction::Bearish, (1.0 - ratio).clamp(0.0, 1.0))
    } else {
        (Direction::Neutral, 0.5)
    }
}
