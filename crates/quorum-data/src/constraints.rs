//! Portfolio context and the constraint provider boundary

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Seed-state key the run coordinator stores the portfolio context under
pub const PORTFOLIO_KEY: &str = "portfolio";

/// One holding, long and short sides tracked separately
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Shares held long
    pub long: f64,
    /// Shares held short
    pub short: f64,
    /// Last known price used to mark the position
    pub mark_price: f64,
}

/// Snapshot of the portfolio a run sizes positions against
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioContext {
    /// Available cash
    pub cash: f64,
    /// Holdings keyed by instrument id
    pub positions: HashMap<String, Position>,
}

impl Default for PortfolioContext {
    fn default() -> Self {
        Self::new(100_000.0)
    }
}

impl PortfolioContext {
    /// Portfolio with the given cash and no holdings
    pub fn new(cash: f64) -> Self {
        Self {
            cash,
            positions: HashMap::new(),
        }
    }

    /// Builder-style holding insertion
    pub fn with_position(
        mut self,
        instrument: impl Into<String>,
        long: f64,
        short: f64,
        mark_price: f64,
    ) -> Self {
        self.positions.insert(
            instrument.into(),
            Position {
                long,
                short,
                mark_price,
            },
        );
        self
    }

    /// Net liquidation value: cash plus marked long value minus the value of
    /// borrowed shares that must be bought back
    pub fn total_value(&self) -> f64 {
        self.cash
            + self
                .positions
                .values()
                .map(|p| (p.long - p.short) * p.mark_price)
                .sum::<f64>()
    }

    /// Absolute exposure to one instrument at the given price
    pub fn exposure(&self, instrument: &str, price: f64) -> f64 {
        self.positions
            .get(instrument)
            .map_or(0.0, |p| ((p.long - p.short) * price).abs())
    }

    /// Whether the portfolio currently holds the instrument net long
    pub fn is_long(&self, instrument: &str) -> bool {
        self.positions
            .get(instrument)
            .is_some_and(|p| p.long > p.short)
    }
}

/// Limits the aggregation stage applies to a proposed position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskLimits {
    /// Hard cap on the size of a new position, in account currency
    pub max_position_size: f64,
    /// Cap on total exposure to this instrument, in account currency
    pub max_risk_exposure: f64,
}

/// Boundary to external risk policy
///
/// Implementations may be shared across concurrent runs and must be safe for
/// concurrent invocation.
pub trait ConstraintProvider: Send + Sync {
    /// Limits for taking or extending a position in `instrument_id` at
    /// `price`, given the current portfolio
    fn limits_for(
        &self,
        instrument_id: &str,
        portfolio: &PortfolioContext,
        price: f64,
    ) -> RiskLimits;
}

/// Standard policy: a position is capped at a fixed share of portfolio
/// value, longs are bounded by available cash, and shorts by available
/// margin
#[derive(Debug, Clone, Copy)]
pub struct PercentOfPortfolioLimits {
    /// Maximum position as a fraction of total portfolio value
    pub position_cap_pct: f64,
    /// Margin requirement for short positions
    pub margin_requirement: f64,
}

impl Default for PercentOfPortfolioLimits {
    fn default() -> Self {
        Self {
            position_cap_pct: 0.20,
            margin_requirement: 0.50,
        }
    }
}

impl PercentOfPortfolioLimits {
    /// Policy capping positions at `position_cap_pct` of portfolio value
    pub fn new(position_cap_pct: f64) -> Self {
        Self {
            position_cap_pct,
            ..Self::default()
        }
    }
}

impl ConstraintProvider for PercentOfPortfolioLimits {
    fn limits_for(
        &self,
        instrument_id: &str,
        portfolio: &PortfolioContext,
        price: f64,
    ) -> RiskLimits {
        let total_value = portfolio.total_value();
        let position_limit = total_value * self.position_cap_pct;
        let current_exposure = portfolio.exposure(instrument_id, price);
        let remaining = (position_limit - current_exposure).max(0.0);

        let long_cap = remaining.min(portfolio.cash.max(0.0));
        let available_margin = portfolio.cash.max(0.0) / self.margin_requirement;
        let short_cap = remaining.min(available_margin);

        RiskLimits {
            max_position_size: long_cap.max(short_cap),
            max_risk_exposure: position_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_value_nets_shorts() {
        let portfolio = PortfolioContext::new(50_000.0)
            .with_position("ACME", 100.0, 0.0, 40.0)
            .with_position("GLOBEX", 0.0, 50.0, 20.0);

        // 50_000 + 100*40 - 50*20
        assert_eq!(portfolio.total_value(), 53_000.0);
    }

    #[test]
    fn test_exposure_is_absolute() {
        let portfolio = PortfolioContext::new(0.0).with_position("ACME", 0.0, 30.0, 10.0);
        assert_eq!(portfolio.exposure("ACME", 10.0), 300.0);
        assert_eq!(portfolio.exposure("GLOBEX", 10.0), 0.0);
    }

    #[test]
    fn test_limits_cap_at_portfolio_share() {
        let portfolio = PortfolioContext::new(100_000.0);
        let limits = PercentOfPortfolioLimits::default().limits_for("ACME", &portfolio, 42.0);

        assert_eq!(limits.max_risk_exposure, 20_000.0);
        // Remaining limit fits inside cash, shorts allowed up to 2x cash but
        // still bounded by the remaining limit.
        assert_eq!(limits.max_position_size, 20_000.0);
    }

    #[test]
    fn test_existing_exposure_shrinks_remaining_limit() {
        let portfolio = PortfolioContext::new(10_000.0).with_position("ACME", 400.0, 0.0, 40.0);
        // Total value 26_000, cap 5_200, exposure at price 40 is 16_000.
        let limits = PercentOfPortfolioLimits::default().limits_for("ACME", &portfolio, 40.0);
        assert_eq!(limits.max_position_size, 0.0);
    }

    #[test]
    fn test_long_cap_bounded_by_cash() {
        let portfolio = PortfolioContext::new(1_000.0).with_position("OTHER", 1_000.0, 0.0, 99.0);
        let limits = PercentOfPortfolioLimits::default().limits_for("ACME", &portfolio, 10.0);

        // Cap is 20% of 100_000 = 20_000; cash only supports 1_000 long but
        // margin supports 2_000 short.
        assert_eq!(limits.max_risk_exposure, 20_000.0);
        assert_eq!(limits.max_position_size, 2_000.0);
    }

    #[test]
    fn test_is_long() {
        let portfolio = PortfolioContext::new(0.0)
            .with_position("ACME", 10.0, 2.0, 5.0)
            .with_position("GLOBEX", 1.0, 4.0, 5.0);
        assert!(portfolio.is_long("ACME"));
        assert!(!portfolio.is_long("GLOBEX"));
        assert!(!portfolio.is_long("MISSING"));
    }
}
