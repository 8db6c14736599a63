//! Position snapshot reported by an execution gateway.

use serde::{Deserialize, Serialize};

/// A held position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Symbol
    pub symbol: String,
    /// Shares held
    pub volume: u64,
    /// Average cost per share
    pub cost: f64,
    /// Unrealized P&L at the last mark
    pub floating_pnl: f64,
    /// Market value at the last mark
    pub market_value: f64,
}

impl Position {
    /// Open a position marked at its cost.
    pub fn new(symbol: &str, volume: u64, cost: f64) -> Self {
        Self {
            symbol: symbol.to_string(),
            volume,
            cost,
            floating_pnl: 0.0,
            market_value: cost * volume as f64,
        }
    }

    /// Re-mark at `price`.
    pub fn mark(&mut self, price: f64) {
        self.market_value = price * self.volume as f64;
        self.floating_pnl = self.market_value - self.invested_amount();
    }

    /// Add shares bought at `price`, updating the average cost.
    pub fn add(&mut self, volume: u64, price: f64) {
        let total = self.volume + volume;
        if total > 0 {
            self.cost = (self.invested_amount() + price * volume as f64) / total as f64;
        }
        self.volume = total;
    }

    /// Get invested amount
    pub fn invested_amount(&self) -> f64 {
        self.cost * self.volume as f64
    }

    /// Unrealized P&L percentage
    pub fn floating_pnl_pct(&self) -> f64 {
        let invested = self.invested_amount();
        if invested > 0.0 {
            self.floating_pnl / invested * 100.0
        } else {
            0.0
        }
    }

    /// Get a summary string
    pub fn summary(&self) -> String {
        format!(
            "{} | 数量:{} | 成本:{:.2} | 市值:{:.2} | 盈亏:{:+.2} ({:+.1}%)",
            self.symbol,
            self.volume,
            self.cost,
            self.market_value,
            self.floating_pnl,
            self.floating_pnl_pct()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark() {
        let mut pos = Position::new("SHSE.600000", 100, 10.0);
        pos.mark(11.0);

        assert!((pos.market_value - 1100.0).abs() < 0.01);
        assert!((pos.floating_pnl - 100.0).abs() < 0.01);
        assert!((pos.floating_pnl_pct() - 10.0).abs() < 0.01);
    }

    #[test]
    fn test_add_averages_cost() {
        let mut pos = Position::new("SHSE.600000", 100, 10.0);
        pos.add(100, 12.0);

        assert_eq!(pos.volume, 200);
        assert!((pos.cost - 11.0).abs() < 1e-9);
        assert!((pos.invested_amount() - 2200.0).abs() < 1e-9);
    }

    #[test]
    fn test_summary() {
        let pos = Position::new("SHSE.600000", 100, 10.0);
        assert!(pos.summary().starts_with("SHSE.600000 | 数量:100"));
    }
}
