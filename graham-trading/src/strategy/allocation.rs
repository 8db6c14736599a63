//! Equal-weight capital allocation.

use serde::{Deserialize, Serialize};

/// Cash split for one selection day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AllocationPlan {
    /// Available cash when the plan was made
    pub available_cash: f64,
    /// Number of selected securities
    pub count: usize,
    /// Notional of each buy order
    pub cash_per_stock: f64,
    /// Cash held back as a buffer against slippage and rounding
    pub frozen_cash: f64,
}

impl AllocationPlan {
    /// Split `invest_fraction` of `available_cash` equally across `count`
    /// securities and hold `reserve_fraction` back.
    pub fn equal_weight(
        available_cash: f64,
        count: usize,
        invest_fraction: f64,
        reserve_fraction: f64,
    ) -> Self {
        let cash = available_cash.max(0.0);
        let cash_per_stock = if count > 0 {
            cash * invest_fraction / count as f64
        } else {
            0.0
        };

        Self {
            available_cash,
            count,
            cash_per_stock,
            frozen_cash: cash * reserve_fraction,
        }
    }

    /// Total notional of all buy orders.
    pub fn invested_total(&self) -> f64 {
        self.cash_per_stock * self.count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_weight() {
        let plan = AllocationPlan::equal_weight(1_000_000.0, 4, 0.95, 0.045);
        assert!((plan.cash_per_stock - 237_500.0).abs() < 1e-6);
        assert!((plan.frozen_cash - 45_000.0).abs() < 1e-6);
        assert!((plan.invested_total() - 950_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_no_selection() {
        let plan = AllocationPlan::equal_weight(1_000_000.0, 0, 0.95, 0.045);
        assert_eq!(plan.cash_per_stock, 0.0);
        assert_eq!(plan.invested_total(), 0.0);
    }

    #[test]
    fn test_negative_cash_clamped() {
        let plan = AllocationPlan::equal_weight(-10.0, 2, 0.95, 0.045);
        assert_eq!(plan.cash_per_stock, 0.0);
        assert_eq!(plan.frozen_cash, 0.0);
    }
}
