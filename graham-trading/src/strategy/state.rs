//! Yearly rebalance state.

use serde::{Deserialize, Serialize};

/// Rebalance phase within the tracked year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RebalancePhase {
    /// Nothing processed yet this year
    AwaitingYearStart,
    /// Holdings liquidated on the first session
    LiquidationDone,
    /// New selection bought on the second session
    SelectionDone,
}

impl std::fmt::Display for RebalancePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AwaitingYearStart => write!(f, "awaiting_year_start"),
            Self::LiquidationDone => write!(f, "liquidation_done"),
            Self::SelectionDone => write!(f, "selection_done"),
        }
    }
}

/// Process-wide rebalance flags, reset whenever the calendar year changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebalanceState {
    /// Tracked calendar year (None before the first invocation)
    pub year: Option<i32>,
    pub liquidation_done: bool,
    pub selection_done: bool,
}

impl RebalanceState {
    /// Fresh state for `year`.
    pub fn for_year(year: i32) -> Self {
        Self {
            year: Some(year),
            liquidation_done: false,
            selection_done: false,
        }
    }

    /// This state if it already tracks `year`, otherwise a fresh one.
    pub fn rolled_to(self, year: i32) -> Self {
        if self.year == Some(year) {
            self
        } else {
            Self::for_year(year)
        }
    }

    pub fn phase(&self) -> RebalancePhase {
        if self.selection_done {
            RebalancePhase::SelectionDone
        } else if self.liquidation_done {
            RebalancePhase::LiquidationDone
        } else {
            RebalancePhase::AwaitingYearStart
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rollover_resets_flags() {
        let state = RebalanceState {
            year: Some(2023),
            liquidation_done: true,
            selection_done: true,
        };
        assert_eq!(state.phase(), RebalancePhase::SelectionDone);

        let rolled = state.rolled_to(2024);
        assert_eq!(rolled, RebalanceState::for_year(2024));
        assert_eq!(rolled.phase(), RebalancePhase::AwaitingYearStart);
    }

    #[test]
    fn test_same_year_keeps_flags() {
        let state = RebalanceState {
            year: Some(2024),
            liquidation_done: true,
            selection_done: false,
        };
        assert_eq!(state.rolled_to(2024), state);
        assert_eq!(state.phase(), RebalancePhase::LiquidationDone);
    }

    #[test]
    fn test_initial_state_rolls() {
        let state = RebalanceState::default();
        assert_eq!(state.year, None);
        assert_eq!(state.rolled_to(2024).year, Some(2024));
    }
}
