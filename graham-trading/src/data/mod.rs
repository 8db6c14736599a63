//! Market data module.
//!
//! Holds the data model shared by every screening stage and the provider
//! interfaces the strategy consumes:
//! - **TradingCalendar**: ordered trading sessions per exchange
//! - **FundamentalsProvider**: cross-sectional snapshots (batched over symbols)
//!   and per-security time series
//!
//! `SnapshotProvider` is an in-memory implementation of both, loadable from a
//! JSON dataset.

mod provider;
pub mod snapshot;

pub use provider::{FundamentalsProvider, MetricMap, ProviderError, TradingCalendar};
pub use snapshot::{AnnualReport, DailyObservation, MarketSnapshot, SecuritySnapshot, SnapshotProvider};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ============================================================================
// Core Data Types
// ============================================================================

/// Name fragment marking special-treatment (ST / *ST) securities.
pub const SPECIAL_TREATMENT_MARKER: &str = "ST";

/// Name fragment marking securities in the delisting process.
pub const DELISTING_MARKER: &str = "退";

/// Status flags published with the security listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityFlags {
    /// Trading suspended
    #[serde(default)]
    pub suspended: bool,
    /// Delisted or in the delisting period
    #[serde(default)]
    pub delisted: bool,
    /// Special treatment (ST) status
    #[serde(default)]
    pub special_treatment: bool,
}

/// A listed security.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Security {
    /// Unique symbol (e.g., "SHSE.600000")
    pub symbol: String,
    /// Display name
    pub name: String,
    /// Listing exchange (e.g., "SHSE")
    #[serde(default)]
    pub exchange: String,
    /// First trading date
    pub listed_date: NaiveDate,
    /// Status flags
    #[serde(default)]
    pub flags: SecurityFlags,
}

impl Security {
    /// Create an unflagged security.
    pub fn new(symbol: &str, name: &str, listed_date: NaiveDate) -> Self {
        let exchange = symbol.split('.').next().unwrap_or_default().to_string();
        Self {
            symbol: symbol.to_string(),
            name: name.to_string(),
            exchange,
            listed_date,
            flags: SecurityFlags::default(),
        }
    }

    /// ST status, either flagged or carried in the name.
    pub fn is_special_treatment(&self) -> bool {
        self.flags.special_treatment || self.name.contains(SPECIAL_TREATMENT_MARKER)
    }

    /// Delisting status, either flagged or carried in the name.
    pub fn is_delisting(&self) -> bool {
        self.flags.delisted || self.name.contains(DELISTING_MARKER)
    }

    /// Whole days between listing and `date` (negative if not yet listed).
    pub fn listing_days(&self, date: NaiveDate) -> i64 {
        (date - self.listed_date).num_days()
    }
}

/// Parameters of a universe listing request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniverseQuery {
    /// Market identifier
    pub market: String,
    /// Security type (stocks only for this strategy)
    pub security_type: String,
    /// Exchanges to include; empty means all
    pub exchanges: Vec<String>,
}

impl Default for UniverseQuery {
    fn default() -> Self {
        Self {
            market: "A_SHARE".to_string(),
            security_type: "STOCK".to_string(),
            exchanges: vec!["SHSE".to_string(), "SZSE".to_string()],
        }
    }
}

/// Basic EPS of one fiscal year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpsRecord {
    /// Fiscal year (period ends December 31)
    pub fiscal_year: i32,
    /// Basic earnings per share
    pub eps: f64,
}

/// December 31 of `year`, the fiscal year-end used by annual reports.
pub fn fiscal_year_end(year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, 12, 31)
}

/// Statutory publication deadline of the annual report for `fiscal_year`
/// (April 30 of the following year).
pub fn disclosure_deadline(fiscal_year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(fiscal_year + 1, 4, 30)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_name_markers() {
        let st = Security::new("SZSE.000002", "*ST 万科", date(2000, 1, 1));
        assert!(st.is_special_treatment());
        assert!(!st.is_delisting());

        let delisting = Security::new("SHSE.600001", "退市海润", date(2000, 1, 1));
        assert!(delisting.is_delisting());

        let plain = Security::new("SHSE.600000", "浦发银行", date(1999, 11, 10));
        assert!(!plain.is_special_treatment());
        assert!(!plain.is_delisting());
        assert_eq!(plain.exchange, "SHSE");
    }

    #[test]
    fn test_flags_override_name() {
        let mut sec = Security::new("SHSE.600000", "浦发银行", date(1999, 11, 10));
        sec.flags.delisted = true;
        assert!(sec.is_delisting());
    }

    #[test]
    fn test_listing_days() {
        let sec = Security::new("SHSE.600000", "浦发银行", date(2020, 1, 1));
        assert_eq!(sec.listing_days(date(2020, 1, 11)), 10);
        assert!(sec.listing_days(date(2019, 12, 31)) < 0);
    }

    #[test]
    fn test_fiscal_year_end() {
        assert_eq!(fiscal_year_end(2023), Some(date(2023, 12, 31)));
        assert_eq!(disclosure_deadline(2023), Some(date(2024, 4, 30)));
    }
}
