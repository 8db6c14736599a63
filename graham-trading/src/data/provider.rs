//! Provider abstraction for calendar and fundamentals data.
//!
//! Calls are synchronous: the strategy runs one invocation at a time and
//! waits on every query. Implementations must be `Send + Sync` so the
//! per-security stage may fan out across threads.

use chrono::NaiveDate;
use std::collections::HashMap;
use thiserror::Error;

use super::{EpsRecord, Security, UniverseQuery};

/// Symbol to metric value, one entry per symbol the provider had data for.
pub type MetricMap = HashMap<String, f64>;

// ============================================================================
// Provider Error
// ============================================================================

/// Errors specific to data providers.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Network error (connection failed, timeout)
    #[error("Network error: {0}")]
    Network(String),
    /// Provider is temporarily unavailable
    #[error("Provider unavailable: {0}")]
    Unavailable(String),
    /// Data not available for the requested symbol/date
    #[error("Data not available: {0}")]
    DataNotAvailable(String),
    /// Invalid request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    /// Internal provider error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ProviderError {
    /// Check if the error is recoverable (worth retrying)
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Unavailable(_))
    }
}

// ============================================================================
// Provider Traits
// ============================================================================

/// Trading-session calendar.
pub trait TradingCalendar: Send + Sync {
    /// Ordered trading sessions of `exchange` within `[start, end]`.
    ///
    /// An empty result means the calendar is unavailable for that range.
    fn trading_sessions(
        &self,
        exchange: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<NaiveDate>, ProviderError>;
}

/// Fundamentals and valuation data.
///
/// Batched methods return only the symbols the provider has a value for;
/// a missing symbol is treated by callers as failing the stage.
pub trait FundamentalsProvider: Send + Sync {
    /// Provider name (for logs)
    fn name(&self) -> &'static str;

    /// List every security matching the query.
    fn list_universe(&self, query: &UniverseQuery) -> Result<Vec<Security>, ProviderError>;

    /// Total market value per symbol, latest observation on or before `as_of`.
    fn market_cap(&self, symbols: &[String], as_of: NaiveDate) -> Result<MetricMap, ProviderError>;

    /// Current ratio per symbol from the latest disclosed period on or before `as_of`.
    fn current_ratio(&self, symbols: &[String], as_of: NaiveDate)
        -> Result<MetricMap, ProviderError>;

    /// Net profit per symbol from the latest annual report published on or before `as_of`.
    fn net_profit(&self, symbols: &[String], as_of: NaiveDate) -> Result<MetricMap, ProviderError>;

    /// Trailing dividend yield per symbol, latest observation on or before `as_of`.
    fn dividend_yield(&self, symbols: &[String], as_of: NaiveDate)
        -> Result<MetricMap, ProviderError>;

    /// Annual basic EPS for fiscal years `start_year..=end_year` whose reports
    /// were published on or before `as_of`, ordered by year.
    fn annual_eps(
        &self,
        symbol: &str,
        start_year: i32,
        end_year: i32,
        as_of: NaiveDate,
    ) -> Result<Vec<EpsRecord>, ProviderError>;

    /// Latest trailing price-to-earnings.
    fn pe_ratio(&self, symbol: &str, as_of: NaiveDate) -> Result<f64, ProviderError>;

    /// Latest price-to-book.
    fn pb_ratio(&self, symbol: &str, as_of: NaiveDate) -> Result<f64, ProviderError>;

    /// Latest close price.
    fn close_price(&self, symbol: &str, as_of: NaiveDate) -> Result<f64, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_recoverable() {
        assert!(ProviderError::Network("timeout".into()).is_recoverable());
        assert!(ProviderError::Unavailable("maintenance".into()).is_recoverable());
        assert!(!ProviderError::DataNotAvailable("no data".into()).is_recoverable());
        assert!(!ProviderError::InvalidRequest("bad symbol".into()).is_recoverable());
    }

    #[test]
    fn test_provider_error_display() {
        let err = ProviderError::Network("connection refused".into());
        assert!(err.to_string().contains("connection refused"));

        let err = ProviderError::DataNotAvailable("SHSE.600000 pe".into());
        assert_eq!(err.to_string(), "Data not available: SHSE.600000 pe");
    }
}
