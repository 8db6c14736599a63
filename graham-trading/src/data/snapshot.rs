//! In-memory snapshot provider.
//!
//! Serves calendar, fundamentals and quotes from a `MarketSnapshot`, either
//! built in code or loaded from a JSON dataset. Lookups are point-in-time:
//! - daily metrics resolve to the latest observation on or before `as_of`
//! - annual metrics come from the single latest annual report disclosed on or
//!   before the date; a report whose field is empty yields no value, older
//!   years are never consulted
//!
//! A report without an explicit `disclosed` date is treated as published on
//! the statutory deadline (April 30 of the following year).
//!
//! # Dataset Layout
//!
//! ```json
//! {
//!   "calendars": { "SHSE": ["2024-01-02", "2024-01-03"] },
//!   "securities": [{
//!     "symbol": "SHSE.600000", "name": "浦发银行", "exchange": "SHSE",
//!     "listed_date": "1999-11-10",
//!     "daily":  [{ "date": "2024-01-02", "close": 6.6, "market_cap": 1.9e11,
//!                  "pe": 4.1, "pb": 0.36, "dividend_yield": 4.9 }],
//!     "annual": [{ "fiscal_year": 2023, "disclosed": "2024-03-28",
//!                  "current_ratio": 2.1, "net_profit": 3.6e10, "eps": 1.14 }]
//!   }]
//! }
//! ```

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::debug;

use super::provider::{FundamentalsProvider, MetricMap, ProviderError, TradingCalendar};
use super::{disclosure_deadline, EpsRecord, Security, UniverseQuery};

// ============================================================================
// Snapshot Types
// ============================================================================

/// One trading day of market-derived metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyObservation {
    pub date: NaiveDate,
    #[serde(default)]
    pub close: Option<f64>,
    #[serde(default)]
    pub market_cap: Option<f64>,
    /// Trailing PE
    #[serde(default)]
    pub pe: Option<f64>,
    #[serde(default)]
    pub pb: Option<f64>,
    /// Trailing dividend yield (%)
    #[serde(default)]
    pub dividend_yield: Option<f64>,
}

impl DailyObservation {
    /// Empty observation for `date`.
    pub fn on(date: NaiveDate) -> Self {
        Self {
            date,
            close: None,
            market_cap: None,
            pe: None,
            pb: None,
            dividend_yield: None,
        }
    }
}

/// One fiscal year of reported financials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnualReport {
    pub fiscal_year: i32,
    /// Publication date (defaults to the statutory deadline)
    #[serde(default)]
    pub disclosed: Option<NaiveDate>,
    #[serde(default)]
    pub current_ratio: Option<f64>,
    #[serde(default)]
    pub net_profit: Option<f64>,
    /// Basic EPS
    #[serde(default)]
    pub eps: Option<f64>,
}

impl AnnualReport {
    /// Empty report for `fiscal_year`.
    pub fn year(fiscal_year: i32) -> Self {
        Self {
            fiscal_year,
            disclosed: None,
            current_ratio: None,
            net_profit: None,
            eps: None,
        }
    }

    /// Date the report became public.
    pub fn disclosed_on(&self) -> Option<NaiveDate> {
        self.disclosed.or_else(|| disclosure_deadline(self.fiscal_year))
    }

    fn is_public(&self, as_of: NaiveDate) -> bool {
        self.disclosed_on().is_some_and(|d| d <= as_of)
    }
}

/// A security with its observation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecuritySnapshot {
    #[serde(flatten)]
    pub security: Security,
    #[serde(default)]
    pub daily: Vec<DailyObservation>,
    #[serde(default)]
    pub annual: Vec<AnnualReport>,
}

impl SecuritySnapshot {
    pub fn new(security: Security) -> Self {
        Self {
            security,
            daily: Vec::new(),
            annual: Vec::new(),
        }
    }

    pub fn with_daily(mut self, observation: DailyObservation) -> Self {
        self.daily.push(observation);
        self
    }

    pub fn with_annual(mut self, report: AnnualReport) -> Self {
        self.annual.push(report);
        self
    }
}

/// Complete dataset served by `SnapshotProvider`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    /// Trading sessions per exchange
    #[serde(default)]
    pub calendars: BTreeMap<String, Vec<NaiveDate>>,
    #[serde(default)]
    pub securities: Vec<SecuritySnapshot>,
}

impl MarketSnapshot {
    pub fn with_calendar(mut self, exchange: &str, sessions: Vec<NaiveDate>) -> Self {
        self.calendars.insert(exchange.to_string(), sessions);
        self
    }

    pub fn with_security(mut self, security: SecuritySnapshot) -> Self {
        self.securities.push(security);
        self
    }
}

// ============================================================================
// Snapshot Provider
// ============================================================================

/// Calendar and fundamentals provider backed by a `MarketSnapshot`.
#[derive(Debug, Clone)]
pub struct SnapshotProvider {
    calendars: BTreeMap<String, Vec<NaiveDate>>,
    /// Listing order of symbols
    order: Vec<String>,
    securities: HashMap<String, SecuritySnapshot>,
}

impl SnapshotProvider {
    /// Index a snapshot, sorting every history by date.
    pub fn new(snapshot: MarketSnapshot) -> Self {
        let mut calendars = snapshot.calendars;
        for sessions in calendars.values_mut() {
            sessions.sort_unstable();
            sessions.dedup();
        }

        let mut order = Vec::with_capacity(snapshot.securities.len());
        let mut securities = HashMap::with_capacity(snapshot.securities.len());
        for mut entry in snapshot.securities {
            entry.daily.sort_by_key(|o| o.date);
            entry.annual.sort_by_key(|r| r.fiscal_year);
            let symbol = entry.security.symbol.clone();
            if securities.insert(symbol.clone(), entry).is_none() {
                order.push(symbol);
            }
        }

        Self {
            calendars,
            order,
            securities,
        }
    }

    /// Load a JSON dataset from disk.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot from {}", path.display()))?;
        let snapshot: MarketSnapshot = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse snapshot from {}", path.display()))?;

        debug!(
            path = %path.display(),
            securities = snapshot.securities.len(),
            calendars = snapshot.calendars.len(),
            "Loaded market snapshot"
        );

        Ok(Self::new(snapshot))
    }

    /// Number of securities in the snapshot.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn latest_daily<F>(&self, symbol: &str, as_of: NaiveDate, field: F) -> Option<f64>
    where
        F: Fn(&DailyObservation) -> Option<f64>,
    {
        self.securities.get(symbol)?.daily.iter().rev()
            .filter(|o| o.date <= as_of)
            .find_map(field)
    }

    /// Field of the latest report public on `as_of`, without falling back
    /// to older years when that field is empty.
    fn latest_annual<F>(&self, symbol: &str, as_of: NaiveDate, field: F) -> Option<f64>
    where
        F: Fn(&AnnualReport) -> Option<f64>,
    {
        self.securities.get(symbol)?.annual.iter().rev()
            .find(|r| r.is_public(as_of))
            .and_then(field)
    }

    fn batch<F>(&self, symbols: &[String], lookup: F) -> MetricMap
    where
        F: Fn(&str) -> Option<f64>,
    {
        symbols
            .iter()
            .filter_map(|s| lookup(s).map(|v| (s.clone(), v)))
            .collect()
    }

    fn single(
        &self,
        symbol: &str,
        metric: &str,
        as_of: NaiveDate,
        value: Option<f64>,
    ) -> Result<f64, ProviderError> {
        value.ok_or_else(|| {
            ProviderError::DataNotAvailable(format!("{} {} as of {}", symbol, metric, as_of))
        })
    }
}

impl TradingCalendar for SnapshotProvider {
    fn trading_sessions(
        &self,
        exchange: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<NaiveDate>, ProviderError> {
        Ok(self
            .calendars
            .get(exchange)
            .map(|sessions| {
                sessions
                    .iter()
                    .copied()
                    .filter(|d| *d >= start && *d <= end)
                    .collect()
            })
            .unwrap_or_default())
    }
}

impl FundamentalsProvider for SnapshotProvider {
    fn name(&self) -> &'static str {
        "snapshot"
    }

    fn list_universe(&self, query: &UniverseQuery) -> Result<Vec<Security>, ProviderError> {
        Ok(self
            .order
            .iter()
            .filter_map(|s| self.securities.get(s))
            .map(|entry| &entry.security)
            .filter(|sec| query.exchanges.is_empty() || query.exchanges.contains(&sec.exchange))
            .cloned()
            .collect())
    }

    fn market_cap(&self, symbols: &[String], as_of: NaiveDate) -> Result<MetricMap, ProviderError> {
        Ok(self.batch(symbols, |s| self.latest_daily(s, as_of, |o| o.market_cap)))
    }

    fn current_ratio(
        &self,
        symbols: &[String],
        as_of: NaiveDate,
    ) -> Result<MetricMap, ProviderError> {
        Ok(self.batch(symbols, |s| self.latest_annual(s, as_of, |r| r.current_ratio)))
    }

    fn net_profit(&self, symbols: &[String], as_of: NaiveDate) -> Result<MetricMap, ProviderError> {
        Ok(self.batch(symbols, |s| self.latest_annual(s, as_of, |r| r.net_profit)))
    }

    fn dividend_yield(
        &self,
        symbols: &[String],
        as_of: NaiveDate,
    ) -> Result<MetricMap, ProviderError> {
        Ok(self.batch(symbols, |s| self.latest_daily(s, as_of, |o| o.dividend_yield)))
    }

    fn annual_eps(
        &self,
        symbol: &str,
        start_year: i32,
        end_year: i32,
        as_of: NaiveDate,
    ) -> Result<Vec<EpsRecord>, ProviderError> {
        let entry = self
            .securities
            .get(symbol)
            .ok_or_else(|| ProviderError::DataNotAvailable(format!("unknown symbol {}", symbol)))?;

        Ok(entry
            .annual
            .iter()
            .filter(|r| r.fiscal_year >= start_year && r.fiscal_year <= end_year)
            .filter(|r| r.is_public(as_of))
            .filter_map(|r| {
                r.eps.map(|eps| EpsRecord {
                    fiscal_year: r.fiscal_year,
                    eps,
                })
            })
            .collect())
    }

    fn pe_ratio(&self, symbol: &str, as_of: NaiveDate) -> Result<f64, ProviderError> {
        self.single(symbol, "pe", as_of, self.latest_daily(symbol, as_of, |o| o.pe))
    }

    fn pb_ratio(&self, symbol: &str, as_of: NaiveDate) -> Result<f64, ProviderError> {
        self.single(symbol, "pb", as_of, self.latest_daily(symbol, as_of, |o| o.pb))
    }

    fn close_price(&self, symbol: &str, as_of: NaiveDate) -> Result<f64, ProviderError> {
        self.single(symbol, "close", as_of, self.latest_daily(symbol, as_of, |o| o.close))
    }
}

// ============================================================================
// Tests
// ============================================================================
