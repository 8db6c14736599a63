//! Screening parameters.
//!
//! Immutable thresholds read by every filter stage. Built once from the
//! optional values in `ScreeningConfig`, falling back to the defaults below.

use graham_common::ScreeningConfig;
use serde::{Deserialize, Serialize};

/// Where the valuation stage takes its PE from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeSource {
    /// Provider's latest trailing PE
    #[default]
    Trailing,
    /// Latest close divided by the recent average EPS
    AverageEarnings,
}

impl std::str::FromStr for PeSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trailing" => Ok(Self::Trailing),
            "average_earnings" => Ok(Self::AverageEarnings),
            _ => Err(format!("Unknown PE source: {}", s)),
        }
    }
}

/// Thresholds of the screening pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningParameters {
    /// Minimum total market value
    pub market_cap_min: f64,
    /// Minimum current ratio
    pub current_ratio_min: f64,
    /// Maximum price-to-earnings
    pub pe_max: f64,
    /// Maximum price-to-book
    pub pb_max: f64,
    /// Maximum PE x PB
    pub pe_pb_max: f64,
    /// Minimum EPS growth (0.33 = 33%)
    pub eps_growth_min: f64,
    /// Consecutive profitable fiscal years
    pub profit_years: u32,
    /// Years of EPS history for growth
    pub eps_years: u32,
    /// Minimum trailing dividend yield (exclusive)
    pub dividend_yield_min: f64,
    /// Dividend lookback, only used for listing seasoning
    pub dividend_lookback_years: Option<u32>,
    pub pe_source: PeSource,
    /// Run the per-security stage on the rayon pool
    pub parallel_valuation: bool,
}

impl Default for ScreeningParameters {
    fn default() -> Self {
        Self {
            market_cap_min: 2e10,
            current_ratio_min: 2.0,
            pe_max: 30.0,
            pb_max: 6.0,
            pe_pb_max: 150.0,
            eps_growth_min: 0.0,
            profit_years: 4,
            eps_years: 4,
            dividend_yield_min: 1.0,
            dividend_lookback_years: Some(3),
            pe_source: PeSource::Trailing,
            parallel_valuation: false,
        }
    }
}

impl ScreeningParameters {
    /// Overlay configured values on the defaults.
    ///
    /// An unparsable `pe_source` falls back to trailing; validation rejects
    /// it before this point in the binary.
    pub fn from_config(config: &ScreeningConfig) -> Self {
        let defaults = Self::default();
        Self {
            market_cap_min: config.market_cap_min.unwrap_or(defaults.market_cap_min),
            current_ratio_min: config.current_ratio_min.unwrap_or(defaults.current_ratio_min),
            pe_max: config.pe_max.unwrap_or(defaults.pe_max),
            pb_max: config.pb_max.unwrap_or(defaults.pb_max),
            pe_pb_max: config.pe_pb_max.unwrap_or(defaults.pe_pb_max),
            eps_growth_min: config.eps_growth_min.unwrap_or(defaults.eps_growth_min),
            profit_years: config.profit_years.unwrap_or(defaults.profit_years),
            eps_years: config.eps_years.unwrap_or(defaults.eps_years),
            dividend_yield_min: config.dividend_yield_min.unwrap_or(defaults.dividend_yield_min),
            dividend_lookback_years: config
                .dividend_lookback_years
                .or(defaults.dividend_lookback_years),
            pe_source: config
                .pe_source
                .as_deref()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.pe_source),
            parallel_valuation: config
                .parallel_valuation
                .unwrap_or(defaults.parallel_valuation),
        }
    }

    /// Years of history a security must have been listed for.
    pub fn seasoning_years(&self) -> u32 {
        self.profit_years
            .max(self.eps_years)
            .max(self.dividend_lookback_years.unwrap_or(0))
    }

    /// Minimum listing age in days (exclusive).
    pub fn seasoning_days(&self) -> i64 {
        i64::from(self.seasoning_years()) * 365
    }

    /// One-line summary for logs and reports.
    pub fn summary(&self) -> String {
        format!(
            "市值≥{:.0}亿, 流动比率≥{:.1}, 连续盈利{}年, 股息率>{:.1}%, EPS增长≥{:.0}%({}年), PE≤{:.0}, PB≤{:.1}, PE×PB≤{:.0}",
            self.market_cap_min / 1e8,
            self.current_ratio_min,
            self.profit_years,
            self.dividend_yield_min,
            self.eps_growth_min * 100.0,
            self.eps_years,
            self.pe_max,
            self.pb_max,
            self.pe_pb_max,
        )
    }
}
