//! Universe and cross-sectional filtering.
//!
//! Implements the batched part of the funnel:
//! 1. Universe: exclude ST, delisting, suspended and unseasoned listings
//! 2. Market cap: total market value at or above the minimum
//! 3. Liquidity: current ratio at or above the minimum
//! 4. Profitability: positive net profit for each trailing fiscal year
//! 5. Dividend yield: trailing yield strictly above the minimum
//!
//! Every stage after the universe issues one batched query over the whole
//! surviving set. A symbol missing from a response fails that stage.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::data::{fiscal_year_end, FundamentalsProvider, MetricMap, ProviderError, Security};
use crate::error::ScreeningError;

use super::candidate::{CandidateAttributes, CandidateSet};
use super::config::ScreeningParameters;

// ============================================================================
// Filter Stage
// ============================================================================

/// Filter stage identifier for tracking where securities are eliminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterStage {
    /// Listing status and seasoning
    Universe,
    /// Total market value
    MarketCap,
    /// Current ratio
    Liquidity,
    /// Net profit of one fiscal year
    Profitability(i32),
    /// Trailing dividend yield
    DividendYield,
    /// EPS growth and price multiples
    Valuation,
}

impl std::fmt::Display for FilterStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Universe => write!(f, "股票池"),
            Self::MarketCap => write!(f, "市值筛选"),
            Self::Liquidity => write!(f, "流动性筛选"),
            Self::Profitability(year) => write!(f, "盈利筛选({})", year),
            Self::DividendYield => write!(f, "股息率筛选"),
            Self::Valuation => write!(f, "估值筛选"),
        }
    }
}

// ============================================================================
// Filter Result
// ============================================================================

/// Result of a filtering stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterResult {
    /// Stage name
    pub stage: FilterStage,
    /// Number of securities that passed this stage
    pub passed: usize,
    /// Number of securities eliminated at this stage
    pub eliminated: usize,
    /// Elimination rate (%)
    pub elimination_rate: f64,
}

impl FilterResult {
    pub fn new(stage: FilterStage, input_count: usize, passed_count: usize) -> Self {
        let eliminated = input_count.saturating_sub(passed_count);
        let elimination_rate = if input_count > 0 {
            (eliminated as f64 / input_count as f64) * 100.0
        } else {
            0.0
        };

        Self {
            stage,
            passed: passed_count,
            eliminated,
            elimination_rate,
        }
    }
}

// ============================================================================
// Universe Filter
// ============================================================================

/// Reduces the listed securities to eligible candidates.
pub struct UniverseFilter<'a> {
    params: &'a ScreeningParameters,
}

impl<'a> UniverseFilter<'a> {
    pub fn new(params: &'a ScreeningParameters) -> Self {
        Self { params }
    }

    /// Apply listing-status and seasoning rules as of `today`.
    pub fn apply(&self, securities: &[Security], today: NaiveDate) -> (CandidateSet, FilterResult) {
        let input_count = securities.len();
        let min_days = self.params.seasoning_days();

        let eligible = securities.iter().filter(|s| {
            let keep = !s.is_special_treatment()
                && !s.is_delisting()
                && !s.flags.suspended
                && s.listing_days(today) > min_days;
            if !keep {
                debug!(symbol = %s.symbol, name = %s.name, "Excluded from universe");
            }
            keep
        });

        let candidates = CandidateSet::from_securities(eligible);
        let result = FilterResult::new(FilterStage::Universe, input_count, candidates.len());

        info!(
            listed = input_count,
            passed = result.passed,
            min_listing_days = min_days,
            "Universe filter complete"
        );

        (candidates, result)
    }
}

// ============================================================================
// Cross-Sectional Filter
// ============================================================================

/// The four batched filters, applied in fixed order.
pub struct CrossSectionalFilter<'a, F: FundamentalsProvider + ?Sized> {
    provider: &'a F,
    params: &'a ScreeningParameters,
}

impl<'a, F: FundamentalsProvider + ?Sized> CrossSectionalFilter<'a, F> {
    pub fn new(provider: &'a F, params: &'a ScreeningParameters) -> Self {
        Self { provider, params }
    }

    /// Run market cap, liquidity, profitability and dividend stages.
    ///
    /// Returns the survivors and one `FilterResult` per stage (one per
    /// fiscal year for profitability).
    pub fn apply(
        &self,
        candidates: CandidateSet,
        as_of: NaiveDate,
    ) -> Result<(CandidateSet, Vec<FilterResult>), ScreeningError> {
        let mut funnel = Vec::with_capacity(3 + self.params.profit_years as usize);

        let (candidates, result) = self.filter_market_cap(candidates, as_of)?;
        funnel.push(result);

        let (candidates, result) = self.filter_liquidity(candidates, as_of)?;
        funnel.push(result);

        let (candidates, results) = self.filter_profitability(candidates, as_of)?;
        funnel.extend(results);

        let (candidates, result) = self.filter_dividend_yield(candidates, as_of)?;
        funnel.push(result);

        Ok((candidates, funnel))
    }

    /// Keep total market value >= minimum.
    pub fn filter_market_cap(
        &self,
        candidates: CandidateSet,
        as_of: NaiveDate,
    ) -> Result<(CandidateSet, FilterResult), ScreeningError> {
        let min = self.params.market_cap_min;
        batched_stage(
            FilterStage::MarketCap,
            candidates,
            |symbols| self.provider.market_cap(symbols, as_of),
            |value, attrs| {
                attrs.market_cap = Some(value);
                value >= min
            },
        )
    }

    /// Keep current ratio >= minimum.
    pub fn filter_liquidity(
        &self,
        candidates: CandidateSet,
        as_of: NaiveDate,
    ) -> Result<(CandidateSet, FilterResult), ScreeningError> {
        let min = self.params.current_ratio_min;
        batched_stage(
            FilterStage::Liquidity,
            candidates,
            |symbols| self.provider.current_ratio(symbols, as_of),
            |value, attrs| {
                attrs.current_ratio = Some(value);
                value >= min
            },
        )
    }

    /// Keep positive net profit at December 31 of each trailing year,
    /// starting with the current year and walking backward.
    ///
    /// Each year-end is capped at `as_of`, so the current year reads the
    /// latest report already published rather than one from the future.
    pub fn filter_profitability(
        &self,
        candidates: CandidateSet,
        as_of: NaiveDate,
    ) -> Result<(CandidateSet, Vec<FilterResult>), ScreeningError> {
        let mut candidates = candidates;
        let mut results = Vec::with_capacity(self.params.profit_years as usize);

        for offset in 0..self.params.profit_years {
            let year = as_of.year() - offset as i32;
            let (survivors, result) = batched_stage(
                FilterStage::Profitability(year),
                candidates,
                |symbols| {
                    let period_end = fiscal_year_end(year).ok_or_else(|| {
                        ProviderError::InvalidRequest(format!("no fiscal year-end for {}", year))
                    })?;
                    self.provider.net_profit(symbols, period_end.min(as_of))
                },
                |value, attrs| {
                    if attrs.net_profit.is_none() {
                        attrs.net_profit = Some(value);
                    }
                    value > 0.0
                },
            )?;
            candidates = survivors;
            results.push(result);
        }

        Ok((candidates, results))
    }

    /// Keep trailing dividend yield > minimum.
    pub fn filter_dividend_yield(
        &self,
        candidates: CandidateSet,
        as_of: NaiveDate,
    ) -> Result<(CandidateSet, FilterResult), ScreeningError> {
        let min = self.params.dividend_yield_min;
        batched_stage(
            FilterStage::DividendYield,
            candidates,
            |symbols| self.provider.dividend_yield(symbols, as_of),
            |value, attrs| {
                attrs.dividend_yield = Some(value);
                value > min
            },
        )
    }
}

/// One batched query over the whole set, then a per-symbol predicate.
///
/// An empty set passes through without a provider call.
fn batched_stage<Q, K>(
    stage: FilterStage,
    candidates: CandidateSet,
    query: Q,
    mut keep: K,
) -> Result<(CandidateSet, FilterResult), ScreeningError>
where
    Q: FnOnce(&[String]) -> Result<MetricMap, ProviderError>,
    K: FnMut(f64, &mut CandidateAttributes) -> bool,
{
    let input_count = candidates.len();
    if candidates.is_empty() {
        debug!(stage = %stage, "Empty candidate set, skipping query");
        return Ok((candidates, FilterResult::new(stage, 0, 0)));
    }

    let values = query(candidates.symbols())
        .map_err(|source| ScreeningError::ProviderUnavailable { stage, source })?;

    let survivors = candidates.narrow(|symbol, attrs| match values.get(symbol) {
        Some(&value) => keep(value, attrs),
        None => {
            debug!(stage = %stage, symbol = %symbol, "No data, dropped");
            false
        }
    });

    let result = FilterResult::new(stage, input_count, survivors.len());
    info!(
        stage = %stage,
        passed = result.passed,
        eliminated = result.eliminated,
        "Filter stage complete"
    );

    Ok((survivors, result))
}

// ============================================================================
// Tests
// ============================================================================
