//! Per-security valuation stage.
//!
//! Each candidate is evaluated independently from its own time series:
//! EPS growth first, then PE, PB and the PE x PB composite. A failure for
//! one symbol becomes a `Skipped` outcome and never stops the loop.

use chrono::{Datelike, NaiveDate};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::data::{EpsRecord, FundamentalsProvider};
use crate::error::SkipReason;

use super::candidate::{CandidateAttributes, CandidateSet};
use super::config::{PeSource, ScreeningParameters};
use super::quantitative::{FilterResult, FilterStage};

/// Records averaged at each end of the EPS series.
const EPS_WINDOW: usize = 3;

// ============================================================================
// Outcomes
// ============================================================================

/// A security that survived the full pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScreeningResult {
    pub symbol: String,
    pub name: String,
    /// Total market value
    pub market_cap: Option<f64>,
    pub current_ratio: Option<f64>,
    /// Mean EPS of the most recent three fiscal years
    pub eps_avg_recent: f64,
    pub pe: f64,
    pub pb: f64,
}

/// Outcome of evaluating one symbol.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SymbolOutcome {
    Accepted(ScreeningResult),
    Skipped { symbol: String, reason: SkipReason },
}

impl SymbolOutcome {
    pub fn symbol(&self) -> &str {
        match self {
            Self::Accepted(result) => &result.symbol,
            Self::Skipped { symbol, .. } => symbol,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }
}

// ============================================================================
// EPS Growth
// ============================================================================

/// Mean EPS of the last and first `EPS_WINDOW` records: `(recent, base)`.
///
/// Shorter series average over what is there.
pub fn eps_averages(records: &[EpsRecord]) -> Option<(f64, f64)> {
    if records.is_empty() {
        return None;
    }
    let window = EPS_WINDOW.min(records.len());
    let mean = |slice: &[EpsRecord]| slice.iter().map(|r| r.eps).sum::<f64>() / slice.len() as f64;

    let recent = mean(&records[records.len() - window..]);
    let base = mean(&records[..window]);
    Some((recent, base))
}

/// Growth of the recent EPS average over the base average.
pub fn eps_growth(recent_avg: f64, base_avg: f64) -> Result<f64, SkipReason> {
    if base_avg == 0.0 {
        return Err(SkipReason::DegenerateArithmetic("base EPS average is zero"));
    }
    let growth = (recent_avg - base_avg) / base_avg;
    if !growth.is_finite() {
        return Err(SkipReason::DegenerateArithmetic("EPS growth is not finite"));
    }
    Ok(growth)
}

// ============================================================================
// Valuation Filter
// ============================================================================

/// Per-security EPS growth and price multiple checks.
pub struct ValuationFilter<'a, F: FundamentalsProvider + ?Sized> {
    provider: &'a F,
    params: &'a ScreeningParameters,
    parallel: bool,
}

impl<'a, F: FundamentalsProvider + ?Sized> ValuationFilter<'a, F> {
    pub fn new(provider: &'a F, params: &'a ScreeningParameters) -> Self {
        Self {
            provider,
            params,
            parallel: params.parallel_valuation,
        }
    }

    /// Evaluate symbols on the rayon pool.
    pub fn parallel(mut self, enabled: bool) -> Self {
        self.parallel = enabled;
        self
    }

    /// Evaluate every candidate. Outcome order is unspecified.
    pub fn apply(&self, candidates: &CandidateSet, as_of: NaiveDate) -> (Vec<SymbolOutcome>, FilterResult) {
        let entries: Vec<(&str, &CandidateAttributes)> = candidates.iter().collect();

        let outcomes: Vec<SymbolOutcome> = if self.parallel {
            entries
                .par_iter()
                .map(|(symbol, attrs)| self.evaluate(symbol, attrs, as_of))
                .collect()
        } else {
            entries
                .iter()
                .map(|(symbol, attrs)| self.evaluate(symbol, attrs, as_of))
                .collect()
        };

        let accepted = outcomes.iter().filter(|o| o.is_accepted()).count();
        let result = FilterResult::new(FilterStage::Valuation, entries.len(), accepted);

        info!(
            stage = %FilterStage::Valuation,
            passed = result.passed,
            eliminated = result.eliminated,
            parallel = self.parallel,
            "Filter stage complete"
        );

        (outcomes, result)
    }

    /// Evaluate one symbol.
    pub fn evaluate(&self, symbol: &str, attrs: &CandidateAttributes, as_of: NaiveDate) -> SymbolOutcome {
        match self.check(symbol, attrs, as_of) {
            Ok(result) => {
                debug!(symbol = %symbol, pe = result.pe, pb = result.pb, "Accepted");
                SymbolOutcome::Accepted(result)
            }
            Err(reason) => {
                if matches!(reason, SkipReason::FetchFailed(_)) {
                    warn!(symbol = %symbol, reason = %reason, "Valuation data fetch failed, skipping");
                } else {
                    debug!(symbol = %symbol, reason = %reason, "Skipped");
                }
                SymbolOutcome::Skipped {
                    symbol: symbol.to_string(),
                    reason,
                }
            }
        }
    }

    fn check(
        &self,
        symbol: &str,
        attrs: &CandidateAttributes,
        as_of: NaiveDate,
    ) -> Result<ScreeningResult, SkipReason> {
        let p = self.params;
        let fetch_failed = |e: crate::data::ProviderError| SkipReason::FetchFailed(e.to_string());

        // EPS growth
        let year = as_of.year();
        let records = self
            .provider
            .annual_eps(symbol, year - p.eps_years as i32, year, as_of)
            .map_err(fetch_failed)?;

        let required = (p.eps_years.saturating_sub(1) as usize).max(1);
        let insufficient = SkipReason::InsufficientHistory {
            found: records.len(),
            required,
        };
        if records.len() < required {
            return Err(insufficient);
        }

        let (recent_avg, base_avg) = eps_averages(&records).ok_or(insufficient)?;
        let growth = eps_growth(recent_avg, base_avg)?;
        if growth < p.eps_growth_min {
            return Err(SkipReason::GrowthBelowMinimum { growth });
        }

        // PE
        let pe = match p.pe_source {
            PeSource::Trailing => self.provider.pe_ratio(symbol, as_of).map_err(fetch_failed)?,
            PeSource::AverageEarnings => {
                if recent_avg == 0.0 {
                    return Err(SkipReason::DegenerateArithmetic("recent EPS average is zero"));
                }
                let close = self.provider.close_price(symbol, as_of).map_err(fetch_failed)?;
                close / recent_avg
            }
        };
        if !pe.is_finite() {
            return Err(SkipReason::DegenerateArithmetic("PE is not finite"));
        }
        if pe <= 0.0 || pe > p.pe_max {
            return Err(SkipReason::PeOutOfRange { pe });
        }

        // PB
        let pb = self.provider.pb_ratio(symbol, as_of).map_err(fetch_failed)?;
        if !pb.is_finite() {
            return Err(SkipReason::DegenerateArithmetic("PB is not finite"));
        }
        if pb > p.pb_max {
            return Err(SkipReason::PbAboveMaximum { pb });
        }

        // Composite
        let product = pe * pb;
        if product > p.pe_pb_max {
            return Err(SkipReason::CompositeAboveMaximum { product });
        }

        Ok(ScreeningResult {
            symbol: symbol.to_string(),
            name: attrs.name.clone(),
            market_cap: attrs.market_cap,
            current_ratio: attrs.current_ratio,
            eps_avg_recent: recent_avg,
            pe,
            pb,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{AnnualReport, DailyObservation, MarketSnapshot, Security, SecuritySnapshot, SnapshotProvider};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn records(eps: &[f64]) -> Vec<EpsRecord> {
        eps.iter()
            .enumerate()
            .map(|(i, &eps)| EpsRecord {
                fiscal_year: 2018 + i as i32,
                eps,
            })
            .collect()
    }

    fn security(symbol: &str, eps: &[(i32, f64)], pe: f64, pb: f64, close: f64) -> SecuritySnapshot {
        let mut entry = SecuritySnapshot::new(Security::new(symbol, symbol, date(2000, 1, 1))).with_daily(
            DailyObservation {
                pe: Some(pe),
                pb: Some(pb),
                close: Some(close),
                ..DailyObservation::on(date(2024, 1, 2))
            },
        );
        for &(year, value) in eps {
            entry = entry.with_annual(AnnualReport {
                eps: Some(value),
                ..AnnualReport::year(year)
            });
        }
        entry
    }

    fn steady_eps() -> Vec<(i32, f64)> {
        vec![(2020, 1.0), (2021, 1.1), (2022, 1.2), (2023, 1.3)]
    }

    fn candidates(symbols: &[&str]) -> CandidateSet {
        let securities: Vec<Security> = symbols
            .iter()
            .map(|s| Security::new(s, s, date(2000, 1, 1)))
            .collect();
        CandidateSet::from_securities(&securities)
    }

    fn skip_reason(outcome: &SymbolOutcome) -> Option<&SkipReason> {
        match outcome {
            SymbolOutcome::Skipped { reason, .. } => Some(reason),
            SymbolOutcome::Accepted(_) => None,
        }
    }

    #[test]
    fn test_growth_doubling_series() {
        let (recent, base) = eps_averages(&records(&[1.0, 1.0, 1.0, 2.0, 2.0, 2.0])).unwrap();
        assert!((recent - 2.0).abs() < 1e-12);
        assert!((base - 1.0).abs() < 1e-12);
        assert!((eps_growth(recent, base).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_growth_short_series_overlaps() {
        let (recent, base) = eps_averages(&records(&[1.0, 2.0])).unwrap();
        assert!((recent - 1.5).abs() < 1e-12);
        assert!((base - 1.5).abs() < 1e-12);
        assert!(eps_averages(&[]).is_none());
    }

    #[test]
    fn test_growth_zero_base() {
        assert_eq!(
            eps_growth(1.0, 0.0),
            Err(SkipReason::DegenerateArithmetic("base EPS average is zero"))
        );
    }

    #[test]
    fn test_accepts_reasonable_security() {
        let provider = SnapshotProvider::new(
            MarketSnapshot::default().with_security(security("A", &steady_eps(), 10.0, 1.2, 12.0)),
        );
        let params = ScreeningParameters::default();
        let filter = ValuationFilter::new(&provider, &params);

        let (outcomes, result) = filter.apply(&candidates(&["A"]), date(2024, 6, 3));
        assert_eq!(result.passed, 1);
        match &outcomes[0] {
            SymbolOutcome::Accepted(r) => {
                assert_eq!(r.symbol, "A");
                assert!((r.eps_avg_recent - 1.2).abs() < 1e-9);
                assert!((r.pe - 10.0).abs() < 1e-9);
            }
            other => panic!("expected acceptance, got {:?}", other),
        }
    }

    #[test]
    fn test_composite_rejection() {
        let provider = SnapshotProvider::new(
            MarketSnapshot::default().with_security(security("A", &steady_eps(), 10.0, 2.0, 12.0)),
        );
        let params = ScreeningParameters {
            pe_pb_max: 15.0,
            ..Default::default()
        };
        let (outcomes, _) = ValuationFilter::new(&provider, &params).apply(&candidates(&["A"]), date(2024, 6, 3));
        assert_eq!(
            skip_reason(&outcomes[0]),
            Some(&SkipReason::CompositeAboveMaximum { product: 20.0 })
        );
    }

    #[test]
    fn test_rejections() {
        let snapshot = MarketSnapshot::default()
            .with_security(security("NEG", &steady_eps(), -5.0, 1.0, 10.0))
            .with_security(security("PE", &steady_eps(), 31.0, 1.0, 10.0))
            .with_security(security("PB", &steady_eps(), 10.0, 7.0, 10.0))
            .with_security(security("SHORT", &[(2023, 1.0), (2022, 1.0)], 10.0, 1.0, 10.0))
            .with_security(security(
                "SHRINK",
                &[(2020, 2.0), (2021, 2.0), (2022, 1.0), (2023, 1.0)],
                10.0,
                1.0,
                10.0,
            ))
            .with_security(security(
                "ZERO",
                &[(2020, 0.0), (2021, 0.0), (2022, 0.0), (2023, 1.0)],
                10.0,
                1.0,
                10.0,
            ));
        let provider = SnapshotProvider::new(snapshot);
        let params = ScreeningParameters::default();
        let filter = ValuationFilter::new(&provider, &params);
        let attrs = CandidateAttributes::default();
        let today = date(2024, 6, 3);

        let reason = |symbol: &str| match filter.evaluate(symbol, &attrs, today) {
            SymbolOutcome::Skipped { reason, .. } => reason,
            other => panic!("expected skip for {}, got {:?}", symbol, other),
        };

        assert_eq!(reason("NEG"), SkipReason::PeOutOfRange { pe: -5.0 });
        assert_eq!(reason("PE"), SkipReason::PeOutOfRange { pe: 31.0 });
        assert_eq!(reason("PB"), SkipReason::PbAboveMaximum { pb: 7.0 });
        assert_eq!(reason("SHORT"), SkipReason::InsufficientHistory { found: 2, required: 3 });
        assert!(matches!(reason("SHRINK"), SkipReason::GrowthBelowMinimum { .. }));
        assert!(matches!(reason("ZERO"), SkipReason::DegenerateArithmetic(_)));
        assert!(matches!(reason("MISSING"), SkipReason::FetchFailed(_)));
    }

    #[test]
    fn test_history_counts_published_reports_only() {
        let provider = SnapshotProvider::new(
            MarketSnapshot::default()
                .with_security(security("A", &steady_eps(), 10.0, 1.2, 12.0))
                .with_security(security("B", &[(2022, 1.0), (2023, 1.0)], 10.0, 1.2, 12.0)),
        );
        let params = ScreeningParameters::default();
        let filter = ValuationFilter::new(&provider, &params);
        let attrs = CandidateAttributes::default();
        let january = date(2024, 1, 3);

        // FY2023 is not yet published, the recent average ends at FY2022
        match filter.evaluate("A", &attrs, january) {
            SymbolOutcome::Accepted(r) => assert!((r.eps_avg_recent - 1.1).abs() < 1e-9),
            other => panic!("expected acceptance, got {:?}", other),
        }
        assert_eq!(
            skip_reason(&filter.evaluate("B", &attrs, january)),
            Some(&SkipReason::InsufficientHistory { found: 1, required: 3 })
        );
    }

    #[test]
    fn test_single_year_history_requires_one_record() {
        let provider = SnapshotProvider::new(
            MarketSnapshot::default().with_security(security("A", &[], 10.0, 1.2, 12.0)),
        );
        let params = ScreeningParameters {
            eps_years: 1,
            ..Default::default()
        };
        let outcome = ValuationFilter::new(&provider, &params).evaluate(
            "A",
            &CandidateAttributes::default(),
            date(2024, 6, 3),
        );
        assert_eq!(
            skip_reason(&outcome),
            Some(&SkipReason::InsufficientHistory { found: 0, required: 1 })
        );
    }

    #[test]
    fn test_average_earnings_pe() {
        let provider = SnapshotProvider::new(
            MarketSnapshot::default().with_security(security("A", &steady_eps(), 99.0, 1.0, 12.0)),
        );
        let params = ScreeningParameters {
            pe_source: PeSource::AverageEarnings,
            ..Default::default()
        };
        let outcome = ValuationFilter::new(&provider, &params).evaluate(
            "A",
            &CandidateAttributes::default(),
            date(2024, 6, 3),
        );
        match outcome {
            // close 12 / recent average 1.2
            SymbolOutcome::Accepted(r) => assert!((r.pe - 10.0).abs() < 1e-9),
            other => panic!("expected acceptance, got {:?}", other),
        }
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let mut snapshot = MarketSnapshot::default();
        let mut symbols = Vec::new();
        for i in 0..20 {
            let symbol = format!("S{:02}", i);
            let pe = if i % 3 == 0 { 40.0 } else { 10.0 };
            snapshot = snapshot.with_security(security(&symbol, &steady_eps(), pe, 1.0, 10.0));
            symbols.push(symbol);
        }
        let provider = SnapshotProvider::new(snapshot);
        let params = ScreeningParameters::default();
        let refs: Vec<&str> = symbols.iter().map(String::as_str).collect();
        let set = candidates(&refs);

        let (mut sequential, _) = ValuationFilter::new(&provider, &params).apply(&set, date(2024, 6, 3));
        let (mut parallel, result) = ValuationFilter::new(&provider, &params)
            .parallel(true)
            .apply(&set, date(2024, 6, 3));

        sequential.sort_by(|a, b| a.symbol().cmp(b.symbol()));
        parallel.sort_by(|a, b| a.symbol().cmp(b.symbol()));
        assert_eq!(sequential, parallel);
        assert_eq!(result.passed, 13);
    }
}
