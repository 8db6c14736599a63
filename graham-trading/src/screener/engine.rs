//! Screening engine.
//!
//! Orchestrates one screening run: universe listing, universe filter,
//! cross-sectional chain and per-security valuation.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::data::{FundamentalsProvider, UniverseQuery};
use crate::error::{ScreeningError, SkipReason};

use super::config::ScreeningParameters;
use super::quantitative::{CrossSectionalFilter, FilterResult, UniverseFilter};
use super::valuation::{ScreeningResult, SymbolOutcome, ValuationFilter};

// ============================================================================
// Screening Run
// ============================================================================

/// A symbol dropped by the valuation stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedSymbol {
    pub symbol: String,
    pub reason: SkipReason,
}

/// Result of a screening run.
#[derive(Debug, Clone, Serialize)]
pub struct ScreeningRun {
    /// Run ID (data date plus start time to the millisecond)
    pub id: String,
    /// Date the data was taken as of
    pub as_of: NaiveDate,
    /// Securities returned by the universe listing
    pub total_listed: usize,
    /// Thresholds in effect
    pub parameters_summary: String,
    /// Filter stage results, in pipeline order
    pub funnel: Vec<FilterResult>,
    /// Accepted securities, sorted by symbol
    pub results: Vec<ScreeningResult>,
    /// Valuation skips, sorted by symbol
    pub skipped: Vec<SkippedSymbol>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// Duration in seconds
    pub duration_secs: f64,
}

impl ScreeningRun {
    /// Accepted symbols.
    pub fn symbols(&self) -> Vec<&str> {
        self.results.iter().map(|r| r.symbol.as_str()).collect()
    }

    /// Summary string for logging.
    pub fn summary(&self) -> String {
        format!(
            "Screened {} securities in {:.1}s: {} passed ({:.1}%)",
            self.total_listed,
            self.duration_secs,
            self.results.len(),
            if self.total_listed > 0 {
                (self.results.len() as f64 / self.total_listed as f64) * 100.0
            } else {
                0.0
            }
        )
    }
}

// ============================================================================
// Screening Engine
// ============================================================================

/// Runs the full screening pipeline against a fundamentals provider.
pub struct ScreeningEngine<F: FundamentalsProvider + ?Sized> {
    provider: Arc<F>,
    params: ScreeningParameters,
    query: UniverseQuery,
}

impl<F: FundamentalsProvider + ?Sized> ScreeningEngine<F> {
    pub fn new(provider: Arc<F>, params: ScreeningParameters, query: UniverseQuery) -> Self {
        Self {
            provider,
            params,
            query,
        }
    }

    pub fn params(&self) -> &ScreeningParameters {
        &self.params
    }

    /// Screen the universe as of `as_of`.
    ///
    /// Fails only if the universe listing or a batched stage fails;
    /// per-symbol problems end up in `ScreeningRun::skipped`.
    pub fn run(&self, as_of: NaiveDate) -> Result<ScreeningRun, ScreeningError> {
        let started_at = Utc::now();
        let id = format!(
            "screen_{}_{}",
            as_of.format("%Y%m%d"),
            started_at.format("%H%M%S%3f")
        );

        info!(
            run_id = %id,
            as_of = %as_of,
            provider = self.provider.name(),
            "Starting screening run"
        );

        let securities = self
            .provider
            .list_universe(&self.query)
            .map_err(ScreeningError::Universe)?;
        let total_listed = securities.len();

        let mut funnel = Vec::new();

        let (candidates, result) = UniverseFilter::new(&self.params).apply(&securities, as_of);
        funnel.push(result);

        let (candidates, results) =
            CrossSectionalFilter::new(self.provider.as_ref(), &self.params).apply(candidates, as_of)?;
        funnel.extend(results);

        let (outcomes, result) =
            ValuationFilter::new(self.provider.as_ref(), &self.params).apply(&candidates, as_of);
        funnel.push(result);

        let mut accepted = Vec::new();
        let mut skipped = Vec::new();
        for outcome in outcomes {
            match outcome {
                SymbolOutcome::Accepted(result) => accepted.push(result),
                SymbolOutcome::Skipped { symbol, reason } => skipped.push(SkippedSymbol { symbol, reason }),
            }
        }
        accepted.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        skipped.sort_by(|a, b| a.symbol.cmp(&b.symbol));

        let completed_at = Utc::now();
        let run = ScreeningRun {
            id,
            as_of,
            total_listed,
            parameters_summary: self.params.summary(),
            funnel,
            results: accepted,
            skipped,
            started_at,
            completed_at,
            duration_secs: (completed_at - started_at).num_milliseconds() as f64 / 1000.0,
        };

        info!(run_id = %run.id, "{}", run.summary());
        Ok(run)
    }
}
