//! Screening pipeline.
//!
//! Reduces the listed universe to securities that pass every Graham
//! defensive criterion.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                        选股流水线                                    │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │                                                                     │
//! │  ┌─────────────┐     ┌──────────────────────┐     ┌─────────────┐   │
//! │  │  股票池     │────▶│  截面筛选 (批量)     │────▶│  估值筛选   │   │
//! │  │  Universe   │     │  市值 → 流动比率 →   │     │  逐只计算   │   │
//! │  │  ST/退市/   │     │  连续盈利 → 股息率   │     │  EPS增长    │   │
//! │  │  上市年限   │     │                      │     │  PE/PB      │   │
//! │  └─────────────┘     └──────────────────────┘     └─────────────┘   │
//! │                                                                     │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use graham_trading::screener::{ScreeningEngine, ScreeningParameters};
//!
//! let engine = ScreeningEngine::new(provider, ScreeningParameters::default(), query);
//! let run = engine.run(today)?;
//! ```

pub mod candidate;
pub mod config;
pub mod engine;
pub mod quantitative;
pub mod report;
pub mod valuation;

pub use candidate::{CandidateAttributes, CandidateSet};
pub use config::{PeSource, ScreeningParameters};
pub use engine::{ScreeningEngine, ScreeningRun, SkippedSymbol};
pub use quantitative::{CrossSectionalFilter, FilterResult, FilterStage, UniverseFilter};
pub use report::{ReportFormat, ScreeningReport};
pub use valuation::{eps_averages, eps_growth, ScreeningResult, SymbolOutcome, ValuationFilter};
