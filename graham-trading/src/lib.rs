//! Graham Trading Library
//!
//! An annually rebalanced portfolio for A-shares built on Benjamin Graham's
//! defensive-investor criteria.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                    graham-trading (Rust Service)                    │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────┐      │
//! │  │  Scheduler      │─▶│  Strategy       │─▶│  Execution      │      │
//! │  │  (cron, 9:40)   │  │  (yearly state) │  │  Gateway        │      │
//! │  └─────────────────┘  └────────┬────────┘  └─────────────────┘      │
//! │                                │                                    │
//! │                       ┌────────▼────────┐  ┌─────────────────┐      │
//! │                       │  Screener       │─▶│  Data Provider  │      │
//! │                       │  (funnel)       │  │  (calendar,     │      │
//! │                       └─────────────────┘  │   fundamentals) │      │
//! │                                            └─────────────────┘      │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Concepts
//!
//! ## Yearly Cycle
//! - **First session** of the calendar year: liquidate every holding
//! - **Second session**: screen the universe, buy survivors equal-weight
//! - Every other day: idle
//!
//! ## Defensive Criteria
//! - Large market value, current ratio of at least 2
//! - Consecutive profitable years, positive dividend yield
//! - EPS growth, bounded PE, PB and PE x PB

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod data;
pub mod error;
pub mod execution;
pub mod scheduler;
pub mod screener;
pub mod strategy;

pub use data::{FundamentalsProvider, ProviderError, SnapshotProvider, TradingCalendar};
pub use error::{ScreeningError, SkipReason, StrategyError};
pub use execution::{ExecutionError, ExecutionGateway, PaperConfig, PaperGateway};
pub use scheduler::DailyScheduler;
pub use screener::{ScreeningEngine, ScreeningParameters, ScreeningReport, ScreeningRun};
pub use strategy::{DayAction, GrahamStrategy, StrategySettings};
