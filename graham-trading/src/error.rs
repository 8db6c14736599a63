//! Error types of the screening pipeline and the rebalance strategy.

use serde::Serialize;
use thiserror::Error;

use crate::data::ProviderError;
use crate::execution::ExecutionError;
use crate::screener::FilterStage;

/// A whole screening attempt failed.
///
/// Raised when a batched query fails entirely; continuing with a partial
/// universe would break the once-per-year selection guarantee.
#[derive(Debug, Clone, Error)]
pub enum ScreeningError {
    #[error("Provider unavailable during {stage} stage: {source}")]
    ProviderUnavailable {
        stage: FilterStage,
        source: ProviderError,
    },

    #[error("Universe listing failed: {0}")]
    Universe(#[source] ProviderError),
}

/// Why a single security left the valuation stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SkipReason {
    /// Too few annual EPS records
    InsufficientHistory { found: usize, required: usize },
    /// Zero or non-finite denominator
    DegenerateArithmetic(&'static str),
    GrowthBelowMinimum { growth: f64 },
    /// PE not positive or above the cap
    PeOutOfRange { pe: f64 },
    PbAboveMaximum { pb: f64 },
    CompositeAboveMaximum { product: f64 },
    /// Provider error for this symbol only
    FetchFailed(String),
}

impl SkipReason {
    /// True for data problems, false for threshold rejections.
    pub fn is_data_issue(&self) -> bool {
        matches!(
            self,
            Self::InsufficientHistory { .. } | Self::DegenerateArithmetic(_) | Self::FetchFailed(_)
        )
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InsufficientHistory { found, required } => {
                write!(f, "EPS 历史不足 ({}/{})", found, required)
            }
            Self::DegenerateArithmetic(what) => write!(f, "无法计算: {}", what),
            Self::GrowthBelowMinimum { growth } => write!(f, "EPS 增长不足 ({:.2})", growth),
            Self::PeOutOfRange { pe } => write!(f, "PE 超出范围 ({:.2})", pe),
            Self::PbAboveMaximum { pb } => write!(f, "PB 过高 ({:.2})", pb),
            Self::CompositeAboveMaximum { product } => write!(f, "PE×PB 过高 ({:.2})", product),
            Self::FetchFailed(msg) => write!(f, "数据获取失败: {}", msg),
        }
    }
}

/// A daily invocation failed; rebalance state is left untouched.
#[derive(Debug, Clone, Error)]
pub enum StrategyError {
    #[error("Trading calendar failed: {0}")]
    Calendar(#[source] ProviderError),

    #[error(transparent)]
    Screening(#[from] ScreeningError),

    #[error("Account snapshot failed: {0}")]
    Account(#[source] ExecutionError),
}
