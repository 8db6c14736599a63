//! Graham Common - Shared configuration, validation and logging for the
//! defensive-portfolio strategy.
//!
//! This crate provides:
//! - Configuration types and loading
//! - Configuration validation
//! - Logging setup

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod logging;
pub mod validation;

pub use config::{
    AllocationConfig, Config, ObservabilityConfig, ScreeningConfig, TradingConfig,
};
pub use validation::{Validate, ValidationError, ValidationResult};

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::config::{Config, ScreeningConfig, TradingConfig};
    pub use crate::logging::init_logging;
    pub use crate::validation::{Validate, ValidationError};
}
