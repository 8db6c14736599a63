//! Configuration validation.
//!
//! Provides validation logic for configuration fields to ensure
//! all values are within valid ranges before the strategy starts.

use std::str::FromStr;
use thiserror::Error;

use crate::config::{AllocationConfig, Config, ObservabilityConfig, ScreeningConfig, TradingConfig};

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Configuration conflict: {reason}")]
    Conflict { reason: String },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

/// Collapse a list of section errors into a single result.
fn collect(mut errors: Vec<ValidationError>) -> ValidationResult<()> {
    if errors.is_empty() {
        Ok(())
    } else if errors.len() == 1 {
        Err(errors.remove(0))
    } else {
        Err(ValidationError::Multiple(errors))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.into(),
        reason: reason.into(),
    }
}

impl Config {
    /// Validate the entire configuration.
    pub fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = self.observability.validate() {
            errors.push(e);
        }

        if let Err(e) = self.trading.validate() {
            errors.push(e);
        }

        collect(errors)
    }

    /// Load and validate configuration.
    pub fn load_and_validate(path: Option<&std::path::Path>) -> anyhow::Result<Self> {
        let config = Self::load_with_env(path)?;
        config.validate().map_err(|e| anyhow::anyhow!("{}", e))?;
        Ok(config)
    }
}

impl Validate for ObservabilityConfig {
    fn validate(&self) -> ValidationResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(invalid(
                "observability.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.log_format.to_lowercase().as_str()) {
            return Err(invalid(
                "observability.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        Ok(())
    }
}

impl Validate for TradingConfig {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = cron::Schedule::from_str(&self.schedule_cron) {
            errors.push(invalid("trading.schedule_cron", e.to_string()));
        }

        if self.calendar_exchange.trim().is_empty() {
            errors.push(ValidationError::MissingField {
                field: "trading.calendar_exchange".into(),
            });
        }

        if self.exchanges.is_empty() {
            errors.push(ValidationError::MissingField {
                field: "trading.exchanges".into(),
            });
        }

        if !(self.initial_cash >= 0.0) {
            errors.push(invalid("trading.initial_cash", "must be non-negative"));
        }

        if !(self.commission_ratio >= 0.0) {
            errors.push(invalid("trading.commission_ratio", "must be non-negative"));
        }

        if !(self.slippage_ratio >= 0.0) {
            errors.push(invalid("trading.slippage_ratio", "must be non-negative"));
        }

        if self.lot_size == 0 {
            errors.push(invalid("trading.lot_size", "must be greater than 0"));
        }

        if let Err(e) = self.screening.validate() {
            errors.push(e);
        }

        if let Err(e) = self.allocation.validate() {
            errors.push(e);
        }

        collect(errors)
    }
}

impl Validate for ScreeningConfig {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        let years = [
            ("trading.screening.profit_years", self.profit_years),
            ("trading.screening.eps_years", self.eps_years),
            ("trading.screening.dividend_lookback_years", self.dividend_lookback_years),
        ];
        for (field, value) in years {
            if value == Some(0) {
                errors.push(invalid(field, "must be greater than 0"));
            }
        }

        let caps = [
            ("trading.screening.pe_max", self.pe_max),
            ("trading.screening.pb_max", self.pb_max),
            ("trading.screening.pe_pb_max", self.pe_pb_max),
        ];
        for (field, value) in caps {
            if let Some(v) = value {
                if !(v > 0.0) {
                    errors.push(invalid(field, "must be positive"));
                }
            }
        }

        if let Some(source) = &self.pe_source {
            let valid_sources = ["trailing", "average_earnings"];
            if !valid_sources.contains(&source.to_lowercase().as_str()) {
                errors.push(invalid(
                    "trading.screening.pe_source",
                    format!("must be one of: {}", valid_sources.join(", ")),
                ));
            }
        }

        collect(errors)
    }
}

impl Validate for AllocationConfig {
    fn validate(&self) -> ValidationResult<()> {
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);

        if !in_unit(self.invest_fraction) {
            return Err(invalid("trading.allocation.invest_fraction", "must be within [0, 1]"));
        }
        if !in_unit(self.reserve_fraction) {
            return Err(invalid("trading.allocation.reserve_fraction", "must be within [0, 1]"));
        }
        if self.invest_fraction + self.reserve_fraction > 1.0 {
            return Err(ValidationError::Conflict {
                reason: format!(
                    "invest_fraction ({}) + reserve_fraction ({}) exceeds available cash",
                    self.invest_fraction, self.reserve_fraction
                ),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = Config::default();
        config.observability.log_level = "invalid".into();
        let result = config.validate();
        assert!(result.is_err());
        if let Err(ValidationError::InvalidValue { field, .. }) = result {
            assert_eq!(field, "observability.log_level");
        }
    }

    #[test]
    fn test_invalid_cron() {
        let mut config = Config::default();
        config.trading.schedule_cron = "every morning".into();
        let result = config.validate();
        assert!(matches!(result, Err(ValidationError::InvalidValue { ref field, .. }) if field == "trading.schedule_cron"));
    }

    #[test]
    fn test_allocation_overcommitted() {
        let allocation = AllocationConfig {
            invest_fraction: 0.96,
            reserve_fraction: 0.05,
        };
        assert!(matches!(allocation.validate(), Err(ValidationError::Conflict { .. })));
    }

    #[test]
    fn test_zero_years_rejected() {
        let screening = ScreeningConfig {
            profit_years: Some(0),
            eps_years: Some(0),
            ..Default::default()
        };
        match screening.validate() {
            Err(ValidationError::Multiple(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("expected multiple errors, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_pe_source() {
        let screening = ScreeningConfig {
            pe_source: Some("forward".into()),
            ..Default::default()
        };
        assert!(screening.validate().is_err());

        let screening = ScreeningConfig {
            pe_source: Some("average_earnings".into()),
            ..Default::default()
        };
        assert!(screening.validate().is_ok());
    }
}
