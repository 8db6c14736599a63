//! Configuration types for the Graham strategy service.
//!
//! Configuration is a single JSON document, by default `~/.graham/config.json`.
//! Every field has a default so a missing file or a partial document is valid.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Get the configuration directory.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new()
        .map_or_else(
            || PathBuf::from(".graham"),
            |dirs| dirs.home_dir().join(".graham"),
        )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Strategy, data and execution configuration
    #[serde(default)]
    pub trading: TradingConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::info!("Config file not found, using defaults");
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with environment variable overrides.
    ///
    /// An explicit path must exist; the default path may be absent.
    pub fn load_with_env(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::load_from(p)?,
            None => Self::load()?,
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("GRAHAM_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Ok(format) = std::env::var("GRAHAM_LOG_FORMAT") {
            self.observability.log_format = format;
        }
        if let Ok(path) = std::env::var("GRAHAM_DATA_FILE") {
            self.trading.data_file = Some(PathBuf::from(path));
        }
        if let Ok(cash) = std::env::var("GRAHAM_INITIAL_CASH") {
            if let Ok(c) = cash.parse() {
                self.trading.initial_cash = c;
            }
        }
    }
}

// ============================================================================
// Observability Configuration
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

// ============================================================================
// Trading Configuration
// ============================================================================

/// Strategy service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    /// Cron expression (with seconds) for the daily invocation
    #[serde(default = "default_schedule_cron")]
    pub schedule_cron: String,

    /// Exchange whose calendar defines trading sessions
    #[serde(default = "default_calendar_exchange")]
    pub calendar_exchange: String,

    /// Exchanges that make up the investable universe
    #[serde(default = "default_exchanges")]
    pub exchanges: Vec<String>,

    /// Market identifier passed to the universe listing
    #[serde(default = "default_market")]
    pub market: String,

    /// Security type passed to the universe listing
    #[serde(default = "default_security_type")]
    pub security_type: String,

    /// Starting cash of the paper gateway
    #[serde(default = "default_initial_cash")]
    pub initial_cash: f64,

    /// Commission charged on each fill (fraction of notional)
    #[serde(default = "default_commission_ratio")]
    pub commission_ratio: f64,

    /// Price slippage applied to market fills (fraction of price)
    #[serde(default = "default_slippage_ratio")]
    pub slippage_ratio: f64,

    /// Board lot size (A-shares trade in lots of 100)
    #[serde(default = "default_lot_size")]
    pub lot_size: u64,

    /// Snapshot dataset backing the data provider
    #[serde(default)]
    pub data_file: Option<PathBuf>,

    /// Directory for screening reports
    #[serde(default = "default_report_dir")]
    pub report_dir: PathBuf,

    /// Screening thresholds
    #[serde(default)]
    pub screening: ScreeningConfig,

    /// Capital allocation fractions
    #[serde(default)]
    pub allocation: AllocationConfig,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            schedule_cron: default_schedule_cron(),
            calendar_exchange: default_calendar_exchange(),
            exchanges: default_exchanges(),
            market: default_market(),
            security_type: default_security_type(),
            initial_cash: default_initial_cash(),
            commission_ratio: default_commission_ratio(),
            slippage_ratio: default_slippage_ratio(),
            lot_size: default_lot_size(),
            data_file: None,
            report_dir: default_report_dir(),
            screening: ScreeningConfig::default(),
            allocation: AllocationConfig::default(),
        }
    }
}

fn default_schedule_cron() -> String {
    "0 40 9 * * Mon-Fri".to_string() // 9:40 on weekdays (cron counts Sunday as 1)
}

fn default_calendar_exchange() -> String {
    "SHSE".to_string()
}

fn default_exchanges() -> Vec<String> {
    vec!["SHSE".to_string(), "SZSE".to_string()]
}

fn default_market() -> String {
    "A_SHARE".to_string()
}

fn default_security_type() -> String {
    "STOCK".to_string()
}

fn default_initial_cash() -> f64 {
    10_000_000.0
}

fn default_commission_ratio() -> f64 {
    0.0001
}

fn default_slippage_ratio() -> f64 {
    0.0001
}

fn default_lot_size() -> u64 {
    100
}

fn default_report_dir() -> PathBuf {
    config_dir().join("reports")
}

// ============================================================================
// Screening Configuration
// ============================================================================

/// Screening thresholds as written in the config file.
///
/// Every value is optional; the strategy fills gaps with its own defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScreeningConfig {
    /// Minimum total market value
    #[serde(default)]
    pub market_cap_min: Option<f64>,

    /// Minimum current ratio
    #[serde(default)]
    pub current_ratio_min: Option<f64>,

    /// Maximum price-to-earnings
    #[serde(default)]
    pub pe_max: Option<f64>,

    /// Maximum price-to-book
    #[serde(default)]
    pub pb_max: Option<f64>,

    /// Maximum PE x PB
    #[serde(default)]
    pub pe_pb_max: Option<f64>,

    /// Minimum EPS growth (0.33 = 33%)
    #[serde(default)]
    pub eps_growth_min: Option<f64>,

    /// Consecutive profitable fiscal years required
    #[serde(default)]
    pub profit_years: Option<u32>,

    /// Years of EPS history used for growth
    #[serde(default)]
    pub eps_years: Option<u32>,

    /// Minimum trailing dividend yield
    #[serde(default)]
    pub dividend_yield_min: Option<f64>,

    /// Dividend lookback years (only affects listing seasoning)
    #[serde(default)]
    pub dividend_lookback_years: Option<u32>,

    /// PE source: "trailing" or "average_earnings"
    #[serde(default)]
    pub pe_source: Option<String>,

    /// Evaluate per-security valuation in parallel
    #[serde(default)]
    pub parallel_valuation: Option<bool>,
}

// ============================================================================
// Allocation Configuration
// ============================================================================

/// Fractions of available cash used on the selection day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationConfig {
    /// Fraction of available cash split equally across selections
    #[serde(default = "default_invest_fraction")]
    pub invest_fraction: f64,

    /// Fraction of available cash held back as frozen buffer
    #[serde(default = "default_reserve_fraction")]
    pub reserve_fraction: f64,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            invest_fraction: default_invest_fraction(),
            reserve_fraction: default_reserve_fraction(),
        }
    }
}

fn default_invest_fraction() -> f64 {
    0.95
}

fn default_reserve_fraction() -> f64 {
    0.045
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.observability.log_level, "info");
        assert_eq!(config.trading.schedule_cron, "0 40 9 * * Mon-Fri");
        assert_eq!(config.trading.exchanges, vec!["SHSE", "SZSE"]);
        assert_eq!(config.trading.lot_size, 100);
        assert!(config.trading.screening.pe_max.is_none());
        assert!((config.trading.allocation.invest_fraction - 0.95).abs() < 1e-12);
    }

    #[test]
    fn test_partial_document_uses_defaults() {
        let json = r#"{
            "observability": { "level": "debug" },
            "trading": { "screening": { "pe_max": 15.0, "profit_years": 10 } }
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.observability.log_level, "debug");
        assert_eq!(config.observability.log_format, "pretty");
        assert_eq!(config.trading.screening.pe_max, Some(15.0));
        assert_eq!(config.trading.screening.profit_years, Some(10));
        assert_eq!(config.trading.calendar_exchange, "SHSE");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{ "trading": {{ "initial_cash": 500000.0 }} }}"#).unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert!((config.trading.initial_cash - 500_000.0).abs() < 0.01);
    }

    #[test]
    fn test_load_from_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not json").unwrap();

        let err = Config::load_from(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        assert!(json.contains("schedule_cron"));
        assert!(json.contains("allocation"));

        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.trading.schedule_cron, config.trading.schedule_cron);
    }
}
