//! Run configuration, read from TOML.
//!
//! Every field has a default, so running without a config file (or with a
//! partial one) works. Defaults reproduce the fixed layout the job has
//! always used: `data/emisoras.xls` in, `data/historical_data.csv` out,
//! responses cached under `yfinance.cache/`, two requests per five seconds.

use crate::data::DateRange;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Config file picked up from the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "histfetch.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Spreadsheet (or CSV) listing the tickers.
    pub input_path: PathBuf,
    /// Header of the ticker column.
    pub symbol_column: String,
    /// Consolidated CSV written at the end of the run.
    pub output_path: PathBuf,
    /// Directory of the HTTP response cache.
    pub cache_dir: PathBuf,
    /// Cached responses older than this are refetched. Unset: never expire.
    pub cache_expire_after_secs: Option<u64>,
    /// Days of history before today.
    pub lookback_days: u32,
    /// Requests allowed per rolling window.
    pub max_requests: u32,
    pub window_secs: u64,
    pub user_agent: String,
    pub timeout_secs: u64,
    /// Scale OHLC by adjclose/close.
    pub auto_adjust: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("data/emisoras.xls"),
            symbol_column: "Symbol".into(),
            output_path: PathBuf::from("data/historical_data.csv"),
            cache_dir: PathBuf::from("yfinance.cache"),
            cache_expire_after_secs: None,
            lookback_days: 365 * 10,
            max_requests: 2,
            window_secs: 5,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".into(),
            timeout_secs: 30,
            auto_adjust: true,
        }
    }
}

impl Config {
    /// Load a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the config for a run: the explicit path if given, else
    /// [`DEFAULT_CONFIG_FILE`] if it exists, else the defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_requests == 0 {
            return Err(ConfigError::Invalid("max_requests must be at least 1".into()));
        }
        if self.window_secs == 0 {
            return Err(ConfigError::Invalid("window_secs must be at least 1".into()));
        }
        if self.symbol_column.trim().is_empty() {
            return Err(ConfigError::Invalid("symbol_column must not be empty".into()));
        }
        Ok(())
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn cache_expire_after(&self) -> Option<Duration> {
        self.cache_expire_after_secs.map(Duration::from_secs)
    }

    /// The run's date window ending on `today`.
    pub fn date_range(&self, today: NaiveDate) -> Result<DateRange, ConfigError> {
        DateRange::ending_on(today, self.lookback_days)
            .map_err(|e| ConfigError::Invalid(format!("lookback_days: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_fixed_layout() {
        let c = Config::default();
        assert_eq!(c.input_path, PathBuf::from("data/emisoras.xls"));
        assert_eq!(c.output_path, PathBuf::from("data/historical_data.csv"));
        assert_eq!(c.symbol_column, "Symbol");
        assert_eq!(c.lookback_days, 3650);
        assert_eq!((c.max_requests, c.window()), (2, Duration::from_secs(5)));
        assert!(c.cache_expire_after().is_none());
        assert!(c.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let c = Config::from_toml(
            r#"
            input_path = "tickers.csv"
            cache_expire_after_secs = 86400
            "#,
        )
        .unwrap();
        assert_eq!(c.input_path, PathBuf::from("tickers.csv"));
        assert_eq!(c.cache_expire_after(), Some(Duration::from_secs(86400)));
        assert_eq!(c.output_path, Config::default().output_path);
    }

    #[test]
    fn empty_toml_is_default() {
        assert_eq!(Config::from_toml("").unwrap(), Config::default());
    }

    #[test]
    fn zero_rate_is_rejected() {
        let err = Config::from_toml("max_requests = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn date_range_reaches_back_lookback_days() {
        let c = Config::from_toml("lookback_days = 30").unwrap();
        let range = c.date_range(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()).unwrap();
        assert_eq!(range.start(), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }

    #[test]
    fn oversized_lookback_is_a_config_error() {
        let c = Config::from_toml("lookback_days = 200000000").unwrap();
        let err = c
            .date_range(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap())
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn unknown_type_is_parse_error() {
        let err = Config::from_toml("lookback_days = \"ten years\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_explicit_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(Some(&dir.path().join("missing.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn toml_roundtrip_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("histfetch.toml");
        let mut c = Config::default();
        c.max_requests = 5;
        std::fs::write(&path, toml::to_string_pretty(&c).unwrap()).unwrap();
        assert_eq!(Config::load(Some(&path)).unwrap(), c);
    }
}
