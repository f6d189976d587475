//! Runtime configuration, loadable from TOML.
//!
//! Every key is optional; missing keys fall back to the defaults below.
//!
//! ```toml
//! decimal_places = 2
//! history_limit = 5
//!
//! [store]
//! timeout_ms = 5000
//!
//! [report]
//! timeout_ms = 10000
//!
//! [execution]
//! num_threads = 2
//! max_in_flight_jobs = 4
//!
//! [headers.aliases]
//! "unit name" = "equipment_name"
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::execution::ExecutionOptions;
use crate::ingestion::csv::{default_header_aliases, normalize_header, CsvRecordParser, REQUIRED_COLUMNS};
use crate::report::format::{Precision, MAX_DECIMAL_PLACES};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Decimal places for displayed averages.
    #[serde(default = "default_decimal_places")]
    pub decimal_places: u32,
    /// Number of entries returned by the short history view.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub headers: HeaderConfig,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            decimal_places: default_decimal_places(),
            history_limit: default_history_limit(),
            store: StoreConfig::default(),
            report: ReportConfig::default(),
            execution: ExecutionConfig::default(),
            headers: HeaderConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_store_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_report_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_report_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Worker threads; unset means available parallelism.
    #[serde(default)]
    pub num_threads: Option<usize>,
    #[serde(default = "default_max_in_flight_jobs")]
    pub max_in_flight_jobs: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            num_threads: None,
            max_in_flight_jobs: default_max_in_flight_jobs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderConfig {
    /// Extra header spellings, mapped onto canonical column names.
    #[serde(default = "default_header_aliases")]
    pub aliases: BTreeMap<String, String>,
}

impl Default for HeaderConfig {
    fn default() -> Self {
        Self {
            aliases: default_header_aliases(),
        }
    }
}

fn default_decimal_places() -> u32 { 2 }
fn default_history_limit() -> usize { 5 }
fn default_store_timeout_ms() -> u64 { 5_000 }
fn default_report_timeout_ms() -> u64 { 10_000 }
fn default_max_in_flight_jobs() -> usize { 4 }

impl AnalyticsConfig {
    /// Parse and validate a TOML document.
    ///
    /// # Errors
    /// Returns [`ConfigError::Toml`] for syntax/type errors and [`ConfigError::Invalid`] if
    /// validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    ///
    /// # Errors
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`Self::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Check value ranges.
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] naming the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.decimal_places > MAX_DECIMAL_PLACES {
            return Err(invalid(format!(
                "decimal_places must be <= {MAX_DECIMAL_PLACES}, got {}",
                self.decimal_places
            )));
        }
        if self.store.timeout_ms == 0 {
            return Err(invalid("store.timeout_ms must be > 0".to_string()));
        }
        if self.report.timeout_ms == 0 {
            return Err(invalid("report.timeout_ms must be > 0".to_string()));
        }
        if self.execution.max_in_flight_jobs == 0 {
            return Err(invalid("execution.max_in_flight_jobs must be > 0".to_string()));
        }
        if self.execution.num_threads == Some(0) {
            return Err(invalid("execution.num_threads must be > 0 when set".to_string()));
        }
        for (from, to) in &self.headers.aliases {
            if !REQUIRED_COLUMNS.contains(&normalize_header(to).as_str()) {
                return Err(invalid(format!(
                    "headers.aliases.{from} maps to unknown column '{to}'"
                )));
            }
        }
        Ok(())
    }

    pub fn precision(&self) -> Precision {
        Precision::new(self.decimal_places.min(MAX_DECIMAL_PLACES))
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store.timeout_ms)
    }

    pub fn report_timeout(&self) -> Duration {
        Duration::from_millis(self.report.timeout_ms)
    }

    pub fn execution_options(&self) -> ExecutionOptions {
        ExecutionOptions {
            num_threads: self.execution.num_threads,
            max_in_flight_jobs: self.execution.max_in_flight_jobs.max(1),
        }
    }

    pub fn parser(&self) -> CsvRecordParser {
        CsvRecordParser::new(self.headers.aliases.clone())
    }
}

fn invalid(message: String) -> ConfigError {
    ConfigError::Invalid { message }
}
