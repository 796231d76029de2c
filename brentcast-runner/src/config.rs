//! Pipeline configuration, loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration that scrapes the live IPEA page into `./artifacts`.

use brentcast_core::data::provider::IPEA_BRENT_URL;
use brentcast_core::data::TableLayout;
use brentcast_core::forecast::{ModelConfig, MAX_HORIZON_DAYS};
use brentcast_core::horizon::{HorizonPolicy, DEFAULT_FALLBACK_HORIZON, DEFAULT_MAX_HORIZON};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Upper bound on `source.max_retries`.
const MAX_RETRIES: u32 = 10;

/// Errors loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Complete pipeline configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub source: SourceConfig,
    pub series: SeriesConfig,
    pub model: ModelConfig,
    pub artifacts: ArtifactsConfig,
    pub prediction: PredictionConfig,
    /// Warehouse load of the raw snapshot; skipped when absent.
    pub warehouse: Option<WarehouseConfig>,
}

impl PipelineConfig {
    /// Load a configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source.url.trim().is_empty() {
            return Err(ConfigError::Invalid("source.url is empty".into()));
        }
        if self.series.series_id.trim().is_empty() {
            return Err(ConfigError::Invalid("series.series_id is empty".into()));
        }
        if self.source.timeout_secs == 0 {
            return Err(ConfigError::Invalid("source.timeout_secs must be > 0".into()));
        }
        if self.prediction.fallback_horizon_days < 0 {
            return Err(ConfigError::Invalid(format!(
                "prediction.fallback_horizon_days must be >= 0, got {}",
                self.prediction.fallback_horizon_days
            )));
        }
        if self.source.max_retries > MAX_RETRIES {
            return Err(ConfigError::Invalid(format!(
                "source.max_retries must be <= {MAX_RETRIES}, got {}",
                self.source.max_retries
            )));
        }
        let max = self.prediction.max_horizon_days;
        if !(1..=MAX_HORIZON_DAYS).contains(&max) {
            return Err(ConfigError::Invalid(format!(
                "prediction.max_horizon_days must be in 1..={MAX_HORIZON_DAYS}, got {max}"
            )));
        }
        if self.prediction.fallback_horizon_days > max {
            return Err(ConfigError::Invalid(format!(
                "prediction.fallback_horizon_days ({}) exceeds max_horizon_days ({max})",
                self.prediction.fallback_horizon_days
            )));
        }
        self.model
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("model: {e}")))?;
        if let Some(wh) = &self.warehouse {
            for (name, value) in [
                ("project", &wh.project),
                ("dataset", &wh.dataset),
                ("table", &wh.table),
                ("token_env", &wh.token_env),
            ] {
                if value.trim().is_empty() {
                    return Err(ConfigError::Invalid(format!("warehouse.{name} is empty")));
                }
            }
        }
        Ok(())
    }
}

/// Where the page comes from and how its table is laid out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub url: String,
    #[serde(flatten)]
    pub table: TableLayout,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: IPEA_BRENT_URL.into(),
            table: TableLayout::default(),
            timeout_secs: 30,
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeriesConfig {
    pub series_id: String,
    /// First day of the training window (inclusive).
    pub start_train_date: NaiveDate,
}

impl Default for SeriesConfig {
    fn default() -> Self {
        Self {
            series_id: "petroleo_bruto".into(),
            start_train_date: NaiveDate::from_ymd_opt(2018, 1, 1).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactsConfig {
    pub dir: PathBuf,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("artifacts"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    /// Horizon used when the watermark cannot be read.
    pub fallback_horizon_days: i64,
    /// Requests further out than this are rejected.
    pub max_horizon_days: i64,
}

impl PredictionConfig {
    pub fn policy(&self) -> HorizonPolicy {
        HorizonPolicy {
            fallback: self.fallback_horizon_days,
            max_days: self.max_horizon_days,
        }
    }
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            fallback_horizon_days: DEFAULT_FALLBACK_HORIZON,
            max_horizon_days: DEFAULT_MAX_HORIZON,
        }
    }
}

/// BigQuery destination for the raw snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarehouseConfig {
    pub project: String,
    pub dataset: String,
    pub table: String,
    /// Environment variable holding an OAuth access token.
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

fn default_token_env() -> String {
    "BRENTCAST_BQ_TOKEN".into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use brentcast_core::forecast::ModelKind;

    #[test]
    fn empty_file_is_all_defaults() {
        let config = PipelineConfig::from_toml("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.source.url, IPEA_BRENT_URL);
        assert_eq!(config.source.table.table_index, 2);
        assert_eq!(
            config.series.start_train_date,
            NaiveDate::from_ymd_opt(2018, 1, 1).unwrap()
        );
        assert_eq!(config.model.interval_width, 0.95);
        assert_eq!(config.prediction.fallback_horizon_days, 1);
        assert_eq!(config.prediction.max_horizon_days, DEFAULT_MAX_HORIZON);
        assert!(config.warehouse.is_none());
    }

    #[test]
    fn sections_override_defaults() {
        let toml_str = r#"
            [source]
            url = "http://localhost:8080/brent"
            table_index = 0
            timeout_secs = 5

            [series]
            series_id = "brent_fob"
            start_train_date = "2020-06-01"

            [model]
            kind = "drift"
            interval_width = 0.8

            [artifacts]
            dir = "/tmp/brent"

            [warehouse]
            project = "proj"
            dataset = "oil"
            table = "raw_data"
        "#;
        let config = PipelineConfig::from_toml(toml_str).unwrap();

        assert_eq!(config.source.url, "http://localhost:8080/brent");
        assert_eq!(config.source.table.table_index, 0);
        assert_eq!(config.source.table.date_column, "Data");
        assert_eq!(config.source.timeout_secs, 5);
        assert_eq!(config.source.max_retries, 3);
        assert_eq!(config.series.series_id, "brent_fob");
        assert_eq!(config.model.kind, ModelKind::Drift);
        assert_eq!(config.model.interval_width, 0.8);
        assert_eq!(config.model.n_changepoints, 25);
        assert_eq!(config.artifacts.dir, PathBuf::from("/tmp/brent"));

        let wh = config.warehouse.unwrap();
        assert_eq!(wh.table, "raw_data");
        assert_eq!(wh.token_env, "BRENTCAST_BQ_TOKEN");
    }

    #[test]
    fn invalid_values_are_rejected() {
        let bad_width = "[model]\ninterval_width = 1.2\n";
        assert!(matches!(
            PipelineConfig::from_toml(bad_width),
            Err(ConfigError::Invalid(_))
        ));

        let bad_fallback = "[prediction]\nfallback_horizon_days = -2\n";
        assert!(matches!(
            PipelineConfig::from_toml(bad_fallback),
            Err(ConfigError::Invalid(_))
        ));

        let bad_max = "[prediction]\nmax_horizon_days = 0\n";
        assert!(matches!(
            PipelineConfig::from_toml(bad_max),
            Err(ConfigError::Invalid(_))
        ));

        let fallback_past_max = "[prediction]\nfallback_horizon_days = 30\nmax_horizon_days = 7\n";
        assert!(matches!(
            PipelineConfig::from_toml(fallback_past_max),
            Err(ConfigError::Invalid(_))
        ));

        let bad_retries = "[source]\nmax_retries = 64\n";
        assert!(matches!(
            PipelineConfig::from_toml(bad_retries),
            Err(ConfigError::Invalid(_))
        ));

        let bad_date = "[series]\nstart_train_date = \"01/01/2018\"\n";
        assert!(matches!(
            PipelineConfig::from_toml(bad_date),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = PipelineConfig::from_file(Path::new("/nonexistent/brentcast.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
