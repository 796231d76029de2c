//! brentcast runner: pipeline job, prediction service, configuration.
//!
//! This crate builds on `brentcast-core` to provide:
//! - TOML configuration with defaults for every field
//! - The pipeline job (extract → refine → split → fit → persist)
//! - A prediction service over the persisted model and watermark
//! - Range queries over the refined snapshot
//! - An optional BigQuery sink for the raw snapshot

pub mod config;
pub mod pipeline;
pub mod predict;
pub mod query;
pub mod warehouse;

pub use config::{
    ArtifactsConfig, ConfigError, PipelineConfig, PredictionConfig, SeriesConfig, SourceConfig,
    WarehouseConfig,
};
pub use pipeline::{run_pipeline, source_for, warehouse_for, PipelineError, RunSummary};
pub use predict::{PredictError, Prediction, PredictionService};
pub use query::series_range;
pub use warehouse::{BigQuerySink, LoadOutcome, WarehouseSink};
