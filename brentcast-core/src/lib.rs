//! brentcast core: Brent crude price series refinement and forecasting.
//!
//! - Domain types (raw observations, refined series, training window, watermark, forecasts)
//! - Extractor over a pluggable page source, HTML table parsing
//! - Transformer producing a continuous forward-filled daily series
//! - Splitter (training window + watermark)
//! - Forecasters behind a fit/predict/serialize trait pair
//! - Horizon calculator with watermark fallback
//! - Artifact store (Parquet snapshots, model + watermark pair, run manifest)

pub mod data;
pub mod domain;
pub mod error;
pub mod forecast;
pub mod horizon;
