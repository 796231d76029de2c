//! Error taxonomy for the forecast pipeline.
//!
//! One type per failure family. Pipeline-stage errors (extraction, transform,
//! split, fit) abort a run; prediction-path errors are either degraded by the
//! caller (watermark) or surfaced (model).

use chrono::NaiveDate;
use thiserror::Error;

/// Failures fetching or decoding the source table.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("source unreachable: {0}")]
    Unreachable(String),

    #[error("source returned HTTP {status} for {url}")]
    HttpStatus { status: u16, url: String },

    #[error("expected table #{index} but the page has {found} table(s)")]
    TableNotFound { index: usize, found: usize },

    #[error("malformed page: {0}")]
    Malformed(String),

    #[error("table #{index} has no header row")]
    MissingHeader { index: usize },

    #[error("column '{column}' not found in header {header:?}")]
    ColumnMissing { column: String, header: Vec<String> },

    #[error("row {row}: '{value}' is not a number")]
    InvalidNumber { row: usize, value: String },

    #[error("could not read source file: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures converting raw observations into a refined series.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("row {row}: unparseable date '{value}' (expected dd/mm/yyyy)")]
    InvalidDate { row: usize, value: String },

    #[error("no priced observations to refine")]
    Empty,
}

/// The training window is empty after applying the start cutoff.
#[derive(Debug, Error)]
#[error("training window is empty: no observed day on or after {start} (last observed day: {last:?})")]
pub struct EmptyWindowError {
    pub start: NaiveDate,
    pub last: Option<NaiveDate>,
}

/// A forecast horizon that cannot be honoured.
#[derive(Debug, Error)]
#[error("invalid forecast horizon: {days} day(s)")]
pub struct InvalidHorizonError {
    pub days: i64,
}

/// Failures fitting a forecaster.
#[derive(Debug, Error)]
pub enum FitError {
    #[error("need at least {required} training rows, got {actual}")]
    TooFewRows { required: usize, actual: usize },

    #[error("training value on {date} is not finite")]
    NonFinite { date: NaiveDate },

    #[error("design matrix is singular; least squares has no stable solution")]
    Singular,

    #[error("invalid model configuration: {0}")]
    InvalidConfig(String),
}

/// Failures reading or decoding persisted model / watermark text.
#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("model JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown model kind '{0}'")]
    UnknownKind(String),

    #[error("watermark text '{0}' is not a YYYY-MM-DD date")]
    Watermark(String),

    #[error("could not read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Failures writing or loading artifacts, locally or in the warehouse.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("artifact I/O on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parquet I/O error: {0}")]
    Parquet(String),

    #[error("artifact validation error: {0}")]
    Validation(String),

    #[error("no '{0}' artifact; run the pipeline first")]
    Missing(String),

    #[error("warehouse load failed: {0}")]
    Warehouse(String),
}

impl SinkError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        SinkError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}
