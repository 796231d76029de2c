//! Pipeline job: extract → store raw → (warehouse) → transform → store refined
//! → split → fit → store model + watermark → manifest.
//!
//! Sequential and synchronous. The first failing stage aborts the run; files
//! already written by earlier stages stay in place and are logged.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use brentcast_core::data::{
    extract, split, transform, ArtifactStore, HtmlFileSource, HttpSource, RunManifest,
    SeriesSource,
};
use brentcast_core::error::{
    EmptyWindowError, ExtractionError, FitError, SerializationError, SinkError, TransformError,
};
use brentcast_core::forecast::{build_forecaster, serialize_model};

use crate::config::{ConfigError, PipelineConfig};
use crate::warehouse::{BigQuerySink, LoadOutcome, WarehouseSink};

/// Errors from a pipeline run, one variant per stage family.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractionError),
    #[error("transform failed: {0}")]
    Transform(#[from] TransformError),
    #[error("split failed: {0}")]
    Split(#[from] EmptyWindowError),
    #[error("fit failed: {0}")]
    Fit(#[from] FitError),
    #[error("model serialization failed: {0}")]
    Serialization(#[from] SerializationError),
    #[error("artifact sink failed: {0}")]
    Sink(#[from] SinkError),
}

/// What a successful run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub artifacts_dir: PathBuf,
    pub manifest: RunManifest,
    pub warehouse: Option<LoadOutcome>,
}

/// Build the page source: a saved HTML file when given, the configured URL otherwise.
pub fn source_for(
    config: &PipelineConfig,
    offline_html: Option<&Path>,
) -> Result<Box<dyn SeriesSource>, PipelineError> {
    Ok(match offline_html {
        Some(path) => Box::new(HtmlFileSource::new(path)),
        None => Box::new(HttpSource::new(
            config.source.url.clone(),
            Duration::from_secs(config.source.timeout_secs),
            config.source.max_retries,
        )?),
    })
}

/// Build the warehouse sink if one is configured.
pub fn warehouse_for(
    config: &PipelineConfig,
) -> Result<Option<Box<dyn WarehouseSink>>, PipelineError> {
    match &config.warehouse {
        Some(wh) => Ok(Some(Box::new(BigQuerySink::from_config(wh)?))),
        None => Ok(None),
    }
}

/// Run every stage once.
pub fn run_pipeline(
    config: &PipelineConfig,
    source: &dyn SeriesSource,
    warehouse: Option<&dyn WarehouseSink>,
) -> Result<RunSummary, PipelineError> {
    config.validate()?;
    let store = ArtifactStore::new(&config.artifacts.dir);
    let mut written: Vec<&'static str> = Vec::new();

    let result = run_stages(config, &store, source, warehouse, &mut written);
    if let Err(e) = &result {
        if written.is_empty() {
            error!(error = %e, "pipeline aborted before writing any artifact");
        } else {
            warn!(
                error = %e,
                written = ?written,
                dir = %store.dir().display(),
                "pipeline aborted after partial writes; listed artifacts are from this run, the rest are older"
            );
        }
    }
    result
}

fn run_stages(
    config: &PipelineConfig,
    store: &ArtifactStore,
    source: &dyn SeriesSource,
    warehouse: Option<&dyn WarehouseSink>,
    written: &mut Vec<&'static str>,
) -> Result<RunSummary, PipelineError> {
    info!(source = source.name(), dir = %store.dir().display(), "pipeline run started");

    let raw = stage("extract", extract(source, &config.source.table))?;
    stage("store raw", store.write_raw(&raw))?;
    written.push("raw");

    let loaded = match warehouse {
        Some(sink) => {
            let bytes = stage("warehouse", store.raw_bytes())?;
            let outcome = stage("warehouse", sink.load_parquet(&bytes))?;
            written.push("warehouse");
            Some(outcome)
        }
        None => None,
    };

    let refined = stage("transform", transform(&raw, &config.series.series_id))?;
    stage("store refined", store.write_refined(&refined))?;
    written.push("refined");

    let (window, watermark) = stage("split", split(&refined, config.series.start_train_date))?;

    let forecaster = stage("fit", build_forecaster(&config.model))?;
    let model = stage("fit", forecaster.fit(&window))?;
    let model_text = stage("serialize", serialize_model(model.as_ref()))?;
    stage(
        "store model",
        store.write_model_and_watermark(&model_text, watermark),
    )?;
    written.push("model+watermark");

    let manifest = RunManifest {
        run_at: chrono::Utc::now().naive_utc(),
        source: source.location(),
        series_id: config.series.series_id.clone(),
        raw_rows: raw.len(),
        refined_rows: refined.len(),
        first_date: refined.first_date().unwrap_or(window.start),
        train_start: config.series.start_train_date,
        train_rows: window.len(),
        watermark,
        model_kind: model.kind().to_string(),
        data_hash: stage("manifest", RunManifest::hash_series(&refined))?,
    };
    stage("manifest", store.write_manifest(&manifest))?;

    info!(
        raw_rows = manifest.raw_rows,
        refined_rows = manifest.refined_rows,
        train_rows = manifest.train_rows,
        watermark = %watermark,
        model = %manifest.model_kind,
        "pipeline run complete"
    );
    Ok(RunSummary {
        artifacts_dir: store.dir().to_path_buf(),
        manifest,
        warehouse: loaded,
    })
}

/// Tag a stage failure in the log before it propagates.
fn stage<T, E>(name: &'static str, result: Result<T, E>) -> Result<T, PipelineError>
where
    E: Into<PipelineError> + std::fmt::Display,
{
    result.map_err(|e| {
        error!(stage = name, error = %e, "pipeline stage failed");
        e.into()
    })
}
