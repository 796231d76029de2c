//! Artifact store: the files one pipeline run leaves behind.
//!
//! Layout under `{dir}`:
//! - `raw_data.parquet`: extracted table (`Data`, `preco_petroleo_bruto`)
//! - `refined_data.parquet`: refined series (`ds`, `y`, `unique_id`)
//! - `serialized_model.json`: tagged model envelope
//! - `lastday`: watermark date, first line
//! - `manifest.json`: run metadata sidecar
//!
//! Every write goes to `{name}.tmp` first and is renamed into place, so
//! readers never observe a half-written file. Model and watermark are staged
//! together and renamed back to back.

use crate::domain::{RawObservation, RefinedSeries, SeriesPoint, Watermark};
use crate::error::{SerializationError, SinkError};
use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const RAW_FILE: &str = "raw_data.parquet";
pub const REFINED_FILE: &str = "refined_data.parquet";
pub const MODEL_FILE: &str = "serialized_model.json";
pub const WATERMARK_FILE: &str = "lastday";
pub const MANIFEST_FILE: &str = "manifest.json";

const RAW_DATE_COLUMN: &str = "Data";
const RAW_PRICE_COLUMN: &str = "preco_petroleo_bruto";

/// Metadata sidecar for one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_at: chrono::NaiveDateTime,
    pub source: String,
    pub series_id: String,
    pub raw_rows: usize,
    pub refined_rows: usize,
    pub first_date: NaiveDate,
    pub train_start: NaiveDate,
    pub train_rows: usize,
    pub watermark: Watermark,
    pub model_kind: String,
    pub data_hash: String,
}

impl RunManifest {
    /// BLAKE3 over the refined points, hex-encoded.
    pub fn hash_series(series: &RefinedSeries) -> Result<String, SinkError> {
        let bytes = serde_json::to_vec(series.points())
            .map_err(|e| SinkError::Validation(format!("hash serialization: {e}")))?;
        Ok(blake3::hash(&bytes).to_hex().to_string())
    }
}

/// Which artifacts exist, for status reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactStatus {
    pub dir: PathBuf,
    pub raw: bool,
    pub refined: bool,
    pub model: bool,
    pub watermark: Option<Watermark>,
    pub manifest: Option<RunManifest>,
}

/// File-backed artifact store.
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root directory of the store.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    fn ensure_dir(&self) -> Result<(), SinkError> {
        fs::create_dir_all(&self.dir).map_err(|e| SinkError::io(&self.dir, e))
    }

    // ── Raw snapshot ────────────────────────────────────────────────

    pub fn write_raw(&self, rows: &[RawObservation]) -> Result<(), SinkError> {
        self.ensure_dir()?;
        let df = raw_to_dataframe(rows)?;
        write_parquet_atomic(&df, &self.path(RAW_FILE))?;
        debug!(rows = rows.len(), "wrote raw snapshot");
        Ok(())
    }

    pub fn load_raw(&self) -> Result<Vec<RawObservation>, SinkError> {
        let df = read_parquet(&self.path(RAW_FILE), RAW_FILE)?;
        dataframe_to_raw(&df)
    }

    /// Bytes of the raw snapshot, as handed to the warehouse loader.
    pub fn raw_bytes(&self) -> Result<Vec<u8>, SinkError> {
        let path = self.path(RAW_FILE);
        if !path.exists() {
            return Err(SinkError::Missing(RAW_FILE.into()));
        }
        fs::read(&path).map_err(|e| SinkError::io(&path, e))
    }

    // ── Refined snapshot ────────────────────────────────────────────

    pub fn write_refined(&self, series: &RefinedSeries) -> Result<(), SinkError> {
        if series.is_empty() {
            return Err(SinkError::Validation("no rows to write".into()));
        }
        self.ensure_dir()?;
        let df = refined_to_dataframe(series)?;
        write_parquet_atomic(&df, &self.path(REFINED_FILE))?;
        debug!(rows = series.len(), "wrote refined snapshot");
        Ok(())
    }

    /// Load the refined series, validating its schema and continuity.
    pub fn load_refined(&self) -> Result<RefinedSeries, SinkError> {
        let df = read_parquet(&self.path(REFINED_FILE), REFINED_FILE)?;
        let series = dataframe_to_refined(&df)?;
        if !series.is_continuous() {
            return Err(SinkError::Validation(
                "refined snapshot is not a continuous daily series".into(),
            ));
        }
        Ok(series)
    }

    // ── Model + watermark ───────────────────────────────────────────

    /// Replace the model and watermark as a pair.
    ///
    /// Both files are fully written to temp paths before either rename, so a
    /// failure while staging leaves the previous pair untouched.
    pub fn write_model_and_watermark(
        &self,
        model_text: &str,
        watermark: Watermark,
    ) -> Result<(), SinkError> {
        self.ensure_dir()?;
        let model_path = self.path(MODEL_FILE);
        let wm_path = self.path(WATERMARK_FILE);
        let model_tmp = tmp_path(&model_path);
        let wm_tmp = tmp_path(&wm_path);

        let staged = fs::write(&model_tmp, model_text)
            .map_err(|e| SinkError::io(&model_tmp, e))
            .and_then(|_| {
                fs::write(&wm_tmp, format!("{watermark}\n")).map_err(|e| SinkError::io(&wm_tmp, e))
            });
        if let Err(e) = staged {
            let _ = fs::remove_file(&model_tmp);
            let _ = fs::remove_file(&wm_tmp);
            return Err(e);
        }

        rename_into_place(&model_tmp, &model_path)?;
        if let Err(e) = rename_into_place(&wm_tmp, &wm_path) {
            warn!(
                error = %e,
                "model replaced but watermark rename failed; artifacts are a mixed pair until the next run"
            );
            return Err(e);
        }
        Ok(())
    }

    pub fn read_model_text(&self) -> Result<String, SerializationError> {
        let path = self.path(MODEL_FILE);
        fs::read_to_string(&path).map_err(|source| SerializationError::Read {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn read_watermark(&self) -> Result<Watermark, SerializationError> {
        let path = self.path(WATERMARK_FILE);
        let text = fs::read_to_string(&path).map_err(|source| SerializationError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Watermark::parse(&text)
    }

    // ── Manifest ────────────────────────────────────────────────────

    pub fn write_manifest(&self, manifest: &RunManifest) -> Result<(), SinkError> {
        self.ensure_dir()?;
        let json = serde_json::to_string_pretty(manifest)
            .map_err(|e| SinkError::Validation(format!("manifest serialization: {e}")))?;
        write_atomic(&self.path(MANIFEST_FILE), json.as_bytes())
    }

    pub fn read_manifest(&self) -> Option<RunManifest> {
        let content = fs::read_to_string(self.path(MANIFEST_FILE)).ok()?;
        serde_json::from_str(&content).ok()
    }

    pub fn status(&self) -> ArtifactStatus {
        ArtifactStatus {
            dir: self.dir.clone(),
            raw: self.path(RAW_FILE).exists(),
            refined: self.path(REFINED_FILE).exists(),
            model: self.path(MODEL_FILE).exists(),
            watermark: self.read_watermark().ok(),
            manifest: self.read_manifest(),
        }
    }
}

// ── File helpers ────────────────────────────────────────────────────

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn rename_into_place(tmp: &Path, path: &Path) -> Result<(), SinkError> {
    fs::rename(tmp, path).map_err(|e| {
        let _ = fs::remove_file(tmp);
        SinkError::io(path, e)
    })
}

/// Write bytes to `{path}.tmp`, then rename over `path`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), SinkError> {
    let tmp = tmp_path(path);
    fs::write(&tmp, bytes).map_err(|e| SinkError::io(&tmp, e))?;
    rename_into_place(&tmp, path)
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

fn epoch() -> NaiveDate {
    NaiveDate::default()
}

fn raw_to_dataframe(rows: &[RawObservation]) -> Result<DataFrame, SinkError> {
    let dates: Vec<&str> = rows.iter().map(|r| r.date.as_str()).collect();
    let prices: Vec<Option<f64>> = rows.iter().map(|r| r.price).collect();

    DataFrame::new(vec![
        Column::new(RAW_DATE_COLUMN.into(), dates),
        Column::new(RAW_PRICE_COLUMN.into(), prices),
    ])
    .map_err(|e| SinkError::Parquet(format!("dataframe creation: {e}")))
}

fn refined_to_dataframe(series: &RefinedSeries) -> Result<DataFrame, SinkError> {
    let epoch = epoch();
    let ds: Vec<i32> = series
        .points()
        .iter()
        .map(|p| (p.date - epoch).num_days() as i32)
        .collect();
    let y: Vec<f64> = series.points().iter().map(|p| p.value).collect();
    let ids: Vec<&str> = vec![series.series_id(); series.len()];

    DataFrame::new(vec![
        Column::new("ds".into(), ds)
            .cast(&DataType::Date)
            .map_err(|e| SinkError::Parquet(format!("date cast: {e}")))?,
        Column::new("y".into(), y),
        Column::new("unique_id".into(), ids),
    ])
    .map_err(|e| SinkError::Parquet(format!("dataframe creation: {e}")))
}

fn write_parquet_atomic(df: &DataFrame, path: &Path) -> Result<(), SinkError> {
    let tmp = tmp_path(path);
    let file = fs::File::create(&tmp).map_err(|e| SinkError::io(&tmp, e))?;
    if let Err(e) = ParquetWriter::new(file).finish(&mut df.clone()) {
        let _ = fs::remove_file(&tmp);
        return Err(SinkError::Parquet(format!("write parquet: {e}")));
    }
    rename_into_place(&tmp, path)
}

fn read_parquet(path: &Path, name: &str) -> Result<DataFrame, SinkError> {
    if !path.exists() {
        return Err(SinkError::Missing(name.into()));
    }
    let file = fs::File::open(path).map_err(|e| SinkError::io(path, e))?;
    ParquetReader::new(file)
        .finish()
        .map_err(|e| SinkError::Parquet(format!("read {name}: {e}")))
}

fn require_columns(df: &DataFrame, cols: &[&str]) -> Result<(), SinkError> {
    for col_name in cols {
        if df.column(col_name).is_err() {
            return Err(SinkError::Validation(format!("missing column '{col_name}'")));
        }
    }
    Ok(())
}

fn dataframe_to_raw(df: &DataFrame) -> Result<Vec<RawObservation>, SinkError> {
    require_columns(df, &[RAW_DATE_COLUMN, RAW_PRICE_COLUMN])?;
    let map_err = |e: PolarsError| SinkError::Parquet(format!("column read: {e}"));

    let dates = df
        .column(RAW_DATE_COLUMN)
        .map_err(map_err)?
        .str()
        .map_err(|e| SinkError::Parquet(format!("date column type: {e}")))?;
    let prices = df
        .column(RAW_PRICE_COLUMN)
        .map_err(map_err)?
        .f64()
        .map_err(|e| SinkError::Parquet(format!("price column type: {e}")))?;

    (0..df.height())
        .map(|i| {
            let date = dates
                .get(i)
                .ok_or_else(|| SinkError::Validation(format!("null date at row {i}")))?;
            Ok(RawObservation::new(date, prices.get(i)))
        })
        .collect()
}

fn dataframe_to_refined(df: &DataFrame) -> Result<RefinedSeries, SinkError> {
    if df.height() == 0 {
        return Err(SinkError::Validation("empty refined snapshot".into()));
    }
    require_columns(df, &["ds", "y", "unique_id"])?;
    let map_err = |e: PolarsError| SinkError::Parquet(format!("column read: {e}"));

    let ds = df
        .column("ds")
        .map_err(map_err)?
        .date()
        .map_err(|e| SinkError::Parquet(format!("ds column type: {e}")))?;
    let y = df
        .column("y")
        .map_err(map_err)?
        .f64()
        .map_err(|e| SinkError::Parquet(format!("y column type: {e}")))?;
    let ids = df
        .column("unique_id")
        .map_err(map_err)?
        .str()
        .map_err(|e| SinkError::Parquet(format!("unique_id column type: {e}")))?;

    let series_id = ids
        .get(0)
        .ok_or_else(|| SinkError::Validation("null unique_id".into()))?
        .to_string();
    let epoch = epoch();

    let points = (0..df.height())
        .map(|i| {
            let days = ds
                .get(i)
                .ok_or_else(|| SinkError::Validation(format!("null ds at row {i}")))?;
            let value = y
                .get(i)
                .ok_or_else(|| SinkError::Validation(format!("null y at row {i}")))?;
            Ok(SeriesPoint {
                date: epoch + chrono::Duration::days(days as i64),
                value,
            })
        })
        .collect::<Result<Vec<_>, SinkError>>()?;

    Ok(RefinedSeries::from_points(series_id, points))
}
