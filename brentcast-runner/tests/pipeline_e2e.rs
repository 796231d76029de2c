//! End-to-end: fixture page → pipeline run → predictions and series queries.
//!
//! Uses the frozen IPEA fixture from `brentcast-core/tests/fixtures` as an
//! offline source and a temp artifact directory per test.

use brentcast_core::data::ArtifactStore;
use brentcast_core::domain::Watermark;
use brentcast_core::horizon::HorizonSource;
use brentcast_runner::config::PipelineConfig;
use brentcast_runner::pipeline::{run_pipeline, source_for, PipelineError};
use brentcast_runner::predict::{PredictError, PredictionService};
use brentcast_runner::query::series_range;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};

fn core_fixture() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .join("brentcast-core/tests/fixtures/ipea_brent.html")
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn config_in(dir: &Path, extra: &str) -> PipelineConfig {
    let toml_str = format!(
        r#"[series]
series_id = "brent"
start_train_date = "2018-01-01"

[model]
uncertainty_samples = 100

[artifacts]
dir = "{}"

{extra}
"#,
        dir.display().to_string().replace('\\', "/")
    );
    PipelineConfig::from_toml(&toml_str).unwrap()
}

fn run(config: &PipelineConfig) -> brentcast_runner::RunSummary {
    let source = source_for(config, Some(&core_fixture())).unwrap();
    run_pipeline(config, source.as_ref(), None).unwrap()
}

#[test]
fn pipeline_then_predict() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config_in(tmp.path(), "");
    let summary = run(&config);

    assert_eq!(summary.manifest.raw_rows, 195);
    assert_eq!(summary.manifest.refined_rows, 271);
    assert_eq!(summary.manifest.train_rows, 180);
    assert_eq!(summary.manifest.watermark, Watermark(day(2018, 6, 29)));

    let service = PredictionService::from_config(&config).unwrap();
    let p = service.predict(day(2018, 7, 8)).unwrap();
    assert_eq!(p.horizon.days, 9);
    assert_eq!(p.forecast_date, day(2018, 7, 8));
    assert!(!p.horizon.source.is_fallback());
    let (lo, hi) = (p.lower.unwrap(), p.upper.unwrap());
    assert!(lo < p.value && p.value < hi);
}

#[test]
fn predictions_are_stable_across_service_instances() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config_in(tmp.path(), "");
    run(&config);

    let targets = [day(2018, 7, 1), day(2018, 7, 15), day(2018, 8, 1)];
    let a = PredictionService::from_config(&config).unwrap().predict_many(&targets);
    let b = PredictionService::from_config(&config).unwrap().predict_many(&targets);
    for (x, y) in a.into_iter().zip(b) {
        assert_eq!(x.unwrap(), y.unwrap());
    }
}

#[test]
fn lost_watermark_falls_back_to_one_day() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config_in(tmp.path(), "");
    run(&config);
    std::fs::remove_file(tmp.path().join("lastday")).unwrap();

    let service = PredictionService::from_config(&config).unwrap();
    let p = service.predict(day(2018, 7, 8)).unwrap();
    assert_eq!(p.horizon.days, 1);
    assert!(matches!(p.horizon.source, HorizonSource::Fallback { .. }));
    assert_eq!(p.forecast_date, day(2018, 6, 30));
}

#[test]
fn configured_fallback_horizon_is_used() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config_in(tmp.path(), "[prediction]\nfallback_horizon_days = 3\n");
    run(&config);
    std::fs::write(tmp.path().join("lastday"), "").unwrap();

    let p = PredictionService::from_config(&config)
        .unwrap()
        .predict(day(2018, 7, 8))
        .unwrap();
    assert_eq!(p.horizon.days, 3);
    assert_eq!(p.forecast_date, day(2018, 7, 2));
}

#[test]
fn corrupt_model_is_reported() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config_in(tmp.path(), "");
    run(&config);
    std::fs::write(tmp.path().join("serialized_model.json"), "{\"kind\":\"additive\"}").unwrap();

    let err = PredictionService::from_config(&config).err().unwrap();
    assert!(matches!(err, PredictError::Model(_)));
}

#[test]
fn drift_model_runs_end_to_end() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = config_in(tmp.path(), "");
    config.model.kind = brentcast_core::forecast::ModelKind::Drift;
    let summary = run(&config);
    assert_eq!(summary.manifest.model_kind, "drift");

    let p = PredictionService::from_config(&config)
        .unwrap()
        .predict(day(2018, 7, 2))
        .unwrap();
    assert_eq!(p.horizon.days, 3);
}

#[test]
fn series_query_reads_refined_snapshot() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config_in(tmp.path(), "");
    run(&config);

    let store = ArtifactStore::new(tmp.path());
    let rows = series_range(&store, Some(day(2017, 12, 22)), Some(day(2017, 12, 26))).unwrap();
    assert_eq!(rows.len(), 5);
    assert!(rows.iter().skip(1).take(3).all(|p| p.value == rows[0].value));
}

#[test]
fn start_after_last_day_aborts_without_model() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = config_in(tmp.path(), "");
    config.series.start_train_date = day(2019, 1, 1);

    let source = source_for(&config, Some(&core_fixture())).unwrap();
    let err = run_pipeline(&config, source.as_ref(), None).unwrap_err();
    assert!(matches!(err, PipelineError::Split(_)));

    let status = ArtifactStore::new(tmp.path()).status();
    assert!(status.raw && status.refined);
    assert!(!status.model);
    assert!(status.watermark.is_none());
}
