//! Forecasters: fit on a training window, project future days, round-trip as text.
//!
//! Two implementations ship:
//!
//! - [`AdditiveForecaster`]: piecewise-linear trend with automatic
//!   changepoints plus yearly and weekly Fourier seasonality, fitted by
//!   ridge least squares; intervals from seeded trend/noise simulation
//! - [`DriftForecaster`]: last value plus average daily change, normal bands
//!
//! Fitted models serialize to a tagged JSON envelope
//! `{"kind": "...", "model": {...}}`. [`deserialize_model`] dispatches on
//! `kind`, so a new model is one more `ModelKind` variant and match arm.

mod additive;
mod drift;
pub mod features;
pub mod sampling;
mod solve;

pub use additive::{AdditiveForecaster, AdditiveModel};
pub use drift::{DriftForecaster, DriftModel};

use crate::domain::{ForecastResult, TrainingWindow};
use crate::error::{FitError, InvalidHorizonError, SerializationError};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Hard ceiling on `predict(h)`; simulation memory grows with `h`.
pub const MAX_HORIZON_DAYS: i64 = 36_500;

/// Fits a [`FittedModel`] from a training window.
pub trait Forecaster: Send + Sync {
    fn kind(&self) -> ModelKind;

    fn fit(&self, window: &TrainingWindow) -> Result<Box<dyn FittedModel>, FitError>;
}

/// A trained model.
///
/// `predict(h)` returns exactly `h` rows dated `cutoff + 1 ..= cutoff + h`,
/// ascending. Prediction is deterministic: the same model and horizon always
/// give the same rows, including interval bounds.
pub trait FittedModel: Send + Sync + fmt::Debug {
    fn kind(&self) -> ModelKind;

    /// Last training day.
    fn cutoff(&self) -> NaiveDate;

    fn predict(&self, horizon_days: i64) -> Result<ForecastResult, InvalidHorizonError>;

    /// Envelope JSON. Deserializing it yields a model with identical predictions.
    fn to_json(&self) -> Result<String, SerializationError>;
}

/// Registered model families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Additive,
    Drift,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Additive => "additive",
            ModelKind::Drift => "drift",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = SerializationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "additive" => Ok(ModelKind::Additive),
            "drift" => Ok(ModelKind::Drift),
            other => Err(SerializationError::UnknownKind(other.to_string())),
        }
    }
}

/// Model selection and hyperparameters. Unused fields are ignored by the
/// chosen kind (the drift model only reads `interval_width`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub kind: ModelKind,
    /// Potential trend changepoints placed over the early history.
    pub n_changepoints: usize,
    /// Fraction of the history (from the start) that may hold changepoints.
    pub changepoint_range: f64,
    /// Prior scale of changepoint slope adjustments; smaller is stiffer.
    pub changepoint_prior_scale: f64,
    pub seasonality_prior_scale: f64,
    /// Fourier order of the yearly term (0 disables it).
    pub yearly_order: usize,
    /// Fourier order of the weekly term (0 disables it).
    pub weekly_order: usize,
    /// Coverage of the `[yhat_lower, yhat_upper]` band.
    pub interval_width: f64,
    /// Simulated paths for interval estimation (0 disables bounds).
    pub uncertainty_samples: usize,
    pub seed: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            kind: ModelKind::Additive,
            n_changepoints: 25,
            changepoint_range: 0.8,
            changepoint_prior_scale: 0.05,
            seasonality_prior_scale: 10.0,
            yearly_order: 10,
            weekly_order: 3,
            interval_width: 0.95,
            uncertainty_samples: 200,
            seed: 42,
        }
    }
}

impl ModelConfig {
    pub fn validate(&self) -> Result<(), FitError> {
        if !(0.0..=1.0).contains(&self.changepoint_range) {
            return Err(FitError::InvalidConfig(format!(
                "changepoint_range must be in [0, 1], got {}",
                self.changepoint_range
            )));
        }
        if !(self.changepoint_prior_scale > 0.0 && self.changepoint_prior_scale.is_finite()) {
            return Err(FitError::InvalidConfig(format!(
                "changepoint_prior_scale must be positive, got {}",
                self.changepoint_prior_scale
            )));
        }
        if !(self.seasonality_prior_scale > 0.0 && self.seasonality_prior_scale.is_finite()) {
            return Err(FitError::InvalidConfig(format!(
                "seasonality_prior_scale must be positive, got {}",
                self.seasonality_prior_scale
            )));
        }
        if !(self.interval_width > 0.0 && self.interval_width < 1.0) {
            return Err(FitError::InvalidConfig(format!(
                "interval_width must be in (0, 1), got {}",
                self.interval_width
            )));
        }
        Ok(())
    }
}

/// Build the forecaster selected by `config.kind`.
pub fn build_forecaster(config: &ModelConfig) -> Result<Box<dyn Forecaster>, FitError> {
    config.validate()?;
    Ok(match config.kind {
        ModelKind::Additive => Box::new(AdditiveForecaster::new(config.clone())),
        ModelKind::Drift => Box::new(DriftForecaster::new(config.interval_width)),
    })
}

/// Envelope text of a fitted model.
pub fn serialize_model(model: &dyn FittedModel) -> Result<String, SerializationError> {
    model.to_json()
}

/// Reconstruct a fitted model from envelope text.
pub fn deserialize_model(text: &str) -> Result<Box<dyn FittedModel>, SerializationError> {
    #[derive(Deserialize)]
    struct Header {
        kind: String,
    }

    let header: Header = serde_json::from_str(text)?;
    Ok(match header.kind.parse::<ModelKind>()? {
        ModelKind::Additive => Box::new(serde_json::from_str::<Envelope<AdditiveModel>>(text)?.model),
        ModelKind::Drift => Box::new(serde_json::from_str::<Envelope<DriftModel>>(text)?.model),
    })
}

#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    kind: ModelKind,
    model: T,
}

pub(crate) fn envelope_json<T: Serialize>(
    kind: ModelKind,
    model: &T,
) -> Result<String, SerializationError> {
    #[derive(Serialize)]
    struct EnvelopeRef<'a, T> {
        kind: ModelKind,
        model: &'a T,
    }
    Ok(serde_json::to_string(&EnvelopeRef { kind, model })?)
}

/// The `h` days after `cutoff`. Negative, oversized or unrepresentable
/// horizons are rejected.
pub(crate) fn horizon_dates(
    cutoff: NaiveDate,
    horizon_days: i64,
) -> Result<Vec<NaiveDate>, InvalidHorizonError> {
    let err = InvalidHorizonError { days: horizon_days };
    if !(0..=MAX_HORIZON_DAYS).contains(&horizon_days) {
        return Err(err);
    }
    let h = horizon_days as u64;
    if cutoff.checked_add_days(Days::new(h)).is_none() {
        return Err(err);
    }
    Ok((1..=h)
        .filter_map(|s| cutoff.checked_add_days(Days::new(s)))
        .collect())
}

/// Shared training-window checks.
pub(crate) fn check_window(window: &TrainingWindow, required: usize) -> Result<(), FitError> {
    if window.len() < required {
        return Err(FitError::TooFewRows {
            required,
            actual: window.len(),
        });
    }
    if let Some(bad) = window.points.iter().find(|p| !p.value.is_finite()) {
        return Err(FitError::NonFinite { date: bad.date });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SeriesPoint;

    fn linear_window(days: i64) -> TrainingWindow {
        let start = NaiveDate::from_ymd_opt(2018, 1, 1).unwrap();
        TrainingWindow {
            series_id: "brent".into(),
            start,
            points: (0..days)
                .map(|i| SeriesPoint {
                    date: start + chrono::Duration::days(i),
                    value: 50.0 + 0.1 * i as f64,
                })
                .collect(),
        }
    }

    #[test]
    fn kind_names_round_trip() {
        for kind in [ModelKind::Additive, ModelKind::Drift] {
            assert_eq!(kind.as_str().parse::<ModelKind>().unwrap(), kind);
        }
        assert!(matches!(
            "prophet".parse::<ModelKind>(),
            Err(SerializationError::UnknownKind(_))
        ));
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let err = deserialize_model(r#"{"kind":"arima","model":{}}"#).unwrap_err();
        assert!(matches!(err, SerializationError::UnknownKind(k) if k == "arima"));
    }

    #[test]
    fn malformed_text_is_json_error() {
        assert!(matches!(
            deserialize_model("not json"),
            Err(SerializationError::Json(_))
        ));
        assert!(matches!(
            deserialize_model(r#"{"kind":"drift","model":{"cutoff":"x"}}"#),
            Err(SerializationError::Json(_))
        ));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = ModelConfig {
            interval_width: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            build_forecaster(&config),
            Err(FitError::InvalidConfig(_))
        ));
    }

    #[test]
    fn every_kind_round_trips_through_envelope() {
        let window = linear_window(60);
        for kind in [ModelKind::Additive, ModelKind::Drift] {
            let config = ModelConfig {
                kind,
                ..Default::default()
            };
            let model = build_forecaster(&config).unwrap().fit(&window).unwrap();
            let text = serialize_model(model.as_ref()).unwrap();
            let back = deserialize_model(&text).unwrap();

            assert_eq!(back.kind(), kind);
            assert_eq!(back.cutoff(), model.cutoff());
            assert_eq!(back.predict(14).unwrap(), model.predict(14).unwrap());
            assert_eq!(serialize_model(back.as_ref()).unwrap(), text);
        }
    }

    #[test]
    fn horizon_dates_follow_cutoff() {
        let cutoff = NaiveDate::from_ymd_opt(2024, 2, 28).unwrap();
        let dates = horizon_dates(cutoff, 3).unwrap();
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
                NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
            ]
        );
        assert!(horizon_dates(cutoff, 0).unwrap().is_empty());
        assert_eq!(horizon_dates(cutoff, -1).unwrap_err().days, -1);
        assert!(horizon_dates(cutoff, MAX_HORIZON_DAYS).is_ok());
        assert!(horizon_dates(cutoff, MAX_HORIZON_DAYS + 1).is_err());
    }
}
