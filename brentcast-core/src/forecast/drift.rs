//! Random walk with drift.

use super::{check_window, envelope_json, horizon_dates, FittedModel, Forecaster, ModelKind};
use crate::domain::{ForecastPoint, ForecastResult, TrainingWindow};
use crate::error::{FitError, InvalidHorizonError, SerializationError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct DriftForecaster {
    interval_width: f64,
}

impl DriftForecaster {
    pub fn new(interval_width: f64) -> Self {
        Self { interval_width }
    }
}

impl Forecaster for DriftForecaster {
    fn kind(&self) -> ModelKind {
        ModelKind::Drift
    }

    fn fit(&self, window: &TrainingWindow) -> Result<Box<dyn FittedModel>, FitError> {
        check_window(window, 2)?;
        let points = &window.points;
        let (first, last) = (points[0], points[points.len() - 1]);
        let span = (last.date - first.date).num_days();
        if span <= 0 {
            return Err(FitError::TooFewRows {
                required: 2,
                actual: 1,
            });
        }

        let drift = (last.value - first.value) / span as f64;
        let steps: Vec<f64> = points
            .windows(2)
            .map(|w| {
                let days = (w[1].date - w[0].date).num_days().max(1) as f64;
                (w[1].value - w[0].value) / days - drift
            })
            .collect();
        let dof = steps.len().saturating_sub(1).max(1) as f64;
        let sigma = (steps.iter().map(|s| s * s).sum::<f64>() / dof).sqrt();

        debug!(drift, sigma, rows = points.len(), "fitted drift model");
        Ok(Box::new(DriftModel {
            series_id: window.series_id.clone(),
            cutoff: last.date,
            last_value: last.value,
            drift,
            sigma,
            interval_width: self.interval_width,
        }))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftModel {
    series_id: String,
    cutoff: NaiveDate,
    last_value: f64,
    /// Mean change per day.
    drift: f64,
    /// Standard deviation of one-day changes around the drift.
    sigma: f64,
    interval_width: f64,
}

impl DriftModel {
    fn z(&self) -> Option<f64> {
        let p = (1.0 + self.interval_width) / 2.0;
        Normal::new(0.0, 1.0).ok().map(|n| n.inverse_cdf(p))
    }
}

impl FittedModel for DriftModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Drift
    }

    fn cutoff(&self) -> NaiveDate {
        self.cutoff
    }

    fn predict(&self, horizon_days: i64) -> Result<ForecastResult, InvalidHorizonError> {
        let dates = horizon_dates(self.cutoff, horizon_days)?;
        let z = self.z();
        let points = dates
            .into_iter()
            .enumerate()
            .map(|(i, date)| {
                let step = (i + 1) as f64;
                let yhat = self.last_value + self.drift * step;
                let band = z.map(|z| z * self.sigma * step.sqrt());
                ForecastPoint {
                    date,
                    yhat,
                    yhat_lower: band.map(|b| yhat - b),
                    yhat_upper: band.map(|b| yhat + b),
                }
            })
            .collect();
        Ok(ForecastResult {
            cutoff: self.cutoff,
            points,
        })
    }

    fn to_json(&self) -> Result<String, SerializationError> {
        envelope_json(ModelKind::Drift, self)
    }
}
