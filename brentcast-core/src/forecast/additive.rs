//! Additive trend + seasonality model.
//!
//! ```text
//! y(t) = g(t) + s(t) + ε
//! g(t) = m + k·t + Σ_j δ_j·(t - c_j)₊        piecewise-linear trend
//! s(t) = Σ_k a_k·sin(2πk·d/P) + b_k·cos(..)  yearly and weekly Fourier terms
//! ```
//!
//! `t` is time scaled to [0, 1] over the training window; `y` is scaled by its
//! maximum absolute value. Changepoint adjustments `δ` and seasonal
//! coefficients are ridge-penalised: a Gaussian prior with the configured
//! scale against a nominal noise scale. Intercept and base slope are free.
//!
//! Interval bounds come from simulating future trend changes (changepoints
//! at the historical rate, Laplace magnitudes at the historical mean size)
//! plus Gaussian residual noise, then taking empirical quantiles.

use super::features::{changepoints, piecewise_linear, Seasonality};
use super::sampling::{quantile, standard_normal, SampleSeeds};
use super::solve::solve_ridge;
use super::{
    check_window, envelope_json, horizon_dates, FittedModel, Forecaster, ModelConfig, ModelKind,
};
use crate::domain::{ForecastPoint, ForecastResult, TrainingWindow};
use crate::error::{FitError, InvalidHorizonError, SerializationError};
use chrono::NaiveDate;
use nalgebra::{DMatrix, DVector};
use rand::distributions::Distribution;
use rand::Rng;
use serde::{Deserialize, Serialize};
use statrs::distribution::Laplace;
use tracing::debug;

/// Nominal residual scale (in scaled-y units) the priors are weighed against.
const NOISE_SCALE: f64 = 0.1;

#[derive(Debug, Clone)]
pub struct AdditiveForecaster {
    config: ModelConfig,
}

impl AdditiveForecaster {
    pub fn new(config: ModelConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    fn seasonalities(&self) -> Vec<Seasonality> {
        let mut out = Vec::new();
        if self.config.yearly_order > 0 {
            out.push(Seasonality::yearly(self.config.yearly_order));
        }
        if self.config.weekly_order > 0 {
            out.push(Seasonality::weekly(self.config.weekly_order));
        }
        out
    }
}

impl Forecaster for AdditiveForecaster {
    fn kind(&self) -> ModelKind {
        ModelKind::Additive
    }

    fn fit(&self, window: &TrainingWindow) -> Result<Box<dyn FittedModel>, FitError> {
        self.config.validate()?;
        check_window(window, 2)?;
        let points = &window.points;
        let n = points.len();
        let first = points[0].date;
        let cutoff = points[n - 1].date;

        let span = (cutoff - first).num_days();
        if span <= 0 {
            return Err(FitError::TooFewRows {
                required: 2,
                actual: 1,
            });
        }
        let t_scale = span as f64;
        let t: Vec<f64> = points
            .iter()
            .map(|p| (p.date - first).num_days() as f64 / t_scale)
            .collect();

        let y_max = points.iter().map(|p| p.value.abs()).fold(0.0, f64::max);
        let y_scale = if y_max > 0.0 { y_max } else { 1.0 };
        let y = DVector::from_iterator(n, points.iter().map(|p| p.value / y_scale));

        let t_change = changepoints(&t, self.config.n_changepoints, self.config.changepoint_range);
        let seasonalities = self.seasonalities();
        let n_seasonal: usize = seasonalities.iter().map(Seasonality::width).sum();
        let p = 2 + t_change.len() + n_seasonal;

        let mut x = DMatrix::<f64>::zeros(n, p);
        let mut row = Vec::with_capacity(p);
        for (i, point) in points.iter().enumerate() {
            row.clear();
            row.push(1.0);
            row.push(t[i]);
            row.extend(t_change.iter().map(|c| (t[i] - c).max(0.0)));
            for s in &seasonalities {
                s.push_features(point.date, &mut row);
            }
            for (j, v) in row.iter().enumerate() {
                x[(i, j)] = *v;
            }
        }

        let delta_penalty = (NOISE_SCALE / self.config.changepoint_prior_scale).powi(2);
        let seasonal_penalty = (NOISE_SCALE / self.config.seasonality_prior_scale).powi(2);
        let mut penalties = vec![0.0, 0.0];
        penalties.extend(std::iter::repeat(delta_penalty).take(t_change.len()));
        penalties.extend(std::iter::repeat(seasonal_penalty).take(n_seasonal));

        let coef = solve_ridge(&x, &y, &penalties).ok_or(FitError::Singular)?;
        let residuals = &y - &x * &coef;
        let sigma = (residuals.norm_squared() / n as f64).sqrt();

        let ncp = t_change.len();
        let model = AdditiveModel {
            series_id: window.series_id.clone(),
            first_date: first,
            cutoff,
            training_rows: n,
            t_scale,
            y_scale,
            k: coef[1],
            m: coef[0],
            t_change,
            delta: coef.rows(2, ncp).iter().copied().collect(),
            seasonalities,
            beta: coef.rows(2 + ncp, n_seasonal).iter().copied().collect(),
            sigma,
            interval_width: self.config.interval_width,
            uncertainty_samples: self.config.uncertainty_samples,
            seed: self.config.seed,
        };
        if !model.is_finite() {
            return Err(FitError::Singular);
        }

        debug!(
            rows = n,
            changepoints = ncp,
            seasonal_terms = n_seasonal,
            sigma = sigma * y_scale,
            "fitted additive model"
        );
        Ok(Box::new(model))
    }
}

/// A fitted additive model. All fields round-trip through JSON exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdditiveModel {
    series_id: String,
    first_date: NaiveDate,
    cutoff: NaiveDate,
    training_rows: usize,
    t_scale: f64,
    y_scale: f64,
    k: f64,
    m: f64,
    t_change: Vec<f64>,
    delta: Vec<f64>,
    seasonalities: Vec<Seasonality>,
    beta: Vec<f64>,
    sigma: f64,
    interval_width: f64,
    uncertainty_samples: usize,
    seed: u64,
}

impl AdditiveModel {
    pub fn series_id(&self) -> &str {
        &self.series_id
    }

    /// Residual standard deviation in price units.
    pub fn sigma(&self) -> f64 {
        self.sigma * self.y_scale
    }

    fn is_finite(&self) -> bool {
        [self.k, self.m, self.sigma, self.y_scale, self.t_scale]
            .iter()
            .chain(&self.delta)
            .chain(&self.beta)
            .all(|v| v.is_finite())
    }

    fn scaled_time(&self, date: NaiveDate) -> f64 {
        (date - self.first_date).num_days() as f64 / self.t_scale
    }

    fn seasonal(&self, date: NaiveDate) -> f64 {
        let mut features = Vec::with_capacity(self.beta.len());
        for s in &self.seasonalities {
            s.push_features(date, &mut features);
        }
        features.iter().zip(&self.beta).map(|(f, b)| f * b).sum()
    }

    /// Per-step `(lower, upper)` in scaled units, or `None` when sampling is off.
    fn simulate_bounds(&self, mean: &[f64]) -> Option<Vec<(f64, f64)>> {
        if self.uncertainty_samples == 0 || mean.is_empty() {
            return None;
        }
        let dt = 1.0 / self.t_scale;
        let rate = (self.t_change.len() as f64 / self.training_rows.max(1) as f64).min(1.0);
        let jump_scale = self.delta.iter().map(|d| d.abs()).sum::<f64>()
            / self.delta.len().max(1) as f64
            + 1e-8;
        let jumps = Laplace::new(0.0, jump_scale).ok()?;
        let seeds = SampleSeeds::new(self.seed);

        let mut paths: Vec<Vec<f64>> = vec![Vec::with_capacity(self.uncertainty_samples); mean.len()];
        for sample in 0..self.uncertainty_samples {
            let mut rng = seeds.rng_for(sample as u64);
            let mut slope = 0.0;
            let mut drift = 0.0;
            for (step, mu) in mean.iter().enumerate() {
                drift += slope * dt;
                let hit: f64 = rng.gen();
                let jump = jumps.sample(&mut rng);
                if hit < rate && jump.is_finite() {
                    slope += jump;
                }
                let noise = self.sigma * standard_normal(&mut rng);
                paths[step].push(mu + drift + noise);
            }
        }

        let lo_q = (1.0 - self.interval_width) / 2.0;
        let hi_q = (1.0 + self.interval_width) / 2.0;
        paths
            .into_iter()
            .map(|mut samples| {
                samples.sort_by(f64::total_cmp);
                Some((quantile(&samples, lo_q)?, quantile(&samples, hi_q)?))
            })
            .collect()
    }
}

impl FittedModel for AdditiveModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Additive
    }

    fn cutoff(&self) -> NaiveDate {
        self.cutoff
    }

    fn predict(&self, horizon_days: i64) -> Result<ForecastResult, InvalidHorizonError> {
        let dates = horizon_dates(self.cutoff, horizon_days)?;
        if dates.is_empty() {
            return Ok(ForecastResult::empty(self.cutoff));
        }

        let mean: Vec<f64> = dates
            .iter()
            .map(|&d| {
                let t = self.scaled_time(d);
                piecewise_linear(t, self.k, self.m, &self.t_change, &self.delta) + self.seasonal(d)
            })
            .collect();
        let bounds = self.simulate_bounds(&mean);

        let points = dates
            .iter()
            .zip(&mean)
            .enumerate()
            .map(|(i, (&date, mu))| {
                let band = bounds.as_ref().map(|b| b[i]);
                ForecastPoint {
                    date,
                    yhat: mu * self.y_scale,
                    yhat_lower: band.map(|(lo, _)| lo * self.y_scale),
                    yhat_upper: band.map(|(_, hi)| hi * self.y_scale),
                }
            })
            .collect();

        Ok(ForecastResult {
            cutoff: self.cutoff,
            points,
        })
    }

    fn to_json(&self) -> Result<String, SerializationError> {
        envelope_json(ModelKind::Additive, self)
    }
}
