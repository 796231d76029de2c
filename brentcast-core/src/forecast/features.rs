//! Regressors for the additive model: trend changepoints and Fourier terms.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// A Fourier seasonality block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Seasonality {
    pub name: String,
    pub period_days: f64,
    pub order: usize,
}

impl Seasonality {
    pub fn yearly(order: usize) -> Self {
        Self {
            name: "yearly".into(),
            period_days: 365.25,
            order,
        }
    }

    pub fn weekly(order: usize) -> Self {
        Self {
            name: "weekly".into(),
            period_days: 7.0,
            order,
        }
    }

    /// Number of design columns (a sin/cos pair per order).
    pub fn width(&self) -> usize {
        2 * self.order
    }

    /// Append `[sin(2πk·d/P), cos(2πk·d/P)]` for k = 1..=order.
    ///
    /// `d` is days since 1970-01-01 so the phase is tied to the calendar,
    /// not to the start of the training data.
    pub fn push_features(&self, date: NaiveDate, out: &mut Vec<f64>) {
        let d = epoch_days(date);
        for k in 1..=self.order {
            let x = 2.0 * PI * k as f64 * d / self.period_days;
            out.push(x.sin());
            out.push(x.cos());
        }
    }
}

pub fn epoch_days(date: NaiveDate) -> f64 {
    (date - NaiveDate::default()).num_days() as f64
}

/// Evenly spaced changepoint positions (in scaled time) over the first
/// `range` fraction of the history.
///
/// `t` must be ascending. The first point is never a changepoint.
pub fn changepoints(t: &[f64], n_changepoints: usize, range: f64) -> Vec<f64> {
    let hist = ((t.len() as f64) * range.clamp(0.0, 1.0)).floor() as usize;
    if hist < 2 {
        return Vec::new();
    }
    let n = n_changepoints.min(hist - 1);
    if n == 0 {
        return Vec::new();
    }
    let step = (hist - 1) as f64 / n as f64;
    (1..=n)
        .map(|i| t[((i as f64) * step).round() as usize])
        .collect()
}

/// Piecewise-linear trend: `m + k·t + Σ δ_j·(t - c_j)₊`.
pub fn piecewise_linear(t: f64, k: f64, m: f64, t_change: &[f64], delta: &[f64]) -> f64 {
    let bends: f64 = t_change
        .iter()
        .zip(delta)
        .filter(|(c, _)| t > **c)
        .map(|(c, d)| d * (t - c))
        .sum();
    m + k * t + bends
}
