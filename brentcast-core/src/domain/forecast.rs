//! Forecast output types.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One projected day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub yhat: f64,
    pub yhat_lower: Option<f64>,
    pub yhat_upper: Option<f64>,
}

/// Future-only forecast: `points[0].date == cutoff + 1 day`, ascending, no history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    /// Last training day of the model that produced this forecast.
    pub cutoff: NaiveDate,
    pub points: Vec<ForecastPoint>,
}

impl ForecastResult {
    pub fn empty(cutoff: NaiveDate) -> Self {
        Self {
            cutoff,
            points: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The forecast row for a given day, if it lies inside the horizon.
    pub fn on(&self, date: NaiveDate) -> Option<&ForecastPoint> {
        let offset = (date - self.cutoff).num_days();
        if offset < 1 {
            return None;
        }
        self.points.get((offset - 1) as usize)
    }

    pub fn last(&self) -> Option<&ForecastPoint> {
        self.points.last()
    }
}
