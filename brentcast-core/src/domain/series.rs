//! Refined daily series, training window, and watermark.

use super::observation::RawObservation;
use crate::error::SerializationError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One calendar day of the refined series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Continuous daily series for one entity.
///
/// Invariants (upheld by the transformer, checked by `is_continuous`):
/// - ascending, exactly one row per calendar day between first and last date
/// - every value is present (forward-filled)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinedSeries {
    series_id: String,
    points: Vec<SeriesPoint>,
}

impl RefinedSeries {
    /// Wrap already-refined points. Callers outside the transformer should go
    /// through `transform` unless the points come from a refined snapshot.
    pub fn from_points(series_id: impl Into<String>, points: Vec<SeriesPoint>) -> Self {
        Self {
            series_id: series_id.into(),
            points,
        }
    }

    pub fn series_id(&self) -> &str {
        &self.series_id
    }

    pub fn points(&self) -> &[SeriesPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }

    /// Value on a given day, if the day is covered.
    pub fn value_on(&self, date: NaiveDate) -> Option<f64> {
        let first = self.first_date()?;
        let offset = (date - first).num_days();
        if offset < 0 {
            return None;
        }
        self.points.get(offset as usize).map(|p| p.value)
    }

    /// Rows within an inclusive date range; `None` leaves that side open.
    pub fn range(&self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> &[SeriesPoint] {
        let start = match from {
            Some(d) => self.points.partition_point(|p| p.date < d),
            None => 0,
        };
        let end = match to {
            Some(d) => self.points.partition_point(|p| p.date <= d),
            None => self.points.len(),
        };
        if start >= end {
            return &[];
        }
        &self.points[start..end]
    }

    /// True when consecutive dates differ by exactly one day and no value is NaN.
    pub fn is_continuous(&self) -> bool {
        self.points.iter().all(|p| !p.value.is_nan())
            && self
                .points
                .windows(2)
                .all(|w| (w[1].date - w[0].date).num_days() == 1)
    }

    /// View the series as source-shaped rows (feed date format, every price present).
    pub fn to_observations(&self) -> Vec<RawObservation> {
        self.points
            .iter()
            .map(|p| RawObservation::from_date(p.date, Some(p.value)))
            .collect()
    }
}

/// Rows of the refined series on or after the training start date.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingWindow {
    pub series_id: String,
    pub start: NaiveDate,
    pub points: Vec<SeriesPoint>,
}

impl TrainingWindow {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Last training day; `None` only for an empty window.
    pub fn cutoff(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }
}

/// Most recent day of the full refined series at training time.
///
/// Forecast horizons are measured from here, never from the wall clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Watermark(pub NaiveDate);

impl Watermark {
    pub const FORMAT: &'static str = "%Y-%m-%d";

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// Parse the persisted form: first line only, surrounding whitespace ignored.
    pub fn parse(text: &str) -> Result<Self, SerializationError> {
        let first = text.lines().next().unwrap_or("").trim();
        NaiveDate::parse_from_str(first, Self::FORMAT)
            .map(Watermark)
            .map_err(|_| SerializationError::Watermark(first.to_string()))
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(Self::FORMAT))
    }
}

impl FromStr for Watermark {
    type Err = SerializationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Watermark::parse(s)
    }
}
