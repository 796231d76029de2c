//! Raw observations: one row of the source table as published.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Date format used by the source feed (day/month/year).
pub const RAW_DATE_FORMAT: &str = "%d/%m/%Y";

/// A single row extracted from the source table.
///
/// The date stays textual until the transformer parses it, so a malformed
/// date surfaces as a `TransformError` rather than being lost at extraction.
/// `price` is `None` for empty cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawObservation {
    pub date: String,
    pub price: Option<f64>,
}

impl RawObservation {
    pub fn new(date: impl Into<String>, price: Option<f64>) -> Self {
        Self {
            date: date.into(),
            price,
        }
    }

    /// Build an observation from a calendar date, formatted the way the feed publishes it.
    pub fn from_date(date: NaiveDate, price: Option<f64>) -> Self {
        Self {
            date: date.format(RAW_DATE_FORMAT).to_string(),
            price,
        }
    }
}
