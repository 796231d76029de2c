//! Domain types for the Brent forecast pipeline.

pub mod forecast;
pub mod observation;
pub mod series;

pub use forecast::{ForecastPoint, ForecastResult};
pub use observation::{RawObservation, RAW_DATE_FORMAT};
pub use series::{RefinedSeries, SeriesPoint, TrainingWindow, Watermark};
