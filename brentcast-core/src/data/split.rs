//! Splitter: training window + watermark.

use crate::domain::{RefinedSeries, TrainingWindow, Watermark};
use crate::error::EmptyWindowError;
use chrono::NaiveDate;
use tracing::info;

/// Slice the training window (`date >= start`) and take the watermark.
///
/// The watermark is the last day of the *full* series. It does not depend on
/// `start`: the window start is a fixed cutoff, the watermark is always the
/// most recent known day.
pub fn split(
    series: &RefinedSeries,
    start: NaiveDate,
) -> Result<(TrainingWindow, Watermark), EmptyWindowError> {
    let last = series.last_date();
    let window = series.range(Some(start), None);

    let watermark = match last {
        Some(last) if !window.is_empty() => Watermark(last),
        _ => return Err(EmptyWindowError { start, last }),
    };

    info!(
        start = %start,
        rows = window.len(),
        watermark = %watermark,
        "split training window"
    );

    Ok((
        TrainingWindow {
            series_id: series.series_id().to_string(),
            start,
            points: window.to_vec(),
        },
        watermark,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::transform;
    use crate::domain::{RawObservation, SeriesPoint};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn series() -> RefinedSeries {
        let first = day(2017, 12, 30);
        let points = (0..10)
            .map(|i| SeriesPoint {
                date: first + chrono::Duration::days(i),
                value: 60.0 + i as f64,
            })
            .collect();
        RefinedSeries::from_points("brent", points)
    }

    #[test]
    fn window_starts_at_cutoff_and_watermark_is_last_day() {
        let (window, watermark) = split(&series(), day(2018, 1, 1)).unwrap();
        assert_eq!(window.points.first().unwrap().date, day(2018, 1, 1));
        assert_eq!(window.len(), 8);
        assert_eq!(watermark, Watermark(day(2018, 1, 8)));
        assert_eq!(window.cutoff(), Some(watermark.date()));
    }

    #[test]
    fn watermark_ignores_start() {
        let (_, early) = split(&series(), day(2000, 1, 1)).unwrap();
        let (_, late) = split(&series(), day(2018, 1, 8)).unwrap();
        assert_eq!(early, late);
    }

    #[test]
    fn start_after_last_day_is_empty_window() {
        let err = split(&series(), day(2018, 1, 9)).unwrap_err();
        assert_eq!(err.start, day(2018, 1, 9));
        assert_eq!(err.last, Some(day(2018, 1, 8)));
    }

    #[test]
    fn blank_newest_row_still_sets_the_watermark() {
        let raw = vec![
            RawObservation::new("01/01/2020", Some(50.0)),
            RawObservation::new("03/01/2020", None),
        ];
        let refined = transform(&raw, "brent").unwrap();
        let (window, watermark) = split(&refined, day(2020, 1, 1)).unwrap();
        assert_eq!(window.len(), 3);
        assert_eq!(watermark, Watermark(day(2020, 1, 3)));
    }

    #[test]
    fn empty_series_is_empty_window() {
        let empty = RefinedSeries::from_points("brent", vec![]);
        let err = split(&empty, day(2018, 1, 1)).unwrap_err();
        assert_eq!(err.last, None);
    }
}
