//! Transformer: raw observations → continuous, forward-filled daily series.
//!
//! Each step is a pure function over typed rows so it can be tested alone:
//!
//! 1. `parse_dates`: dd/mm/yyyy → `NaiveDate`, blank prices kept as holes
//! 2. `sort_chronologically`: ascending, later duplicate wins
//! 3. `reindex_daily`: one slot per calendar day from first to last observed date
//! 4. `forward_fill`: empty slots take the most recent prior value
//!
//! The dense index and the `(date, value, series_id)` projection fall out of
//! the types (`Vec<SeriesPoint>` wrapped in `RefinedSeries`).

use crate::domain::{RawObservation, RefinedSeries, SeriesPoint, RAW_DATE_FORMAT};
use crate::error::TransformError;
use chrono::{Duration, NaiveDate};
use tracing::debug;

/// A dated row whose price may be missing.
pub type DatedValue = (NaiveDate, Option<f64>);

/// Run the full refinement.
pub fn transform(
    observations: &[RawObservation],
    series_id: &str,
) -> Result<RefinedSeries, TransformError> {
    let parsed = parse_dates(observations)?;
    let sorted = sort_chronologically(parsed);
    let observed = sorted.iter().filter(|(_, v)| v.is_some()).count();
    if observed == 0 {
        return Err(TransformError::Empty);
    }
    let slots = reindex_daily(&sorted);
    let points = forward_fill(&slots);

    debug!(
        observed,
        filled = points.len() - observed,
        series_id,
        "refined daily series"
    );
    Ok(RefinedSeries::from_points(series_id, points))
}

/// Parse feed dates. A blank or NaN price becomes `None`; a bad date is an error.
pub fn parse_dates(observations: &[RawObservation]) -> Result<Vec<DatedValue>, TransformError> {
    observations
        .iter()
        .enumerate()
        .map(|(row, obs)| {
            let date = NaiveDate::parse_from_str(obs.date.trim(), RAW_DATE_FORMAT).map_err(|_| {
                TransformError::InvalidDate {
                    row,
                    value: obs.date.clone(),
                }
            })?;
            Ok((date, obs.price.filter(|v| !v.is_nan())))
        })
        .collect()
}

/// Sort ascending by date. When a date repeats, the priced row appearing later
/// in the input wins; a blank duplicate never erases a price.
pub fn sort_chronologically(mut rows: Vec<DatedValue>) -> Vec<DatedValue> {
    rows.sort_by_key(|&(date, _)| date);
    let mut out: Vec<DatedValue> = Vec::with_capacity(rows.len());
    for row in rows {
        match out.last_mut() {
            Some(last) if last.0 == row.0 => {
                if row.1.is_some() {
                    last.1 = row.1;
                }
            }
            _ => out.push(row),
        }
    }
    out
}

/// Lay sorted rows onto a daily calendar spanning their min and max date.
pub fn reindex_daily(sorted: &[DatedValue]) -> Vec<DatedValue> {
    let (first, last) = match (sorted.first(), sorted.last()) {
        (Some(f), Some(l)) => (f.0, l.0),
        _ => return Vec::new(),
    };
    let days = (last - first).num_days() as usize + 1;
    let mut slots: Vec<DatedValue> = (0..days)
        .map(|i| (first + Duration::days(i as i64), None))
        .collect();
    for &(date, value) in sorted {
        let idx = (date - first).num_days() as usize;
        slots[idx].1 = value;
    }
    slots
}

/// Carry the last known value into empty slots.
///
/// Leading empty slots (no prior value) are dropped rather than back-filled.
pub fn forward_fill(slots: &[DatedValue]) -> Vec<SeriesPoint> {
    let mut last = None;
    slots
        .iter()
        .filter_map(|&(date, value)| {
            if value.is_some() {
                last = value;
            }
            last.map(|value| SeriesPoint { date, value })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn gap_is_forward_filled() {
        let raw = vec![
            RawObservation::new("01/01/2020", Some(50.0)),
            RawObservation::new("03/01/2020", Some(52.0)),
        ];
        let series = transform(&raw, "brent").unwrap();

        assert_eq!(series.len(), 3);
        assert_eq!(series.points()[1].date, day(2020, 1, 2));
        assert_eq!(series.points()[1].value, 50.0);
        assert_eq!(series.points()[2].value, 52.0);
        assert_eq!(series.series_id(), "brent");
        assert!(series.is_continuous());
    }

    #[test]
    fn unsorted_input_comes_out_ascending() {
        let raw = vec![
            RawObservation::new("05/01/2020", Some(5.0)),
            RawObservation::new("01/01/2020", Some(1.0)),
            RawObservation::new("03/01/2020", Some(3.0)),
        ];
        let series = transform(&raw, "brent").unwrap();
        let values: Vec<f64> = series.points().iter().map(|p| p.value).collect();
        assert_eq!(values, vec![1.0, 1.0, 3.0, 3.0, 5.0]);
    }

    #[test]
    fn later_duplicate_wins() {
        let raw = vec![
            RawObservation::new("01/01/2020", Some(1.0)),
            RawObservation::new("01/01/2020", Some(9.0)),
        ];
        let series = transform(&raw, "brent").unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series.points()[0].value, 9.0);
    }

    #[test]
    fn blank_duplicate_keeps_the_price() {
        let raw = vec![
            RawObservation::new("01/01/2020", Some(4.0)),
            RawObservation::new("01/01/2020", None),
        ];
        let series = transform(&raw, "brent").unwrap();
        assert_eq!(series.value_on(day(2020, 1, 1)), Some(4.0));
    }

    #[test]
    fn unpriced_rows_do_not_start_the_calendar() {
        let raw = vec![
            RawObservation::new("30/12/2019", None),
            RawObservation::new("01/01/2020", Some(50.0)),
            RawObservation::new("02/01/2020", None),
            RawObservation::new("03/01/2020", Some(52.0)),
        ];
        let series = transform(&raw, "brent").unwrap();
        assert_eq!(series.first_date(), Some(day(2020, 1, 1)));
        assert_eq!(series.value_on(day(2020, 1, 2)), Some(50.0));
    }

    #[test]
    fn trailing_blank_rows_extend_the_calendar() {
        let raw = vec![
            RawObservation::new("01/01/2020", Some(50.0)),
            RawObservation::new("03/01/2020", None),
        ];
        let series = transform(&raw, "brent").unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.last_date(), Some(day(2020, 1, 3)));
        assert_eq!(series.value_on(day(2020, 1, 3)), Some(50.0));
        assert!(series.is_continuous());
    }

    #[test]
    fn bad_date_is_transform_error() {
        let raw = vec![
            RawObservation::new("01/01/2020", Some(1.0)),
            RawObservation::new("2020-01-02", Some(2.0)),
        ];
        let err = transform(&raw, "brent").unwrap_err();
        assert!(matches!(err, TransformError::InvalidDate { row: 1, .. }));
    }

    #[test]
    fn empty_input_is_error() {
        assert!(matches!(transform(&[], "brent"), Err(TransformError::Empty)));
        let unpriced = vec![RawObservation::new("01/01/2020", None)];
        assert!(matches!(transform(&unpriced, "brent"), Err(TransformError::Empty)));
    }

    #[test]
    fn transform_is_idempotent() {
        let raw = vec![
            RawObservation::new("01/01/2020", Some(50.0)),
            RawObservation::new("04/01/2020", Some(53.5)),
            RawObservation::new("10/01/2020", Some(49.0)),
        ];
        let once = transform(&raw, "brent").unwrap();
        let twice = transform(&once.to_observations(), "brent").unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn forward_fill_drops_leading_holes() {
        let slots = vec![
            (day(2020, 1, 1), None),
            (day(2020, 1, 2), Some(2.0)),
            (day(2020, 1, 3), None),
        ];
        let filled = forward_fill(&slots);
        assert_eq!(filled.len(), 2);
        assert_eq!(filled[0].date, day(2020, 1, 2));
        assert_eq!(filled[1].value, 2.0);
    }
}
