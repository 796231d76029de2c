//! Property tests for series and model invariants.
//!
//! Uses proptest to verify:
//! 1. Continuity: refined dates advance by exactly one day, values never missing
//! 2. Idempotence: refining a refined series changes nothing
//! 3. Round trip: a deserialized model predicts identically for any horizon
//! 4. Shape: `predict(h)` has `h` ascending rows strictly after the cutoff

use brentcast_core::data::{split, transform};
use brentcast_core::domain::{RawObservation, SeriesPoint, TrainingWindow, RAW_DATE_FORMAT};
use brentcast_core::forecast::{build_forecaster, deserialize_model, ModelConfig, ModelKind};
use chrono::{Duration, NaiveDate};
use proptest::prelude::*;

// ── Strategies (proptest) ────────────────────────────────────────────

fn base() -> NaiveDate {
    NaiveDate::from_ymd_opt(2017, 6, 1).unwrap()
}

fn arb_price() -> impl Strategy<Value = Option<f64>> {
    prop_oneof![
        1 => Just(None),
        6 => (10.0..150.0_f64).prop_map(|p| Some((p * 100.0).round() / 100.0)),
    ]
}

/// Sparse, unordered observations with occasional duplicates and blanks.
fn arb_observations() -> impl Strategy<Value = Vec<RawObservation>> {
    prop::collection::vec((0..400i64, arb_price()), 1..60).prop_map(|rows| {
        rows.into_iter()
            .map(|(offset, price)| {
                let date = base() + Duration::days(offset);
                RawObservation::new(date.format(RAW_DATE_FORMAT).to_string(), price)
            })
            .collect()
    })
}

fn arb_window() -> impl Strategy<Value = TrainingWindow> {
    prop::collection::vec(-2.0..2.0_f64, 30..120).prop_map(|steps| {
        let start = NaiveDate::from_ymd_opt(2018, 1, 1).unwrap();
        let mut value = 60.0;
        let points = steps
            .into_iter()
            .enumerate()
            .map(|(i, step)| {
                value += step;
                SeriesPoint {
                    date: start + Duration::days(i as i64),
                    value,
                }
            })
            .collect();
        TrainingWindow {
            series_id: "brent".into(),
            start,
            points,
        }
    })
}

fn arb_kind() -> impl Strategy<Value = ModelKind> {
    prop_oneof![Just(ModelKind::Additive), Just(ModelKind::Drift)]
}

// ── 1. Continuity ────────────────────────────────────────────────────

proptest! {
    #[test]
    fn refined_dates_are_consecutive(obs in arb_observations()) {
        let priced = obs.iter().any(|o| o.price.is_some());
        match transform(&obs, "brent") {
            Ok(series) => {
                prop_assert!(priced);
                for w in series.points().windows(2) {
                    prop_assert_eq!(w[1].date - w[0].date, Duration::days(1));
                }
                prop_assert!(series.points().iter().all(|p| p.value.is_finite()));
            }
            Err(_) => prop_assert!(!priced),
        }
    }

    /// Every observed price survives on its own date unless a later duplicate replaced it.
    #[test]
    fn observed_prices_survive(obs in arb_observations()) {
        if let Ok(series) = transform(&obs, "brent") {
            for o in &obs {
                if let Some(price) = o.price {
                    let date = NaiveDate::parse_from_str(&o.date, RAW_DATE_FORMAT).unwrap();
                    let last_for_date = obs
                        .iter()
                        .rev()
                        .find(|x| x.date == o.date && x.price.is_some())
                        .and_then(|x| x.price);
                    if last_for_date == Some(price) {
                        prop_assert_eq!(series.value_on(date), Some(price));
                    }
                }
            }
        }
    }
}

// ── 2. Idempotence ───────────────────────────────────────────────────

proptest! {
    #[test]
    fn transform_is_idempotent(obs in arb_observations()) {
        if let Ok(once) = transform(&obs, "brent") {
            let twice = transform(&once.to_observations(), "brent").unwrap();
            prop_assert_eq!(once, twice);
        }
    }

    #[test]
    fn watermark_is_last_refined_day(obs in arb_observations()) {
        if let Ok(series) = transform(&obs, "brent") {
            let first = series.first_date().unwrap();
            let (window, watermark) = split(&series, first).unwrap();
            prop_assert_eq!(Some(watermark.date()), series.last_date());
            prop_assert_eq!(window.len(), series.len());
        }
    }
}

// ── 3 & 4. Model round trip and forecast shape ───────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn round_trip_predicts_identically(
        window in arb_window(),
        kind in arb_kind(),
        h in 0..45i64,
    ) {
        let config = ModelConfig { kind, uncertainty_samples: 50, ..Default::default() };
        let model = build_forecaster(&config).unwrap().fit(&window).unwrap();
        let back = deserialize_model(&model.to_json().unwrap()).unwrap();
        prop_assert_eq!(back.predict(h).unwrap(), model.predict(h).unwrap());
    }

    #[test]
    fn forecast_rows_follow_cutoff(
        window in arb_window(),
        kind in arb_kind(),
        h in 0..45i64,
    ) {
        let config = ModelConfig { kind, uncertainty_samples: 50, ..Default::default() };
        let model = build_forecaster(&config).unwrap().fit(&window).unwrap();
        let forecast = model.predict(h).unwrap();
        let cutoff = window.cutoff().unwrap();

        prop_assert_eq!(forecast.len() as i64, h);
        for (i, p) in forecast.points.iter().enumerate() {
            prop_assert_eq!(p.date, cutoff + Duration::days(i as i64 + 1));
            prop_assert!(p.yhat.is_finite());
        }
    }
}
