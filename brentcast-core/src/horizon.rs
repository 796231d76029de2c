//! Horizon calculator: days between the watermark and a requested target.

use crate::domain::Watermark;
use crate::error::{InvalidHorizonError, SerializationError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Horizon used when the watermark cannot be read.
pub const DEFAULT_FALLBACK_HORIZON: i64 = 1;

/// Default ceiling on a requested horizon (about ten years of daily rows).
pub const DEFAULT_MAX_HORIZON: i64 = 3650;

/// Bounds applied when resolving a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HorizonPolicy {
    /// Used when the watermark is unreadable.
    pub fallback: i64,
    /// Longest horizon a request may resolve to.
    pub max_days: i64,
}

impl Default for HorizonPolicy {
    fn default() -> Self {
        Self {
            fallback: DEFAULT_FALLBACK_HORIZON,
            max_days: DEFAULT_MAX_HORIZON,
        }
    }
}

/// `target - watermark` in whole days. Targets before the watermark are rejected.
pub fn horizon(target: NaiveDate, watermark: Watermark) -> Result<i64, InvalidHorizonError> {
    let days = (target - watermark.date()).num_days();
    if days < 0 {
        return Err(InvalidHorizonError { days });
    }
    Ok(days)
}

/// Where a resolved horizon came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum HorizonSource {
    Watermark { date: NaiveDate },
    Fallback { reason: String },
}

impl HorizonSource {
    pub fn is_fallback(&self) -> bool {
        matches!(self, HorizonSource::Fallback { .. })
    }
}

impl fmt::Display for HorizonSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HorizonSource::Watermark { date } => write!(f, "watermark {date}"),
            HorizonSource::Fallback { reason } => write!(f, "fallback ({reason})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedHorizon {
    pub days: i64,
    #[serde(flatten)]
    pub source: HorizonSource,
}

/// Resolve the horizon for `target` given the outcome of reading the watermark.
///
/// An unreadable watermark is not an error: the policy's fallback horizon is
/// used and the result is tagged [`HorizonSource::Fallback`]. A readable
/// watermark later than `target` still fails, as does any horizon beyond
/// `policy.max_days`.
pub fn resolve_horizon(
    target: NaiveDate,
    watermark: Result<Watermark, SerializationError>,
    policy: HorizonPolicy,
) -> Result<ResolvedHorizon, InvalidHorizonError> {
    let resolved = match watermark {
        Ok(wm) => ResolvedHorizon {
            days: horizon(target, wm)?,
            source: HorizonSource::Watermark { date: wm.date() },
        },
        Err(err) => {
            let fallback = policy.fallback;
            if fallback < 0 {
                return Err(InvalidHorizonError { days: fallback });
            }
            warn!(%target, error = %err, fallback, "watermark unreadable; using fallback horizon");
            ResolvedHorizon {
                days: fallback,
                source: HorizonSource::Fallback {
                    reason: err.to_string(),
                },
            }
        }
    };
    if resolved.days > policy.max_days {
        return Err(InvalidHorizonError {
            days: resolved.days,
        });
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn nine_days_after_watermark() {
        let h = horizon(day(2024, 1, 25), Watermark(day(2024, 1, 16))).unwrap();
        assert_eq!(h, 9);
    }

    #[test]
    fn same_day_is_zero() {
        assert_eq!(horizon(day(2024, 1, 16), Watermark(day(2024, 1, 16))).unwrap(), 0);
    }

    #[test]
    fn target_before_watermark_is_rejected() {
        let err = horizon(day(2024, 1, 10), Watermark(day(2024, 1, 16))).unwrap_err();
        assert_eq!(err.days, -6);
    }

    #[test]
    fn unreadable_watermark_falls_back() {
        let unreadable = Watermark::parse("not a date");
        assert!(unreadable.is_err());

        let resolved =
            resolve_horizon(day(2024, 1, 25), unreadable, HorizonPolicy::default()).unwrap();
        assert_eq!(resolved.days, 1);
        assert!(resolved.source.is_fallback());
    }

    #[test]
    fn readable_watermark_is_recorded() {
        let resolved = resolve_horizon(
            day(2024, 1, 25),
            Ok(Watermark(day(2024, 1, 16))),
            HorizonPolicy::default(),
        )
        .unwrap();
        assert_eq!(resolved.days, 9);
        assert_eq!(
            resolved.source,
            HorizonSource::Watermark {
                date: day(2024, 1, 16)
            }
        );
    }

    #[test]
    fn far_target_exceeds_max_horizon() {
        let wm = Watermark(day(2024, 1, 16));
        let err = resolve_horizon(day(9999, 12, 31), Ok(wm), HorizonPolicy::default()).unwrap_err();
        assert!(err.days > DEFAULT_MAX_HORIZON);

        let tight = HorizonPolicy {
            fallback: 1,
            max_days: 9,
        };
        assert_eq!(resolve_horizon(day(2024, 1, 25), Ok(wm), tight).unwrap().days, 9);
        assert_eq!(
            resolve_horizon(day(2024, 1, 26), Ok(wm), tight).unwrap_err().days,
            10
        );
    }

    #[test]
    fn fallback_is_also_capped() {
        let policy = HorizonPolicy {
            fallback: 30,
            max_days: 7,
        };
        let err = resolve_horizon(day(2024, 1, 25), Watermark::parse("bad"), policy).unwrap_err();
        assert_eq!(err.days, 30);
    }

    #[test]
    fn resolved_horizon_serializes_flat() {
        let resolved = ResolvedHorizon {
            days: 1,
            source: HorizonSource::Fallback {
                reason: "missing".into(),
            },
        };
        let json = serde_json::to_value(&resolved).unwrap();
        assert_eq!(json["days"], 1);
        assert_eq!(json["source"], "fallback");
        assert_eq!(json["reason"], "missing");
    }
}
