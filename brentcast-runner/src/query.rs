//! Read-only queries over the refined snapshot.

use chrono::NaiveDate;

use brentcast_core::data::ArtifactStore;
use brentcast_core::domain::SeriesPoint;
use brentcast_core::error::SinkError;

/// Refined rows with `from <= date <= to`; either bound may be open.
pub fn series_range(
    store: &ArtifactStore,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<Vec<SeriesPoint>, SinkError> {
    if let (Some(a), Some(b)) = (from, to) {
        if a > b {
            return Err(SinkError::Validation(format!(
                "range start {a} is after range end {b}"
            )));
        }
    }
    let series = store.load_refined()?;
    Ok(series.range(from, to).to_vec())
}
