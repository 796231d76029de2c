//! Extractor: page → price table → raw observations.

use super::provider::SeriesSource;
use super::table::{parse_locale_number, table_at};
use crate::domain::RawObservation;
use crate::error::ExtractionError;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Where the price table sits on the page and what its columns are called.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableLayout {
    /// 0-based position among all tables in document order.
    pub table_index: usize,
    /// Header label of the date column.
    pub date_column: String,
    /// Header label of the price column as published.
    pub price_label: String,
    /// Name the price column is renamed to.
    pub canonical_price_column: String,
}

impl Default for TableLayout {
    fn default() -> Self {
        Self {
            table_index: 2,
            date_column: "Data".into(),
            price_label: "Preço - petróleo bruto - Brent (FOB)".into(),
            canonical_price_column: "preco_petroleo_bruto".into(),
        }
    }
}

/// Fetch the page from `source` and extract raw observations.
pub fn extract(
    source: &dyn SeriesSource,
    layout: &TableLayout,
) -> Result<Vec<RawObservation>, ExtractionError> {
    info!(source = source.name(), location = %source.location(), "fetching source page");
    let page = source.fetch_page()?;
    debug!(bytes = page.len(), "source page fetched");
    extract_from_html(&page, layout)
}

/// Extract raw observations from page text.
///
/// Takes the table at `layout.table_index`, promotes its first row to headers,
/// renames the price column to its canonical name and coerces prices with
/// Brazilian locale rules.
pub fn extract_from_html(
    html: &str,
    layout: &TableLayout,
) -> Result<Vec<RawObservation>, ExtractionError> {
    let mut table = table_at(html, layout.table_index)?.promote_header(layout.table_index)?;
    table.rename(&layout.price_label, &layout.canonical_price_column)?;

    let date_idx = table.column_index(&layout.date_column)?;
    let price_idx = table.column_index(&layout.canonical_price_column)?;

    let observations = table
        .rows
        .into_iter()
        .enumerate()
        .map(|(row, cells)| {
            let price = parse_locale_number(&cells[price_idx]).map_err(|_| {
                ExtractionError::InvalidNumber {
                    row,
                    value: cells[price_idx].clone(),
                }
            })?;
            Ok(RawObservation::new(cells[date_idx].clone(), price))
        })
        .collect::<Result<Vec<_>, ExtractionError>>()?;

    info!(rows = observations.len(), "extracted raw observations");
    Ok(observations)
}
