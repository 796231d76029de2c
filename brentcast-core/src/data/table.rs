//! HTML table reading: positional table lookup, header promotion, locale numbers.
//!
//! Tables are numbered in document order, nested tables included. Rows belong
//! to the innermost table that contains them.

use crate::error::ExtractionError;
use scraper::{ElementRef, Html, Selector};
use std::borrow::Cow;

/// Cells of one table, row-major, whitespace-normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct HtmlTable {
    pub rows: Vec<Vec<String>>,
}

/// A table whose first row has been promoted to column labels.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderedTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

fn selector(css: &str) -> Result<Selector, ExtractionError> {
    Selector::parse(css).map_err(|e| ExtractionError::Malformed(format!("selector '{css}': {e:?}")))
}

/// Parse every `<table>` in the page, in document order.
pub fn parse_tables(html: &str) -> Result<Vec<HtmlTable>, ExtractionError> {
    let doc = Html::parse_document(html);
    let table_sel = selector("table")?;
    let row_sel = selector("tr")?;

    let tables = doc
        .select(&table_sel)
        .map(|table| {
            let rows = table
                .select(&row_sel)
                .filter(|tr| owning_table(tr).map(|t| t.id()) == Some(table.id()))
                .map(|tr| row_cells(&tr))
                .filter(|cells| !cells.is_empty())
                .collect();
            HtmlTable { rows }
        })
        .collect();
    Ok(tables)
}

/// The table at a structural position (0-based, document order).
pub fn table_at(html: &str, index: usize) -> Result<HtmlTable, ExtractionError> {
    let mut tables = parse_tables(html)?;
    let found = tables.len();
    if index >= found {
        return Err(ExtractionError::TableNotFound { index, found });
    }
    Ok(tables.swap_remove(index))
}

fn owning_table<'a>(tr: &ElementRef<'a>) -> Option<ElementRef<'a>> {
    tr.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "table")
}

fn row_cells(tr: &ElementRef<'_>) -> Vec<String> {
    tr.children()
        .filter_map(ElementRef::wrap)
        .filter(|el| matches!(el.value().name(), "td" | "th"))
        .map(|cell| normalize_whitespace(&cell.text().collect::<Vec<_>>().join(" ")))
        .collect()
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl HtmlTable {
    /// Use the first row as column labels and drop it from the data rows.
    ///
    /// Data rows are padded with empty cells to the header width; rows made
    /// only of empty cells are skipped.
    pub fn promote_header(self, index: usize) -> Result<HeaderedTable, ExtractionError> {
        let mut rows = self.rows.into_iter();
        let header = rows
            .next()
            .ok_or(ExtractionError::MissingHeader { index })?;
        let width = header.len();

        let rows = rows
            .filter(|r| r.iter().any(|c| !c.is_empty()))
            .map(|mut r| {
                if r.len() < width {
                    r.resize(width, String::new());
                }
                r
            })
            .collect();

        Ok(HeaderedTable { header, rows })
    }
}

impl HeaderedTable {
    /// Position of a column, matching labels after mojibake repair.
    pub fn column_index(&self, label: &str) -> Result<usize, ExtractionError> {
        let wanted = repair_mojibake(label.trim());
        self.header
            .iter()
            .position(|h| repair_mojibake(h) == wanted)
            .ok_or_else(|| ExtractionError::ColumnMissing {
                column: label.to_string(),
                header: self.header.clone(),
            })
    }

    /// Replace a column label in place.
    pub fn rename(&mut self, from: &str, to: &str) -> Result<(), ExtractionError> {
        let idx = self.column_index(from)?;
        self.header[idx] = to.to_string();
        Ok(())
    }
}

/// Undo UTF-8 text that was decoded as Latin-1 ("PreÃ§o" → "Preço").
///
/// Text is left untouched unless every char fits in one byte and those bytes
/// form valid UTF-8 that differs from the input.
pub fn repair_mojibake(s: &str) -> Cow<'_, str> {
    if s.is_ascii() || s.chars().any(|c| (c as u32) > 0xFF) {
        return Cow::Borrowed(s);
    }
    let bytes: Vec<u8> = s.chars().map(|c| c as u32 as u8).collect();
    match String::from_utf8(bytes) {
        Ok(fixed) => Cow::Owned(fixed),
        Err(_) => Cow::Borrowed(s),
    }
}

/// Parse a number written with `,` as decimal and `.` as thousands separator.
///
/// Empty cells and `-` placeholders are `Ok(None)`.
pub fn parse_locale_number(cell: &str) -> Result<Option<f64>, std::num::ParseFloatError> {
    let cell = cell.trim();
    if cell.is_empty() || cell == "-" {
        return Ok(None);
    }
    let normalized: String = cell
        .chars()
        .filter(|&c| c != '.')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    normalized.parse::<f64>().map(Some)
}
