//! Wide-to-tidy reshaping of adjusted-close tables.

use crate::table::{PriceRow, PriceTable};

/// Keep only the dates on which every ticker has a value.
pub fn drop_missing(table: &PriceTable) -> PriceTable {
    let mut dates = Vec::new();
    let mut values = Vec::new();
    for (date, row) in table.rows() {
        if row.iter().all(Option::is_some) {
            dates.push(date);
            values.push(row.to_vec());
        }
    }
    PriceTable::from_parts(dates, table.tickers().to_vec(), values)
}

/// Melt a wide table into (date, ticker, value) rows, ticker-major.
///
/// Missing cells are skipped, so the output never carries a gap even when
/// called on an unfiltered table.
pub fn melt(table: &PriceTable) -> Vec<PriceRow> {
    let mut rows = Vec::with_capacity(table.row_count() * table.column_count());
    for (column, ticker) in table.tickers().iter().enumerate() {
        for (date, row) in table.rows() {
            if let Some(value) = row[column] {
                rows.push(PriceRow {
                    date,
                    ticker: ticker.clone(),
                    value,
                });
            }
        }
    }
    rows
}

pub fn tidy(table: &PriceTable) -> Vec<PriceRow> {
    melt(&drop_missing(table))
}
