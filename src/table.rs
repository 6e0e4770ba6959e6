use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One ticker's adjusted-close history as returned by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub symbol: String,
    pub points: Vec<(NaiveDate, Option<f64>)>,
}

impl PriceSeries {
    pub fn new(symbol: impl Into<String>, points: Vec<(NaiveDate, Option<f64>)>) -> Self {
        Self {
            symbol: symbol.into(),
            points,
        }
    }

    pub fn empty(symbol: impl Into<String>) -> Self {
        Self::new(symbol, Vec::new())
    }
}

/// Tidy observation: one ticker's value on one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRow {
    pub date: NaiveDate,
    pub ticker: String,
    pub value: f64,
}

/// Wide adjusted-close table: dates down, tickers across.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PriceTable {
    dates: Vec<NaiveDate>,
    tickers: Vec<String>,
    // row-major, `values[row][column]`
    values: Vec<Vec<Option<f64>>>,
}

impl PriceTable {
    /// Outer-join the series on date. Columns follow `tickers`; a ticker
    /// without a series becomes an all-missing column.
    pub fn from_series(tickers: &[String], series: &[PriceSeries]) -> Self {
        let mut by_symbol: BTreeMap<&str, BTreeMap<NaiveDate, Option<f64>>> = BTreeMap::new();
        let mut all_dates = BTreeSet::new();

        for s in series {
            let column = by_symbol.entry(s.symbol.as_str()).or_default();
            for (date, value) in &s.points {
                all_dates.insert(*date);
                // a later point for the same date wins, but never with a gap
                let slot = column.entry(*date).or_insert(None);
                if value.is_some() {
                    *slot = *value;
                }
            }
        }

        let dates: Vec<NaiveDate> = all_dates.into_iter().collect();
        let values = dates
            .iter()
            .map(|date| {
                tickers
                    .iter()
                    .map(|ticker| {
                        by_symbol
                            .get(ticker.as_str())
                            .and_then(|column| column.get(date).copied().flatten())
                    })
                    .collect()
            })
            .collect();

        Self {
            dates,
            tickers: tickers.to_vec(),
            values,
        }
    }

    /// Pivot tidy rows back into a wide table. Column order is the order in
    /// which tickers first appear.
    pub fn from_rows(rows: &[PriceRow]) -> Self {
        let mut tickers: Vec<String> = Vec::new();
        let mut series: Vec<PriceSeries> = Vec::new();
        for row in rows {
            let idx = match tickers.iter().position(|t| t == &row.ticker) {
                Some(idx) => idx,
                None => {
                    tickers.push(row.ticker.clone());
                    series.push(PriceSeries::empty(row.ticker.clone()));
                    tickers.len() - 1
                }
            };
            series[idx].points.push((row.date, Some(row.value)));
        }
        Self::from_series(&tickers, &series)
    }

    pub(crate) fn from_parts(
        dates: Vec<NaiveDate>,
        tickers: Vec<String>,
        values: Vec<Vec<Option<f64>>>,
    ) -> Self {
        Self {
            dates,
            tickers,
            values,
        }
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn column_count(&self) -> usize {
        self.tickers.len()
    }

    pub fn row_count(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<&[Option<f64>]> {
        self.values.get(index).map(Vec::as_slice)
    }

    pub fn rows(&self) -> impl Iterator<Item = (NaiveDate, &[Option<f64>])> {
        self.dates
            .iter()
            .copied()
            .zip(self.values.iter().map(Vec::as_slice))
    }

    pub fn value(&self, date: NaiveDate, ticker: &str) -> Option<f64> {
        let row = self.dates.binary_search(&date).ok()?;
        let column = self.tickers.iter().position(|t| t == ticker)?;
        self.values[row][column]
    }

    pub fn missing_count(&self) -> usize {
        self.values
            .iter()
            .flatten()
            .filter(|cell| cell.is_none())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, d).unwrap()
    }

    fn symbols(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_from_series_outer_joins_dates() {
        let series = vec![
            PriceSeries::new("AAPL", vec![(date(2), Some(75.0)), (date(3), Some(74.3))]),
            PriceSeries::new("MSFT", vec![(date(3), Some(155.0)), (date(6), Some(156.1))]),
        ];
        let table = PriceTable::from_series(&symbols(&["AAPL", "MSFT"]), &series);

        assert_eq!(table.dates(), &[date(2), date(3), date(6)]);
        assert_eq!(table.column_count(), 2);
        assert_eq!(table.value(date(2), "AAPL"), Some(75.0));
        assert_eq!(table.value(date(2), "MSFT"), None);
        assert_eq!(table.value(date(6), "MSFT"), Some(156.1));
        assert_eq!(table.missing_count(), 2);
    }

    #[test]
    fn test_missing_series_is_all_missing_column() {
        let series = vec![PriceSeries::new("AAPL", vec![(date(2), Some(75.0))])];
        let table = PriceTable::from_series(&symbols(&["AAPL", "NOPE"]), &series);

        assert_eq!(table.tickers(), &symbols(&["AAPL", "NOPE"])[..]);
        assert_eq!(table.row(0), Some(&[Some(75.0), None][..]));
    }

    #[test]
    fn test_no_series_gives_empty_table_with_columns() {
        let table = PriceTable::from_series(&symbols(&["AAPL", "MSFT", "GOOGL"]), &[]);
        assert!(table.is_empty());
        assert_eq!(table.column_count(), 3);
    }

    #[test]
    fn test_from_rows_pivots_in_first_seen_order() {
        let rows = vec![
            PriceRow { date: date(3), ticker: "MSFT".into(), value: 2.0 },
            PriceRow { date: date(2), ticker: "AAPL".into(), value: 1.0 },
            PriceRow { date: date(2), ticker: "MSFT".into(), value: 3.0 },
        ];
        let table = PriceTable::from_rows(&rows);

        assert_eq!(table.tickers(), &symbols(&["MSFT", "AAPL"])[..]);
        assert_eq!(table.dates(), &[date(2), date(3)]);
        assert_eq!(table.value(date(3), "AAPL"), None);
        assert_eq!(table.value(date(2), "MSFT"), Some(3.0));
    }
}
