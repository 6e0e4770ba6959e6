use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub const DEFAULT_TICKERS: &str = "AAPL,MSFT,GOOGL";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("start date {start} is after end date {end}")]
    InvertedRange { start: NaiveDate, end: NaiveDate },

    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
}

/// Ordered, uppercased ticker symbols as typed by the user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TickerList(Vec<String>);

impl TickerList {
    pub fn new(symbols: Vec<String>) -> Self {
        Self(symbols)
    }

    pub fn symbols(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for TickerList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(","))
    }
}

/// Split a comma-separated string into ticker symbols.
///
/// Each piece is trimmed and uppercased. Blank pieces are skipped and a
/// symbol that appears twice keeps only its first position.
pub fn normalize_tickers(raw: &str) -> TickerList {
    let mut symbols: Vec<String> = Vec::new();
    for piece in raw.split(',') {
        let symbol = piece.trim().to_uppercase();
        if symbol.is_empty() || symbols.contains(&symbol) {
            continue;
        }
        symbols.push(symbol);
    }
    TickerList(symbols)
}

/// Calendar range handed to the provider. The end date is exclusive there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, InputError> {
        if start > end {
            return Err(InputError::InvertedRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to {}",
            self.start.format(DATE_FORMAT),
            self.end.format(DATE_FORMAT)
        )
    }
}

pub fn parse_date(value: &str) -> Result<NaiveDate, InputError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|_| InputError::InvalidDate(value.to_string()))
}

/// Today's calendar date in the market's time zone.
pub fn today_in(tz: Tz) -> NaiveDate {
    Utc::now().with_timezone(&tz).date_naive()
}

pub fn default_start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or_default()
}

/// Raw widget values, before normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardInput {
    pub tickers: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DashboardInput {
    pub fn new(tickers: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            tickers: tickers.into(),
            start,
            end,
        }
    }

    pub fn normalize(&self) -> Result<(TickerList, DateRange), InputError> {
        let range = DateRange::new(self.start, self.end)?;
        Ok((normalize_tickers(&self.tickers), range))
    }
}

impl Default for DashboardInput {
    fn default() -> Self {
        Self {
            tickers: DEFAULT_TICKERS.to_string(),
            start: default_start_date(),
            end: today_in(chrono_tz::America::New_York),
        }
    }
}
