//! # ticker-progression
//!
//! Animated adjusted-close dashboard. A comma-separated ticker list and a
//! date range go in; an animated bar chart comes out, one frame per trading
//! day and one bar per ticker.
//!
//! The pipeline is linear and re-runs on every input change:
//!
//! 1. [`input`] normalizes the ticker text and validates the dates,
//! 2. [`fetcher`] pulls the wide adjusted-close table through a
//!    [`provider::PriceProvider`] (Yahoo Finance in production) and memoizes
//!    it for the life of the process,
//! 3. [`reshape`] drops incomplete dates and melts the table into tidy rows,
//! 4. [`chart`] turns the rows into a plotly figure with a fixed y axis.
//!
//! ```no_run
//! use ticker_progression::prelude::*;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = AppConfig::default();
//! let dashboard = Dashboard::new(config.yahoo_client()?, config.chart_options());
//! let figure = dashboard.render(&DashboardInput::default()).await?;
//! println!("{} frames", figure.frames.len());
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod chart;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod input;
pub mod pipeline;
pub mod provider;
pub mod reshape;
pub mod table;
pub mod utils;
pub mod yahoo;

pub mod prelude {
    pub use crate::chart::{ChartFigure, ChartOptions};
    pub use crate::config::AppConfig;
    pub use crate::error::DashboardError;
    pub use crate::fetcher::MarketDataFetcher;
    pub use crate::input::{normalize_tickers, DashboardInput, DateRange, TickerList};
    pub use crate::pipeline::Dashboard;
    pub use crate::provider::{PriceProvider, ProviderError};
    pub use crate::table::{PriceRow, PriceTable};
    pub use crate::yahoo::YahooClient;
}
