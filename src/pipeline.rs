use crate::chart::{ChartFigure, ChartOptions};
use crate::error::DashboardError;
use crate::fetcher::{CacheStats, MarketDataFetcher};
use crate::input::DashboardInput;
use crate::provider::PriceProvider;
use crate::reshape;
use crate::utils::Timer;
use tracing::{info, instrument, warn};

/// Input → fetch → reshape → chart, run afresh for every widget change.
pub struct Dashboard<P> {
    fetcher: MarketDataFetcher<P>,
    options: ChartOptions,
}

impl<P: PriceProvider> Dashboard<P> {
    pub fn new(provider: P, options: ChartOptions) -> Self {
        Self {
            fetcher: MarketDataFetcher::new(provider),
            options,
        }
    }

    pub fn fetcher(&self) -> &MarketDataFetcher<P> {
        &self.fetcher
    }

    #[instrument(skip(self, input), fields(tickers = %input.tickers, start = %input.start, end = %input.end))]
    pub async fn render(&self, input: &DashboardInput) -> Result<ChartFigure, DashboardError> {
        let timer = Timer::start("render");
        let (tickers, range) = input.normalize()?;

        if tickers.is_empty() {
            warn!("No tickers entered, rendering empty chart");
            return Ok(ChartFigure::from_rows(&[], &self.options));
        }

        let table = self.fetcher.fetch(&tickers, &range).await?;
        let rows = reshape::tidy(&table);
        if rows.is_empty() {
            warn!(fetched_rows = table.row_count(), "No complete rows in range");
        }

        let figure = ChartFigure::from_rows(&rows, &self.options);
        info!(
            frames = figure.frames.len(),
            tidy_rows = rows.len(),
            y_upper = figure.y_upper,
            "Chart ready"
        );
        timer.log_elapsed();
        Ok(figure)
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.fetcher.stats().await
    }
}
