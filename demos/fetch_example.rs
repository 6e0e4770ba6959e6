use chrono::NaiveDate;
use ticker_progression::prelude::*;
use ticker_progression::reshape;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!("Yahoo Finance adjusted close example");
    println!("====================================");

    let config = AppConfig::default();
    let fetcher = MarketDataFetcher::new(config.yahoo_client()?);

    let tickers = normalize_tickers("AAPL,MSFT,GOOGL");
    let range = DateRange::new(
        NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or_default(),
        NaiveDate::from_ymd_opt(2020, 1, 10).unwrap_or_default(),
    )?;

    // 1. Wide table
    println!("\nWide table for {} ({})", tickers, range);
    println!("{}", "-".repeat(40));
    let table = fetcher.fetch(&tickers, &range).await?;
    println!("{:<12}{}", "Date", table.tickers().join("      "));
    for (date, row) in table.rows() {
        let cells: Vec<String> = row
            .iter()
            .map(|cell| cell.map_or("NaN".to_string(), |v| format!("{:.2}", v)))
            .collect();
        println!("{:<12}{}", date.to_string(), cells.join("  "));
    }

    // 2. Memoized re-fetch
    fetcher.fetch(&tickers, &range).await?;
    let stats = fetcher.stats().await;
    println!("\nCache: {} entries, {} hits, {} misses", stats.entries, stats.hits, stats.misses);

    // 3. Tidy rows and chart bound
    let rows = reshape::tidy(&table);
    let figure = ChartFigure::from_rows(&rows, &config.chart_options());
    println!("\nTidy rows: {}", rows.len());
    println!("Frames: {} | y axis top: {:.2}", figure.frames.len(), figure.y_upper);

    Ok(())
}
