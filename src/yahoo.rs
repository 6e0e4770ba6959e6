use crate::input::DateRange;
use crate::provider::{PriceProvider, ProviderError};
use crate::table::{PriceSeries, PriceTable};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use futures::future::try_join_all;
use rand::seq::IndexedRandom;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, instrument, warn};

pub const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com/";

const MAX_RETRIES: u32 = 5;
const BACKOFF_BASE: Duration = Duration::from_secs(1);

// Yahoo answers 400 with this description when the window has no bars.
const NO_DATA_PREFIX: &str = "Data doesn't exist";

// --- Chart API response ---

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    exchange_timezone_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    adjclose: Vec<AdjClose>,
}

#[derive(Debug, Deserialize)]
struct AdjClose {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

/// Yahoo Finance chart API client.
pub struct YahooClient {
    client: Client,
    base_url: Url,
    rate_limit_per_minute: u32,
    request_timestamps: Mutex<Vec<Instant>>,
    user_agents: Vec<String>,
    random_agent: bool,
    max_retries: u32,
    backoff_base: Duration,
}

impl YahooClient {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        random_agent: bool,
        rate_limit_per_minute: u32,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(timeout).gzip(true).build()?;

        let user_agents = vec![
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:120.0) Gecko/20100101 Firefox/120.0".to_string(),
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.3 Safari/605.1.15".to_string(),
        ];

        let base_url = Url::parse(base_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| ProviderError::InvalidBaseUrl(base_url.to_string()))?;

        Ok(YahooClient {
            client,
            base_url,
            rate_limit_per_minute: rate_limit_per_minute.max(1),
            request_timestamps: Mutex::new(Vec::new()),
            user_agents,
            random_agent,
            max_retries: MAX_RETRIES,
            backoff_base: BACKOFF_BASE,
        })
    }

    /// Override the attempt budget and the first backoff step.
    pub fn with_retry(mut self, max_retries: u32, backoff_base: Duration) -> Self {
        self.max_retries = max_retries.max(1);
        self.backoff_base = backoff_base;
        self
    }

    fn get_user_agent(&self) -> &str {
        if self.random_agent {
            self.user_agents
                .choose(&mut rand::rng())
                .unwrap_or(&self.user_agents[0])
        } else {
            &self.user_agents[0]
        }
    }

    /// Sliding one-minute window shared by every request of this client.
    async fn enforce_rate_limit(&self) {
        let window = Duration::from_secs(60);
        let mut timestamps = self.request_timestamps.lock().await;
        let now = Instant::now();

        timestamps.retain(|&t| now.duration_since(t) < window);

        if timestamps.len() >= self.rate_limit_per_minute as usize {
            if let Some(&oldest) = timestamps.first() {
                let wait = window.saturating_sub(now.duration_since(oldest));
                if !wait.is_zero() {
                    debug!(wait_ms = wait.as_millis() as u64, "Rate limit reached, waiting");
                    sleep(wait + Duration::from_millis(100)).await;
                }
            }
        }

        timestamps.push(Instant::now());
    }

    /// Request window as unix seconds: midnight UTC of start and end.
    pub fn period_bounds(range: &DateRange) -> (i64, i64) {
        let to_ts = |date: NaiveDate| {
            date.and_hms_opt(0, 0, 0)
                .map(|dt| dt.and_utc().timestamp())
                .unwrap_or_default()
        };
        (to_ts(range.start()), to_ts(range.end()))
    }

    /// Chart endpoint for one symbol. The symbol is a single encoded path
    /// segment, so `/`, `?` and `#` in user text cannot reshape the request.
    pub fn chart_url(&self, symbol: &str, range: &DateRange) -> Result<Url, ProviderError> {
        let (period1, period2) = Self::period_bounds(range);
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ProviderError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["v8", "finance", "chart"])
            .push(symbol);
        url.query_pairs_mut()
            .append_pair("period1", &period1.to_string())
            .append_pair("period2", &period2.to_string())
            .append_pair("interval", "1d")
            .append_pair("events", "div,splits")
            .append_pair("includeAdjustedClose", "true");
        Ok(url)
    }

    async fn make_request(&self, symbol: &str, url: Url) -> Result<ChartEnvelope, ProviderError> {
        let mut last_error = None;

        for attempt in 0..self.max_retries {
            self.enforce_rate_limit().await;

            if attempt > 0 {
                let factor = 2.0_f64.powi(attempt as i32 - 1) + rand::random::<f64>();
                let delay = self.backoff_base.mul_f64(factor).min(Duration::from_secs(60));
                debug!(symbol, attempt, delay_ms = delay.as_millis() as u64, "Retrying chart request");
                sleep(delay).await;
            }

            let response = self
                .client
                .get(url.clone())
                .header("Accept", "application/json, text/plain, */*")
                .header("Accept-Language", "en-US,en;q=0.9")
                .header("User-Agent", self.get_user_agent())
                .send()
                .await;

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let body = resp.text().await?;
                        return Ok(serde_json::from_str(&body)?);
                    }

                    if status == StatusCode::NOT_FOUND {
                        let body = resp.text().await.unwrap_or_default();
                        return Err(unknown_symbol(symbol, &body));
                    }

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        warn!(symbol, attempt, "Provider rate limited the request");
                        last_error = Some(ProviderError::RateLimit);
                    } else if status.is_server_error() {
                        warn!(symbol, attempt, status = status.as_u16(), "Provider server error");
                        last_error = Some(ProviderError::Status {
                            symbol: symbol.to_string(),
                            status: status.as_u16(),
                        });
                    } else {
                        let body = resp.text().await.unwrap_or_default();
                        if let Some(envelope) = no_data_envelope(&body) {
                            debug!(symbol, status = status.as_u16(), "No data in requested window");
                            return Ok(envelope);
                        }
                        return Err(ProviderError::Status {
                            symbol: symbol.to_string(),
                            status: status.as_u16(),
                        });
                    }
                }
                Err(e) => {
                    warn!(symbol, attempt, error = %e, "Chart request failed");
                    last_error = Some(ProviderError::Http(e));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ProviderError::InvalidResponse("Max retries exceeded".to_string())))
    }

    #[instrument(skip(self, range), fields(range = %range))]
    pub async fn get_history(&self, symbol: &str, range: &DateRange) -> Result<PriceSeries, ProviderError> {
        if range.start() >= range.end() {
            return Ok(PriceSeries::empty(symbol));
        }
        let url = self.chart_url(symbol, range)?;
        let envelope = self.make_request(symbol, url).await?;
        let series = parse_chart(symbol, envelope, range)?;
        debug!(symbol, points = series.points.len(), "Fetched adjusted close history");
        Ok(series)
    }
}

#[async_trait]
impl PriceProvider for YahooClient {
    async fn adjusted_close(&self, symbols: &[String], range: &DateRange) -> Result<PriceTable, ProviderError> {
        let series = try_join_all(symbols.iter().map(|symbol| self.get_history(symbol, range))).await?;
        Ok(PriceTable::from_series(symbols, &series))
    }
}

fn unknown_symbol(symbol: &str, body: &str) -> ProviderError {
    let reason = serde_json::from_str::<ChartEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.chart.error)
        .and_then(|error| error.description)
        .unwrap_or_else(|| "Not Found".to_string());
    ProviderError::UnknownSymbol {
        symbol: symbol.to_string(),
        reason,
    }
}

fn is_no_data(error: &ChartError) -> bool {
    error
        .description
        .as_deref()
        .is_some_and(|description| description.starts_with(NO_DATA_PREFIX))
}

/// A 4xx body that only says the window is empty.
fn no_data_envelope(body: &str) -> Option<ChartEnvelope> {
    serde_json::from_str::<ChartEnvelope>(body)
        .ok()
        .filter(|envelope| envelope.chart.error.as_ref().is_some_and(is_no_data))
}

fn parse_chart(symbol: &str, envelope: ChartEnvelope, range: &DateRange) -> Result<PriceSeries, ProviderError> {
    if let Some(error) = envelope.chart.error {
        if is_no_data(&error) {
            return Ok(PriceSeries::empty(symbol));
        }
        return Err(ProviderError::UnknownSymbol {
            symbol: symbol.to_string(),
            reason: error.description.unwrap_or(error.code),
        });
    }

    let result = envelope
        .chart
        .result
        .and_then(|results| results.into_iter().next())
        .ok_or_else(|| ProviderError::InvalidResponse(format!("Empty chart result for {}", symbol)))?;

    // No trading days in the window: Yahoo omits the arrays entirely.
    if result.timestamp.is_empty() {
        return Ok(PriceSeries::empty(symbol));
    }

    let adjclose = result
        .indicators
        .adjclose
        .into_iter()
        .next()
        .map(|a| a.adjclose)
        .ok_or_else(|| ProviderError::InvalidResponse(format!("Missing adjclose for {}", symbol)))?;

    if adjclose.len() != result.timestamp.len() {
        return Err(ProviderError::InvalidResponse(format!(
            "Inconsistent array lengths for {}: {} timestamps, {} values",
            symbol,
            result.timestamp.len(),
            adjclose.len()
        )));
    }

    let tz: Tz = result
        .meta
        .exchange_timezone_name
        .as_deref()
        .and_then(|name| name.parse().ok())
        .unwrap_or(Tz::UTC);

    let mut points = Vec::with_capacity(adjclose.len());
    for (i, (ts, value)) in result.timestamp.iter().zip(adjclose).enumerate() {
        let time = DateTime::<Utc>::from_timestamp(*ts, 0).ok_or_else(|| {
            ProviderError::InvalidResponse(format!("Cannot convert timestamp {} at index {}", ts, i))
        })?;
        let date = time.with_timezone(&tz).date_naive();
        if date >= range.start() && date < range.end() {
            points.push((date, value.filter(|v| v.is_finite())));
        }
    }

    points.sort_by_key(|(date, _)| *date);
    Ok(PriceSeries::new(symbol, points))
}
