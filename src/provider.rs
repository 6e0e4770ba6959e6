use crate::input::DateRange;
use crate::table::PriceTable;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider responded with status {status} for {symbol}")]
    Status { symbol: String, status: u16 },

    #[error("failed to decode provider response: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    #[error("unknown symbol {symbol}: {reason}")]
    UnknownSymbol { symbol: String, reason: String },

    #[error("provider rate limit exceeded")]
    RateLimit,

    #[error("invalid provider base url {0}")]
    InvalidBaseUrl(String),
}

/// Source of adjusted-close prices.
///
/// One call covers the whole ticker list: the returned table has one column
/// per requested symbol, in request order.
#[async_trait]
pub trait PriceProvider: Send + Sync {
    async fn adjusted_close(
        &self,
        symbols: &[String],
        range: &DateRange,
    ) -> Result<PriceTable, ProviderError>;
}

#[async_trait]
impl<T: PriceProvider + ?Sized> PriceProvider for Box<T> {
    async fn adjusted_close(
        &self,
        symbols: &[String],
        range: &DateRange,
    ) -> Result<PriceTable, ProviderError> {
        (**self).adjusted_close(symbols, range).await
    }
}
