use crate::input::{DateRange, TickerList};
use crate::provider::{PriceProvider, ProviderError};
use crate::table::PriceTable;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

/// Exact argument tuple of a fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchKey {
    pub tickers: TickerList,
    pub range: DateRange,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Process-lifetime memo of fetched tables. Entries never expire: data stays
/// stale until the process restarts or `clear` is called.
#[derive(Debug, Default)]
pub struct FetchCache {
    entries: HashMap<FetchKey, Arc<PriceTable>>,
    hits: u64,
    misses: u64,
}

impl FetchCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, key: &FetchKey) -> Option<Arc<PriceTable>> {
        match self.entries.get(key) {
            Some(table) => {
                self.hits += 1;
                Some(Arc::clone(table))
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, key: FetchKey, table: Arc<PriceTable>) {
        self.entries.insert(key, table);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits,
            misses: self.misses,
        }
    }
}

/// Memoizing front for a [`PriceProvider`].
pub struct MarketDataFetcher<P> {
    provider: P,
    cache: Mutex<FetchCache>,
}

impl<P: PriceProvider> MarketDataFetcher<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            cache: Mutex::new(FetchCache::new()),
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Wide adjusted-close table for `tickers` over `range`.
    ///
    /// The cache lock is held across the provider call, so fetches never run
    /// concurrently and an identical request waiting behind another one is
    /// served from the cache. Errors are returned as-is and not remembered.
    #[instrument(skip(self, tickers, range), fields(tickers = %tickers, range = %range))]
    pub async fn fetch(&self, tickers: &TickerList, range: &DateRange) -> Result<Arc<PriceTable>, ProviderError> {
        let key = FetchKey {
            tickers: tickers.clone(),
            range: *range,
        };

        let mut cache = self.cache.lock().await;
        if let Some(table) = cache.get(&key) {
            debug!(rows = table.row_count(), "Serving adjusted close table from cache");
            return Ok(table);
        }

        info!("Fetching data...");
        let table = Arc::new(self.provider.adjusted_close(tickers.symbols(), range).await?);
        info!(
            rows = table.row_count(),
            columns = table.column_count(),
            missing = table.missing_count(),
            "Fetched adjusted close table"
        );
        cache.insert(key, Arc::clone(&table));
        Ok(table)
    }

    pub async fn stats(&self) -> CacheStats {
        self.cache.lock().await.stats()
    }

    pub async fn clear(&self) {
        self.cache.lock().await.clear();
    }
}
