use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use sqlx::PgPool;
use tokio::time::{sleep, Duration};

use crate::db::price_queries;
use crate::external::{OhlcvPoint, PriceProvider, PriceProviderError};
use crate::services::rate_limiter::RateLimiter;

const MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone)]
pub struct SymbolDownloadOutcome {
    pub symbol: String,
    pub succeeded: bool,
    pub rate_limited: bool,
    pub error: Option<String>,
}

/// Acquires price history on demand, respecting upstream rate limits and
/// prioritising the symbols whose absence would otherwise block the most
/// requested trading dates.
pub struct PriceCache {
    pool: PgPool,
    provider: Arc<dyn PriceProvider>,
    limiter: RateLimiter,
}

impl PriceCache {
    pub fn new(pool: PgPool, provider: Arc<dyn PriceProvider>, max_concurrent: usize, requests_per_minute: u32) -> Self {
        Self {
            pool,
            provider,
            limiter: RateLimiter::new(max_concurrent, requests_per_minute),
        }
    }

    /// For each tracked symbol, the subset of `requested_dates` it lacks a
    /// PricePoint for.
    pub async fn missing_coverage(
        &self,
        symbols: &[String],
        requested_dates: &[NaiveDate],
    ) -> Result<HashMap<String, Vec<NaiveDate>>, sqlx::Error> {
        let start = *requested_dates.iter().min().expect("requested_dates non-empty");
        let end = *requested_dates.iter().max().expect("requested_dates non-empty");
        let requested: HashSet<NaiveDate> = requested_dates.iter().copied().collect();

        let mut missing = HashMap::new();
        for symbol in symbols {
            let available: HashSet<NaiveDate> = price_queries::get_available_dates_for_symbol(&self.pool, symbol, start, end)
                .await?
                .into_iter()
                .collect();
            let mut gap: Vec<NaiveDate> = requested.difference(&available).copied().collect();
            if !gap.is_empty() {
                gap.sort();
                missing.insert(symbol.clone(), gap);
            }
        }
        Ok(missing)
    }

    /// Orders symbols by how many requested dates their gap would fill,
    /// descending. Zero-impact symbols are dropped. Ties broken by symbol
    /// name so the order is stable and deterministic across runs.
    pub fn prioritise(missing: &HashMap<String, Vec<NaiveDate>>, requested_dates: &[NaiveDate]) -> Vec<String> {
        let requested: HashSet<NaiveDate> = requested_dates.iter().copied().collect();
        let mut scored: Vec<(String, usize)> = missing
            .iter()
            .map(|(symbol, gap)| {
                let impact = gap.iter().filter(|d| requested.contains(d)).count();
                (symbol.clone(), impact)
            })
            .filter(|(_, impact)| *impact > 0)
            .collect();

        scored.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scored.into_iter().map(|(symbol, _)| symbol).collect()
    }

    /// Downloads missing history for `symbols` in priority order. Stops as
    /// soon as an upstream rate limit is hit; all remaining symbols are
    /// reported as failed without being attempted. Each fetch gets up to
    /// `MAX_ATTEMPTS` tries with `2^attempt`-second backoff for transient,
    /// non-rate-limit failures.
    pub async fn download_missing(
        &self,
        symbols: &[String],
        requested_dates: &[NaiveDate],
    ) -> Vec<SymbolDownloadOutcome> {
        let requested: HashSet<NaiveDate> = requested_dates.iter().copied().collect();
        let mut outcomes = Vec::with_capacity(symbols.len());
        let mut rate_limited_hit = false;

        for symbol in symbols {
            if rate_limited_hit {
                outcomes.push(SymbolDownloadOutcome {
                    symbol: symbol.clone(),
                    succeeded: false,
                    rate_limited: true,
                    error: Some("skipped: upstream rate limit hit earlier in this batch".to_string()),
                });
                continue;
            }

            match self.fetch_with_retry(symbol).await {
                Ok(points) => {
                    if let Err(err) = self.persist(symbol, &points, &requested).await {
                        outcomes.push(SymbolDownloadOutcome {
                            symbol: symbol.clone(),
                            succeeded: false,
                            rate_limited: false,
                            error: Some(err.to_string()),
                        });
                        continue;
                    }
                    outcomes.push(SymbolDownloadOutcome {
                        symbol: symbol.clone(),
                        succeeded: true,
                        rate_limited: false,
                        error: None,
                    });
                }
                Err(PriceProviderError::RateLimited) => {
                    rate_limited_hit = true;
                    outcomes.push(SymbolDownloadOutcome {
                        symbol: symbol.clone(),
                        succeeded: false,
                        rate_limited: true,
                        error: Some("upstream rate limit".to_string()),
                    });
                }
                Err(err) => {
                    outcomes.push(SymbolDownloadOutcome {
                        symbol: symbol.clone(),
                        succeeded: false,
                        rate_limited: false,
                        error: Some(err.to_string()),
                    });
                }
            }
        }

        outcomes
    }

    async fn fetch_with_retry(&self, symbol: &str) -> Result<Vec<OhlcvPoint>, PriceProviderError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let _guard = self.limiter.acquire().await;
            match self.provider.fetch_daily_history(symbol).await {
                Ok(points) => return Ok(points),
                Err(PriceProviderError::RateLimited) => return Err(PriceProviderError::RateLimited),
                Err(err) if attempt < MAX_ATTEMPTS => {
                    tracing::warn!(symbol, attempt, error = %err, "price fetch failed, retrying");
                    sleep(Duration::from_secs(2_u64.pow(attempt))).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn persist(
        &self,
        symbol: &str,
        points: &[OhlcvPoint],
        requested_dates: &HashSet<NaiveDate>,
    ) -> Result<(), sqlx::Error> {
        let to_decimal = |v: f64| v.to_string().parse::<BigDecimal>().unwrap_or_default();

        for point in points {
            if !requested_dates.contains(&point.date) {
                continue;
            }
            price_queries::upsert_price_point(
                &self.pool,
                symbol,
                point.date,
                to_decimal(point.open),
                to_decimal(point.high),
                to_decimal(point.low),
                to_decimal(point.close),
                point.volume,
            )
            .await?;
        }

        if let (Some(min), Some(max)) = (requested_dates.iter().min(), requested_dates.iter().max()) {
            price_queries::upsert_coverage(&self.pool, symbol, *min, *max, "on-demand").await?;
        }
        Ok(())
    }

    /// Dates within [start, end] where every tracked symbol has a price.
    pub async fn available_trading_dates(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        universe_size: i64,
    ) -> Result<Vec<NaiveDate>, sqlx::Error> {
        price_queries::available_trading_dates(&self.pool, start, end, universe_size).await
    }

    pub async fn get_open(&self, date: NaiveDate, symbols: &[String]) -> Result<HashMap<String, f64>, sqlx::Error> {
        price_queries::get_open_prices(&self.pool, date, symbols).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn prioritise_orders_by_impact_descending() {
        let mut missing = HashMap::new();
        missing.insert("AAPL".to_string(), vec![date(2025, 1, 2), date(2025, 1, 3)]);
        missing.insert("MSFT".to_string(), vec![date(2025, 1, 2)]);
        let requested = vec![date(2025, 1, 2), date(2025, 1, 3)];

        let order = PriceCache::prioritise(&missing, &requested);
        assert_eq!(order, vec!["AAPL".to_string(), "MSFT".to_string()]);
    }

    #[test]
    fn prioritise_drops_zero_impact_and_breaks_ties_by_name() {
        let mut missing = HashMap::new();
        missing.insert("ZZZ".to_string(), vec![date(2025, 2, 1)]);
        missing.insert("AAPL".to_string(), vec![date(2025, 1, 2)]);
        missing.insert("MSFT".to_string(), vec![date(2025, 1, 2)]);
        let requested = vec![date(2025, 1, 2)];

        let order = PriceCache::prioritise(&missing, &requested);
        assert_eq!(order, vec!["AAPL".to_string(), "MSFT".to_string()]);
    }
}
