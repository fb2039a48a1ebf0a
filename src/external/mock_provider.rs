use async_trait::async_trait;
use chrono::{Duration, NaiveDate};

use crate::external::price_provider::{OhlcvPoint, PriceProvider, PriceProviderError};

/// Deterministic price source for dev mode: no network calls, no API key,
/// same symbol always produces the same series. Used so Scenario-style runs
/// are assertable without a real upstream.
pub struct MockPriceProvider {
    history_days: i64,
    anchor: NaiveDate,
}

impl MockPriceProvider {
    pub fn new() -> Self {
        Self {
            history_days: 120,
            anchor: NaiveDate::from_ymd_opt(2025, 1, 1).expect("valid anchor date"),
        }
    }

    fn base_price(symbol: &str) -> f64 {
        let sum: u32 = symbol.bytes().map(|b| b as u32).sum();
        50.0 + (sum % 200) as f64
    }
}

impl Default for MockPriceProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PriceProvider for MockPriceProvider {
    async fn fetch_daily_history(&self, symbol: &str) -> Result<Vec<OhlcvPoint>, PriceProviderError> {
        let base = Self::base_price(symbol);
        let points = (0..self.history_days)
            .map(|offset| {
                let date = self.anchor + Duration::days(offset);
                // Deterministic, bounded wobble keyed off day offset so the
                // same symbol/date always revalues to the same close.
                let wobble = ((offset % 11) as f64 - 5.0) * 0.5;
                let close = (base + wobble).max(1.0);
                let open = close - 0.25;
                OhlcvPoint {
                    date,
                    open,
                    high: close + 0.5,
                    low: open - 0.5,
                    close,
                    volume: 1_000_000,
                }
            })
            .collect();
        Ok(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn is_deterministic_across_calls() {
        let provider = MockPriceProvider::new();
        let a = provider.fetch_daily_history("AAPL").await.unwrap();
        let b = provider.fetch_daily_history("AAPL").await.unwrap();
        assert_eq!(a.len(), b.len());
        assert_eq!(a[0].close, b[0].close);
    }

    #[tokio::test]
    async fn different_symbols_diverge() {
        let provider = MockPriceProvider::new();
        let aapl = provider.fetch_daily_history("AAPL").await.unwrap();
        let msft = provider.fetch_daily_history("MSFT").await.unwrap();
        assert_ne!(aapl[0].close, msft[0].close);
    }
}
