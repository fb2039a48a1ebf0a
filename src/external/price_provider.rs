use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct OhlcvPoint {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

#[derive(Debug, Error)]
pub enum PriceProviderError {
    #[error("network error: {0}")]
    Network(String),
    #[error("bad response: {0}")]
    BadResponse(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("rate limited")]
    RateLimited,
    #[error("symbol not found")]
    NotFound,
}

/// The core's only dependency on the outside world for price history:
/// `FetchSymbol(symbol) -> series | RateLimited | Fail`. A 30-second
/// deadline is enforced by the caller (`PriceCache::download_missing`),
/// not by the provider itself.
#[async_trait]
pub trait PriceProvider: Send + Sync {
    async fn fetch_daily_history(
        &self,
        symbol: &str,
    ) -> Result<Vec<OhlcvPoint>, PriceProviderError>;
}

/// Substrings that identify a rate-limit response even when it arrives as
/// HTTP 200 with a JSON note instead of a 429. Case-insensitive.
pub const RATE_LIMIT_MARKERS: &[&str] = &["call frequency", "rate limit", "premium", "limit"];

pub fn body_signals_rate_limit(body: &str) -> bool {
    let lower = body.to_lowercase();
    RATE_LIMIT_MARKERS.iter().any(|marker| lower.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_call_frequency_marker() {
        assert!(body_signals_rate_limit(
            "{\"Note\": \"Thank you for using Alpha Vantage! Our standard API call frequency is 5 calls per minute\"}"
        ));
    }

    #[test]
    fn detects_premium_marker() {
        assert!(body_signals_rate_limit("{\"Information\": \"please upgrade to a premium plan\"}"));
    }

    #[test]
    fn normal_body_does_not_trigger() {
        assert!(!body_signals_rate_limit("{\"Time Series (Daily)\": {}}"));
    }
}
