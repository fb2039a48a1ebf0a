use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::external::price_provider::{body_signals_rate_limit, OhlcvPoint, PriceProvider, PriceProviderError};

pub struct AlphaVantageProvider {
    client: reqwest::Client,
    api_key: String,
}

impl AlphaVantageProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AvDailyResponse {
    #[serde(rename = "Time Series (Daily)")]
    time_series: Option<BTreeMap<String, AvDailyBar>>,

    #[serde(rename = "Note")]
    note: Option<String>,

    #[serde(rename = "Information")]
    information: Option<String>,

    #[serde(rename = "Error Message")]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AvDailyBar {
    #[serde(rename = "1. open")]
    open: String,
    #[serde(rename = "2. high")]
    high: String,
    #[serde(rename = "3. low")]
    low: String,
    #[serde(rename = "4. close")]
    close: String,
    #[serde(rename = "5. volume")]
    volume: String,
}

#[async_trait]
impl PriceProvider for AlphaVantageProvider {
    async fn fetch_daily_history(&self, symbol: &str) -> Result<Vec<OhlcvPoint>, PriceProviderError> {
        let url = "https://www.alphavantage.co/query";
        let resp = self
            .client
            .get(url)
            .query(&[
                ("function", "TIME_SERIES_DAILY"),
                ("symbol", symbol),
                ("outputsize", "compact"),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| PriceProviderError::Network(e.to_string()))?;

        if resp.status().as_u16() == 429 {
            return Err(PriceProviderError::RateLimited);
        }

        let text = resp.text().await.map_err(|e| PriceProviderError::Network(e.to_string()))?;
        if body_signals_rate_limit(&text) {
            return Err(PriceProviderError::RateLimited);
        }

        let body: AvDailyResponse =
            serde_json::from_str(&text).map_err(|e| PriceProviderError::Parse(e.to_string()))?;

        if body.note.is_some() || body.information.is_some() {
            return Err(PriceProviderError::RateLimited);
        }
        if let Some(msg) = body.error_message {
            return Err(PriceProviderError::BadResponse(msg));
        }

        let series = body
            .time_series
            .ok_or_else(|| PriceProviderError::BadResponse("missing time series".into()))?;

        series
            .into_iter()
            .map(|(date_str, bar)| {
                let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d")
                    .map_err(|e| PriceProviderError::Parse(e.to_string()))?;
                Ok(OhlcvPoint {
                    date,
                    open: bar.open.parse().map_err(|_| PriceProviderError::Parse("open".into()))?,
                    high: bar.high.parse().map_err(|_| PriceProviderError::Parse("high".into()))?,
                    low: bar.low.parse().map_err(|_| PriceProviderError::Parse("low".into()))?,
                    close: bar.close.parse().map_err(|_| PriceProviderError::Parse("close".into()))?,
                    volume: bar.volume.parse().map_err(|_| PriceProviderError::Parse("volume".into()))?,
                })
            })
            .collect()
    }
}
