use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One (symbol, date) OHLCV record. Write-once; a re-fetch overwrites with
/// current values (see `db::price_queries::upsert_price_point`).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PricePoint {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: BigDecimal,
    pub high: BigDecimal,
    pub low: BigDecimal,
    pub close: BigDecimal,
    pub volume: i64,
    pub created_at: DateTime<Utc>,
}

/// Advisory record that (symbol, start_date, end_date, source) was fetched.
/// The authoritative coverage answer is membership in `price_data`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CoverageSpan {
    pub id: i64,
    pub symbol: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub downloaded_at: DateTime<Utc>,
    pub source: String,
}
