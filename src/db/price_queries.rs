use std::collections::HashMap;

use bigdecimal::{BigDecimal, ToPrimitive};
use chrono::NaiveDate;
use sqlx::PgPool;

use crate::models::PricePoint;

/// Write-once-but-overwrite-on-refetch upsert, restricted to the supplied
/// `requested_dates` (the original only stores dates actually asked for).
pub async fn upsert_price_point(
    pool: &PgPool,
    symbol: &str,
    date: NaiveDate,
    open: BigDecimal,
    high: BigDecimal,
    low: BigDecimal,
    close: BigDecimal,
    volume: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO price_data (symbol, date, open, high, low, close, volume, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, now())
         ON CONFLICT (symbol, date) DO UPDATE SET
            open = EXCLUDED.open, high = EXCLUDED.high, low = EXCLUDED.low,
            close = EXCLUDED.close, volume = EXCLUDED.volume",
    )
    .bind(symbol)
    .bind(date)
    .bind(open)
    .bind(high)
    .bind(low)
    .bind(close)
    .bind(volume)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_available_dates_for_symbol(
    pool: &PgPool,
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<NaiveDate>, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT date FROM price_data WHERE symbol = $1 AND date BETWEEN $2 AND $3 ORDER BY date",
    )
    .bind(symbol)
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await
}

pub async fn count_symbols_at_date(pool: &PgPool, date: NaiveDate) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(DISTINCT symbol) FROM price_data WHERE date = $1")
        .bind(date)
        .fetch_one(pool)
        .await
}

/// Dates (within [start, end]) where the distinct-symbol count matches
/// `universe_size`, i.e. every tracked symbol has a PricePoint.
pub async fn available_trading_dates(
    pool: &PgPool,
    start: NaiveDate,
    end: NaiveDate,
    universe_size: i64,
) -> Result<Vec<NaiveDate>, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT date FROM price_data
         WHERE date BETWEEN $1 AND $2
         GROUP BY date
         HAVING COUNT(DISTINCT symbol) = $3
         ORDER BY date",
    )
    .bind(start)
    .bind(end)
    .bind(universe_size)
    .fetch_all(pool)
    .await
}

pub async fn get_open_prices(
    pool: &PgPool,
    date: NaiveDate,
    symbols: &[String],
) -> Result<HashMap<String, f64>, sqlx::Error> {
    let rows: Vec<(String, BigDecimal)> = sqlx::query_as(
        "SELECT symbol, open FROM price_data WHERE date = $1 AND symbol = ANY($2)",
    )
    .bind(date)
    .bind(symbols)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(symbol, open)| (symbol, open.to_f64().unwrap_or(0.0)))
        .collect())
}

pub async fn upsert_coverage(
    pool: &PgPool,
    symbol: &str,
    start_date: NaiveDate,
    end_date: NaiveDate,
    source: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO price_data_coverage (symbol, start_date, end_date, downloaded_at, source)
         VALUES ($1, $2, $3, now(), $4)
         ON CONFLICT (symbol, start_date, end_date) DO UPDATE SET downloaded_at = now()",
    )
    .bind(symbol)
    .bind(start_date)
    .bind(end_date)
    .bind(source)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_price_points(
    pool: &PgPool,
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<PricePoint>, sqlx::Error> {
    sqlx::query_as::<_, PricePoint>(
        "SELECT symbol, date, open, high, low, close, volume, created_at
         FROM price_data WHERE symbol = $1 AND date BETWEEN $2 AND $3 ORDER BY date",
    )
    .bind(symbol)
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await
}
