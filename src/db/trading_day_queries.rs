use chrono::NaiveDate;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::models::{Action, Holding, PreviousTradingDay, TradingDay};

#[allow(clippy::too_many_arguments)]
pub async fn create_trading_day(
    pool: &PgPool,
    job_id: Uuid,
    model: &str,
    date: NaiveDate,
    starting_cash: f64,
    starting_portfolio_value: f64,
    daily_profit: f64,
    daily_return_pct: f64,
    days_since_last_trading: i32,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "INSERT INTO trading_days (
            job_id, model, date, starting_cash, starting_portfolio_value,
            daily_profit, daily_return_pct, days_since_last_trading,
            ending_cash, ending_portfolio_value, total_actions
         ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $4, $5, 0)
         RETURNING id",
    )
    .bind(job_id)
    .bind(model)
    .bind(date)
    .bind(starting_cash)
    .bind(starting_portfolio_value)
    .bind(daily_profit)
    .bind(daily_return_pct)
    .bind(days_since_last_trading)
    .fetch_one(pool)
    .await
}

/// Most recent TradingDay for `model` strictly before `current_date`,
/// regardless of which job produced it.
pub async fn get_previous_trading_day(
    pool: &PgPool,
    model: &str,
    current_date: NaiveDate,
) -> Result<Option<PreviousTradingDay>, sqlx::Error> {
    sqlx::query_as::<_, PreviousTradingDay>(
        "SELECT id, date, ending_cash, ending_portfolio_value
         FROM trading_days
         WHERE model = $1 AND date < $2
         ORDER BY date DESC
         LIMIT 1",
    )
    .bind(model)
    .bind(current_date)
    .fetch_optional(pool)
    .await
}

pub async fn get_ending_holdings(
    pool: &PgPool,
    trading_day_id: i64,
) -> Result<Vec<Holding>, sqlx::Error> {
    sqlx::query_as::<_, Holding>(
        "SELECT id, trading_day_id, symbol, quantity
         FROM holdings WHERE trading_day_id = $1 ORDER BY symbol",
    )
    .bind(trading_day_id)
    .fetch_all(pool)
    .await
}

/// Starting holdings of a TradingDay are the ending holdings of the
/// previous TradingDay for the same model; empty if this is the first day.
pub async fn get_starting_holdings(
    pool: &PgPool,
    model: &str,
    date: NaiveDate,
) -> Result<Vec<Holding>, sqlx::Error> {
    match get_previous_trading_day(pool, model, date).await? {
        Some(prev) => get_ending_holdings(pool, prev.id).await,
        None => Ok(Vec::new()),
    }
}

pub async fn get_actions(pool: &PgPool, trading_day_id: i64) -> Result<Vec<Action>, sqlx::Error> {
    sqlx::query_as::<_, Action>(
        "SELECT id, trading_day_id, action_type, symbol, quantity, price, created_at
         FROM actions WHERE trading_day_id = $1 ORDER BY created_at ASC, id ASC",
    )
    .bind(trading_day_id)
    .fetch_all(pool)
    .await
}

pub async fn get_trading_day(
    pool: &PgPool,
    trading_day_id: i64,
) -> Result<Option<TradingDay>, sqlx::Error> {
    sqlx::query_as::<_, TradingDay>(
        "SELECT id, job_id, model, date, starting_cash, starting_portfolio_value,
                daily_profit, daily_return_pct, days_since_last_trading,
                ending_cash, ending_portfolio_value, reasoning_summary, reasoning_full,
                total_actions, session_duration_seconds, created_at, completed_at
         FROM trading_days WHERE id = $1",
    )
    .bind(trading_day_id)
    .fetch_optional(pool)
    .await
}

pub async fn find_trading_days(
    pool: &PgPool,
    job_id: Option<Uuid>,
    model: Option<&str>,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<TradingDay>, sqlx::Error> {
    sqlx::query_as::<_, TradingDay>(
        "SELECT id, job_id, model, date, starting_cash, starting_portfolio_value,
                daily_profit, daily_return_pct, days_since_last_trading,
                ending_cash, ending_portfolio_value, reasoning_summary, reasoning_full,
                total_actions, session_duration_seconds, created_at, completed_at
         FROM trading_days
         WHERE ($1::uuid IS NULL OR job_id = $1)
           AND ($2::text IS NULL OR model = $2)
           AND date BETWEEN $3 AND $4
         ORDER BY model ASC, date ASC",
    )
    .bind(job_id)
    .bind(model)
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await
}

/// Batch-persists the Ledger's final state: every non-zero holding, the
/// ordered action log, and the TradingDay's ending state -- one transaction.
pub async fn finalize_trading_day(
    pool: &PgPool,
    trading_day_id: i64,
    ending_cash: f64,
    ending_portfolio_value: f64,
    reasoning_summary: Option<&str>,
    reasoning_full: Option<&serde_json::Value>,
    holdings: &[(String, i64)],
    actions: &[(String, String, i64, f64)],
    session_duration_seconds: f64,
) -> Result<(), sqlx::Error> {
    let mut tx: Transaction<'_, Postgres> = pool.begin().await?;

    for (action_type, symbol, quantity, price) in actions {
        sqlx::query(
            "INSERT INTO actions (trading_day_id, action_type, symbol, quantity, price, created_at)
             VALUES ($1, $2, $3, $4, $5, now())",
        )
        .bind(trading_day_id)
        .bind(action_type)
        .bind(symbol)
        .bind(quantity)
        .bind(price)
        .execute(&mut *tx)
        .await?;
    }

    for (symbol, quantity) in holdings {
        sqlx::query(
            "INSERT INTO holdings (trading_day_id, symbol, quantity) VALUES ($1, $2, $3)",
        )
        .bind(trading_day_id)
        .bind(symbol)
        .bind(quantity)
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query(
        "UPDATE trading_days
         SET ending_cash = $2, ending_portfolio_value = $3, reasoning_summary = $4,
             reasoning_full = $5, total_actions = $6, session_duration_seconds = $7,
             completed_at = now()
         WHERE id = $1",
    )
    .bind(trading_day_id)
    .bind(ending_cash)
    .bind(ending_portfolio_value)
    .bind(reasoning_summary)
    .bind(reasoning_full)
    .bind(actions.len() as i32)
    .bind(session_duration_seconds)
    .execute(&mut *tx)
    .await?;

    tx.commit().await
}
