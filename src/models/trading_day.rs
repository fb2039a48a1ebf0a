use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// The result of one (job, model, date) session. Created with placeholder
/// ending state at session start, updated in place at session end.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TradingDay {
    pub id: i64,
    pub job_id: Uuid,
    pub model: String,
    pub date: NaiveDate,
    pub starting_cash: f64,
    pub starting_portfolio_value: f64,
    pub daily_profit: f64,
    pub daily_return_pct: f64,
    pub days_since_last_trading: i32,
    pub ending_cash: f64,
    pub ending_portfolio_value: f64,
    pub reasoning_summary: Option<String>,
    pub reasoning_full: Option<serde_json::Value>,
    pub total_actions: i32,
    pub session_duration_seconds: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreviousTradingDay {
    pub id: i64,
    pub date: NaiveDate,
    pub ending_cash: f64,
    pub ending_portfolio_value: f64,
}
