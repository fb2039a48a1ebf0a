use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Buy,
    Sell,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Buy => "buy",
            ActionType::Sell => "sell",
        }
    }
}

/// One trade within a TradingDay, ordered by creation.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Action {
    pub id: i64,
    pub trading_day_id: i64,
    pub action_type: String,
    pub symbol: String,
    pub quantity: i64,
    pub price: f64,
    pub created_at: DateTime<Utc>,
}
