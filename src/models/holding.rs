use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One (TradingDay, symbol) snapshot at end of day. Quantity is always > 0;
/// a position that nets to zero is simply not written.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Holding {
    pub id: i64,
    pub trading_day_id: i64,
    pub symbol: String,
    pub quantity: i64,
}
