use std::collections::HashMap;

use crate::db::trading_day_queries;
use crate::errors::AppError;
use crate::models::{ActionType, Holding};

struct RecordedAction {
    action_type: ActionType,
    symbol: String,
    quantity: i64,
    price: f64,
}

/// The mutable portfolio of one trading session. Confined to a single
/// DayExecutor task; no internal locking. Actions accumulate in memory and
/// are persisted as one atomic batch by `finish()`.
pub struct Ledger {
    cash: f64,
    holdings: HashMap<String, i64>,
    actions: Vec<RecordedAction>,
}

impl Ledger {
    pub fn new(starting_cash: f64, starting_holdings: &[Holding]) -> Self {
        let holdings = starting_holdings
            .iter()
            .map(|h| (h.symbol.clone(), h.quantity))
            .collect();
        Self {
            cash: starting_cash,
            holdings,
            actions: Vec::new(),
        }
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn holdings(&self) -> &HashMap<String, i64> {
        &self.holdings
    }

    pub fn trade_count(&self) -> usize {
        self.actions.len()
    }

    pub fn buy(&mut self, symbol: &str, qty: i64, open_price: f64) -> Result<(), AppError> {
        if qty < 1 {
            return Err(AppError::Validation(format!(
                "buy quantity must be >= 1, got {qty}"
            )));
        }
        let cost = open_price * qty as f64;
        if self.cash < cost {
            return Err(AppError::InsufficientCash {
                required: cost,
                available: self.cash,
            });
        }

        self.cash -= cost;
        *self.holdings.entry(symbol.to_string()).or_insert(0) += qty;
        self.actions.push(RecordedAction {
            action_type: ActionType::Buy,
            symbol: symbol.to_string(),
            quantity: qty,
            price: open_price,
        });

        Ok(())
    }

    pub fn sell(&mut self, symbol: &str, qty: i64, open_price: f64) -> Result<(), AppError> {
        if qty < 1 {
            return Err(AppError::Validation(format!(
                "sell quantity must be >= 1, got {qty}"
            )));
        }
        let have = *self.holdings.get(symbol).unwrap_or(&0);
        if have < qty {
            return Err(AppError::InsufficientShares {
                symbol: symbol.to_string(),
                have,
                want: qty,
            });
        }

        let remaining = have - qty;
        if remaining == 0 {
            self.holdings.remove(symbol);
        } else {
            self.holdings.insert(symbol.to_string(), remaining);
        }
        self.cash += open_price * qty as f64;
        self.actions.push(RecordedAction {
            action_type: ActionType::Sell,
            symbol: symbol.to_string(),
            quantity: qty,
            price: open_price,
        });

        Ok(())
    }

    /// Revalues the current holdings at `prices` to produce an ending
    /// portfolio value. Returns `MissingPrice` if any held symbol lacks one.
    pub fn portfolio_value(&self, prices: &HashMap<String, f64>) -> Result<f64, AppError> {
        let mut value = self.cash;
        for (symbol, qty) in &self.holdings {
            let price = prices
                .get(symbol)
                .ok_or_else(|| AppError::MissingPrice(symbol.clone()))?;
            value += price * *qty as f64;
        }
        Ok(value)
    }

    /// Persists all actions in order, every non-zero holding, and the
    /// TradingDay's ending state, in one transaction.
    pub async fn finish(
        self,
        pool: &sqlx::PgPool,
        trading_day_id: i64,
        ending_portfolio_value: f64,
        reasoning_summary: Option<&str>,
        reasoning_full: Option<&serde_json::Value>,
        session_duration_seconds: f64,
    ) -> Result<(f64, f64, usize), AppError> {
        let trade_count = self.actions.len();
        let actions: Vec<(String, String, i64, f64)> = self
            .actions
            .iter()
            .map(|a| {
                (
                    a.action_type.as_str().to_string(),
                    a.symbol.clone(),
                    a.quantity,
                    a.price,
                )
            })
            .collect();
        let holdings: Vec<(String, i64)> = self
            .holdings
            .iter()
            .filter(|(_, qty)| **qty > 0)
            .map(|(symbol, qty)| (symbol.clone(), *qty))
            .collect();

        trading_day_queries::finalize_trading_day(
            pool,
            trading_day_id,
            self.cash,
            ending_portfolio_value,
            reasoning_summary,
            reasoning_full,
            &holdings,
            &actions,
            session_duration_seconds,
        )
        .await?;

        Ok((self.cash, ending_portfolio_value, trade_count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buy_deducts_cash_and_adds_holding() {
        let mut ledger = Ledger::new(10000.0, &[]);
        ledger.buy("AAPL", 10, 100.0).unwrap();
        assert_eq!(ledger.cash(), 9000.0);
        assert_eq!(ledger.holdings().get("AAPL"), Some(&10));
    }

    #[test]
    fn buy_rejects_insufficient_cash() {
        let mut ledger = Ledger::new(10000.0, &[]);
        let result = ledger.buy("AAPL", 200, 100.0);
        assert!(matches!(result, Err(AppError::InsufficientCash { .. })));
        assert_eq!(ledger.cash(), 10000.0);
        assert_eq!(ledger.trade_count(), 0);
    }

    #[test]
    fn sell_rejects_insufficient_shares() {
        let mut ledger = Ledger::new(10000.0, &[]);
        let result = ledger.sell("AAPL", 1, 100.0);
        assert!(matches!(result, Err(AppError::InsufficientShares { .. })));
    }

    #[test]
    fn sell_drops_holding_key_at_zero() {
        let holding = Holding {
            id: 1,
            trading_day_id: 1,
            symbol: "AAPL".to_string(),
            quantity: 10,
        };
        let mut ledger = Ledger::new(9000.0, std::slice::from_ref(&holding));
        ledger.sell("AAPL", 10, 105.0).unwrap();
        assert!(!ledger.holdings().contains_key("AAPL"));
        assert_eq!(ledger.cash(), 9000.0 + 10.0 * 105.0);
    }

    #[test]
    fn ledger_conserves_cash_across_trades() {
        let mut ledger = Ledger::new(10000.0, &[]);
        ledger.buy("AAPL", 10, 100.0).unwrap();
        ledger.sell("AAPL", 5, 110.0).unwrap();
        let expected = 10000.0 - 10.0 * 100.0 + 5.0 * 110.0;
        assert_eq!(ledger.cash(), expected);
    }
}
