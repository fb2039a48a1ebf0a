use std::collections::HashMap;

use chrono::NaiveDate;

use crate::errors::AppError;
use crate::models::{Holding, PreviousTradingDay};

/// Result of a P&L computation at the start of a session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyPnl {
    pub daily_profit: f64,
    pub daily_return_pct: f64,
    pub starting_portfolio_value: f64,
    pub days_since_last_trading: i32,
}

/// Pure function: given the previous day's ending state (if any) and
/// today's open prices, compute the P&L that defines today's starting
/// point. Holds no state and performs no I/O; previous-day lookup and
/// today's prices are fetched by the caller (DayExecutor).
///
/// Raises `AppError::MissingPrice` if a held symbol has no price today --
/// this implementation takes the stricter of the two stances described by
/// the source material (raise, rather than silently skip the symbol and
/// understate portfolio value).
pub fn calculate(
    previous_day: Option<&PreviousTradingDay>,
    previous_holdings: &[Holding],
    current_date: NaiveDate,
    current_prices: &HashMap<String, f64>,
    initial_cash: f64,
) -> Result<DailyPnl, AppError> {
    let Some(previous_day) = previous_day else {
        return Ok(DailyPnl {
            daily_profit: 0.0,
            daily_return_pct: 0.0,
            starting_portfolio_value: initial_cash,
            days_since_last_trading: 0,
        });
    };

    let mut starting_portfolio_value = previous_day.ending_cash;
    for holding in previous_holdings {
        let price = current_prices
            .get(&holding.symbol)
            .ok_or_else(|| AppError::MissingPrice(holding.symbol.clone()))?;
        starting_portfolio_value += *price * holding.quantity as f64;
    }

    let daily_profit = starting_portfolio_value - previous_day.ending_portfolio_value;
    let daily_return_pct = if previous_day.ending_portfolio_value > 0.0 {
        daily_profit / previous_day.ending_portfolio_value * 100.0
    } else {
        0.0
    };
    let days_since_last_trading = (current_date - previous_day.date).num_days() as i32;

    Ok(DailyPnl {
        daily_profit,
        daily_return_pct,
        starting_portfolio_value,
        days_since_last_trading,
    })
}

/// `((ending/starting)^(365/calendar_days) - 1) * 100`, the formula used by
/// both per-session P&L (implicitly) and the `/results` range endpoint.
/// Zero if `calendar_days` is zero, `starting` is zero, or `ending <= 0`.
pub fn annualized_return_pct(starting: f64, ending: f64, calendar_days: i64) -> f64 {
    if calendar_days == 0 || starting == 0.0 || ending <= 0.0 {
        return 0.0;
    }
    ((ending / starting).powf(365.0 / calendar_days as f64) - 1.0) * 100.0
}

pub fn period_return_pct(starting: f64, ending: f64) -> f64 {
    if starting == 0.0 {
        return 0.0;
    }
    (ending - starting) / starting * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_day_has_zero_pnl_and_initial_cash() {
        let result = calculate(
            None,
            &[],
            NaiveDate::from_ymd_opt(2025, 1, 16).unwrap(),
            &HashMap::new(),
            10000.0,
        )
        .unwrap();

        assert_eq!(result.daily_profit, 0.0);
        assert_eq!(result.daily_return_pct, 0.0);
        assert_eq!(result.starting_portfolio_value, 10000.0);
        assert_eq!(result.days_since_last_trading, 0);
    }

    #[test]
    fn revalues_holdings_at_current_prices() {
        let previous = PreviousTradingDay {
            id: 1,
            date: NaiveDate::from_ymd_opt(2025, 1, 16).unwrap(),
            ending_cash: 9000.0,
            ending_portfolio_value: 10000.0,
        };
        let holdings = vec![Holding {
            id: 1,
            trading_day_id: 1,
            symbol: "AAPL".to_string(),
            quantity: 10,
        }];
        let mut prices = HashMap::new();
        prices.insert("AAPL".to_string(), 105.0);

        let result = calculate(
            Some(&previous),
            &holdings,
            NaiveDate::from_ymd_opt(2025, 1, 17).unwrap(),
            &prices,
            10000.0,
        )
        .unwrap();

        assert_eq!(result.starting_portfolio_value, 9000.0 + 10.0 * 105.0);
        assert_eq!(result.daily_profit, 50.0);
        assert_eq!(result.daily_return_pct, 0.5);
        assert_eq!(result.days_since_last_trading, 1);
    }

    #[test]
    fn missing_price_for_held_symbol_is_an_error() {
        let previous = PreviousTradingDay {
            id: 1,
            date: NaiveDate::from_ymd_opt(2025, 1, 16).unwrap(),
            ending_cash: 9000.0,
            ending_portfolio_value: 10000.0,
        };
        let holdings = vec![Holding {
            id: 1,
            trading_day_id: 1,
            symbol: "AAPL".to_string(),
            quantity: 10,
        }];

        let result = calculate(
            Some(&previous),
            &holdings,
            NaiveDate::from_ymd_opt(2025, 1, 17).unwrap(),
            &HashMap::new(),
            10000.0,
        );

        assert!(matches!(result, Err(AppError::MissingPrice(symbol)) if symbol == "AAPL"));
    }

    #[test]
    fn annualized_return_matches_scenario_f() {
        let value = annualized_return_pct(10000.0, 10050.0, 2);
        let expected = ((10050.0_f64 / 10000.0).powf(365.0 / 2.0) - 1.0) * 100.0;
        assert!((value - expected).abs() < 1e-9);
    }

    #[test]
    fn annualized_return_is_zero_when_starting_is_zero() {
        assert_eq!(annualized_return_pct(0.0, 100.0, 10), 0.0);
    }
}
