use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{Duration, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::db::trading_day_queries;
use crate::errors::{AppError, AppResult};
use crate::pnl;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(results))
}

#[derive(Debug, Deserialize)]
struct ResultsQuery {
    job_id: Option<Uuid>,
    model: Option<String>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    #[serde(default)]
    reasoning: Option<String>,
    /// Deprecated single-date parameter, rejected with 422 if present.
    date: Option<NaiveDate>,
}

async fn results(State(state): State<AppState>, Query(query): Query<ResultsQuery>) -> AppResult<Json<Value>> {
    if query.date.is_some() {
        return Err(AppError::UnprocessableEntity(
            "the `date` query parameter is deprecated; use `start_date`/`end_date` instead".to_string(),
        ));
    }

    let reasoning_mode = query.reasoning.as_deref().unwrap_or("none");
    if !matches!(reasoning_mode, "none" | "summary" | "full") {
        return Err(AppError::Validation(format!(
            "invalid reasoning mode '{reasoning_mode}', expected none|summary|full"
        )));
    }

    let (start, end, is_range) = match (query.start_date, query.end_date) {
        (Some(s), Some(e)) => (s, e, true),
        (Some(s), None) => (s, s, false),
        (None, Some(e)) => (e, e, false),
        (None, None) => {
            let end = Utc::now().date_naive();
            let start = end - Duration::days(state.config.default_results_lookback_days - 1);
            (start, end, true)
        }
    };

    if start > end {
        return Err(AppError::Validation("start_date must not be after end_date".to_string()));
    }

    let days = trading_day_queries::find_trading_days(&state.pool, query.job_id, query.model.as_deref(), start, end).await?;
    if days.is_empty() {
        return Err(AppError::NotFound("no matching trading days".to_string()));
    }

    if is_range {
        Ok(Json(json!(format_range(&days, start, end))))
    } else {
        Ok(Json(json!(format_single_date(&state, &days, reasoning_mode).await?)))
    }
}

async fn format_single_date(
    state: &AppState,
    days: &[crate::models::TradingDay],
    reasoning_mode: &str,
) -> AppResult<Vec<Value>> {
    let mut out = Vec::with_capacity(days.len());
    for day in days {
        let starting_holdings = trading_day_queries::get_starting_holdings(&state.pool, &day.model, day.date).await?;
        let final_holdings = trading_day_queries::get_ending_holdings(&state.pool, day.id).await?;
        let actions = trading_day_queries::get_actions(&state.pool, day.id).await?;

        let reasoning = match reasoning_mode {
            "summary" => day.reasoning_summary.clone().map(Value::String).unwrap_or(Value::Null),
            "full" => day.reasoning_full.clone().unwrap_or(Value::Null),
            _ => Value::Null,
        };

        out.push(json!({
            "date": day.date,
            "model": day.model,
            "job_id": day.job_id,
            "starting_position": {
                "holdings": holdings_map(&starting_holdings),
                "cash": day.starting_cash,
                "portfolio_value": day.starting_portfolio_value,
            },
            "daily_metrics": {
                "profit": day.daily_profit,
                "return_pct": day.daily_return_pct,
                "days_since_last_trading": day.days_since_last_trading,
            },
            "trades": actions.iter().map(|a| json!({
                "action_type": a.action_type,
                "symbol": a.symbol,
                "quantity": a.quantity,
                "price": a.price,
                "created_at": a.created_at,
            })).collect::<Vec<_>>(),
            "final_position": {
                "holdings": holdings_map(&final_holdings),
                "cash": day.ending_cash,
                "portfolio_value": day.ending_portfolio_value,
            },
            "metadata": {
                "total_actions": day.total_actions,
                "session_duration_seconds": day.session_duration_seconds,
                "completed_at": day.completed_at,
            },
            "reasoning": reasoning,
        }));
    }
    Ok(out)
}

fn holdings_map(holdings: &[crate::models::Holding]) -> HashMap<String, i64> {
    holdings.iter().map(|h| (h.symbol.clone(), h.quantity)).collect()
}

fn format_range(days: &[crate::models::TradingDay], start: NaiveDate, end: NaiveDate) -> Vec<Value> {
    let mut by_model: HashMap<String, Vec<&crate::models::TradingDay>> = HashMap::new();
    for day in days {
        by_model.entry(day.model.clone()).or_default().push(day);
    }

    let mut out = Vec::with_capacity(by_model.len());
    for (model, mut model_days) in by_model {
        model_days.sort_by_key(|d| d.date);
        let daily_portfolio_values: Vec<Value> = model_days
            .iter()
            .map(|d| json!({ "date": d.date, "portfolio_value": d.ending_portfolio_value }))
            .collect();

        let starting_portfolio_value = model_days.first().map(|d| d.starting_portfolio_value).unwrap_or(0.0);
        let ending_portfolio_value = model_days.last().map(|d| d.ending_portfolio_value).unwrap_or(0.0);
        let calendar_days = (end - start).num_days() + 1;

        out.push(json!({
            "model": model,
            "start_date": start,
            "end_date": end,
            "daily_portfolio_values": daily_portfolio_values,
            "period_metrics": {
                "starting_portfolio_value": starting_portfolio_value,
                "ending_portfolio_value": ending_portfolio_value,
                "period_return_pct": pnl::period_return_pct(starting_portfolio_value, ending_portfolio_value),
                "annualized_return_pct": pnl::annualized_return_pct(starting_portfolio_value, ending_portfolio_value, calendar_days),
                "calendar_days": calendar_days,
                "trading_days": model_days.len(),
            },
        }));
    }
    out
}
