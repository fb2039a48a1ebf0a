use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;
use sqlx::PgPool;
use tokio::time::Duration;
use uuid::Uuid;

use crate::agent_runtime::{self, AgentRuntime};
use crate::config::Config;
use crate::db::{job_queries, price_queries, trading_day_queries};
use crate::errors::AppError;
use crate::ledger::Ledger;
use crate::models::JobDetailStatus;
use crate::pnl;
use crate::runtime_context::{RuntimeContext, ScratchConfigHandle};

/// Executes one (job, model, date). Idempotent: if the JobDetail is already
/// `completed`, this returns immediately without touching the Ledger.
#[allow(clippy::too_many_arguments)]
pub async fn execute(
    pool: &PgPool,
    agent_runtime: &Arc<dyn AgentRuntime>,
    config: &Config,
    scratch_dir: &Path,
    job_id: Uuid,
    model: &str,
    date: NaiveDate,
) -> Result<(), AppError> {
    let started_at = Instant::now();

    let already = job_queries::get_job_progress(pool, job_id)
        .await?
        .details
        .into_iter()
        .find(|d| d.date == date && d.model == model)
        .map(|d| d.status());
    if already == Some(JobDetailStatus::Completed) {
        return Ok(());
    }

    job_queries::update_job_detail_status(pool, job_id, date, model, JobDetailStatus::Running, None).await?;

    match run_session(pool, agent_runtime, config, scratch_dir, job_id, model, date, started_at).await {
        Ok(()) => {
            job_queries::update_job_detail_status(pool, job_id, date, model, JobDetailStatus::Completed, None).await?;
            Ok(())
        }
        Err(err) => {
            job_queries::update_job_detail_status(
                pool,
                job_id,
                date,
                model,
                JobDetailStatus::Failed,
                Some(&err.to_string()),
            )
            .await?;
            Err(err)
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_session(
    pool: &PgPool,
    agent_runtime_impl: &Arc<dyn AgentRuntime>,
    config: &Config,
    scratch_dir: &Path,
    job_id: Uuid,
    model: &str,
    date: NaiveDate,
    started_at: Instant,
) -> Result<(), AppError> {
    let previous_day = trading_day_queries::get_previous_trading_day(pool, model, date).await?;
    let previous_holdings = match &previous_day {
        Some(prev) => trading_day_queries::get_ending_holdings(pool, prev.id).await?,
        None => Vec::new(),
    };

    let open_prices = price_queries::get_open_prices(pool, date, &config.tracked_symbols).await?;

    let daily_pnl = pnl::calculate(
        previous_day.as_ref(),
        &previous_holdings,
        date,
        &open_prices,
        config.initial_cash,
    )?;

    let starting_cash = previous_day.as_ref().map(|p| p.ending_cash).unwrap_or(config.initial_cash);

    let trading_day_id = trading_day_queries::create_trading_day(
        pool,
        job_id,
        model,
        date,
        starting_cash,
        daily_pnl.starting_portfolio_value,
        daily_pnl.daily_profit,
        daily_pnl.daily_return_pct,
        daily_pnl.days_since_last_trading,
    )
    .await?;

    let mut ledger = Ledger::new(starting_cash, &previous_holdings);
    let ctx = RuntimeContext::new(job_id, model.to_string(), date, trading_day_id);
    let scratch = ScratchConfigHandle::write(scratch_dir, &ctx)
        .await
        .map_err(|e| AppError::AgentFailure(format!("failed to write scratch config: {e}")))?;

    let session_result = agent_runtime::run_with_retry(
        agent_runtime_impl.as_ref(),
        &ctx,
        &mut ledger,
        &open_prices,
        config.agent_max_steps,
        config.agent_max_retries,
        Duration::from_secs_f64(0.5),
    )
    .await;

    scratch.cleanup().await;

    let session_result = session_result.map_err(|e| AppError::AgentFailure(e.to_string()))?;

    let ending_portfolio_value = ledger.portfolio_value(&open_prices)?;
    let reasoning_summary = summarize(&session_result);
    let session_duration = started_at.elapsed().as_secs_f64();

    ledger
        .finish(
            pool,
            trading_day_id,
            ending_portfolio_value,
            Some(&reasoning_summary),
            Some(&serde_json::json!({ "transcript": session_result.transcript })),
            session_duration,
        )
        .await?;

    Ok(())
}

/// A short natural-language recap would normally come from another LLM call;
/// in the absence of one here this falls back straight to the statistical
/// summary the spec names as the failure-path behaviour.
fn summarize(result: &agent_runtime::AgentSessionResult) -> String {
    format!(
        "executed {} trades across {} tool calls",
        result.trade_count,
        result.steps.len()
    )
}
