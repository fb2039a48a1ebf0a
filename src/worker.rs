use std::path::PathBuf;
use std::sync::Arc;

use sqlx::PgPool;
use uuid::Uuid;

use crate::agent_runtime::AgentRuntime;
use crate::config::Config;
use crate::day_executor;
use crate::db::job_queries;
use crate::external::PriceProvider;
use crate::models::{JobDetailStatus, JobStatus};
use crate::price_cache::PriceCache;

/// Drives one Job from creation to a terminal status. Detached into its own
/// `tokio::spawn`ed task by the JobManager; never awaited by the HTTP
/// request that triggered it.
pub async fn run(
    pool: PgPool,
    price_provider: Arc<dyn PriceProvider>,
    agent_runtime: Arc<dyn AgentRuntime>,
    config: Arc<Config>,
    job_id: Uuid,
) {
    if let Err(err) = run_inner(&pool, price_provider, agent_runtime, &config, job_id).await {
        tracing::error!(%job_id, error = %err, "worker failed");
        let _ = job_queries::update_job_status(&pool, job_id, JobStatus::Failed, Some(&err.to_string())).await;
    }
}

async fn run_inner(
    pool: &PgPool,
    price_provider: Arc<dyn PriceProvider>,
    agent_runtime: Arc<dyn AgentRuntime>,
    config: &Config,
    job_id: Uuid,
) -> Result<(), sqlx::Error> {
    let job = job_queries::get_job(pool, job_id)
        .await?
        .ok_or(sqlx::Error::RowNotFound)?;

    let dates: Vec<chrono::NaiveDate> = {
        let mut d = Vec::new();
        let mut cursor = job.start_date;
        while cursor <= job.end_date {
            d.push(cursor);
            cursor += chrono::Duration::days(1);
        }
        d
    };

    job_queries::update_job_status(pool, job_id, JobStatus::DownloadingData, None).await?;

    let cache = PriceCache::new(pool.clone(), price_provider.clone(), 3, 8);
    let mut warnings = Vec::new();

    let missing = cache.missing_coverage(&config.tracked_symbols, &dates).await?;
    if !missing.is_empty() {
        let priority = PriceCache::prioritise(&missing, &dates);
        let outcomes = cache.download_missing(&priority, &dates).await;
        for outcome in outcomes {
            if !outcome.succeeded {
                let reason = outcome.error.unwrap_or_default();
                if outcome.rate_limited {
                    warnings.push(format!("rate limited fetching {}: {}", outcome.symbol, reason));
                } else {
                    warnings.push(format!("failed fetching {}: {}", outcome.symbol, reason));
                }
            }
        }
    }

    let universe_size = config.tracked_symbols.len() as i64;
    let available_dates = cache
        .available_trading_dates(job.start_date, job.end_date, universe_size)
        .await?;
    let available: std::collections::HashSet<_> = available_dates.into_iter().collect();

    let completed = job_queries::get_completed_model_dates(pool, &job.models, job.start_date, job.end_date).await?;

    for date in &dates {
        if !available.contains(date) {
            for model in &job.models {
                job_queries::update_job_detail_status(
                    pool,
                    job_id,
                    *date,
                    model,
                    JobDetailStatus::Skipped,
                    Some("Incomplete price data"),
                )
                .await?;
            }
            warnings.push(format!("{date}: incomplete price data, all models skipped"));
            continue;
        }
        for model in &job.models {
            if completed.get(model).map(|s| s.contains(date)).unwrap_or(false) {
                job_queries::update_job_detail_status(
                    pool,
                    job_id,
                    *date,
                    model,
                    JobDetailStatus::Skipped,
                    Some("Already completed"),
                )
                .await?;
            }
        }
    }

    job_queries::update_job_status(pool, job_id, JobStatus::Running, None).await?;

    let semaphore = Arc::new(tokio::sync::Semaphore::new(config.worker_concurrency));
    let scratch_dir = Arc::new(scratch_dir());

    for date in &dates {
        if !available.contains(date) {
            continue;
        }

        let mut handles = Vec::new();
        for model in &job.models {
            if completed.get(model).map(|s| s.contains(date)).unwrap_or(false) {
                continue;
            }

            let pool = pool.clone();
            let config = Arc::new(config.clone());
            let agent_runtime = agent_runtime.clone();
            let semaphore = semaphore.clone();
            let scratch_dir = scratch_dir.clone();
            let model = model.clone();
            let date = *date;

            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore not closed");
                if let Err(err) = day_executor::execute(&pool, &agent_runtime, &config, &scratch_dir, job_id, &model, date).await {
                    tracing::warn!(%job_id, %model, %date, error = %err, "day execution failed");
                }
            }));
        }

        for handle in handles {
            let _ = handle.await;
        }
    }

    job_queries::add_job_warnings(pool, job_id, &warnings).await?;
    Ok(())
}

fn scratch_dir() -> PathBuf {
    std::env::temp_dir().join("tradesim-orchestrator-runtime")
}
