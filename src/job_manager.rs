use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use sqlx::PgPool;
use uuid::Uuid;

use crate::agent_runtime::AgentRuntime;
use crate::config::Config;
use crate::db::job_queries;
use crate::errors::AppError;
use crate::external::PriceProvider;
use crate::worker;

pub struct CreateJobRequest {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub models: Vec<String>,
}

pub struct CreatedJob {
    pub job_id: Uuid,
    pub warnings: Vec<String>,
}

/// `POST /simulate/trigger`'s business logic: validate, enforce the
/// single-active-job invariant, skip already-completed (model, date) pairs,
/// insert the job, and detach a Worker to run it.
pub async fn create_job(
    pool: &PgPool,
    price_provider: Arc<dyn PriceProvider>,
    agent_runtime: Arc<dyn AgentRuntime>,
    config: Arc<Config>,
    request: CreateJobRequest,
) -> Result<CreatedJob, AppError> {
    validate(&request, &config)?;

    if !job_queries::can_start_new_job(pool).await? {
        return Err(AppError::Conflict(
            "a simulation job is already pending, downloading data, or running".to_string(),
        ));
    }

    let dates: Vec<NaiveDate> = {
        let mut d = Vec::new();
        let mut cursor = request.start_date;
        while cursor <= request.end_date {
            d.push(cursor);
            cursor += Duration::days(1);
        }
        d
    };

    let completed =
        job_queries::get_completed_model_dates(pool, &request.models, request.start_date, request.end_date).await?;

    let mut warnings = Vec::new();
    let mut pending_pairs = Vec::new();
    for date in &dates {
        for model in &request.models {
            if completed.get(model).map(|s| s.contains(date)).unwrap_or(false) {
                warnings.push(format!("{model} already completed for {date}, skipping"));
            } else {
                pending_pairs.push((*date, model.clone()));
            }
        }
    }

    if pending_pairs.is_empty() {
        return Err(AppError::Conflict(
            "every requested (model, date) pair is already completed".to_string(),
        ));
    }

    let job_id = job_queries::create_job(
        pool,
        request.start_date,
        request.end_date,
        &request.models,
        &pending_pairs,
    )
    .await?;
    job_queries::record_simulation_run(pool, job_id, request.start_date, request.end_date, &request.models).await?;

    let pool_clone = pool.clone();
    tokio::spawn(async move {
        worker::run(pool_clone, price_provider, agent_runtime, config, job_id).await;
    });

    Ok(CreatedJob { job_id, warnings })
}

fn validate(request: &CreateJobRequest, config: &Config) -> Result<(), AppError> {
    if request.models.is_empty() {
        return Err(AppError::Validation("at least one model is required".to_string()));
    }
    if request.start_date > request.end_date {
        return Err(AppError::Validation("start_date must not be after end_date".to_string()));
    }
    let today = chrono::Utc::now().date_naive();
    if request.end_date > today {
        return Err(AppError::Validation("end_date must not be in the future".to_string()));
    }
    let span_days = (request.end_date - request.start_date).num_days() + 1;
    if span_days > config.max_simulation_days {
        return Err(AppError::Validation(format!(
            "date range spans {span_days} days, exceeding the maximum of {}",
            config.max_simulation_days
        )));
    }
    Ok(())
}
