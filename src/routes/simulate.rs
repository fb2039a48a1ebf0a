use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{Duration, NaiveDate};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::db::job_queries;
use crate::errors::{AppError, AppResult};
use crate::job_manager::{self, CreateJobRequest};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/trigger", post(trigger))
        .route("/status/{job_id}", get(status))
}

#[derive(Debug, Deserialize)]
struct TriggerRequest {
    start_date: Option<NaiveDate>,
    end_date: NaiveDate,
    models: Option<Vec<String>>,
    #[serde(default)]
    #[allow(dead_code)]
    replace_existing: bool,
}

async fn trigger(State(state): State<AppState>, Json(body): Json<TriggerRequest>) -> AppResult<Json<serde_json::Value>> {
    let models = body.models.unwrap_or_else(|| state.config.enabled_models.clone());

    let start_date = match body.start_date {
        Some(date) => date,
        None => resume_start_date(&state, &models, body.end_date).await?,
    };

    let model_count = models.len() as i64;
    let request = CreateJobRequest {
        start_date,
        end_date: body.end_date,
        models,
    };

    let created = job_manager::create_job(
        &state.pool,
        state.price_provider.clone(),
        state.agent_runtime.clone(),
        state.config.clone(),
        request,
    )
    .await?;

    let total_model_days = ((body.end_date - start_date).num_days() + 1) * model_count;

    Ok(Json(json!({
        "job_id": created.job_id,
        "status": "pending",
        "total_model_days": total_model_days,
        "message": "simulation job created",
        "warnings": created.warnings,
    })))
}

/// If `start_date` is omitted, each model resumes the day after its last
/// completed date; models with no history cold-start on a single-day range
/// ending at `end_date`.
async fn resume_start_date(state: &AppState, models: &[String], end_date: NaiveDate) -> AppResult<NaiveDate> {
    let mut earliest_resume: Option<NaiveDate> = None;
    for model in models {
        let resume = match job_queries::get_last_completed_date_for_model(&state.pool, model).await? {
            Some(last) => last + Duration::days(1),
            None => end_date,
        };
        earliest_resume = Some(match earliest_resume {
            Some(current) => current.min(resume),
            None => resume,
        });
    }
    Ok(earliest_resume.unwrap_or(end_date).min(end_date))
}

async fn status(State(state): State<AppState>, Path(job_id): Path<Uuid>) -> AppResult<Json<serde_json::Value>> {
    let job = job_queries::get_job(&state.pool, job_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("job {job_id} not found")))?;
    let progress = job_queries::get_job_progress(&state.pool, job_id).await?;

    Ok(Json(json!({
        "job_id": job.id,
        "status": job.status,
        "progress": {
            "total": progress.total,
            "completed": progress.completed,
            "failed": progress.failed,
            "pending": progress.pending,
        },
        "date_range": [job.start_date, job.end_date],
        "models": job.models,
        "created_at": job.created_at,
        "started_at": job.started_at,
        "completed_at": job.completed_at,
        "total_duration_seconds": job.total_duration_seconds,
        "error": job.error,
        "warnings": job.warnings,
        "details": progress.details.iter().map(|d| json!({
            "date": d.date,
            "model": d.model,
            "status": d.status,
            "started_at": d.started_at,
            "completed_at": d.completed_at,
            "duration_seconds": d.duration_seconds,
            "error": d.error,
        })).collect::<Vec<_>>(),
    })))
}
