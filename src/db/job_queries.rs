use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::models::{Job, JobDetail, JobDetailStatus, JobProgress, JobStatus};

/// Inserts a job and exactly one JobDetail per entry in `pending_pairs`
/// (already-completed pairs are excluded by the caller). Atomic. `models`
/// is still recorded on the job row as the full requested model list.
pub async fn create_job(
    pool: &PgPool,
    start_date: NaiveDate,
    end_date: NaiveDate,
    models: &[String],
    pending_pairs: &[(NaiveDate, String)],
) -> Result<Uuid, sqlx::Error> {
    let job_id = Uuid::new_v4();

    let mut tx: Transaction<'_, Postgres> = pool.begin().await?;

    sqlx::query(
        "INSERT INTO jobs (id, status, start_date, end_date, models, created_at)
         VALUES ($1, $2, $3, $4, $5, now())",
    )
    .bind(job_id)
    .bind(JobStatus::Pending.as_str())
    .bind(start_date)
    .bind(end_date)
    .bind(models)
    .execute(&mut *tx)
    .await?;

    for (date, model) in pending_pairs {
        sqlx::query(
            "INSERT INTO job_details (job_id, date, model, status)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(job_id)
        .bind(date)
        .bind(model)
        .bind(JobDetailStatus::Pending.as_str())
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(job_id)
}

/// Audit row separate from job_details: one entry per triggered job.
pub async fn record_simulation_run(
    pool: &PgPool,
    job_id: Uuid,
    start_date: NaiveDate,
    end_date: NaiveDate,
    models: &[String],
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO simulation_runs (job_id, start_date, end_date, models) VALUES ($1, $2, $3, $4)",
    )
    .bind(job_id)
    .bind(start_date)
    .bind(end_date)
    .bind(models)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_job(pool: &PgPool, job_id: Uuid) -> Result<Option<Job>, sqlx::Error> {
    sqlx::query_as::<_, Job>(
        "SELECT id, status, start_date, end_date, models, created_at, started_at,
                completed_at, total_duration_seconds, error, warnings
         FROM jobs WHERE id = $1",
    )
    .bind(job_id)
    .fetch_optional(pool)
    .await
}

pub async fn get_current_job(pool: &PgPool) -> Result<Option<Job>, sqlx::Error> {
    sqlx::query_as::<_, Job>(
        "SELECT id, status, start_date, end_date, models, created_at, started_at,
                completed_at, total_duration_seconds, error, warnings
         FROM jobs
         WHERE status IN ('pending', 'downloading_data', 'running')
         ORDER BY created_at DESC
         LIMIT 1",
    )
    .fetch_optional(pool)
    .await
}

pub async fn find_job_by_date_range(
    pool: &PgPool,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<Option<Job>, sqlx::Error> {
    sqlx::query_as::<_, Job>(
        "SELECT id, status, start_date, end_date, models, created_at, started_at,
                completed_at, total_duration_seconds, error, warnings
         FROM jobs
         WHERE start_date = $1 AND end_date = $2
         ORDER BY created_at DESC
         LIMIT 1",
    )
    .bind(start_date)
    .bind(end_date)
    .fetch_optional(pool)
    .await
}

/// True iff no job currently has status in {pending, downloading_data, running}.
pub async fn can_start_new_job(pool: &PgPool) -> Result<bool, sqlx::Error> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM jobs WHERE status IN ('pending', 'downloading_data', 'running')",
    )
    .fetch_one(pool)
    .await?;
    Ok(count == 0)
}

pub async fn get_running_jobs(pool: &PgPool) -> Result<Vec<Job>, sqlx::Error> {
    sqlx::query_as::<_, Job>(
        "SELECT id, status, start_date, end_date, models, created_at, started_at,
                completed_at, total_duration_seconds, error, warnings
         FROM jobs
         WHERE status IN ('pending', 'downloading_data', 'running')
         ORDER BY created_at ASC",
    )
    .fetch_all(pool)
    .await
}

/// Sets `started_at` on first transition to running; `completed_at` and
/// `total_duration_seconds` on transition to any terminal status.
pub async fn update_job_status(
    pool: &PgPool,
    job_id: Uuid,
    status: JobStatus,
    error: Option<&str>,
) -> Result<(), sqlx::Error> {
    if status == JobStatus::Running {
        sqlx::query(
            "UPDATE jobs
             SET status = $2, error = COALESCE($3, error),
                 started_at = COALESCE(started_at, now())
             WHERE id = $1",
        )
        .bind(job_id)
        .bind(status.as_str())
        .bind(error)
        .execute(pool)
        .await?;
    } else if status.is_terminal() {
        sqlx::query(
            "UPDATE jobs
             SET status = $2, error = COALESCE($3, error), completed_at = now(),
                 total_duration_seconds = EXTRACT(EPOCH FROM (now() - COALESCE(started_at, created_at)))
             WHERE id = $1",
        )
        .bind(job_id)
        .bind(status.as_str())
        .bind(error)
        .execute(pool)
        .await?;
    } else {
        sqlx::query("UPDATE jobs SET status = $2, error = COALESCE($3, error) WHERE id = $1")
            .bind(job_id)
            .bind(status.as_str())
            .bind(error)
            .execute(pool)
            .await?;
    }
    Ok(())
}

pub async fn add_job_warnings(
    pool: &PgPool,
    job_id: Uuid,
    warnings: &[String],
) -> Result<(), sqlx::Error> {
    if warnings.is_empty() {
        return Ok(());
    }
    sqlx::query("UPDATE jobs SET warnings = warnings || $2 WHERE id = $1")
        .bind(job_id)
        .bind(warnings)
        .execute(pool)
        .await?;
    Ok(())
}

/// Sets per-detail timestamps/duration, then recomputes the job-level status
/// if this transition left all details in a terminal state. Mirrors the
/// aggregate recomputation in the original job manager: `failed == 0` ⇒
/// completed, `completed > 0` ⇒ partial, else failed.
pub async fn update_job_detail_status(
    pool: &PgPool,
    job_id: Uuid,
    date: NaiveDate,
    model: &str,
    status: JobDetailStatus,
    error: Option<&str>,
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    if status == JobDetailStatus::Running {
        sqlx::query(
            "UPDATE job_details
             SET status = $4, error = COALESCE($5, error), started_at = now()
             WHERE job_id = $1 AND date = $2 AND model = $3",
        )
        .bind(job_id)
        .bind(date)
        .bind(model)
        .bind(status.as_str())
        .bind(error)
        .execute(&mut *tx)
        .await?;
    } else if status.is_terminal() {
        sqlx::query(
            "UPDATE job_details
             SET status = $4, error = COALESCE($5, error), completed_at = now(),
                 duration_seconds = EXTRACT(EPOCH FROM (now() - COALESCE(started_at, now())))
             WHERE job_id = $1 AND date = $2 AND model = $3",
        )
        .bind(job_id)
        .bind(date)
        .bind(model)
        .bind(status.as_str())
        .bind(error)
        .execute(&mut *tx)
        .await?;
    } else {
        sqlx::query(
            "UPDATE job_details SET status = $4, error = COALESCE($5, error)
             WHERE job_id = $1 AND date = $2 AND model = $3",
        )
        .bind(job_id)
        .bind(date)
        .bind(model)
        .bind(status.as_str())
        .bind(error)
        .execute(&mut *tx)
        .await?;
    }

    if status.is_terminal() {
        let row: (i64, i64, i64, i64) = sqlx::query_as(
            "SELECT COUNT(*),
                    COUNT(*) FILTER (WHERE status = 'completed'),
                    COUNT(*) FILTER (WHERE status = 'failed'),
                    COUNT(*) FILTER (WHERE status IN ('completed', 'failed', 'skipped'))
             FROM job_details WHERE job_id = $1",
        )
        .bind(job_id)
        .fetch_one(&mut *tx)
        .await?;
        let (total, completed, failed, terminal) = row;

        if terminal == total {
            let job_status = if failed == 0 {
                JobStatus::Completed
            } else if completed > 0 {
                JobStatus::Partial
            } else {
                JobStatus::Failed
            };
            sqlx::query(
                "UPDATE jobs SET status = $2, completed_at = now(),
                    total_duration_seconds = EXTRACT(EPOCH FROM (now() - COALESCE(started_at, created_at)))
                 WHERE id = $1",
            )
            .bind(job_id)
            .bind(job_status.as_str())
            .execute(&mut *tx)
            .await?;
        }
    }

    tx.commit().await
}

pub async fn get_job_progress(pool: &PgPool, job_id: Uuid) -> Result<JobProgress, sqlx::Error> {
    let details = sqlx::query_as::<_, JobDetail>(
        "SELECT id, job_id, date, model, status, started_at, completed_at,
                duration_seconds, error
         FROM job_details WHERE job_id = $1
         ORDER BY date ASC, model ASC",
    )
    .bind(job_id)
    .fetch_all(pool)
    .await?;

    let total = details.len() as i64;
    let completed = details.iter().filter(|d| d.status() == JobDetailStatus::Completed).count() as i64;
    let failed = details.iter().filter(|d| d.status() == JobDetailStatus::Failed).count() as i64;
    let skipped = details.iter().filter(|d| d.status() == JobDetailStatus::Skipped).count() as i64;
    let pending = details
        .iter()
        .filter(|d| matches!(d.status(), JobDetailStatus::Pending))
        .count() as i64;
    let current_running = details
        .iter()
        .find(|d| d.status() == JobDetailStatus::Running)
        .map(|d| (d.date, d.model.clone()));

    Ok(JobProgress {
        total,
        completed,
        failed,
        pending,
        skipped,
        current_running,
        details,
    })
}

/// Dates already fully completed per model, restricted to [start, end].
pub async fn get_completed_model_dates(
    pool: &PgPool,
    models: &[String],
    start: NaiveDate,
    end: NaiveDate,
) -> Result<HashMap<String, HashSet<NaiveDate>>, sqlx::Error> {
    let rows: Vec<(String, NaiveDate)> = sqlx::query_as(
        "SELECT model, date FROM job_details
         WHERE model = ANY($1) AND date BETWEEN $2 AND $3 AND status = 'completed'",
    )
    .bind(models)
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    let mut map: HashMap<String, HashSet<NaiveDate>> = HashMap::new();
    for (model, date) in rows {
        map.entry(model).or_default().insert(date);
    }
    Ok(map)
}

pub async fn get_last_completed_date_for_model(
    pool: &PgPool,
    model: &str,
) -> Result<Option<NaiveDate>, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT date FROM job_details
         WHERE model = $1 AND status = 'completed'
         ORDER BY date DESC LIMIT 1",
    )
    .bind(model)
    .fetch_optional(pool)
    .await
}

/// Maintenance operation: deletes jobs (and, via cascade, their details,
/// trading days, holdings and actions) older than `older_than_days` that
/// are in a terminal state. Not exposed over HTTP.
pub async fn cleanup_old_jobs(pool: &PgPool, older_than_days: i64) -> Result<u64, sqlx::Error> {
    let cutoff: DateTime<Utc> = Utc::now() - chrono::Duration::days(older_than_days);
    let result = sqlx::query(
        "DELETE FROM jobs
         WHERE status IN ('completed', 'partial', 'failed') AND created_at < $1",
    )
    .bind(cutoff)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
