use std::path::PathBuf;

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

/// Immutable per-(job, model, date) record threaded into every tool
/// invocation so the tool dispatcher can resolve the correct Ledger. The
/// agent runtime contract forbids caching or mutating this across sessions.
#[derive(Debug, Clone)]
pub struct RuntimeContext {
    pub job_id: Uuid,
    pub model_signature: String,
    pub date: NaiveDate,
    pub trading_day_id: i64,
}

impl RuntimeContext {
    pub fn new(job_id: Uuid, model_signature: String, date: NaiveDate, trading_day_id: i64) -> Self {
        Self {
            job_id,
            model_signature,
            date,
            trading_day_id,
        }
    }
}

#[derive(Serialize)]
struct ScratchConfig<'a> {
    today_date: NaiveDate,
    model_signature: &'a str,
    job_id: Uuid,
    trading_day_id: i64,
}

/// Legacy-compat adapter: some tool implementations read process-wide
/// state from a file rather than an explicit argument. This writes an
/// isolated scratch file per (job, model, date) so parallel DayExecutors
/// never collide, and removes it once the session ends. Per-session
/// isolation is the load-bearing property here, not the file format.
pub struct ScratchConfigHandle {
    path: PathBuf,
}

impl ScratchConfigHandle {
    pub async fn write(data_dir: &std::path::Path, ctx: &RuntimeContext) -> std::io::Result<Self> {
        tokio::fs::create_dir_all(data_dir).await?;
        let file_name = format!(
            "runtime_env_{}_{}_{}.json",
            &ctx.job_id.to_string()[..8],
            ctx.model_signature,
            ctx.date
        );
        let path = data_dir.join(file_name);

        let payload = ScratchConfig {
            today_date: ctx.date,
            model_signature: &ctx.model_signature,
            job_id: ctx.job_id,
            trading_day_id: ctx.trading_day_id,
        };
        let json = serde_json::to_vec_pretty(&payload)?;
        tokio::fs::write(&path, json).await?;

        Ok(Self { path })
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Removes the scratch file. Missing-file is not an error: cleanup
    /// always runs regardless of how the session ended.
    pub async fn cleanup(self) {
        if let Err(err) = tokio::fs::remove_file(&self.path).await {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %err, "failed to remove scratch config");
            }
        }
    }
}

/// Startup maintenance sweep: removes any `runtime_env_*.json` files left
/// behind by a killed process, so stale scratch state never leaks into a
/// fresh run.
pub async fn cleanup_all_runtime_configs(data_dir: &std::path::Path) {
    let mut entries = match tokio::fs::read_dir(data_dir).await {
        Ok(entries) => entries,
        Err(_) => return,
    };

    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with("runtime_env_") && name.ends_with(".json") {
            if let Err(err) = tokio::fs::remove_file(entry.path()).await {
                tracing::warn!(file = %name, error = %err, "failed to remove stale scratch config");
            }
        }
    }
}
