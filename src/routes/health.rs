use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde_json::json;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(health))
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let database = match sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(&state.pool).await {
        Ok(_) => "connected",
        Err(err) => {
            tracing::error!(error = %err, "health check database ping failed");
            "disconnected"
        }
    };
    let status = if database == "connected" { "healthy" } else { "unhealthy" };

    Json(json!({
        "status": status,
        "database": database,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}
