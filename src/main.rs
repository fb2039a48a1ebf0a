use std::net::SocketAddr;
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;

use tradesim_orchestrator::agent_runtime::MockAgentRuntime;
use tradesim_orchestrator::config::Config;
use tradesim_orchestrator::external::alphavantage::AlphaVantageProvider;
use tradesim_orchestrator::external::mock_provider::MockPriceProvider;
use tradesim_orchestrator::external::PriceProvider;
use tradesim_orchestrator::state::AppState;
use tradesim_orchestrator::{app, logging, runtime_context};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let config = Arc::new(Config::from_env());

    logging::init_logging(logging::LoggingConfig::from_env())?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;

    sqlx::migrate!().run(&pool).await?;

    let scratch_dir = std::env::temp_dir().join("tradesim-orchestrator-runtime");
    runtime_context::cleanup_all_runtime_configs(&scratch_dir).await;

    let price_provider: Arc<dyn PriceProvider> = if config.is_dev() {
        Arc::new(MockPriceProvider::new())
    } else {
        Arc::new(AlphaVantageProvider::new(config.price_provider_api_key.clone()))
    };

    let agent_runtime: Arc<dyn tradesim_orchestrator::agent_runtime::AgentRuntime> =
        Arc::new(MockAgentRuntime::new());

    let state = AppState {
        pool,
        price_provider,
        agent_runtime,
        config,
    };

    let app = app::create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], 3000));
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("tradesim-orchestrator listening on http://{}/", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
