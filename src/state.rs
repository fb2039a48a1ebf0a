use std::sync::Arc;

use sqlx::PgPool;

use crate::agent_runtime::AgentRuntime;
use crate::config::Config;
use crate::external::PriceProvider;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub price_provider: Arc<dyn PriceProvider>,
    pub agent_runtime: Arc<dyn AgentRuntime>,
    pub config: Arc<Config>,
}
