use std::env;

const DEFAULT_TRACKED_SYMBOLS: &[&str] = &[
    "AAPL", "MSFT", "GOOGL", "AMZN", "NVDA", "META", "TSLA", "BRK.B", "JPM", "V",
];

/// Falls back to a single enabled model signature, the same
/// `provider/model-name` shape `model_factory.py::create_model` expects.
const DEFAULT_ENABLED_MODELS: &[&str] = &["deepseek/deepseek-chat"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentMode {
    Prod,
    Dev,
}

/// Process-wide configuration, loaded once at startup from the environment.
///
/// Mirrors the teacher's pattern of a single typed config struct built from
/// `env::var` lookups with sane defaults, rather than a config-file parser.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub deployment_mode: DeploymentMode,
    pub preserve_dev_data: bool,
    pub max_simulation_days: i64,
    pub default_results_lookback_days: i64,
    pub worker_concurrency: usize,
    pub initial_cash: f64,
    pub agent_max_steps: u32,
    pub agent_max_retries: u32,
    pub price_provider_api_key: String,
    pub tracked_symbols: Vec<String>,
    pub enabled_models: Vec<String>,
}

impl Config {
    pub fn from_env() -> Self {
        let deployment_mode = match env::var("DEPLOYMENT_MODE")
            .unwrap_or_else(|_| "PROD".to_string())
            .to_uppercase()
            .as_str()
        {
            "DEV" => DeploymentMode::Dev,
            _ => DeploymentMode::Prod,
        };

        let tracked_symbols = env::var("TRACKED_SYMBOLS")
            .ok()
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| {
                DEFAULT_TRACKED_SYMBOLS
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            });

        let enabled_models = env::var("ENABLED_MODELS")
            .ok()
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| {
                DEFAULT_ENABLED_MODELS
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            });

        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            deployment_mode,
            preserve_dev_data: env::var("PRESERVE_DEV_DATA")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            max_simulation_days: env::var("MAX_SIMULATION_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            default_results_lookback_days: env::var("DEFAULT_RESULTS_LOOKBACK_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            worker_concurrency: env::var("WORKER_CONCURRENCY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(4),
            initial_cash: env::var("INITIAL_CASH")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10000.0),
            agent_max_steps: env::var("AGENT_MAX_STEPS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            agent_max_retries: env::var("AGENT_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3),
            price_provider_api_key: env::var("PRICE_PROVIDER_API_KEY").unwrap_or_default(),
            tracked_symbols,
            enabled_models,
        }
    }

    pub fn is_dev(&self) -> bool {
        self.deployment_mode == DeploymentMode::Dev
    }
}
