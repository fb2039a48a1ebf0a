pub mod agent_runtime;
pub mod app;
pub mod config;
pub mod day_executor;
pub mod db;
pub mod errors;
pub mod external;
pub mod job_manager;
pub mod ledger;
pub mod logging;
pub mod models;
pub mod pnl;
pub mod price_cache;
pub mod routes;
pub mod runtime_context;
pub mod services;
pub mod state;
pub mod worker;
