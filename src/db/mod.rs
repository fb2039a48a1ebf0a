pub mod job_queries;
pub mod price_queries;
pub mod trading_day_queries;
