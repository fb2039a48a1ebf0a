use std::collections::HashMap;

use chrono::NaiveDate;
use tradesim_orchestrator::agent_runtime::{AgentRuntime, MockAgentRuntime};
use tradesim_orchestrator::external::mock_provider::MockPriceProvider;
use tradesim_orchestrator::external::PriceProvider;
use tradesim_orchestrator::ledger::Ledger;
use tradesim_orchestrator::pnl;
use tradesim_orchestrator::price_cache::PriceCache;
use tradesim_orchestrator::runtime_context::{RuntimeContext, ScratchConfigHandle};
use uuid::Uuid;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// A full DayExecutor-style session, minus the Store: fetch deterministic
/// open prices, run the mock agent against a fresh ledger, revalue the
/// result. Exercises PriceCache::prioritise, MockAgentRuntime, Ledger and
/// pnl::calculate together without a database.
#[tokio::test]
async fn mock_agent_buys_its_rotation_symbol_and_ledger_balances() {
    let provider = MockPriceProvider::new();
    let today = date(2025, 1, 1); // day_offset 0 -> rotation[0] == "AAPL"

    let history = provider.fetch_daily_history("AAPL").await.unwrap();
    let today_open = history.iter().find(|p| p.date == today).unwrap().open;
    let mut open_prices = HashMap::new();
    open_prices.insert("AAPL".to_string(), today_open);

    let daily_pnl = pnl::calculate(None, &[], today, &open_prices, 10_000.0).unwrap();
    assert_eq!(daily_pnl.starting_portfolio_value, 10_000.0);

    let mut ledger = Ledger::new(daily_pnl.starting_portfolio_value, &[]);
    let ctx = RuntimeContext::new(Uuid::new_v4(), "mock-model".to_string(), today, 1);

    let runtime = MockAgentRuntime::new();
    let result = runtime.run_session(&ctx, &mut ledger, &open_prices, 10).await.unwrap();

    assert_eq!(result.trade_count, 1);
    assert_eq!(ledger.holdings().get("AAPL"), Some(&5));
    assert!(result.transcript.contains("bought 5 AAPL"));

    let ending_value = ledger.portfolio_value(&open_prices).unwrap();
    assert!((ending_value - 10_000.0).abs() < 1e-9, "buying at open should not change total value");
}

/// The rotation is keyed off the calendar date, not call order: two
/// sessions on the same date pick the same symbol even with independent
/// ledgers, so two models running in parallel for one day are comparable.
#[tokio::test]
async fn mock_agent_rotation_is_keyed_by_date_not_call_order() {
    let provider = MockPriceProvider::new();
    let today = date(2025, 1, 3); // day_offset 2 -> rotation[2] == "GOOGL"
    let history = provider.fetch_daily_history("GOOGL").await.unwrap();
    let today_open = history.iter().find(|p| p.date == today).unwrap().open;
    let mut open_prices = HashMap::new();
    open_prices.insert("GOOGL".to_string(), today_open);

    let runtime = MockAgentRuntime::new();

    let mut ledger_a = Ledger::new(10_000.0, &[]);
    let ctx_a = RuntimeContext::new(Uuid::new_v4(), "model-a".to_string(), today, 1);
    let result_a = runtime.run_session(&ctx_a, &mut ledger_a, &open_prices, 10).await.unwrap();

    let mut ledger_b = Ledger::new(10_000.0, &[]);
    let ctx_b = RuntimeContext::new(Uuid::new_v4(), "model-b".to_string(), today, 2);
    let result_b = runtime.run_session(&ctx_b, &mut ledger_b, &open_prices, 10).await.unwrap();

    assert_eq!(ledger_a.holdings().get("GOOGL"), ledger_b.holdings().get("GOOGL"));
    assert_eq!(result_a.trade_count, result_b.trade_count);
}

/// When the symbol the rotation picked has no open price today (a gap the
/// PriceCache failed to fill), the agent must skip the trade rather than
/// error -- the session result still carries a transcript explaining why.
#[tokio::test]
async fn mock_agent_skips_trade_when_open_price_missing() {
    let today = date(2025, 1, 1); // rotation[0] == "AAPL"
    let open_prices: HashMap<String, f64> = HashMap::new();

    let mut ledger = Ledger::new(10_000.0, &[]);
    let ctx = RuntimeContext::new(Uuid::new_v4(), "mock-model".to_string(), today, 1);

    let runtime = MockAgentRuntime::new();
    let result = runtime.run_session(&ctx, &mut ledger, &open_prices, 10).await.unwrap();

    assert_eq!(result.trade_count, 0);
    assert!(ledger.holdings().is_empty());
    assert!(result.transcript.contains("no price available"));
}

/// PriceCache::prioritise drives which symbols get downloaded first when a
/// rate limit might cut the batch short; this exercises it against a
/// realistic multi-symbol gap the way download_missing would consume it.
#[test]
fn prioritise_picks_highest_impact_symbol_first_for_download_order() {
    let requested = vec![date(2025, 1, 2), date(2025, 1, 3), date(2025, 1, 6)];
    let mut missing = HashMap::new();
    missing.insert("AAPL".to_string(), vec![date(2025, 1, 2), date(2025, 1, 3), date(2025, 1, 6)]);
    missing.insert("MSFT".to_string(), vec![date(2025, 1, 2)]);
    missing.insert("NFLX".to_string(), vec![date(2025, 12, 25)]); // outside requested range: zero impact

    let order = PriceCache::prioritise(&missing, &requested);
    assert_eq!(order, vec!["AAPL".to_string(), "MSFT".to_string()]);
}

/// ScratchConfigHandle isolates concurrent DayExecutor tasks by filename:
/// two (job, model, date) triples never collide, and cleanup removes
/// exactly the file that session wrote.
#[tokio::test]
async fn scratch_config_isolates_concurrent_sessions() {
    let dir = std::env::temp_dir().join(format!("tradesim-test-scratch-{}", Uuid::new_v4()));

    let ctx_a = RuntimeContext::new(Uuid::new_v4(), "model-a".to_string(), date(2025, 1, 1), 1);
    let ctx_b = RuntimeContext::new(Uuid::new_v4(), "model-b".to_string(), date(2025, 1, 1), 2);

    let handle_a = ScratchConfigHandle::write(&dir, &ctx_a).await.unwrap();
    let handle_b = ScratchConfigHandle::write(&dir, &ctx_b).await.unwrap();
    assert_ne!(handle_a.path(), handle_b.path());
    assert!(tokio::fs::metadata(handle_a.path()).await.is_ok());
    assert!(tokio::fs::metadata(handle_b.path()).await.is_ok());

    let path_a = handle_a.path().to_path_buf();
    handle_a.cleanup().await;
    assert!(tokio::fs::metadata(&path_a).await.is_err());
    assert!(tokio::fs::metadata(handle_b.path()).await.is_ok());

    handle_b.cleanup().await;
    tokio::fs::remove_dir_all(&dir).await.ok();
}
