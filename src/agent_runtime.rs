use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::time::{sleep, Duration};

use crate::ledger::Ledger;
use crate::runtime_context::RuntimeContext;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("agent step limit exceeded without a finish signal")]
    StepLimitExceeded,
    #[error("agent transport failure: {0}")]
    Transport(String),
}

/// One step of an agent session: the tool it invoked and the outcome the
/// dispatcher fed back, kept for the transcript and the statistical summary
/// fallback.
#[derive(Debug, Clone, Serialize)]
pub struct AgentStep {
    pub tool: String,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentSessionResult {
    pub steps: Vec<AgentStep>,
    pub trade_count: usize,
    pub transcript: String,
}

/// The orchestrator's only dependency on an LLM: run one trading session
/// against `ledger`, bounded by `max_steps`, and return what happened.
/// Implementations drive the ledger's `buy`/`sell` directly rather than
/// returning intents, mirroring the original's tool-dispatch loop where the
/// model's tool calls mutate portfolio state as a side effect.
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    async fn run_session(
        &self,
        ctx: &RuntimeContext,
        ledger: &mut Ledger,
        open_prices: &HashMap<String, f64>,
        max_steps: u32,
    ) -> Result<AgentSessionResult, AgentError>;
}

/// Retries `run_session` up to `max_retries` times with `base_delay * 2^attempt`
/// backoff on transport failures, matching `model_day_executor.py`'s
/// `_initialize_agent` defaults (max_retries=3, base_delay=0.5s).
#[allow(clippy::too_many_arguments)]
pub async fn run_with_retry(
    runtime: &dyn AgentRuntime,
    ctx: &RuntimeContext,
    ledger: &mut Ledger,
    open_prices: &HashMap<String, f64>,
    max_steps: u32,
    max_retries: u32,
    base_delay: Duration,
) -> Result<AgentSessionResult, AgentError> {
    let mut attempt = 0;
    loop {
        match runtime.run_session(ctx, ledger, open_prices, max_steps).await {
            Ok(result) => return Ok(result),
            Err(AgentError::Transport(msg)) if attempt + 1 < max_retries => {
                tracing::warn!(attempt, error = %msg, "agent session failed, retrying");
                sleep(base_delay * 2_u32.pow(attempt)).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Deterministic dev-mode stand-in: rotates through a fixed stock list keyed
/// off the calendar date and buys a small, fixed quantity, so Scenario-style
/// runs are assertable without a real model call.
pub struct MockAgentRuntime {
    rotation: Vec<String>,
    buy_quantity: i64,
}

impl MockAgentRuntime {
    pub fn new() -> Self {
        Self {
            rotation: vec![
                "AAPL", "MSFT", "GOOGL", "AMZN", "NVDA", "META", "TSLA", "BRK.B", "UNH", "JNJ",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            buy_quantity: 5,
        }
    }
}

impl Default for MockAgentRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentRuntime for MockAgentRuntime {
    async fn run_session(
        &self,
        ctx: &RuntimeContext,
        ledger: &mut Ledger,
        open_prices: &HashMap<String, f64>,
        _max_steps: u32,
    ) -> Result<AgentSessionResult, AgentError> {
        let epoch = chrono::NaiveDate::from_ymd_opt(2025, 1, 1).expect("valid epoch");
        let day_offset = (ctx.date - epoch).num_days().rem_euclid(self.rotation.len() as i64);
        let symbol = &self.rotation[day_offset as usize];

        let mut steps = vec![AgentStep {
            tool: "tool_get_price".to_string(),
            detail: format!("checked price for {symbol}"),
        }];

        let detail = if let Some(open) = open_prices.get(symbol) {
            match ledger.buy(symbol, self.buy_quantity, *open) {
                Ok(_) => format!("bought {} {}", self.buy_quantity, symbol),
                Err(err) => format!("buy skipped: {err}"),
            }
        } else {
            format!("no price available for {symbol}, skipped")
        };
        steps.push(AgentStep {
            tool: "tool_trade".to_string(),
            detail,
        });

        let transcript = steps
            .iter()
            .map(|s| format!("[{}] {}", s.tool, s.detail))
            .collect::<Vec<_>>()
            .join("\n");

        Ok(AgentSessionResult {
            trade_count: ledger.trade_count(),
            steps,
            transcript,
        })
    }
}
