use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use common::{CandleSource, ExchangeClient, PortfolioSnapshot, PortfolioStore, Result};
use indicators::{compute_indicators, sharpe_ratio, Timeframe};

use crate::prompt::{self, PromptContext, INSTRUCTION};
use crate::{AgentMessage, DecisionAgent, Market, TradingTools};

/// Per-process run state, threaded through every cycle.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub invocation_count: u64,
    pub started_at: DateTime<Utc>,
}

impl RunContext {
    pub fn new() -> Self {
        Self {
            invocation_count: 0,
            started_at: Utc::now(),
        }
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of one completed invocation.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub invocation_count: u64,
    pub snapshot: PortfolioSnapshot,
    pub open_positions: usize,
    pub sharpe_ratio: f64,
    pub prompt: String,
    pub messages: Vec<AgentMessage>,
}

/// Gathers market state, asks the agent for a decision and records the portfolio.
pub struct TradingCycle {
    source: Arc<dyn CandleSource>,
    exchange: Arc<dyn ExchangeClient>,
    store: PortfolioStore,
    agent: Arc<dyn DecisionAgent>,
    markets: Vec<Market>,
    starting_capital: f64,
}

impl TradingCycle {
    pub fn new(
        source: Arc<dyn CandleSource>,
        exchange: Arc<dyn ExchangeClient>,
        store: PortfolioStore,
        agent: Arc<dyn DecisionAgent>,
        markets: Vec<Market>,
        starting_capital: f64,
    ) -> Self {
        Self {
            source,
            exchange,
            store,
            agent,
            markets,
            starting_capital,
        }
    }

    async fn market_data(&self, market: &Market) -> Result<String> {
        let source = self.source.as_ref();
        let (intraday, long_term) = tokio::try_join!(
            compute_indicators(source, Timeframe::Intraday, &market.symbol),
            compute_indicators(source, Timeframe::LongTerm, &market.symbol),
        )?;

        let open_interest = match self.exchange.open_interest(&market.symbol).await {
            Ok(oi) => oi,
            Err(e) => {
                warn!(symbol = %market.symbol, error = %e, "Open interest unavailable");
                None
            }
        };

        Ok(prompt::market_section(market, &intraday, &long_term, open_interest))
    }

    async fn sharpe(&self) -> f64 {
        match self.store.totals().await {
            Ok(totals) => sharpe_ratio(&totals, 0.0),
            Err(e) => {
                warn!(error = %e, "Could not load portfolio history for Sharpe ratio");
                0.0
            }
        }
    }

    /// Run a single invocation.
    pub async fn run_once(&self, ctx: &mut RunContext) -> Result<CycleReport> {
        ctx.invocation_count += 1;
        info!(invocation = ctx.invocation_count, "Trading cycle started");

        let mut indicator_data = String::new();
        for market in &self.markets {
            indicator_data.push_str(&self.market_data(market).await?);
            indicator_data.push('\n');
        }

        let account = self.exchange.account().await?;
        let snapshot = PortfolioSnapshot::now(account);
        match self.store.save(&snapshot).await {
            Ok(()) => info!(
                total = account.total,
                available = account.available,
                "Portfolio snapshot saved"
            ),
            Err(e) => warn!(error = %e, "Failed to save portfolio snapshot"),
        }

        let positions = match self.exchange.open_positions().await {
            Ok(positions) => positions,
            Err(e) => {
                warn!(error = %e, "Failed to fetch open positions");
                Vec::new()
            }
        };

        let sharpe_ratio = self.sharpe().await;
        let system_prompt = prompt::agent_prompt(&PromptContext {
            invocation_count: ctx.invocation_count,
            starting_capital: self.starting_capital,
            markets: &self.markets,
            positions: &positions,
            account: &account,
            sharpe_ratio,
            indicator_data: &indicator_data,
        });

        let tools = TradingTools::new(self.exchange.clone());
        let messages = self.agent.decide(&system_prompt, INSTRUCTION, &tools).await?;

        if let Some(last) = messages.last().and_then(|m| m.content.as_deref()) {
            info!(response = last, "Agent response");
        }

        Ok(CycleReport {
            invocation_count: ctx.invocation_count,
            snapshot,
            open_positions: positions.len(),
            sharpe_ratio,
            prompt: system_prompt,
            messages,
        })
    }

    /// Run cycles every `interval` until `shutdown` resolves.
    ///
    /// A failed cycle is logged and retried after the same interval. Shutdown
    /// is only observed between cycles: a cycle that has started always runs
    /// to completion, so orders the agent placed are logged and recorded.
    pub async fn run(
        &self,
        ctx: &mut RunContext,
        interval: Duration,
        shutdown: impl Future<Output = ()>,
    ) {
        tokio::pin!(shutdown);
        info!(
            interval_secs = interval.as_secs(),
            markets = self.markets.len(),
            "Trading loop started"
        );

        loop {
            let result = self.run_once(ctx).await;
            match result {
                Ok(report) => info!(
                    invocation = report.invocation_count,
                    total = report.snapshot.total,
                    "Trading cycle finished"
                ),
                Err(e) => error!(
                    invocation = ctx.invocation_count,
                    error = %e,
                    "Trading cycle failed"
                ),
            }

            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        info!(invocations = ctx.invocation_count, "Trading loop stopped");
    }
}
