use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sqlx::SqlitePool;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use common::{CandleSource, Config, ExchangeClient, PortfolioStore, TradingMode};
use engine::{
    BinanceClient, DecisionAgent, MarketFileConfig, OpenAiAgent, RunContext, TradingCycle,
};
use paper::PaperClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env();
    info!(mode = %cfg.trading_mode, "Trader starting");

    let markets = MarketFileConfig::load(&cfg.markets_config_path)?.markets;
    let slugs: Vec<&str> = markets.iter().map(|m| m.slug.as_str()).collect();
    info!(markets = ?slugs, "Markets loaded");

    // ── Database ──────────────────────────────────────────────────────────────
    let db = SqlitePool::connect(&cfg.database_url)
        .await
        .with_context(|| format!("failed to connect to database at {}", cfg.database_url))?;
    let store = PortfolioStore::new(db);
    store.migrate().await.context("database migration failed")?;
    info!("Database ready");

    // ── Exchange client (injected based on TRADING_MODE) ──────────────────────
    let binance = Arc::new(BinanceClient::new(
        cfg.binance_api_key.clone(),
        cfg.binance_secret.clone(),
        cfg.binance_testnet,
    )?);
    let source: Arc<dyn CandleSource> = binance.clone();

    let (exchange, starting_capital): (Arc<dyn ExchangeClient>, f64) = match cfg.trading_mode {
        TradingMode::Live => {
            info!(testnet = cfg.binance_testnet, "Live trading mode, using BinanceClient");
            let account = binance
                .account()
                .await
                .context("failed to fetch starting account balance")?;
            (binance as Arc<dyn ExchangeClient>, account.total)
        }
        TradingMode::Paper => {
            info!(slippage_bps = cfg.paper_slippage_bps, "Paper trading mode, using PaperClient");
            let client = PaperClient::new(
                source.clone(),
                cfg.paper_initial_balance,
                cfg.paper_slippage_bps,
                1,
            );
            let client = markets
                .iter()
                .fold(client, |client, m| client.with_leverage(m.symbol.clone(), m.leverage));
            (Arc::new(client) as Arc<dyn ExchangeClient>, cfg.paper_initial_balance)
        }
    };

    // ── Decision agent ────────────────────────────────────────────────────────
    let agent: Arc<dyn DecisionAgent> = Arc::new(OpenAiAgent::new(
        cfg.openai_api_key.clone(),
        cfg.llm_base_url.clone(),
        cfg.llm_model.clone(),
        cfg.llm_temperature,
    )?);

    // ── Portfolio API ─────────────────────────────────────────────────────────
    let api_state = api::AppState {
        store: store.clone(),
        trading_mode: cfg.trading_mode,
    };
    let port = cfg.api_port;
    let origins = cfg.allowed_origins.clone();
    tokio::spawn(async move {
        if let Err(e) = api::serve(api_state, port, &origins).await {
            error!(error = %e, "API server stopped");
        }
    });

    // ── Trading loop ──────────────────────────────────────────────────────────
    let cycle = TradingCycle::new(source, exchange, store, agent, markets, starting_capital);
    let mut ctx = RunContext::new();
    let interval = Duration::from_secs(cfg.invocation_interval_secs);

    cycle
        .run(&mut ctx, interval, async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await;

    info!(
        invocations = ctx.invocation_count,
        uptime_secs = (chrono::Utc::now() - ctx.started_at).num_seconds(),
        "Trader stopped"
    );
    Ok(())
}
