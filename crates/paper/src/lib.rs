use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use common::{
    AccountSummary, CandleSource, Error, ExchangeClient, Fill, Interval, OrderSide, Position,
    PositionSide, Result,
};

#[derive(Debug, Clone)]
struct PaperPosition {
    symbol: String,
    side: PositionSide,
    quantity: f64,
    entry_price: f64,
    margin: f64,
    leverage: u32,
}

impl PaperPosition {
    fn pnl_at(&self, price: f64) -> f64 {
        match self.side {
            PositionSide::Long => (price - self.entry_price) * self.quantity,
            PositionSide::Short => (self.entry_price - price) * self.quantity,
        }
    }

    /// Price at which the posted margin is fully lost.
    fn liquidation_price(&self) -> f64 {
        let move_pct = 1.0 / self.leverage as f64;
        match self.side {
            PositionSide::Long => self.entry_price * (1.0 - move_pct),
            PositionSide::Short => self.entry_price * (1.0 + move_pct),
        }
    }
}

#[derive(Debug, Default)]
struct Ledger {
    /// Wallet balance: initial funds plus realized PnL.
    balance: f64,
    positions: Vec<PaperPosition>,
    realized: HashMap<String, f64>,
}

impl Ledger {
    fn margin_used(&self) -> f64 {
        self.positions.iter().map(|p| p.margin).sum()
    }
}

/// Simulated futures account for paper trading.
///
/// Prices come from the same candle source the indicators use; fills are taken
/// at the latest 1m close with configurable slippage. Nothing is ever sent to
/// the exchange.
pub struct PaperClient {
    source: Arc<dyn CandleSource>,
    ledger: Arc<RwLock<Ledger>>,
    /// Slippage in basis points applied to all fills.
    slippage_bps: f64,
    default_leverage: u32,
    leverage: HashMap<String, u32>,
}

impl PaperClient {
    pub fn new(
        source: Arc<dyn CandleSource>,
        initial_balance: f64,
        slippage_bps: f64,
        default_leverage: u32,
    ) -> Self {
        info!(
            balance = initial_balance,
            slippage_bps = slippage_bps,
            "PaperClient initialized"
        );
        Self {
            source,
            ledger: Arc::new(RwLock::new(Ledger {
                balance: initial_balance,
                ..Default::default()
            })),
            slippage_bps,
            default_leverage: default_leverage.max(1),
            leverage: HashMap::new(),
        }
    }

    /// Override the leverage used for one symbol.
    pub fn with_leverage(mut self, symbol: impl Into<String>, leverage: u32) -> Self {
        self.leverage.insert(symbol.into(), leverage.max(1));
        self
    }

    fn leverage_for(&self, symbol: &str) -> u32 {
        self.leverage
            .get(symbol)
            .copied()
            .unwrap_or(self.default_leverage)
    }

    /// Buys pay more, sells receive less.
    fn slipped(&self, price: f64, side: OrderSide) -> f64 {
        match side {
            OrderSide::Buy => price * (1.0 + self.slippage_bps / 10_000.0),
            OrderSide::Sell => price * (1.0 - self.slippage_bps / 10_000.0),
        }
    }

    async fn prices_for(&self, positions: &[PaperPosition]) -> Result<HashMap<String, f64>> {
        let mut prices = HashMap::new();
        for p in positions {
            if !prices.contains_key(&p.symbol) {
                prices.insert(p.symbol.clone(), self.latest_price(&p.symbol).await?);
            }
        }
        Ok(prices)
    }

    fn fill(symbol: &str, side: OrderSide, price: f64, quantity: f64) -> Fill {
        Fill {
            order_id: uuid::Uuid::new_v4().to_string(),
            symbol: symbol.to_string(),
            side,
            price,
            quantity,
            timestamp: Utc::now(),
        }
    }
}

#[async_trait]
impl ExchangeClient for PaperClient {
    async fn account(&self) -> Result<AccountSummary> {
        let positions = self.ledger.read().await.positions.clone();
        let prices = self.prices_for(&positions).await?;

        let ledger = self.ledger.read().await;
        let unrealized: f64 = ledger
            .positions
            .iter()
            .filter_map(|p| prices.get(&p.symbol).map(|&price| p.pnl_at(price)))
            .sum();

        Ok(AccountSummary {
            total: ledger.balance + unrealized,
            available: ledger.balance - ledger.margin_used(),
        })
    }

    async fn open_positions(&self) -> Result<Vec<Position>> {
        let positions = self.ledger.read().await.positions.clone();
        let prices = self.prices_for(&positions).await?;
        let ledger = self.ledger.read().await;

        Ok(positions
            .iter()
            .map(|p| Position {
                symbol: p.symbol.clone(),
                side: p.side,
                quantity: p.quantity,
                entry_price: p.entry_price,
                unrealized_pnl: prices.get(&p.symbol).map_or(0.0, |&price| p.pnl_at(price)),
                realized_pnl: ledger.realized.get(&p.symbol).copied().unwrap_or(0.0),
                liquidation_price: p.liquidation_price(),
            })
            .collect())
    }

    async fn latest_price(&self, symbol: &str) -> Result<f64> {
        let candles = self
            .source
            .fetch_candles(symbol, Interval::OneMinute, 1)
            .await?;
        candles
            .last()
            .map(|c| c.close)
            .ok_or_else(|| Error::Exchange(format!("no latest price found for {symbol}")))
    }

    async fn open_position(&self, symbol: &str, side: PositionSide, quantity: f64) -> Result<Fill> {
        if !(quantity > 0.0) {
            return Err(Error::Exchange(format!(
                "quantity must be positive, got {quantity}"
            )));
        }

        let mid = self.latest_price(symbol).await?;
        let order_side = side.opening_side();
        let price = self.slipped(mid, order_side);
        let leverage = self.leverage_for(symbol);
        let margin = price * quantity / leverage as f64;

        let mut ledger = self.ledger.write().await;
        let available = ledger.balance - ledger.margin_used();
        if margin > available {
            return Err(Error::Exchange(format!(
                "insufficient margin: required {margin:.2}, available {available:.2}"
            )));
        }

        match ledger.positions.iter_mut().find(|p| p.symbol == symbol) {
            Some(existing) if existing.side != side => {
                return Err(Error::Exchange(format!(
                    "{symbol} already has an open {} position",
                    existing.side
                )));
            }
            Some(existing) => {
                let total_qty = existing.quantity + quantity;
                existing.entry_price =
                    (existing.entry_price * existing.quantity + price * quantity) / total_qty;
                existing.quantity = total_qty;
                existing.margin += margin;
            }
            None => ledger.positions.push(PaperPosition {
                symbol: symbol.to_string(),
                side,
                quantity,
                entry_price: price,
                margin,
                leverage,
            }),
        }

        debug!(
            symbol,
            side = %side,
            mid,
            fill = price,
            qty = quantity,
            margin,
            "Paper fill simulated"
        );
        Ok(Self::fill(symbol, order_side, price, quantity))
    }

    async fn close_all_positions(&self) -> Result<Vec<Fill>> {
        let positions = self.ledger.read().await.positions.clone();
        if positions.is_empty() {
            return Ok(Vec::new());
        }
        let prices = self.prices_for(&positions).await?;

        let mut ledger = self.ledger.write().await;
        let mut fills = Vec::with_capacity(positions.len());
        for p in std::mem::take(&mut ledger.positions) {
            let order_side = p.side.closing_side();
            let mid = prices.get(&p.symbol).copied().unwrap_or(p.entry_price);
            let price = self.slipped(mid, order_side);
            let pnl = p.pnl_at(price);

            ledger.balance += pnl;
            *ledger.realized.entry(p.symbol.clone()).or_insert(0.0) += pnl;
            info!(
                symbol = %p.symbol,
                side = %p.side,
                qty = p.quantity,
                pnl,
                "Paper position closed"
            );
            fills.push(Self::fill(&p.symbol, order_side, price, p.quantity));
        }
        Ok(fills)
    }

    async fn open_interest(&self, _symbol: &str) -> Result<Option<f64>> {
        Ok(None)
    }
}
