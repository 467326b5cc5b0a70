use async_trait::async_trait;

use crate::{AccountSummary, Candle, Fill, Interval, Position, PositionSide, Result};

/// Supplier of OHLCV candles.
///
/// Implementations must return candles oldest first; callers never sort.
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// Fetch at most `window_size` of the most recent candles for `symbol`.
    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: Interval,
        window_size: usize,
    ) -> Result<Vec<Candle>>;
}

/// Account queries and order execution.
///
/// `BinanceClient` implements this for live trading.
/// `PaperClient` implements this for simulation.
///
/// Only the trading tools handed to the decision agent place orders.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Wallet and available balance.
    async fn account(&self) -> Result<AccountSummary>;

    /// Positions with a non-zero size.
    async fn open_positions(&self) -> Result<Vec<Position>>;

    /// Close of the newest one-minute candle.
    async fn latest_price(&self, symbol: &str) -> Result<f64>;

    /// Open a position with a market order.
    async fn open_position(&self, symbol: &str, side: PositionSide, quantity: f64) -> Result<Fill>;

    /// Flatten every open position. Returns one fill per closed position.
    async fn close_all_positions(&self) -> Result<Vec<Fill>>;

    /// Current open interest in contracts, when the venue reports it.
    async fn open_interest(&self, symbol: &str) -> Result<Option<f64>>;
}
