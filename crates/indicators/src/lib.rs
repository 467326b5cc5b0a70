//! Technical indicators computed from candle windows.
//!
//! Every engine is a pure function of its input series (oldest first) and
//! fails with [`InsufficientDataError`] when the series is too short.
//! Rounding for presentation happens only in [`IndicatorBundle`].

pub mod aggregator;
pub mod atr;
pub mod ema;
pub mod macd;
pub mod price;
pub mod rsi;
pub mod sharpe;
pub mod timeframe;
pub mod volume;

pub use aggregator::{compute_indicators, IndicatorBundle};
pub use atr::{atr, true_ranges};
pub use common::InsufficientDataError;
pub use ema::ema;
pub use macd::{macd, macd_line};
pub use price::{mid_price, mid_prices};
pub use rsi::rsi;
pub use sharpe::sharpe_ratio;
pub use timeframe::Timeframe;
pub use volume::{volume_stats, VolumeStats};

/// Round half away from zero to `decimals` places.
///
/// Exact binary ties (e.g. `0.125` at 2 decimals) go up in magnitude rather
/// than to the even digit.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}
