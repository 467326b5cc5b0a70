use serde::Serialize;
use tracing::debug;

use common::{Candle, CandleSource, InsufficientDataError, Result};

use crate::{atr, ema, macd, mid_prices, round_to, rsi, volume_stats, Timeframe};

pub const EMA_PERIOD: usize = 20;
pub const RSI_SHORT_PERIOD: usize = 7;
pub const RSI_LONG_PERIOD: usize = 14;
pub const ATR_SHORT_PERIOD: usize = 3;
pub const ATR_LONG_PERIOD: usize = 14;
pub const VOLUME_LOOKBACK: usize = 20;

/// Number of newest values kept from every series.
pub const SERIES_TAIL: usize = 10;

const PRICE_DECIMALS: u32 = 3;
const RSI_DECIMALS: u32 = 2;

/// Candles each indicator needs, checked largest first.
const REQUIREMENTS: [(&str, usize); 7] = [
    ("MACD", 26),
    ("EMA(20)", EMA_PERIOD),
    ("RSI(14)", RSI_LONG_PERIOD + 1),
    ("ATR(14)", ATR_LONG_PERIOD + 1),
    ("RSI(7)", RSI_SHORT_PERIOD + 1),
    ("ATR(3)", ATR_SHORT_PERIOD + 1),
    ("volume", 1),
];

/// Indicators for one (symbol, timeframe) pair, trimmed and rounded for display.
/// Every series is ordered oldest to newest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorBundle {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub mid_prices: Vec<f64>,
    pub ema20: Vec<f64>,
    pub macd: Vec<f64>,
    pub rsi7: Vec<f64>,
    pub rsi14: Vec<f64>,
    pub atr3: Vec<f64>,
    pub atr14: Vec<f64>,
    pub current_volume: f64,
    pub average_volume: f64,
}

impl IndicatorBundle {
    /// Compute every indicator over an already-fetched candle window.
    pub fn from_candles(
        symbol: impl Into<String>,
        timeframe: Timeframe,
        candles: &[Candle],
    ) -> Result<Self, InsufficientDataError> {
        ensure_enough_candles(candles.len())?;

        let mids = mid_prices(candles);
        let ema20 = ema(&mids, EMA_PERIOD)?;
        let macd = macd(&mids)?;
        let rsi7 = rsi(&mids, RSI_SHORT_PERIOD)?;
        let rsi14 = rsi(&mids, RSI_LONG_PERIOD)?;
        let atr3 = atr(candles, ATR_SHORT_PERIOD)?;
        let atr14 = atr(candles, ATR_LONG_PERIOD)?;
        let volume = volume_stats(candles, VOLUME_LOOKBACK)?;

        Ok(Self {
            symbol: symbol.into(),
            timeframe,
            mid_prices: present(&mids, PRICE_DECIMALS),
            ema20: present(&ema20, PRICE_DECIMALS),
            macd: present(&macd, PRICE_DECIMALS),
            rsi7: present(&rsi7, RSI_DECIMALS),
            rsi14: present(&rsi14, RSI_DECIMALS),
            atr3: present(&atr3, PRICE_DECIMALS),
            atr14: present(&atr14, PRICE_DECIMALS),
            current_volume: round_to(volume.current, PRICE_DECIMALS),
            average_volume: round_to(volume.average, PRICE_DECIMALS),
        })
    }
}

/// Fetch the candle window for `timeframe` and compute the indicator bundle.
///
/// Insufficient data propagates to the caller, which decides whether to skip
/// the cycle.
pub async fn compute_indicators(
    source: &dyn CandleSource,
    timeframe: Timeframe,
    symbol: &str,
) -> Result<IndicatorBundle> {
    let candles = source
        .fetch_candles(symbol, timeframe.interval(), timeframe.window_size())
        .await?;

    let bundle = IndicatorBundle::from_candles(symbol, timeframe, &candles)?;
    debug!(
        symbol,
        timeframe = %timeframe,
        candles = candles.len(),
        "Indicators computed"
    );
    Ok(bundle)
}

fn ensure_enough_candles(available: usize) -> Result<(), InsufficientDataError> {
    for (indicator, required) in REQUIREMENTS {
        if available < required {
            return Err(InsufficientDataError::new(indicator, required, available));
        }
    }
    Ok(())
}

/// Newest `SERIES_TAIL` values, rounded.
fn present(series: &[f64], decimals: u32) -> Vec<f64> {
    let start = series.len().saturating_sub(SERIES_TAIL);
    series[start..].iter().map(|&v| round_to(v, decimals)).collect()
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use common::{Error, Interval};

    use super::*;

    /// Uptrend where every candle closes one unit above the previous one.
    fn uptrend(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| {
                let close = 100.0 + i as f64;
                Candle::new(close - 0.5, close + 0.5, close - 1.0, close, 10.0 + i as f64)
            })
            .collect()
    }

    struct FixedSource {
        candles: Vec<Candle>,
    }

    #[async_trait]
    impl CandleSource for FixedSource {
        async fn fetch_candles(
            &self,
            _symbol: &str,
            _interval: Interval,
            window_size: usize,
        ) -> Result<Vec<Candle>> {
            let start = self.candles.len().saturating_sub(window_size);
            Ok(self.candles[start..].to_vec())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl CandleSource for FailingSource {
        async fn fetch_candles(&self, _: &str, _: Interval, _: usize) -> Result<Vec<Candle>> {
            Err(Error::Exchange("unreachable".into()))
        }
    }

    #[test]
    fn short_window_names_the_failing_indicator() {
        let err = IndicatorBundle::from_candles("ETHUSDT", Timeframe::Intraday, &uptrend(20))
            .unwrap_err();
        assert_eq!(err.indicator, "MACD");
        assert_eq!(err.required, 26);
        assert_eq!(err.available, 20);
    }

    #[test]
    fn series_are_trimmed_to_ten_values() {
        let bundle =
            IndicatorBundle::from_candles("ETHUSDT", Timeframe::Intraday, &uptrend(40)).unwrap();
        assert_eq!(bundle.mid_prices.len(), SERIES_TAIL);
        assert_eq!(bundle.ema20.len(), SERIES_TAIL);
        assert_eq!(bundle.macd.len(), SERIES_TAIL);
        assert_eq!(bundle.rsi7.len(), SERIES_TAIL);
        assert_eq!(bundle.rsi14.len(), SERIES_TAIL);
        assert_eq!(bundle.atr3.len(), SERIES_TAIL);
        assert_eq!(bundle.atr14.len(), SERIES_TAIL);
        assert_eq!(*bundle.mid_prices.last().unwrap(), 138.75);
    }

    #[test]
    fn shorter_series_are_kept_whole() {
        // 26 candles → one MACD value
        let bundle =
            IndicatorBundle::from_candles("ETHUSDT", Timeframe::LongTerm, &uptrend(26)).unwrap();
        assert_eq!(bundle.macd.len(), 1);
        assert_eq!(bundle.ema20.len(), 7);
    }

    #[test]
    fn values_are_rounded_for_display() {
        let bundle =
            IndicatorBundle::from_candles("ETHUSDT", Timeframe::Intraday, &uptrend(40)).unwrap();
        let is_rounded = |v: f64, d: u32| (round_to(v, d) - v).abs() < 1e-12;
        assert!(bundle.ema20.iter().all(|&v| is_rounded(v, 3)));
        assert!(bundle.macd.iter().all(|&v| is_rounded(v, 3)));
        assert!(bundle.atr14.iter().all(|&v| is_rounded(v, 3)));
        assert!(bundle.rsi14.iter().all(|&v| is_rounded(v, 2)));
        assert!(is_rounded(bundle.average_volume, 3));
    }

    #[test]
    fn volume_uses_trailing_average() {
        let bundle =
            IndicatorBundle::from_candles("ETHUSDT", Timeframe::Intraday, &uptrend(30)).unwrap();
        // volumes 10..=39, last 20 are 20..=39
        assert_eq!(bundle.current_volume, 39.0);
        assert_eq!(bundle.average_volume, 29.5);
    }

    #[tokio::test]
    async fn uptrend_produces_bullish_bundle() {
        let source = FixedSource { candles: uptrend(30) };
        let bundle = compute_indicators(&source, Timeframe::Intraday, "ETHUSDT")
            .await
            .unwrap();

        assert_eq!(bundle.symbol, "ETHUSDT");
        assert_eq!(bundle.timeframe, Timeframe::Intraday);
        assert!(bundle.ema20.windows(2).all(|w| w[1] > w[0]));
        assert!(bundle.macd.iter().all(|&v| v > 0.0));
        assert!(bundle.rsi14.iter().all(|&v| v == 100.0));
    }

    #[tokio::test]
    async fn insufficient_data_propagates_from_aggregator() {
        let source = FixedSource { candles: uptrend(10) };
        let err = compute_indicators(&source, Timeframe::LongTerm, "ETHUSDT")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientData(InsufficientDataError { required: 26, available: 10, .. })
        ));
    }

    #[tokio::test]
    async fn source_errors_propagate() {
        let err = compute_indicators(&FailingSource, Timeframe::Intraday, "ETHUSDT")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Exchange(_)));
    }
}
