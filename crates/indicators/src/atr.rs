// Average True Range.
//
// True Range for each candle after the first:
//   TR = max(H - L, |H - prevClose|, |L - prevClose|)
//
// ATR is the EMA of the TR series, so `period + 1` candles are needed to
// produce one value.

use common::{Candle, InsufficientDataError};

use crate::ema::ema;

/// True range of every candle from index 1 onward. Length is `candles.len() - 1`.
pub fn true_ranges(candles: &[Candle]) -> Vec<f64> {
    candles
        .windows(2)
        .map(|w| {
            let prev_close = w[0].close;
            let c = &w[1];
            let hl = c.high - c.low;
            let hc = (c.high - prev_close).abs();
            let lc = (c.low - prev_close).abs();
            hl.max(hc).max(lc)
        })
        .collect()
}

/// ATR over `candles` (oldest first). Output length is `candles.len() - period`.
pub fn atr(candles: &[Candle], period: usize) -> Result<Vec<f64>, InsufficientDataError> {
    if period == 0 || candles.len() < period + 1 {
        return Err(InsufficientDataError::new(
            format!("ATR({period})"),
            period + 1,
            candles.len(),
        ));
    }
    ema(&true_ranges(candles), period)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle::new(open, high, low, close, 100.0)
    }

    #[test]
    fn atr_insufficient_data() {
        // Need period + 1 = 15 candles for period=14, only have 14.
        let candles = vec![candle(100.0, 105.0, 95.0, 102.0); 14];
        let err = atr(&candles, 14).unwrap_err();
        assert_eq!(err.indicator, "ATR(14)");
        assert_eq!(err.required, 15);
        assert_eq!(err.available, 14);
    }

    #[test]
    fn true_range_picks_largest_move() {
        let candles = vec![
            candle(100.0, 101.0, 99.0, 100.0),
            // range 2, gap up to 110 from 100 → 10
            candle(108.0, 110.0, 108.0, 109.0),
            // range 1, gap down from 109 to 100 → 9
            candle(101.0, 101.0, 100.0, 100.5),
        ];
        assert_eq!(true_ranges(&candles), vec![10.0, 9.0]);
    }

    #[test]
    fn atr_exact_minimum_data() {
        // period=3, need 4 candles to get 3 TR values.
        let candles = vec![
            candle(100.0, 102.0, 98.0, 101.0),
            candle(101.0, 104.0, 99.0, 103.0),
            candle(103.0, 106.0, 100.0, 105.0),
            candle(105.0, 108.0, 102.0, 107.0),
        ];
        let values = atr(&candles, 3).unwrap();
        assert_eq!(values.len(), 1);
        // TRs: 5, 6, 6
        assert!((values[0] - 17.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn atr_flat_market_is_zero() {
        let candles = vec![candle(50.0, 50.0, 50.0, 50.0); 20];
        let values = atr(&candles, 14).unwrap();
        assert_eq!(values.len(), 6);
        assert!(values.iter().all(|&v| v == 0.0));
    }
}
