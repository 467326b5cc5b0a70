use common::Candle;

use crate::round_to;

/// Midpoint of open and close, rounded to 3 decimals.
pub fn mid_price(candle: &Candle) -> f64 {
    round_to((candle.open + candle.close) / 2.0, 3)
}

pub fn mid_prices(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(mid_price).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mid_price_of_open_and_close() {
        let candle = Candle::new(100.0, 103.0, 99.0, 102.0, 1.0);
        assert_eq!(mid_price(&candle), 101.0);
    }

    #[test]
    fn mid_price_rounds_to_three_decimals() {
        let candle = Candle::new(1.0001, 1.0, 1.0, 1.0002, 1.0);
        assert_eq!(mid_price(&candle), 1.0);
    }

    #[test]
    fn mid_prices_keep_length() {
        let candles = vec![Candle::new(1.0, 1.0, 1.0, 3.0, 1.0); 7];
        assert_eq!(mid_prices(&candles), vec![2.0; 7]);
        assert!(mid_prices(&[]).is_empty());
    }
}
