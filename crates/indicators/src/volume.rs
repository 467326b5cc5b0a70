use serde::Serialize;

use common::{Candle, InsufficientDataError};

/// Latest volume against its trailing average.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VolumeStats {
    pub current: f64,
    pub average: f64,
}

/// Volume of the newest candle and the mean volume of the last
/// `min(period, candles.len())` candles. Fewer than `period` candles is
/// not an error; the average simply covers what is available.
pub fn volume_stats(
    candles: &[Candle],
    period: usize,
) -> Result<VolumeStats, InsufficientDataError> {
    let Some(last) = candles.last() else {
        return Err(InsufficientDataError::new("volume", 1, 0));
    };

    let lookback = period.max(1).min(candles.len());
    let window = &candles[candles.len() - lookback..];
    let average = window.iter().map(|c| c.volume).sum::<f64>() / lookback as f64;

    Ok(VolumeStats {
        current: last.volume,
        average,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_volumes(volumes: &[f64]) -> Vec<Candle> {
        volumes
            .iter()
            .map(|&v| Candle::new(1.0, 1.0, 1.0, 1.0, v))
            .collect()
    }

    #[test]
    fn empty_window_fails() {
        let err = volume_stats(&[], 20).unwrap_err();
        assert_eq!(err.required, 1);
        assert_eq!(err.available, 0);
    }

    #[test]
    fn short_window_averages_everything() {
        let stats = volume_stats(&with_volumes(&[1.0, 2.0, 3.0, 4.0, 5.0]), 20).unwrap();
        assert_eq!(stats.current, 5.0);
        assert_eq!(stats.average, 3.0);
    }

    #[test]
    fn long_window_averages_trailing_period() {
        let stats = volume_stats(&with_volumes(&[100.0, 100.0, 1.0, 2.0, 3.0]), 3).unwrap();
        assert_eq!(stats.current, 3.0);
        assert_eq!(stats.average, 2.0);
    }
}
