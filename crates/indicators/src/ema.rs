use common::InsufficientDataError;

/// Exponential Moving Average over `series` (oldest first).
///
/// The first output is the simple average of the first `period` values; each
/// remaining input then advances `ema = prev * (1 - k) + value * k` with
/// `k = 2 / (period + 1)`. Output length is `series.len() - period + 1`.
pub fn ema(series: &[f64], period: usize) -> Result<Vec<f64>, InsufficientDataError> {
    if period == 0 || series.len() < period {
        return Err(InsufficientDataError::new(
            format!("EMA({period})"),
            period.max(1),
            series.len(),
        ));
    }

    let k = 2.0 / (period as f64 + 1.0);
    let seed = series[..period].iter().sum::<f64>() / period as f64;

    let mut values = Vec::with_capacity(series.len() - period + 1);
    values.push(seed);

    let mut prev = seed;
    for &value in &series[period..] {
        prev = prev * (1.0 - k) + value * k;
        values.push(prev);
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ema_fails_below_period() {
        let err = ema(&[1.0, 2.0], 3).unwrap_err();
        assert_eq!(err.indicator, "EMA(3)");
        assert_eq!(err.required, 3);
        assert_eq!(err.available, 2);
    }

    #[test]
    fn ema_rejects_zero_period() {
        assert!(ema(&[1.0, 2.0, 3.0], 0).is_err());
    }

    #[test]
    fn ema_exact_period_is_simple_average() {
        let values = ema(&[2.0, 4.0, 6.0], 3).unwrap();
        assert_eq!(values, vec![4.0]);
    }

    #[test]
    fn ema_known_values() {
        // k = 0.5 for period 3
        let values = ema(&[10.0, 20.0, 30.0, 40.0, 50.0], 3).unwrap();
        assert_eq!(values.len(), 3);
        assert!((values[0] - 20.0).abs() < 1e-9);
        assert!((values[1] - 30.0).abs() < 1e-9);
        assert!((values[2] - 40.0).abs() < 1e-9);
    }

    #[test]
    fn ema_of_constant_series_is_constant() {
        let values = ema(&[7.5; 30], 12).unwrap();
        assert_eq!(values.len(), 19);
        assert!(values.iter().all(|v| (v - 7.5).abs() < 1e-12));
    }
}
