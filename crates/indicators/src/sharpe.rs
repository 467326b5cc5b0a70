use crate::round_to;

/// Each portfolio sample is treated as one trading day.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

const ZERO_VOLATILITY_EPSILON: f64 = 1e-12;

/// Sharpe ratio of a portfolio-value series (oldest first), rounded to 3 decimals.
///
/// Periods whose starting value is zero are skipped rather than counted as a
/// zero return. Short histories and zero volatility are expected early in a
/// run and yield `0.0` instead of an error.
pub fn sharpe_ratio(values: &[f64], risk_free_rate: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }

    let returns: Vec<f64> = values
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect();

    if returns.len() < 2 {
        return 0.0;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let std_dev = variance.sqrt();

    // Constant-growth histories leave float noise in the returns; treat it as zero.
    if std_dev <= ZERO_VOLATILITY_EPSILON * mean.abs().max(1.0) {
        return 0.0;
    }

    let daily_rf = risk_free_rate / TRADING_DAYS_PER_YEAR;
    round_to((mean - daily_rf) / std_dev, 3)
}
