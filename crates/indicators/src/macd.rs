//! MACD (Moving Average Convergence/Divergence) line.
//!
//! MACD = EMA(fast) − EMA(slow), with both EMAs aligned on their newest
//! values: the longer series loses its oldest entries.

use common::InsufficientDataError;

use crate::ema::ema;

pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;

/// Standard 12/26 MACD line. Output length is `series.len() - 25`.
pub fn macd(series: &[f64]) -> Result<Vec<f64>, InsufficientDataError> {
    macd_line(series, MACD_FAST, MACD_SLOW)
}

/// MACD line for arbitrary fast/slow periods.
pub fn macd_line(
    series: &[f64],
    fast: usize,
    slow: usize,
) -> Result<Vec<f64>, InsufficientDataError> {
    // Slow first so a short series reports the larger requirement.
    let slow_ema = ema(series, slow)?;
    let fast_ema = ema(series, fast)?;

    let len = slow_ema.len().min(fast_ema.len());
    let fast_tail = &fast_ema[fast_ema.len() - len..];
    let slow_tail = &slow_ema[slow_ema.len() - len..];

    Ok(fast_tail
        .iter()
        .zip(slow_tail)
        .map(|(f, s)| f - s)
        .collect())
}
