use common::InsufficientDataError;

use crate::round_to;

/// RSI (Relative Strength Index) with Wilder smoothing.
///
/// The first `period` price changes seed the average gain and loss. For every
/// later change the RSI of the current averages is emitted (rounded to 2
/// decimals), then the averages absorb that change:
/// `avg = (avg * (period - 1) + value) / period`.
///
/// Output length is `series.len() - 1 - period`, values are within [0, 100].
/// A zero average loss yields 100; a zero average gain is not special-cased.
pub fn rsi(series: &[f64], period: usize) -> Result<Vec<f64>, InsufficientDataError> {
    if period == 0 || series.len() < period + 1 {
        return Err(InsufficientDataError::new(
            format!("RSI({period})"),
            period + 1,
            series.len(),
        ));
    }

    let changes: Vec<f64> = series.windows(2).map(|w| w[1] - w[0]).collect();
    let gains: Vec<f64> = changes.iter().map(|&c| c.max(0.0)).collect();
    let losses: Vec<f64> = changes.iter().map(|&c| if c < 0.0 { -c } else { 0.0 }).collect();

    let p = period as f64;
    let mut avg_gain = gains[..period].iter().sum::<f64>() / p;
    let mut avg_loss = losses[..period].iter().sum::<f64>() / p;

    let mut values = Vec::with_capacity(changes.len() - period);
    for (&gain, &loss) in gains[period..].iter().zip(&losses[period..]) {
        let value = if avg_loss == 0.0 {
            100.0
        } else {
            let rs = avg_gain / avg_loss;
            100.0 - 100.0 / (1.0 + rs)
        };
        values.push(round_to(value, 2));

        avg_gain = (avg_gain * (p - 1.0) + gain) / p;
        avg_loss = (avg_loss * (p - 1.0) + loss) / p;
    }
    Ok(values)
}
