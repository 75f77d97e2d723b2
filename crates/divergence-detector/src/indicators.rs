//! Oscillator math used by the divergence detector.
//!
//! All series returned here are index-aligned with the input: positions
//! where the indicator is not yet defined hold a neutral value, so pivot
//! indices on the price series address the oscillator series directly.

/// Wilder-smoothed RSI, aligned with the input. The first `period` entries
/// hold the neutral 50.0.
pub fn rsi_series(closes: &[f64], period: usize) -> Vec<f64> {
    let n = closes.len();
    if period == 0 || n < period + 1 {
        return vec![50.0; n];
    }

    let mut out = vec![50.0; n];

    let mut gain_sum = 0.0;
    let mut loss_sum = 0.0;
    for i in 1..=period {
        let change = closes[i] - closes[i - 1];
        if change > 0.0 {
            gain_sum += change;
        } else {
            loss_sum -= change;
        }
    }

    let mut avg_gain = gain_sum / period as f64;
    let mut avg_loss = loss_sum / period as f64;
    out[period] = rsi_value(avg_gain, avg_loss);

    for i in period + 1..n {
        let change = closes[i] - closes[i - 1];
        let (gain, loss) = if change > 0.0 {
            (change, 0.0)
        } else {
            (0.0, -change)
        };
        avg_gain = (avg_gain * (period - 1) as f64 + gain) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + loss) / period as f64;
        out[i] = rsi_value(avg_gain, avg_loss);
    }

    out
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - (100.0 / (1.0 + rs))
}

/// Cumulative On-Balance Volume over the full history
pub fn obv_series(closes: &[f64], volumes: &[f64]) -> Vec<f64> {
    if closes.is_empty() || closes.len() != volumes.len() {
        return vec![];
    }

    let mut out = Vec::with_capacity(closes.len());
    out.push(volumes[0]);

    for i in 1..closes.len() {
        let prev = out[i - 1];
        let next = if closes[i] > closes[i - 1] {
            prev + volumes[i]
        } else if closes[i] < closes[i - 1] {
            prev - volumes[i]
        } else {
            prev
        };
        out.push(next);
    }

    out
}

/// Endpoint slope over the trailing `window` points. Zero when the series
/// is too short to measure.
pub fn trailing_slope(series: &[f64], window: usize) -> f64 {
    let n = series.len();
    if window == 0 || n <= window {
        return 0.0;
    }
    (series[n - 1] - series[n - 1 - window]) / window as f64
}
