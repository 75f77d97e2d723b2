use intel_core::{DivergenceKind, DivergenceResult};
use serde::{Deserialize, Serialize};

use crate::indicators::{obv_series, rsi_series, trailing_slope};

/// Detector tunables. The proximity and RSI-band thresholds are empirical
/// defaults, exposed here rather than buried in the classification code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DivergenceConfig {
    pub rsi_period: usize,
    /// Multi-scale lookback windows, smallest first
    pub windows: Vec<usize>,
    /// How close price must revisit a prior pivot (fraction)
    pub price_proximity: f64,
    /// Minimum relative RSI change vs the prior pivot reading (fraction)
    pub rsi_delta: f64,
    /// How far price must sit beyond the prior pivot for a hidden
    /// (continuation) pattern (fraction)
    pub hidden_price_distance: f64,
    /// Hidden-bull requires RSI to reset below this band
    pub hidden_bull_rsi_ceiling: f64,
    /// Hidden-bear requires RSI to exceed this band
    pub hidden_bear_rsi_floor: f64,
    pub base_strength: f64,
    pub obv_confirmation_bonus: f64,
    pub obv_slope_window: usize,
    pub min_history: usize,
}

impl Default for DivergenceConfig {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            windows: vec![5, 10, 20],
            price_proximity: 0.02,
            rsi_delta: 0.05,
            hidden_price_distance: 0.05,
            hidden_bull_rsi_ceiling: 45.0,
            hidden_bear_rsi_floor: 55.0,
            base_strength: 75.0,
            obv_confirmation_bonus: 10.0,
            obv_slope_window: 10,
            min_history: 60,
        }
    }
}

/// Pure multi-scale divergence detector over a price/volume series
#[derive(Debug, Clone, Default)]
pub struct DivergenceDetector {
    config: DivergenceConfig,
}

impl DivergenceDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: DivergenceConfig) -> Self {
        Self { config }
    }

    /// Classify the most recent price/RSI relationship across the lookback
    /// windows. Short history is a neutral result, not an error.
    pub fn detect(&self, closes: &[f64], volumes: &[f64]) -> DivergenceResult {
        if closes.len() < self.config.min_history {
            return DivergenceResult::none("insufficient history");
        }
        if volumes.len() != closes.len() {
            return DivergenceResult::none("volume series does not match price series");
        }

        let rsi = rsi_series(closes, self.config.rsi_period);
        let obv = obv_series(closes, volumes);
        let obv_slope = trailing_slope(&obv, self.config.obv_slope_window);

        let mut best: Option<(DivergenceKind, f64, usize, String)> = None;

        // Windows run smallest first; a tie on strength keeps the earlier
        // (smaller) window.
        for &window in &self.config.windows {
            let Some((kind, note)) = self.classify_window(closes, &rsi, window) else {
                continue;
            };

            let confirmed = (kind.is_bullish() && obv_slope > 0.0)
                || (kind.is_bearish() && obv_slope < 0.0);
            let strength = if confirmed {
                self.config.base_strength + self.config.obv_confirmation_bonus
            } else {
                self.config.base_strength
            };

            let replace = match &best {
                Some((_, s, _, _)) => strength > *s,
                None => true,
            };
            if replace {
                best = Some((kind, strength, window, note));
            }
        }

        match best {
            Some((kind, strength, window, note)) => {
                tracing::debug!(
                    "divergence {:?} (strength {:.0}) confirmed on {}-bar window",
                    kind,
                    strength,
                    window
                );
                DivergenceResult {
                    has_divergence: true,
                    kind,
                    strength: strength.clamp(0.0, 100.0),
                    confirming_window: Some(window),
                    note,
                }
            }
            None => DivergenceResult::none("no divergence in any window"),
        }
    }

    /// Compare price now against the most recent confirmed pivot for one
    /// lookback window. Regular patterns are checked before hidden ones.
    fn classify_window(
        &self,
        closes: &[f64],
        rsi: &[f64],
        window: usize,
    ) -> Option<(DivergenceKind, String)> {
        let price_now = *closes.last()?;
        let rsi_now = *rsi.last()?;

        let peak = last_pivot(closes, window, Pivot::Peak);
        let valley = last_pivot(closes, window, Pivot::Valley);

        if let Some(p) = peak {
            let revisit = price_now >= closes[p] * (1.0 - self.config.price_proximity);
            let rsi_weaker = rsi_now <= rsi[p] * (1.0 - self.config.rsi_delta);
            if revisit && rsi_weaker {
                return Some((
                    DivergenceKind::RegularBear,
                    format!(
                        "price revisited the {:.2} peak while RSI fell from {:.1} to {:.1}",
                        closes[p], rsi[p], rsi_now
                    ),
                ));
            }
        }

        if let Some(v) = valley {
            let revisit = price_now <= closes[v] * (1.0 + self.config.price_proximity);
            let rsi_stronger = rsi_now >= rsi[v] * (1.0 + self.config.rsi_delta);
            if revisit && rsi_stronger {
                return Some((
                    DivergenceKind::RegularBull,
                    format!(
                        "price revisited the {:.2} valley while RSI rose from {:.1} to {:.1}",
                        closes[v], rsi[v], rsi_now
                    ),
                ));
            }
        }

        if let Some(v) = valley {
            let higher_low = price_now >= closes[v] * (1.0 + self.config.hidden_price_distance);
            let rsi_reset = rsi_now < self.config.hidden_bull_rsi_ceiling && rsi_now < rsi[v];
            if higher_low && rsi_reset {
                return Some((
                    DivergenceKind::HiddenBull,
                    format!(
                        "higher low above the {:.2} valley with RSI reset to {:.1}",
                        closes[v], rsi_now
                    ),
                ));
            }
        }

        if let Some(p) = peak {
            let lower_high = price_now <= closes[p] * (1.0 - self.config.hidden_price_distance);
            let rsi_overshoot = rsi_now > self.config.hidden_bear_rsi_floor && rsi_now > rsi[p];
            if lower_high && rsi_overshoot {
                return Some((
                    DivergenceKind::HiddenBear,
                    format!(
                        "lower high below the {:.2} peak with RSI stretched to {:.1}",
                        closes[p], rsi_now
                    ),
                ));
            }
        }

        None
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Pivot {
    Peak,
    Valley,
}

/// Most recent confirmed pivot: a point that strictly dominates every point
/// within `window` positions on both sides.
fn last_pivot(series: &[f64], window: usize, pivot: Pivot) -> Option<usize> {
    let n = series.len();
    if window == 0 || n < 2 * window + 1 {
        return None;
    }

    for i in (window..n - window).rev() {
        let v = series[i];
        let confirmed = (i - window..=i + window)
            .filter(|&j| j != i)
            .all(|j| match pivot {
                Pivot::Peak => series[j] < v,
                Pivot::Valley => series[j] > v,
            });
        if confirmed {
            return Some(i);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Steep rally into a peak (RSI pinned high), pullback, then a slow
    /// grind back to the peak's level with much weaker RSI.
    fn regular_bear_fixture() -> (Vec<f64>, Vec<f64>) {
        let mut closes = Vec::new();
        for i in 0..40 {
            closes.push(100.0 + i as f64); // 100 -> 139
        }
        for i in 1..=10 {
            closes.push(139.0 - 0.8 * i as f64); // down to 131
        }
        for i in 1..=10 {
            closes.push(131.0 + 0.75 * i as f64); // back to 138.5
        }
        let volumes = vec![1_000.0; closes.len()];
        (closes, volumes)
    }

    #[test]
    fn insufficient_history_is_neutral() {
        let detector = DivergenceDetector::new();
        let closes = vec![100.0; 30];
        let volumes = vec![1_000.0; 30];
        let result = detector.detect(&closes, &volumes);
        assert_eq!(result.kind, DivergenceKind::None);
        assert!(!result.has_divergence);
        assert!(result.note.contains("insufficient"));
    }

    #[test]
    fn flat_series_has_no_pivots() {
        let detector = DivergenceDetector::new();
        let closes = vec![100.0; 80];
        let volumes = vec![1_000.0; 80];
        let result = detector.detect(&closes, &volumes);
        assert_eq!(result.kind, DivergenceKind::None);
    }

    #[test]
    fn ascending_peaks_with_weakening_rsi_is_regular_bear() {
        let detector = DivergenceDetector::new();
        let (closes, volumes) = regular_bear_fixture();
        assert!(closes.len() >= 60);

        let result = detector.detect(&closes, &volumes);
        assert_eq!(result.kind, DivergenceKind::RegularBear);
        assert!(result.has_divergence);
        assert!(result.strength >= 75.0);
        assert!(result.confirming_window.is_some());
    }

    #[test]
    fn pivot_requires_strict_dominance() {
        // Plateau peaks are not confirmed
        let series = vec![1.0, 2.0, 3.0, 3.0, 2.0, 1.0, 0.5, 0.4, 0.3];
        assert_eq!(last_pivot(&series, 2, Pivot::Peak), None);

        let series = vec![1.0, 2.0, 4.0, 3.0, 2.0, 1.0, 0.5, 0.4, 0.3];
        assert_eq!(last_pivot(&series, 2, Pivot::Peak), Some(2));
    }

    #[test]
    fn hidden_bull_from_crafted_pivots() {
        let detector = DivergenceDetector::new();

        // Valley at index 3; price now ~8% above it with RSI reset below
        // both the 45 band and the valley reading.
        let closes = vec![10.0, 9.5, 9.0, 8.5, 9.0, 9.3, 9.4, 9.35, 9.2];
        let mut rsi = vec![50.0; closes.len()];
        rsi[3] = 48.0;
        *rsi.last_mut().unwrap() = 40.0;

        let classified = detector.classify_window(&closes, &rsi, 2);
        let (kind, _) = classified.expect("expected hidden bull");
        assert_eq!(kind, DivergenceKind::HiddenBull);
    }

    #[test]
    fn hidden_price_distance_does_not_track_rsi_delta() {
        // Tightening the RSI-delta requirement must leave the hidden
        // patterns' price geometry alone.
        let detector = DivergenceDetector::with_config(DivergenceConfig {
            rsi_delta: 0.5,
            ..Default::default()
        });

        let closes = vec![10.0, 9.5, 9.0, 8.5, 9.0, 9.3, 9.4, 9.35, 9.2];
        let mut rsi = vec![50.0; closes.len()];
        rsi[3] = 48.0;
        *rsi.last_mut().unwrap() = 40.0;

        let classified = detector.classify_window(&closes, &rsi, 2);
        let (kind, _) = classified.expect("expected hidden bull");
        assert_eq!(kind, DivergenceKind::HiddenBull);
    }

    #[test]
    fn hidden_bear_from_crafted_pivots() {
        let detector = DivergenceDetector::new();

        // Peak at index 3; price now ~8% below it with RSI stretched above
        // both the 55 band and the peak reading.
        let closes = vec![10.0, 10.5, 11.0, 11.5, 11.0, 10.8, 10.6, 10.62, 10.58];
        let mut rsi = vec![50.0; closes.len()];
        rsi[3] = 52.0;
        *rsi.last_mut().unwrap() = 60.0;

        let classified = detector.classify_window(&closes, &rsi, 2);
        let (kind, _) = classified.expect("expected hidden bear");
        assert_eq!(kind, DivergenceKind::HiddenBear);
    }
}
