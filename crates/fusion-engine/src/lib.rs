//! Signal fusion: collapses the per-engine readings into one calibrated
//! confidence and conviction tier.
//!
//! The aggregation is commutative — output never depends on the iteration
//! order of the reading map. Missing engines pull toward neutral at half
//! weight instead of vanishing, and a decision resting mostly on fallbacks
//! is flagged and capped rather than presented with false confidence.

use std::collections::HashMap;

use intel_core::{
    CalibrationSnapshot, ConvictionTier, EngineId, FusionConfig, FusionResult, SignalReading,
};

pub struct FusionEngine {
    config: FusionConfig,
}

impl Default for FusionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FusionEngine {
    pub fn new() -> Self {
        Self {
            config: FusionConfig::default(),
        }
    }

    pub fn with_config(config: FusionConfig) -> Self {
        Self { config }
    }

    /// Fuse the engine readings for one instrument. Never raises: an
    /// all-fallback cycle collapses to a flagged Avoid.
    pub fn fuse(
        &self,
        readings: &HashMap<EngineId, SignalReading>,
        sector: &str,
        calibration: &CalibrationSnapshot,
    ) -> FusionResult {
        if readings.is_empty()
            || readings
                .values()
                .all(|r| r.is_fallback || !r.value.is_finite())
        {
            tracing::warn!("all engines degraded for sector {}", sector);
            return FusionResult {
                raw_confidence: 50.0,
                weighted_confidence: 50.0,
                conviction_tier: ConvictionTier::Avoid,
                primary_driver: None,
                reasons: vec!["all engines unavailable; no basis for a decision".to_string()],
                blind_spot_warning: true,
            };
        }

        // Sorted by engine id so reasons and tie-breaks are deterministic
        // under permutation of the input map.
        let mut entries: Vec<&SignalReading> = readings.values().collect();
        entries.sort_by_key(|r| r.engine_id);

        let mut weighted_sum = 0.0;
        let mut total_weight = 0.0;
        let mut fallback_weight = 0.0;
        let mut reasons = Vec::new();

        struct Contribution {
            engine_id: EngineId,
            magnitude: f64,
        }
        let mut contributions: Vec<Contribution> = Vec::new();

        for reading in &entries {
            let base_weight = self
                .config
                .weights
                .for_category(reading.engine_id.category());

            let (value, weight) = if reading.is_fallback {
                let weight = base_weight * self.config.fallback_weight_penalty;
                fallback_weight += weight;
                reasons.push(format!(
                    "{} unavailable; substituted neutral at half weight",
                    reading.engine_id.as_str()
                ));
                (self.config.fallback_neutral_value, weight)
            } else if !reading.value.is_finite() {
                // A collaborator that emits NaN/inf is as good as down
                let weight = base_weight * self.config.fallback_weight_penalty;
                fallback_weight += weight;
                reasons.push(format!(
                    "{} reported a non-finite score; substituted neutral at half weight",
                    reading.engine_id.as_str()
                ));
                (self.config.fallback_neutral_value, weight)
            } else {
                (reading.value.to_score(), base_weight)
            };

            weighted_sum += value * weight;
            total_weight += weight;
            contributions.push(Contribution {
                engine_id: reading.engine_id,
                magnitude: (value - 50.0).abs() * weight,
            });
        }

        let raw_confidence = (weighted_sum / total_weight).clamp(0.0, 100.0);

        let bias = calibration.bias_for(sector);
        if (bias.multiplier - 1.0).abs() > f64::EPSILON {
            reasons.push(format!(
                "sector '{}' calibration multiplier {:.2} (win rate {:.0}%, {} samples)",
                sector, bias.multiplier, bias.win_rate, bias.sample_size
            ));
        }
        let weighted_confidence = (raw_confidence * bias.multiplier).clamp(0.0, 100.0);

        // Equal magnitudes resolve to the smaller engine id, keeping the
        // result independent of map iteration order.
        let primary_driver = contributions
            .iter()
            .filter(|c| c.magnitude > 0.0)
            .max_by(|a, b| {
                a.magnitude
                    .partial_cmp(&b.magnitude)
                    .unwrap()
                    .then_with(|| b.engine_id.cmp(&a.engine_id))
            })
            .map(|c| c.engine_id);

        let fallback_fraction = fallback_weight / total_weight;
        let blind_spot_warning = fallback_fraction > self.config.blind_spot_threshold;

        let mut conviction_tier = ConvictionTier::from_confidence(weighted_confidence);
        if blind_spot_warning {
            // Thin information caps conviction regardless of the number
            conviction_tier = conviction_tier.min(ConvictionTier::Low);
            reasons.push(format!(
                "{:.0}% of decision weight rests on fallbacks; conviction capped",
                fallback_fraction * 100.0
            ));
        }

        tracing::debug!(
            "fused {} engines -> {:.1} (raw {:.1}), tier {:?}",
            entries.len(),
            weighted_confidence,
            raw_confidence,
            conviction_tier
        );

        FusionResult {
            raw_confidence,
            weighted_confidence,
            conviction_tier,
            primary_driver,
            reasons,
            blind_spot_warning,
        }
    }
}
