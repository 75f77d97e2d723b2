use serde::{Deserialize, Serialize};

use crate::types::EngineCategory;

/// Per-category base weights for signal fusion.
///
/// These are tunable defaults, not proven optima. The fundamental category
/// carries the most weight; flow and sentiment engines are treated as
/// shorter-lived confirmation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FusionWeights {
    pub technical: f64,
    pub fundamental: f64,
    pub flow: f64,
    pub macro_: f64,
    pub sentiment: f64,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            technical: 0.20,
            fundamental: 0.40,
            flow: 0.15,
            macro_: 0.10,
            sentiment: 0.15,
        }
    }
}

impl FusionWeights {
    pub fn for_category(&self, category: EngineCategory) -> f64 {
        match category {
            EngineCategory::Technical => self.technical,
            EngineCategory::Fundamental => self.fundamental,
            EngineCategory::Flow => self.flow,
            EngineCategory::Macro => self.macro_,
            EngineCategory::Sentiment => self.sentiment,
        }
    }
}

/// Fusion engine tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionConfig {
    pub weights: FusionWeights,
    /// Neutral midpoint substituted for fallback readings
    pub fallback_neutral_value: f64,
    /// Weight multiplier applied to fallback readings
    pub fallback_weight_penalty: f64,
    /// Fallback-weighted fraction of total weight above which the
    /// blind-spot warning fires
    pub blind_spot_threshold: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            weights: FusionWeights::default(),
            fallback_neutral_value: 50.0,
            fallback_weight_penalty: 0.5,
            blind_spot_threshold: 0.40,
        }
    }
}
