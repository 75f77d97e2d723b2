use intel_core::{DivergenceKind, InsiderClassification, MacroRegime};
use serde::{Deserialize, Serialize};

/// Options-gamma regime as labeled by the flow collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GammaRegime {
    /// Dealers chase moves; realized swings widen
    Amplified,
    /// Dealers pin price; realized swings compress
    Suppressed,
    Neutral,
}

impl GammaRegime {
    pub fn vol_factor(&self) -> f64 {
        match self {
            GammaRegime::Amplified => 1.5,
            GammaRegime::Suppressed => 0.8,
            GammaRegime::Neutral => 1.0,
        }
    }
}

/// Implied-volatility surface regime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolSurfaceRegime {
    Calm,
    Elevated,
    Extreme,
}

impl VolSurfaceRegime {
    pub fn vol_modifier(&self) -> f64 {
        match self {
            VolSurfaceRegime::Calm => 1.0,
            VolSurfaceRegime::Elevated => 1.15,
            VolSurfaceRegime::Extreme => 1.30,
        }
    }
}

/// Shadow-liquidity read from dark-pool prints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShadowBias {
    Accumulation,
    Distribution,
    Neutral,
}

/// Instrument risk tier used by the sizing table and time horizon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskTier {
    BlueChip,
    Core,
    Speculative,
}

/// A known reversal-trap zone near current price. The buffer widens the
/// stop additively — buffers are cushions, not scalars.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TrapZone {
    pub buffer_pct: f64,
}

/// Contextual flags feeding the trade-plan arithmetic. `Default` is the
/// fully neutral context: no regime effects, no traps, no events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanContext {
    pub gamma_regime: GammaRegime,
    /// Drawdown-sensitivity tier modifier on the stop distance
    pub drawdown_tier_modifier: f64,
    pub vol_surface: VolSurfaceRegime,
    /// Seasonal-volatility factor on the stop distance
    pub seasonal_factor: f64,
    pub fomc_week: bool,
    pub trap_zone: Option<TrapZone>,
    pub divergence: DivergenceKind,
    pub shadow_bias: ShadowBias,
    /// 0-100 narrative-pressure score from the sentiment collaborators
    pub narrative_pressure: f64,
    pub macro_regime: MacroRegime,
    pub insider: InsiderClassification,
    /// An active catalyst shortens the holding horizon
    pub catalyst_event: bool,
}

impl Default for PlanContext {
    fn default() -> Self {
        Self {
            gamma_regime: GammaRegime::Neutral,
            drawdown_tier_modifier: 1.0,
            vol_surface: VolSurfaceRegime::Calm,
            seasonal_factor: 1.0,
            fomc_week: false,
            trap_zone: None,
            divergence: DivergenceKind::None,
            shadow_bias: ShadowBias::Neutral,
            narrative_pressure: 50.0,
            macro_regime: MacroRegime::Neutral,
            insider: InsiderClassification::NoActivity,
            catalyst_event: false,
        }
    }
}
