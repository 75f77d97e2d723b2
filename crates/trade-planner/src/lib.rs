//! Volatility-aware trade-plan construction: entries, stops, targets and
//! sizing derived from fused confidence plus the contextual regime flags.

pub mod builder;
pub mod context;

pub use builder::{PlanConfig, TradePlanBuilder, VolAdjustment};
pub use context::{
    GammaRegime, PlanContext, RiskTier, ShadowBias, TrapZone, VolSurfaceRegime,
};
