use intel_core::{
    DivergenceKind, InsiderClassification, MacroRegime, TimeHorizon, TradeDirection, TradePlan,
    VolatilityProfile,
};
use serde::{Deserialize, Serialize};

use crate::context::{PlanContext, RiskTier, ShadowBias, VolSurfaceRegime};

/// One named multiplicative step of the volatility pipeline. The order the
/// steps apply in is the order they appear in the pipeline vector.
#[derive(Debug, Clone, Serialize)]
pub struct VolAdjustment {
    pub name: &'static str,
    pub factor: f64,
}

/// Plan arithmetic tunables. Empirical defaults, not proven optima.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanConfig {
    /// Stop-distance fraction kept under a hidden (continuation) divergence
    pub hidden_divergence_stop_keep: f64,
    /// Soft stop sits at this fraction of the stop distance
    pub soft_stop_fraction: f64,
    /// Narrative pressure above this boosts reward targets
    pub narrative_threshold: f64,
    pub narrative_reward_boost: f64,
    pub risk_off_reward_damp: f64,
    pub insider_size_boost: f64,
    pub insider_size_cap_pct: f64,
    pub contraction_size_damp: f64,
    pub trap_size_damp: f64,
    pub fomc_size_damp: f64,
    pub max_allocation_ratio: f64,
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            hidden_divergence_stop_keep: 0.7,
            soft_stop_fraction: 0.6,
            narrative_threshold: 75.0,
            narrative_reward_boost: 1.3,
            risk_off_reward_damp: 0.7,
            insider_size_boost: 1.25,
            insider_size_cap_pct: 10.0,
            contraction_size_damp: 0.5,
            trap_size_damp: 0.8,
            fomc_size_damp: 0.75,
            max_allocation_ratio: 1.5,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TradePlanBuilder {
    config: PlanConfig,
}

impl TradePlanBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: PlanConfig) -> Self {
        Self { config }
    }

    /// The ordered multiplicative adjustments applied to the base
    /// volatility percentage. The trap buffer is NOT part of this pipeline:
    /// it is added after the multiplicative steps.
    pub fn volatility_pipeline(&self, ctx: &PlanContext) -> Vec<VolAdjustment> {
        vec![
            VolAdjustment {
                name: "gamma_regime",
                factor: ctx.gamma_regime.vol_factor(),
            },
            VolAdjustment {
                name: "drawdown_tier",
                factor: ctx.drawdown_tier_modifier,
            },
            VolAdjustment {
                name: "vol_surface",
                factor: ctx.vol_surface.vol_modifier(),
            },
            VolAdjustment {
                name: "seasonal",
                factor: ctx.seasonal_factor,
            },
        ]
    }

    /// Effective stop width as a fraction of price
    fn effective_volatility_pct(&self, profile: VolatilityProfile, ctx: &PlanContext) -> f64 {
        let mut vol_pct = profile.base_volatility_pct();
        for adjustment in self.volatility_pipeline(ctx) {
            vol_pct *= adjustment.factor;
        }
        if let Some(trap) = &ctx.trap_zone {
            vol_pct += trap.buffer_pct;
        }
        vol_pct
    }

    /// Construct the concrete plan. Pure arithmetic over validated inputs;
    /// the caller guarantees a positive, finite price.
    pub fn build(
        &self,
        price: f64,
        direction: TradeDirection,
        weighted_confidence: f64,
        volatility_profile: VolatilityProfile,
        risk_tier: RiskTier,
        ctx: &PlanContext,
    ) -> TradePlan {
        let vol_pct = self.effective_volatility_pct(volatility_profile, ctx);

        let side = match direction {
            TradeDirection::Long => 1.0,
            TradeDirection::Short => -1.0,
        };

        // Trap zones ask for a pullback before committing
        let (entry_primary, entry_secondary) = if ctx.trap_zone.is_some() {
            (price * (1.0 - side * 0.02), Some(price * (1.0 - side * 0.05)))
        } else {
            let accumulating = match direction {
                TradeDirection::Long => ctx.shadow_bias == ShadowBias::Accumulation,
                TradeDirection::Short => ctx.shadow_bias == ShadowBias::Distribution,
            };
            let secondary = if accumulating {
                price * (1.0 - side * 0.01)
            } else {
                price * (1.0 - side * 0.03)
            };
            (price, Some(secondary))
        };

        // Stop and targets anchor to the entry actually taken, so a
        // trap-shifted entry can never land inside its own stop.
        let mut stop_distance = entry_primary * vol_pct;
        let continuation = match direction {
            TradeDirection::Long => ctx.divergence == DivergenceKind::HiddenBull,
            TradeDirection::Short => ctx.divergence == DivergenceKind::HiddenBear,
        };
        if continuation {
            stop_distance *= self.config.hidden_divergence_stop_keep;
        }

        let stop_loss = entry_primary - side * stop_distance;
        let soft_stop = entry_primary - side * self.config.soft_stop_fraction * stop_distance;

        let risk = stop_distance;
        let mut reward_mult = 1.0;
        if ctx.narrative_pressure > self.config.narrative_threshold {
            reward_mult *= self.config.narrative_reward_boost;
        }
        if ctx.macro_regime == MacroRegime::RiskOff {
            reward_mult *= self.config.risk_off_reward_damp;
        }

        let take_profit_1 = entry_primary + side * 1.5 * risk * reward_mult;
        let take_profit_2 = entry_primary + side * 3.0 * risk * reward_mult;
        let take_profit_3 = entry_primary + side * 5.0 * risk * reward_mult;

        let allocation_pct = self.allocation_pct(risk_tier, weighted_confidence, volatility_profile, ctx);
        let max_allocation = allocation_pct * self.config.max_allocation_ratio;

        let risk_reward_ratio = (side * (take_profit_2 - entry_primary)) / stop_distance;

        let time_horizon = if risk_tier == RiskTier::BlueChip {
            TimeHorizon::Months
        } else if ctx.catalyst_event {
            TimeHorizon::EventDriven
        } else {
            TimeHorizon::Weeks
        };

        let mut warnings = Vec::new();
        if ctx.fomc_week {
            warnings.push("FOMC week: expect rate-driven whipsaws".to_string());
        }
        if ctx.trap_zone.is_some() {
            warnings.push("price sits in a historical trap zone; staged entry advised".to_string());
        }
        if ctx.vol_surface == VolSurfaceRegime::Extreme {
            warnings.push("extreme volatility-surface regime".to_string());
        }

        tracing::debug!(
            "plan {:?} @ {:.2}: stop {:.2}, targets {:.2}/{:.2}/{:.2}, size {:.1}%",
            direction,
            entry_primary,
            stop_loss,
            take_profit_1,
            take_profit_2,
            take_profit_3,
            allocation_pct
        );

        TradePlan {
            direction,
            entry_primary,
            entry_secondary,
            stop_loss,
            soft_stop,
            take_profit_1,
            take_profit_2,
            take_profit_3,
            allocation_pct,
            max_allocation,
            risk_reward_ratio,
            time_horizon,
            warnings,
        }
    }

    /// Base allocation from the (tier, confidence, volatility) table, then
    /// the contextual size multipliers.
    fn allocation_pct(
        &self,
        tier: RiskTier,
        confidence: f64,
        profile: VolatilityProfile,
        ctx: &PlanContext,
    ) -> f64 {
        let by_confidence = match tier {
            RiskTier::BlueChip => match confidence {
                c if c >= 85.0 => 8.0,
                c if c >= 70.0 => 6.0,
                c if c >= 55.0 => 4.0,
                _ => 2.0,
            },
            RiskTier::Core => match confidence {
                c if c >= 85.0 => 6.0,
                c if c >= 70.0 => 4.0,
                c if c >= 55.0 => 3.0,
                _ => 1.5,
            },
            RiskTier::Speculative => match confidence {
                c if c >= 85.0 => 4.0,
                c if c >= 70.0 => 3.0,
                c if c >= 55.0 => 2.0,
                _ => 1.0,
            },
        };

        let vol_damp = match profile {
            VolatilityProfile::High => 0.75,
            VolatilityProfile::Medium => 1.0,
            VolatilityProfile::Low => 1.1,
        };

        let mut allocation = by_confidence * vol_damp;

        if matches!(
            ctx.insider,
            InsiderClassification::Opportunistic | InsiderClassification::Coordinated
        ) {
            allocation = (allocation * self.config.insider_size_boost)
                .min(self.config.insider_size_cap_pct);
        }
        if ctx.macro_regime.is_contractionary() || ctx.vol_surface == VolSurfaceRegime::Extreme {
            allocation *= self.config.contraction_size_damp;
        }
        if ctx.trap_zone.is_some() {
            allocation *= self.config.trap_size_damp;
        }
        if ctx.fomc_week {
            allocation *= self.config.fomc_size_damp;
        }

        allocation
    }
}
