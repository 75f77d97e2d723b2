use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::IntelError;

/// OHLCV bar data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Realized volatility bucket for an instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolatilityProfile {
    High,
    Medium,
    Low,
}

impl VolatilityProfile {
    /// Base stop-distance as a fraction of price
    pub fn base_volatility_pct(&self) -> f64 {
        match self {
            VolatilityProfile::High => 0.08,
            VolatilityProfile::Medium => 0.04,
            VolatilityProfile::Low => 0.02,
        }
    }
}

/// An instrument under evaluation. Immutable within a cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instrument {
    pub ticker: String,
    pub sector: String,
    pub price: f64,
    pub bars: Vec<Bar>,
    pub volatility_profile: VolatilityProfile,
}

impl Instrument {
    /// Contract check on externally supplied data. This is the only place
    /// the core raises: everything downstream assumes a valid instrument.
    pub fn validate(&self) -> Result<(), IntelError> {
        if self.ticker.trim().is_empty() {
            return Err(IntelError::MalformedInstrument(
                "empty ticker".to_string(),
            ));
        }
        if !self.price.is_finite() || self.price <= 0.0 {
            return Err(IntelError::MalformedInstrument(format!(
                "invalid price for {}: {}",
                self.ticker, self.price
            )));
        }
        if self
            .bars
            .iter()
            .any(|b| !b.close.is_finite() || !b.volume.is_finite())
        {
            return Err(IntelError::MalformedInstrument(format!(
                "non-finite bar data for {}",
                self.ticker
            )));
        }
        Ok(())
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.volume).collect()
    }
}

/// Weight category a signal engine belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngineCategory {
    Technical,
    Fundamental,
    Flow,
    Macro,
    Sentiment,
}

/// The known signal engines. Each produces one partial signal per cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EngineId {
    Technical,
    Fundamental,
    OptionsFlow,
    DarkPool,
    Insider,
    Macro,
    NewsSentiment,
    SocialSentiment,
}

impl EngineId {
    pub fn category(&self) -> EngineCategory {
        match self {
            EngineId::Technical => EngineCategory::Technical,
            EngineId::Fundamental => EngineCategory::Fundamental,
            EngineId::OptionsFlow | EngineId::DarkPool | EngineId::Insider => EngineCategory::Flow,
            EngineId::Macro => EngineCategory::Macro,
            EngineId::NewsSentiment | EngineId::SocialSentiment => EngineCategory::Sentiment,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EngineId::Technical => "technical",
            EngineId::Fundamental => "fundamental",
            EngineId::OptionsFlow => "options_flow",
            EngineId::DarkPool => "dark_pool",
            EngineId::Insider => "insider",
            EngineId::Macro => "macro",
            EngineId::NewsSentiment => "news_sentiment",
            EngineId::SocialSentiment => "social_sentiment",
        }
    }
}

/// Insider-activity classification from the flow collaborators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InsiderClassification {
    NoActivity,
    Routine,
    Mixed,
    Opportunistic,
    Coordinated,
}

impl InsiderClassification {
    /// Bullish conviction implied by the pattern, on the 0-100 scale
    pub fn to_score(&self) -> f64 {
        match self {
            InsiderClassification::NoActivity => 50.0,
            InsiderClassification::Routine => 55.0,
            InsiderClassification::Mixed => 50.0,
            InsiderClassification::Opportunistic => 75.0,
            InsiderClassification::Coordinated => 85.0,
        }
    }
}

/// Macro regime as labeled by the macro collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MacroRegime {
    Expansion,
    Neutral,
    RiskOff,
    Stagflation,
    Recession,
}

impl MacroRegime {
    pub fn to_score(&self) -> f64 {
        match self {
            MacroRegime::Expansion => 70.0,
            MacroRegime::Neutral => 50.0,
            MacroRegime::RiskOff => 35.0,
            MacroRegime::Stagflation => 25.0,
            MacroRegime::Recession => 20.0,
        }
    }

    /// Regimes under which sizing is halved
    pub fn is_contractionary(&self) -> bool {
        matches!(self, MacroRegime::Stagflation | MacroRegime::Recession)
    }
}

/// Tagged engine payload. Categorical engines map onto the 0-100 scale
/// through a total function, so neutral substitution is type-checked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum SignalValue {
    Score(f64),
    Insider(InsiderClassification),
    Regime(MacroRegime),
}

impl SignalValue {
    /// Total on any input: a NaN or infinite collaborator score maps to
    /// the neutral 50 instead of poisoning downstream sums.
    pub fn to_score(&self) -> f64 {
        match self {
            SignalValue::Score(s) if s.is_finite() => s.clamp(0.0, 100.0),
            SignalValue::Score(_) => 50.0,
            SignalValue::Insider(c) => c.to_score(),
            SignalValue::Regime(r) => r.to_score(),
        }
    }

    /// False when a raw score arrived non-finite. Categorical payloads are
    /// always finite.
    pub fn is_finite(&self) -> bool {
        match self {
            SignalValue::Score(s) => s.is_finite(),
            SignalValue::Insider(_) | SignalValue::Regime(_) => true,
        }
    }
}

/// One engine's partial signal for an instrument. Ephemeral — produced once
/// per evaluation cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalReading {
    pub engine_id: EngineId,
    pub value: SignalValue,
    pub is_fallback: bool,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}

impl SignalReading {
    pub fn new(engine_id: EngineId, value: SignalValue) -> Self {
        Self {
            engine_id,
            value,
            is_fallback: false,
            details: None,
        }
    }

    /// Degraded neutral placeholder for an unavailable engine
    pub fn fallback(engine_id: EngineId) -> Self {
        Self {
            engine_id,
            value: SignalValue::Score(50.0),
            is_fallback: true,
            details: None,
        }
    }
}

/// Discretized confidence bucket that gates sizing and action
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConvictionTier {
    Avoid,
    Low,
    Moderate,
    High,
    Maximum,
}

impl ConvictionTier {
    pub fn from_confidence(confidence: f64) -> Self {
        match confidence {
            c if c >= 85.0 => ConvictionTier::Maximum,
            c if c >= 70.0 => ConvictionTier::High,
            c if c >= 55.0 => ConvictionTier::Moderate,
            c if c >= 40.0 => ConvictionTier::Low,
            _ => ConvictionTier::Avoid,
        }
    }

    pub fn to_label(&self) -> &'static str {
        match self {
            ConvictionTier::Maximum => "Maximum",
            ConvictionTier::High => "High",
            ConvictionTier::Moderate => "Moderate",
            ConvictionTier::Low => "Low",
            ConvictionTier::Avoid => "Avoid",
        }
    }
}

/// Fused confidence output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionResult {
    /// Weighted mean before the calibration multiplier
    pub raw_confidence: f64,
    /// Calibrated confidence, clamped to [0, 100]
    pub weighted_confidence: f64,
    pub conviction_tier: ConvictionTier,
    /// Engine with the largest |value - 50| * weight contribution
    pub primary_driver: Option<EngineId>,
    pub reasons: Vec<String>,
    /// True when fallback weight exceeds the blind-spot threshold —
    /// the decision rests on thin information
    pub blind_spot_warning: bool,
}

/// Divergence classification between price and oscillator structure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DivergenceKind {
    /// Reversal-down: price revisits a peak while RSI weakens
    RegularBear,
    /// Reversal-up: price revisits a valley while RSI strengthens
    RegularBull,
    /// Continuation buy-the-dip: higher low with an RSI reset
    HiddenBull,
    /// Continuation sell-the-rip: lower high with an RSI overshoot
    HiddenBear,
    None,
}

impl DivergenceKind {
    pub fn is_bullish(&self) -> bool {
        matches!(self, DivergenceKind::RegularBull | DivergenceKind::HiddenBull)
    }

    pub fn is_bearish(&self) -> bool {
        matches!(self, DivergenceKind::RegularBear | DivergenceKind::HiddenBear)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DivergenceResult {
    pub has_divergence: bool,
    pub kind: DivergenceKind,
    /// 0-100; base 75 plus an OBV confirmation bonus
    pub strength: f64,
    /// Lookback window that produced the winning classification
    pub confirming_window: Option<usize>,
    pub note: String,
}

impl DivergenceResult {
    pub fn none(note: impl Into<String>) -> Self {
        Self {
            has_divergence: false,
            kind: DivergenceKind::None,
            strength: 0.0,
            confirming_window: None,
            note: note.into(),
        }
    }
}

/// A perspective's directional call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stance {
    Bull,
    Bear,
    Neutral,
}

/// One panel perspective's independent opinion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerspectiveOpinion {
    pub score: f64,
    pub verdict: Stance,
    pub reasoning: String,
}

impl PerspectiveOpinion {
    /// Neutral default when a perspective's evidence is unavailable
    pub fn data_missing() -> Self {
        Self {
            score: 50.0,
            verdict: Stance::Neutral,
            reasoning: "data missing".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgreementLevel {
    Unanimous,
    Majority,
    Conflicted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsensusLabel {
    StrongBuy,
    Buy,
    Hold,
    Sell,
    StrongSell,
}

impl ConsensusLabel {
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s > 80.0 => ConsensusLabel::StrongBuy,
            s if s > 60.0 => ConsensusLabel::Buy,
            s if s < 20.0 => ConsensusLabel::StrongSell,
            s if s < 40.0 => ConsensusLabel::Sell,
            _ => ConsensusLabel::Hold,
        }
    }
}

/// Reconciled verdict across the three independent perspectives
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusVerdict {
    pub momentum: PerspectiveOpinion,
    pub value: PerspectiveOpinion,
    pub catalyst: PerspectiveOpinion,
    pub final_score: f64,
    pub consensus_label: ConsensusLabel,
    pub agreement_level: AgreementLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeDirection {
    Long,
    Short,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeHorizon {
    Months,
    Weeks,
    EventDriven,
}

impl TimeHorizon {
    pub fn to_label(&self) -> &'static str {
        match self {
            TimeHorizon::Months => "months",
            TimeHorizon::Weeks => "weeks",
            TimeHorizon::EventDriven => "event-driven (days)",
        }
    }
}

/// Concrete entry/stop/target/size prescription
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradePlan {
    pub direction: TradeDirection,
    pub entry_primary: f64,
    pub entry_secondary: Option<f64>,
    pub stop_loss: f64,
    /// Early-warning level at 60% of the stop distance
    pub soft_stop: f64,
    pub take_profit_1: f64,
    pub take_profit_2: f64,
    pub take_profit_3: f64,
    /// Portfolio fraction, percent
    pub allocation_pct: f64,
    pub max_allocation: f64,
    pub risk_reward_ratio: f64,
    pub time_horizon: TimeHorizon,
    /// Advisory only — never alters the numeric fields
    pub warnings: Vec<String>,
}

/// Learned sector bias from realized outcomes
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SectorBias {
    pub multiplier: f64,
    pub win_rate: f64,
    pub sample_size: i64,
}

impl SectorBias {
    /// Cold-start default for unknown sectors
    pub fn neutral() -> Self {
        Self {
            multiplier: 1.0,
            win_rate: 50.0,
            sample_size: 0,
        }
    }
}

/// Point-in-time view of the calibration ledger, injected into fusion calls
/// so the core stays free of process-wide state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CalibrationSnapshot {
    pub biases: std::collections::HashMap<String, SectorBias>,
    pub taken_at: Option<DateTime<Utc>>,
}

impl CalibrationSnapshot {
    pub fn bias_for(&self, sector: &str) -> SectorBias {
        self.biases
            .get(sector)
            .copied()
            .unwrap_or_else(SectorBias::neutral)
    }
}

/// Persisted per-sector calibration state. Upserted, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRecord {
    pub sector: String,
    pub win_rate: f64,
    pub avg_pnl: f64,
    pub multiplier: f64,
    pub sample_size: i64,
    pub last_updated: DateTime<Utc>,
}

/// The full output contract handed to persistence/presentation collaborators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntelligenceBundle {
    pub ticker: String,
    pub generated_at: DateTime<Utc>,
    pub fusion: FusionResult,
    pub divergence: DivergenceResult,
    pub consensus: ConsensusVerdict,
    pub trade_plan: TradePlan,
}
