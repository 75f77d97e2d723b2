use serde::{Deserialize, Serialize};

/// Price/oscillator/trend inputs for the momentum perspective
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MomentumEvidence {
    /// Trailing short-horizon return, percent (e.g. 5-day)
    pub short_trend_pct: f64,
    /// Trailing long-horizon return, percent (e.g. 60-day)
    pub long_trend_pct: f64,
    /// Latest 14-period RSI reading
    pub rsi: f64,
}

/// Valuation and balance-sheet ratios for the value perspective
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValueEvidence {
    pub pe_ratio: Option<f64>,
    pub peg_ratio: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub fcf_yield_pct: Option<f64>,
}

/// A scored headline supplied by the news collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Headline {
    pub title: String,
    /// Sentiment in [-1, 1] as scored upstream
    pub sentiment: f64,
    pub age_days: f64,
}

/// Recent qualitative headlines for the catalyst perspective
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalystEvidence {
    pub headlines: Vec<Headline>,
}

/// The disjoint evidence slices handed to the panel. Any slice may be
/// absent; the matching perspective then defaults to neutral.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PanelEvidence {
    pub momentum: Option<MomentumEvidence>,
    pub value: Option<ValueEvidence>,
    pub catalyst: Option<CatalystEvidence>,
}
