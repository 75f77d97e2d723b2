use intel_core::{AgreementLevel, ConsensusLabel, ConsensusVerdict, PerspectiveOpinion, Stance};

use crate::evidence::{CatalystEvidence, MomentumEvidence, PanelEvidence, ValueEvidence};

const BULL_THRESHOLD: f64 = 60.0;
const BEAR_THRESHOLD: f64 = 40.0;

/// Reconciles three independently evaluated perspectives into one verdict.
/// Pure function over the evidence slices; no I/O.
#[derive(Debug, Clone, Default)]
pub struct ConsensusPanel;

impl ConsensusPanel {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(&self, evidence: &PanelEvidence) -> ConsensusVerdict {
        let momentum = evidence
            .momentum
            .as_ref()
            .map(evaluate_momentum)
            .unwrap_or_else(PerspectiveOpinion::data_missing);
        let value = evidence
            .value
            .as_ref()
            .map(evaluate_value)
            .unwrap_or_else(PerspectiveOpinion::data_missing);
        let catalyst = evidence
            .catalyst
            .as_ref()
            .map(evaluate_catalyst)
            .unwrap_or_else(PerspectiveOpinion::data_missing);

        let final_score = (momentum.score + value.score + catalyst.score) / 3.0;
        let agreement_level = agreement(&[momentum.verdict, value.verdict, catalyst.verdict]);
        let consensus_label = ConsensusLabel::from_score(final_score);

        tracing::debug!(
            "panel verdicts {:?}/{:?}/{:?} -> {:?} ({:?}, score {:.1})",
            momentum.verdict,
            value.verdict,
            catalyst.verdict,
            consensus_label,
            agreement_level,
            final_score
        );

        ConsensusVerdict {
            momentum,
            value,
            catalyst,
            final_score,
            consensus_label,
            agreement_level,
        }
    }
}

fn verdict_from_score(score: f64) -> Stance {
    if score > BULL_THRESHOLD {
        Stance::Bull
    } else if score < BEAR_THRESHOLD {
        Stance::Bear
    } else {
        Stance::Neutral
    }
}

/// Agreement is a deterministic function of the three verdicts. Three
/// matching non-neutral calls are unanimous; three matching neutrals count
/// only as a majority since nobody took a side.
fn agreement(verdicts: &[Stance; 3]) -> AgreementLevel {
    let [a, b, c] = verdicts;
    if a == b && b == c {
        if *a == Stance::Neutral {
            AgreementLevel::Majority
        } else {
            AgreementLevel::Unanimous
        }
    } else if a == b || b == c || a == c {
        AgreementLevel::Majority
    } else {
        AgreementLevel::Conflicted
    }
}

fn evaluate_momentum(ev: &MomentumEvidence) -> PerspectiveOpinion {
    let mut score = 50.0;

    score += ev.long_trend_pct.clamp(-20.0, 20.0);
    score += ev.short_trend_pct.clamp(-10.0, 10.0) * 1.5;

    // RSI extremes fade the trend; the mid-band leans with it
    if ev.rsi >= 70.0 {
        score -= 10.0;
    } else if ev.rsi <= 30.0 {
        score += 10.0;
    } else {
        score += (ev.rsi - 50.0) * 0.3;
    }

    let score = score.clamp(0.0, 100.0);
    let reasoning = format!(
        "trend {:+.1}%/{:+.1}% (short/long), RSI {:.0}",
        ev.short_trend_pct, ev.long_trend_pct, ev.rsi
    );

    PerspectiveOpinion {
        score,
        verdict: verdict_from_score(score),
        reasoning,
    }
}

fn evaluate_value(ev: &ValueEvidence) -> PerspectiveOpinion {
    let mut adjustments: Vec<(&str, f64)> = Vec::new();

    if let Some(pe) = ev.pe_ratio {
        let adj = if pe < 12.0 {
            15.0
        } else if pe < 20.0 {
            5.0
        } else if pe > 35.0 {
            -15.0
        } else if pe > 25.0 {
            -5.0
        } else {
            0.0
        };
        adjustments.push(("P/E", adj));
    }
    if let Some(peg) = ev.peg_ratio {
        let adj = if peg < 1.0 {
            10.0
        } else if peg > 2.0 {
            -10.0
        } else {
            0.0
        };
        adjustments.push(("PEG", adj));
    }
    if let Some(de) = ev.debt_to_equity {
        let adj = if de < 0.5 {
            8.0
        } else if de > 2.0 {
            -12.0
        } else {
            0.0
        };
        adjustments.push(("D/E", adj));
    }
    if let Some(fcf) = ev.fcf_yield_pct {
        let adj = if fcf > 6.0 {
            12.0
        } else if fcf > 3.0 {
            5.0
        } else if fcf < 0.0 {
            -10.0
        } else {
            0.0
        };
        adjustments.push(("FCF yield", adj));
    }

    if adjustments.is_empty() {
        return PerspectiveOpinion {
            score: 50.0,
            verdict: Stance::Neutral,
            reasoning: "no valuation ratios available".to_string(),
        };
    }

    let score = (50.0 + adjustments.iter().map(|(_, a)| a).sum::<f64>()).clamp(0.0, 100.0);
    let drivers: Vec<String> = adjustments
        .iter()
        .filter(|(_, a)| *a != 0.0)
        .map(|(name, a)| format!("{} {:+.0}", name, a))
        .collect();
    let reasoning = if drivers.is_empty() {
        "valuation in line with market".to_string()
    } else {
        drivers.join(", ")
    };

    PerspectiveOpinion {
        score,
        verdict: verdict_from_score(score),
        reasoning,
    }
}

fn evaluate_catalyst(ev: &CatalystEvidence) -> PerspectiveOpinion {
    if ev.headlines.is_empty() {
        return PerspectiveOpinion {
            score: 50.0,
            verdict: Stance::Neutral,
            reasoning: "no recent headlines".to_string(),
        };
    }

    // Recency-weighted mean sentiment; a week halves a headline's pull
    let mut weighted = 0.0;
    let mut total_weight = 0.0;
    for headline in &ev.headlines {
        let weight = 1.0 / (1.0 + headline.age_days.max(0.0) / 7.0);
        weighted += headline.sentiment.clamp(-1.0, 1.0) * weight;
        total_weight += weight;
    }
    let mean_sentiment = weighted / total_weight;

    let score = (50.0 + mean_sentiment * 40.0).clamp(0.0, 100.0);
    let reasoning = format!(
        "{} headlines, recency-weighted sentiment {:+.2}",
        ev.headlines.len(),
        mean_sentiment
    );

    PerspectiveOpinion {
        score,
        verdict: verdict_from_score(score),
        reasoning,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::Headline;

    fn bullish_momentum() -> MomentumEvidence {
        MomentumEvidence {
            short_trend_pct: 4.0,
            long_trend_pct: 15.0,
            rsi: 62.0,
        }
    }

    fn bullish_value() -> ValueEvidence {
        ValueEvidence {
            pe_ratio: Some(11.0),
            peg_ratio: Some(0.8),
            debt_to_equity: Some(0.3),
            fcf_yield_pct: Some(7.0),
        }
    }

    fn bullish_catalyst() -> CatalystEvidence {
        CatalystEvidence {
            headlines: vec![
                Headline {
                    title: "Guidance raised".to_string(),
                    sentiment: 0.8,
                    age_days: 1.0,
                },
                Headline {
                    title: "Contract win".to_string(),
                    sentiment: 0.6,
                    age_days: 3.0,
                },
            ],
        }
    }

    #[test]
    fn three_bulls_are_unanimous() {
        let panel = ConsensusPanel::new();
        let verdict = panel.evaluate(&PanelEvidence {
            momentum: Some(bullish_momentum()),
            value: Some(bullish_value()),
            catalyst: Some(bullish_catalyst()),
        });

        assert_eq!(verdict.momentum.verdict, Stance::Bull);
        assert_eq!(verdict.value.verdict, Stance::Bull);
        assert_eq!(verdict.catalyst.verdict, Stance::Bull);
        assert_eq!(verdict.agreement_level, AgreementLevel::Unanimous);
        assert!(matches!(
            verdict.consensus_label,
            ConsensusLabel::StrongBuy | ConsensusLabel::Buy
        ));
    }

    #[test]
    fn missing_evidence_degrades_to_neutral() {
        let panel = ConsensusPanel::new();
        let verdict = panel.evaluate(&PanelEvidence::default());

        for opinion in [&verdict.momentum, &verdict.value, &verdict.catalyst] {
            assert_eq!(opinion.score, 50.0);
            assert_eq!(opinion.verdict, Stance::Neutral);
            assert_eq!(opinion.reasoning, "data missing");
        }
        assert_eq!(verdict.final_score, 50.0);
        assert_eq!(verdict.consensus_label, ConsensusLabel::Hold);
    }

    #[test]
    fn one_missing_slice_does_not_fail_the_panel() {
        let panel = ConsensusPanel::new();
        let verdict = panel.evaluate(&PanelEvidence {
            momentum: Some(bullish_momentum()),
            value: None,
            catalyst: Some(bullish_catalyst()),
        });

        assert_eq!(verdict.value.reasoning, "data missing");
        assert_eq!(verdict.agreement_level, AgreementLevel::Majority);
    }

    #[test]
    fn split_verdicts_are_conflicted() {
        assert_eq!(
            agreement(&[Stance::Bull, Stance::Bear, Stance::Neutral]),
            AgreementLevel::Conflicted
        );
        assert_eq!(
            agreement(&[Stance::Bull, Stance::Bull, Stance::Bear]),
            AgreementLevel::Majority
        );
        assert_eq!(
            agreement(&[Stance::Neutral, Stance::Neutral, Stance::Neutral]),
            AgreementLevel::Majority
        );
    }

    #[test]
    fn stale_headlines_carry_less_weight() {
        let fresh = evaluate_catalyst(&CatalystEvidence {
            headlines: vec![Headline {
                title: "Beat".to_string(),
                sentiment: 0.9,
                age_days: 0.0,
            }],
        });
        let mixed = evaluate_catalyst(&CatalystEvidence {
            headlines: vec![
                Headline {
                    title: "Beat".to_string(),
                    sentiment: 0.9,
                    age_days: 0.0,
                },
                Headline {
                    title: "Old miss".to_string(),
                    sentiment: -0.9,
                    age_days: 30.0,
                },
            ],
        });

        assert!(fresh.score > mixed.score);
        assert!(mixed.score > 50.0, "fresh positive should dominate the stale negative");
    }
}
