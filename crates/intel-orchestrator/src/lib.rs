//! Per-instrument evaluation cycle: gather every engine's reading
//! concurrently (each behind its own timeout), run the divergence detector
//! and consensus panel, fuse everything against a calibration snapshot, and
//! hand back one `IntelligenceBundle`.
//!
//! A single engine timing out degrades only that reading to fallback; the
//! cycle itself never fails on data-quality gaps. Batch evaluation runs in
//! small chunks with an explicit inter-chunk delay to respect downstream
//! collaborator rate limits.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use consensus_panel::{ConsensusPanel, PanelEvidence};
use divergence_detector::DivergenceDetector;
use fusion_engine::FusionEngine;
use intel_core::{
    CalibrationSnapshot, EngineId, Instrument, IntelError, IntelligenceBundle, SignalEngine,
    SignalReading, TradeDirection,
};
use serde::{Deserialize, Serialize};
use trade_planner::{PlanContext, RiskTier, TradePlanBuilder};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Per-engine evaluation timeout
    pub engine_timeout_ms: u64,
    /// Instruments evaluated concurrently per batch chunk
    pub batch_chunk_size: usize,
    /// Delay between chunks (back-pressure toward collaborators)
    pub batch_chunk_delay_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            engine_timeout_ms: 2_000,
            batch_chunk_size: 4,
            batch_chunk_delay_ms: 250,
        }
    }
}

/// Everything the external collaborators assemble for one evaluation cycle
#[derive(Debug, Clone)]
pub struct EvaluationRequest {
    pub instrument: Instrument,
    pub evidence: PanelEvidence,
    pub context: PlanContext,
    pub risk_tier: RiskTier,
}

pub struct IntelOrchestrator {
    engines: Vec<Arc<dyn SignalEngine>>,
    detector: DivergenceDetector,
    panel: ConsensusPanel,
    fusion: FusionEngine,
    planner: TradePlanBuilder,
    config: OrchestratorConfig,
}

impl Default for IntelOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl IntelOrchestrator {
    pub fn new() -> Self {
        Self::with_config(OrchestratorConfig::default())
    }

    pub fn with_config(config: OrchestratorConfig) -> Self {
        Self {
            engines: Vec::new(),
            detector: DivergenceDetector::new(),
            panel: ConsensusPanel::new(),
            fusion: FusionEngine::new(),
            planner: TradePlanBuilder::new(),
            config,
        }
    }

    pub fn register_engine(mut self, engine: Arc<dyn SignalEngine>) -> Self {
        self.engines.push(engine);
        self
    }

    /// Run every registered engine concurrently. Errors, timeouts and
    /// panics all degrade to a fallback reading for that engine only.
    pub async fn gather_readings(
        &self,
        instrument: &Arc<Instrument>,
    ) -> HashMap<EngineId, SignalReading> {
        let timeout = Duration::from_millis(self.config.engine_timeout_ms);
        let expected: Vec<EngineId> = self.engines.iter().map(|e| e.id()).collect();

        let mut set = tokio::task::JoinSet::new();
        for engine in &self.engines {
            let engine = Arc::clone(engine);
            let instrument = Arc::clone(instrument);
            set.spawn(async move {
                let id = engine.id();
                match tokio::time::timeout(timeout, engine.evaluate(&instrument)).await {
                    Ok(Ok(reading)) => (id, reading),
                    Ok(Err(e)) => {
                        tracing::warn!("engine {} failed: {}", id.as_str(), e);
                        (id, SignalReading::fallback(id))
                    }
                    Err(_) => {
                        tracing::warn!("engine {} timed out", id.as_str());
                        (id, SignalReading::fallback(id))
                    }
                }
            });
        }

        let mut readings = HashMap::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((id, reading)) => {
                    readings.insert(id, reading);
                }
                Err(e) => tracing::error!("engine task aborted: {}", e),
            }
        }

        // A panicked task still counts as a degraded engine
        for id in expected {
            readings
                .entry(id)
                .or_insert_with(|| SignalReading::fallback(id));
        }

        readings
    }

    /// Evaluate one instrument against a calibration snapshot. Raises only
    /// on contract violations; every data-quality gap is absorbed into the
    /// bundle's flags.
    pub async fn evaluate(
        &self,
        request: EvaluationRequest,
        calibration: &CalibrationSnapshot,
    ) -> Result<IntelligenceBundle, IntelError> {
        request.instrument.validate()?;
        let ticker = request.instrument.ticker.clone();
        tracing::info!("evaluating {}", ticker);

        let instrument = Arc::new(request.instrument);
        let readings = self.gather_readings(&instrument).await;

        let divergence = self
            .detector
            .detect(&instrument.closes(), &instrument.volumes());
        let consensus = self.panel.evaluate(&request.evidence);
        let fusion = self.fusion.fuse(&readings, &instrument.sector, calibration);

        let mut context = request.context.clone();
        context.divergence = divergence.kind;

        let direction = if fusion.weighted_confidence >= 50.0 {
            TradeDirection::Long
        } else {
            TradeDirection::Short
        };

        let trade_plan = self.planner.build(
            instrument.price,
            direction,
            fusion.weighted_confidence,
            instrument.volatility_profile,
            request.risk_tier,
            &context,
        );

        Ok(IntelligenceBundle {
            ticker,
            generated_at: Utc::now(),
            fusion,
            divergence,
            consensus,
            trade_plan,
        })
    }

    /// Evaluate a batch in chunks. Order of results matches the order of
    /// requests; each instrument fails or succeeds independently.
    pub async fn evaluate_batch(
        &self,
        mut requests: Vec<EvaluationRequest>,
        calibration: &CalibrationSnapshot,
    ) -> Vec<Result<IntelligenceBundle, IntelError>> {
        let chunk_size = self.config.batch_chunk_size.max(1);
        let delay = Duration::from_millis(self.config.batch_chunk_delay_ms);

        let mut results = Vec::with_capacity(requests.len());
        let mut first = true;
        while !requests.is_empty() {
            if !first {
                tokio::time::sleep(delay).await;
            }
            first = false;

            let take = chunk_size.min(requests.len());
            let chunk: Vec<EvaluationRequest> = requests.drain(..take).collect();
            let futures = chunk
                .into_iter()
                .map(|request| self.evaluate(request, calibration));
            results.extend(futures_util::future::join_all(futures).await);
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, Utc};
    use intel_core::{Bar, ConvictionTier, SignalValue, VolatilityProfile};

    struct StaticEngine {
        id: EngineId,
        score: f64,
    }

    #[async_trait]
    impl SignalEngine for StaticEngine {
        fn id(&self) -> EngineId {
            self.id
        }

        async fn evaluate(&self, _instrument: &Instrument) -> Result<SignalReading, IntelError> {
            Ok(SignalReading::new(self.id, SignalValue::Score(self.score)))
        }
    }

    struct FailingEngine {
        id: EngineId,
    }

    #[async_trait]
    impl SignalEngine for FailingEngine {
        fn id(&self) -> EngineId {
            self.id
        }

        async fn evaluate(&self, _instrument: &Instrument) -> Result<SignalReading, IntelError> {
            Err(IntelError::CalculationError("provider down".to_string()))
        }
    }

    struct SlowEngine {
        id: EngineId,
    }

    #[async_trait]
    impl SignalEngine for SlowEngine {
        fn id(&self) -> EngineId {
            self.id
        }

        async fn evaluate(&self, _instrument: &Instrument) -> Result<SignalReading, IntelError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(SignalReading::new(self.id, SignalValue::Score(99.0)))
        }
    }

    fn instrument(ticker: &str) -> Instrument {
        let start = Utc::now() - ChronoDuration::days(80);
        let bars: Vec<Bar> = (0..80)
            .map(|i| {
                let close = 90.0 + i as f64 * 0.125;
                Bar {
                    timestamp: start + ChronoDuration::days(i),
                    open: close - 0.1,
                    high: close + 0.3,
                    low: close - 0.3,
                    close,
                    volume: 1_000.0,
                }
            })
            .collect();

        Instrument {
            ticker: ticker.to_string(),
            sector: "tech".to_string(),
            price: 100.0,
            bars,
            volatility_profile: VolatilityProfile::Medium,
        }
    }

    fn request(ticker: &str) -> EvaluationRequest {
        EvaluationRequest {
            instrument: instrument(ticker),
            evidence: PanelEvidence::default(),
            context: PlanContext::default(),
            risk_tier: RiskTier::Core,
        }
    }

    fn orchestrator_with_fast_timeouts() -> IntelOrchestrator {
        IntelOrchestrator::with_config(OrchestratorConfig {
            engine_timeout_ms: 100,
            batch_chunk_size: 2,
            batch_chunk_delay_ms: 1,
        })
    }

    #[tokio::test]
    async fn failures_degrade_only_their_own_reading() {
        let orchestrator = orchestrator_with_fast_timeouts()
            .register_engine(Arc::new(StaticEngine {
                id: EngineId::Fundamental,
                score: 80.0,
            }))
            .register_engine(Arc::new(FailingEngine {
                id: EngineId::Technical,
            }))
            .register_engine(Arc::new(SlowEngine {
                id: EngineId::Macro,
            }));

        let instrument = Arc::new(instrument("AAPL"));
        let readings = orchestrator.gather_readings(&instrument).await;

        assert_eq!(readings.len(), 3);
        assert!(!readings[&EngineId::Fundamental].is_fallback);
        assert!(readings[&EngineId::Technical].is_fallback);
        assert!(readings[&EngineId::Macro].is_fallback);
    }

    #[tokio::test]
    async fn evaluate_produces_a_complete_bundle() {
        let orchestrator = orchestrator_with_fast_timeouts()
            .register_engine(Arc::new(StaticEngine {
                id: EngineId::Fundamental,
                score: 85.0,
            }))
            .register_engine(Arc::new(StaticEngine {
                id: EngineId::Technical,
                score: 75.0,
            }));

        let bundle = orchestrator
            .evaluate(request("MSFT"), &CalibrationSnapshot::default())
            .await
            .unwrap();

        assert_eq!(bundle.ticker, "MSFT");
        assert!(bundle.fusion.weighted_confidence > 50.0);
        assert_eq!(bundle.trade_plan.direction, TradeDirection::Long);
        assert!(bundle.trade_plan.stop_loss < bundle.trade_plan.entry_primary);
        assert!(bundle.trade_plan.take_profit_1 < bundle.trade_plan.take_profit_2);
        // Panel evidence was empty: every perspective degraded to neutral
        assert_eq!(bundle.consensus.final_score, 50.0);
    }

    #[tokio::test]
    async fn all_engines_down_yields_flagged_avoid() {
        let orchestrator = orchestrator_with_fast_timeouts()
            .register_engine(Arc::new(FailingEngine {
                id: EngineId::Fundamental,
            }))
            .register_engine(Arc::new(SlowEngine {
                id: EngineId::Technical,
            }));

        let bundle = orchestrator
            .evaluate(request("NVDA"), &CalibrationSnapshot::default())
            .await
            .unwrap();

        assert_eq!(bundle.fusion.conviction_tier, ConvictionTier::Avoid);
        assert!(bundle.fusion.blind_spot_warning);
    }

    #[tokio::test]
    async fn malformed_instrument_is_rejected() {
        let orchestrator = orchestrator_with_fast_timeouts();
        let mut req = request("BAD");
        req.instrument.price = f64::NAN;

        let result = orchestrator
            .evaluate(req, &CalibrationSnapshot::default())
            .await;
        assert!(matches!(result, Err(IntelError::MalformedInstrument(_))));
    }

    #[tokio::test]
    async fn batch_preserves_request_order() {
        let orchestrator = orchestrator_with_fast_timeouts().register_engine(Arc::new(
            StaticEngine {
                id: EngineId::Fundamental,
                score: 70.0,
            },
        ));

        let tickers = ["A", "B", "C", "D", "E"];
        let requests: Vec<EvaluationRequest> = tickers.iter().map(|t| request(t)).collect();

        let results = orchestrator
            .evaluate_batch(requests, &CalibrationSnapshot::default())
            .await;

        assert_eq!(results.len(), tickers.len());
        for (ticker, result) in tickers.iter().zip(&results) {
            assert_eq!(result.as_ref().unwrap().ticker, *ticker);
        }
    }
}
