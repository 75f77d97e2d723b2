use async_trait::async_trait;

use crate::error::IntelError;
use crate::types::{EngineId, Instrument, SignalReading};

/// A named sub-model producing one partial signal for an instrument.
///
/// Implemented by external data-provider/analytics collaborators. The
/// orchestrator runs every registered engine concurrently with its own
/// timeout; an engine that errors or times out degrades to a fallback
/// reading rather than failing the cycle.
#[async_trait]
pub trait SignalEngine: Send + Sync {
    fn id(&self) -> EngineId;

    async fn evaluate(&self, instrument: &Instrument) -> Result<SignalReading, IntelError>;
}
