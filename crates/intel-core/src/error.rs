use thiserror::Error;

/// Contract-violation errors. Ordinary data-quality gaps (missing signals,
/// short history, cold calibration) are not errors — they surface as
/// fallback flags and neutral defaults in the output types.
#[derive(Error, Debug)]
pub enum IntelError {
    #[error("Malformed instrument: {0}")]
    MalformedInstrument(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),

    #[error("Store error: {0}")]
    StoreError(String),
}
