//! Calibration ledger: learns per-sector confidence multipliers from
//! realized trade outcomes. The refresh job is a scheduled single-writer
//! batch; its upserts are idempotent and safe to re-run. Lookups go through
//! an hourly in-process cache, and a point-in-time snapshot can be taken
//! for injection into fusion calls.

pub mod ledger;
pub mod policy;

pub use ledger::{CalibrationLedger, LedgerConfig, TradeOutcome};
pub use policy::multiplier_for;
