//! Three-perspective reconciliation: momentum, value, and catalyst evidence
//! are evaluated independently and merged into one agreement verdict.
//! A missing evidence slice degrades that perspective to a neutral default
//! instead of failing the evaluation.

pub mod evidence;
pub mod panel;

pub use evidence::{CatalystEvidence, Headline, MomentumEvidence, PanelEvidence, ValueEvidence};
pub use panel::ConsensusPanel;
