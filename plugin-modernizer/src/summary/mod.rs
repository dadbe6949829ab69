//! Run summary types and helpers.

mod result;
mod run_summary;

pub use result::{UnitOutcome, UnitReport};
pub use run_summary::RunSummary;
