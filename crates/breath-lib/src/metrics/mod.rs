pub mod rate;
pub mod sqi;

pub use rate::{rate, rate_for_snapshot, timed_rate, RateEstimate, UndeterminedReason};
pub use sqi::{evaluate_quality, QualityReport};
