// Tolerance banding of verification metrics
//
// - tolerance: ToleranceConfig presets and near-miss margins
// - scorer: per-metric bands, parameter totals and the overall status

pub mod scorer;
pub mod tolerance;

pub use scorer::{
    overall_status, score_verification_results, Band, MetricScore, OverallStatus,
    ParameterScore, ToleranceScorer, VerificationOutcome,
};
pub use tolerance::{DepthContext, ToleranceConfig};
