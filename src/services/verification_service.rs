use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::analysis::{MetricsCalculator, PeakDetector, Smoother};
use crate::config::Config;
use crate::importers::{ParseResult, TraceImporter};
use crate::models::{MonitorTrace, Parameter, VerificationMetrics};
use crate::scoring::{ToleranceConfig, ToleranceScorer, VerificationOutcome};

/// Per-run location flags and smoothing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VerificationContext {
    pub is_critical: bool,
    pub is_surcharged: bool,
    pub is_depth_only: bool,
    pub smoothing_fraction: f64,
}

impl VerificationContext {
    pub fn tolerance_config(&self) -> ToleranceConfig {
        ToleranceConfig::for_context(self.is_critical, self.is_surcharged)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TraceVerification {
    pub page_index: usize,
    pub obs_location_name: String,
    pub pred_location_name: String,
    pub upstream_end: bool,
    pub flow_metrics: Option<VerificationMetrics>,
    pub depth_metrics: Option<VerificationMetrics>,
    pub outcome: VerificationOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileVerification {
    pub verifications: Vec<TraceVerification>,
    pub predicted_profiles: Vec<String>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Import, metric and scoring pipeline. Holds no mutable state, so one
/// instance can be shared across threads.
#[derive(Debug, Clone, Default)]
pub struct VerificationService {
    importer: TraceImporter,
    calculator: MetricsCalculator,
}

impl VerificationService {
    pub fn new(importer: TraceImporter, calculator: MetricsCalculator) -> Self {
        Self {
            importer,
            calculator,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let detector = PeakDetector::new(Smoother::default());
        Self {
            importer: TraceImporter::new().with_profile_index(config.profile_index),
            calculator: MetricsCalculator::new(detector, config.peak_params()),
        }
    }

    pub fn parse_file(&self, bytes: &[u8]) -> ParseResult {
        self.importer.parse_file(bytes)
    }

    /// Metrics and scores for one trace. A parameter is only evaluated when
    /// both of its series are present; flow is skipped in depth-only mode.
    #[instrument(skip(self, trace, context), fields(obs = %trace.obs_location_name, pred = %trace.pred_location_name))]
    pub fn verify_trace(
        &self,
        trace: &MonitorTrace,
        context: &VerificationContext,
    ) -> TraceVerification {
        let flow_metrics = (trace.has_flow() && !context.is_depth_only).then(|| {
            self.calculator.calculate_all_metrics(
                &trace.obs_flow,
                &trace.pred_flow,
                &trace.timestamps,
                Parameter::Flow,
                trace.timestep_minutes,
                context.smoothing_fraction,
            )
        });

        let depth_metrics = trace.has_depth().then(|| {
            self.calculator.calculate_all_metrics(
                &trace.obs_depth,
                &trace.pred_depth,
                &trace.timestamps,
                Parameter::Depth,
                trace.timestep_minutes,
                context.smoothing_fraction,
            )
        });

        if flow_metrics.is_none() && depth_metrics.is_none() {
            debug!("No paired flow or depth series to verify");
        }

        let scorer = ToleranceScorer::new(context.tolerance_config());
        let outcome = scorer.score(
            flow_metrics.as_ref(),
            depth_metrics.as_ref(),
            context.is_depth_only,
        );

        TraceVerification {
            page_index: trace.page_index,
            obs_location_name: trace.obs_location_name.clone(),
            pred_location_name: trace.pred_location_name.clone(),
            upstream_end: trace.upstream_end,
            flow_metrics,
            depth_metrics,
            outcome,
        }
    }

    /// Parse a file and verify every trace in it, in page order
    pub fn verify_file(&self, bytes: &[u8], context: &VerificationContext) -> FileVerification {
        let parsed = self.parse_file(bytes);

        let verifications: Vec<TraceVerification> = parsed
            .monitors
            .iter()
            .map(|trace| self.verify_trace(trace, context))
            .collect();

        info!(
            "Verified {} traces ({} page errors)",
            verifications.len(),
            parsed.errors.len()
        );

        FileVerification {
            verifications,
            predicted_profiles: parsed.predicted_profiles,
            errors: parsed.errors,
            warnings: parsed.warnings,
        }
    }
}
