/// Tolerance scoring
///
/// Each metric lands in one band:
///
/// | Band | Points | Meaning                                  |
/// |------|--------|------------------------------------------|
/// | OK   | 3      | within tolerance                         |
/// | FAIR | 2      | within tolerance plus the near-miss margin |
/// | NO   | 0      | outside                                  |
/// | NA   | 0      | metric could not be computed             |
///
/// Flow scores NSE, peak timing, peak magnitude and volume. Depth scores peak
/// timing and peak magnitude, using the rule selected by the location's
/// [`DepthContext`].
use serde::Serialize;
use tracing::{debug, info};

use crate::models::{MetricValue, Parameter, VerificationMetrics};
use crate::scoring::tolerance::{
    DepthContext, ToleranceConfig, DEPTH_NEAR_MISS_M, NSE_NEAR_MISS, PERCENT_NEAR_MISS,
    TIMING_NEAR_MISS_HRS,
};

pub const POINTS_PER_METRIC: u32 = 3;

/// Combined fraction at or above which a trace is verified
pub const VERIFIED_FRACTION: f64 = 0.75;

/// Combined fraction at or above which a trace is marginal
pub const MARGINAL_FRACTION: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Band {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "FAIR")]
    Fair,
    #[serde(rename = "NO")]
    No,
    #[serde(rename = "NA")]
    Na,
}

impl Band {
    pub fn points(&self) -> u32 {
        match self {
            Band::Ok => 3,
            Band::Fair => 2,
            Band::No | Band::Na => 0,
        }
    }

    /// The more favourable of two bands
    fn best(self, other: Band) -> Band {
        if self.points() >= other.points() {
            self
        } else {
            other
        }
    }
}

impl std::fmt::Display for Band {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Band::Ok => "OK",
            Band::Fair => "FAIR",
            Band::No => "NO",
            Band::Na => "NA",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverallStatus {
    Verified,
    Marginal,
    NotVerified,
    Pending,
}

impl std::fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            OverallStatus::Verified => "VERIFIED",
            OverallStatus::Marginal => "MARGINAL",
            OverallStatus::NotVerified => "NOT_VERIFIED",
            OverallStatus::Pending => "PENDING",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricScore {
    pub metric: String,
    pub value: MetricValue,
    pub band: Band,
    pub points: u32,
    /// Applied threshold, e.g. "±0.50 hrs"
    pub description: String,
}

impl MetricScore {
    fn new(metric: &str, value: MetricValue, band: Band, description: String) -> Self {
        Self {
            metric: metric.to_string(),
            value,
            band,
            points: band.points(),
            description,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterScore {
    pub parameter: Parameter,
    pub metrics: Vec<MetricScore>,
    pub total_points: u32,
    pub max_points: u32,
    pub score_fraction: f64,
}

impl ParameterScore {
    pub fn from_metrics(parameter: Parameter, metrics: Vec<MetricScore>) -> Self {
        let total_points = metrics.iter().map(|m| m.points).sum();
        let max_points = POINTS_PER_METRIC * metrics.len() as u32;
        let score_fraction = if max_points == 0 {
            0.0
        } else {
            f64::from(total_points) / f64::from(max_points)
        };

        Self {
            parameter,
            metrics,
            total_points,
            max_points,
            score_fraction,
        }
    }

    /// Nothing scored
    pub fn empty(parameter: Parameter) -> Self {
        Self::from_metrics(parameter, Vec::new())
    }

    pub fn metric(&self, name: &str) -> Option<&MetricScore> {
        self.metrics.iter().find(|m| m.metric == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationOutcome {
    pub flow_score: ParameterScore,
    pub depth_score: ParameterScore,
    pub combined_fraction: f64,
    pub overall_status: OverallStatus,
}

/// `OK` within `tolerance`, `FAIR` within `tolerance + margin`, by magnitude
pub fn band_symmetric(value: MetricValue, tolerance: f64, margin: f64) -> Band {
    band_asymmetric(value, tolerance, tolerance, margin)
}

/// `OK` within `[-lower, +upper]`, `FAIR` within the range widened by `margin`
pub fn band_asymmetric(value: MetricValue, upper: f64, lower: f64, margin: f64) -> Band {
    let Some(v) = value.value() else {
        return Band::Na;
    };

    if v <= upper && v >= -lower {
        Band::Ok
    } else if v <= upper + margin && v >= -(lower + margin) {
        Band::Fair
    } else {
        Band::No
    }
}

/// `OK` at or above `threshold`, `FAIR` at or above `threshold - margin`
pub fn band_at_least(value: MetricValue, threshold: f64, margin: f64) -> Band {
    let Some(v) = value.value() else {
        return Band::Na;
    };

    if v >= threshold {
        Band::Ok
    } else if v >= threshold - margin {
        Band::Fair
    } else {
        Band::No
    }
}

#[derive(Debug, Clone, Default)]
pub struct ToleranceScorer {
    config: ToleranceConfig,
}

impl ToleranceScorer {
    pub fn new(config: ToleranceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ToleranceConfig {
        &self.config
    }

    pub fn score_flow(&self, metrics: &VerificationMetrics) -> ParameterScore {
        let c = &self.config;
        let volume = metrics
            .volume_diff_pct
            .unwrap_or(MetricValue::NotComputable);

        let scores = vec![
            MetricScore::new(
                "nse",
                metrics.nse,
                band_at_least(metrics.nse, c.nse_threshold, NSE_NEAR_MISS),
                format!("≥ {}", c.nse_threshold),
            ),
            MetricScore::new(
                "peak_time_diff_hrs",
                metrics.peak_time_diff_hrs,
                band_symmetric(
                    metrics.peak_time_diff_hrs,
                    c.flow_timing_tolerance_hrs,
                    TIMING_NEAR_MISS_HRS,
                ),
                format!("±{:.2} hrs", c.flow_timing_tolerance_hrs),
            ),
            MetricScore::new(
                "peak_diff_pct",
                metrics.peak_diff_pct,
                band_asymmetric(
                    metrics.peak_diff_pct,
                    c.flow_peak_tolerance_upper_pct,
                    c.flow_peak_tolerance_lower_pct,
                    PERCENT_NEAR_MISS,
                ),
                format!(
                    "+{}% / -{}%",
                    c.flow_peak_tolerance_upper_pct, c.flow_peak_tolerance_lower_pct
                ),
            ),
            MetricScore::new(
                "volume_diff_pct",
                volume,
                band_asymmetric(
                    volume,
                    c.flow_volume_tolerance_upper_pct,
                    c.flow_volume_tolerance_lower_pct,
                    PERCENT_NEAR_MISS,
                ),
                format!(
                    "+{}% / -{}%",
                    c.flow_volume_tolerance_upper_pct, c.flow_volume_tolerance_lower_pct
                ),
            ),
        ];

        ParameterScore::from_metrics(Parameter::Flow, scores)
    }

    pub fn score_depth(&self, metrics: &VerificationMetrics) -> ParameterScore {
        let c = &self.config;

        let timing = MetricScore::new(
            "peak_time_diff_hrs",
            metrics.peak_time_diff_hrs,
            band_symmetric(
                metrics.peak_time_diff_hrs,
                c.depth_timing_tolerance_hrs,
                TIMING_NEAR_MISS_HRS,
            ),
            format!("±{:.2} hrs", c.depth_timing_tolerance_hrs),
        );

        let (band, description) = self.depth_peak_band(metrics);
        let peak = MetricScore::new("peak_depth_diff", metrics.peak_diff_abs, band, description);

        ParameterScore::from_metrics(Parameter::Depth, vec![timing, peak])
    }

    fn depth_peak_band(&self, metrics: &VerificationMetrics) -> (Band, String) {
        let c = &self.config;
        let abs = metrics.peak_diff_abs;

        match c.context {
            DepthContext::Critical => (
                band_symmetric(abs, c.depth_peak_tolerance_abs_m, DEPTH_NEAR_MISS_M),
                format!("±{:.2} m", c.depth_peak_tolerance_abs_m),
            ),
            DepthContext::Surcharged => (
                band_asymmetric(
                    abs,
                    c.depth_surcharged_upper_m,
                    c.depth_surcharged_lower_m,
                    DEPTH_NEAR_MISS_M,
                ),
                format!(
                    "+{:.2} m / -{:.2} m",
                    c.depth_surcharged_upper_m, c.depth_surcharged_lower_m
                ),
            ),
            DepthContext::General => {
                let description = format!(
                    "±{:.2} m or ±{}%",
                    c.depth_peak_tolerance_abs_m, c.depth_peak_tolerance_pct
                );
                let abs_band = band_symmetric(abs, c.depth_peak_tolerance_abs_m, DEPTH_NEAR_MISS_M);
                if abs_band == Band::Na {
                    return (Band::Na, description);
                }
                // Either test passing is enough
                let pct_band = match band_symmetric(
                    metrics.peak_diff_pct,
                    c.depth_peak_tolerance_pct,
                    PERCENT_NEAR_MISS,
                ) {
                    Band::Na => Band::No,
                    band => band,
                };
                (abs_band.best(pct_band), description)
            }
        }
    }

    /// Score both parameters and derive the overall status.
    ///
    /// In depth-only mode flow is never scored, whatever metrics are supplied.
    pub fn score(
        &self,
        flow_metrics: Option<&VerificationMetrics>,
        depth_metrics: Option<&VerificationMetrics>,
        is_depth_only: bool,
    ) -> VerificationOutcome {
        let flow_score = match flow_metrics {
            Some(metrics) if !is_depth_only => self.score_flow(metrics),
            _ => ParameterScore::empty(Parameter::Flow),
        };
        let depth_score = depth_metrics
            .map(|m| self.score_depth(m))
            .unwrap_or_else(|| ParameterScore::empty(Parameter::Depth));

        let combined_fraction = combined_fraction(&flow_score, &depth_score);
        let overall_status = overall_status(&flow_score, &depth_score);

        debug!(
            "Flow {}/{}, depth {}/{}",
            flow_score.total_points,
            flow_score.max_points,
            depth_score.total_points,
            depth_score.max_points
        );
        info!(
            "Verification {} ({:.3}, {:?} context)",
            overall_status, combined_fraction, self.config.context
        );

        VerificationOutcome {
            flow_score,
            depth_score,
            combined_fraction,
            overall_status,
        }
    }
}

fn combined_fraction(flow: &ParameterScore, depth: &ParameterScore) -> f64 {
    let max = flow.max_points + depth.max_points;
    if max == 0 {
        return 0.0;
    }
    f64::from(flow.total_points + depth.total_points) / f64::from(max)
}

/// Status from the combined fraction of both parameter scores
pub fn overall_status(flow: &ParameterScore, depth: &ParameterScore) -> OverallStatus {
    if flow.max_points + depth.max_points == 0 {
        return OverallStatus::Pending;
    }

    let fraction = combined_fraction(flow, depth);
    if fraction >= VERIFIED_FRACTION {
        OverallStatus::Verified
    } else if fraction >= MARGINAL_FRACTION {
        OverallStatus::Marginal
    } else {
        OverallStatus::NotVerified
    }
}

/// Score with one of the preset tolerance configurations
pub fn score_verification_results(
    flow_metrics: Option<&VerificationMetrics>,
    depth_metrics: Option<&VerificationMetrics>,
    is_critical: bool,
    is_surcharged: bool,
    is_depth_only: bool,
) -> VerificationOutcome {
    ToleranceScorer::new(ToleranceConfig::for_context(is_critical, is_surcharged)).score(
        flow_metrics,
        depth_metrics,
        is_depth_only,
    )
}
