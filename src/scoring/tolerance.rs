/// Verification tolerances for one location context
use serde::Serialize;

/// Allowance beyond an absolute depth tolerance that still scores FAIR (m)
pub const DEPTH_NEAR_MISS_M: f64 = 0.05;

/// Allowance beyond a percentage tolerance that still scores FAIR (points)
pub const PERCENT_NEAR_MISS: f64 = 5.0;

/// Allowance beyond a timing tolerance that still scores FAIR (hours)
pub const TIMING_NEAR_MISS_HRS: f64 = 0.25;

/// Allowance below the NSE threshold that still scores FAIR
pub const NSE_NEAR_MISS: f64 = 0.1;

/// Which depth peak rule applies at a location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DepthContext {
    /// Symmetric absolute tolerance only
    Critical,
    /// Asymmetric absolute envelope
    Surcharged,
    /// Absolute or percentage tolerance, whichever passes
    General,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToleranceConfig {
    pub context: DepthContext,

    // Flow
    pub flow_timing_tolerance_hrs: f64,
    pub flow_peak_tolerance_upper_pct: f64,
    pub flow_peak_tolerance_lower_pct: f64,
    pub flow_volume_tolerance_upper_pct: f64,
    pub flow_volume_tolerance_lower_pct: f64,
    pub nse_threshold: f64,

    // Depth
    pub depth_timing_tolerance_hrs: f64,
    pub depth_peak_tolerance_abs_m: f64,
    pub depth_peak_tolerance_pct: f64,
    pub depth_surcharged_upper_m: f64,
    pub depth_surcharged_lower_m: f64,
}

impl ToleranceConfig {
    /// Tight preset for critical locations: absolute depth tolerance only
    pub fn critical() -> Self {
        Self {
            context: DepthContext::Critical,
            ..Self::general()
        }
    }

    /// Preset for ordinary, non-surcharged locations
    pub fn general() -> Self {
        Self {
            context: DepthContext::General,
            flow_timing_tolerance_hrs: 0.5,
            flow_peak_tolerance_upper_pct: 25.0,
            flow_peak_tolerance_lower_pct: 15.0,
            flow_volume_tolerance_upper_pct: 20.0,
            flow_volume_tolerance_lower_pct: 10.0,
            nse_threshold: 0.5,
            depth_timing_tolerance_hrs: 0.5,
            depth_peak_tolerance_abs_m: 0.1,
            depth_peak_tolerance_pct: 10.0,
            depth_surcharged_upper_m: 0.5,
            depth_surcharged_lower_m: 0.1,
        }
    }

    /// Preset selected from the location flags. Critical wins over surcharged.
    pub fn for_context(is_critical: bool, is_surcharged: bool) -> Self {
        if is_critical {
            Self::critical()
        } else if is_surcharged {
            Self::general().with_context(DepthContext::Surcharged)
        } else {
            Self::general()
        }
    }

    pub fn with_context(mut self, context: DepthContext) -> Self {
        self.context = context;
        self
    }

    pub fn is_critical(&self) -> bool {
        self.context == DepthContext::Critical
    }

    pub fn is_surcharged(&self) -> bool {
        self.context == DepthContext::Surcharged
    }
}

impl Default for ToleranceConfig {
    fn default() -> Self {
        Self::general()
    }
}
