use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};

/// Output value standing in for "could not be computed"
pub const NOT_COMPUTABLE_SENTINEL: f64 = -99999.0;

/// Output value for a percentage whose base was zero
pub const UNBOUNDED_SENTINEL: f64 = 99999.0;

/// One monitoring location read from one page of an interchange file.
///
/// Every non-empty series has the same length as `timestamps`; columns that
/// run short are zero-filled.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorTrace {
    /// 1-based page number within the source file
    pub page_index: usize,
    pub obs_location_name: String,
    pub pred_location_name: String,
    pub upstream_end: bool,
    pub rainfall_profile: Option<String>,
    /// Header of the predicted column chosen by the profile index
    pub predicted_profile: Option<String>,
    pub timestep_minutes: i64,
    pub predicted_timestep_minutes: Option<i64>,
    pub timestamps: Vec<NaiveDateTime>,
    pub obs_flow: Vec<f64>,
    pub pred_flow: Vec<f64>,
    pub obs_depth: Vec<f64>,
    pub pred_depth: Vec<f64>,
    pub obs_velocity: Vec<f64>,
    pub pred_velocity: Vec<f64>,
    pub rainfall: Option<Vec<f64>>,
}

impl MonitorTrace {
    pub fn has_flow(&self) -> bool {
        !self.obs_flow.is_empty() && !self.pred_flow.is_empty()
    }

    pub fn has_depth(&self) -> bool {
        !self.obs_depth.is_empty() && !self.pred_depth.is_empty()
    }
}

/// A local maximum found in a (smoothed) series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Peak {
    pub index: usize,
    pub timestamp: NaiveDateTime,
    /// Taken from the smoothed series
    pub value: f64,
    pub prominence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Parameter {
    Flow,
    Depth,
}

impl std::fmt::Display for Parameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Parameter::Flow => write!(f, "FLOW"),
            Parameter::Depth => write!(f, "DEPTH"),
        }
    }
}

/// A metric result that keeps "not computable" apart from a real number.
///
/// Serializes to the bare number, or to the legacy sentinels
/// (`-99999.0` / `99999.0`) for the two non-value cases.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Value(f64),
    NotComputable,
    /// Percentage relative to a zero base
    Unbounded,
}

impl MetricValue {
    /// Wraps a computed number; NaN and infinities become `NotComputable`.
    pub fn from_f64(value: f64) -> Self {
        if value.is_finite() {
            MetricValue::Value(value)
        } else {
            MetricValue::NotComputable
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            MetricValue::Value(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_computable(&self) -> bool {
        matches!(self, MetricValue::Value(_))
    }

    pub fn to_sentinel(&self) -> f64 {
        match self {
            MetricValue::Value(v) => *v,
            MetricValue::NotComputable => NOT_COMPUTABLE_SENTINEL,
            MetricValue::Unbounded => UNBOUNDED_SENTINEL,
        }
    }

    /// Magnitude used when picking the worst of several signed values.
    /// `Unbounded` outranks everything.
    pub(crate) fn magnitude(&self) -> f64 {
        match self {
            MetricValue::Value(v) => v.abs(),
            MetricValue::Unbounded => f64::INFINITY,
            MetricValue::NotComputable => f64::NEG_INFINITY,
        }
    }
}

impl Serialize for MetricValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.to_sentinel())
    }
}

/// Fit summary for one parameter of one trace
#[derive(Debug, Clone, Serialize)]
pub struct VerificationMetrics {
    pub parameter: Parameter,
    pub nse: MetricValue,
    pub kge: MetricValue,
    pub cv_obs: MetricValue,
    pub peak_time_diff_hrs: MetricValue,
    pub peak_diff_pct: MetricValue,
    pub peak_diff_abs: MetricValue,
    /// Flow only; always `None` for depth
    pub volume_diff_pct: Option<MetricValue>,
    pub obs_peaks: Vec<Peak>,
    pub pred_peaks: Vec<Peak>,
}

impl VerificationMetrics {
    /// Every metric set to not-computable, used when the inputs are unusable
    pub fn not_computable(parameter: Parameter) -> Self {
        Self {
            parameter,
            nse: MetricValue::NotComputable,
            kge: MetricValue::NotComputable,
            cv_obs: MetricValue::NotComputable,
            peak_time_diff_hrs: MetricValue::NotComputable,
            peak_diff_pct: MetricValue::NotComputable,
            peak_diff_abs: MetricValue::NotComputable,
            volume_diff_pct: match parameter {
                Parameter::Flow => Some(MetricValue::NotComputable),
                Parameter::Depth => None,
            },
            obs_peaks: Vec::new(),
            pred_peaks: Vec::new(),
        }
    }
}
