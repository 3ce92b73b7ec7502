/// Fit statistics between an observed and a predicted series
///
/// # Metrics
///
/// - **NSE**: `1 - SSE / SS_obs`; 0 when the observed series is constant
/// - **KGE**: `1 - sqrt((r-1)^2 + (a-1)^2 + (b-1)^2)` with `a = sd_pred/sd_obs`,
///   `b = mean_pred/mean_obs`; `r = -1` when correlation is undefined
/// - **CV**: `sd_obs / mean_obs`; 0 when the mean is zero
/// - **Peak timing**: worst signed hour offset between matched peaks, both directions
/// - **Peak magnitude**: worst signed `pred - obs` over predicted peaks, as % and absolute
/// - **Volume** (flow only): `(V_pred - V_obs) / V_obs` as %
///
/// Standard deviations are population (divide by n).
use chrono::NaiveDateTime;
use tracing::{debug, instrument};

use crate::analysis::peak_detector::{find_closest_peak, PeakDetector, PeakParams};
use crate::models::{MetricValue, Parameter, Peak, VerificationMetrics};

#[derive(Debug, Clone, Default)]
pub struct MetricsCalculator {
    detector: PeakDetector,
    peak_params: PeakParams,
}

impl MetricsCalculator {
    pub fn new(detector: PeakDetector, peak_params: PeakParams) -> Self {
        Self {
            detector,
            peak_params,
        }
    }

    /// Compute every metric for one parameter.
    ///
    /// `obs`, `pred` and `timestamps` must share one length of at least 2;
    /// otherwise every metric is not computable.
    #[instrument(skip(self, obs, pred, timestamps), fields(samples = obs.len()))]
    pub fn calculate_all_metrics(
        &self,
        obs: &[f64],
        pred: &[f64],
        timestamps: &[NaiveDateTime],
        parameter: Parameter,
        timestep_minutes: i64,
        smoothing_fraction: f64,
    ) -> VerificationMetrics {
        if obs.len() < 2 || obs.len() != pred.len() || obs.len() != timestamps.len() {
            debug!(
                "Insufficient data for {} metrics (obs {}, pred {}, timestamps {})",
                parameter,
                obs.len(),
                pred.len(),
                timestamps.len()
            );
            return VerificationMetrics::not_computable(parameter);
        }

        let obs_peaks =
            self.detector
                .detect_peaks(obs, timestamps, smoothing_fraction, &self.peak_params);
        let pred_peaks =
            self.detector
                .detect_peaks(pred, timestamps, smoothing_fraction, &self.peak_params);
        debug!(
            "{}: {} observed peaks, {} predicted peaks",
            parameter,
            obs_peaks.len(),
            pred_peaks.len()
        );

        let (peak_diff_pct, peak_diff_abs) = peak_magnitude_difference(&obs_peaks, &pred_peaks);

        VerificationMetrics {
            parameter,
            nse: nse(obs, pred),
            kge: kge(obs, pred),
            cv_obs: coefficient_of_variation(obs),
            peak_time_diff_hrs: peak_time_difference(&obs_peaks, &pred_peaks),
            peak_diff_pct,
            peak_diff_abs,
            volume_diff_pct: match parameter {
                Parameter::Flow => Some(volume_difference(obs, pred, timestep_minutes)),
                Parameter::Depth => None,
            },
            obs_peaks,
            pred_peaks,
        }
    }
}

fn mean(x: &[f64]) -> f64 {
    x.iter().sum::<f64>() / x.len() as f64
}

fn std_dev(x: &[f64], mean: f64) -> f64 {
    (x.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / x.len() as f64).sqrt()
}

/// Nash-Sutcliffe efficiency
pub fn nse(obs: &[f64], pred: &[f64]) -> MetricValue {
    if obs.len() < 2 || obs.len() != pred.len() {
        return MetricValue::NotComputable;
    }

    let obs_mean = mean(obs);
    let sse: f64 = obs.iter().zip(pred).map(|(o, p)| (o - p).powi(2)).sum();
    let ss_obs: f64 = obs.iter().map(|o| (o - obs_mean).powi(2)).sum();

    if ss_obs == 0.0 {
        return MetricValue::Value(0.0);
    }
    MetricValue::from_f64(1.0 - sse / ss_obs)
}

/// Pearson correlation; `None` when either series has no variance
fn pearson(obs: &[f64], pred: &[f64]) -> Option<f64> {
    let obs_mean = mean(obs);
    let pred_mean = mean(pred);

    let mut cov = 0.0;
    let mut var_obs = 0.0;
    let mut var_pred = 0.0;
    for (o, p) in obs.iter().zip(pred) {
        let dobs = o - obs_mean;
        let dpred = p - pred_mean;
        cov += dobs * dpred;
        var_obs += dobs * dobs;
        var_pred += dpred * dpred;
    }

    if var_obs == 0.0 || var_pred == 0.0 {
        return None;
    }
    let r = cov / (var_obs * var_pred).sqrt();
    r.is_finite().then_some(r)
}

/// Kling-Gupta efficiency
pub fn kge(obs: &[f64], pred: &[f64]) -> MetricValue {
    if obs.len() < 2 || obs.len() != pred.len() {
        return MetricValue::NotComputable;
    }

    let obs_mean = mean(obs);
    let pred_mean = mean(pred);
    let obs_sd = std_dev(obs, obs_mean);
    let pred_sd = std_dev(pred, pred_mean);

    if obs_sd == 0.0 || obs_mean == 0.0 {
        return MetricValue::NotComputable;
    }

    let r = pearson(obs, pred).unwrap_or(-1.0);
    let alpha = pred_sd / obs_sd;
    let beta = pred_mean / obs_mean;

    MetricValue::from_f64(
        1.0 - ((r - 1.0).powi(2) + (alpha - 1.0).powi(2) + (beta - 1.0).powi(2)).sqrt(),
    )
}

/// Coefficient of variation of the observed series
pub fn coefficient_of_variation(obs: &[f64]) -> MetricValue {
    if obs.len() < 2 {
        return MetricValue::NotComputable;
    }

    let obs_mean = mean(obs);
    if obs_mean == 0.0 {
        return MetricValue::Value(0.0);
    }
    MetricValue::from_f64(std_dev(obs, obs_mean) / obs_mean)
}

/// Replace `worst` when `candidate` is at least as large in magnitude, so the
/// last of several equal extremes is reported.
fn keep_worst(worst: &mut Option<MetricValue>, candidate: MetricValue) {
    let replace = match worst {
        None => true,
        Some(current) => candidate.magnitude() >= current.magnitude(),
    };
    if replace {
        *worst = Some(candidate);
    }
}

fn hours_between(from: &Peak, to: &Peak) -> f64 {
    (to.timestamp - from.timestamp).num_seconds() as f64 / 3600.0
}

/// Worst timing offset (hours, predicted minus observed) across both matching
/// directions. Not computable if either side has no peaks.
pub fn peak_time_difference(obs_peaks: &[Peak], pred_peaks: &[Peak]) -> MetricValue {
    if obs_peaks.is_empty() || pred_peaks.is_empty() {
        return MetricValue::NotComputable;
    }

    let mut worst = None;
    for obs in obs_peaks {
        if let Some(pred) = find_closest_peak(obs, pred_peaks) {
            keep_worst(&mut worst, MetricValue::from_f64(hours_between(obs, pred)));
        }
    }
    for pred in pred_peaks {
        if let Some(obs) = find_closest_peak(pred, obs_peaks) {
            keep_worst(&mut worst, MetricValue::from_f64(hours_between(obs, pred)));
        }
    }

    worst.unwrap_or(MetricValue::NotComputable)
}

/// Worst peak magnitude difference over predicted peaks, each matched to its
/// closest observed peak. Returns `(percent, absolute)`; the two are chosen
/// independently.
pub fn peak_magnitude_difference(
    obs_peaks: &[Peak],
    pred_peaks: &[Peak],
) -> (MetricValue, MetricValue) {
    if obs_peaks.is_empty() || pred_peaks.is_empty() {
        return (MetricValue::NotComputable, MetricValue::NotComputable);
    }

    let mut worst_pct = None;
    let mut worst_abs = None;
    for pred in pred_peaks {
        let Some(obs) = find_closest_peak(pred, obs_peaks) else {
            continue;
        };
        let diff = pred.value - obs.value;
        let pct = if obs.value == 0.0 {
            MetricValue::Unbounded
        } else {
            MetricValue::from_f64(diff / obs.value * 100.0)
        };
        keep_worst(&mut worst_pct, pct);
        keep_worst(&mut worst_abs, MetricValue::from_f64(diff));
    }

    (
        worst_pct.unwrap_or(MetricValue::NotComputable),
        worst_abs.unwrap_or(MetricValue::NotComputable),
    )
}

/// Percentage difference in total volume. Series are rates per second, so
/// each sample stands for `timestep_minutes * 60` seconds.
pub fn volume_difference(obs: &[f64], pred: &[f64], timestep_minutes: i64) -> MetricValue {
    if obs.len() < 2 || obs.len() != pred.len() {
        return MetricValue::NotComputable;
    }

    let seconds = (timestep_minutes * 60) as f64;
    let obs_volume: f64 = obs.iter().sum::<f64>() * seconds;
    let pred_volume: f64 = pred.iter().sum::<f64>() * seconds;

    if obs_volume == 0.0 {
        return MetricValue::Value(0.0);
    }
    MetricValue::from_f64((pred_volume - obs_volume) / obs_volume * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn clock(n: usize) -> Vec<NaiveDateTime> {
        let start = NaiveDateTime::parse_from_str("2024-02-01 00:00", "%Y-%m-%d %H:%M").unwrap();
        (0..n).map(|i| start + Duration::minutes(15 * i as i64)).collect()
    }

    fn peak(t: &[NaiveDateTime], index: usize, value: f64) -> Peak {
        Peak {
            index,
            timestamp: t[index],
            value,
            prominence: value,
        }
    }

    #[test]
    fn test_nse_perfect_fit() {
        let obs = [1.0, 3.0, 2.0, 5.0];
        assert_eq!(nse(&obs, &obs), MetricValue::Value(1.0));
    }

    #[test]
    fn test_nse_mean_prediction_is_zero() {
        let obs = [1.0, 2.0, 3.0];
        let pred = [2.0, 2.0, 2.0];
        assert_eq!(nse(&obs, &pred), MetricValue::Value(0.0));
    }

    #[test]
    fn test_nse_constant_observed_is_zero() {
        assert_eq!(nse(&[2.0, 2.0, 2.0], &[1.0, 2.0, 3.0]), MetricValue::Value(0.0));
    }

    #[test]
    fn test_kge_perfect_fit() {
        let obs = [1.0, 3.0, 2.0, 5.0];
        let value = kge(&obs, &obs).value().unwrap();
        assert!((value - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_kge_constant_prediction_uses_worst_correlation() {
        // r = -1, alpha = 0, beta = 1 -> 1 - sqrt(4 + 1) = 1 - sqrt(5)
        let obs = [1.0, 2.0, 3.0];
        let pred = [2.0, 2.0, 2.0];
        let value = kge(&obs, &pred).value().unwrap();
        assert!((value - (1.0 - 5.0_f64.sqrt())).abs() < 1e-12);
    }

    #[test]
    fn test_kge_zero_mean_not_computable() {
        assert_eq!(kge(&[-1.0, 1.0], &[-1.0, 1.0]), MetricValue::NotComputable);
        assert_eq!(kge(&[1.0, 1.0], &[1.0, 2.0]), MetricValue::NotComputable);
    }

    #[test]
    fn test_cv() {
        // mean 2, population sd 1
        let value = coefficient_of_variation(&[1.0, 3.0]).value().unwrap();
        assert!((value - 0.5).abs() < 1e-12);
        assert_eq!(coefficient_of_variation(&[-1.0, 1.0]), MetricValue::Value(0.0));
    }

    #[test]
    fn test_volume_difference() {
        let value = volume_difference(&[1.0, 1.0], &[1.5, 1.5], 5).value().unwrap();
        assert!((value - 50.0).abs() < 1e-12);
        assert_eq!(volume_difference(&[0.0, 0.0], &[1.0, 1.0], 5), MetricValue::Value(0.0));
        assert_eq!(volume_difference(&[1.0], &[1.0], 5), MetricValue::NotComputable);
    }

    #[test]
    fn test_peak_time_difference_is_signed_worst() {
        let t = clock(20);
        let obs = vec![peak(&t, 4, 1.0), peak(&t, 12, 1.0)];
        // First pred peak is 1h late, second 30 min early
        let pred = vec![peak(&t, 8, 1.0), peak(&t, 10, 1.0)];
        let value = peak_time_difference(&obs, &pred).value().unwrap();
        assert!((value - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_peak_time_difference_tie_takes_last() {
        let t = clock(20);
        let obs = vec![peak(&t, 4, 1.0), peak(&t, 12, 1.0)];
        // 30 min late for the first, 30 min early for the second
        let pred = vec![peak(&t, 6, 1.0), peak(&t, 10, 1.0)];
        assert_eq!(peak_time_difference(&obs, &pred), MetricValue::Value(-0.5));
    }

    #[test]
    fn test_peak_time_difference_needs_both_sides() {
        let t = clock(5);
        assert_eq!(
            peak_time_difference(&[peak(&t, 1, 1.0)], &[]),
            MetricValue::NotComputable
        );
    }

    #[test]
    fn test_peak_magnitude_difference() {
        let t = clock(20);
        let obs = vec![peak(&t, 4, 2.0), peak(&t, 12, 1.0)];
        let pred = vec![peak(&t, 5, 2.2), peak(&t, 12, 0.7)];
        let (pct, abs) = peak_magnitude_difference(&obs, &pred);
        assert!((pct.value().unwrap() + 30.0).abs() < 1e-9);
        assert!((abs.value().unwrap() + 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_peak_magnitude_zero_observed_is_unbounded() {
        let t = clock(5);
        let (pct, abs) = peak_magnitude_difference(&[peak(&t, 2, 0.0)], &[peak(&t, 2, 0.5)]);
        assert_eq!(pct, MetricValue::Unbounded);
        assert_eq!(abs, MetricValue::Value(0.5));
    }

    #[test]
    fn test_short_series_not_computable() {
        let calc = MetricsCalculator::default();
        let t = clock(1);
        let flow = calc.calculate_all_metrics(&[1.0], &[1.0], &t, Parameter::Flow, 2, 0.0);
        assert_eq!(flow.nse, MetricValue::NotComputable);
        assert_eq!(flow.volume_diff_pct, Some(MetricValue::NotComputable));
        let depth = calc.calculate_all_metrics(&[1.0], &[1.0], &t, Parameter::Depth, 2, 0.0);
        assert_eq!(depth.kge, MetricValue::NotComputable);
        assert!(depth.volume_diff_pct.is_none());
    }
}
