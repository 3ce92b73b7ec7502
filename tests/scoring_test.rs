// Tests for tolerance banding and the overall verification status

use flow_verification::models::{MetricValue, Parameter, VerificationMetrics};
use flow_verification::scoring::scorer::{band_asymmetric, band_at_least, band_symmetric};
use flow_verification::scoring::{
    score_verification_results, Band, DepthContext, OverallStatus, ToleranceConfig,
    ToleranceScorer,
};

fn v(x: f64) -> MetricValue {
    MetricValue::Value(x)
}

fn flow_metrics(nse: f64, timing: f64, peak_pct: f64, volume_pct: f64) -> VerificationMetrics {
    VerificationMetrics {
        nse: v(nse),
        kge: v(0.7),
        cv_obs: v(0.4),
        peak_time_diff_hrs: v(timing),
        peak_diff_pct: v(peak_pct),
        peak_diff_abs: v(0.01),
        volume_diff_pct: Some(v(volume_pct)),
        ..VerificationMetrics::not_computable(Parameter::Flow)
    }
}

fn depth_metrics(timing: f64, abs_m: f64, pct: f64) -> VerificationMetrics {
    VerificationMetrics {
        peak_time_diff_hrs: v(timing),
        peak_diff_abs: v(abs_m),
        peak_diff_pct: v(pct),
        ..VerificationMetrics::not_computable(Parameter::Depth)
    }
}

#[test]
fn test_mixed_flow_and_perfect_depth_is_verified() {
    // NSE OK, the other three flow metrics FAIR: 3 + 2 + 2 + 2
    let flow = flow_metrics(0.8, 0.6, 28.0, 22.0);
    let depth = depth_metrics(0.1, 0.05, 5.0);

    let outcome = score_verification_results(Some(&flow), Some(&depth), false, false, false);

    assert_eq!(outcome.flow_score.total_points, 9);
    assert_eq!(outcome.flow_score.max_points, 12);
    assert_eq!(outcome.depth_score.total_points, 6);
    assert_eq!(outcome.depth_score.max_points, 6);
    assert!((outcome.combined_fraction - 15.0 / 18.0).abs() < 1e-12);
    assert_eq!(outcome.overall_status, OverallStatus::Verified);

    let flow_bands: Vec<Band> = outcome.flow_score.metrics.iter().map(|m| m.band).collect();
    assert_eq!(flow_bands, vec![Band::Ok, Band::Fair, Band::Fair, Band::Fair]);
}

#[test]
fn test_depth_only_ignores_flow() {
    let flow = flow_metrics(-3.0, 5.0, 90.0, 90.0);
    let depth = depth_metrics(0.0, 0.0, 0.0);

    let outcome = score_verification_results(Some(&flow), Some(&depth), false, false, true);

    assert_eq!(outcome.flow_score.max_points, 0);
    assert_eq!(outcome.flow_score.total_points, 0);
    assert!(outcome.flow_score.metrics.is_empty());
    assert_eq!(outcome.depth_score.total_points, 6);
    assert_eq!(outcome.overall_status, OverallStatus::Verified);
}

#[test]
fn test_marginal_at_half() {
    // OK, NO, OK, NO
    let flow = flow_metrics(0.9, 2.0, 0.0, 60.0);
    let outcome = score_verification_results(Some(&flow), None, false, false, false);

    assert_eq!(outcome.flow_score.total_points, 6);
    assert_eq!(outcome.combined_fraction, 0.5);
    assert_eq!(outcome.overall_status, OverallStatus::Marginal);
}

#[test]
fn test_critical_depth_bands() {
    let scorer = ToleranceScorer::new(ToleranceConfig::critical());

    let fair = scorer.score_depth(&depth_metrics(0.0, 0.12, 1.0));
    assert_eq!(fair.metric("peak_depth_diff").unwrap().band, Band::Fair);
    assert_eq!(fair.total_points, 5);

    let no = scorer.score_depth(&depth_metrics(0.0, 0.2, 1.0));
    assert_eq!(no.metric("peak_depth_diff").unwrap().band, Band::No);

    let under = scorer.score_depth(&depth_metrics(0.0, -0.12, -1.0));
    assert_eq!(under.metric("peak_depth_diff").unwrap().band, Band::Fair);
}

#[test]
fn test_general_depth_passes_on_percentage() {
    let scorer = ToleranceScorer::new(ToleranceConfig::general());

    // 0.2 m misses the absolute test but 5% is within tolerance
    let score = scorer.score_depth(&depth_metrics(0.0, 0.2, 5.0));
    assert_eq!(score.metric("peak_depth_diff").unwrap().band, Band::Ok);

    // Both tests fail
    let score = scorer.score_depth(&depth_metrics(0.0, 0.2, 40.0));
    assert_eq!(score.metric("peak_depth_diff").unwrap().band, Band::No);

    // Percentage against a zero base cannot rescue a bad absolute result
    let mut metrics = depth_metrics(0.0, 0.2, 0.0);
    metrics.peak_diff_pct = MetricValue::Unbounded;
    let score = scorer.score_depth(&metrics);
    assert_eq!(score.metric("peak_depth_diff").unwrap().band, Band::No);
}

#[test]
fn test_surcharged_envelope_is_asymmetric() {
    let scorer = ToleranceScorer::new(ToleranceConfig::for_context(false, true));
    assert_eq!(scorer.config().context, DepthContext::Surcharged);

    let band = |abs_m: f64| {
        scorer
            .score_depth(&depth_metrics(0.0, abs_m, 0.0))
            .metric("peak_depth_diff")
            .unwrap()
            .band
    };
    assert_eq!(band(0.4), Band::Ok);
    assert_eq!(band(0.52), Band::Fair);
    assert_eq!(band(-0.1), Band::Ok);
    assert_eq!(band(-0.12), Band::Fair);
    assert_eq!(band(-0.2), Band::No);
}

#[test]
fn test_critical_wins_over_surcharged() {
    let config = ToleranceConfig::for_context(true, true);
    assert!(config.is_critical());
    assert!(!config.is_surcharged());
}

#[test]
fn test_flow_bounds_are_inclusive() {
    let scorer = ToleranceScorer::default();
    let score = scorer.score_flow(&flow_metrics(0.5, -0.5, 25.0, -10.0));

    assert!(score.metrics.iter().all(|m| m.band == Band::Ok));
    assert_eq!(score.total_points, 12);
    assert_eq!(score.score_fraction, 1.0);
}

#[test]
fn test_bands_never_improve_as_error_grows() {
    let steps: Vec<f64> = (0..=60).map(|i| i as f64 * 0.05).collect();

    let checks: [(&str, Box<dyn Fn(f64) -> Band>); 4] = [
        ("timing", Box::new(|x| band_symmetric(v(x), 0.5, 0.25))),
        ("overprediction", Box::new(|x| band_asymmetric(v(x * 20.0), 25.0, 15.0, 5.0))),
        ("underprediction", Box::new(|x| band_asymmetric(v(-x * 20.0), 25.0, 15.0, 5.0))),
        ("depth", Box::new(|x| band_symmetric(v(x / 10.0), 0.1, 0.05))),
    ];

    for (name, band) in &checks {
        let points: Vec<u32> = steps.iter().map(|x| band(*x).points()).collect();
        assert!(
            points.windows(2).all(|w| w[0] >= w[1]),
            "{name} points increased with error: {points:?}"
        );
        assert_eq!(points[0], 3, "{name} should start OK");
        assert_eq!(*points.last().unwrap(), 0, "{name} should end NO");
    }

    let nse_points: Vec<u32> = steps
        .iter()
        .map(|x| band_at_least(v(1.0 - x), 0.5, 0.1).points())
        .collect();
    assert!(nse_points.windows(2).all(|w| w[0] >= w[1]));
}

#[test]
fn test_nothing_scored_is_pending() {
    let outcome = score_verification_results(None, None, false, false, false);
    assert_eq!(outcome.overall_status, OverallStatus::Pending);
    assert_eq!(outcome.combined_fraction, 0.0);
}

#[test]
fn test_all_not_computable_flow_is_not_verified() {
    let flow = VerificationMetrics::not_computable(Parameter::Flow);
    let outcome = score_verification_results(Some(&flow), None, false, false, false);

    assert!(outcome.flow_score.metrics.iter().all(|m| m.band == Band::Na));
    assert_eq!(outcome.flow_score.total_points, 0);
    assert_eq!(outcome.flow_score.max_points, 12);
    assert_eq!(outcome.overall_status, OverallStatus::NotVerified);
}

#[test]
fn test_outcome_serializes_bands_and_sentinels() {
    let flow = VerificationMetrics::not_computable(Parameter::Flow);
    let mut depth = depth_metrics(0.1, 0.05, 2.0);
    depth.peak_diff_pct = MetricValue::Unbounded;

    let outcome = score_verification_results(Some(&flow), Some(&depth), false, false, false);
    let json = serde_json::to_value(&outcome).unwrap();

    assert_eq!(json["overall_status"], "NOT_VERIFIED");
    assert_eq!(json["flow_score"]["parameter"], "FLOW");
    assert_eq!(json["flow_score"]["metrics"][0]["metric"], "nse");
    assert_eq!(json["flow_score"]["metrics"][0]["value"], -99999.0);
    assert_eq!(json["flow_score"]["metrics"][0]["band"], "NA");
    assert_eq!(json["depth_score"]["metrics"][1]["band"], "OK");
    assert_eq!(json["depth_score"]["metrics"][1]["points"], 3);
}

#[test]
fn test_descriptions_name_thresholds() {
    let score = ToleranceScorer::default().score_flow(&flow_metrics(0.8, 0.1, 1.0, 1.0));

    assert_eq!(score.metric("peak_time_diff_hrs").unwrap().description, "±0.50 hrs");
    assert_eq!(score.metric("peak_diff_pct").unwrap().description, "+25% / -15%");
    assert_eq!(score.metric("volume_diff_pct").unwrap().description, "+20% / -10%");
}
