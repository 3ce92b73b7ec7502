#![allow(dead_code)]
// Shared fixtures: synthetic hydrographs and interchange file builders

use chrono::{Duration, NaiveDateTime};

pub const SCENARIO_TITLE: &str = r#"Page title is, "Flow Survey Location (Obs.) F01, Model Location (Pred.) D/S N123, Rainfall Profile: 5""#;

pub fn start_time() -> NaiveDateTime {
    NaiveDateTime::parse_from_str("2024-02-01 00:00:00", "%Y-%m-%d %H:%M:%S")
        .expect("valid fixture start time")
}

pub fn clock(n: usize, step_minutes: i64) -> Vec<NaiveDateTime> {
    let start = start_time();
    (0..n)
        .map(|i| start + Duration::minutes(step_minutes * i as i64))
        .collect()
}

/// Base flow plus Gaussian bumps given as (centre sample, height, half-width)
pub fn hydrograph(n: usize, base: f64, bumps: &[(f64, f64, f64)]) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let x = i as f64;
            base + bumps
                .iter()
                .map(|(centre, height, width)| height * (-((x - centre) / width).powi(2)).exp())
                .sum::<f64>()
        })
        .collect()
}

pub fn format_time(ts: &NaiveDateTime) -> String {
    ts.format("%d/%m/%Y,%H:%M:%S").to_string()
}

/// Page with one shared timebase: Date, Time, then one column per header
pub fn single_timebase_page(
    title: &str,
    headers: &[&str],
    timestamps: &[NaiveDateTime],
    columns: &[Vec<f64>],
) -> String {
    let mut page = format!("{title}\nDate,Time,{}\n", headers.join(","));
    for (i, ts) in timestamps.iter().enumerate() {
        let values: Vec<String> = columns.iter().map(|c| format!("{:.6}", c[i])).collect();
        page.push_str(&format!("{},{}\n", format_time(ts), values.join(",")));
    }
    page
}

/// Page with observed flow/depth and predicted flow/depth on one clock
pub fn flow_depth_page(
    title: &str,
    timestamps: &[NaiveDateTime],
    obs_flow: &[f64],
    obs_depth: &[f64],
    pred_flow: &[f64],
    pred_depth: &[f64],
) -> String {
    single_timebase_page(
        title,
        &[
            "Observed Flow (m3/s)",
            "Observed Depth (m)",
            "Predicted Flow (m3/s)",
            "Predicted Depth (m)",
        ],
        timestamps,
        &[
            obs_flow.to_vec(),
            obs_depth.to_vec(),
            pred_flow.to_vec(),
            pred_depth.to_vec(),
        ],
    )
}

pub fn title_for(obs: &str, flag: &str, pred: &str) -> String {
    format!(r#"Page title is, "Flow Survey Location (Obs.) {obs}, Model Location (Pred.) {flag} {pred}""#)
}
