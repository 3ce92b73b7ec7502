/// Peak detection and cross-matching
///
/// Peaks are local maxima of the (optionally smoothed) series that survive,
/// in order, a minimum-distance filter, a prominence filter and a width
/// filter measured at half prominence.
use chrono::NaiveDateTime;
use tracing::debug;

use crate::analysis::smoothing::Smoother;
use crate::models::Peak;

/// Width is measured at this fraction of prominence below the peak
const REL_HEIGHT: f64 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub struct PeakParams {
    pub prominence: f64,
    /// Samples, at half prominence
    pub width: f64,
    /// Samples between accepted peaks
    pub distance: usize,
    pub max_count: Option<usize>,
}

impl Default for PeakParams {
    fn default() -> Self {
        Self {
            prominence: 0.0009,
            width: 1.0,
            distance: 1,
            max_count: None,
        }
    }
}

/// Candidate maximum with the bases found while measuring its prominence
#[derive(Debug, Clone, Copy)]
struct Candidate {
    index: usize,
    prominence: f64,
    left_base: usize,
    right_base: usize,
}

#[derive(Debug, Clone, Default)]
pub struct PeakDetector {
    smoother: Smoother,
}

impl PeakDetector {
    pub fn new(smoother: Smoother) -> Self {
        Self { smoother }
    }

    /// Detect peaks in `series`, returned in chronological order.
    ///
    /// Returns nothing for series shorter than 3 samples or when `series`
    /// and `timestamps` differ in length. With `max_count`, the most
    /// prominent peaks are kept.
    pub fn detect_peaks(
        &self,
        series: &[f64],
        timestamps: &[NaiveDateTime],
        smoothing_fraction: f64,
        params: &PeakParams,
    ) -> Vec<Peak> {
        if series.len() < 3 || series.len() != timestamps.len() {
            return Vec::new();
        }

        let smoothed = self.smoother.smooth(series, smoothing_fraction);

        let maxima = local_maxima(&smoothed);
        let spaced = select_by_distance(&smoothed, maxima, params.distance);

        let mut candidates: Vec<Candidate> = spaced
            .into_iter()
            .map(|index| prominence_of(&smoothed, index))
            .filter(|c| c.prominence >= params.prominence)
            .filter(|c| width_of(&smoothed, c) >= params.width)
            .collect();

        if let Some(max_count) = params.max_count {
            if candidates.len() > max_count {
                candidates.sort_by(|a, b| b.prominence.total_cmp(&a.prominence));
                candidates.truncate(max_count);
                candidates.sort_by_key(|c| c.index);
            }
        }

        debug!("Detected {} peaks in {} samples", candidates.len(), series.len());

        candidates
            .into_iter()
            .map(|c| Peak {
                index: c.index,
                timestamp: timestamps[c.index],
                value: smoothed[c.index],
                prominence: c.prominence,
            })
            .collect()
    }
}

/// The candidate closest in time to `target`; first one wins a tie
pub fn find_closest_peak<'a>(target: &Peak, candidates: &'a [Peak]) -> Option<&'a Peak> {
    candidates
        .iter()
        .min_by_key(|c| (c.timestamp - target.timestamp).num_seconds().abs())
}

/// Indices strictly higher than both neighbours. A flat top counts once, at
/// its middle sample.
fn local_maxima(x: &[f64]) -> Vec<usize> {
    let mut maxima = Vec::new();
    let last = x.len().saturating_sub(1);
    let mut i = 1;

    while i < last {
        if x[i - 1] < x[i] {
            let mut ahead = i + 1;
            while ahead < last && x[ahead] == x[i] {
                ahead += 1;
            }
            if x[ahead] < x[i] {
                maxima.push((i + ahead - 1) / 2);
                i = ahead;
            }
        }
        i += 1;
    }

    maxima
}

/// Drop maxima closer than `distance` samples to a higher one. Of two equal
/// heights the later maximum is kept.
fn select_by_distance(x: &[f64], maxima: Vec<usize>, distance: usize) -> Vec<usize> {
    if distance <= 1 || maxima.len() < 2 {
        return maxima;
    }

    let mut keep = vec![true; maxima.len()];
    let mut by_height: Vec<usize> = (0..maxima.len()).collect();
    // Stable ascending sort walked from the top
    by_height.sort_by(|&a, &b| x[maxima[a]].total_cmp(&x[maxima[b]]));

    for &j in by_height.iter().rev() {
        if !keep[j] {
            continue;
        }
        for k in (0..j).rev() {
            if maxima[j] - maxima[k] >= distance {
                break;
            }
            keep[k] = false;
        }
        for k in j + 1..maxima.len() {
            if maxima[k] - maxima[j] >= distance {
                break;
            }
            keep[k] = false;
        }
    }

    maxima
        .into_iter()
        .zip(keep)
        .filter_map(|(m, k)| k.then_some(m))
        .collect()
}

/// Walk outwards until the ground rises above the peak; the higher of the
/// two lowest points found sets the prominence.
fn prominence_of(x: &[f64], peak: usize) -> Candidate {
    let height = x[peak];

    let mut left_min = height;
    let mut left_base = peak;
    let mut i = peak;
    loop {
        if x[i] > height {
            break;
        }
        if x[i] < left_min {
            left_min = x[i];
            left_base = i;
        }
        if i == 0 {
            break;
        }
        i -= 1;
    }

    let mut right_min = height;
    let mut right_base = peak;
    for (j, &v) in x.iter().enumerate().skip(peak) {
        if v > height {
            break;
        }
        if v < right_min {
            right_min = v;
            right_base = j;
        }
    }

    Candidate {
        index: peak,
        prominence: height - left_min.max(right_min),
        left_base,
        right_base,
    }
}

/// Width in samples at `REL_HEIGHT` of the prominence, with linear
/// interpolation between samples
fn width_of(x: &[f64], c: &Candidate) -> f64 {
    let height = x[c.index] - c.prominence * REL_HEIGHT;

    let mut i = c.index;
    while c.left_base < i && height < x[i] {
        i -= 1;
    }
    let mut left = i as f64;
    if x[i] < height {
        left += (height - x[i]) / (x[i + 1] - x[i]);
    }

    let mut i = c.index;
    while i < c.right_base && height < x[i] {
        i += 1;
    }
    let mut right = i as f64;
    if x[i] < height {
        right -= (height - x[i]) / (x[i - 1] - x[i]);
    }

    right - left
}
