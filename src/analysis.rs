// Signal analysis: smoothing, peak detection and fit statistics.
//
// - smoothing: Savitzky-Golay filter used ahead of peak detection
// - peak_detector: local maxima filtered by prominence/width/distance
// - metrics: NSE, KGE, CV, peak timing/magnitude and volume differences

pub mod metrics;
pub mod peak_detector;
pub mod smoothing;

pub use metrics::MetricsCalculator;
pub use peak_detector::{find_closest_peak, PeakDetector, PeakParams};
pub use smoothing::{Smoother, SmoothingError};
