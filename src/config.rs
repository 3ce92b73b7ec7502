use std::env;

use crate::analysis::PeakParams;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub smoothing_fraction: f64,
    pub peak_prominence: f64,
    pub peak_width: f64,
    pub peak_distance: usize,
    pub peak_max_count: Option<usize>,
    pub profile_index: usize,
    pub concurrency: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            smoothing_fraction: 0.0,
            peak_prominence: 0.0009,
            peak_width: 1.0,
            peak_distance: 1,
            peak_max_count: None,
            profile_index: 0,
            concurrency: 4,
        }
    }
}

impl Config {
    /// Read settings from the environment. Unset or unparsable values keep
    /// their defaults.
    pub fn from_env() -> Self {
        let defaults = Config::default();

        Config {
            smoothing_fraction: env_or("VERIFY_SMOOTHING_FRACTION", defaults.smoothing_fraction)
                .clamp(0.0, 1.0),
            peak_prominence: env_or("PEAK_PROMINENCE", defaults.peak_prominence),
            peak_width: env_or("PEAK_WIDTH", defaults.peak_width),
            peak_distance: env_or("PEAK_DISTANCE", defaults.peak_distance),
            peak_max_count: env::var("PEAK_MAX_COUNT")
                .ok()
                .and_then(|v| v.parse().ok()),
            profile_index: env_or("PREDICTED_PROFILE_INDEX", defaults.profile_index),
            concurrency: env_or("VERIFY_CONCURRENCY", defaults.concurrency).max(1),
        }
    }

    pub fn peak_params(&self) -> PeakParams {
        PeakParams {
            prominence: self.peak_prominence,
            width: self.peak_width,
            distance: self.peak_distance,
            max_count: self.peak_max_count,
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const KEYS: [&str; 7] = [
        "VERIFY_SMOOTHING_FRACTION",
        "PEAK_PROMINENCE",
        "PEAK_WIDTH",
        "PEAK_DISTANCE",
        "PEAK_MAX_COUNT",
        "PREDICTED_PROFILE_INDEX",
        "VERIFY_CONCURRENCY",
    ];

    fn clear_env() {
        for key in KEYS {
            env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        clear_env();
        assert_eq!(Config::from_env(), Config::default());
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        clear_env();
        env::set_var("VERIFY_SMOOTHING_FRACTION", "0.1");
        env::set_var("PEAK_MAX_COUNT", "3");
        env::set_var("PREDICTED_PROFILE_INDEX", "2");

        let config = Config::from_env();
        assert_eq!(config.smoothing_fraction, 0.1);
        assert_eq!(config.peak_max_count, Some(3));
        assert_eq!(config.profile_index, 2);
        assert_eq!(config.peak_params().max_count, Some(3));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_invalid_values_fall_back() {
        clear_env();
        env::set_var("PEAK_DISTANCE", "lots");
        env::set_var("VERIFY_CONCURRENCY", "0");
        env::set_var("VERIFY_SMOOTHING_FRACTION", "4");

        let config = Config::from_env();
        assert_eq!(config.peak_distance, 1);
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.smoothing_fraction, 1.0);

        clear_env();
    }
}
