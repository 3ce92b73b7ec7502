/// Savitzky-Golay smoothing
///
/// Fits a least-squares polynomial over a sliding odd-length window and takes
/// the fitted value at the window centre. The first and last half-windows are
/// evaluated from the polynomial fitted to the first and last full window.
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, PartialEq)]
pub enum SmoothingError {
    #[error("Window of {window} samples exceeds series length {len}")]
    WindowTooLong { window: usize, len: usize },

    #[error("Polynomial fit is singular for window {0}")]
    Singular(usize),

    #[error("Smoothed series contains non-finite values")]
    NonFinite,
}

/// Local polynomial smoother. Stateless after construction, so one instance
/// can be shared by every detector in the process.
#[derive(Debug, Clone)]
pub struct Smoother {
    polyorder: usize,
    min_window: usize,
}

impl Default for Smoother {
    fn default() -> Self {
        Self {
            polyorder: 2,
            min_window: 3,
        }
    }
}

impl Smoother {
    pub fn new(polyorder: usize, min_window: usize) -> Self {
        Self {
            polyorder,
            min_window: min_window.max(1),
        }
    }

    /// Odd window covering `fraction` of `len` samples, at least `min_window`
    pub fn window_length(&self, len: usize, fraction: f64) -> usize {
        let mut window = (len as f64 * fraction).round().max(0.0) as usize;
        if window % 2 == 0 {
            window += 1;
        }
        let mut min_window = self.min_window;
        if min_window % 2 == 0 {
            min_window += 1;
        }
        window.max(min_window)
    }

    /// Smooth `series` with a window sized from `fraction`.
    ///
    /// A fraction of zero (or less) disables smoothing. Any failure returns
    /// the input unchanged.
    pub fn smooth(&self, series: &[f64], fraction: f64) -> Vec<f64> {
        if fraction <= 0.0 || series.len() < 3 {
            return series.to_vec();
        }

        let window = self.window_length(series.len(), fraction.min(1.0));
        match self.savgol(series, window) {
            Ok(smoothed) => smoothed,
            Err(e) => {
                debug!("Smoothing skipped, using raw series: {}", e);
                series.to_vec()
            }
        }
    }

    /// Apply the filter with an explicit window length
    pub fn savgol(&self, series: &[f64], window: usize) -> Result<Vec<f64>, SmoothingError> {
        let len = series.len();
        if window > len || window == 0 {
            return Err(SmoothingError::WindowTooLong { window, len });
        }

        let polyorder = if self.polyorder >= window {
            window - 1
        } else {
            self.polyorder
        };
        let half = window / 2;

        let centre = fit_weights(window, polyorder, half)?;
        let mut smoothed = vec![0.0; len];

        for i in half..len - half {
            let start = i - half;
            smoothed[i] = dot(&centre, &series[start..start + window]);
        }

        // Edges: evaluate the first/last window's polynomial off-centre
        let head = &series[..window];
        let tail = &series[len - window..];
        for pos in 0..half {
            let weights = fit_weights(window, polyorder, pos)?;
            smoothed[pos] = dot(&weights, head);

            let tail_pos = window - 1 - pos;
            let weights = fit_weights(window, polyorder, tail_pos)?;
            smoothed[len - 1 - pos] = dot(&weights, tail);
        }

        if smoothed.iter().any(|v| !v.is_finite()) {
            return Err(SmoothingError::NonFinite);
        }

        Ok(smoothed)
    }
}

fn dot(weights: &[f64], values: &[f64]) -> f64 {
    weights.iter().zip(values).map(|(w, v)| w * v).sum()
}

/// Weights w such that sum(w[j] * y[j]) is the value at `eval_pos` of the
/// least-squares polynomial of `order` through y[0..window].
fn fit_weights(window: usize, order: usize, eval_pos: usize) -> Result<Vec<f64>, SmoothingError> {
    let half = (window / 2) as f64;
    let terms = order + 1;

    // Vandermonde rows on a centred abscissa for conditioning
    let design: Vec<Vec<f64>> = (0..window)
        .map(|j| {
            let x = j as f64 - half;
            (0..terms).map(|k| x.powi(k as i32)).collect()
        })
        .collect();

    let mut normal = vec![vec![0.0; terms]; terms];
    for row in &design {
        for a in 0..terms {
            for b in 0..terms {
                normal[a][b] += row[a] * row[b];
            }
        }
    }

    let x0 = eval_pos as f64 - half;
    let basis: Vec<f64> = (0..terms).map(|k| x0.powi(k as i32)).collect();
    let z = solve(normal, basis).ok_or(SmoothingError::Singular(window))?;

    Ok(design.iter().map(|row| dot(row, &z)).collect())
}

/// Gaussian elimination with partial pivoting
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();

    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }

    Some(x)
}
