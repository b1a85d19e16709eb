//! Locally weighted scatterplot smoothing (Cleveland, 1979).
//!
//! Each point is fitted by a weighted linear regression over its `k` nearest
//! neighbours along x, with tricube distance weights. Robustness iterations
//! downweight points with large residuals using bisquare weights.

use crate::FitError;
use tracing::debug;

/// Number of robustifying iterations applied after the initial fit.
pub const LOWESS_ROBUSTNESS_ITERATIONS: usize = 3;

/// Residual scales below this fraction of the data magnitude count as an exact fit.
const EXACT_FIT_TOLERANCE: f64 = 1e-12;

/// Fits a LOWESS curve and returns the fitted value at every input x.
///
/// `x` does not need to be sorted; the output is aligned with the input order.
/// `frac` is the fraction of points used in each local regression, clamped to `(0, 1]`.
///
/// # Example
/// ```
/// use driftfit::lowess;
///
/// let x = vec![1.0, 2.0, 3.0, 4.0, 5.0];
/// let y = vec![2.0, 4.0, 6.0, 8.0, 10.0];
/// let fit = lowess(&x, &y, 1.0, 3).unwrap();
/// assert!((fit[2] - 6.0).abs() < 1e-9);
/// ```
pub fn lowess(x: &[f64], y: &[f64], frac: f64, iterations: usize) -> Result<Vec<f64>, FitError> {
    if x.len() != y.len() {
        return Err(FitError::MismatchedLengths {
            x: x.len(),
            y: y.len(),
        });
    }
    let n = x.len();
    if n == 0 {
        return Err(FitError::NoPoints);
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| x[a].total_cmp(&x[b]));
    let xs: Vec<f64> = order.iter().map(|&i| x[i]).collect();
    let ys: Vec<f64> = order.iter().map(|&i| y[i]).collect();

    let frac = if frac.is_finite() && frac > 0.0 {
        frac.min(1.0)
    } else {
        1.0
    };
    // `frac` usually comes from `window / n`; round down so float noise never adds a neighbour.
    let k = ((frac * n as f64 + 1e-7).floor() as usize).clamp(2.min(n), n);

    let scale = ys.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
    let mut robustness = vec![1.0; n];
    let mut fitted = vec![0.0; n];

    for iteration in 0..=iterations {
        fit_pass(&xs, &ys, &robustness, k, &mut fitted);
        if iteration == iterations {
            break;
        }

        let residuals: Vec<f64> = ys.iter().zip(&fitted).map(|(y, f)| y - f).collect();
        let abs_residuals: Vec<f64> = residuals.iter().map(|r| r.abs()).collect();
        let residual_scale = crate::median(&abs_residuals).unwrap_or(0.0);
        if residual_scale <= EXACT_FIT_TOLERANCE * scale.max(1.0) {
            debug!("LOWESS converged after {} iterations", iteration);
            break;
        }
        for (w, r) in robustness.iter_mut().zip(&residuals) {
            let u = r / (6.0 * residual_scale);
            *w = if u.abs() < 1.0 {
                (1.0 - u * u).powi(2)
            } else {
                0.0
            };
        }
    }

    let mut out = vec![0.0; n];
    for (sorted_pos, &orig) in order.iter().enumerate() {
        out[orig] = fitted[sorted_pos];
    }
    Ok(out)
}

/// One pass of local regressions over sorted data.
fn fit_pass(xs: &[f64], ys: &[f64], robustness: &[f64], k: usize, fitted: &mut [f64]) {
    let n = xs.len();
    let mut left = 0usize;
    let mut right = k; // exclusive

    for i in 0..n {
        // Slide the neighbourhood [left, right) so that it stays the k nearest points to xs[i].
        while right < n && xs[right] - xs[i] < xs[i] - xs[left] {
            left += 1;
            right += 1;
        }
        let h = (xs[i] - xs[left]).max(xs[right - 1] - xs[i]);
        fitted[i] = local_linear(xs, ys, robustness, left, right, i, h);
    }
}

fn tricube(r: f64) -> f64 {
    if r < 1.0 {
        let t = 1.0 - r * r * r;
        t * t * t
    } else {
        0.0
    }
}

fn local_linear(
    xs: &[f64],
    ys: &[f64],
    robustness: &[f64],
    left: usize,
    right: usize,
    i: usize,
    h: f64,
) -> f64 {
    let xi = xs[i];
    let mut sw = 0.0;
    let mut swx = 0.0;
    let mut swy = 0.0;
    let mut weights = Vec::with_capacity(right - left);

    for j in left..right {
        let dist_weight = if h > 0.0 {
            tricube((xs[j] - xi).abs() / h)
        } else {
            1.0
        };
        let w = dist_weight * robustness[j];
        weights.push(w);
        sw += w;
        swx += w * xs[j];
        swy += w * ys[j];
    }

    if sw <= 0.0 {
        return ys[i];
    }

    let x_mean = swx / sw;
    let y_mean = swy / sw;
    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for (j, w) in (left..right).zip(&weights) {
        let dx = xs[j] - x_mean;
        sxx += w * dx * dx;
        sxy += w * dx * (ys[j] - y_mean);
    }

    let x_span = xs[right - 1] - xs[left];
    if sxx > 1e-12 * (x_span * x_span).max(f64::MIN_POSITIVE) * sw {
        y_mean + (sxy / sxx) * (xi - x_mean)
    } else {
        y_mean
    }
}
