//! Smoothers for analytical drift along a run order.
//!
//! The crate knows nothing about datasets; it fits curves to `(x, y)` pairs
//! (typically run order vs. intensity of repeatedly injected reference samples)
//! and projects them to arbitrary positions.
//!
//! - [`lowess`]: locally weighted linear regression with robustness iterations.
//! - [`savitzky_golay`]: least-squares polynomial smoothing over a fixed window.
//! - [`InterpolatedCurve`]: piecewise linear projection of a fit to new x values.

pub mod lowess;
pub mod savgol;

pub use lowess::{
    lowess,
    LOWESS_ROBUSTNESS_ITERATIONS,
};
pub use savgol::savitzky_golay;

/// Minimum denominator for slope calculations to avoid division by zero.
const MIN_SLOPE_DENOMINATOR: f64 = 1e-9;

/// Custom error types for the fitting routines.
#[derive(Debug, Clone, PartialEq)]
pub enum FitError {
    /// Returned when a fit is attempted with no input points.
    NoPoints,
    /// Returned when there are not enough points for the requested operation.
    InsufficientPoints,
    /// Returned when x and y inputs differ in length.
    MismatchedLengths { x: usize, y: usize },
    /// Returned when a smoothing window cannot be used (e.g. zero).
    InvalidWindow(usize),
    /// Returned when prediction is attempted outside the fitted range.
    /// Carries the linearly extrapolated value.
    OutOfBounds(f64),
}

impl std::fmt::Display for FitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FitError::NoPoints => write!(f, "no points to fit"),
            FitError::InsufficientPoints => write!(f, "not enough points to fit"),
            FitError::MismatchedLengths { x, y } => {
                write!(f, "x and y differ in length ({} vs {})", x, y)
            }
            FitError::InvalidWindow(w) => write!(f, "invalid smoothing window: {}", w),
            FitError::OutOfBounds(v) => {
                write!(f, "prediction out of fitted range (extrapolated to {})", v)
            }
        }
    }
}

impl std::error::Error for FitError {}

/// A single `(x, y)` observation, e.g. run order and fitted intensity.
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Piecewise linear curve through a set of fitted points.
///
/// Points sharing the same `x` are collapsed to their mean `y`, so the
/// curve is always a function of `x`. A single point yields a flat curve.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct InterpolatedCurve {
    points: Vec<Point>,
    slopes: Vec<f64>,
}

impl InterpolatedCurve {
    /// Creates a new curve from unsorted points.
    /// Precomputes slopes for faster prediction.
    pub fn new(mut points: Vec<Point>) -> Result<Self, FitError> {
        points.retain(|p| p.x.is_finite() && !p.y.is_nan());
        if points.is_empty() {
            return Err(FitError::NoPoints);
        }

        points.sort_by(|a, b| a.x.total_cmp(&b.x));

        let mut collapsed: Vec<Point> = Vec::with_capacity(points.len());
        let mut run_len = 0usize;
        for p in points {
            match collapsed.last_mut() {
                Some(last) if last.x == p.x => {
                    run_len += 1;
                    last.y += (p.y - last.y) / run_len as f64;
                }
                _ => {
                    collapsed.push(p);
                    run_len = 1;
                }
            }
        }

        let slopes = collapsed
            .windows(2)
            .map(|p| (p[1].y - p[0].y) / (p[1].x - p[0].x).max(MIN_SLOPE_DENOMINATOR))
            .collect();

        Ok(Self {
            points: collapsed,
            slopes,
        })
    }

    /// Builds a curve from parallel x/y slices.
    pub fn from_xy(x: &[f64], y: &[f64]) -> Result<Self, FitError> {
        if x.len() != y.len() {
            return Err(FitError::MismatchedLengths {
                x: x.len(),
                y: y.len(),
            });
        }
        Self::new(x.iter().zip(y).map(|(&x, &y)| Point { x, y }).collect())
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Predicts y for a given x.
    /// Returns [`FitError::OutOfBounds`] carrying the extrapolated value
    /// if `x_val` lies outside the fitted range.
    pub fn predict(&self, x_val: f64) -> Result<f64, FitError> {
        // `new` guarantees at least one point.
        let first = self.points[0];
        let last = self.points[self.points.len() - 1];

        if self.slopes.is_empty() {
            return if x_val == first.x {
                Ok(first.y)
            } else {
                Err(FitError::OutOfBounds(first.y))
            };
        }

        if x_val < first.x {
            return Err(FitError::OutOfBounds(self.predict_with_index(x_val, 1)));
        }
        if x_val > last.x {
            return Err(FitError::OutOfBounds(
                self.predict_with_index(x_val, self.slopes.len()),
            ));
        }

        // Find the partition point; first element >= x_val.
        let i = self.points.partition_point(|p| p.x < x_val).max(1);
        Ok(self.predict_with_index(x_val, i))
    }

    /// Predicts y for a given x, extrapolating linearly outside the fitted range.
    pub fn predict_extrapolated(&self, x_val: f64) -> f64 {
        match self.predict(x_val) {
            Ok(y) => y,
            Err(FitError::OutOfBounds(y)) => y,
            Err(_) => f64::NAN,
        }
    }

    /// Linear interpolation using the slope between `points[i-1]` and `points[i]`.
    ///
    /// `i` must satisfy `1 <= i <= slopes.len()`.
    fn predict_with_index(&self, x_val: f64, i: usize) -> f64 {
        debug_assert!(i > 0 && i <= self.slopes.len());
        let p1 = self.points[i - 1];
        let slope = self.slopes[i - 1];
        p1.y + (x_val - p1.x) * slope
    }
}

/// Median of the finite values of a slice; `None` when there are none.
pub fn median(values: &[f64]) -> Option<f64> {
    let mut v: Vec<f64> = values.iter().copied().filter(|x| x.is_finite()).collect();
    if v.is_empty() {
        return None;
    }
    v.sort_by(|a, b| a.total_cmp(b));
    let mid = v.len() / 2;
    if v.len() % 2 == 0 {
        Some((v[mid - 1] + v[mid]) / 2.0)
    } else {
        Some(v[mid])
    }
}

/// Mean of the finite values of a slice; `None` when there are none.
pub fn mean(values: &[f64]) -> Option<f64> {
    let (sum, n) = values
        .iter()
        .filter(|x| x.is_finite())
        .fold((0.0, 0usize), |(s, n), x| (s + x, n + 1));
    if n == 0 {
        None
    } else {
        Some(sum / n as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_curve_collapses_duplicate_x() {
        let curve = InterpolatedCurve::from_xy(&[1.0, 1.0, 2.0], &[2.0, 4.0, 5.0]).unwrap();
        assert_eq!(curve.points().len(), 2);
        assert_eq!(curve.predict(1.0).unwrap(), 3.0);
        assert_eq!(curve.predict(1.5).unwrap(), 4.0);
    }

    #[test]
    fn test_single_point_curve_is_flat() {
        let curve = InterpolatedCurve::from_xy(&[3.0], &[7.0]).unwrap();
        assert_eq!(curve.predict(3.0).unwrap(), 7.0);
        assert_eq!(curve.predict_extrapolated(10.0), 7.0);
    }

    #[test]
    fn test_median_and_mean_skip_nan() {
        let vals = [1.0, f64::NAN, 3.0, 10.0];
        assert_eq!(median(&vals), Some(3.0));
        assert_eq!(mean(&vals), Some(14.0 / 3.0));
        assert_eq!(median(&[f64::NAN]), None);
        assert_eq!(median(&[1.0, 2.0, 3.0, 4.0]), Some(2.5));
    }
}
