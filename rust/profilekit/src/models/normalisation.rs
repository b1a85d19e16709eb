use std::fmt::Debug;

use super::arrays::Array2D;

/// Row-wise intensity normalisation applied when the dataset's intensities are read.
pub trait Normaliser: Debug + Send + Sync {
    fn name(&self) -> &'static str;
    fn normalise(&self, data: &Array2D<f64>) -> Array2D<f64>;
}

/// Identity; the default for every dataset.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNormaliser;

impl Normaliser for NullNormaliser {
    fn name(&self) -> &'static str {
        "Null"
    }

    fn normalise(&self, data: &Array2D<f64>) -> Array2D<f64> {
        data.clone()
    }
}

/// Scales every sample to the same total area.
///
/// With `keep_magnitude` the common total is the mean of the sample totals,
/// otherwise it is 1.
#[derive(Debug, Clone, Copy)]
pub struct TotalAreaNormaliser {
    pub keep_magnitude: bool,
}

impl Default for TotalAreaNormaliser {
    fn default() -> Self {
        Self {
            keep_magnitude: true,
        }
    }
}

impl TotalAreaNormaliser {
    pub fn coefficients(&self, data: &Array2D<f64>) -> Vec<f64> {
        let totals: Vec<f64> = data
            .row_apply(|row| row.iter().filter(|x| x.is_finite()).sum::<f64>())
            .collect();
        let scale = if self.keep_magnitude {
            driftfit::mean(&totals).unwrap_or(1.0)
        } else {
            1.0
        };
        totals.iter().map(|t| t / scale).collect()
    }
}

impl Normaliser for TotalAreaNormaliser {
    fn name(&self) -> &'static str {
        "Total Area"
    }

    fn normalise(&self, data: &Array2D<f64>) -> Array2D<f64> {
        divide_rows(data, &self.coefficients(data))
    }
}

/// Probabilistic quotient normalisation against the median profile.
#[derive(Debug, Clone, Default)]
pub struct ProbabilisticQuotientNormaliser {
    /// Reference profile; the per-feature median of the data when unset.
    pub reference: Option<Vec<f64>>,
}

impl ProbabilisticQuotientNormaliser {
    pub fn coefficients(&self, data: &Array2D<f64>) -> Vec<f64> {
        let reference = match &self.reference {
            Some(r) => r.clone(),
            None => data.column_apply(|col| driftfit::median(col).unwrap_or(f64::NAN)),
        };
        data.row_apply(|row| {
            let quotients: Vec<f64> = row
                .iter()
                .zip(reference.iter())
                .filter(|(x, r)| x.is_finite() && r.is_finite() && **r > 0.0)
                .map(|(x, r)| x / r)
                .collect();
            driftfit::median(&quotients).unwrap_or(f64::NAN)
        })
        .collect()
    }
}

impl Normaliser for ProbabilisticQuotientNormaliser {
    fn name(&self) -> &'static str {
        "Probabilistic Quotient"
    }

    fn normalise(&self, data: &Array2D<f64>) -> Array2D<f64> {
        divide_rows(data, &self.coefficients(data))
    }
}

// Zero or undefined coefficients give NaN rows; infinite sentinels are kept.
fn divide_rows(data: &Array2D<f64>, coefficients: &[f64]) -> Array2D<f64> {
    let mut out = data.clone();
    for (row, coef) in out.iter_mut_rows().zip(coefficients) {
        for x in row.iter_mut() {
            if x.is_infinite() {
                continue;
            }
            *x = if *coef == 0.0 || !coef.is_finite() {
                f64::NAN
            } else {
                *x / coef
            };
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_is_identity() {
        let data = Array2D::new(vec![vec![1.0, f64::NAN], vec![f64::INFINITY, 2.0]]).unwrap();
        let out = NullNormaliser.normalise(&data);
        assert_eq!(out.get(0, 0), Some(1.0));
        assert!(out.get(0, 1).unwrap().is_nan());
        assert_eq!(out.get(1, 0), Some(f64::INFINITY));
    }

    #[test]
    fn test_total_area() {
        let data = Array2D::new(vec![vec![1.0, 3.0], vec![2.0, 6.0]]).unwrap();
        let out = TotalAreaNormaliser {
            keep_magnitude: false,
        }
        .normalise(&data);
        assert_eq!(out.get_row(0).unwrap(), &[0.25, 0.75]);
        assert_eq!(out.get_row(1).unwrap(), &[0.25, 0.75]);

        let kept = TotalAreaNormaliser::default().normalise(&data);
        // totals 4 and 8, mean 6
        assert!((kept.get(0, 0).unwrap() - 1.5).abs() < 1e-12);
        assert!((kept.get(1, 1).unwrap() - 4.5).abs() < 1e-12);
    }

    #[test]
    fn test_pqn_removes_dilution() {
        let data = Array2D::new(vec![
            vec![1.0, 2.0, 3.0],
            vec![2.0, 4.0, 6.0],
            vec![0.5, 1.0, 1.5],
        ])
        .unwrap();
        let out = ProbabilisticQuotientNormaliser::default().normalise(&data);
        for row in out.iter_rows() {
            assert!((row[0] - 1.0).abs() < 1e-12);
            assert!((row[2] - 3.0).abs() < 1e-12);
        }
    }
}
