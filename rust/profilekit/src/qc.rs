//! Precision and accuracy summaries over reference samples.

use std::collections::BTreeMap;

use crate::dataset::Dataset;
use crate::enumerations::{
    AssayRole,
    SampleType,
};
use crate::errors::{
    ProfilingError,
    Result,
};
use crate::models::Array2D;
use crate::selection::select_samples;

/// Percent relative standard deviation of the finite values of a slice.
///
/// Sample standard deviation (n - 1). Fewer than two values give `NaN`,
/// a zero mean gives `f64::MAX` and a zero deviation gives 0.
pub fn rsd_of(values: &[f64]) -> f64 {
    let finite: Vec<f64> = values.iter().copied().filter(|x| x.is_finite()).collect();
    if finite.len() < 2 {
        return f64::NAN;
    }
    let n = finite.len() as f64;
    let mean = finite.iter().sum::<f64>() / n;
    if mean == 0.0 {
        return f64::MAX;
    }
    let var = finite.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let std = var.sqrt();
    if std == 0.0 {
        return 0.0;
    }
    100.0 * std / mean
}

/// Per-column RSD.
pub fn rsd(data: &Array2D<f64>) -> Vec<f64> {
    data.column_apply(rsd_of)
}

/// Per-column `100 * sqrt(mean(diff^2) / 2) / mean`, with successive
/// differences taken in row order over finite values.
pub fn sequential_precision(data: &Array2D<f64>) -> Vec<f64> {
    data.column_apply(|col| {
        let finite: Vec<f64> = col.iter().copied().filter(|x| x.is_finite()).collect();
        if finite.len() < 2 {
            return f64::NAN;
        }
        let mean = finite.iter().sum::<f64>() / finite.len() as f64;
        if mean == 0.0 {
            return f64::MAX;
        }
        let msd = finite
            .windows(2)
            .map(|w| (w[1] - w[0]).powi(2))
            .sum::<f64>()
            / (finite.len() - 1) as f64;
        100.0 * (msd / 2.0).sqrt() / mean
    })
}

fn roles_for(only_precision_references: bool) -> &'static [AssayRole] {
    if only_precision_references {
        &[AssayRole::PrecisionReference]
    } else {
        AssayRole::ALL
    }
}

/// RSD vectors for every sample type present among the live samples.
/// Groups with fewer than two samples are omitted.
pub fn rsds_by_sample_type(
    dataset: &Dataset,
    only_precision_references: bool,
) -> Result<BTreeMap<SampleType, Vec<f64>>> {
    let data = dataset.intensity_data();
    let roles = roles_for(only_precision_references);
    let mut out = BTreeMap::new();
    for st in SampleType::ALL {
        let mask = select_samples(dataset, &[*st], roles, true)?;
        if mask.iter().filter(|m| **m).count() < 2 {
            continue;
        }
        out.insert(*st, rsd(&data.filter_rows(&mask, true)));
    }
    Ok(out)
}

/// Per-feature values indexed by expected concentration.
#[derive(Debug, Clone, PartialEq)]
pub struct ConcentrationTable {
    pub concentrations: Vec<f64>,
    pub features: Vec<String>,
    /// concentrations x features
    pub values: Array2D<f64>,
}

impl ConcentrationTable {
    pub fn get(&self, concentration: f64, feature: &str) -> Option<f64> {
        let r = self.concentrations.iter().position(|c| *c == concentration)?;
        let c = self.features.iter().position(|f| f == feature)?;
        self.values.get(r, c)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AccuracyPrecision {
    pub accuracy: BTreeMap<SampleType, ConcentrationTable>,
    pub precision: BTreeMap<SampleType, ConcentrationTable>,
}

/// Accuracy (`100 * mean(observed) / expected`) and precision (RSD) of the
/// live samples of each type, grouped by expected concentration.
///
/// Requires a targeted dataset with expected concentrations.
pub fn accuracy_precision(
    dataset: &Dataset,
    only_precision_references: bool,
) -> Result<AccuracyPrecision> {
    let expected = dataset
        .assay
        .targeted()
        .and_then(|t| t.expected_concentration.as_ref())
        .ok_or_else(|| {
            ProfilingError::Value(format!(
                "{} has no expected concentrations",
                dataset.name()
            ))
        })?;
    let data = dataset.intensity_data();
    if expected.shape() != data.shape() {
        return Err(ProfilingError::Value(format!(
            "expectedConcentration has shape {:?}, intensityData has {:?}",
            expected.shape(),
            data.shape()
        )));
    }
    let features = dataset.feature_names()?;
    let roles = roles_for(only_precision_references);

    let mut out = AccuracyPrecision::default();
    for st in SampleType::ALL {
        let mask = select_samples(dataset, &[*st], roles, true)?;
        let rows: Vec<usize> = (0..mask.len()).filter(|i| mask[*i]).collect();
        if rows.is_empty() {
            continue;
        }

        let mut concentrations: Vec<f64> = rows
            .iter()
            .filter_map(|r| expected.get_row(*r))
            .flat_map(|row| row.iter().copied())
            .filter(|c| c.is_finite())
            .collect();
        concentrations.sort_by(|a, b| a.total_cmp(b));
        concentrations.dedup();
        if concentrations.is_empty() {
            continue;
        }

        let mut accuracy = Array2D::filled(concentrations.len(), features.len(), f64::NAN);
        let mut precision = Array2D::filled(concentrations.len(), features.len(), f64::NAN);
        for (ci, conc) in concentrations.iter().enumerate() {
            for f in 0..features.len() {
                let observed: Vec<f64> = rows
                    .iter()
                    .filter(|r| expected.get(**r, f) == Some(*conc))
                    .filter_map(|r| data.get(*r, f))
                    .filter(|x| x.is_finite())
                    .collect();
                if observed.is_empty() {
                    continue;
                }
                if *conc != 0.0 {
                    let mean = observed.iter().sum::<f64>() / observed.len() as f64;
                    accuracy.insert(ci, f, 100.0 * mean / conc);
                }
                precision.insert(ci, f, rsd_of(&observed));
            }
        }

        out.accuracy.insert(
            *st,
            ConcentrationTable {
                concentrations: concentrations.clone(),
                features: features.clone(),
                values: accuracy,
            },
        );
        out.precision.insert(
            *st,
            ConcentrationTable {
                concentrations,
                features: features.clone(),
                values: precision,
            },
        );
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rsd_constant_columns() {
        let data = Array2D::new(vec![vec![1.0, 1.0], vec![1.0, 1.0], vec![1.0, 1.0]]).unwrap();
        assert_eq!(rsd(&data), vec![0.0, 0.0]);
    }

    #[test]
    fn test_rsd_zero_mean() {
        let data = Array2D::new(vec![vec![0.0, 2.0], vec![0.0, 4.0], vec![0.0, 6.0]]).unwrap();
        let out = rsd(&data);
        assert_eq!(out[0], f64::MAX);
        assert!((out[1] - 50.0).abs() < 1e-12);
    }

    #[test]
    fn test_rsd_ignores_missing() {
        assert!((rsd_of(&[2.0, f64::NAN, 4.0, 6.0]) - 50.0).abs() < 1e-12);
        assert!(rsd_of(&[2.0, f64::NAN]).is_nan());
    }

    #[test]
    fn test_sequential_precision() {
        let data = Array2D::new(vec![vec![0.0, 1.0], vec![0.0, 3.0], vec![0.0, 5.0]]).unwrap();
        let out = sequential_precision(&data);
        assert_eq!(out[0], f64::MAX);
        // diffs 2, 2 -> sqrt(4 / 2) / 3 * 100
        assert!((out[1] - 100.0 * 2f64.sqrt() / 3.0).abs() < 1e-12);
    }
}
