use driftfit::{
    lowess,
    savitzky_golay,
    InterpolatedCurve,
    LOWESS_ROBUSTNESS_ITERATIONS,
};
use std::ops::Range;
use tracing::debug;

use super::config::{
    AlignMethod,
    CorrectionConfig,
    CorrectionMethod,
};
use crate::models::Array2D;

const SAVITZKY_GOLAY_ORDER: usize = 3;

/// Samples of one correction batch, sorted by run order.
#[derive(Debug, Clone)]
pub(crate) struct BatchPlan {
    pub label: String,
    pub rows: Vec<usize>,
    pub run_orders: Vec<f64>,
    /// Positions into `rows` of the reference samples.
    pub references: Vec<usize>,
}

/// Result of correcting one feature.
#[derive(Debug, Clone)]
pub(crate) struct FeatureOutcome {
    pub feature: usize,
    pub corrected: Vec<f64>,
    pub fit: Vec<f64>,
    pub failed: bool,
}

/// Corrects a contiguous slice of features.
pub(crate) fn correct_slice(
    data: &Array2D<f64>,
    batches: &[BatchPlan],
    config: &CorrectionConfig,
    features: Range<usize>,
) -> Vec<FeatureOutcome> {
    features
        .filter_map(|f| {
            data.column(f).map(|column| {
                let (corrected, fit, failed) = correct_feature(&column, batches, config);
                FeatureOutcome {
                    feature: f,
                    corrected,
                    fit,
                    failed,
                }
            })
        })
        .collect()
}

/// Drift removal per batch followed by batch alignment.
///
/// Samples outside every batch keep their value and get a `NaN` fit.
pub(crate) fn correct_feature(
    column: &[f64],
    batches: &[BatchPlan],
    config: &CorrectionConfig,
) -> (Vec<f64>, Vec<f64>, bool) {
    let mut corrected = column.to_vec();
    let mut fit = vec![f64::NAN; column.len()];
    let mut failed = false;

    if config.method != CorrectionMethod::None {
        for batch in batches {
            let ok = remove_drift(column, batch, config, &mut corrected, &mut fit);
            failed |= !ok;
        }
    }

    if config.align != AlignMethod::No {
        failed |= !align_batches(&mut corrected, batches, config.align);
    }

    (corrected, fit, failed)
}

fn reference_points(values: &[f64], batch: &BatchPlan) -> (Vec<f64>, Vec<f64>) {
    batch
        .references
        .iter()
        .map(|&p| (batch.run_orders[p], values[batch.rows[p]]))
        .filter(|(_, y)| y.is_finite())
        .unzip()
}

fn smooth(x: &[f64], y: &[f64], config: &CorrectionConfig) -> Option<Vec<f64>> {
    let smoothed = match config.method {
        CorrectionMethod::LOWESS => {
            let frac = (config.window as f64 / x.len() as f64).min(1.0);
            lowess(x, y, frac, LOWESS_ROBUSTNESS_ITERATIONS)
        }
        CorrectionMethod::SavitzkyGolay => savitzky_golay(y, config.window, SAVITZKY_GOLAY_ORDER),
        CorrectionMethod::None => Ok(y.to_vec()),
    };
    smoothed.ok()
}

// Returns false when the batch has no usable references or the fit is all zero.
fn remove_drift(
    column: &[f64],
    batch: &BatchPlan,
    config: &CorrectionConfig,
    corrected: &mut [f64],
    fit: &mut [f64],
) -> bool {
    let (ref_x, ref_y) = reference_points(column, batch);
    let curve = smooth(&ref_x, &ref_y, config)
        .and_then(|s| InterpolatedCurve::from_xy(&ref_x, &s).ok());
    let (curve, average) = match (curve, config.align.central(&ref_y)) {
        (Some(c), Some(a)) => (c, a),
        _ => {
            debug!("No usable drift fit in correction batch {}", batch.label);
            for &r in batch.rows.iter() {
                corrected[r] = f64::NAN;
            }
            return false;
        }
    };

    let mut any_nonzero = false;
    for (&r, &run_order) in batch.rows.iter().zip(batch.run_orders.iter()) {
        let value = curve.predict_extrapolated(run_order).max(0.0);
        any_nonzero |= value > 0.0;
        fit[r] = value;
        corrected[r] = if value == 0.0 {
            f64::NAN
        } else {
            column[r] / value * average
        };
    }
    any_nonzero
}

// Rescales every batch so its reference central value matches the overall one.
fn align_batches(corrected: &mut [f64], batches: &[BatchPlan], align: AlignMethod) -> bool {
    let all_refs: Vec<f64> = batches
        .iter()
        .flat_map(|b| b.references.iter().map(move |&p| b.rows[p]))
        .map(|r| corrected[r])
        .collect();
    let Some(overall) = align.central(&all_refs) else {
        return batches.is_empty();
    };

    let mut ok = true;
    for batch in batches {
        let refs: Vec<f64> = batch
            .references
            .iter()
            .map(|&p| corrected[batch.rows[p]])
            .collect();
        match align.central(&refs) {
            Some(batch_average) if batch_average != 0.0 => {
                let scale = overall / batch_average;
                for &r in batch.rows.iter() {
                    corrected[r] *= scale;
                }
            }
            _ => {
                for &r in batch.rows.iter() {
                    corrected[r] = f64::NAN;
                }
                ok = false;
            }
        }
    }
    ok
}
