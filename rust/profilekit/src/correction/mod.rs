//! Run-order and batch correction of MS datasets.
//!
//! Drift within each correction batch is modelled per feature from the
//! reference samples (LOWESS or Savitzky-Golay over run order), divided out,
//! and the batches are then rescaled onto a common reference level.

pub mod config;
mod worker;

use rayon::prelude::*;
use tracing::{
    info,
    warn,
};

pub use config::{
    AlignMethod,
    CorrectionConfig,
    CorrectionMethod,
};
use worker::{
    correct_slice,
    BatchPlan,
    FeatureOutcome,
};

use crate::dataset::{
    AssayKind,
    Dataset,
};
use crate::enumerations::AssayRole;
use crate::errors::{
    ProfilingError,
    Result,
};
use crate::models::Array2D;

pub const CORRECTION_LOG_MESSAGE: &str = "Batch and run order correction applied";

/// Corrects run-order drift and batch effects, returning a new dataset.
///
/// The returned dataset has the same shape as the input, corrected raw
/// intensities and a `fit` matrix holding the drift value used for every
/// sample (`NaN` for samples that were not corrected). Features whose
/// correction failed are masked when `exclude_failures` is set.
#[cfg_attr(
    feature = "instrumentation",
    tracing::instrument(skip_all, fields(dataset = %dataset.name()))
)]
pub fn correct_drift(dataset: &Dataset, config: &CorrectionConfig) -> Result<Dataset> {
    config.validate()?;
    if !matches!(dataset.assay, AssayKind::MassSpectrometry) {
        return Err(ProfilingError::Type(format!(
            "Run order correction requires an MSDataset, found {}",
            dataset.class_name()
        )));
    }

    let batches = plan_batches(dataset, config)?;
    let data = dataset.raw_intensity_data();
    let n_features = data.ncols();

    let outcomes: Vec<FeatureOutcome> = if config.parallelise && n_features > 1 {
        let n_slices = rayon::current_num_threads().saturating_sub(1).max(1);
        let slice_len = n_features.div_ceil(n_slices);
        (0..n_features)
            .step_by(slice_len)
            .map(|start| start..(start + slice_len).min(n_features))
            .collect::<Vec<_>>()
            .into_par_iter()
            .map(|range| correct_slice(data, &batches, config, range))
            .collect::<Vec<_>>()
            .into_iter()
            .flatten()
            .collect()
    } else {
        correct_slice(data, &batches, config, 0..n_features)
    };

    let mut corrected = data.clone();
    let mut fit = Array2D::filled(data.nrows(), n_features, f64::NAN);
    let mut failures = Vec::new();
    for outcome in outcomes {
        corrected.set_column(outcome.feature, &outcome.corrected)?;
        fit.set_column(outcome.feature, &outcome.fit)?;
        if outcome.failed {
            failures.push(outcome.feature);
        }
    }

    let mut out = dataset.clone();
    out.intensity_data = corrected;
    out.fit = Some(fit);
    if !failures.is_empty() {
        warn!(
            "Correction failed for {} of {} features (zero or missing reference fit)",
            failures.len(),
            n_features
        );
        if config.exclude_failures {
            for f in failures.iter() {
                out.feature_mask[*f] = false;
            }
        }
    }
    info!(
        "Corrected {} features over {} batches with {} (window {}, align {})",
        n_features,
        batches.len(),
        config.method,
        config.window,
        config.align
    );
    out.append_log(CORRECTION_LOG_MESSAGE);
    Ok(out)
}

/// Groups the participating samples by correction batch.
fn plan_batches(dataset: &Dataset, config: &CorrectionConfig) -> Result<Vec<BatchPlan>> {
    let sm = &dataset.sample_metadata;
    for col in ["Run Order", "Correction Batch", "SampleType", "AssayRole"] {
        sm.require_column(col)?;
    }
    let run_orders = sm.floats("Run Order")?;
    let correction_batches = sm.floats("Correction Batch")?;
    let sample_types = dataset.sample_types()?;
    let assay_roles = dataset.assay_roles()?;

    let participates = |i: usize| -> bool {
        if !correction_batches[i].is_finite() {
            return false;
        }
        match (sample_types[i], assay_roles[i]) {
            (Some(st), Some(ar)) => config.is_corrected(st, ar),
            _ => true,
        }
    };
    let is_reference = |i: usize| -> bool {
        sample_types[i] == Some(config.correction_sample_type)
            && assay_roles[i] == Some(AssayRole::PrecisionReference)
            && dataset.sample_mask.get(i).copied().unwrap_or(false)
    };

    let mut labels: Vec<f64> = (0..dataset.no_samples())
        .filter(|&i| participates(i))
        .map(|i| correction_batches[i])
        .collect();
    labels.sort_by(|a, b| a.total_cmp(b));
    labels.dedup();

    let mut plans = Vec::with_capacity(labels.len());
    for label in labels {
        let mut rows: Vec<usize> = (0..dataset.no_samples())
            .filter(|&i| participates(i) && correction_batches[i] == label)
            .collect();
        if let Some(&r) = rows.iter().find(|&&r| !run_orders[r].is_finite()) {
            return Err(ProfilingError::Value(format!(
                "Sample {} in correction batch {} has no Run Order",
                r, label
            )));
        }
        rows.sort_by(|&a, &b| run_orders[a].total_cmp(&run_orders[b]));
        let references: Vec<usize> = rows
            .iter()
            .enumerate()
            .filter(|(_, r)| is_reference(**r))
            .map(|(p, _)| p)
            .collect();
        if references.is_empty() {
            warn!(
                "Correction batch {} has no {} precision references",
                label, config.correction_sample_type
            );
        }
        plans.push(BatchPlan {
            label: label.to_string(),
            run_orders: rows.iter().map(|&r| run_orders[r]).collect(),
            rows,
            references,
        });
    }
    Ok(plans)
}

impl Dataset {
    /// See [`correct_drift`].
    pub fn correct_drift(&self, config: &CorrectionConfig) -> Result<Dataset> {
        correct_drift(self, config)
    }
}
