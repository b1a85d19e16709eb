//! Masking ("live but ignored") and exclusion ("removed and archived").
//!
//! Masks are plain boolean vectors on the dataset. `apply_masks` is the only
//! operation that moves rows or columns out of the live arrays; everything it
//! removes is kept in [`ExclusionHistory`](crate::dataset::ExclusionHistory).

use tracing::{
    info,
    warn,
};

use crate::dataset::{
    AssayKind,
    Dataset,
    ExcludedBatch,
    ExclusionFlag,
};
use crate::enumerations::{
    AssayRole,
    CalibrationMethod,
    QuantificationType,
    SampleType,
    VariableType,
};
use crate::errors::{
    ProfilingError,
    Result,
};
use crate::models::Value;
use crate::qc;
use crate::selection::{
    select_samples,
    SampleSelection,
};

pub const EXCLUSION_DETAILS: &str = "Exclusion Details";

/// Arguments of [`Dataset::update_masks`].
#[derive(Debug, Clone)]
pub struct MaskUpdate {
    pub filter_samples: bool,
    pub filter_features: bool,
    pub sample_types: Vec<SampleType>,
    pub assay_roles: Vec<AssayRole>,
    /// Targeted datasets: quantification types to keep.
    pub quantification_types: Vec<QuantificationType>,
    /// Targeted datasets: calibration methods to keep.
    pub calibration_methods: Vec<CalibrationMethod>,
    /// MS datasets: keep features whose study pool RSD is below this; read
    /// from the `rsdThreshold` attribute when unset.
    pub rsd_threshold: Option<f64>,
    /// MS datasets: also require the study sample RSD to exceed the study
    /// pool RSD.
    pub variance_ratio: bool,
}

impl Default for MaskUpdate {
    fn default() -> Self {
        Self {
            filter_samples: true,
            filter_features: false,
            sample_types: SampleType::ALL.to_vec(),
            assay_roles: AssayRole::ALL.to_vec(),
            quantification_types: QuantificationType::ALL.to_vec(),
            calibration_methods: CalibrationMethod::ALL.to_vec(),
            rsd_threshold: None,
            variance_ratio: false,
        }
    }
}

/// Features to exclude, matched by identifier or by a value range.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureSelector {
    Identifiers(Vec<String>),
    Ranges(Vec<(f64, f64)>),
}

impl Dataset {
    /// Resets both masks to all true.
    pub fn initialise_masks(&mut self) {
        self.sample_mask = vec![true; self.no_samples()];
        self.feature_mask = vec![true; self.no_features()];
        self.append_log("Masks initialised to True");
    }

    fn check_mask_lengths(&self) -> Result<()> {
        if self.sample_mask.len() != self.no_samples()
            || self.feature_mask.len() != self.no_features()
        {
            return Err(ProfilingError::Value(format!(
                "Mask lengths ({}, {}) do not match dataset shape ({}, {})",
                self.sample_mask.len(),
                self.feature_mask.len(),
                self.no_samples(),
                self.no_features()
            )));
        }
        Ok(())
    }

    /// Moves masked samples, then masked features, into the exclusion
    /// history and resets the masks.
    pub fn apply_masks(&mut self) -> Result<()> {
        self.check_mask_lengths()?;

        let n_samples_removed = self.sample_mask.iter().filter(|m| !**m).count();
        let n_features_removed = self.feature_mask.iter().filter(|m| !**m).count();

        if n_samples_removed > 0 {
            let mask = std::mem::take(&mut self.sample_mask);
            self.excluded.push(ExcludedBatch {
                flag: ExclusionFlag::Samples,
                sample_metadata: self.sample_metadata.filter_rows(&mask, false),
                intensity_data: self.intensity_data.filter_rows(&mask, false),
                feature_metadata: self.feature_metadata.clone(),
            });
            let intensity = self.intensity_data.filter_rows(&mask, true);
            let samples = self.sample_metadata.filter_rows(&mask, true);
            let features = self.feature_metadata.clone();
            self.replace_data(intensity, samples, features)?;
            if let Some(fit) = self.fit.as_mut() {
                *fit = fit.filter_rows(&mask, true);
            }
            if let Some(targeted) = self.assay.targeted_mut() {
                if let Some(expected) = targeted.expected_concentration.as_mut() {
                    *expected = expected.filter_rows(&mask, true);
                }
            }
        }

        if n_features_removed > 0 {
            let mask = std::mem::take(&mut self.feature_mask);
            self.excluded.push(ExcludedBatch {
                flag: ExclusionFlag::Features,
                sample_metadata: self.sample_metadata.clone(),
                intensity_data: self.intensity_data.filter_cols(&mask, false),
                feature_metadata: self.feature_metadata.filter_rows(&mask, false),
            });
            let intensity = self.intensity_data.filter_cols(&mask, true);
            let samples = self.sample_metadata.clone();
            let features = self.feature_metadata.filter_rows(&mask, true);
            self.replace_data(intensity, samples, features)?;
            if let Some(fit) = self.fit.as_mut() {
                *fit = fit.filter_cols(&mask, true);
            }
            if let Some(targeted) = self.assay.targeted_mut() {
                if let Some(expected) = targeted.expected_concentration.as_mut() {
                    *expected = expected.filter_cols(&mask, true);
                }
                for record in targeted.calibration.iter_mut() {
                    record.feature_metadata = record.feature_metadata.filter_rows(&mask, true);
                    record.intensity_data = record.intensity_data.filter_cols(&mask, true);
                    record.expected_concentration =
                        record.expected_concentration.filter_cols(&mask, true);
                }
            }
        }

        self.sample_mask = vec![true; self.no_samples()];
        self.feature_mask = vec![true; self.no_features()];
        info!(
            "Applied masks to {}: {} samples and {} features excluded",
            self.name(),
            n_samples_removed,
            n_features_removed
        );
        self.append_log(format!(
            "Masks applied: {} samples and {} features excluded",
            n_samples_removed, n_features_removed
        ));
        Ok(())
    }

    /// Masks samples and features that do not match the requested filters.
    pub fn update_masks(&mut self, update: &MaskUpdate) -> Result<()> {
        if update.filter_samples {
            let keep = select_samples(self, &update.sample_types, &update.assay_roles, false)?;
            for (m, k) in self.sample_mask.iter_mut().zip(keep) {
                *m = *m && k;
            }
        }

        if update.filter_features {
            let keep = match &self.assay {
                AssayKind::Targeted(_) => self.targeted_feature_filter(update)?,
                AssayKind::MassSpectrometry => self.ms_feature_filter(update)?,
                other => {
                    return Err(ProfilingError::NotImplemented(format!(
                        "Feature filtering is not implemented for {}",
                        other.class_name()
                    )));
                }
            };
            for (m, k) in self.feature_mask.iter_mut().zip(keep) {
                *m = *m && k;
            }
        }

        self.append_log(format!(
            "Masks updated (filterSamples={}, filterFeatures={}, sampleTypes={:?}, assayRoles={:?})",
            update.filter_samples, update.filter_features, update.sample_types, update.assay_roles
        ));
        Ok(())
    }

    fn targeted_feature_filter(&self, update: &MaskUpdate) -> Result<Vec<bool>> {
        let quant: Vec<Option<QuantificationType>> =
            self.feature_metadata.parsed("quantificationType")?;
        let calib: Vec<Option<CalibrationMethod>> =
            self.feature_metadata.parsed("calibrationMethod")?;
        Ok(quant
            .iter()
            .zip(calib.iter())
            .map(|(q, c)| {
                q.map(|q| update.quantification_types.contains(&q))
                    .unwrap_or(false)
                    && c.map(|c| update.calibration_methods.contains(&c))
                        .unwrap_or(false)
            })
            .collect())
    }

    fn ms_feature_filter(&self, update: &MaskUpdate) -> Result<Vec<bool>> {
        let threshold = match update.rsd_threshold {
            Some(t) => t,
            None => self.attributes.get_f64("rsdThreshold")?,
        };
        let data = self.intensity_data();
        let sp = SampleSelection::StudyPool.mask(self, true)?;
        let rsd_sp = qc::rsd(&data.filter_rows(&sp, true));

        let mut keep: Vec<bool> = rsd_sp.iter().map(|r| *r < threshold).collect();
        if update.variance_ratio {
            let ss = SampleSelection::StudySample.mask(self, true)?;
            let rsd_ss = qc::rsd(&data.filter_rows(&ss, true));
            for ((k, sp), ss) in keep.iter_mut().zip(rsd_sp.iter()).zip(rsd_ss.iter()) {
                *k = *k && ss > sp;
            }
        }
        Ok(keep)
    }

    /// Masks the samples whose `on` column matches one of `identifiers` and
    /// records `message` in their exclusion details.
    ///
    /// Returns the identifiers that matched no sample.
    pub fn exclude_samples(
        &mut self,
        identifiers: &[String],
        on: &str,
        message: &str,
    ) -> Result<Vec<String>> {
        if !self.sample_metadata.has_column(on) {
            return Err(ProfilingError::Value(format!(
                "'{}' is not a column of sampleMetadata",
                on
            )));
        }
        self.check_mask_lengths()?;
        self.sample_metadata
            .ensure_column(EXCLUSION_DETAILS, Value::Null);

        let mut not_found = Vec::new();
        for id in identifiers {
            let rows = self.sample_metadata.find_rows(on, id)?;
            if rows.is_empty() {
                not_found.push(id.clone());
                continue;
            }
            for row in rows {
                self.sample_mask[row] = false;
                let details = match self.sample_metadata.get(row, EXCLUSION_DETAILS) {
                    Some(v) if !v.is_missing() && !v.to_string().is_empty() => {
                        format!("{}; {}", v, message)
                    }
                    _ => message.to_string(),
                };
                self.sample_metadata.set(row, EXCLUSION_DETAILS, details)?;
            }
        }

        self.append_log(format!(
            "{} samples masked on '{}': {}",
            identifiers.len() - not_found.len(),
            on,
            message
        ));
        Ok(not_found)
    }

    /// Masks features by identifier (discrete data) or by value range over
    /// `on` (continuum data).
    ///
    /// Returns the identifiers that matched no feature; ranges never do.
    pub fn exclude_features(
        &mut self,
        selector: &FeatureSelector,
        on: &str,
        message: &str,
    ) -> Result<Vec<String>> {
        if !self.feature_metadata.has_column(on) {
            return Err(ProfilingError::Value(format!(
                "'{}' is not a column of featureMetadata",
                on
            )));
        }
        self.check_mask_lengths()?;
        let mut not_found = Vec::new();
        match (self.variable_type, selector) {
            (VariableType::Discrete, FeatureSelector::Identifiers(ids)) => {
                for id in ids {
                    let rows = self.feature_metadata.find_rows(on, id)?;
                    if rows.is_empty() {
                        not_found.push(id.clone());
                    }
                    for row in rows {
                        self.feature_mask[row] = false;
                    }
                }
            }
            (VariableType::Continuum, FeatureSelector::Ranges(ranges)) => {
                let values = self.feature_metadata.floats(on)?;
                for &(a, b) in ranges {
                    if a == b {
                        warn!(
                            "Low ({}) and high ({}) bounds are identical, skipping region",
                            a, b
                        );
                        continue;
                    }
                    let (low, high) = (a.min(b), a.max(b));
                    for (m, v) in self.feature_mask.iter_mut().zip(values.iter()) {
                        if *v >= low && *v <= high {
                            *m = false;
                        }
                    }
                }
            }
            (vt, _) => {
                return Err(ProfilingError::Value(format!(
                    "Features of a {} dataset cannot be excluded with {:?}",
                    vt, selector
                )));
            }
        }
        self.append_log(format!("Features masked on '{}': {}", on, message));
        Ok(not_found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Array2D,
        Table,
    };

    fn ds(variable_type: VariableType) -> Dataset {
        let samples = Table::from_columns(vec![
            (
                "Sample File Name",
                vec!["a".into(), "b".into(), "c".into()],
            ),
            ("SampleType", vec!["StudySample".into(), "StudyPool".into(), "StudySample".into()]),
            ("AssayRole", vec!["Assay".into(), "PrecisionReference".into(), "Assay".into()]),
        ])
        .unwrap();
        let features = Table::from_columns(vec![
            ("Feature Name", vec!["f1".into(), "f2".into()]),
            ("ppm", vec![1.0.into(), 2.0.into()]),
        ])
        .unwrap();
        let mut ds = Dataset::with_default_sop(
            "masks",
            AssayKind::Generic,
            Array2D::new(vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]).unwrap(),
            samples,
            features,
        )
        .unwrap();
        ds.variable_type = variable_type;
        ds
    }

    #[test]
    fn test_exclude_samples_reports_missing() {
        let mut ds = ds(VariableType::Discrete);
        let missing = ds
            .exclude_samples(&["b".into(), "zz".into()], "Sample File Name", "bad")
            .unwrap();
        assert_eq!(missing, vec!["zz".to_string()]);
        assert_eq!(ds.sample_mask, vec![true, false, true]);
        assert_eq!(
            ds.sample_metadata.get(1, EXCLUSION_DETAILS),
            Some(&Value::from("bad"))
        );

        ds.exclude_samples(&["b".into()], "Sample File Name", "worse")
            .unwrap();
        assert_eq!(
            ds.sample_metadata.get(1, EXCLUSION_DETAILS),
            Some(&Value::from("bad; worse"))
        );
    }

    #[test]
    fn test_exclude_samples_unknown_column() {
        let mut ds = ds(VariableType::Discrete);
        let err = ds.exclude_samples(&["a".into()], "Nope", "x").unwrap_err();
        assert_eq!(err.kind(), "ValueError");
    }

    #[test]
    fn test_resized_masks_are_rejected() {
        let mut short_samples = ds(VariableType::Discrete);
        short_samples.sample_mask.truncate(1);
        let err = short_samples
            .exclude_samples(&["c".into()], "Sample File Name", "x")
            .unwrap_err();
        assert_eq!(err.kind(), "ValueError");

        let mut no_features = ds(VariableType::Discrete);
        no_features.feature_mask.clear();
        let err = no_features
            .exclude_features(
                &FeatureSelector::Identifiers(vec!["f2".into()]),
                "Feature Name",
                "x",
            )
            .unwrap_err();
        assert_eq!(err.kind(), "ValueError");
        assert!(no_features.apply_masks().is_err());
    }

    #[test]
    fn test_exclude_features_wrong_selector() {
        let mut ds = ds(VariableType::Discrete);
        let err = ds
            .exclude_features(&FeatureSelector::Ranges(vec![(0.0, 1.0)]), "ppm", "x")
            .unwrap_err();
        assert_eq!(err.kind(), "ValueError");

        let missing = ds
            .exclude_features(
                &FeatureSelector::Identifiers(vec!["f2".into(), "f9".into()]),
                "Feature Name",
                "x",
            )
            .unwrap();
        assert_eq!(missing, vec!["f9".to_string()]);
        assert_eq!(ds.feature_mask, vec![true, false]);
    }

    #[test]
    fn test_empty_range_is_skipped() {
        let mut ds = ds(VariableType::Continuum);
        ds.exclude_features(&FeatureSelector::Ranges(vec![(1.0, 1.0)]), "ppm", "x")
            .unwrap();
        assert_eq!(ds.feature_mask, vec![true, true]);
    }

    #[test]
    fn test_update_masks_by_type() {
        let mut ds = ds(VariableType::Discrete);
        ds.update_masks(&MaskUpdate {
            sample_types: vec![SampleType::StudySample],
            assay_roles: vec![AssayRole::Assay],
            ..Default::default()
        })
        .unwrap();
        assert_eq!(ds.sample_mask, vec![true, false, true]);
    }

    #[test]
    fn test_generic_feature_filter_not_implemented() {
        let mut ds = ds(VariableType::Discrete);
        let err = ds
            .update_masks(&MaskUpdate {
                filter_features: true,
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err.kind(), "NotImplementedError");
    }

    #[test]
    fn test_apply_masks_archives() {
        let mut ds = ds(VariableType::Discrete);
        ds.sample_mask[0] = false;
        ds.feature_mask[1] = false;
        ds.apply_masks().unwrap();
        assert_eq!(ds.raw_intensity_data().shape(), (2, 1));
        assert_eq!(ds.raw_intensity_data().values(), &[3.0, 5.0]);
        assert_eq!(
            ds.excluded.flags(),
            vec![ExclusionFlag::Samples, ExclusionFlag::Features]
        );
        assert!(ds.excluded.batches().iter().all(|b| b.is_consistent()));
        assert_eq!(ds.sample_mask, vec![true, true]);
        assert_eq!(ds.feature_mask, vec![true]);
    }
}
