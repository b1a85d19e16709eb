//! Tiered structural self-check of a dataset.
//!
//! Every dataset is checked against the `Dataset` tier. Assay specific
//! datasets add their basic tier (`BasicMSDataset`, `BasicNMRDataset`,
//! `BasicTargetedDataset`), then `QC` and `sampleMetadata`. Tiers are
//! cumulative: a tier passes only when every lower tier passes too.

use std::collections::HashSet;
use tracing::warn;

use crate::dataset::{
    AssayKind,
    Dataset,
    ExclusionHistory,
    FEATURE_NAME,
    SAMPLE_METADATA_COLUMNS,
    TARGETED_FEATURE_COLUMNS,
};
use crate::enumerations::{
    CalibrationMethod,
    QuantificationType,
    VariableType,
};
use crate::errors::{
    ProfilingError,
    Result,
};
use crate::models::{
    Table,
    MANDATORY_ATTRIBUTES,
};

/// Outcome of [`Dataset::validate_object`], tiers in increasing order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    tiers: Vec<(&'static str, bool)>,
}

impl ValidationReport {
    pub fn passed(&self, tier: &str) -> Option<bool> {
        self.tiers.iter().find(|(t, _)| *t == tier).map(|(_, ok)| *ok)
    }

    pub fn tiers(&self) -> &[(&'static str, bool)] {
        &self.tiers
    }

    pub fn all_passed(&self) -> bool {
        self.tiers.iter().all(|(_, ok)| *ok)
    }

    /// The `Dataset` tier and, if the assay has one, its basic tier.
    pub fn basic_passed(&self, assay: &AssayKind) -> bool {
        let base = self.passed("Dataset").unwrap_or(false);
        match assay.basic_tier() {
            Some(tier) => base && self.passed(tier).unwrap_or(false),
            None => base,
        }
    }
}

// Turns predicate failures into `false`, a warning, or an early error.
struct Checker {
    raise_error: bool,
    raise_warning: bool,
    ok: bool,
}

impl Checker {
    fn check(&mut self, result: Result<()>) -> Result<()> {
        if let Err(e) = result {
            self.ok = false;
            if self.raise_warning {
                warn!("Validation failed: {}", e);
            }
            if self.raise_error {
                return Err(e);
            }
        }
        Ok(())
    }

    fn finish_tier(&mut self) -> bool {
        let ok = self.ok;
        self.ok = true;
        ok
    }
}

impl Dataset {
    /// Checks the dataset against every tier of its assay kind.
    ///
    /// With `raise_error` the first failing predicate is returned as an
    /// error of its specific kind; with `raise_warning` every failure is
    /// also emitted as a warning.
    pub fn validate_object(&self, raise_error: bool, raise_warning: bool) -> Result<ValidationReport> {
        let mut checker = Checker {
            raise_error,
            raise_warning,
            ok: true,
        };
        let mut tiers = Vec::new();

        self.check_base(&mut checker)?;
        let mut cumulative = checker.finish_tier();
        tiers.push(("Dataset", cumulative));

        if let Some(basic) = self.assay.basic_tier() {
            match &self.assay {
                AssayKind::MassSpectrometry => self.check_basic_ms(&mut checker)?,
                AssayKind::Nmr => self.check_basic_nmr(&mut checker)?,
                AssayKind::Targeted(_) => self.check_basic_targeted(&mut checker)?,
                AssayKind::Generic => {}
            }
            cumulative &= checker.finish_tier();
            tiers.push((basic, cumulative));

            self.check_qc(&mut checker)?;
            cumulative &= checker.finish_tier();
            tiers.push(("QC", cumulative));

            self.check_sample_metadata(&mut checker)?;
            cumulative &= checker.finish_tier();
            tiers.push(("sampleMetadata", cumulative));
        }

        Ok(ValidationReport { tiers })
    }

    fn check_base(&self, c: &mut Checker) -> Result<()> {
        for key in MANDATORY_ATTRIBUTES {
            c.check(self.attributes.require(key).map(|_| ()))?;
        }
        let attrs = &self.attributes;
        for key in ["dpi", "histBins", "noFiles"] {
            if attrs.contains(key) {
                c.check(attrs.get_i64(key).map(|_| ()))?;
            }
        }
        for key in ["figureSize", "quantiles"] {
            if attrs.contains(key) {
                c.check(attrs.get_number_pair(key).map(|_| ()))?;
            }
        }
        if attrs.contains("figureFormat") {
            c.check(attrs.get_str("figureFormat").map(|_| ()))?;
        }
        for key in [
            "sampleMetadataNotExported",
            "featureMetadataNotExported",
            "excludeFromPlotting",
        ] {
            if attrs.contains(key) {
                c.check(attrs.get_str_list(key).map(|_| ()))?;
            }
        }
        for key in ["analyticalMeasurements", "sampleTypeColours"] {
            if attrs.contains(key) {
                c.check(attrs.get_object(key).map(|_| ()))?;
            }
        }

        for col in SAMPLE_METADATA_COLUMNS {
            c.check(require_column(&self.sample_metadata, "sampleMetadata", col))?;
        }
        c.check(require_column(&self.feature_metadata, "featureMetadata", FEATURE_NAME))?;

        let (nrows, ncols) = self.intensity_data.shape();
        c.check(expect(
            nrows == self.no_samples() && ncols == self.no_features(),
            format!(
                "intensityData has shape ({}, {}), expected ({}, {})",
                nrows,
                ncols,
                self.no_samples(),
                self.no_features()
            ),
        ))?;
        c.check(expect(
            self.sample_mask.len() == self.no_samples(),
            format!(
                "sampleMask has length {}, expected {}",
                self.sample_mask.len(),
                self.no_samples()
            ),
        ))?;
        c.check(expect(
            self.feature_mask.len() == self.no_features(),
            format!(
                "featureMask has length {}, expected {}",
                self.feature_mask.len(),
                self.no_features()
            ),
        ))?;
        if let Some(fit) = &self.fit {
            c.check(expect(
                fit.shape() == self.intensity_data.shape(),
                format!("fit has shape {:?}, expected {:?}", fit.shape(), (nrows, ncols)),
            ))?;
        }

        if self.feature_metadata.has_column(FEATURE_NAME) {
            c.check(self.check_unique(&self.feature_metadata, FEATURE_NAME, "featureMetadata"))?;
        }

        c.check(check_exclusions(&self.excluded))?;
        Ok(())
    }

    fn check_basic_ms(&self, c: &mut Checker) -> Result<()> {
        for col in ["m/z", "Retention Time"] {
            c.check(require_column(&self.feature_metadata, "featureMetadata", col))?;
            if self.feature_metadata.has_column(col) {
                c.check(self.feature_metadata.floats(col).map(|_| ()))?;
            }
        }
        Ok(())
    }

    fn check_basic_nmr(&self, c: &mut Checker) -> Result<()> {
        c.check(require_column(&self.feature_metadata, "featureMetadata", "ppm"))?;
        if self.feature_metadata.has_column("ppm") {
            match self.feature_metadata.floats("ppm") {
                Ok(ppm) => {
                    let ascending = ppm.windows(2).all(|w| w[0] <= w[1]);
                    let descending = ppm.windows(2).all(|w| w[0] >= w[1]);
                    c.check(expect(
                        ascending || descending,
                        "featureMetadata['ppm'] is not monotonic".to_string(),
                    ))?;
                }
                Err(e) => c.check(Err(e))?,
            }
        }
        c.check(expect(
            self.variable_type == VariableType::Continuum,
            format!(
                "NMR datasets must have VariableType Continuum, found {}",
                self.variable_type
            ),
        ))?;
        Ok(())
    }

    fn check_basic_targeted(&self, c: &mut Checker) -> Result<()> {
        c.check(self.attributes.get_str("methodName").map(|_| ()))?;
        let external_ids = match self.attributes.get_str_list("externalID") {
            Ok(ids) => ids,
            Err(e) => {
                c.check(Err(e))?;
                Vec::new()
            }
        };
        for col in TARGETED_FEATURE_COLUMNS
            .iter()
            .map(|s| s.to_string())
            .chain(external_ids)
        {
            c.check(require_column(&self.feature_metadata, "featureMetadata", &col))?;
        }

        let fm = &self.feature_metadata;
        if fm.has_column("calibrationMethod") {
            c.check(fm.parsed::<CalibrationMethod>("calibrationMethod").map(|_| ()))?;
        }
        if fm.has_column("quantificationType") {
            c.check(fm.parsed::<QuantificationType>("quantificationType").map(|_| ()))?;
        }
        if fm.has_column("LLOQ") && fm.has_column("ULOQ") {
            match (fm.floats("LLOQ"), fm.floats("ULOQ")) {
                (Ok(lloq), Ok(uloq)) => {
                    let bad: Vec<usize> = lloq
                        .iter()
                        .zip(uloq.iter())
                        .enumerate()
                        .filter(|(_, (l, u))| l.is_finite() && u.is_finite() && l > u)
                        .map(|(i, _)| i)
                        .collect();
                    c.check(expect(
                        bad.is_empty(),
                        format!("LLOQ greater than ULOQ for features {:?}", bad),
                    ))?;
                }
                (Err(e), _) | (_, Err(e)) => c.check(Err(e))?,
            }
        }

        if let Some(targeted) = self.assay.targeted() {
            if let Some(expected) = &targeted.expected_concentration {
                c.check(expect(
                    expected.shape() == self.intensity_data.shape(),
                    format!(
                        "expectedConcentration has shape {:?}, expected {:?}",
                        expected.shape(),
                        self.intensity_data.shape()
                    ),
                ))?;
            }
            for record in targeted.calibration.iter() {
                let consistent = record.intensity_data.nrows() == record.sample_metadata.nrows()
                    && record.intensity_data.ncols() == record.feature_metadata.nrows()
                    && record.expected_concentration.shape() == record.intensity_data.shape()
                    && record.feature_metadata.nrows() == self.no_features();
                c.check(expect(
                    consistent,
                    format!("Calibration record of batch {} is inconsistent", record.batch),
                ))?;
            }
        }
        Ok(())
    }

    fn check_qc(&self, c: &mut Checker) -> Result<()> {
        let sm = &self.sample_metadata;
        if sm.has_column("Run Order") {
            c.check(sm.ints("Run Order").map(|_| ()))?;
        }
        if sm.has_column("Correction Batch") {
            c.check(sm.floats("Correction Batch").map(|_| ()))?;
        }
        if sm.has_column("SampleType") {
            c.check(self.sample_types().map(|_| ()))?;
        }
        if sm.has_column("AssayRole") {
            c.check(self.assay_roles().map(|_| ()))?;
        }
        Ok(())
    }

    fn check_sample_metadata(&self, c: &mut Checker) -> Result<()> {
        let sm = &self.sample_metadata;
        if sm.has_column("Sample File Name") {
            c.check(self.check_unique(sm, "Sample File Name", "sampleMetadata"))?;
        }
        if let Some(col) = sm.column("Acquired Time") {
            let bad = col
                .iter()
                .position(|v| !v.is_missing() && v.as_timestamp().is_none());
            c.check(expect_type(
                bad.is_none(),
                format!("sampleMetadata['Acquired Time'] row {:?} is not a timestamp", bad),
            ))?;
        }
        if sm.has_column("Batch") {
            match sm.ints("Batch") {
                Ok(batches) => c.check(expect(
                    batches.iter().flatten().all(|b| *b >= 1),
                    "sampleMetadata['Batch'] values must be >= 1".to_string(),
                ))?,
                Err(e) => c.check(Err(e))?,
            }
        }
        if sm.has_column("Dilution") {
            c.check(sm.floats("Dilution").map(|_| ()))?;
        }
        Ok(())
    }

    fn check_unique(&self, table: &Table, column: &str, table_name: &str) -> Result<()> {
        let mut seen = HashSet::new();
        let mut duplicates = Vec::new();
        for name in table.strings(column)?.into_iter().flatten() {
            if !seen.insert(name.clone()) {
                duplicates.push(name);
            }
        }
        expect(
            duplicates.is_empty(),
            format!(
                "{}['{}'] has duplicated entries: {:?}",
                table_name, column, duplicates
            ),
        )
    }
}

fn require_column(table: &Table, table_name: &str, column: &str) -> Result<()> {
    if table.has_column(column) {
        Ok(())
    } else {
        Err(ProfilingError::Lookup(format!(
            "{} lacks the '{}' column",
            table_name, column
        )))
    }
}

fn expect(condition: bool, message: String) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(ProfilingError::Value(message))
    }
}

fn expect_type(condition: bool, message: String) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(ProfilingError::Type(message))
    }
}

fn check_exclusions(history: &ExclusionHistory) -> Result<()> {
    for (i, batch) in history.batches().iter().enumerate() {
        expect(
            batch.is_consistent(),
            format!(
                "Excluded batch {} ({}) has {} sample rows, {} feature rows and intensities of shape {:?}",
                i,
                batch.flag,
                batch.sample_metadata.nrows(),
                batch.feature_metadata.nrows(),
                batch.intensity_data.shape()
            ),
        )?;
    }
    Ok(())
}
