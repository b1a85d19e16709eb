use std::fmt::Display;
use std::sync::Arc;

use crate::enumerations::{
    AssayRole,
    SampleType,
    VariableType,
};
use crate::errors::{
    ProfilingError,
    Result,
};
use crate::models::{
    Array2D,
    Attributes,
    LogEntry,
    Normaliser,
    NullNormaliser,
    Table,
};

/// Columns every sample metadata table must carry.
pub const SAMPLE_METADATA_COLUMNS: [&str; 11] = [
    "Sample File Name",
    "Sample Base Name",
    "AssayRole",
    "SampleType",
    "Run Order",
    "Acquired Time",
    "Batch",
    "Correction Batch",
    "Dilution",
    "Sample ID",
    "Exclusion Details",
];

pub const FEATURE_NAME: &str = "Feature Name";

/// Feature columns every targeted dataset must carry,
/// besides the external identifiers listed in `externalID`.
pub const TARGETED_FEATURE_COLUMNS: [&str; 5] = [
    "calibrationMethod",
    "quantificationType",
    "Unit",
    "LLOQ",
    "ULOQ",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExclusionFlag {
    Samples,
    Features,
}

impl Display for ExclusionFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExclusionFlag::Samples => write!(f, "Samples"),
            ExclusionFlag::Features => write!(f, "Features"),
        }
    }
}

/// Rows or columns removed from the live arrays by one `apply_masks` step.
///
/// For a `Samples` batch the feature table is the full one at the time;
/// for a `Features` batch the sample table is.
#[derive(Debug, Clone, PartialEq)]
pub struct ExcludedBatch {
    pub flag: ExclusionFlag,
    pub sample_metadata: Table,
    pub intensity_data: Array2D<f64>,
    pub feature_metadata: Table,
}

impl ExcludedBatch {
    pub fn is_consistent(&self) -> bool {
        self.intensity_data.nrows() == self.sample_metadata.nrows()
            && self.intensity_data.ncols() == self.feature_metadata.nrows()
    }
}

/// Archive of applied exclusions.
///
/// A concatenated dataset keeps each operand's history as its own element
/// followed by a fresh group for exclusions applied after the merge.
#[derive(Debug, Clone, PartialEq)]
pub enum ExclusionHistory {
    Flat(Vec<ExcludedBatch>),
    Merged(Vec<ExclusionHistory>),
}

impl Default for ExclusionHistory {
    fn default() -> Self {
        ExclusionHistory::Flat(Vec::new())
    }
}

impl ExclusionHistory {
    pub fn push(&mut self, batch: ExcludedBatch) {
        match self {
            ExclusionHistory::Flat(batches) => batches.push(batch),
            ExclusionHistory::Merged(groups) => match groups.last_mut() {
                Some(last) => last.push(batch),
                None => groups.push(ExclusionHistory::Flat(vec![batch])),
            },
        }
    }

    /// Number of top-level elements.
    pub fn len(&self) -> usize {
        match self {
            ExclusionHistory::Flat(batches) => batches.len(),
            ExclusionHistory::Merged(groups) => groups.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every archived batch, depth first.
    pub fn batches(&self) -> Vec<&ExcludedBatch> {
        match self {
            ExclusionHistory::Flat(batches) => batches.iter().collect(),
            ExclusionHistory::Merged(groups) => groups.iter().flat_map(|g| g.batches()).collect(),
        }
    }

    pub fn flags(&self) -> Vec<ExclusionFlag> {
        self.batches().iter().map(|b| b.flag).collect()
    }
}

/// Calibration samples of one acquisition batch of a targeted assay.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationRecord {
    pub batch: i64,
    pub sample_metadata: Table,
    pub feature_metadata: Table,
    pub intensity_data: Array2D<f64>,
    pub expected_concentration: Array2D<f64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TargetedData {
    /// Samples x features, row aligned with the dataset.
    pub expected_concentration: Option<Array2D<f64>>,
    pub calibration: Vec<CalibrationRecord>,
}

/// Which kind of profiling experiment a dataset holds.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AssayKind {
    #[default]
    Generic,
    MassSpectrometry,
    Nmr,
    Targeted(TargetedData),
}

impl AssayKind {
    pub fn class_name(&self) -> &'static str {
        match self {
            AssayKind::Generic => "Dataset",
            AssayKind::MassSpectrometry => "MSDataset",
            AssayKind::Nmr => "NMRDataset",
            AssayKind::Targeted(_) => "TargetedDataset",
        }
    }

    /// Name of the assay specific validation tier, if there is one.
    pub fn basic_tier(&self) -> Option<&'static str> {
        match self {
            AssayKind::Generic => None,
            AssayKind::MassSpectrometry => Some("BasicMSDataset"),
            AssayKind::Nmr => Some("BasicNMRDataset"),
            AssayKind::Targeted(_) => Some("BasicTargetedDataset"),
        }
    }

    pub fn default_sop(&self) -> &'static str {
        match self {
            AssayKind::Generic => "Generic",
            AssayKind::MassSpectrometry => "GenericMS",
            AssayKind::Nmr => "GenericNMR",
            AssayKind::Targeted(_) => "GenericTargeted",
        }
    }

    pub fn default_variable_type(&self) -> VariableType {
        match self {
            AssayKind::Nmr => VariableType::Continuum,
            _ => VariableType::Discrete,
        }
    }

    /// Same variant, ignoring any targeted payload.
    pub fn same_kind(&self, other: &AssayKind) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    pub fn targeted(&self) -> Option<&TargetedData> {
        match self {
            AssayKind::Targeted(t) => Some(t),
            _ => None,
        }
    }

    pub fn targeted_mut(&mut self) -> Option<&mut TargetedData> {
        match self {
            AssayKind::Targeted(t) => Some(t),
            _ => None,
        }
    }
}

/// Intensities, sample and feature metadata of one profiling experiment,
/// together with masks, exclusion history and attributes.
#[derive(Debug, Clone)]
pub struct Dataset {
    name: String,
    pub(crate) intensity_data: Array2D<f64>,
    pub sample_metadata: Table,
    pub feature_metadata: Table,
    pub sample_mask: Vec<bool>,
    pub feature_mask: Vec<bool>,
    pub excluded: ExclusionHistory,
    pub attributes: Attributes,
    pub variable_type: VariableType,
    /// Drift fit of the last run-order correction, same shape as the intensities.
    pub fit: Option<Array2D<f64>>,
    pub assay: AssayKind,
    normalisation: Arc<dyn Normaliser>,
}

impl Dataset {
    /// Builds a dataset from loaded tables; masks start all true.
    ///
    /// Fails with a value error when the intensity shape does not match the
    /// two metadata tables.
    pub fn new(
        name: impl Into<String>,
        assay: AssayKind,
        intensity_data: Array2D<f64>,
        sample_metadata: Table,
        feature_metadata: Table,
        attributes: Attributes,
    ) -> Result<Self> {
        let name = name.into();
        check_shape(&intensity_data, &sample_metadata, &feature_metadata)?;
        let variable_type = assay.default_variable_type();
        let mut out = Self {
            name,
            sample_mask: vec![true; intensity_data.nrows()],
            feature_mask: vec![true; intensity_data.ncols()],
            intensity_data,
            sample_metadata,
            feature_metadata,
            excluded: ExclusionHistory::default(),
            attributes,
            variable_type,
            fit: None,
            assay,
            normalisation: Arc::new(NullNormaliser),
        };
        out.append_log(format!(
            "{} created with {} samples and {} features",
            out.class_name(),
            out.no_samples(),
            out.no_features()
        ));
        Ok(out)
    }

    /// Like [`Dataset::new`], with attributes from the default SOP of the assay kind.
    pub fn with_default_sop(
        name: impl Into<String>,
        assay: AssayKind,
        intensity_data: Array2D<f64>,
        sample_metadata: Table,
        feature_metadata: Table,
    ) -> Result<Self> {
        let attributes = Attributes::from_sop(assay.default_sop())?;
        Self::new(
            name,
            assay,
            intensity_data,
            sample_metadata,
            feature_metadata,
            attributes,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn class_name(&self) -> &'static str {
        self.assay.class_name()
    }

    pub fn no_samples(&self) -> usize {
        self.sample_metadata.nrows()
    }

    pub fn no_features(&self) -> usize {
        self.feature_metadata.nrows()
    }

    /// Intensities as seen through the normaliser.
    pub fn intensity_data(&self) -> Array2D<f64> {
        self.normalisation.normalise(&self.intensity_data)
    }

    pub fn raw_intensity_data(&self) -> &Array2D<f64> {
        &self.intensity_data
    }

    /// Replaces the raw intensities; the shape must be unchanged.
    pub fn set_intensity_data(&mut self, data: Array2D<f64>) -> Result<()> {
        check_shape(&data, &self.sample_metadata, &self.feature_metadata)?;
        self.intensity_data = data;
        self.append_log("Intensity data replaced");
        Ok(())
    }

    pub fn normalisation(&self) -> &Arc<dyn Normaliser> {
        &self.normalisation
    }

    pub fn set_normalisation(&mut self, normaliser: Arc<dyn Normaliser>) {
        let message = format!("Normalisation set to {}", normaliser.name());
        self.normalisation = normaliser;
        self.append_log(message);
    }

    pub fn append_log(&mut self, message: impl Into<String>) {
        self.attributes.append_log(message);
    }

    pub fn log_entries(&self) -> &[LogEntry] {
        self.attributes.log()
    }

    /// The provenance log as text, one line per entry.
    pub fn log(&self, timestamp_format: &str) -> String {
        self.attributes.format_log(timestamp_format)
    }

    pub fn sample_types(&self) -> Result<Vec<Option<SampleType>>> {
        self.sample_metadata.parsed("SampleType")
    }

    pub fn assay_roles(&self) -> Result<Vec<Option<AssayRole>>> {
        self.sample_metadata.parsed("AssayRole")
    }

    pub fn feature_names(&self) -> Result<Vec<String>> {
        Ok(self
            .feature_metadata
            .strings(FEATURE_NAME)?
            .into_iter()
            .map(Option::unwrap_or_default)
            .collect())
    }

    /// Replaces intensities and both tables together.
    pub(crate) fn replace_data(
        &mut self,
        intensity_data: Array2D<f64>,
        sample_metadata: Table,
        feature_metadata: Table,
    ) -> Result<()> {
        check_shape(&intensity_data, &sample_metadata, &feature_metadata)?;
        self.intensity_data = intensity_data;
        self.sample_metadata = sample_metadata;
        self.feature_metadata = feature_metadata;
        Ok(())
    }
}

impl Display for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "<{} instance at {:p}, named {}, with {} samples, {} features>",
            self.class_name(),
            self,
            self.name,
            self.no_samples(),
            self.no_features()
        )
    }
}

fn check_shape(intensity: &Array2D<f64>, samples: &Table, features: &Table) -> Result<()> {
    if intensity.nrows() != samples.nrows() || intensity.ncols() != features.nrows() {
        return Err(ProfilingError::Value(format!(
            "intensityData has shape {:?} but there are {} samples and {} features",
            intensity.shape(),
            samples.nrows(),
            features.nrows()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Value;

    fn tiny() -> Dataset {
        let samples = Table::from_columns(vec![(
            "Sample File Name",
            vec![Value::from("s1"), Value::from("s2")],
        )])
        .unwrap();
        let features = Table::from_columns(vec![(
            FEATURE_NAME,
            vec![Value::from("f1"), Value::from("f2"), Value::from("f3")],
        )])
        .unwrap();
        Dataset::with_default_sop(
            "tiny",
            AssayKind::Generic,
            Array2D::filled(2, 3, 1.0),
            samples,
            features,
        )
        .unwrap()
    }

    #[test]
    fn test_shape_mismatch_is_value_error() {
        let samples = Table::new(2);
        let features = Table::new(2);
        let err = Dataset::with_default_sop(
            "bad",
            AssayKind::Generic,
            Array2D::filled(2, 3, 1.0),
            samples,
            features,
        )
        .unwrap_err();
        assert_eq!(err.kind(), "ValueError");
    }

    #[test]
    fn test_repr() {
        let ds = tiny();
        let repr = ds.to_string();
        assert!(repr.starts_with("<Dataset instance at 0x"));
        assert!(repr.ends_with("named tiny, with 2 samples, 3 features>"));
    }

    #[test]
    fn test_normalised_getter() {
        let mut ds = tiny();
        ds.set_normalisation(Arc::new(crate::models::TotalAreaNormaliser {
            keep_magnitude: false,
        }));
        let data = ds.intensity_data();
        assert!((data.get(0, 0).unwrap() - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(ds.raw_intensity_data().get(0, 0), Some(1.0));
    }

    #[test]
    fn test_mutations_are_logged() {
        let mut ds = tiny();
        let before = ds.log_entries().len();
        ds.set_intensity_data(Array2D::filled(2, 3, 2.0)).unwrap();
        assert_eq!(ds.log_entries().len(), before + 1);
        assert!(ds.set_intensity_data(Array2D::filled(3, 3, 2.0)).is_err());
    }

    #[test]
    fn test_merged_history_pushes_into_last_group() {
        let batch = ExcludedBatch {
            flag: ExclusionFlag::Samples,
            sample_metadata: Table::new(1),
            intensity_data: Array2D::filled(1, 0, 0.0),
            feature_metadata: Table::new(0),
        };
        let mut history = ExclusionHistory::Merged(vec![
            ExclusionHistory::default(),
            ExclusionHistory::default(),
            ExclusionHistory::default(),
        ]);
        history.push(batch);
        assert_eq!(history.len(), 3);
        assert_eq!(history.flags(), vec![ExclusionFlag::Samples]);
        match &history {
            ExclusionHistory::Merged(groups) => assert_eq!(groups[2].len(), 1),
            _ => unreachable!(),
        }
    }
}
