use crate::dataset::Dataset;
use crate::enumerations::{
    AssayRole,
    SampleType,
};
use crate::errors::Result;

/// Boolean vector over samples: `SampleType` in `types` and `AssayRole` in
/// `roles`, optionally intersected with the sample mask.
///
/// Samples with a missing type or role never match.
pub fn select_samples(
    dataset: &Dataset,
    types: &[SampleType],
    roles: &[AssayRole],
    use_mask: bool,
) -> Result<Vec<bool>> {
    let sample_types = dataset.sample_types()?;
    let assay_roles = dataset.assay_roles()?;
    Ok(sample_types
        .iter()
        .zip(assay_roles.iter())
        .enumerate()
        .map(|(i, (st, ar))| {
            let hit = matches!(st, Some(st) if types.contains(st))
                && matches!(ar, Some(ar) if roles.contains(ar));
            hit && (!use_mask || dataset.sample_mask.get(i).copied().unwrap_or(false))
        })
        .collect())
}

/// The standard sample groupings used by correction and QC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleSelection {
    /// Study sample, assay.
    StudySample,
    /// Study pool, precision reference.
    StudyPool,
    /// External reference, precision reference.
    ExternalReference,
    /// Study pool, linearity reference.
    SerialDilution,
    /// Procedural blank, any role.
    Blank,
}

impl SampleSelection {
    pub fn types(&self) -> &'static [SampleType] {
        match self {
            SampleSelection::StudySample => &[SampleType::StudySample],
            SampleSelection::StudyPool | SampleSelection::SerialDilution => {
                &[SampleType::StudyPool]
            }
            SampleSelection::ExternalReference => &[SampleType::ExternalReference],
            SampleSelection::Blank => &[SampleType::ProceduralBlank],
        }
    }

    pub fn roles(&self) -> &'static [AssayRole] {
        match self {
            SampleSelection::StudySample => &[AssayRole::Assay],
            SampleSelection::StudyPool | SampleSelection::ExternalReference => {
                &[AssayRole::PrecisionReference]
            }
            SampleSelection::SerialDilution => &[AssayRole::LinearityReference],
            SampleSelection::Blank => AssayRole::ALL,
        }
    }

    pub fn mask(&self, dataset: &Dataset, use_mask: bool) -> Result<Vec<bool>> {
        select_samples(dataset, self.types(), self.roles(), use_mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::AssayKind;
    use crate::models::{
        Array2D,
        Table,
        Value,
    };

    fn dataset() -> Dataset {
        let types = ["StudySample", "StudyPool", "StudyPool", "ProceduralBlank", "ExternalReference"];
        let roles = ["Assay", "PrecisionReference", "LinearityReference", "Assay", "PrecisionReference"];
        let samples = Table::from_columns(vec![
            ("SampleType", types.iter().map(|s| Value::from(*s)).collect()),
            ("AssayRole", roles.iter().map(|s| Value::from(*s)).collect()),
        ])
        .unwrap();
        let features = Table::from_columns(vec![("Feature Name", vec![Value::from("f")])]).unwrap();
        Dataset::with_default_sop(
            "sel",
            AssayKind::Generic,
            Array2D::filled(5, 1, 1.0),
            samples,
            features,
        )
        .unwrap()
    }

    #[test]
    fn test_standard_selections() {
        let mut ds = dataset();
        assert_eq!(
            SampleSelection::StudySample.mask(&ds, false).unwrap(),
            vec![true, false, false, false, false]
        );
        assert_eq!(
            SampleSelection::StudyPool.mask(&ds, false).unwrap(),
            vec![false, true, false, false, false]
        );
        assert_eq!(
            SampleSelection::SerialDilution.mask(&ds, false).unwrap(),
            vec![false, false, true, false, false]
        );
        assert_eq!(
            SampleSelection::Blank.mask(&ds, false).unwrap(),
            vec![false, false, false, true, false]
        );
        assert_eq!(
            SampleSelection::ExternalReference.mask(&ds, false).unwrap(),
            vec![false, false, false, false, true]
        );

        ds.sample_mask[1] = false;
        assert_eq!(
            SampleSelection::StudyPool.mask(&ds, true).unwrap(),
            vec![false; 5]
        );
    }
}
