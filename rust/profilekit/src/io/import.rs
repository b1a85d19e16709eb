use std::collections::HashMap;
use std::path::Path;
use tracing::{
    debug,
    info,
    warn,
};

use super::cells::{
    parse_cell,
    parse_intensity,
};
use super::export::long_csv_paths;
use crate::dataset::{
    AssayKind,
    Dataset,
    FEATURE_NAME,
    SAMPLE_METADATA_COLUMNS,
};
use crate::errors::{
    ProfilingError,
    Result,
};
use crate::models::{
    Array2D,
    Attributes,
    Table,
    Value,
};

pub const METADATA_AVAILABLE: &str = "Metadata Available";
const SAMPLE_KEY: &str = "Sample File Name";

/// Reads a CSV file with a header row into a typed table.
///
/// An unnamed leading column (a written row index) is dropped.
pub fn read_table(path: &Path) -> Result<Table> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)?;
    debug!("Reading table from {}", path.display());
    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();
    let mut columns: Vec<Vec<Value>> = vec![Vec::new(); headers.len()];
    for result in rdr.records() {
        let record = result?;
        for (i, column) in columns.iter_mut().enumerate() {
            column.push(parse_cell(&headers[i], record.get(i).unwrap_or("")));
        }
    }
    let named: Vec<(String, Vec<Value>)> = headers
        .into_iter()
        .zip(columns)
        .filter(|(name, _)| !name.is_empty())
        .collect();
    Table::from_columns(named)
}

fn read_intensities(path: &Path) -> Result<Array2D<f64>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    let mut rows: Vec<Vec<f64>> = Vec::new();
    for result in rdr.records() {
        let record = result?;
        rows.push(
            record
                .iter()
                .map(parse_intensity)
                .collect::<Result<Vec<f64>>>()?,
        );
    }
    Array2D::new(rows)
}

/// Loads a dataset written by [`export_long_csv`](super::export_long_csv).
///
/// Required sample columns that were not exported are restored empty and
/// masks start all true.
#[cfg_attr(
    feature = "instrumentation",
    tracing::instrument(skip(attributes, assay))
)]
pub fn import_long_csv(
    dir: &Path,
    name: &str,
    assay: AssayKind,
    attributes: Attributes,
) -> Result<Dataset> {
    let [intensity_path, sample_path, feature_path] = long_csv_paths(dir, name);
    let mut samples = read_table(&sample_path)?;
    let features = read_table(&feature_path)?;
    let mut intensity = read_intensities(&intensity_path)?;
    if intensity.nrows() == 0 && samples.nrows() > 0 && features.nrows() == 0 {
        intensity = Array2D::filled(samples.nrows(), 0, f64::NAN);
    }

    for col in SAMPLE_METADATA_COLUMNS {
        if !samples.has_column(col) {
            debug!("Restoring missing sample column '{}'", col);
            samples.ensure_column(col, Value::Null);
        }
    }
    if !features.has_column(FEATURE_NAME) {
        return Err(ProfilingError::Lookup(format!(
            "{} lacks the '{}' column",
            feature_path.display(),
            FEATURE_NAME
        )));
    }

    let mut ds = Dataset::new(name, assay, intensity, samples, features, attributes)?;
    ds.append_log(format!("Imported from long CSV files in {}", dir.display()));
    info!(
        "Imported {} with {} samples and {} features",
        name,
        ds.no_samples(),
        ds.no_features()
    );
    Ok(ds)
}

/// Outcome of [`add_sample_info`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SampleInfoReport {
    /// Dataset samples with no row in the table.
    pub samples_not_found: Vec<String>,
    /// Table rows matching no dataset sample.
    pub rows_not_matched: Vec<String>,
}

fn first_rows(keys: &[Option<String>]) -> HashMap<&str, usize> {
    let mut index = HashMap::new();
    for (i, k) in keys.iter().enumerate() {
        if let Some(k) = k {
            index.entry(k.as_str()).or_insert(i);
        }
    }
    index
}

/// Copies every column of `info` into `target` for matched rows.
/// `matches[i]` is the `info` row for target row `i`.
fn merge_columns(target: &mut Table, info: &Table, key: &str, matches: &[Option<usize>]) -> Result<()> {
    for (name, values) in info.columns() {
        if name == key {
            continue;
        }
        target.ensure_column(name, Value::Null);
        for (row, m) in matches.iter().enumerate() {
            if let Some(m) = m {
                target.set(row, name, values[*m].clone())?;
            }
        }
    }
    Ok(())
}

/// Merges a sample information table into `sampleMetadata`, joined on
/// `Sample File Name`.
///
/// Matched samples get `Metadata Available = True`, the others `False`.
#[cfg_attr(feature = "instrumentation", tracing::instrument(skip(ds)))]
pub fn add_sample_info(ds: &mut Dataset, path: &Path) -> Result<SampleInfoReport> {
    let info = read_table(path)?;
    let info_keys = info.strings(SAMPLE_KEY)?;
    let sample_keys = ds.sample_metadata.strings(SAMPLE_KEY)?;
    let index = first_rows(&info_keys);

    let matches: Vec<Option<usize>> = sample_keys
        .iter()
        .map(|k| k.as_deref().and_then(|k| index.get(k).copied()))
        .collect();
    merge_columns(&mut ds.sample_metadata, &info, SAMPLE_KEY, &matches)?;
    ds.sample_metadata.insert_column(
        METADATA_AVAILABLE,
        matches.iter().map(|m| Value::Bool(m.is_some())).collect(),
    )?;

    let samples_not_found: Vec<String> = sample_keys
        .iter()
        .zip(matches.iter())
        .filter(|(_, m)| m.is_none())
        .map(|(k, _)| k.clone().unwrap_or_default())
        .collect();
    let matched: std::collections::HashSet<usize> = matches.iter().flatten().copied().collect();
    let rows_not_matched: Vec<String> = info_keys
        .iter()
        .enumerate()
        .filter(|(i, _)| !matched.contains(i))
        .map(|(_, k)| k.clone().unwrap_or_default())
        .collect();

    if !samples_not_found.is_empty() {
        warn!(
            "{} samples have no entry in {}",
            samples_not_found.len(),
            path.display()
        );
    }
    ds.append_log(format!(
        "Sample information added from {} ({} samples matched)",
        path.display(),
        matched.len()
    ));
    Ok(SampleInfoReport {
        samples_not_found,
        rows_not_matched,
    })
}

/// Merges a feature annotation table into `featureMetadata`, joined on `on`.
///
/// Returns the features with no annotation row.
#[cfg_attr(feature = "instrumentation", tracing::instrument(skip(ds)))]
pub fn add_feature_info(ds: &mut Dataset, path: &Path, on: &str) -> Result<Vec<String>> {
    let info = read_table(path)?;
    let info_keys = info.strings(on)?;
    let feature_keys = ds.feature_metadata.strings(on)?;
    let index = first_rows(&info_keys);

    let matches: Vec<Option<usize>> = feature_keys
        .iter()
        .map(|k| k.as_deref().and_then(|k| index.get(k).copied()))
        .collect();
    if on != FEATURE_NAME && info.has_column(FEATURE_NAME) {
        return Err(ProfilingError::Value(format!(
            "Feature annotations joined on '{}' cannot redefine '{}'",
            on, FEATURE_NAME
        )));
    }
    merge_columns(&mut ds.feature_metadata, &info, on, &matches)?;

    let not_found: Vec<String> = feature_keys
        .iter()
        .zip(matches.iter())
        .filter(|(_, m)| m.is_none())
        .map(|(k, _)| k.clone().unwrap_or_default())
        .collect();
    if !not_found.is_empty() {
        warn!(
            "{} features have no entry in {}",
            not_found.len(),
            path.display()
        );
    }
    ds.append_log(format!("Feature information added from {}", path.display()));
    Ok(not_found)
}
