use std::fs;
use std::path::{
    Path,
    PathBuf,
};
use tracing::info;

use super::cells::{
    format_intensity,
    format_intensity_loq,
};
use crate::dataset::{
    Dataset,
    FEATURE_NAME,
};
use crate::errors::{
    ProfilingError,
    Result,
};
use crate::models::Table;

/// Paths of the three long-CSV files of a dataset.
pub fn long_csv_paths(dir: &Path, name: &str) -> [PathBuf; 3] {
    [
        dir.join(format!("{}_intensityData.csv", name)),
        dir.join(format!("{}_sampleMetadata.csv", name)),
        dir.join(format!("{}_featureMetadata.csv", name)),
    ]
}

fn exported(ds: &Dataset, with_exclusions: bool) -> Result<Dataset> {
    let mut copy = ds.clone();
    if with_exclusions {
        copy.apply_masks()?;
    }
    Ok(copy)
}

fn exported_tables(ds: &Dataset) -> Result<(Table, Table)> {
    let samples = ds
        .sample_metadata
        .without_columns(&ds.attributes.str_list_or_empty("sampleMetadataNotExported")?);
    let mut skip_features = ds.attributes.str_list_or_empty("featureMetadataNotExported")?;
    skip_features.retain(|c| c != FEATURE_NAME);
    let features = ds.feature_metadata.without_columns(&skip_features);
    Ok((samples, features))
}

fn create_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| ProfilingError::io(e, dir))
}

fn write_table(table: &Table, path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(table.column_names())?;
    for row in 0..table.nrows() {
        wtr.write_record(table.columns().map(|(_, col)| col[row].to_string()))?;
    }
    wtr.flush().map_err(|e| ProfilingError::io(e, path))?;
    Ok(())
}

/// Writes `{name}_intensityData.csv` (headerless), `{name}_sampleMetadata.csv`
/// and `{name}_featureMetadata.csv` into `dir`.
///
/// Columns listed in the `*MetadataNotExported` attributes are left out.
/// With `with_exclusions` the masks are applied to a copy first.
#[cfg_attr(
    feature = "instrumentation",
    tracing::instrument(skip_all, fields(dataset = %ds.name()))
)]
pub fn export_long_csv(ds: &Dataset, dir: &Path, with_exclusions: bool) -> Result<[PathBuf; 3]> {
    let ds = exported(ds, with_exclusions)?;
    create_dir(dir)?;
    let paths = long_csv_paths(dir, ds.name());
    let [intensity_path, sample_path, feature_path] = &paths;

    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(intensity_path)?;
    for row in ds.intensity_data().iter_rows() {
        wtr.write_record(row.iter().map(|v| format_intensity(*v)))?;
    }
    wtr.flush().map_err(|e| ProfilingError::io(e, intensity_path))?;

    let (samples, features) = exported_tables(&ds)?;
    write_table(&samples, sample_path)?;
    write_table(&features, feature_path)?;

    info!(
        "Exported {} samples and {} features to {}",
        ds.no_samples(),
        ds.no_features(),
        dir.display()
    );
    Ok(paths)
}

/// Writes a single CSV with feature metadata on top and sample metadata on the left.
///
/// The header row holds the sample metadata column names followed by the
/// feature names. Each further feature metadata column becomes a row, then
/// one row per sample with its index in the first cell. Values below and
/// above the limits of quantification are written as `<LLOQ` and `>ULOQ`.
#[cfg_attr(
    feature = "instrumentation",
    tracing::instrument(skip_all, fields(dataset = %ds.name()))
)]
pub fn export_unified_csv(ds: &Dataset, dir: &Path, with_exclusions: bool) -> Result<PathBuf> {
    let ds = exported(ds, with_exclusions)?;
    create_dir(dir)?;
    let path = dir.join(format!("{}_combinedData.csv", ds.name()));
    let (samples, features) = exported_tables(&ds)?;
    let feature_names = ds.feature_names()?;
    let n_sample_cols = samples.ncols();

    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .flexible(false)
        .from_path(&path)?;

    let mut header = vec![String::new()];
    header.extend(samples.column_names().iter().cloned());
    header.extend(feature_names.iter().cloned());
    wtr.write_record(&header)?;

    for (name, values) in features.columns() {
        if name == FEATURE_NAME {
            continue;
        }
        let mut record = vec![name.to_string()];
        record.extend(std::iter::repeat(String::new()).take(n_sample_cols));
        record.extend(values.iter().map(|v| v.to_string()));
        wtr.write_record(&record)?;
    }

    let intensity = ds.intensity_data();
    for (i, row) in intensity.iter_rows().enumerate() {
        let mut record = vec![i.to_string()];
        record.extend(samples.columns().map(|(_, col)| col[i].to_string()));
        record.extend(row.iter().map(|v| format_intensity_loq(*v)));
        wtr.write_record(&record)?;
    }
    wtr.flush().map_err(|e| ProfilingError::io(e, &path))?;

    info!("Exported combined table to {}", path.display());
    Ok(path)
}
