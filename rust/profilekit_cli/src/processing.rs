use indicatif::{
    ProgressIterator,
    ProgressStyle,
};
use profilekit::dataset::FEATURE_NAME;
use profilekit::io::{
    add_feature_info,
    add_sample_info,
    export_long_csv,
    export_unified_csv,
    import_long_csv,
};
use profilekit::qc::rsds_by_sample_type;
use profilekit::{
    AssayKind,
    CorrectionConfig,
    Dataset,
};
use std::time::Instant;
use tracing::{
    debug,
    info,
    warn,
};

use super::config::{
    Config,
    DatasetSource,
    ExportFormat,
    OutputConfig,
};
use super::errors::CliError;

fn load_one(source: &DatasetSource) -> profilekit::Result<Dataset> {
    let attributes = source.attributes()?;
    import_long_csv(
        &source.directory,
        &source.name,
        source.kind.assay_kind(),
        attributes,
    )
}

/// Loads every configured dataset; the ones that fail are skipped with a warning.
pub fn load_datasets(sources: &[DatasetSource]) -> Result<Vec<Dataset>, CliError> {
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})",
    )
    .map_err(|e| CliError::Config {
        source: e.to_string(),
    })?;

    let mut datasets = Vec::with_capacity(sources.len());
    for source in sources.iter().progress_with_style(style) {
        match load_one(source) {
            Ok(ds) => {
                debug!("Loaded {}", ds);
                datasets.push(ds);
            }
            Err(e) => warn!(
                "Skipping dataset {} in {}: {}",
                source.name,
                source.directory.display(),
                e
            ),
        }
    }
    if datasets.is_empty() {
        return Err(CliError::Processing {
            kind: "ValueError",
            source: "None of the configured datasets could be loaded".to_string(),
        });
    }
    Ok(datasets)
}

fn report_precision(ds: &Dataset) -> Result<(), CliError> {
    for (sample_type, rsds) in rsds_by_sample_type(ds, true)? {
        let mut finite: Vec<f64> = rsds.into_iter().filter(|r| r.is_finite()).collect();
        if finite.is_empty() {
            continue;
        }
        finite.sort_by(|a, b| a.total_cmp(b));
        info!(
            "{} RSD over {} features: median {:.2}%, max {:.2}%",
            sample_type,
            finite.len(),
            finite[finite.len() / 2],
            finite[finite.len() - 1]
        );
    }
    Ok(())
}

fn export(ds: &Dataset, output: &OutputConfig) -> Result<(), CliError> {
    std::fs::create_dir_all(&output.directory).map_err(|e| CliError::Io {
        source: e.to_string(),
        path: Some(output.directory.to_string_lossy().to_string()),
    })?;
    match output.format {
        ExportFormat::Long => {
            let paths = export_long_csv(ds, &output.directory, output.with_exclusions)?;
            for p in paths.iter() {
                info!("Wrote {}", p.display());
            }
        }
        ExportFormat::Unified => {
            let path = export_unified_csv(ds, &output.directory, output.with_exclusions)?;
            info!("Wrote {}", path.display());
        }
    }
    Ok(())
}

/// Load, concatenate, annotate, correct and export.
pub fn run(config: &Config, skip_correction: bool) -> Result<Dataset, CliError> {
    let start = Instant::now();
    let datasets = load_datasets(&config.input.datasets)?;
    info!("Loaded {} datasets in {:?}", datasets.len(), start.elapsed());

    let mut ds = Dataset::concatenate_all(datasets.iter())?;
    info!("Working on {}", ds);

    if let Some(path) = &config.input.sample_info {
        let report = add_sample_info(&mut ds, path)?;
        if !report.rows_not_matched.is_empty() {
            warn!(
                "{} rows of {} match no sample",
                report.rows_not_matched.len(),
                path.display()
            );
        }
    }
    if let Some(path) = &config.input.feature_info {
        add_feature_info(&mut ds, path, FEATURE_NAME)?;
    }

    if skip_correction {
        info!("Skipping run-order correction");
    } else if matches!(ds.assay, AssayKind::MassSpectrometry) {
        let correction = match &config.correction {
            Some(c) => c.clone(),
            None => CorrectionConfig::from_attributes(&ds.attributes)?,
        };
        info!("Using correction config: {:#?}", correction);
        report_precision(&ds)?;
        let st = Instant::now();
        ds = ds.correct_drift(&correction)?;
        info!("Correction took {:?}", st.elapsed());
    } else {
        info!("Run-order correction only applies to MS datasets, skipping");
    }
    report_precision(&ds)?;

    if let Some(output) = &config.output {
        export(&ds, output)?;
    }
    info!("Finished in {:?}", start.elapsed());
    Ok(ds)
}
