use profilekit::models::Attributes;
use profilekit::{
    AssayKind,
    CorrectionConfig,
    TargetedData,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::path::PathBuf;

use crate::cli::Cli;
use crate::errors::CliError;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    pub input: InputConfig,
    /// When absent, the correction settings come from the dataset's SOP.
    #[serde(default)]
    pub correction: Option<CorrectionConfig>,
    pub output: Option<OutputConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct InputConfig {
    pub datasets: Vec<DatasetSource>,
    #[serde(default)]
    pub sample_info: Option<PathBuf>,
    #[serde(default)]
    pub feature_info: Option<PathBuf>,
}

/// One dataset exported as long CSV files (`{name}_intensityData.csv` etc).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DatasetSource {
    pub directory: PathBuf,
    pub name: String,
    #[serde(default)]
    pub kind: AssayKindConfig,
    /// Built-in SOP name; defaults to the one of the assay kind.
    #[serde(default)]
    pub sop: Option<String>,
    /// SOP JSON file, takes precedence over `sop`.
    #[serde(default)]
    pub sop_file: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AssayKindConfig {
    #[default]
    Generic,
    #[serde(alias = "MS")]
    Ms,
    #[serde(alias = "NMR")]
    Nmr,
    Targeted,
}

impl AssayKindConfig {
    pub fn assay_kind(&self) -> AssayKind {
        match self {
            AssayKindConfig::Generic => AssayKind::Generic,
            AssayKindConfig::Ms => AssayKind::MassSpectrometry,
            AssayKindConfig::Nmr => AssayKind::Nmr,
            AssayKindConfig::Targeted => AssayKind::Targeted(TargetedData::default()),
        }
    }
}

impl DatasetSource {
    pub fn attributes(&self) -> profilekit::Result<Attributes> {
        match (&self.sop_file, &self.sop) {
            (Some(path), _) => Attributes::from_sop_path(path),
            (None, Some(name)) => Attributes::from_sop(name),
            (None, None) => Attributes::from_sop(self.kind.assay_kind().default_sop()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Long,
    Unified,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OutputConfig {
    pub directory: PathBuf,
    #[serde(default)]
    pub format: ExportFormat,
    #[serde(default)]
    pub with_exclusions: bool,
}

impl Config {
    /// Command line flags over-write the file.
    pub fn with_cli_args(mut self, args: &Cli) -> Result<Self, CliError> {
        if let Some(sample_info) = &args.sample_info {
            self.input.sample_info = Some(sample_info.clone());
        }
        if let Some(output_dir) = &args.output_dir {
            match self.output.as_mut() {
                Some(output) => output.directory = output_dir.clone(),
                None => {
                    self.output = Some(OutputConfig {
                        directory: output_dir.clone(),
                        format: ExportFormat::default(),
                        with_exclusions: false,
                    })
                }
            }
        }
        if args.with_exclusions {
            if let Some(output) = self.output.as_mut() {
                output.with_exclusions = true;
            }
        }
        if self.input.datasets.is_empty() {
            return Err(CliError::Config {
                source: "No input datasets provided, please list at least one under input.datasets"
                    .to_string(),
            });
        }
        if self.output.is_none() {
            return Err(CliError::Config {
                source: "No output directory provided, please provide one in either the config file or with the --output-dir flag".to_string(),
            });
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    const CONFIG: &str = r#"{
        "input": {
            "datasets": [
                {"directory": "data/batch1", "name": "plasma_b1", "kind": "ms"},
                {"directory": "data/batch2", "name": "plasma_b2", "kind": "MS", "sop": "GenericMS"}
            ]
        },
        "correction": {"window": 7, "method": "LOWESS", "align": "mean"}
    }"#;

    #[test]
    fn test_parse_config() {
        let config: Config = serde_json::from_str(CONFIG).unwrap();
        assert_eq!(config.input.datasets.len(), 2);
        assert_eq!(config.input.datasets[1].kind, AssayKindConfig::Ms);
        let correction = config.correction.unwrap();
        assert_eq!(correction.window, 7);
        assert!(correction.parallelise);
        assert!(config.output.is_none());
    }

    #[test]
    fn test_cli_overrides() {
        let config: Config = serde_json::from_str(CONFIG).unwrap();
        let args = Cli::parse_from([
            "profilekit",
            "--config",
            "config.json",
            "--output-dir",
            "out",
            "--with-exclusions",
        ]);
        let config = config.with_cli_args(&args).unwrap();
        let output = config.output.unwrap();
        assert_eq!(output.directory, PathBuf::from("out"));
        assert!(output.with_exclusions);
        assert_eq!(output.format, ExportFormat::Long);
    }

    #[test]
    fn test_missing_output_is_an_error() {
        let config: Config = serde_json::from_str(CONFIG).unwrap();
        let args = Cli::parse_from(["profilekit", "-c", "config.json"]);
        assert!(matches!(
            config.with_cli_args(&args),
            Err(CliError::Config { .. })
        ));
    }

    #[test]
    fn test_default_sop_follows_kind() {
        let source = DatasetSource {
            directory: PathBuf::from("."),
            name: "x".into(),
            kind: AssayKindConfig::Ms,
            sop: None,
            sop_file: None,
        };
        let attributes = source.attributes().unwrap();
        assert!(attributes.contains("rsdThreshold"));
    }
}
