use serde::{
    Deserialize,
    Serialize,
};
use std::fmt::Display;
use std::str::FromStr;

use crate::enumerations::{
    AssayRole,
    SampleType,
};
use crate::errors::{
    ProfilingError,
    Result,
};
use crate::models::Attributes;

/// Smoother used to model within-batch drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CorrectionMethod {
    #[serde(alias = "lowess")]
    LOWESS,
    #[serde(alias = "savitzkygolay", alias = "SG")]
    SavitzkyGolay,
    #[serde(alias = "none")]
    None,
}

impl FromStr for CorrectionMethod {
    type Err = ProfilingError;

    fn from_str(s: &str) -> Result<Self> {
        let squashed: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match squashed.as_str() {
            "lowess" => Ok(CorrectionMethod::LOWESS),
            "savitzkygolay" | "sg" => Ok(CorrectionMethod::SavitzkyGolay),
            "none" => Ok(CorrectionMethod::None),
            _ => Err(ProfilingError::Value(format!(
                "Correction method '{}' not understood, expected LOWESS, SavitzkyGolay or None",
                s
            ))),
        }
    }
}

impl Display for CorrectionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CorrectionMethod::LOWESS => write!(f, "LOWESS"),
            CorrectionMethod::SavitzkyGolay => write!(f, "SavitzkyGolay"),
            CorrectionMethod::None => write!(f, "None"),
        }
    }
}

/// Central value used for batch averages and alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlignMethod {
    Median,
    Mean,
    No,
}

impl AlignMethod {
    /// Central value of the finite entries; the median when alignment is off.
    pub fn central(&self, values: &[f64]) -> Option<f64> {
        match self {
            AlignMethod::Mean => driftfit::mean(values),
            AlignMethod::Median | AlignMethod::No => driftfit::median(values),
        }
    }
}

impl FromStr for AlignMethod {
    type Err = ProfilingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "median" => Ok(AlignMethod::Median),
            "mean" => Ok(AlignMethod::Mean),
            "no" | "none" => Ok(AlignMethod::No),
            _ => Err(ProfilingError::Value(format!(
                "Alignment '{}' not understood, expected median, mean or no",
                s
            ))),
        }
    }
}

impl Display for AlignMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlignMethod::Median => write!(f, "median"),
            AlignMethod::Mean => write!(f, "mean"),
            AlignMethod::No => write!(f, "no"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionConfig {
    pub window: usize,
    pub method: CorrectionMethod,
    pub align: AlignMethod,
    pub parallelise: bool,
    pub exclude_failures: bool,
    pub correction_sample_type: SampleType,
    /// (SampleType, AssayRole) pairs left untouched by correction.
    pub samples_not_corrected: Vec<(SampleType, AssayRole)>,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            window: 11,
            method: CorrectionMethod::LOWESS,
            align: AlignMethod::Median,
            parallelise: true,
            exclude_failures: true,
            correction_sample_type: SampleType::StudyPool,
            samples_not_corrected: vec![
                (SampleType::ProceduralBlank, AssayRole::Assay),
                (SampleType::StudyPool, AssayRole::LinearityReference),
            ],
        }
    }
}

impl CorrectionConfig {
    /// Defaults overridden by the correction keys of a dataset's SOP.
    pub fn from_attributes(attributes: &Attributes) -> Result<Self> {
        let mut config = Self::default();
        if attributes.contains("correctionWindow") {
            let window = attributes.get_i64("correctionWindow")?;
            config.window = usize::try_from(window).map_err(|_| {
                ProfilingError::Value(format!("correctionWindow must be positive, found {}", window))
            })?;
        }
        if attributes.contains("correctionMethod") {
            config.method = attributes.get_str("correctionMethod")?.parse()?;
        }
        if attributes.contains("correctionAlign") {
            config.align = attributes.get_str("correctionAlign")?.parse()?;
        }
        if attributes.contains("excludeFailures") {
            config.exclude_failures = attributes.get_bool("excludeFailures")?;
        }
        if let Some(value) = attributes.get("samplesNotCorrected") {
            config.samples_not_corrected =
                serde_json::from_value(value.clone()).map_err(|e| {
                    ProfilingError::Type(format!(
                        "samplesNotCorrected should be a list of [SampleType, AssayRole] pairs: {}",
                        e
                    ))
                })?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.window == 0 {
            return Err(ProfilingError::Value(
                "Correction window must be a positive integer".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_corrected(&self, sample_type: SampleType, assay_role: AssayRole) -> bool {
        !self
            .samples_not_corrected
            .contains(&(sample_type, assay_role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_ms_sop() {
        let attrs = Attributes::from_sop("GenericMS").unwrap();
        let config = CorrectionConfig::from_attributes(&attrs).unwrap();
        assert_eq!(config, CorrectionConfig::default());
    }

    #[test]
    fn test_bad_values() {
        let mut attrs = Attributes::from_sop("GenericMS").unwrap();
        attrs.insert("correctionWindow", serde_json::json!(0));
        assert_eq!(
            CorrectionConfig::from_attributes(&attrs).unwrap_err().kind(),
            "ValueError"
        );

        let mut attrs = Attributes::from_sop("GenericMS").unwrap();
        attrs.insert("correctionMethod", serde_json::json!("spline"));
        assert_eq!(
            CorrectionConfig::from_attributes(&attrs).unwrap_err().kind(),
            "ValueError"
        );
    }

    #[test]
    fn test_parse_methods() {
        assert_eq!(
            "Savitzky-Golay".parse::<CorrectionMethod>().unwrap(),
            CorrectionMethod::SavitzkyGolay
        );
        assert_eq!("NO".parse::<AlignMethod>().unwrap(), AlignMethod::No);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: CorrectionConfig =
            serde_json::from_str(r#"{"window": 5, "method": "SavitzkyGolay", "align": "mean"}"#)
                .unwrap();
        assert_eq!(config.window, 5);
        assert_eq!(config.method, CorrectionMethod::SavitzkyGolay);
        assert_eq!(config.align, AlignMethod::Mean);
        assert!(config.parallelise);
    }
}
