use crate::errors::{
    ProfilingError,
    Result,
};
use crate::models::Value;

pub const BELOW_LLOQ: &str = "<LLOQ";
pub const ABOVE_ULOQ: &str = ">ULOQ";

/// Columns always read as text, whatever they look like.
const TEXT_COLUMNS: [&str; 11] = [
    "Sample File Name",
    "Sample Base Name",
    "Sample ID",
    "Exclusion Details",
    "SampleType",
    "AssayRole",
    "Feature Name",
    "calibrationMethod",
    "quantificationType",
    "Unit",
    "Status",
];

/// Intensity cell: `NaN` is empty, infinities are written as `inf`/`-inf`.
pub fn format_intensity(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else {
        format!("{:?}", value)
    }
}

/// Intensity cell with limits of quantification spelled out.
pub fn format_intensity_loq(value: f64) -> String {
    if value == f64::NEG_INFINITY {
        BELOW_LLOQ.to_string()
    } else if value == f64::INFINITY {
        ABOVE_ULOQ.to_string()
    } else {
        format_intensity(value)
    }
}

pub fn parse_intensity(text: &str) -> Result<f64> {
    let trimmed = text.trim();
    match trimmed {
        "" => Ok(f64::NAN),
        BELOW_LLOQ => Ok(f64::NEG_INFINITY),
        ABOVE_ULOQ => Ok(f64::INFINITY),
        other => other
            .parse::<f64>()
            .map_err(|_| ProfilingError::Value(format!("'{}' is not a valid intensity", text))),
    }
}

/// Typed cell for a metadata column.
///
/// Identifier and vocabulary columns stay text; every other column gets the
/// most specific type the text allows.
pub fn parse_cell(column: &str, text: &str) -> Value {
    if TEXT_COLUMNS.contains(&column) {
        if text.is_empty() {
            Value::Null
        } else {
            Value::Str(text.to_string())
        }
    } else {
        Value::infer(text)
    }
}
