use chrono::{
    DateTime,
    Utc,
};
use serde::{
    Deserialize,
    Serialize,
};
use serde_json::{
    Map,
    Value as JsonValue,
};
use std::path::Path;
use tracing::debug;

use crate::errors::{
    ProfilingError,
    Result,
};

/// Attributes every dataset must carry, besides the log.
pub const MANDATORY_ATTRIBUTES: [&str; 11] = [
    "dpi",
    "figureSize",
    "figureFormat",
    "histBins",
    "noFiles",
    "quantiles",
    "sampleMetadataNotExported",
    "featureMetadataNotExported",
    "analyticalMeasurements",
    "excludeFromPlotting",
    "sampleTypeColours",
];

const GENERIC_SOP: &str = include_str!("../../sop/Generic.json");
const GENERIC_MS_SOP: &str = include_str!("../../sop/GenericMS.json");
const GENERIC_NMR_SOP: &str = include_str!("../../sop/GenericNMR.json");
const GENERIC_TARGETED_SOP: &str = include_str!("../../sop/GenericTargeted.json");

/// Provenance entry appended by every mutating operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

/// Configuration and provenance of a dataset.
///
/// The log is kept apart from the free-form SOP values so it can only be
/// appended to.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Attributes {
    log: Vec<LogEntry>,
    values: Map<String, JsonValue>,
}

impl Attributes {
    /// Loads one of the SOPs bundled with the library.
    pub fn from_sop(name: &str) -> Result<Self> {
        let text = match name {
            "Generic" => GENERIC_SOP,
            "GenericMS" => GENERIC_MS_SOP,
            "GenericNMR" => GENERIC_NMR_SOP,
            "GenericTargeted" => GENERIC_TARGETED_SOP,
            other => {
                return Err(ProfilingError::Value(format!(
                    "Unknown SOP '{}', expected one of Generic, GenericMS, GenericNMR, GenericTargeted",
                    other
                )));
            }
        };
        let mut out = Self::from_json_str(text)?;
        out.append_log(format!("Attributes loaded from SOP '{}'", name));
        Ok(out)
    }

    pub fn from_sop_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ProfilingError::io(e, path))?;
        let mut out = Self::from_json_str(&text)?;
        out.append_log(format!("Attributes loaded from SOP file {}", path.display()));
        Ok(out)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        match serde_json::from_str::<JsonValue>(text)? {
            JsonValue::Object(values) => Ok(Self {
                log: Vec::new(),
                values,
            }),
            other => Err(ProfilingError::Type(format!(
                "SOP must be a JSON object, found {}",
                json_type_name(&other)
            ))),
        }
    }

    /// Replaces individual keys, as callers do at construction time.
    pub fn with_overrides(mut self, overrides: Map<String, JsonValue>) -> Self {
        for (k, v) in overrides {
            self.values.insert(k, v);
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: JsonValue) -> Option<JsonValue> {
        self.values.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<JsonValue> {
        self.values.remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }

    pub fn values(&self) -> &Map<String, JsonValue> {
        &self.values
    }

    /// Missing keys are attribute errors.
    pub fn require(&self, key: &str) -> Result<&JsonValue> {
        self.values
            .get(key)
            .ok_or_else(|| ProfilingError::Attribute(format!("'{}' not present in attributes", key)))
    }

    pub fn get_i64(&self, key: &str) -> Result<i64> {
        let value = self.require(key)?;
        value
            .as_i64()
            .ok_or_else(|| type_error(key, "an integer", value))
    }

    pub fn get_f64(&self, key: &str) -> Result<f64> {
        let value = self.require(key)?;
        value.as_f64().ok_or_else(|| type_error(key, "a number", value))
    }

    pub fn get_bool(&self, key: &str) -> Result<bool> {
        let value = self.require(key)?;
        value.as_bool().ok_or_else(|| type_error(key, "a boolean", value))
    }

    pub fn get_str(&self, key: &str) -> Result<&str> {
        let value = self.require(key)?;
        value.as_str().ok_or_else(|| type_error(key, "a string", value))
    }

    pub fn get_str_list(&self, key: &str) -> Result<Vec<String>> {
        let value = self.require(key)?;
        let items = value
            .as_array()
            .ok_or_else(|| type_error(key, "a list of strings", value))?;
        items
            .iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| type_error(key, "a list of strings", value))
            })
            .collect()
    }

    /// A length-2 list of numbers, such as `figureSize` or `quantiles`.
    pub fn get_number_pair(&self, key: &str) -> Result<[f64; 2]> {
        let value = self.require(key)?;
        let items = value
            .as_array()
            .ok_or_else(|| type_error(key, "a list of two numbers", value))?;
        if items.len() != 2 {
            return Err(ProfilingError::Value(format!(
                "'{}' should have two elements, found {}",
                key,
                items.len()
            )));
        }
        let mut out = [0.0; 2];
        for (slot, item) in out.iter_mut().zip(items) {
            *slot = item
                .as_f64()
                .ok_or_else(|| type_error(key, "a list of two numbers", value))?;
        }
        Ok(out)
    }

    pub fn get_object(&self, key: &str) -> Result<&Map<String, JsonValue>> {
        let value = self.require(key)?;
        value.as_object().ok_or_else(|| type_error(key, "a mapping", value))
    }

    /// Like [`Attributes::get_str_list`], with an empty list when absent.
    pub fn str_list_or_empty(&self, key: &str) -> Result<Vec<String>> {
        if self.contains(key) {
            self.get_str_list(key)
        } else {
            Ok(Vec::new())
        }
    }

    pub fn log(&self) -> &[LogEntry] {
        &self.log
    }

    pub fn append_log(&mut self, message: impl Into<String>) {
        let message = message.into();
        debug!("{}", message);
        self.log.push(LogEntry {
            timestamp: Utc::now(),
            message,
        });
    }

    pub(crate) fn extend_log(&mut self, entries: impl IntoIterator<Item = LogEntry>) {
        self.log.extend(entries);
    }

    /// The log rendered one entry per line with a chrono format string.
    pub fn format_log(&self, timestamp_format: &str) -> String {
        self.log
            .iter()
            .map(|e| format!("{}\t{}", e.timestamp.format(timestamp_format), e.message))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "a list",
        JsonValue::Object(_) => "a mapping",
    }
}

fn type_error(key: &str, expected: &str, found: &JsonValue) -> ProfilingError {
    ProfilingError::Type(format!(
        "'{}' should be {}, found {}",
        key,
        expected,
        json_type_name(found)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bundled_sops_carry_mandatory_keys() {
        for sop in ["Generic", "GenericMS", "GenericNMR", "GenericTargeted"] {
            let attrs = Attributes::from_sop(sop).unwrap();
            for key in MANDATORY_ATTRIBUTES {
                assert!(attrs.contains(key), "{sop} is missing {key}");
            }
            assert_eq!(attrs.log().len(), 1);
        }
    }

    #[test]
    fn test_unknown_sop() {
        assert_eq!(
            Attributes::from_sop("Banana").unwrap_err().kind(),
            "ValueError"
        );
    }

    #[test]
    fn test_typed_getters() {
        let attrs = Attributes::from_sop("Generic").unwrap();
        assert_eq!(attrs.get_i64("dpi").unwrap(), 300);
        assert_eq!(attrs.get_number_pair("figureSize").unwrap(), [11.0, 7.0]);
        assert_eq!(attrs.get_str("figureFormat").unwrap(), "png");
        assert_eq!(attrs.get_str("dpi").unwrap_err().kind(), "TypeError");
        assert_eq!(attrs.get_i64("nope").unwrap_err().kind(), "AttributeError");
    }

    #[test]
    fn test_overrides() {
        let mut overrides = Map::new();
        overrides.insert("dpi".to_string(), json!(72));
        overrides.insert("methodName".to_string(), json!("LPOS"));
        let attrs = Attributes::from_sop("Generic").unwrap().with_overrides(overrides);
        assert_eq!(attrs.get_i64("dpi").unwrap(), 72);
        assert_eq!(attrs.get_str("methodName").unwrap(), "LPOS");
    }

    #[test]
    fn test_log_is_appended_in_order() {
        let mut attrs = Attributes::default();
        attrs.append_log("first");
        attrs.append_log("second");
        let text = attrs.format_log("%Y");
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("first"));
        assert!(lines[1].ends_with("second"));
    }
}
