use std::path::PathBuf;
use thiserror::Error;

/// Error kinds raised by the dataset model and the engines built on it.
///
/// The first five variants mirror the structural contract checked by
/// validation: a missing attribute, a value of the wrong type, a value that is
/// inconsistent (shape, duplicates, semantics), a missing column, and an
/// operation the dataset kind does not support.
#[derive(Debug, Error)]
pub enum ProfilingError {
    #[error("Missing attribute: {0}")]
    Attribute(String),
    #[error("Type error: {0}")]
    Type(String),
    #[error("Value error: {0}")]
    Value(String),
    #[error("Lookup error: {0}")]
    Lookup(String),
    #[error("Not implemented: {0}")]
    NotImplemented(String),
    #[error("Error reading/writing {path:?}: {source}")]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Curve fitting error: {0}")]
    Fit(#[from] driftfit::FitError),
}

impl ProfilingError {
    pub fn io(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        Self::Io {
            source,
            path: path.into(),
        }
    }

    /// Short name of the error kind, as reported by validation.
    pub fn kind(&self) -> &'static str {
        match self {
            ProfilingError::Attribute(_) => "AttributeError",
            ProfilingError::Type(_) => "TypeError",
            ProfilingError::Value(_) => "ValueError",
            ProfilingError::Lookup(_) => "LookupError",
            ProfilingError::NotImplemented(_) => "NotImplementedError",
            ProfilingError::Io { .. } => "IOError",
            ProfilingError::Csv(_) => "CsvError",
            ProfilingError::Json(_) => "JsonError",
            ProfilingError::Fit(_) => "FitError",
        }
    }
}

pub type Result<T> = std::result::Result<T, ProfilingError>;
