#![doc = include_str!("../README.md")]

pub mod concatenation;
pub mod correction;
pub mod dataset;
pub mod enumerations;
pub mod errors;
pub mod io;
pub mod masks;
pub mod models;
pub mod qc;
pub mod selection;
pub mod validation;

// Re-export main structures
pub use crate::correction::{
    correct_drift,
    AlignMethod,
    CorrectionConfig,
    CorrectionMethod,
};
pub use crate::dataset::{
    AssayKind,
    CalibrationRecord,
    Dataset,
    ExcludedBatch,
    ExclusionFlag,
    ExclusionHistory,
    TargetedData,
};
pub use crate::enumerations::{
    AssayRole,
    CalibrationMethod,
    QuantificationType,
    SampleType,
    VariableType,
};
pub use crate::masks::{
    FeatureSelector,
    MaskUpdate,
};
pub use crate::selection::{
    select_samples,
    SampleSelection,
};
pub use crate::validation::ValidationReport;

// Re-export errors
pub use crate::errors::{
    ProfilingError,
    Result,
};
