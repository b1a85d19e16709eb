//! Closed vocabularies used in sample and feature metadata.
//!
//! Values are stored in metadata tables by their canonical name
//! (e.g. `StudySample`); parsing is lenient and also accepts the spaced
//! form (`Study Sample`) and the qualified form (`SampleType.StudySample`).

use serde::{
    Deserialize,
    Serialize,
};
use std::fmt::Display;
use std::str::FromStr;

use crate::errors::ProfilingError;

macro_rules! vocabulary {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $label:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Canonical name, as written to metadata tables.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant)),+
                }
            }

            /// Human readable label.
            pub fn label(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ProfilingError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let trimmed = s.trim();
                let unqualified = trimmed
                    .strip_prefix(concat!(stringify!($name), "."))
                    .unwrap_or(trimmed);
                let squashed: String = unqualified
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .collect();
                $(
                    if squashed.eq_ignore_ascii_case(stringify!($variant)) {
                        return Ok($name::$variant);
                    }
                )+
                Err(ProfilingError::Type(format!(
                    "'{}' is not a valid {}",
                    s,
                    stringify!($name)
                )))
            }
        }
    };
}

vocabulary! {
    /// What a sample is, biologically or procedurally.
    SampleType {
        StudySample => "Study Sample",
        StudyPool => "Study Pool",
        ExternalReference => "External Reference",
        MethodReference => "Method Reference",
        ProceduralBlank => "Procedural Blank",
    }
}

vocabulary! {
    /// Why a sample was acquired.
    AssayRole {
        Assay => "Assay",
        PrecisionReference => "Precision Reference",
        LinearityReference => "Linearity Reference",
    }
}

vocabulary! {
    /// How a targeted feature is quantified.
    QuantificationType {
        IS => "Internal Standard",
        QuantOwnLabeledAnalogue => "Quantified and validated with own labeled analogue",
        QuantAltLabeledAnalogue => "Quantified and validated with alternative labeled analogue",
        QuantOther => "Other quantification",
        Monitored => "Monitored for relative information",
    }
}

vocabulary! {
    /// How a targeted feature is calibrated.
    #[allow(non_camel_case_types)]
    CalibrationMethod {
        noIS => "No Internal Standard",
        backcalculatedIS => "Backcalculated with Internal Standard",
        otherCalibration => "Other calibration method",
        noCalibration => "No calibration",
    }
}

vocabulary! {
    /// Whether features are independent measurements or samples of a spectrum.
    VariableType {
        Discrete => "Discrete",
        Continuum => "Continuum",
    }
}
