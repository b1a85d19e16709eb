#![allow(dead_code)]

use chrono::NaiveDate;
use profilekit::models::{
    Array2D,
    Table,
    Value,
};
use profilekit::{
    AssayKind,
    Dataset,
    TargetedData,
};

/// One row of sample metadata.
#[derive(Debug, Clone)]
pub struct SampleRow {
    pub sample_type: &'static str,
    pub assay_role: &'static str,
    pub run_order: i64,
    pub batch: i64,
    pub correction_batch: Option<i64>,
}

impl SampleRow {
    pub fn new(sample_type: &'static str, assay_role: &'static str, run_order: i64) -> Self {
        Self {
            sample_type,
            assay_role,
            run_order,
            batch: 1,
            correction_batch: Some(1),
        }
    }

    pub fn reference(run_order: i64) -> Self {
        Self::new("StudyPool", "PrecisionReference", run_order)
    }

    pub fn study(run_order: i64) -> Self {
        Self::new("StudySample", "Assay", run_order)
    }

    pub fn in_batch(mut self, batch: i64) -> Self {
        self.batch = batch;
        self.correction_batch = Some(batch);
        self
    }

    pub fn uncorrected(mut self) -> Self {
        self.correction_batch = None;
        self
    }
}

/// Sample metadata with every required column filled in.
pub fn sample_table(prefix: &str, rows: &[SampleRow]) -> Table {
    let start = NaiveDate::from_ymd_opt(2024, 3, 1)
        .and_then(|d| d.and_hms_opt(9, 0, 0))
        .unwrap();
    let files: Vec<Value> = (0..rows.len())
        .map(|i| Value::from(format!("{}_{:03}", prefix, i)))
        .collect();
    Table::from_columns(vec![
        ("Sample File Name", files.clone()),
        ("Sample Base Name", files),
        (
            "AssayRole",
            rows.iter().map(|r| Value::from(r.assay_role)).collect(),
        ),
        (
            "SampleType",
            rows.iter().map(|r| Value::from(r.sample_type)).collect(),
        ),
        (
            "Run Order",
            rows.iter().map(|r| Value::Int(r.run_order)).collect(),
        ),
        (
            "Acquired Time",
            rows.iter()
                .map(|r| Value::Timestamp(start + chrono::Duration::minutes(15 * r.run_order)))
                .collect(),
        ),
        ("Batch", rows.iter().map(|r| Value::Int(r.batch)).collect()),
        (
            "Correction Batch",
            rows.iter().map(|r| Value::from(r.correction_batch)).collect(),
        ),
        ("Dilution", vec![Value::Int(100); rows.len()]),
        (
            "Sample ID",
            (0..rows.len())
                .map(|i| Value::from(format!("ID{:04}", i)))
                .collect(),
        ),
        ("Exclusion Details", vec![Value::Null; rows.len()]),
    ])
    .unwrap()
}

/// Feature metadata with `m/z` and `Retention Time`.
pub fn ms_feature_table(names: &[&str]) -> Table {
    Table::from_columns(vec![
        (
            "Feature Name",
            names.iter().map(|n| Value::from(*n)).collect(),
        ),
        (
            "m/z",
            (0..names.len())
                .map(|i| Value::Float(100.5 + i as f64))
                .collect(),
        ),
        (
            "Retention Time",
            (0..names.len())
                .map(|i| Value::Float(1.25 * (i + 1) as f64))
                .collect(),
        ),
    ])
    .unwrap()
}

pub fn generic_dataset(name: &str, rows: &[SampleRow], features: &[&str], data: Vec<Vec<f64>>) -> Dataset {
    Dataset::with_default_sop(
        name,
        AssayKind::Generic,
        Array2D::new(data).unwrap(),
        sample_table(name, rows),
        ms_feature_table(features),
    )
    .unwrap()
}

pub fn ms_dataset(name: &str, rows: &[SampleRow], features: &[&str], data: Vec<Vec<f64>>) -> Dataset {
    Dataset::with_default_sop(
        name,
        AssayKind::MassSpectrometry,
        Array2D::new(data).unwrap(),
        sample_table(name, rows),
        ms_feature_table(features),
    )
    .unwrap()
}

/// Targeted dataset; every feature has `[LLOQ, ULOQ] = lloq_uloq`.
pub fn targeted_dataset(
    name: &str,
    rows: &[SampleRow],
    features: &[&str],
    units: &[&str],
    lloq_uloq: (f64, f64),
    data: Vec<Vec<f64>>,
) -> Dataset {
    let n = features.len();
    let feature_table = Table::from_columns(vec![
        (
            "Feature Name",
            features.iter().map(|n| Value::from(*n)).collect(),
        ),
        ("calibrationMethod", vec![Value::from("backcalculatedIS"); n]),
        (
            "quantificationType",
            vec![Value::from("QuantOwnLabeledAnalogue"); n],
        ),
        ("Unit", units.iter().map(|u| Value::from(*u)).collect()),
        ("LLOQ", vec![Value::Float(lloq_uloq.0); n]),
        ("ULOQ", vec![Value::Float(lloq_uloq.1); n]),
    ])
    .unwrap();
    Dataset::with_default_sop(
        name,
        AssayKind::Targeted(TargetedData::default()),
        Array2D::new(data).unwrap(),
        sample_table(name, rows),
        feature_table,
    )
    .unwrap()
}

pub fn assert_close(a: f64, b: f64, tol: f64) {
    assert!(
        (a - b).abs() <= tol,
        "{} and {} differ by more than {}",
        a,
        b,
        tol
    );
}

/// Equality that treats two NaNs as equal.
pub fn same_float(a: f64, b: f64) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}
