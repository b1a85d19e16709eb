//! Merging two datasets acquired in different batches.
//!
//! Samples are stacked, features are unioned by `Feature Name`. Per-batch
//! feature columns (`LLOQ_batch1`, `a_batch2`, ...) are renamed to the
//! merged batch numbering.

use regex::Regex;
use serde_json::Value as JsonValue;
use std::collections::{
    BTreeSet,
    HashMap,
    HashSet,
};
use std::ops::Add;
use tracing::warn;

use crate::dataset::{
    AssayKind,
    Dataset,
    ExclusionHistory,
    TargetedData,
    FEATURE_NAME,
};
use crate::errors::{
    ProfilingError,
    Result,
};
use crate::models::{
    Array2D,
    Table,
    Value,
    MANDATORY_ATTRIBUTES,
};

/// Feature columns that must agree for features present in both operands.
const INVARIANT_FEATURE_COLUMNS: [&str; 3] = ["calibrationMethod", "quantificationType", "Unit"];

/// Feature columns that always carry per-batch values.
const PER_BATCH_BASES: [&str; 2] = ["LLOQ", "ULOQ"];

fn batch_suffix_pattern() -> Result<Regex> {
    Regex::new(r"^(.+)_batch(\d+)$")
        .map_err(|e| ProfilingError::Value(format!("Invalid batch suffix pattern: {}", e)))
}

/// Concatenates `b` after `a`.
pub fn concatenate(a: &Dataset, b: &Dataset) -> Result<Dataset> {
    for ds in [a, b] {
        let report = ds.validate_object(false, true)?;
        if !report.basic_passed(&ds.assay) {
            return Err(ProfilingError::Value(format!(
                "{} does not validate as a {}, cannot concatenate",
                ds.name(),
                ds.class_name()
            )));
        }
    }
    if !a.assay.same_kind(&b.assay) {
        return Err(ProfilingError::Type(format!(
            "Cannot concatenate a {} with a {}",
            a.class_name(),
            b.class_name()
        )));
    }
    if a.variable_type != b.variable_type {
        return Err(ProfilingError::Value(format!(
            "Cannot concatenate {} and {} variables",
            a.variable_type, b.variable_type
        )));
    }
    if let AssayKind::Targeted(_) = a.assay {
        let (ma, mb) = (
            a.attributes.get_str("methodName")?,
            b.attributes.get_str("methodName")?,
        );
        if ma != mb {
            return Err(ProfilingError::Value(format!(
                "Cannot concatenate datasets acquired with different methods ('{}' and '{}')",
                ma, mb
            )));
        }
    }

    // Sample axis
    let batch_offset = max_int(&a.sample_metadata, "Batch")?.unwrap_or(0);
    let mut samples_b = b.sample_metadata.clone();
    if let (Some(max_a), Some(min_b)) = (
        max_int(&a.sample_metadata, "Run Order")?,
        min_int(&b.sample_metadata, "Run Order")?,
    ) {
        shift_column(&mut samples_b, "Run Order", max_a + 1 - min_b);
    }
    shift_column(&mut samples_b, "Batch", batch_offset);
    let correction_offset = max_int(&a.sample_metadata, "Correction Batch")?.unwrap_or(batch_offset);
    shift_column(&mut samples_b, "Correction Batch", correction_offset);
    let samples = a.sample_metadata.vstack(&samples_b);

    // Feature axis
    let names_a = a.feature_names()?;
    let names_b = b.feature_names()?;
    for (ds, names) in [(a, &names_a), (b, &names_b)] {
        let mut seen = HashSet::new();
        let dups: BTreeSet<&String> = names.iter().filter(|n| !seen.insert(*n)).collect();
        if !dups.is_empty() {
            warn!(
                "Feature names {:?} occur more than once in {}; only the first occurrence is merged",
                dups,
                ds.name()
            );
        }
    }
    let union = FeatureUnion::new(&names_a, &names_b);

    let pattern = batch_suffix_pattern()?;
    let features_a = suffix_per_batch_columns(a, &b.feature_metadata, &pattern, 0)?;
    let features_b = suffix_per_batch_columns(b, &a.feature_metadata, &pattern, batch_offset)?;
    let mut invariant_columns: Vec<String> =
        INVARIANT_FEATURE_COLUMNS.iter().map(|s| s.to_string()).collect();
    for id in a
        .attributes
        .str_list_or_empty("externalID")?
        .into_iter()
        .chain(b.attributes.str_list_or_empty("externalID")?)
    {
        if !invariant_columns.contains(&id) {
            invariant_columns.push(id);
        }
    }
    check_invariant_columns(&features_a, &features_b, &union, &invariant_columns)?;
    let mut features = coalesce(
        &features_a.take_rows(&union.in_a),
        &features_b.take_rows(&union.in_b),
    )?;
    merge_limits_of_quantification(&mut features, &pattern)?;

    // Intensities
    let intensity = a
        .raw_intensity_data()
        .take_cols(&union.in_a, f64::NAN)
        .vstack(&b.raw_intensity_data().take_cols(&union.in_b, f64::NAN))?;
    let fit = match (&a.fit, &b.fit) {
        (None, None) => None,
        (fa, fb) => {
            let fa = fa
                .clone()
                .unwrap_or_else(|| Array2D::filled(a.no_samples(), a.no_features(), f64::NAN));
            let fb = fb
                .clone()
                .unwrap_or_else(|| Array2D::filled(b.no_samples(), b.no_features(), f64::NAN));
            Some(
                fa.take_cols(&union.in_a, f64::NAN)
                    .vstack(&fb.take_cols(&union.in_b, f64::NAN))?,
            )
        }
    };

    let mut out = a.clone();
    out.set_name(format!("{}-{}", a.name(), b.name()));
    out.replace_data(intensity, samples, features)?;
    out.fit = fit;
    out.sample_mask = a
        .sample_mask
        .iter()
        .chain(b.sample_mask.iter())
        .copied()
        .collect();
    out.feature_mask = union
        .in_a
        .iter()
        .zip(union.in_b.iter())
        .map(|(ia, ib)| {
            ia.map(|i| a.feature_mask[i]).unwrap_or(true)
                && ib.map(|i| b.feature_mask[i]).unwrap_or(true)
        })
        .collect();
    out.excluded = ExclusionHistory::Merged(vec![
        a.excluded.clone(),
        b.excluded.clone(),
        ExclusionHistory::default(),
    ]);
    if let (AssayKind::Targeted(ta), AssayKind::Targeted(tb)) = (&a.assay, &b.assay) {
        out.assay = AssayKind::Targeted(merge_targeted(a, ta, b, tb, &union, batch_offset)?);
    }
    out.attributes = a.attributes.clone();
    merge_attributes(&mut out, b);
    out.append_log(format!(
        "Concatenated {} and {}: {} samples, {} features",
        a.name(),
        b.name(),
        out.no_samples(),
        out.no_features()
    ));
    Ok(out)
}

/// Where each feature of the merged axis comes from.
struct FeatureUnion {
    in_a: Vec<Option<usize>>,
    in_b: Vec<Option<usize>>,
}

impl FeatureUnion {
    fn new(names_a: &[String], names_b: &[String]) -> Self {
        let mut first_a: HashMap<&str, usize> = HashMap::new();
        for (i, n) in names_a.iter().enumerate() {
            first_a.entry(n.as_str()).or_insert(i);
        }
        let mut first_b: HashMap<&str, usize> = HashMap::new();
        for (i, n) in names_b.iter().enumerate() {
            first_b.entry(n.as_str()).or_insert(i);
        }

        let mut in_a = Vec::new();
        let mut in_b = Vec::new();
        let mut seen = HashSet::new();
        for n in names_a.iter() {
            if seen.insert(n.as_str()) {
                in_a.push(first_a.get(n.as_str()).copied());
                in_b.push(first_b.get(n.as_str()).copied());
            }
        }
        for n in names_b.iter() {
            if seen.insert(n.as_str()) {
                in_a.push(None);
                in_b.push(first_b.get(n.as_str()).copied());
            }
        }
        Self { in_a, in_b }
    }
}

fn max_int(table: &Table, column: &str) -> Result<Option<i64>> {
    if !table.has_column(column) {
        return Ok(None);
    }
    Ok(table
        .floats(column)?
        .into_iter()
        .filter(|v| v.is_finite())
        .map(|v| v.round() as i64)
        .max())
}

fn min_int(table: &Table, column: &str) -> Result<Option<i64>> {
    if !table.has_column(column) {
        return Ok(None);
    }
    Ok(table
        .floats(column)?
        .into_iter()
        .filter(|v| v.is_finite())
        .map(|v| v.round() as i64)
        .min())
}

// Missing cells stay missing.
fn shift_column(table: &mut Table, column: &str, offset: i64) {
    if let Some(values) = table.column_mut(column) {
        for v in values.iter_mut() {
            *v = match &*v {
                Value::Int(i) => Value::Int(*i + offset),
                Value::Float(f) if f.is_finite() => Value::Float(*f + offset as f64),
                other => other.clone(),
            };
        }
    }
}

/// Feature table of `ds` with per-batch columns named for the merged dataset.
///
/// Suffixed columns are renumbered by `batch_offset`. Unsuffixed columns
/// whose base is per-batch gain the suffix of the dataset's first batch.
fn suffix_per_batch_columns(
    ds: &Dataset,
    other_features: &Table,
    pattern: &Regex,
    batch_offset: i64,
) -> Result<Table> {
    let mut bases: BTreeSet<String> = PER_BATCH_BASES.iter().map(|s| s.to_string()).collect();
    for name in ds
        .feature_metadata
        .column_names()
        .iter()
        .chain(other_features.column_names().iter())
    {
        if let Some(caps) = pattern.captures(name) {
            bases.insert(caps[1].to_string());
        }
    }
    let own_suffixed: HashSet<String> = ds
        .feature_metadata
        .column_names()
        .iter()
        .filter_map(|n| pattern.captures(n).map(|c| c[1].to_string()))
        .collect();
    let first_batch = min_int(&ds.sample_metadata, "Batch")?.unwrap_or(1) + batch_offset;

    let mut out = ds.feature_metadata.clone();
    let mut renames = Vec::new();
    for name in ds.feature_metadata.column_names() {
        if let Some(caps) = pattern.captures(name) {
            let batch: i64 = caps[2].parse().map_err(|_| {
                ProfilingError::Value(format!("Cannot parse batch number of column '{}'", name))
            })?;
            renames.push((name.clone(), format!("{}_batch{}", &caps[1], batch + batch_offset)));
        } else if own_suffixed.contains(name) && PER_BATCH_BASES.contains(&name.as_str()) {
            // Summary of an earlier merge, recomputed after this one.
            out.remove_column(name);
        } else if bases.contains(name) {
            renames.push((name.clone(), format!("{}_batch{}", name, first_batch)));
        }
    }

    // Two passes so renumbered names never collide with names not yet renamed.
    for (i, (old, _)) in renames.iter().enumerate() {
        out.rename_column(old, &format!("__rename_{}", i))?;
    }
    for (i, (_, new)) in renames.iter().enumerate() {
        out.rename_column(&format!("__rename_{}", i), new)?;
    }
    Ok(out)
}

fn check_invariant_columns(
    features_a: &Table,
    features_b: &Table,
    union: &FeatureUnion,
    columns: &[String],
) -> Result<()> {
    for column in columns {
        let (Some(ca), Some(cb)) = (features_a.column(column), features_b.column(column)) else {
            continue;
        };
        for (ia, ib) in union.in_a.iter().zip(union.in_b.iter()) {
            let (Some(ia), Some(ib)) = (ia, ib) else {
                continue;
            };
            let (va, vb) = (&ca[*ia], &cb[*ib]);
            if !va.is_missing() && !vb.is_missing() && va.to_string() != vb.to_string() {
                let name = features_a
                    .get(*ia, FEATURE_NAME)
                    .map(|v| v.to_string())
                    .unwrap_or_default();
                return Err(ProfilingError::Value(format!(
                    "Feature '{}' has inconsistent {} ('{}' and '{}')",
                    name, column, va, vb
                )));
            }
        }
    }
    Ok(())
}

/// Column union of two row-aligned tables; cells of `a` win unless missing.
fn coalesce(a: &Table, b: &Table) -> Result<Table> {
    let mut out = a.clone();
    for (name, values_b) in b.columns() {
        let merged = match a.column(name) {
            Some(values_a) => values_a
                .iter()
                .zip(values_b.iter())
                .map(|(va, vb)| if va.is_missing() { vb.clone() } else { va.clone() })
                .collect(),
            None => values_b.to_vec(),
        };
        out.insert_column(name, merged)?;
    }
    Ok(out)
}

/// Restores the common `LLOQ` and `ULOQ` columns from their per-batch
/// versions: the highest LLOQ and the lowest ULOQ of each feature.
fn merge_limits_of_quantification(features: &mut Table, pattern: &Regex) -> Result<()> {
    for (base, pick_max) in [("LLOQ", true), ("ULOQ", false)] {
        let per_batch: Vec<String> = features
            .column_names()
            .iter()
            .filter(|n| {
                pattern
                    .captures(n)
                    .map(|c| &c[1] == base)
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        if per_batch.is_empty() {
            continue;
        }
        let columns = per_batch
            .iter()
            .map(|n| features.floats(n))
            .collect::<Result<Vec<_>>>()?;
        let merged = (0..features.nrows())
            .map(|row| {
                let values = columns.iter().map(|c| c[row]).filter(|v| !v.is_nan());
                let picked = if pick_max {
                    values.fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))))
                } else {
                    values.fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.min(v))))
                };
                picked.map(Value::Float).unwrap_or(Value::Null)
            })
            .collect();
        features.insert_column(base, merged)?;
    }
    Ok(())
}

fn merge_targeted(
    a: &Dataset,
    ta: &TargetedData,
    b: &Dataset,
    tb: &TargetedData,
    union: &FeatureUnion,
    batch_offset: i64,
) -> Result<TargetedData> {
    let expected_concentration = match (&ta.expected_concentration, &tb.expected_concentration) {
        (None, None) => None,
        (ea, eb) => {
            let ea = ea
                .clone()
                .unwrap_or_else(|| Array2D::filled(a.no_samples(), a.no_features(), f64::NAN));
            let eb = eb
                .clone()
                .unwrap_or_else(|| Array2D::filled(b.no_samples(), b.no_features(), f64::NAN));
            Some(
                ea.take_cols(&union.in_a, f64::NAN)
                    .vstack(&eb.take_cols(&union.in_b, f64::NAN))?,
            )
        }
    };

    let mut calibration = Vec::with_capacity(ta.calibration.len() + tb.calibration.len());
    for (records, index, offset) in [
        (&ta.calibration, &union.in_a, 0),
        (&tb.calibration, &union.in_b, batch_offset),
    ] {
        for record in records.iter() {
            let mut record = record.clone();
            record.batch += offset;
            shift_column(&mut record.sample_metadata, "Batch", offset);
            record.feature_metadata = record.feature_metadata.take_rows(index);
            record.intensity_data = record.intensity_data.take_cols(index, f64::NAN);
            record.expected_concentration =
                record.expected_concentration.take_cols(index, f64::NAN);
            calibration.push(record);
        }
    }
    calibration.sort_by_key(|r| r.batch);

    Ok(TargetedData {
        expected_concentration,
        calibration,
    })
}

// Mandatory attributes keep the left value. Differing lists are merged into
// their ordered union; other differing values become one entry per operand,
// so a scalar joining an earlier `[left, right]` is appended rather than nested.
fn merge_attributes(out: &mut Dataset, b: &Dataset) {
    for (key, vb) in b.attributes.values().iter() {
        let merged = match out.attributes.get(key) {
            None => vb.clone(),
            Some(va) if va == vb || MANDATORY_ATTRIBUTES.contains(&key.as_str()) => continue,
            Some(JsonValue::Array(items_a)) => {
                let mut items = items_a.clone();
                match vb {
                    JsonValue::Array(items_b) => {
                        for item in items_b {
                            if !items.contains(item) {
                                items.push(item.clone());
                            }
                        }
                    }
                    other => items.push(other.clone()),
                }
                JsonValue::Array(items)
            }
            Some(va) => JsonValue::Array(vec![va.clone(), vb.clone()]),
        };
        out.attributes.insert(key.clone(), merged);
    }
    out.attributes.extend_log(b.attributes.log().iter().cloned());
}

impl Dataset {
    /// Concatenates all datasets in order; a single dataset is returned as is.
    pub fn concatenate_all<'a, I>(datasets: I) -> Result<Dataset>
    where
        I: IntoIterator<Item = &'a Dataset>,
    {
        let mut iter = datasets.into_iter();
        let first = iter.next().ok_or_else(|| {
            ProfilingError::Value("Cannot concatenate an empty list of datasets".to_string())
        })?;
        let mut acc = first.clone();
        for ds in iter {
            acc = concatenate(&acc, ds)?;
        }
        Ok(acc)
    }
}

impl Add for &Dataset {
    type Output = Result<Dataset>;

    fn add(self, other: &Dataset) -> Result<Dataset> {
        concatenate(self, other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_union_order() {
        let a: Vec<String> = ["x", "y"].iter().map(|s| s.to_string()).collect();
        let b: Vec<String> = ["y", "z"].iter().map(|s| s.to_string()).collect();
        let union = FeatureUnion::new(&a, &b);
        assert_eq!(union.in_a, vec![Some(0), Some(1), None]);
        assert_eq!(union.in_b, vec![None, Some(0), Some(1)]);
    }

    #[test]
    fn test_coalesce_prefers_left() {
        let a = Table::from_columns(vec![
            ("k", vec![Value::Int(1), Value::Null]),
            ("only_a", vec![Value::Int(5), Value::Int(6)]),
        ])
        .unwrap();
        let b = Table::from_columns(vec![
            ("k", vec![Value::Int(9), Value::Int(2)]),
            ("only_b", vec![Value::Int(7), Value::Int(8)]),
        ])
        .unwrap();
        let out = coalesce(&a, &b).unwrap();
        assert_eq!(out.ints("k").unwrap(), vec![Some(1), Some(2)]);
        assert_eq!(out.column_names(), &["k", "only_a", "only_b"]);
    }

    #[test]
    fn test_merge_limits() {
        let pattern = batch_suffix_pattern().unwrap();
        let mut t = Table::from_columns(vec![
            ("LLOQ_batch1", vec![Value::Float(1.0), Value::Null]),
            ("LLOQ_batch2", vec![Value::Float(2.0), Value::Float(3.0)]),
            ("ULOQ_batch1", vec![Value::Float(10.0), Value::Float(9.0)]),
            ("ULOQ_batch2", vec![Value::Float(8.0), Value::Null]),
        ])
        .unwrap();
        merge_limits_of_quantification(&mut t, &pattern).unwrap();
        assert_eq!(t.floats("LLOQ").unwrap(), vec![2.0, 3.0]);
        assert_eq!(t.floats("ULOQ").unwrap(), vec![8.0, 9.0]);
    }
}
