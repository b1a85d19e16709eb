use chrono::NaiveDateTime;
use std::fmt::Display;

use super::arrays::mask_indices;
use crate::errors::{
    ProfilingError,
    Result,
};

/// Format used to write timestamps; parsing also accepts a space separator.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
const TIMESTAMP_PARSE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// A single cell of a metadata table.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Timestamp(NaiveDateTime),
}

impl Value {
    /// `Null` and `NaN` both count as missing.
    pub fn is_missing(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Float(f) => f.is_nan(),
            _ => false,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Integers, and floats with an integral value.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.is_finite() && f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Timestamp(_) => "timestamp",
        }
    }

    /// Infers the most specific type for a text cell.
    /// Empty cells are `Null`.
    pub fn infer(text: &str) -> Value {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Value::Null;
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return Value::Int(i);
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            return Value::Float(f);
        }
        match trimmed {
            "True" | "true" | "TRUE" => return Value::Bool(true),
            "False" | "false" | "FALSE" => return Value::Bool(false),
            _ => {}
        }
        if let Some(t) = parse_timestamp(trimmed) {
            return Value::Timestamp(t);
        }
        Value::Str(text.to_string())
    }
}

pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_PARSE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text.trim(), fmt).ok())
        .or_else(|| {
            chrono::NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Cells are written so that [`Value::infer`] reads them back as the same value.
impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) if v.is_nan() => Ok(()),
            Value::Float(v) => write!(f, "{:?}", v),
            Value::Str(s) => write!(f, "{}", s),
            Value::Timestamp(t) => write!(f, "{}", t.format(TIMESTAMP_FORMAT)),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Timestamp(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Row-aligned, column-heterogeneous table with labelled columns.
///
/// Rows are positional: row `i` always describes sample (or feature) `i` of the
/// owning dataset, so every row operation here has a twin on the intensity matrix.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    names: Vec<String>,
    columns: Vec<Vec<Value>>,
    nrows: usize,
}

impl Table {
    /// A table with `nrows` rows and no columns.
    pub fn new(nrows: usize) -> Self {
        Self {
            names: Vec::new(),
            columns: Vec::new(),
            nrows,
        }
    }

    pub fn from_columns<S: Into<String>>(columns: Vec<(S, Vec<Value>)>) -> Result<Self> {
        let nrows = columns.first().map(|(_, c)| c.len()).unwrap_or(0);
        let mut table = Table::new(nrows);
        for (name, values) in columns {
            let name = name.into();
            if table.has_column(&name) {
                return Err(ProfilingError::Value(format!(
                    "Duplicated column name '{}'",
                    name
                )));
            }
            table.insert_column(name, values)?;
        }
        Ok(table)
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.names.len()
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.column_index(name).map(|i| self.columns[i].as_slice())
    }

    /// Like [`Table::column`] but a missing column is a lookup error.
    pub fn require_column(&self, name: &str) -> Result<&[Value]> {
        self.column(name)
            .ok_or_else(|| ProfilingError::Lookup(format!("Column '{}' not found", name)))
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Vec<Value>> {
        self.column_index(name).map(move |i| &mut self.columns[i])
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &[Value])> {
        self.names
            .iter()
            .zip(self.columns.iter())
            .map(|(n, c)| (n.as_str(), c.as_slice()))
    }

    pub fn get(&self, row: usize, name: &str) -> Option<&Value> {
        self.column(name).and_then(|c| c.get(row))
    }

    pub fn set(&mut self, row: usize, name: &str, value: impl Into<Value>) -> Result<()> {
        let nrows = self.nrows;
        let column = self
            .column_mut(name)
            .ok_or_else(|| ProfilingError::Lookup(format!("Column '{}' not found", name)))?;
        if row >= nrows {
            return Err(ProfilingError::Value(format!(
                "Row {} out of bounds for table with {} rows",
                row, nrows
            )));
        }
        column[row] = value.into();
        Ok(())
    }

    /// Inserts a column, replacing any column with the same name in place.
    pub fn insert_column(&mut self, name: impl Into<String>, values: Vec<Value>) -> Result<()> {
        let name = name.into();
        if values.len() != self.nrows {
            return Err(ProfilingError::Value(format!(
                "Column '{}' has {} values, table has {} rows",
                name,
                values.len(),
                self.nrows
            )));
        }
        match self.column_index(&name) {
            Some(i) => self.columns[i] = values,
            None => {
                self.names.push(name);
                self.columns.push(values);
            }
        }
        Ok(())
    }

    /// Adds a column filled with `fill` unless it already exists.
    pub fn ensure_column(&mut self, name: &str, fill: Value) {
        if !self.has_column(name) {
            self.names.push(name.to_string());
            self.columns.push(vec![fill; self.nrows]);
        }
    }

    pub fn remove_column(&mut self, name: &str) -> Option<Vec<Value>> {
        let idx = self.column_index(name)?;
        self.names.remove(idx);
        Some(self.columns.remove(idx))
    }

    pub fn rename_column(&mut self, old: &str, new: &str) -> Result<()> {
        if old == new {
            return Ok(());
        }
        if self.has_column(new) {
            return Err(ProfilingError::Value(format!(
                "Cannot rename '{}' to existing column '{}'",
                old, new
            )));
        }
        let idx = self
            .column_index(old)
            .ok_or_else(|| ProfilingError::Lookup(format!("Column '{}' not found", old)))?;
        self.names[idx] = new.to_string();
        Ok(())
    }

    /// A copy without the named columns (missing names are ignored).
    pub fn without_columns(&self, names: &[String]) -> Table {
        let mut out = Table::new(self.nrows);
        for (name, col) in self.columns() {
            if !names.iter().any(|n| n == name) {
                out.names.push(name.to_string());
                out.columns.push(col.to_vec());
            }
        }
        out
    }

    pub fn select_rows(&self, rows: &[usize]) -> Table {
        Table {
            names: self.names.clone(),
            columns: self
                .columns
                .iter()
                .map(|c| rows.iter().map(|&r| c[r].clone()).collect())
                .collect(),
            nrows: rows.len(),
        }
    }

    /// Rows whose mask entry equals `keep`; the result is renumbered from zero.
    pub fn filter_rows(&self, mask: &[bool], keep: bool) -> Table {
        self.select_rows(&mask_indices(mask, keep))
    }

    /// Re-indexes rows; `None` entries become rows of `Null`.
    pub fn take_rows(&self, rows: &[Option<usize>]) -> Table {
        Table {
            names: self.names.clone(),
            columns: self
                .columns
                .iter()
                .map(|c| {
                    rows.iter()
                        .map(|r| r.map(|r| c[r].clone()).unwrap_or(Value::Null))
                        .collect()
                })
                .collect(),
            nrows: rows.len(),
        }
    }

    /// Stacks `other` below `self`. The column set is the union; cells of
    /// columns absent from one side are `Null`.
    pub fn vstack(&self, other: &Table) -> Table {
        let mut names = self.names.clone();
        for n in other.names.iter() {
            if !names.contains(n) {
                names.push(n.clone());
            }
        }
        let columns = names
            .iter()
            .map(|n| {
                let mut col = match self.column(n) {
                    Some(c) => c.to_vec(),
                    None => vec![Value::Null; self.nrows],
                };
                match other.column(n) {
                    Some(c) => col.extend_from_slice(c),
                    None => col.extend(std::iter::repeat(Value::Null).take(other.nrows)),
                }
                col
            })
            .collect();
        Table {
            names,
            columns,
            nrows: self.nrows + other.nrows,
        }
    }

    /// Rows whose cell in `name` renders as `key`.
    pub fn find_rows(&self, name: &str, key: &str) -> Result<Vec<usize>> {
        let col = self.require_column(name)?;
        Ok(col
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.is_missing() && v.to_string() == key)
            .map(|(i, _)| i)
            .collect())
    }

    /// Column rendered as strings; missing cells are `None`.
    pub fn strings(&self, name: &str) -> Result<Vec<Option<String>>> {
        Ok(self
            .require_column(name)?
            .iter()
            .map(|v| {
                if v.is_missing() {
                    None
                } else {
                    Some(v.to_string())
                }
            })
            .collect())
    }

    /// Numeric column; missing cells are `NaN`, non-numeric cells a type error.
    pub fn floats(&self, name: &str) -> Result<Vec<f64>> {
        self.require_column(name)?
            .iter()
            .enumerate()
            .map(|(i, v)| {
                if v.is_missing() {
                    return Ok(f64::NAN);
                }
                v.as_f64().ok_or_else(|| {
                    ProfilingError::Type(format!(
                        "Column '{}' row {}: expected a number, found {} '{}'",
                        name,
                        i,
                        v.type_name(),
                        v
                    ))
                })
            })
            .collect()
    }

    /// Integer column; missing cells are `None`, anything else non-integral a type error.
    pub fn ints(&self, name: &str) -> Result<Vec<Option<i64>>> {
        self.require_column(name)?
            .iter()
            .enumerate()
            .map(|(i, v)| {
                if v.is_missing() {
                    return Ok(None);
                }
                v.as_i64().map(Some).ok_or_else(|| {
                    ProfilingError::Type(format!(
                        "Column '{}' row {}: expected an integer, found {} '{}'",
                        name,
                        i,
                        v.type_name(),
                        v
                    ))
                })
            })
            .collect()
    }

    /// Column parsed into a closed vocabulary; missing cells are `None`.
    pub fn parsed<T>(&self, name: &str) -> Result<Vec<Option<T>>>
    where
        T: std::str::FromStr<Err = ProfilingError>,
    {
        self.require_column(name)?
            .iter()
            .map(|v| {
                if v.is_missing() {
                    Ok(None)
                } else {
                    v.to_string().parse::<T>().map(Some)
                }
            })
            .collect()
    }
}
