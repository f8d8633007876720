//! In-memory row-indexed table.
//!
//! Rows are addressed by a stable [`RowId`]; physical order is insertion order.
//! Columns are typed ([`DType`]) but every cell is a nullable [`Value`], so
//! mixed "object" columns can exist after merges, as they would in a dataframe.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::range::{datetime_to_secs, AxisValue};
use crate::error::StoreError;

/// Name of the distinguished primary timestamp column.
pub const DATETIME_COLUMN: &str = "DateTime";

/// Stable row identifier.
pub type RowId = u64;

/// A set of row identifiers (selection, hidden set, gesture result).
pub type RowSet = BTreeSet<RowId>;

/// Formats tried, in order, when a string has to become a timestamp.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%d-%m-%Y %H:%M:%S%.f",
];

/// Parse a timestamp written in one of the common textual layouts.
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// One cell.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    DateTime(NaiveDateTime),
    /// Numeric vector, e.g. one spectrum line.
    Array(Vec<f64>),
}

impl Value {
    /// `Null` and NaN floats both count as missing.
    pub fn is_null(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Float(v) => v.is_nan(),
            _ => false,
        }
    }

    pub fn dtype(&self) -> Option<DType> {
        Some(match self {
            Value::Null => return None,
            Value::Float(v) if v.is_nan() => return None,
            Value::Bool(_) => DType::Bool,
            Value::Int(_) => DType::Int,
            Value::Float(_) => DType::Float,
            Value::Text(_) => DType::Text,
            Value::DateTime(_) => DType::DateTime,
            Value::Array(_) => DType::Array,
        })
    }

    /// Position on a linear axis. Timestamps map to epoch seconds.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) if !v.is_nan() => Some(*v),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::DateTime(dt) => Some(datetime_to_secs(dt)),
            _ => None,
        }
    }

    pub fn as_axis_value(&self) -> Option<AxisValue> {
        match self {
            Value::DateTime(dt) => Some(AxisValue::DateTime(*dt)),
            Value::Int(_) | Value::Float(_) | Value::Bool(_) => self.as_f64().map(AxisValue::Number),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Value::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    /// Display form used for label classes and legends. Missing values are `"None"`.
    pub fn label_string(&self) -> String {
        if self.is_null() {
            return "None".to_string();
        }
        self.to_string()
    }

    /// Convert one cell to `target`. The error string explains why not.
    pub fn cast(&self, target: DType) -> Result<Value, String> {
        if self.is_null() {
            return Ok(Value::Null);
        }
        let fail = || Err(format!("value {:?} cannot be represented as {}", self, target));
        match (target, self) {
            (DType::Object, v) => Ok(v.clone()),
            (DType::Float, Value::Float(v)) => Ok(Value::Float(*v)),
            (DType::Float, Value::Int(v)) => Ok(Value::Float(*v as f64)),
            (DType::Float, Value::Bool(b)) => Ok(Value::Float(if *b { 1.0 } else { 0.0 })),
            (DType::Float, Value::Text(s)) => match s.trim().parse::<f64>() {
                Ok(v) => Ok(Value::Float(v)),
                Err(e) => Err(format!("'{}': {}", s, e)),
            },
            (DType::Int, Value::Int(v)) => Ok(Value::Int(*v)),
            (DType::Int, Value::Float(v)) if v.fract() == 0.0 && v.is_finite() => {
                Ok(Value::Int(*v as i64))
            }
            (DType::Int, Value::Bool(b)) => Ok(Value::Int(i64::from(*b))),
            (DType::Int, Value::Text(s)) => match s.trim().parse::<i64>() {
                Ok(v) => Ok(Value::Int(v)),
                Err(e) => Err(format!("'{}': {}", s, e)),
            },
            (DType::Bool, Value::Bool(b)) => Ok(Value::Bool(*b)),
            (DType::Bool, Value::Int(0)) => Ok(Value::Bool(false)),
            (DType::Bool, Value::Int(1)) => Ok(Value::Bool(true)),
            (DType::Bool, Value::Text(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => fail(),
            },
            (DType::Text, Value::Array(_)) => fail(),
            (DType::Text, v) => Ok(Value::Text(v.to_string())),
            (DType::DateTime, Value::DateTime(dt)) => Ok(Value::DateTime(*dt)),
            (DType::DateTime, Value::Text(s)) => match parse_datetime(s) {
                Some(dt) => Ok(Value::DateTime(dt)),
                None => Err(format!("'{}' is not a recognised timestamp", s)),
            },
            (DType::Array, Value::Array(v)) => Ok(Value::Array(v.clone())),
            _ => fail(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, ""),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(s) => write!(f, "{}", s),
            Value::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S%.f")),
            Value::Array(v) => write!(f, "[{} values]", v.len()),
        }
    }
}

/// Declared type of a column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    Bool,
    Int,
    Float,
    Text,
    DateTime,
    Array,
    /// Mixed cell types.
    Object,
}

impl DType {
    pub fn is_numeric(self) -> bool {
        matches!(self, DType::Int | DType::Float | DType::Bool)
    }

    /// Type that can hold cells of both `self` and `other`.
    pub fn unify(self, other: DType) -> DType {
        match (self, other) {
            (a, b) if a == b => a,
            (DType::Int, DType::Float) | (DType::Float, DType::Int) => DType::Float,
            _ => DType::Object,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DType::Bool => "bool",
            DType::Int => "int",
            DType::Float => "float",
            DType::Text => "string",
            DType::DateTime => "datetime",
            DType::Array => "array",
            DType::Object => "object",
        };
        f.write_str(s)
    }
}

/// A named column of nullable cells.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub dtype: DType,
    pub values: Vec<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, dtype: DType, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            dtype,
            values,
        }
    }

    /// Column whose dtype is inferred from its non-null cells.
    pub fn infer(name: impl Into<String>, values: Vec<Value>) -> Self {
        let dtype = infer_dtype(&values);
        Self::new(name, dtype, values)
    }

    pub fn nulls(name: impl Into<String>, len: usize) -> Self {
        Self::new(name, DType::Object, vec![Value::Null; len])
    }

    pub fn from_f64(name: impl Into<String>, values: impl IntoIterator<Item = f64>) -> Self {
        Self::new(name, DType::Float, values.into_iter().map(Value::Float).collect())
    }

    pub fn from_i64(name: impl Into<String>, values: impl IntoIterator<Item = Option<i64>>) -> Self {
        let values = values
            .into_iter()
            .map(|v| v.map_or(Value::Null, Value::Int))
            .collect();
        Self::new(name, DType::Int, values)
    }

    pub fn from_text<S: Into<String>>(
        name: impl Into<String>,
        values: impl IntoIterator<Item = Option<S>>,
    ) -> Self {
        let values = values
            .into_iter()
            .map(|v| v.map_or(Value::Null, |s| Value::Text(s.into())))
            .collect();
        Self::new(name, DType::Text, values)
    }

    pub fn from_datetimes(
        name: impl Into<String>,
        values: impl IntoIterator<Item = NaiveDateTime>,
    ) -> Self {
        Self::new(name, DType::DateTime, values.into_iter().map(Value::DateTime).collect())
    }

    pub fn from_arrays(name: impl Into<String>, values: impl IntoIterator<Item = Vec<f64>>) -> Self {
        Self::new(name, DType::Array, values.into_iter().map(Value::Array).collect())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn first_non_null(&self) -> Option<&Value> {
        self.values.iter().find(|v| !v.is_null())
    }

    pub fn is_all_null(&self) -> bool {
        self.values.iter().all(Value::is_null)
    }

    /// Cast every cell, or fail without touching `self`.
    pub fn cast(&self, target: DType) -> Result<Column, StoreError> {
        let values = self
            .values
            .iter()
            .map(|v| v.cast(target))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|cause| StoreError::TypeCoercion {
                target: target.to_string(),
                cause,
            })?;
        Ok(Column::new(self.name.clone(), target, values))
    }

    /// Whether this column holds categorical labels: strings, integers, or
    /// mixed columns whose first value is a string.
    pub fn is_label_column(&self) -> bool {
        match self.dtype {
            DType::Text | DType::Int => true,
            DType::Object => matches!(self.first_non_null(), Some(Value::Text(_))),
            _ => false,
        }
    }

    /// Vector length when the first non-null value is an array.
    pub fn array_len(&self) -> Option<usize> {
        match self.first_non_null() {
            Some(Value::Array(v)) => Some(v.len()),
            _ => None,
        }
    }
}

fn infer_dtype(values: &[Value]) -> DType {
    let mut dtype: Option<DType> = None;
    for v in values {
        if let Some(t) = v.dtype() {
            dtype = Some(dtype.map_or(t, |d| d.unify(t)));
        }
    }
    dtype.unwrap_or(DType::Object)
}

/// Row-indexed table with named columns.
#[derive(Clone, Debug, Default)]
pub struct Table {
    ids: Vec<RowId>,
    columns: Vec<Column>,
    index: HashMap<RowId, usize>,
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.ids == other.ids && self.columns == other.columns
    }
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table, validating that it is well-formed: unique row ids,
    /// unique column names, every column as long as the id list, and a
    /// timestamp-typed primary timestamp column if present.
    pub fn from_columns(ids: Vec<RowId>, columns: Vec<Column>) -> Result<Table, String> {
        let mut index = HashMap::with_capacity(ids.len());
        for (pos, id) in ids.iter().enumerate() {
            if index.insert(*id, pos).is_some() {
                return Err(format!("duplicate row identifier {}", id));
            }
        }
        let mut names = HashSet::new();
        for c in &columns {
            if !names.insert(c.name.as_str()) {
                return Err(format!("duplicate column name '{}'", c.name));
            }
            if c.len() != ids.len() {
                return Err(format!(
                    "column '{}' has {} values but the table has {} rows",
                    c.name,
                    c.len(),
                    ids.len()
                ));
            }
            if c.name == DATETIME_COLUMN
                && c.values
                    .iter()
                    .any(|v| !v.is_null() && !matches!(v, Value::DateTime(_)))
            {
                return Err(format!("column '{}' must hold timestamps", DATETIME_COLUMN));
            }
        }
        Ok(Table { ids, columns, index })
    }

    /// Build a table with row ids `0..n`.
    pub fn with_sequential_ids(columns: Vec<Column>) -> Result<Table, String> {
        let n = columns.first().map_or(0, Column::len);
        Table::from_columns((0..n as RowId).collect(), columns)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[RowId] {
        &self.ids
    }

    pub fn id_set(&self) -> RowSet {
        self.ids.iter().copied().collect()
    }

    pub fn position(&self, id: RowId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn contains_id(&self, id: RowId) -> bool {
        self.index.contains_key(&id)
    }

    /// Smallest id larger than every id in the table.
    pub fn next_row_id(&self) -> RowId {
        self.ids.iter().max().map_or(0, |m| m + 1)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Insert or replace a column of matching length.
    pub fn set_column(&mut self, column: Column) -> Result<(), StoreError> {
        if column.len() != self.len() {
            return Err(StoreError::Unsupported(format!(
                "column '{}' has {} values but the table has {} rows",
                column.name,
                column.len(),
                self.len()
            )));
        }
        match self.columns.iter_mut().find(|c| c.name == column.name) {
            Some(existing) => *existing = column,
            None => self.columns.push(column),
        }
        Ok(())
    }

    pub fn remove_column(&mut self, name: &str) -> Option<Column> {
        let pos = self.columns.iter().position(|c| c.name == name)?;
        Some(self.columns.remove(pos))
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        self.column(column).and_then(|c| c.values.get(row))
    }

    /// Primary timestamp per row, if the table has a timestamp column.
    pub fn timestamps(&self) -> Option<Vec<Option<NaiveDateTime>>> {
        let col = self.column(DATETIME_COLUMN)?;
        Some(col.values.iter().map(Value::as_datetime).collect())
    }

    /// Positions (in table order) of the given ids that exist in the table.
    pub fn positions_of(&self, ids: &RowSet) -> Vec<usize> {
        let mut pos: Vec<usize> = ids.iter().filter_map(|id| self.position(*id)).collect();
        pos.sort_unstable();
        pos
    }

    /// New table with only the rows at `positions`, in that order.
    pub fn take_rows(&self, positions: &[usize]) -> Table {
        let ids: Vec<RowId> = positions.iter().map(|&p| self.ids[p]).collect();
        let columns = self
            .columns
            .iter()
            .map(|c| {
                Column::new(
                    c.name.clone(),
                    c.dtype,
                    positions.iter().map(|&p| c.values[p].clone()).collect(),
                )
            })
            .collect();
        let index = ids.iter().enumerate().map(|(p, id)| (*id, p)).collect();
        Table { ids, columns, index }
    }

    /// Split into raw parts, e.g. for serialization.
    pub fn into_parts(self) -> (Vec<RowId>, Vec<Column>) {
        (self.ids, self.columns)
    }
}
