//! Table load/save collaborator.
//!
//! [`TableIo`] is the seam the dataset store talks to. [`FileIo`] picks a
//! format by file extension:
//!
//! | extension        | format                     | array columns |
//! |------------------|----------------------------|---------------|
//! | `.lpt`, `.bin`   | native binary (bincode)    | kept          |
//! | `.csv`, `.txt`   | delimited text             | dropped       |
//! | `.xlsx`          | spreadsheet (`xlsx`)       | dropped       |
//! | `.parquet`       | columnar (`parquet`)       | kept          |
//!
//! Text-like writers also drop columns that are entirely empty and write the
//! row identifier as an explicit `Index` column so it round-trips.

pub mod binary;
pub mod csv;
#[cfg(feature = "parquet")]
pub mod parquet;
#[cfg(feature = "xlsx")]
pub mod xlsx;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::data::table::{Column, DType, RowSet, Table};
use crate::error::{LoadError, SaveError};

/// Name of the explicit row-identifier column in text-like formats.
pub const INDEX_COLUMN: &str = "Index";

/// Loads and saves whole tables.
pub trait TableIo {
    fn load(&self, path: &Path) -> Result<Table, LoadError>;

    /// Save `table`, restricted to `rows` if given.
    fn save(&self, table: &Table, path: &Path, rows: Option<&RowSet>) -> Result<(), SaveError>;
}

/// Supported on-disk formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileFormat {
    Binary,
    Csv,
    Xlsx,
    Parquet,
}

impl FileFormat {
    pub fn from_path(path: &Path) -> Option<FileFormat> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "lpt" | "bin" => Some(FileFormat::Binary),
            "csv" | "txt" => Some(FileFormat::Csv),
            "xlsx" => Some(FileFormat::Xlsx),
            "parquet" => Some(FileFormat::Parquet),
            _ => None,
        }
    }

    /// Whether array-valued columns survive this format.
    pub fn keeps_arrays(self) -> bool {
        matches!(self, FileFormat::Binary | FileFormat::Parquet)
    }

    /// Extensions offered in file dialogs, depending on enabled features.
    pub fn dialog_filters() -> Vec<(&'static str, &'static [&'static str])> {
        let mut v: Vec<(&'static str, &'static [&'static str])> = vec![
            ("Native binary", &["lpt", "bin"]),
            ("Delimited text", &["csv", "txt"]),
        ];
        if cfg!(feature = "xlsx") {
            v.push(("Spreadsheet", &["xlsx"]));
        }
        if cfg!(feature = "parquet") {
            v.push(("Parquet", &["parquet"]));
        }
        v
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_string()
}

/// File-backed [`TableIo`] dispatching on the extension.
///
/// Relative paths are resolved against `base_dir` when one is configured.
#[derive(Clone, Debug, Default)]
pub struct FileIo {
    base_dir: Option<PathBuf>,
}

impl FileIo {
    pub fn new(base_dir: Option<PathBuf>) -> Self {
        Self { base_dir }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl TableIo for FileIo {
    fn load(&self, path: &Path) -> Result<Table, LoadError> {
        let path = self.resolve(path);
        let format = FileFormat::from_path(&path)
            .ok_or_else(|| LoadError::UnsupportedFormat(extension_of(&path)))?;
        match format {
            FileFormat::Binary => binary::load(&path),
            FileFormat::Csv => csv::load(&path),
            #[cfg(feature = "xlsx")]
            FileFormat::Xlsx => xlsx::load(&path),
            #[cfg(feature = "parquet")]
            FileFormat::Parquet => parquet::load(&path),
            #[allow(unreachable_patterns)]
            _ => Err(LoadError::UnsupportedFormat(extension_of(&path))),
        }
    }

    fn save(&self, table: &Table, path: &Path, rows: Option<&RowSet>) -> Result<(), SaveError> {
        let path = self.resolve(path);
        let format = FileFormat::from_path(&path)
            .ok_or_else(|| SaveError::UnsupportedFormat(extension_of(&path)))?;
        let table = prepare_for_save(table, rows, format.keeps_arrays());
        if table.is_empty() {
            return Err(SaveError::Empty);
        }
        match format {
            FileFormat::Binary => binary::save(&table, &path),
            FileFormat::Csv => csv::save(&table, &path),
            #[cfg(feature = "xlsx")]
            FileFormat::Xlsx => xlsx::save(&table, &path),
            #[cfg(feature = "parquet")]
            FileFormat::Parquet => parquet::save(&table, &path),
            #[allow(unreachable_patterns)]
            _ => Err(SaveError::UnsupportedFormat(extension_of(&path))),
        }
    }
}

/// Restrict to `rows` and, for formats that cannot hold them, drop array
/// columns and columns without a single value.
pub fn prepare_for_save(table: &Table, rows: Option<&RowSet>, keep_arrays: bool) -> Table {
    let mut out = match rows {
        Some(rows) => table.take_rows(&table.positions_of(rows)),
        None => table.clone(),
    };
    if !keep_arrays {
        let drop: Vec<String> = out
            .columns()
            .iter()
            .filter(|c| c.dtype == DType::Array || c.array_len().is_some() || c.is_all_null())
            .map(|c| c.name.clone())
            .collect();
        for name in drop {
            log::debug!("dropping column '{}' before save", name);
            out.remove_column(&name);
        }
    }
    out
}

/// Build a table from text-like sources: an optional `Index` column supplies
/// row ids, every other column is typed by [`infer_text_column`].
pub(crate) fn table_from_text_columns(
    path: &Path,
    headers: Vec<String>,
    cells: Vec<Vec<Option<String>>>,
) -> Result<Table, LoadError> {
    let mut ids = None;
    let mut columns = Vec::new();
    for (name, values) in headers.into_iter().zip(cells) {
        if name == INDEX_COLUMN {
            let parsed = values
                .iter()
                .map(|v| v.as_deref().and_then(|s| s.trim().parse::<f64>().ok()))
                .map(|v| v.filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64))
                .collect::<Option<Vec<u64>>>()
                .ok_or_else(|| LoadError::Parse {
                    path: path.to_path_buf(),
                    message: format!("column '{}' must hold non-negative integers", INDEX_COLUMN),
                })?;
            ids = Some(parsed);
            continue;
        }
        columns.push(infer_text_column(name, values));
    }
    let result = match ids {
        Some(ids) => Table::from_columns(ids, columns),
        None => {
            log::warn!("{} has no '{}' column, numbering rows from 0", path.display(), INDEX_COLUMN);
            Table::with_sequential_ids(columns)
        }
    };
    result.map_err(LoadError::Invalid)
}

/// Type a column of raw strings: all-integer, all-float, boolean, then
/// timestamp if the first non-empty cell parses as one, else text.
pub fn infer_text_column(name: String, raw: Vec<Option<String>>) -> Column {
    use crate::data::table::{parse_datetime, Value};

    let raw: Vec<Option<String>> = raw
        .into_iter()
        .map(|v| v.filter(|s| !s.trim().is_empty()))
        .collect();
    let present = || raw.iter().flatten();

    if present().next().is_none() {
        return Column::nulls(name, raw.len());
    }
    if present().all(|s| s.trim().parse::<i64>().is_ok()) {
        let values = raw
            .iter()
            .map(|v| v.as_deref().and_then(|s| s.trim().parse().ok()).map_or(Value::Null, Value::Int))
            .collect();
        return Column::new(name, DType::Int, values);
    }
    if present().all(|s| s.trim().parse::<f64>().is_ok()) {
        let values = raw
            .iter()
            .map(|v| {
                v.as_deref()
                    .and_then(|s| s.trim().parse().ok())
                    .map_or(Value::Null, Value::Float)
            })
            .collect();
        return Column::new(name, DType::Float, values);
    }
    if present().all(|s| matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "false")) {
        let values = raw
            .iter()
            .map(|v| match v {
                Some(s) => Value::Bool(s.trim().eq_ignore_ascii_case("true")),
                None => Value::Null,
            })
            .collect();
        return Column::new(name, DType::Bool, values);
    }
    let first_is_time = present().next().and_then(|s| parse_datetime(s)).is_some();
    if first_is_time {
        let values = raw
            .iter()
            .map(|v| v.as_deref().and_then(parse_datetime).map_or(Value::Null, Value::DateTime))
            .collect();
        return Column::new(name, DType::DateTime, values);
    }
    let values = raw
        .into_iter()
        .map(|v| v.map_or(Value::Null, Value::Text))
        .collect();
    Column::new(name, DType::Text, values)
}

/// In-memory [`TableIo`], keyed by path. Handy for tests and for scripts that
/// stage tables without touching the disk.
#[derive(Default)]
pub struct MemoryIo {
    files: Mutex<HashMap<PathBuf, Table>>,
}

impl MemoryIo {
    pub fn with_file(path: impl Into<PathBuf>, table: Table) -> Self {
        let io = Self::default();
        if let Ok(mut files) = io.files.lock() {
            files.insert(path.into(), table);
        }
        io
    }
}

impl TableIo for MemoryIo {
    fn load(&self, path: &Path) -> Result<Table, LoadError> {
        let files = self
            .files
            .lock()
            .map_err(|e| LoadError::Invalid(e.to_string()))?;
        files.get(path).cloned().ok_or_else(|| LoadError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such in-memory file"),
        })
    }

    fn save(&self, table: &Table, path: &Path, rows: Option<&RowSet>) -> Result<(), SaveError> {
        let table = prepare_for_save(table, rows, true);
        if table.is_empty() {
            return Err(SaveError::Empty);
        }
        let mut files = self.files.lock().map_err(|e| SaveError::Write {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        files.insert(path.to_path_buf(), table);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::table::Value;

    #[test]
    fn format_by_extension() {
        assert_eq!(FileFormat::from_path(Path::new("a.CSV")), Some(FileFormat::Csv));
        assert_eq!(FileFormat::from_path(Path::new("a.lpt")), Some(FileFormat::Binary));
        assert_eq!(FileFormat::from_path(Path::new("a.pkl")), None);
    }

    #[test]
    fn text_inference() {
        let s = |v: &str| Some(v.to_string());
        assert_eq!(infer_text_column("a".into(), vec![s("1"), None, s("3")]).dtype, DType::Int);
        assert_eq!(infer_text_column("a".into(), vec![s("1.5"), s("3")]).dtype, DType::Float);
        let dt = infer_text_column("a".into(), vec![None, s("2020-01-01 00:00:01"), s("junk")]);
        assert_eq!(dt.dtype, DType::DateTime);
        assert_eq!(dt.values[2], Value::Null);
        assert_eq!(infer_text_column("a".into(), vec![s("walk")]).dtype, DType::Text);
        assert!(infer_text_column("a".into(), vec![None, s(" ")]).is_all_null());
    }

    #[test]
    fn prepare_drops_arrays_and_empty_columns() {
        let t = Table::with_sequential_ids(vec![
            Column::from_f64("a", [1.0, 2.0]),
            Column::from_arrays("fft", [vec![1.0], vec![2.0]]),
            Column::nulls("empty", 2),
        ])
        .unwrap();
        let rows: RowSet = [1].into_iter().collect();
        let out = prepare_for_save(&t, Some(&rows), false);
        assert_eq!(out.column_names(), vec!["a".to_string()]);
        assert_eq!(out.ids(), &[1]);
        let kept = prepare_for_save(&t, None, true);
        assert_eq!(kept.columns().len(), 3);
    }
}
