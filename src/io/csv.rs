//! Delimited text (`.csv`) load/save.
//!
//! The row identifier is written as the first column, `Index`. On load, column
//! types are inferred from the text, timestamps by trying to parse the first
//! non-empty cell.

use std::path::Path;

use crate::data::table::{Table, Value};
use crate::error::{LoadError, SaveError};

use super::{table_from_text_columns, INDEX_COLUMN};

pub fn load(path: &Path) -> Result<Table, LoadError> {
    let parse_err = |e: ::csv::Error| LoadError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    };
    let mut reader = ::csv::ReaderBuilder::new()
        .flexible(false)
        .from_path(path)
        .map_err(parse_err)?;
    let headers: Vec<String> = reader
        .headers()
        .map_err(parse_err)?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
    for record in reader.records() {
        let record = record.map_err(parse_err)?;
        for (col, field) in cells.iter_mut().zip(record.iter()) {
            col.push((!field.is_empty()).then(|| field.to_string()));
        }
    }
    table_from_text_columns(path, headers, cells)
}

/// Text form of one cell; empty for nulls.
pub(crate) fn cell_text(v: &Value) -> String {
    match v {
        Value::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
        v if v.is_null() => String::new(),
        v => v.to_string(),
    }
}

pub fn save(table: &Table, path: &Path) -> Result<(), SaveError> {
    let write_err = |e: ::csv::Error| SaveError::Write {
        path: path.to_path_buf(),
        message: e.to_string(),
    };
    let mut writer = ::csv::Writer::from_path(path).map_err(write_err)?;

    let mut header = vec![INDEX_COLUMN.to_string()];
    header.extend(table.column_names());
    writer.write_record(&header).map_err(write_err)?;

    for (row, id) in table.ids().iter().enumerate() {
        let mut record = Vec::with_capacity(header.len());
        record.push(id.to_string());
        for c in table.columns() {
            record.push(cell_text(&c.values[row]));
        }
        writer.write_record(&record).map_err(write_err)?;
    }
    writer.flush().map_err(|source| SaveError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}
