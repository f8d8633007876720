//! Spreadsheet (`.xlsx`) load/save. Only the first worksheet is read.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use rust_xlsxwriter::Workbook;

use crate::data::table::{Table, Value};
use crate::error::{LoadError, SaveError};

use super::csv::cell_text;
use super::{table_from_text_columns, INDEX_COLUMN};

fn cell_to_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) => Some(s.clone()),
        Data::Float(f) => Some(f.to_string()),
        Data::Int(i) => Some(i.to_string()),
        Data::Bool(b) => Some(b.to_string()),
        Data::DateTime(d) => d
            .as_datetime()
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S%.3f").to_string()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(s.clone()),
    }
}

pub fn load(path: &Path) -> Result<Table, LoadError> {
    let parse_err = |message: String| LoadError::Parse {
        path: path.to_path_buf(),
        message,
    };
    let mut workbook = open_workbook_auto(path).map_err(|e| parse_err(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| parse_err("workbook has no worksheets".to_string()))?
        .map_err(|e| parse_err(e.to_string()))?;

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(h) => h
            .iter()
            .map(|c| cell_to_text(c).unwrap_or_default().trim().to_string())
            .collect(),
        None => return Table::from_columns(Vec::new(), Vec::new()).map_err(LoadError::Invalid),
    };
    let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
    for row in rows {
        for (col, cell) in cells.iter_mut().zip(row.iter()) {
            col.push(cell_to_text(cell));
        }
    }
    table_from_text_columns(path, headers, cells)
}

pub fn save(table: &Table, path: &Path) -> Result<(), SaveError> {
    let write_err = |e: rust_xlsxwriter::XlsxError| SaveError::Write {
        path: path.to_path_buf(),
        message: e.to_string(),
    };
    if table.columns().len() + 1 > u16::MAX as usize || table.len() + 1 > u32::MAX as usize {
        return Err(SaveError::Write {
            path: path.to_path_buf(),
            message: "table is too large for a worksheet".to_string(),
        });
    }

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, INDEX_COLUMN).map_err(write_err)?;
    for (c, col) in table.columns().iter().enumerate() {
        sheet
            .write_string(0, (c + 1) as u16, col.name.as_str())
            .map_err(write_err)?;
    }
    for (r, id) in table.ids().iter().enumerate() {
        let row = (r + 1) as u32;
        sheet.write_number(row, 0, *id as f64).map_err(write_err)?;
        for (c, col) in table.columns().iter().enumerate() {
            let cidx = (c + 1) as u16;
            match &col.values[r] {
                v if v.is_null() => {}
                Value::Int(i) => {
                    sheet.write_number(row, cidx, *i as f64).map_err(write_err)?;
                }
                Value::Float(f) => {
                    sheet.write_number(row, cidx, *f).map_err(write_err)?;
                }
                Value::Bool(b) => {
                    sheet.write_boolean(row, cidx, *b).map_err(write_err)?;
                }
                v => {
                    sheet.write_string(row, cidx, cell_text(v)).map_err(write_err)?;
                }
            }
        }
    }
    workbook.save(path).map_err(write_err)?;
    Ok(())
}
