//! Native binary format: the whole table, array columns included, encoded
//! with bincode.
//!
//! Layout: the raw [`MAGIC`] bytes, then the bincode payload. The payload is
//! decoded with a byte limit equal to the file size, so a damaged length
//! prefix fails as a parse error instead of a huge allocation.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use bincode::Options;
use serde::{Deserialize, Serialize};

use crate::data::table::{Column, RowId, Table};
use crate::error::{LoadError, SaveError};

/// Leading tag so foreign files are rejected before any decoding.
const MAGIC: &[u8; 16] = b"labelplot-table\0";
const VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct TableSerde {
    version: u32,
    ids: Vec<RowId>,
    columns: Vec<Column>,
}

impl From<&Table> for TableSerde {
    fn from(t: &Table) -> Self {
        Self {
            version: VERSION,
            ids: t.ids().to_vec(),
            columns: t.columns().to_vec(),
        }
    }
}

impl TableSerde {
    fn into_table(self) -> Result<Table, LoadError> {
        if self.version != VERSION {
            return Err(LoadError::Invalid(format!(
                "unsupported table file version {}",
                self.version
            )));
        }
        Table::from_columns(self.ids, self.columns).map_err(LoadError::Invalid)
    }
}

fn codec(limit: u64) -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_limit(limit)
}

pub fn load(path: &Path) -> Result<Table, LoadError> {
    let io_err = |source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    };
    let parse_err = |message: String| LoadError::Parse {
        path: path.to_path_buf(),
        message,
    };
    let file = File::open(path).map_err(io_err)?;
    let len = file.metadata().map_err(io_err)?.len();
    let mut reader = BufReader::new(file);

    let mut magic = [0u8; 16];
    if len < MAGIC.len() as u64 {
        return Err(parse_err("not a table file".to_string()));
    }
    reader.read_exact(&mut magic).map_err(io_err)?;
    if &magic != MAGIC {
        return Err(parse_err("not a table file".to_string()));
    }

    let repr: TableSerde = codec(len)
        .deserialize_from(reader)
        .map_err(|e| parse_err(e.to_string()))?;
    repr.into_table()
}

pub fn save(table: &Table, path: &Path) -> Result<(), SaveError> {
    let io_err = |source| SaveError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(MAGIC).map_err(io_err)?;
    codec(u64::MAX)
        .serialize_into(&mut writer, &TableSerde::from(table))
        .map_err(|e| SaveError::Write {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    writer.flush().map_err(io_err)
}
