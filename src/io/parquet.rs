//! Columnar (`.parquet`) load/save via Apache Arrow. Array columns are stored
//! as `List<Float64>`, timestamps as millisecond timestamps.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow_array::types::Float64Type;
use arrow_array::{
    Array, ArrayRef, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array, ListArray,
    RecordBatch, StringArray, TimestampMicrosecondArray, TimestampMillisecondArray,
    TimestampNanosecondArray, TimestampSecondArray, UInt64Array,
};
use arrow_schema::{DataType, Field, Schema, TimeUnit};
use chrono::DateTime;
use ::parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use ::parquet::arrow::arrow_writer::ArrowWriter;
use ::parquet::file::properties::WriterProperties;

use crate::data::table::{Column, DType, RowId, Table, Value};
use crate::error::{LoadError, SaveError};

use super::csv::cell_text;
use super::INDEX_COLUMN;

fn to_arrow(col: &Column) -> (Field, ArrayRef) {
    let name = col.name.as_str();
    match col.dtype {
        DType::Int => {
            let v: Vec<Option<i64>> = col
                .values
                .iter()
                .map(|v| match v {
                    Value::Int(i) => Some(*i),
                    _ => None,
                })
                .collect();
            (Field::new(name, DataType::Int64, true), Arc::new(Int64Array::from(v)))
        }
        DType::Float => {
            let v: Vec<Option<f64>> = col.values.iter().map(Value::as_f64).collect();
            (Field::new(name, DataType::Float64, true), Arc::new(Float64Array::from(v)))
        }
        DType::Bool => {
            let v: Vec<Option<bool>> = col
                .values
                .iter()
                .map(|v| match v {
                    Value::Bool(b) => Some(*b),
                    _ => None,
                })
                .collect();
            (Field::new(name, DataType::Boolean, true), Arc::new(BooleanArray::from(v)))
        }
        DType::DateTime => {
            let v: Vec<Option<i64>> = col
                .values
                .iter()
                .map(|v| v.as_datetime().map(|dt| dt.and_utc().timestamp_millis()))
                .collect();
            (
                Field::new(name, DataType::Timestamp(TimeUnit::Millisecond, None), true),
                Arc::new(TimestampMillisecondArray::from(v)),
            )
        }
        DType::Array => {
            let arr = ListArray::from_iter_primitive::<Float64Type, _, _>(col.values.iter().map(
                |v| match v {
                    Value::Array(xs) => Some(xs.iter().map(|x| Some(*x)).collect::<Vec<_>>()),
                    _ => None,
                },
            ));
            let item = Arc::new(Field::new("item", DataType::Float64, true));
            (Field::new(name, DataType::List(item), true), Arc::new(arr))
        }
        DType::Text | DType::Object => {
            let v: Vec<Option<String>> = col
                .values
                .iter()
                .map(|v| (!v.is_null()).then(|| cell_text(v)))
                .collect();
            (Field::new(name, DataType::Utf8, true), Arc::new(StringArray::from(v)))
        }
    }
}

pub fn save(table: &Table, path: &Path) -> Result<(), SaveError> {
    let write_err = |message: String| SaveError::Write {
        path: path.to_path_buf(),
        message,
    };
    let mut fields = vec![Field::new(INDEX_COLUMN, DataType::UInt64, false)];
    let mut arrays: Vec<ArrayRef> = vec![Arc::new(UInt64Array::from(table.ids().to_vec()))];
    for col in table.columns() {
        let (f, a) = to_arrow(col);
        fields.push(f);
        arrays.push(a);
    }
    let schema = Arc::new(Schema::new(fields));
    let batch =
        RecordBatch::try_new(schema.clone(), arrays).map_err(|e| write_err(e.to_string()))?;

    let file = File::create(path).map_err(|source| SaveError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let props = WriterProperties::builder().build();
    let mut writer =
        ArrowWriter::try_new(file, schema, Some(props)).map_err(|e| write_err(e.to_string()))?;
    writer.write(&batch).map_err(|e| write_err(e.to_string()))?;
    writer.close().map_err(|e| write_err(e.to_string()))?;
    Ok(())
}

fn downcast<'a, T: 'static>(array: &'a ArrayRef) -> Option<&'a T> {
    array.as_any().downcast_ref::<T>()
}

fn ts_value(v: Option<i64>, per_sec: i64) -> Value {
    let Some(v) = v else {
        return Value::Null;
    };
    let secs = v.div_euclid(per_sec);
    let nanos = (v.rem_euclid(per_sec) * (1_000_000_000 / per_sec)) as u32;
    DateTime::from_timestamp(secs, nanos).map_or(Value::Null, |d| Value::DateTime(d.naive_utc()))
}

/// Convert one Arrow array into cells. `None` for unsupported types.
fn from_arrow(array: &ArrayRef) -> Option<(DType, Vec<Value>)> {
    let n = array.len();
    let opt = |i: usize| !array.is_null(i);
    match array.data_type() {
        DataType::Int64 => {
            let a = downcast::<Int64Array>(array)?;
            Some((DType::Int, (0..n).map(|i| if opt(i) { Value::Int(a.value(i)) } else { Value::Null }).collect()))
        }
        DataType::Int32 => {
            let a = downcast::<Int32Array>(array)?;
            Some((DType::Int, (0..n).map(|i| if opt(i) { Value::Int(a.value(i) as i64) } else { Value::Null }).collect()))
        }
        DataType::Float64 => {
            let a = downcast::<Float64Array>(array)?;
            Some((DType::Float, (0..n).map(|i| if opt(i) { Value::Float(a.value(i)) } else { Value::Null }).collect()))
        }
        DataType::Float32 => {
            let a = downcast::<Float32Array>(array)?;
            Some((DType::Float, (0..n).map(|i| if opt(i) { Value::Float(a.value(i) as f64) } else { Value::Null }).collect()))
        }
        DataType::Boolean => {
            let a = downcast::<BooleanArray>(array)?;
            Some((DType::Bool, (0..n).map(|i| if opt(i) { Value::Bool(a.value(i)) } else { Value::Null }).collect()))
        }
        DataType::Utf8 => {
            let a = downcast::<StringArray>(array)?;
            Some((DType::Text, (0..n).map(|i| if opt(i) { Value::Text(a.value(i).to_string()) } else { Value::Null }).collect()))
        }
        DataType::Timestamp(unit, _) => {
            let raw: Vec<Option<i64>> = match unit {
                TimeUnit::Second => downcast::<TimestampSecondArray>(array)?.iter().collect(),
                TimeUnit::Millisecond => downcast::<TimestampMillisecondArray>(array)?.iter().collect(),
                TimeUnit::Microsecond => downcast::<TimestampMicrosecondArray>(array)?.iter().collect(),
                TimeUnit::Nanosecond => downcast::<TimestampNanosecondArray>(array)?.iter().collect(),
            };
            let per_sec = match unit {
                TimeUnit::Second => 1,
                TimeUnit::Millisecond => 1_000,
                TimeUnit::Microsecond => 1_000_000,
                TimeUnit::Nanosecond => 1_000_000_000,
            };
            Some((DType::DateTime, raw.into_iter().map(|v| ts_value(v, per_sec)).collect()))
        }
        DataType::List(_) => {
            let a = downcast::<ListArray>(array)?;
            let values = (0..n)
                .map(|i| {
                    if !opt(i) {
                        return Value::Null;
                    }
                    let inner = a.value(i);
                    match downcast::<Float64Array>(&inner) {
                        Some(f) => Value::Array(f.iter().map(|x| x.unwrap_or(f64::NAN)).collect()),
                        None => Value::Null,
                    }
                })
                .collect();
            Some((DType::Array, values))
        }
        _ => None,
    }
}

pub fn load(path: &Path) -> Result<Table, LoadError> {
    let parse_err = |message: String| LoadError::Parse {
        path: path.to_path_buf(),
        message,
    };
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .and_then(|b| b.build())
        .map_err(|e| parse_err(e.to_string()))?;

    let mut ids: Option<Vec<RowId>> = None;
    let mut columns: Vec<Column> = Vec::new();
    for batch in reader {
        let batch = batch.map_err(|e| parse_err(e.to_string()))?;
        let schema = batch.schema();
        for (field, array) in schema.fields().iter().zip(batch.columns()) {
            if field.name() == INDEX_COLUMN {
                let a = downcast::<UInt64Array>(array).ok_or_else(|| {
                    parse_err(format!("'{}' must be an unsigned integer column", INDEX_COLUMN))
                })?;
                ids.get_or_insert_with(Vec::new).extend(a.iter().flatten());
                continue;
            }
            let Some((dtype, values)) = from_arrow(array) else {
                log::warn!("skipping column '{}' with unsupported type {}", field.name(), field.data_type());
                continue;
            };
            match columns.iter_mut().find(|c| &c.name == field.name()) {
                Some(c) => c.values.extend(values),
                None => columns.push(Column::new(field.name().clone(), dtype, values)),
            }
        }
    }
    let result = match ids {
        Some(ids) => Table::from_columns(ids, columns),
        None => Table::with_sequential_ids(columns),
    };
    result.map_err(LoadError::Invalid)
}
