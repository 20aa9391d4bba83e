// Copyright 2025 Seriesflow Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Row set ⇄ parquet conversion via arrow.
//!
//! Column types are inferred from the first non-null cell: strings map to
//! Utf8, numbers to Float64, times to microsecond timestamps (no
//! timezone), dates to Date32. Cell rendering stays stable across this
//! round-trip, which the key fingerprints rely on.

use crate::error::{Result, StorageError};
use arrow::array::{
    Array, ArrayRef, Date32Array, Date32Builder, Float64Array, Float64Builder, Int32Array,
    Int64Array, RecordBatch, StringArray, StringBuilder, TimestampMicrosecondArray,
    TimestampMicrosecondBuilder, TimestampMillisecondArray, TimestampNanosecondArray,
    TimestampSecondArray,
};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use bytes::Bytes;
use chrono::{DateTime, Datelike, NaiveDate};
use ::parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use ::parquet::arrow::ArrowWriter;
use seriesflow_core::{Cell, RowSet};
use std::sync::Arc;

/// Days between 0001-01-01 (CE) and the Unix epoch, for Date32 math.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

#[derive(Clone, Copy, PartialEq)]
enum ColumnKind {
    Utf8,
    Float64,
    Timestamp,
    Date,
}

fn infer_kind(rows: &RowSet, column: &str) -> ColumnKind {
    let Some(cells) = rows.column_cells(column) else {
        return ColumnKind::Utf8;
    };
    for cell in cells {
        match cell {
            Cell::Null => continue,
            Cell::Str(_) => return ColumnKind::Utf8,
            Cell::Num(_) => return ColumnKind::Float64,
            Cell::Time(_) => return ColumnKind::Timestamp,
            Cell::Date(_) => return ColumnKind::Date,
        }
    }
    ColumnKind::Utf8
}

fn build_array(rows: &RowSet, column: &str, kind: ColumnKind) -> Result<ArrayRef> {
    let cells = rows
        .column_cells(column)
        .ok_or_else(|| StorageError::Parquet(format!("missing column '{column}'")))?;
    match kind {
        ColumnKind::Utf8 => {
            let mut builder = StringBuilder::new();
            for cell in cells {
                if cell.is_null() {
                    builder.append_null();
                } else {
                    builder.append_value(cell.render());
                }
            }
            Ok(Arc::new(builder.finish()))
        }
        ColumnKind::Float64 => {
            let mut builder = Float64Builder::new();
            for cell in cells {
                match cell {
                    Cell::Null => builder.append_null(),
                    Cell::Num(n) => builder.append_value(*n),
                    other => {
                        return Err(StorageError::Parquet(format!(
                            "column '{column}': expected number, got '{}'",
                            other.render()
                        )))
                    }
                }
            }
            Ok(Arc::new(builder.finish()))
        }
        ColumnKind::Timestamp => {
            let mut builder = TimestampMicrosecondBuilder::new();
            for cell in cells {
                match cell {
                    Cell::Null => builder.append_null(),
                    Cell::Time(t) => builder.append_value(t.and_utc().timestamp_micros()),
                    Cell::Date(d) => {
                        let midnight = d.and_hms_opt(0, 0, 0).ok_or_else(|| {
                            StorageError::Parquet(format!("column '{column}': bad date"))
                        })?;
                        builder.append_value(midnight.and_utc().timestamp_micros());
                    }
                    other => {
                        return Err(StorageError::Parquet(format!(
                            "column '{column}': expected timestamp, got '{}'",
                            other.render()
                        )))
                    }
                }
            }
            Ok(Arc::new(builder.finish()))
        }
        ColumnKind::Date => {
            let mut builder = Date32Builder::new();
            for cell in cells {
                match cell {
                    Cell::Null => builder.append_null(),
                    Cell::Date(d) => {
                        builder.append_value(d.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE)
                    }
                    Cell::Time(t) => builder
                        .append_value(t.date().num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE),
                    other => {
                        return Err(StorageError::Parquet(format!(
                            "column '{column}': expected date, got '{}'",
                            other.render()
                        )))
                    }
                }
            }
            Ok(Arc::new(builder.finish()))
        }
    }
}

/// Encode a row set as parquet bytes.
pub fn rowset_to_parquet_bytes(rows: &RowSet) -> Result<Bytes> {
    if rows.columns().is_empty() {
        return Err(StorageError::Parquet("row set has no columns".into()));
    }
    let mut fields = Vec::with_capacity(rows.columns().len());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(rows.columns().len());
    for column in rows.columns() {
        let kind = infer_kind(rows, column);
        let dtype = match kind {
            ColumnKind::Utf8 => DataType::Utf8,
            ColumnKind::Float64 => DataType::Float64,
            ColumnKind::Timestamp => DataType::Timestamp(TimeUnit::Microsecond, None),
            ColumnKind::Date => DataType::Date32,
        };
        fields.push(Field::new(column, dtype, true));
        arrays.push(build_array(rows, column, kind)?);
    }
    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), arrays)
        .map_err(|e| StorageError::Parquet(e.to_string()))?;

    let mut buffer = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buffer, schema, None)
        .map_err(|e| StorageError::Parquet(e.to_string()))?;
    writer
        .write(&batch)
        .map_err(|e| StorageError::Parquet(e.to_string()))?;
    writer
        .close()
        .map_err(|e| StorageError::Parquet(e.to_string()))?;
    Ok(Bytes::from(buffer))
}

fn timestamp_cell(micros: i64) -> Cell {
    DateTime::from_timestamp_micros(micros)
        .map(|dt| Cell::Time(dt.naive_utc()))
        .unwrap_or(Cell::Null)
}

fn append_column_cells(
    array: &ArrayRef,
    field_name: &str,
    out: &mut Vec<Vec<Cell>>,
) -> Result<()> {
    let cells: Vec<Cell> = match array.data_type() {
        DataType::Utf8 => {
            let arr = array
                .as_any()
                .downcast_ref::<StringArray>()
                .expect("checked data type");
            (0..arr.len())
                .map(|i| {
                    if arr.is_null(i) {
                        Cell::Null
                    } else {
                        Cell::Str(arr.value(i).to_string())
                    }
                })
                .collect()
        }
        DataType::Float64 => {
            let arr = array
                .as_any()
                .downcast_ref::<Float64Array>()
                .expect("checked data type");
            (0..arr.len())
                .map(|i| {
                    if arr.is_null(i) {
                        Cell::Null
                    } else {
                        Cell::Num(arr.value(i))
                    }
                })
                .collect()
        }
        DataType::Int64 => {
            let arr = array
                .as_any()
                .downcast_ref::<Int64Array>()
                .expect("checked data type");
            (0..arr.len())
                .map(|i| {
                    if arr.is_null(i) {
                        Cell::Null
                    } else {
                        Cell::Num(arr.value(i) as f64)
                    }
                })
                .collect()
        }
        DataType::Int32 => {
            let arr = array
                .as_any()
                .downcast_ref::<Int32Array>()
                .expect("checked data type");
            (0..arr.len())
                .map(|i| {
                    if arr.is_null(i) {
                        Cell::Null
                    } else {
                        Cell::Num(arr.value(i) as f64)
                    }
                })
                .collect()
        }
        DataType::Timestamp(unit, _) => {
            let to_micros: Box<dyn Fn(usize) -> Option<i64>> = match unit {
                TimeUnit::Second => {
                    let arr = array
                        .as_any()
                        .downcast_ref::<TimestampSecondArray>()
                        .expect("checked data type");
                    let arr = arr.clone();
                    Box::new(move |i| (!arr.is_null(i)).then(|| arr.value(i) * 1_000_000))
                }
                TimeUnit::Millisecond => {
                    let arr = array
                        .as_any()
                        .downcast_ref::<TimestampMillisecondArray>()
                        .expect("checked data type");
                    let arr = arr.clone();
                    Box::new(move |i| (!arr.is_null(i)).then(|| arr.value(i) * 1_000))
                }
                TimeUnit::Microsecond => {
                    let arr = array
                        .as_any()
                        .downcast_ref::<TimestampMicrosecondArray>()
                        .expect("checked data type");
                    let arr = arr.clone();
                    Box::new(move |i| (!arr.is_null(i)).then(|| arr.value(i)))
                }
                TimeUnit::Nanosecond => {
                    let arr = array
                        .as_any()
                        .downcast_ref::<TimestampNanosecondArray>()
                        .expect("checked data type");
                    let arr = arr.clone();
                    Box::new(move |i| (!arr.is_null(i)).then(|| arr.value(i) / 1_000))
                }
            };
            (0..array.len())
                .map(|i| to_micros(i).map_or(Cell::Null, timestamp_cell))
                .collect()
        }
        DataType::Date32 => {
            let arr = array
                .as_any()
                .downcast_ref::<Date32Array>()
                .expect("checked data type");
            (0..arr.len())
                .map(|i| {
                    if arr.is_null(i) {
                        Cell::Null
                    } else {
                        NaiveDate::from_num_days_from_ce_opt(
                            arr.value(i) + UNIX_EPOCH_DAYS_FROM_CE,
                        )
                        .map_or(Cell::Null, Cell::Date)
                    }
                })
                .collect()
        }
        other => {
            return Err(StorageError::Parquet(format!(
                "unsupported parquet column type {other:?} for '{field_name}'"
            )))
        }
    };

    for (row, cell) in out.iter_mut().zip(cells) {
        row.push(cell);
    }
    Ok(())
}

/// Decode parquet bytes into a row set.
pub fn rowset_from_parquet_bytes(bytes: Bytes) -> Result<RowSet> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(bytes)
        .map_err(|e| StorageError::Parquet(e.to_string()))?;
    let schema = builder.schema().clone();
    let reader = builder
        .build()
        .map_err(|e| StorageError::Parquet(e.to_string()))?;

    let columns: Vec<String> = schema.fields().iter().map(|f| f.name().clone()).collect();
    let mut out = RowSet::new(columns.clone());
    for batch in reader {
        let batch = batch.map_err(|e| StorageError::Parquet(e.to_string()))?;
        let mut rows: Vec<Vec<Cell>> = (0..batch.num_rows())
            .map(|_| Vec::with_capacity(columns.len()))
            .collect();
        for (field, array) in schema.fields().iter().zip(batch.columns()) {
            append_column_cells(array, field.name(), &mut rows)?;
        }
        for row in rows {
            out.push_row(row)
                .map_err(|e| StorageError::Parquet(e.to_string()))?;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(s: &str) -> Cell {
        Cell::Time(
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").expect("valid time"),
        )
    }

    #[test]
    fn round_trip_preserves_cells_and_order() {
        let mut rows = RowSet::new(["obs_time", "value", "internal_series_code", "obs_date"]);
        rows.push_row(vec![
            ts("2024-01-01T12:30:45"),
            Cell::Num(1.5),
            Cell::Str("A".into()),
            Cell::Date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()),
        ])
        .unwrap();
        rows.push_row(vec![Cell::Null, Cell::Num(-2.0), Cell::Null, Cell::Null])
            .unwrap();

        let bytes = rowset_to_parquet_bytes(&rows).unwrap();
        let back = rowset_from_parquet_bytes(bytes).unwrap();

        assert_eq!(back.columns(), rows.columns());
        assert_eq!(back.len(), 2);
        assert_eq!(back.cell(0, "value").unwrap().as_num(), Some(1.5));
        assert_eq!(
            back.cell(0, "obs_time").unwrap().render(),
            rows.cell(0, "obs_time").unwrap().render()
        );
        assert_eq!(
            back.cell(0, "obs_date").unwrap().render(),
            "2024-01-01"
        );
        assert!(back.cell(1, "obs_time").unwrap().is_null());
    }

    #[test]
    fn all_null_column_round_trips_as_strings() {
        let mut rows = RowSet::new(["a", "b"]);
        rows.push_row(vec![Cell::Str("x".into()), Cell::Null]).unwrap();
        let bytes = rowset_to_parquet_bytes(&rows).unwrap();
        let back = rowset_from_parquet_bytes(bytes).unwrap();
        assert!(back.cell(0, "b").unwrap().is_null());
    }

    #[test]
    fn empty_rowset_with_columns_round_trips() {
        let rows = RowSet::new(["key_hash"]);
        let bytes = rowset_to_parquet_bytes(&rows).unwrap();
        let back = rowset_from_parquet_bytes(bytes).unwrap();
        assert!(back.is_empty());
        assert!(back.has_column("key_hash"));
    }

    #[test]
    fn rejects_rowset_without_columns() {
        let rows = RowSet::default();
        assert!(rowset_to_parquet_bytes(&rows).is_err());
    }

    #[test]
    fn mixed_type_column_is_an_error() {
        let mut rows = RowSet::new(["v"]);
        rows.push_row(vec![Cell::Num(1.0)]).unwrap();
        rows.push_row(vec![Cell::Str("oops".into())]).unwrap();
        assert!(rowset_to_parquet_bytes(&rows).is_err());
    }
}
