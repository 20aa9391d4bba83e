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

//! Built-in CSV parser.
//!
//! Two shapes are supported, selected by `parse_config`:
//!
//! - **Long format** (default): one observation per line. `date_col`
//!   (default `obs_time`), `value_col` (default `value`) and an optional
//!   `series_col` name the source columns.
//! - **Wide format** (`series_map` set): one date column plus one column
//!   per series; each map entry pins a source column to an
//!   `internal_series_code` with optional unit/frequency.
//!
//! Values are passed through as raw strings (empty → null); type coercion
//! belongs to the normalizer.

use crate::error::{PluginError, PluginResult};
use crate::Parser;
use ::csv::ReaderBuilder;
use seriesflow_core::{columns, Cell, DatasetConfig, ParseOptions, RowSet};
use tracing::debug;

pub struct CsvParser;

impl CsvParser {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CsvParser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser for CsvParser {
    fn id(&self) -> &str {
        "csv"
    }

    fn parse(&self, config: &DatasetConfig, raw: &[u8]) -> PluginResult<RowSet> {
        let options = config.parse_config.clone().unwrap_or_default();
        let delimiter = options.delimiter.unwrap_or(',') as u8;

        // header_row skips leading junk lines before the header itself.
        let skip_lines = config.source.header_row.unwrap_or(0);
        let body = skip_leading_lines(raw, skip_lines);

        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .trim(::csv::Trim::All)
            .from_reader(body);
        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| PluginError::Parse(format!("bad csv header: {e}")))?
            .iter()
            .map(str::to_string)
            .collect();

        let records: Vec<Vec<String>> = reader
            .records()
            .map(|r| {
                r.map(|record| record.iter().map(str::to_string).collect())
                    .map_err(|e| PluginError::Parse(format!("bad csv record: {e}")))
            })
            .collect::<PluginResult<_>>()?;

        let rows = match options.series_map.as_deref() {
            Some(series_map) => parse_wide(&headers, &records, &options, series_map)?,
            None => parse_long(&headers, &records, &options)?,
        };
        debug!(rows = rows.len(), "parsed csv source");
        Ok(rows)
    }
}

fn skip_leading_lines(raw: &[u8], lines: usize) -> &[u8] {
    let mut rest = raw;
    for _ in 0..lines {
        match rest.iter().position(|&b| b == b'\n') {
            Some(pos) => rest = &rest[pos + 1..],
            None => return &[],
        }
    }
    rest
}

fn column_position(headers: &[String], name: &str) -> PluginResult<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| PluginError::Config(format!("source column '{name}' not found in header")))
}

fn raw_cell(value: &str) -> Cell {
    if value.is_empty() {
        Cell::Null
    } else {
        Cell::Str(value.to_string())
    }
}

fn parse_long(
    headers: &[String],
    records: &[Vec<String>],
    options: &ParseOptions,
) -> PluginResult<RowSet> {
    let date_col = options.date_col.as_deref().unwrap_or(columns::OBS_TIME);
    let value_col = options.value_col.as_deref().unwrap_or(columns::VALUE);
    let date_pos = column_position(headers, date_col)?;
    let value_pos = column_position(headers, value_col)?;
    let series_pos = options
        .series_col
        .as_deref()
        .map(|name| column_position(headers, name))
        .transpose()?;

    let mut out = if series_pos.is_some() {
        RowSet::new([columns::OBS_TIME, columns::VALUE, columns::INTERNAL_SERIES_CODE])
    } else {
        RowSet::new([columns::OBS_TIME, columns::VALUE])
    };
    for record in records {
        let mut cells = vec![
            raw_cell(record.get(date_pos).map_or("", String::as_str)),
            raw_cell(record.get(value_pos).map_or("", String::as_str)),
        ];
        if let Some(pos) = series_pos {
            cells.push(raw_cell(record.get(pos).map_or("", String::as_str)));
        }
        out.push_row(cells)
            .map_err(|e| PluginError::Parse(e.to_string()))?;
    }
    Ok(out)
}

fn parse_wide(
    headers: &[String],
    records: &[Vec<String>],
    options: &ParseOptions,
    series_map: &[seriesflow_core::SeriesMapEntry],
) -> PluginResult<RowSet> {
    let date_col = options
        .date_col
        .as_deref()
        .ok_or_else(|| PluginError::Config("series_map requires date_col".into()))?;
    let date_pos = column_position(headers, date_col)?;

    let mut out = RowSet::new([
        columns::OBS_TIME,
        columns::VALUE,
        columns::INTERNAL_SERIES_CODE,
        columns::UNIT,
        columns::FREQUENCY,
    ]);
    for entry in series_map {
        let value_pos = column_position(headers, &entry.column)?;
        for record in records {
            let value = raw_cell(record.get(value_pos).map_or("", String::as_str));
            if value.is_null() {
                continue;
            }
            out.push_row(vec![
                raw_cell(record.get(date_pos).map_or("", String::as_str)),
                value,
                Cell::Str(entry.internal_series_code.clone()),
                entry.unit.clone().map_or(Cell::Null, Cell::Str),
                entry.frequency.clone().map_or(Cell::Null, Cell::Str),
            ])
            .map_err(|e| PluginError::Parse(e.to_string()))?;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use seriesflow_core::{
        NormalizeSection, ParseSection, SeriesMapEntry, SourceConfig, SourceFormat, SourceKind,
    };

    fn config(parse_config: Option<ParseOptions>, header_row: Option<usize>) -> DatasetConfig {
        DatasetConfig {
            dataset_id: "test_dataset".into(),
            frequency: "daily".into(),
            lag_days: 0,
            source: SourceConfig {
                kind: SourceKind::Http,
                url: Some("https://example.com/x.csv".into()),
                format: SourceFormat::Csv,
                sheet: None,
                header_row,
            },
            parse: ParseSection {
                plugin: Some("csv".into()),
            },
            normalize: NormalizeSection {
                plugin: Some("generic".into()),
                primary_keys: vec!["obs_time".into()],
                timezone: None,
            },
            notify: None,
            provider: None,
            unit: None,
            plugin: None,
            parse_config,
        }
    }

    #[test]
    fn long_format_with_series_column() {
        let csv_data = b"obs_time,value,series\n2024-01-01,1.5,A\n2024-01-02,2.5,B\n";
        let options = ParseOptions {
            series_col: Some("series".into()),
            ..Default::default()
        };
        let rows = CsvParser::new()
            .parse(&config(Some(options), None), csv_data)
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows.cell(0, "obs_time").unwrap().render(), "2024-01-01");
        assert_eq!(rows.cell(1, "internal_series_code").unwrap().render(), "B");
    }

    #[test]
    fn long_format_without_options_uses_canonical_headers() {
        let csv_data = b"obs_time,value\n2024-01-01,1\n";
        let rows = CsvParser::new().parse(&config(None, None), csv_data).unwrap();
        assert_eq!(rows.len(), 1);
        assert!(!rows.has_column("internal_series_code"));
    }

    #[test]
    fn wide_format_emits_one_row_per_series_cell() {
        let csv_data = b"fecha,ipc,rem\n2024-01-01,100.1,7.5\n2024-02-01,101.2,\n";
        let options = ParseOptions {
            date_col: Some("fecha".into()),
            series_map: Some(vec![
                SeriesMapEntry {
                    column: "ipc".into(),
                    internal_series_code: "IPC_NG".into(),
                    unit: Some("index".into()),
                    frequency: Some("monthly".into()),
                },
                SeriesMapEntry {
                    column: "rem".into(),
                    internal_series_code: "REM_TPM".into(),
                    unit: None,
                    frequency: None,
                },
            ]),
            ..Default::default()
        };
        let rows = CsvParser::new()
            .parse(&config(Some(options), None), csv_data)
            .unwrap();
        // Empty rem cell for February is skipped.
        assert_eq!(rows.len(), 3);
        assert_eq!(rows.cell(2, "internal_series_code").unwrap().render(), "REM_TPM");
        assert_eq!(rows.cell(0, "unit").unwrap().render(), "index");
    }

    #[test]
    fn header_row_skips_leading_lines() {
        let csv_data = b"junk line\nanother\nobs_time,value\n2024-01-01,1\n";
        let rows = CsvParser::new()
            .parse(&config(None, Some(2)), csv_data)
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn missing_column_is_a_config_error() {
        let csv_data = b"a,b\n1,2\n";
        let err = CsvParser::new().parse(&config(None, None), csv_data).unwrap_err();
        assert!(matches!(err, PluginError::Config(_)));
    }
}
