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

//! Built-in generic normalizer.
//!
//! Coerces `obs_time` to a timezone-naive datetime and `value` to a
//! number, and drops every row still missing either field. A configured
//! timezone labels the wall-clock values as local time in that fixed
//! offset; the label is stripped again for storage, so the stored digits
//! never change. The event store requires a valid date, so unparseable
//! dates never leave this stage.

use crate::error::{PluginError, PluginResult};
use crate::Normalizer;
use chrono::{FixedOffset, NaiveDate, NaiveDateTime};
use seriesflow_core::{columns, Cell, DatasetConfig, RowSet};
use tracing::info;

pub struct GenericNormalizer;

impl GenericNormalizer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for GenericNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d",
    "%d/%m/%Y",
];

fn coerce_datetime(cell: &Cell) -> Cell {
    match cell {
        Cell::Time(t) => Cell::Time(*t),
        Cell::Date(d) => d.and_hms_opt(0, 0, 0).map_or(Cell::Null, Cell::Time),
        Cell::Str(s) => {
            for format in DATE_FORMATS {
                if let Ok(t) = NaiveDateTime::parse_from_str(s, format) {
                    return Cell::Time(t);
                }
                if let Ok(d) = NaiveDate::parse_from_str(s, format) {
                    return d.and_hms_opt(0, 0, 0).map_or(Cell::Null, Cell::Time);
                }
            }
            Cell::Null
        }
        _ => Cell::Null,
    }
}

fn coerce_number(cell: &Cell) -> Cell {
    match cell {
        Cell::Num(n) => Cell::Num(*n),
        Cell::Str(s) => s.trim().parse::<f64>().map_or(Cell::Null, Cell::Num),
        _ => Cell::Null,
    }
}

/// Parse a `±HH:MM` offset. Named zones are out of scope for the generic
/// normalizer; datasets needing them register their own plugin.
fn parse_offset(tz: &str) -> PluginResult<FixedOffset> {
    let err = || PluginError::Config(format!("timezone '{tz}' is not a fixed ±HH:MM offset"));
    let (sign, rest) = if let Some(rest) = tz.strip_prefix('+') {
        (1i32, rest)
    } else if let Some(rest) = tz.strip_prefix('-') {
        (-1i32, rest)
    } else {
        return Err(err());
    };
    let (hours, minutes) = rest.split_once(':').ok_or_else(err)?;
    let hours: i32 = hours.parse().map_err(|_| err())?;
    let minutes: i32 = minutes.parse().map_err(|_| err())?;
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(err)
}

impl Normalizer for GenericNormalizer {
    fn id(&self) -> &str {
        "generic"
    }

    fn normalize(&self, config: &DatasetConfig, rows: RowSet) -> PluginResult<RowSet> {
        let mut rows = rows;
        let total = rows.len();

        if let Some(cells) = rows.column_cells(columns::OBS_TIME) {
            let mut coerced: Vec<Cell> = cells.into_iter().map(coerce_datetime).collect();

            // A configured timezone labels naive obs_time values as local
            // wall time in that offset; storage stays naive, so attaching
            // and stripping the label leaves the digits untouched.
            if let Some(tz) = config.normalize.timezone.as_deref() {
                let offset = parse_offset(tz)?;
                coerced = coerced
                    .into_iter()
                    .map(|c| match c {
                        Cell::Time(t) => match t.and_local_timezone(offset).single() {
                            Some(localized) => Cell::Time(localized.naive_local()),
                            None => Cell::Null,
                        },
                        other => other,
                    })
                    .collect();
            }
            rows.set_column(columns::OBS_TIME, coerced)
                .map_err(|e| PluginError::Normalize(e.to_string()))?;
        }

        if let Some(cells) = rows.column_cells(columns::VALUE) {
            let coerced: Vec<Cell> = cells.into_iter().map(coerce_number).collect();
            rows.set_column(columns::VALUE, coerced)
                .map_err(|e| PluginError::Normalize(e.to_string()))?;
        }

        let normalized = rows.filter_rows(|row| {
            !row.cell(columns::OBS_TIME).is_null() && !row.cell(columns::VALUE).is_null()
        });
        info!(input = total, output = normalized.len(), "normalized rows");
        Ok(normalized)
    }
}
