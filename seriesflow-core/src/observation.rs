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

//! The canonical observation record.

use crate::columns;
use crate::rowset::{Cell, RowSet};
use chrono::NaiveDateTime;

/// One canonical time-series observation, as produced by a normalizer.
///
/// Enrichment columns (`dataset_id`, `provider`, `version`, ...) are added
/// later by the pipeline and live only in the row set.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub obs_time: NaiveDateTime,
    pub value: f64,
    pub internal_series_code: String,
    pub unit: Option<String>,
    pub frequency: Option<String>,
}

impl Observation {
    pub fn new(
        obs_time: NaiveDateTime,
        value: f64,
        internal_series_code: impl Into<String>,
    ) -> Self {
        Self {
            obs_time,
            value,
            internal_series_code: internal_series_code.into(),
            unit: None,
            frequency: None,
        }
    }

    fn into_cells(self) -> Vec<Cell> {
        vec![
            Cell::Time(self.obs_time),
            Cell::Num(self.value),
            Cell::Str(self.internal_series_code),
            self.unit.map_or(Cell::Null, Cell::Str),
            self.frequency.map_or(Cell::Null, Cell::Str),
        ]
    }

    /// Row set over the canonical observation columns.
    pub fn to_rowset(observations: Vec<Observation>) -> RowSet {
        let mut rows = RowSet::new([
            columns::OBS_TIME,
            columns::VALUE,
            columns::INTERNAL_SERIES_CODE,
            columns::UNIT,
            columns::FREQUENCY,
        ]);
        for obs in observations {
            // Arity matches by construction.
            let _ = rows.push_row(obs.into_cells());
        }
        rows
    }
}
