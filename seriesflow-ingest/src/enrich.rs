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

//! Metadata enrichment of delta rows before they become event files.

use seriesflow_core::{
    columns, resolve_series_code, Cell, Clock, DatasetConfig, RowSet, VersionStamp,
};
use tracing::debug;

/// Add the descriptive columns every event row carries:
/// `dataset_id`, `provider`, `frequency`/`unit` (config fallback when the
/// rows do not carry their own), `source_kind`, `obs_date` derived from
/// `obs_time`, `version`, `vintage_date` and `quality_flag`. Columns are
/// reordered into the canonical order afterwards.
pub fn enrich_metadata(
    rows: RowSet,
    config: &DatasetConfig,
    version: &VersionStamp,
    clock: &dyn Clock,
) -> RowSet {
    let mut rows = rows;
    if rows.is_empty() {
        return rows;
    }

    resolve_series_code(&mut rows, &config.dataset_id);

    rows.set_constant(columns::DATASET_ID, Cell::Str(config.dataset_id.clone()));
    rows.set_constant(
        columns::PROVIDER,
        Cell::Str(config.provider.clone().unwrap_or_default()),
    );
    if !rows.has_column(columns::FREQUENCY) {
        rows.set_constant(columns::FREQUENCY, Cell::Str(config.frequency.clone()));
    }
    if !rows.has_column(columns::UNIT) {
        rows.set_constant(
            columns::UNIT,
            Cell::Str(config.unit.clone().unwrap_or_default()),
        );
    }
    // Every configured source is file-shaped (csv/xlsx).
    rows.set_constant(columns::SOURCE_KIND, Cell::Str("FILE".into()));

    let obs_dates: Vec<Cell> = rows
        .iter_rows()
        .map(|row| {
            row.cell(columns::OBS_TIME)
                .as_datetime_lossy()
                .map(|t| Cell::Date(t.date()))
                .unwrap_or(Cell::Null)
        })
        .collect();
    // Arity always matches: one obs_date per row.
    let _ = rows.set_column(columns::OBS_DATE, obs_dates);

    rows.set_constant(columns::VERSION, Cell::Str(version.as_str().to_string()));
    rows.set_constant(columns::VINTAGE_DATE, Cell::Time(clock.now().naive_utc()));
    rows.set_constant(columns::QUALITY_FLAG, Cell::Str("OK".into()));

    rows.reorder_columns(columns::CANONICAL_ORDER);
    debug!(rows = rows.len(), "enriched rows with metadata");
    rows
}
