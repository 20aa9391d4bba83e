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

//! Projection consolidator.
//!
//! Rebuilds the per-series monthly windows touched by a publication. A
//! month with new data is always re-consolidated; a month whose
//! consolidation manifest says `completed` is skipped otherwise. Within
//! one month: stale staging files are cleaned, the manifest goes
//! `in_progress`, every event file of the month is folded into per-series
//! deduplicated windows, all windows are staged at `.tmp/` keys, then
//! promoted, then the manifest goes `completed`. A failure cleans the
//! staging keys and leaves the manifest `in_progress` for the next run.

use seriesflow_core::{columns, find_date_column, DatasetConfig, DatasetId, Result, RowSet};
use seriesflow_storage::{ConsolidationStatus, EventStore, ProjectionStore};
use std::collections::BTreeSet;
use tracing::{error, info, warn};

/// Rebuilds per-series monthly projection windows.
pub struct Consolidator {
    events: EventStore,
    projections: ProjectionStore,
}

impl Consolidator {
    pub fn new(events: EventStore, projections: ProjectionStore) -> Self {
        Self {
            events,
            projections,
        }
    }

    /// Consolidate every month the enriched delta touches, in ascending
    /// order. A month that fails is logged and skipped; its manifest
    /// stays `in_progress` so the next run retries it.
    pub async fn consolidate(
        &self,
        config: &DatasetConfig,
        dataset: &DatasetId,
        enriched_delta: &RowSet,
    ) -> Result<()> {
        if enriched_delta.is_empty() {
            return Ok(());
        }
        let Some(date_col) = find_date_column(enriched_delta) else {
            warn!(dataset = %dataset, "no date column found, skipping consolidation");
            return Ok(());
        };
        if !enriched_delta.has_column(columns::INTERNAL_SERIES_CODE) {
            warn!(dataset = %dataset, "no series column found, skipping consolidation");
            return Ok(());
        }

        let affected = affected_months(enriched_delta, date_col);
        if affected.is_empty() {
            info!(dataset = %dataset, "no valid months found, skipping consolidation");
            return Ok(());
        }
        info!(
            dataset = %dataset,
            months = affected.len(),
            "consolidating projections"
        );

        for &(year, month) in &affected {
            if let Err(e) = self
                .consolidate_month(config, dataset, year, month, true)
                .await
            {
                error!(
                    dataset = %dataset,
                    year,
                    month,
                    error = %e,
                    "failed to consolidate month"
                );
            }
        }

        // A crash in an earlier run can leave a month stuck in_progress;
        // re-enter those even when this run carried no data for them.
        let affected_set: BTreeSet<(i32, u32)> = affected.iter().copied().collect();
        for (year, month) in self.projections.list_incomplete_months(dataset).await? {
            if affected_set.contains(&(year, month)) {
                continue;
            }
            info!(dataset = %dataset, year, month, "retrying incomplete consolidation");
            if let Err(e) = self
                .consolidate_month(config, dataset, year, month, false)
                .await
            {
                error!(
                    dataset = %dataset,
                    year,
                    month,
                    error = %e,
                    "failed to consolidate month"
                );
            }
        }
        Ok(())
    }

    /// Consolidate one month. `has_new_data` forces re-consolidation even
    /// when a prior run already completed the month.
    pub async fn consolidate_month(
        &self,
        config: &DatasetConfig,
        dataset: &DatasetId,
        year: i32,
        month: u32,
        has_new_data: bool,
    ) -> Result<()> {
        if !has_new_data
            && self
                .projections
                .is_consolidated(dataset, year, month)
                .await?
        {
            info!(dataset = %dataset, year, month, "month already consolidated, skipping");
            return Ok(());
        }

        self.projections.cleanup_temp(dataset, year, month).await?;
        self.projections
            .write_consolidation_manifest(dataset, year, month, ConsolidationStatus::InProgress)
            .await?;

        let result = self
            .consolidate_month_inner(config, dataset, year, month)
            .await;
        if result.is_err() {
            // Staging keys are garbage now; the manifest stays
            // in_progress so a later run re-enters the month.
            let _ = self.projections.cleanup_temp(dataset, year, month).await;
        }
        result
    }

    async fn consolidate_month_inner(
        &self,
        config: &DatasetConfig,
        dataset: &DatasetId,
        year: i32,
        month: u32,
    ) -> Result<()> {
        let windows = self
            .build_month_windows(config, dataset, year, month)
            .await?;
        if windows.is_empty() {
            warn!(dataset = %dataset, year, month, "no series windows to write");
            return Ok(());
        }

        // Two-phase write: every window staged before any promotion.
        for (series, rows) in &windows {
            self.projections
                .write_series_projection_temp(dataset, series, year, month, rows)
                .await?;
        }
        for (series, _) in &windows {
            self.projections
                .promote_series_projection(dataset, series, year, month)
                .await?;
        }

        self.projections
            .write_consolidation_manifest(dataset, year, month, ConsolidationStatus::Completed)
            .await?;
        info!(
            dataset = %dataset,
            year,
            month,
            series = windows.len(),
            "completed month consolidation"
        );
        Ok(())
    }

    /// Fold every event file of the month into one deduplicated window
    /// per series: newest version wins on primary-key collisions.
    async fn build_month_windows(
        &self,
        config: &DatasetConfig,
        dataset: &DatasetId,
        year: i32,
        month: u32,
    ) -> Result<Vec<(String, RowSet)>> {
        let event_keys = self
            .events
            .list_events_for_month(dataset, year, month)
            .await?;
        if event_keys.is_empty() {
            info!(dataset = %dataset, year, month, "no events found for month");
            return Ok(Vec::new());
        }

        let mut parts = Vec::new();
        for key in &event_keys {
            let rows = match self.events.read_event_file(key).await {
                Ok(Some(rows)) => rows,
                Ok(None) => {
                    warn!(key, "event file listed but missing");
                    continue;
                }
                Err(e) => {
                    warn!(key, error = %e, "failed to read event file");
                    continue;
                }
            };
            if !rows.has_column(columns::INTERNAL_SERIES_CODE) {
                warn!(key, "event file has no series column, skipping");
                continue;
            }
            parts.push(rows);
        }
        if parts.is_empty() {
            return Ok(Vec::new());
        }

        let all = RowSet::concat(&parts);
        let primary_keys: Vec<&str> = config
            .normalize
            .primary_keys
            .iter()
            .map(String::as_str)
            .collect();

        let windows = all
            .group_by(columns::INTERNAL_SERIES_CODE)
            .into_iter()
            .map(|(series, mut rows)| {
                if rows.has_column(columns::VERSION) {
                    rows.sort_desc_by(columns::VERSION);
                }
                (series, rows.drop_duplicates(&primary_keys))
            })
            .collect();
        Ok(windows)
    }
}

/// Distinct `(year, month)` pairs of the delta, ascending; rows whose
/// date fails to parse are dropped here.
fn affected_months(rows: &RowSet, date_col: &str) -> Vec<(i32, u32)> {
    let mut months = BTreeSet::new();
    for row in rows.iter_rows() {
        if let Some(ym) = row.cell(date_col).year_month() {
            months.insert(ym);
        }
    }
    months.into_iter().collect()
}
