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

//! Projection windows and their write-ahead staging.
//!
//! A series' monthly window is written to a `.tmp/` key first and only
//! promoted (copy, then delete staging) once every window of the month
//! staged successfully, so the final key is always observable-or-invisible.
//! The consolidation manifest (`in_progress`/`completed`) makes the whole
//! month idempotent across restarts.

use crate::error::Result;
use crate::paths;
use crate::store::CatalogStore;
use seriesflow_core::{Clock, DatasetId, RowSet};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsolidationStatus {
    InProgress,
    Completed,
}

/// Idempotency marker for one month's consolidation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidationManifest {
    pub dataset_id: String,
    pub year: i32,
    pub month: u32,
    pub status: ConsolidationStatus,
    pub timestamp: String,
}

/// Store for series projections and consolidation manifests.
#[derive(Clone)]
pub struct ProjectionStore {
    store: CatalogStore,
    clock: Arc<dyn Clock>,
}

impl ProjectionStore {
    pub fn new(store: CatalogStore, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn read_series_projection(
        &self,
        dataset: &DatasetId,
        series_code: &str,
        year: i32,
        month: u32,
    ) -> Result<Option<RowSet>> {
        let key = paths::projection_series_key(dataset, series_code, year, month);
        self.store.read_rowset(&key).await
    }

    /// Stage one series' window at its `.tmp/` key.
    pub async fn write_series_projection_temp(
        &self,
        dataset: &DatasetId,
        series_code: &str,
        year: i32,
        month: u32,
        rows: &RowSet,
    ) -> Result<()> {
        let key = paths::projection_series_temp_key(dataset, series_code, year, month);
        self.store.write_rowset(&key, rows).await
    }

    /// Promote a staged window: copy to the final key, then delete the
    /// staging key. Copy errors propagate; the staging delete is
    /// best-effort.
    pub async fn promote_series_projection(
        &self,
        dataset: &DatasetId,
        series_code: &str,
        year: i32,
        month: u32,
    ) -> Result<()> {
        let temp_key = paths::projection_series_temp_key(dataset, series_code, year, month);
        let final_key = paths::projection_series_key(dataset, series_code, year, month);
        self.store.copy(&temp_key, &final_key).await?;
        if let Err(e) = self.store.delete(&temp_key).await {
            warn!(key = temp_key, error = %e, "failed to delete staging key");
        }
        Ok(())
    }

    /// Delete every staging key of a month, across all series. Errors are
    /// swallowed; leftover staging files only cost space.
    pub async fn cleanup_temp(&self, dataset: &DatasetId, year: i32, month: u32) -> Result<()> {
        let prefix = paths::projections_windows_prefix(dataset);
        let marker = format!("year={year}/month={month:02}/.tmp/");
        let keys = self.store.list(&prefix).await?;
        for key in keys.into_iter().filter(|k| k.contains(&marker)) {
            if let Err(e) = self.store.delete(&key).await {
                warn!(key, error = %e, "failed to delete stale staging key");
            } else {
                debug!(key, "removed stale staging key");
            }
        }
        Ok(())
    }

    pub async fn read_consolidation_manifest(
        &self,
        dataset: &DatasetId,
        year: i32,
        month: u32,
    ) -> Result<Option<ConsolidationManifest>> {
        let key = paths::consolidation_manifest_key(dataset, year, month);
        self.store.read_json(&key).await
    }

    pub async fn write_consolidation_manifest(
        &self,
        dataset: &DatasetId,
        year: i32,
        month: u32,
        status: ConsolidationStatus,
    ) -> Result<()> {
        let manifest = ConsolidationManifest {
            dataset_id: dataset.to_string(),
            year,
            month,
            status,
            timestamp: self.clock.now_iso(),
        };
        let key = paths::consolidation_manifest_key(dataset, year, month);
        self.store.write_json(&key, &manifest).await
    }

    /// Months whose consolidation manifest is stuck at `in_progress`,
    /// ascending. These are re-entered by the next run regardless of
    /// whether it carries new data for them.
    pub async fn list_incomplete_months(&self, dataset: &DatasetId) -> Result<Vec<(i32, u32)>> {
        let keys = self.store.list(&paths::consolidation_prefix(dataset)).await?;
        let mut months = Vec::new();
        for key in keys {
            let Some((year, month)) = paths::month_from_consolidation_key(&key) else {
                continue;
            };
            if let Some(manifest) = self.read_consolidation_manifest(dataset, year, month).await? {
                if manifest.status == ConsolidationStatus::InProgress {
                    months.push((year, month));
                }
            }
        }
        months.sort_unstable();
        Ok(months)
    }

    /// True when the month's manifest says `completed`.
    pub async fn is_consolidated(
        &self,
        dataset: &DatasetId,
        year: i32,
        month: u32,
    ) -> Result<bool> {
        Ok(self
            .read_consolidation_manifest(dataset, year, month)
            .await?
            .map(|m| m.status == ConsolidationStatus::Completed)
            .unwrap_or(false))
    }
}
