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

//! Append-only event log.
//!
//! One version's rows are written as one parquet file per `(year, month)`
//! partition, then the per-month version index is updated. An event file
//! exists before its version appears in the month index, never the other
//! way around. Any failure rolls back every file written by this run
//! (best effort) and surfaces the original error.

use crate::error::{Result, StorageError};
use crate::paths;
use crate::store::CatalogStore;
use futures::future::join_all;
use seriesflow_core::{columns, Clock, DatasetId, RowSet, VersionStamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Per-month listing of versions whose events touched that month.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventIndex {
    pub dataset_id: String,
    pub year: i32,
    pub month: u32,
    pub versions: Vec<String>,
    pub last_updated: String,
    pub event_count: usize,
}

/// Store for event files and their month indexes.
#[derive(Clone)]
pub struct EventStore {
    store: CatalogStore,
    clock: Arc<dyn Clock>,
}

impl EventStore {
    pub fn new(store: CatalogStore, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Write one version's rows as partitioned event files and update the
    /// affected month indexes. Returns the written keys.
    pub async fn write_events(
        &self,
        dataset: &DatasetId,
        version: &VersionStamp,
        rows: &RowSet,
    ) -> Result<Vec<String>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let prefix = paths::events_prefix(dataset, version);
        let Some(date_col) = columns::find_date_column(rows) else {
            // No date column: single file, no partitioning, no month index.
            let key = paths::event_file_key(&prefix, None);
            self.store.write_rowset(&key, rows).await?;
            info!(dataset = %dataset, key, "wrote date-less event file");
            return Ok(vec![key]);
        };

        let partitions = partition_by_month(rows, date_col)?;

        // Event files go to distinct keys, so the puts can run together.
        let puts = partitions.iter().map(|((year, month), group)| {
            let key = paths::event_file_key(
                &prefix,
                Some(&paths::event_partition_path(*year, *month)),
            );
            let store = self.store.clone();
            async move {
                let result = store.write_rowset(&key, group).await;
                (key, result)
            }
        });
        let results = join_all(puts).await;

        let mut written = Vec::new();
        let mut first_error = None;
        for (key, result) in results {
            match result {
                Ok(()) => written.push(key),
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }
        if let Some(err) = first_error {
            self.rollback(&written).await;
            return Err(err);
        }

        // Month indexes are updated only after every event file landed.
        for (year, month) in partitions.keys() {
            if let Err(err) = self
                .append_to_event_index(dataset, *year, *month, version)
                .await
            {
                self.rollback(&written).await;
                return Err(err);
            }
        }

        written.sort();
        info!(
            dataset = %dataset,
            version = %version,
            files = written.len(),
            rows = rows.len(),
            "wrote event files"
        );
        Ok(written)
    }

    /// Every event file key for a month, sorted.
    ///
    /// Fast path reads the month index and synthesizes canonical keys.
    /// When the index is missing the events root is listed instead, and
    /// the reconstructed index is persisted for the next caller.
    pub async fn list_events_for_month(
        &self,
        dataset: &DatasetId,
        year: i32,
        month: u32,
    ) -> Result<Vec<String>> {
        if let Some(index) = self.read_event_index(dataset, year, month).await? {
            let partition = paths::event_partition_path(year, month);
            let mut keys: Vec<String> = index
                .versions
                .iter()
                .map(|v| {
                    let prefix = paths::events_prefix(dataset, &VersionStamp::new(v.clone()));
                    paths::event_file_key(&prefix, Some(&partition))
                })
                .collect();
            keys.sort();
            return Ok(keys);
        }

        // Slow path: reconstruct from a full listing.
        let all_keys = self.store.list(&paths::events_root(dataset)).await?;
        let suffix = format!("{}part-0.parquet", paths::event_partition_path(year, month));
        let mut matching: Vec<String> = all_keys
            .into_iter()
            .filter(|k| k.ends_with(&suffix))
            .collect();
        matching.sort();

        if !matching.is_empty() {
            let versions: Vec<String> = matching
                .iter()
                .filter_map(|k| paths::version_from_event_key(k))
                .map(|v| v.as_str().to_string())
                .collect();
            if !versions.is_empty() {
                self.write_event_index(dataset, year, month, versions).await?;
                debug!(dataset = %dataset, year, month, "reconstructed event index");
            }
        }
        Ok(matching)
    }

    /// Read one event file's rows; `None` when the key is gone.
    pub async fn read_event_file(&self, key: &str) -> Result<Option<RowSet>> {
        self.store.read_rowset(key).await
    }

    pub async fn read_event_index(
        &self,
        dataset: &DatasetId,
        year: i32,
        month: u32,
    ) -> Result<Option<EventIndex>> {
        let key = paths::event_index_key(dataset, year, month);
        self.store.read_json(&key).await
    }

    async fn write_event_index(
        &self,
        dataset: &DatasetId,
        year: i32,
        month: u32,
        mut versions: Vec<String>,
    ) -> Result<()> {
        versions.sort();
        versions.dedup();
        let index = EventIndex {
            dataset_id: dataset.to_string(),
            year,
            month,
            event_count: versions.len(),
            versions,
            last_updated: self.clock.now_iso(),
        };
        let key = paths::event_index_key(dataset, year, month);
        self.store.write_json(&key, &index).await
    }

    /// Read-modify-write one month's index to include `version`.
    async fn append_to_event_index(
        &self,
        dataset: &DatasetId,
        year: i32,
        month: u32,
        version: &VersionStamp,
    ) -> Result<()> {
        let mut versions = self
            .read_event_index(dataset, year, month)
            .await?
            .map(|i| i.versions)
            .unwrap_or_default();
        if !versions.iter().any(|v| v == version.as_str()) {
            versions.push(version.as_str().to_string());
            self.write_event_index(dataset, year, month, versions).await?;
        }
        Ok(())
    }

    /// Best-effort deletion of this run's event files; errors are logged
    /// and swallowed so the original failure surfaces.
    async fn rollback(&self, keys: &[String]) {
        for key in keys {
            if let Err(e) = self.store.delete(key).await {
                warn!(key, error = %e, "rollback delete failed");
            }
        }
        if !keys.is_empty() {
            warn!(files = keys.len(), "rolled back event files after write failure");
        }
    }
}

/// Split rows into `(year, month)` groups on the date column. A row whose
/// date cannot be read is a bug in the plugin layer, not data to keep.
fn partition_by_month(
    rows: &RowSet,
    date_col: &str,
) -> Result<BTreeMap<(i32, u32), RowSet>> {
    let mut groups: BTreeMap<(i32, u32), Vec<usize>> = BTreeMap::new();
    for row in rows.iter_rows() {
        let Some((year, month)) = row.cell(date_col).year_month() else {
            return Err(StorageError::InvalidRow(format!(
                "row {} has unparseable '{}' value '{}'",
                row.index(),
                date_col,
                row.cell(date_col).render()
            )));
        };
        groups.entry((year, month)).or_default().push(row.index());
    }
    Ok(groups
        .into_iter()
        .map(|(ym, indices)| (ym, rows.select_rows(&indices)))
        .collect())
}
