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

//! Key-set index: the fingerprints of every published row.
//!
//! Must equal the union of fingerprints across all events referenced by
//! the pointer. When a crash between pointer CAS and index write leaves
//! the two out of sync, `verify_pointer_index_consistency` detects it and
//! `rebuild_index_from_pointer` repairs it from the event log.

use crate::error::{Result, StorageError};
use crate::manifest::ManifestStore;
use crate::paths;
use crate::store::CatalogStore;
use seriesflow_core::{columns, key_fingerprint, Cell, DatasetId, RowSet};
use std::collections::HashSet;
use tracing::{info, warn};

/// Absolute row-count slack tolerated by the consistency check, covering
/// eventually consistent reads during repair.
const CONSISTENCY_TOLERANCE: usize = 10;

/// Store for the key-set index.
#[derive(Clone)]
pub struct IndexStore {
    store: CatalogStore,
}

impl IndexStore {
    pub fn new(store: CatalogStore) -> Self {
        Self { store }
    }

    /// Fingerprints in stored (first-seen) order; `None` before the first
    /// publish.
    pub async fn read_index(&self, dataset: &DatasetId) -> Result<Option<Vec<String>>> {
        let key = paths::index_key(dataset);
        match self.store.read_rowset(&key).await? {
            Some(rows) => Ok(Some(rowset_to_fingerprints(&rows))),
            None => Ok(None),
        }
    }

    pub async fn write_index(&self, dataset: &DatasetId, fingerprints: &[String]) -> Result<()> {
        let key = paths::index_key(dataset);
        let rows = fingerprints_to_rowset(fingerprints);
        self.store.write_rowset(&key, &rows).await
    }

    /// Compare the index size against the current manifest's `rows_total`.
    ///
    /// No pointer and no index is consistent (fresh dataset); no pointer
    /// with a non-empty index is not. A pointer whose manifest is missing
    /// is reported inconsistent so the caller can attempt repair.
    pub async fn verify_pointer_index_consistency(
        &self,
        dataset: &DatasetId,
        manifests: &ManifestStore,
    ) -> Result<bool> {
        let pointer = manifests.read_current_pointer(dataset).await?;
        let index = self.read_index(dataset).await?;

        let Some(pointer) = pointer else {
            return Ok(index.map_or(true, |i| i.is_empty()));
        };

        let Some(manifest) = manifests
            .read_version_manifest(dataset, &pointer.current_version)
            .await?
        else {
            warn!(
                dataset = %dataset,
                version = %pointer.current_version,
                "pointer references a missing manifest"
            );
            return Ok(false);
        };

        let Some(index) = index else {
            return Ok(false);
        };

        let expected = manifest.outputs.rows_total;
        let actual = index.len();
        Ok(expected.abs_diff(actual) <= CONSISTENCY_TOLERANCE)
    }

    /// Reconstruct the index from every event file of versions up to and
    /// including the pointer's, using the key columns recorded in the
    /// current manifest.
    ///
    /// With no pointer there is nothing published, so the repaired index
    /// is empty.
    pub async fn rebuild_index_from_pointer(
        &self,
        dataset: &DatasetId,
        manifests: &ManifestStore,
    ) -> Result<()> {
        let Some(pointer) = manifests.read_current_pointer(dataset).await? else {
            self.write_index(dataset, &[]).await?;
            info!(dataset = %dataset, "no pointer; index reset to empty");
            return Ok(());
        };

        let manifest = manifests
            .read_version_manifest(dataset, &pointer.current_version)
            .await?
            .ok_or_else(|| {
                StorageError::InvalidManifest(format!(
                    "pointer for '{dataset}' references missing version '{}'",
                    pointer.current_version
                ))
            })?;
        let key_columns: Vec<&str> = manifest
            .index
            .key_columns
            .iter()
            .map(String::as_str)
            .collect();

        let all_keys = self.store.list(&paths::events_root(dataset)).await?;
        let mut event_keys: Vec<String> = all_keys
            .into_iter()
            .filter(|k| k.ends_with(".parquet"))
            .filter(|k| {
                paths::version_from_event_key(k)
                    .map(|v| v <= pointer.current_version)
                    .unwrap_or(false)
            })
            .collect();
        event_keys.sort();

        let mut seen = HashSet::new();
        let mut fingerprints = Vec::new();
        for key in &event_keys {
            let Some(rows) = self.store.read_rowset(key).await? else {
                continue;
            };
            for row in rows.iter_rows() {
                let values: Vec<String> =
                    key_columns.iter().map(|c| row.cell(c).render()).collect();
                let fp = key_fingerprint(&values);
                if seen.insert(fp.clone()) {
                    fingerprints.push(fp);
                }
            }
        }

        self.write_index(dataset, &fingerprints).await?;
        info!(
            dataset = %dataset,
            version = %pointer.current_version,
            fingerprints = fingerprints.len(),
            events = event_keys.len(),
            "rebuilt key-set index from pointer"
        );
        Ok(())
    }
}

/// One-column (`key_hash`) row set holding the fingerprints.
pub fn fingerprints_to_rowset(fingerprints: &[String]) -> RowSet {
    let mut rows = RowSet::new([columns::KEY_HASH]);
    for fp in fingerprints {
        let _ = rows.push_row(vec![Cell::Str(fp.clone())]);
    }
    rows
}

/// Fingerprints out of a stored index row set.
pub fn rowset_to_fingerprints(rows: &RowSet) -> Vec<String> {
    rows.column_cells(columns::KEY_HASH)
        .map(|cells| cells.into_iter().map(|c| c.render()).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{
        CurrentPointer, IndexInfo, OutputsInfo, SourceFile, SourceInfo, VersionManifest,
    };
    use seriesflow_core::VersionStamp;

    fn dataset() -> DatasetId {
        DatasetId::new("test_dataset").unwrap()
    }

    fn manifest(version: &str, rows_total: usize) -> VersionManifest {
        VersionManifest {
            dataset_id: "test_dataset".into(),
            version: VersionStamp::new(version),
            created_at: "2024-01-01T00:00:00+00:00".into(),
            source: SourceInfo {
                files: vec![SourceFile {
                    path: None,
                    sha256: "h".into(),
                    size: 1,
                }],
            },
            outputs: OutputsInfo {
                data_prefix: "p/".into(),
                files: vec![],
                rows_total,
                rows_added_this_version: rows_total,
            },
            index: IndexInfo {
                path: "datasets/test_dataset/index/keys.parquet".into(),
                key_columns: vec!["obs_time".into(), "internal_series_code".into()],
                hash_column: "key_hash".into(),
            },
        }
    }

    #[tokio::test]
    async fn index_round_trip_preserves_order() {
        let index = IndexStore::new(CatalogStore::in_memory());
        let fps = vec!["b".to_string(), "a".to_string()];
        index.write_index(&dataset(), &fps).await.unwrap();
        assert_eq!(index.read_index(&dataset()).await.unwrap().unwrap(), fps);
    }

    #[tokio::test]
    async fn fresh_dataset_is_consistent() {
        let store = CatalogStore::in_memory();
        let index = IndexStore::new(store.clone());
        let manifests = ManifestStore::new(store);
        assert!(index
            .verify_pointer_index_consistency(&dataset(), &manifests)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn index_without_pointer_is_inconsistent() {
        let store = CatalogStore::in_memory();
        let index = IndexStore::new(store.clone());
        let manifests = ManifestStore::new(store);
        index
            .write_index(&dataset(), &["x".to_string()])
            .await
            .unwrap();
        assert!(!index
            .verify_pointer_index_consistency(&dataset(), &manifests)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn detects_row_count_drift_beyond_tolerance() {
        let store = CatalogStore::in_memory();
        let index = IndexStore::new(store.clone());
        let manifests = ManifestStore::new(store);
        let d = dataset();

        manifests
            .write_version_manifest(&d, &manifest("v1", 20))
            .await
            .unwrap();
        manifests
            .put_current_pointer(
                &d,
                &CurrentPointer {
                    dataset_id: d.to_string(),
                    current_version: VersionStamp::new("v1"),
                },
                None,
            )
            .await
            .unwrap();

        // 5 rows vs 20 expected: outside the ±10 tolerance.
        let fps: Vec<String> = (0..5).map(|i| format!("fp{i}")).collect();
        index.write_index(&d, &fps).await.unwrap();
        assert!(!index
            .verify_pointer_index_consistency(&d, &manifests)
            .await
            .unwrap());

        // 12 rows vs 20 expected: inside the tolerance.
        let fps: Vec<String> = (0..12).map(|i| format!("fp{i}")).collect();
        index.write_index(&d, &fps).await.unwrap();
        assert!(index
            .verify_pointer_index_consistency(&d, &manifests)
            .await
            .unwrap());
    }
}
