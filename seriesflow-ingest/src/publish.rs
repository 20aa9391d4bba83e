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

//! Publication protocol.
//!
//! Ordering is the whole point:
//!
//! 1. write the immutable version manifest (unconditional, unique key),
//! 2. CAS-swap the current pointer against the prior etag,
//! 3. only then write the updated key-set index.
//!
//! A failed CAS means another writer won: nothing else is touched and the
//! run's event files stay behind as unreferenced garbage. A crash between
//! 2 and 3 leaves the repairable stale-index state that
//! `IndexStore::rebuild_index_from_pointer` recovers from.

use crate::delta::update_index;
use seriesflow_core::{
    columns, Clock, DatasetId, Result, RowSet, VersionStamp,
};
use seriesflow_storage::{
    paths, CurrentPointer, IndexInfo, IndexStore, ManifestStore, OutputsInfo, SourceFile,
    SourceInfo, StorageError, VersionManifest,
};
use tracing::{info, warn};

/// How a publish attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Pointer advanced; `rows_total` is the index size after publish.
    Published { rows_total: usize },
    /// Nothing to publish (zero rows added).
    Skipped,
    /// Another writer swapped the pointer first.
    LostRace,
}

/// Publishes versions atomically through the pointer CAS.
pub struct VersionPublisher {
    manifests: ManifestStore,
    index: IndexStore,
    clock: std::sync::Arc<dyn Clock>,
}

impl VersionPublisher {
    pub fn new(
        manifests: ManifestStore,
        index: IndexStore,
        clock: std::sync::Arc<dyn Clock>,
    ) -> Self {
        Self {
            manifests,
            index,
            clock,
        }
    }

    /// Publish one version. `delta` must still carry its `key_hash`
    /// column; `prior_pointer_etag` is the etag observed before the run
    /// wrote anything (None on first publish).
    #[allow(clippy::too_many_arguments)]
    pub async fn publish(
        &self,
        dataset: &DatasetId,
        version: &VersionStamp,
        source_file: SourceFile,
        output_keys: Vec<String>,
        rows_added: usize,
        primary_keys: &[String],
        prior_index: Option<&[String]>,
        delta: &RowSet,
        prior_pointer_etag: Option<&str>,
    ) -> Result<PublishOutcome> {
        if rows_added == 0 {
            info!(dataset = %dataset, "skipping publish: 0 rows added");
            return Ok(PublishOutcome::Skipped);
        }

        let new_index = update_index(prior_index, delta);
        let rows_total = new_index.len();

        let manifest = VersionManifest {
            dataset_id: dataset.to_string(),
            version: version.clone(),
            created_at: self.clock.now_iso(),
            source: SourceInfo {
                files: vec![source_file],
            },
            outputs: OutputsInfo {
                data_prefix: paths::events_prefix(dataset, version),
                files: output_keys,
                rows_total,
                rows_added_this_version: rows_added,
            },
            index: IndexInfo {
                path: paths::index_key(dataset),
                key_columns: primary_keys.to_vec(),
                hash_column: columns::KEY_HASH.to_string(),
            },
        };
        self.manifests.write_version_manifest(dataset, &manifest).await?;

        let pointer = CurrentPointer {
            dataset_id: dataset.to_string(),
            current_version: version.clone(),
        };
        match self
            .manifests
            .put_current_pointer(dataset, &pointer, prior_pointer_etag)
            .await
        {
            Ok(_) => {}
            Err(StorageError::Precondition(_)) => {
                // Lost the race. The pointer and index are untouched; the
                // event files of this run remain unreferenced.
                warn!(dataset = %dataset, version = %version, "pointer CAS lost");
                return Ok(PublishOutcome::LostRace);
            }
            Err(e) => return Err(e.into()),
        }

        // The index write happens strictly after a successful CAS. A
        // failure here leaves the consistent-pointer/stale-index state.
        self.index.write_index(dataset, &new_index).await?;

        info!(dataset = %dataset, version = %version, rows_total, rows_added, "published version");
        Ok(PublishOutcome::Published { rows_total })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::compute_delta;
    use seriesflow_core::{Cell, ManualClock};
    use seriesflow_storage::CatalogStore;
    use std::sync::Arc;

    fn dataset() -> DatasetId {
        DatasetId::new("test_dataset").unwrap()
    }

    fn source_file() -> SourceFile {
        SourceFile {
            path: None,
            sha256: "feed".into(),
            size: 12,
        }
    }

    fn delta_rows(days: &[&str]) -> RowSet {
        let mut rows = RowSet::new(["obs_time", "value"]);
        for day in days {
            rows.push_row(vec![
                Cell::Time(
                    chrono::NaiveDate::parse_from_str(day, "%Y-%m-%d")
                        .unwrap()
                        .and_hms_opt(0, 0, 0)
                        .unwrap(),
                ),
                Cell::Num(1.0),
            ])
            .unwrap();
        }
        compute_delta(&rows, None, &["obs_time".to_string()]).unwrap()
    }

    fn publisher(store: &CatalogStore) -> (VersionPublisher, ManifestStore, IndexStore) {
        let manifests = ManifestStore::new(store.clone());
        let index = IndexStore::new(store.clone());
        let publisher = VersionPublisher::new(
            manifests.clone(),
            index.clone(),
            Arc::new(ManualClock::epoch_2024()),
        );
        (publisher, manifests, index)
    }

    #[tokio::test]
    async fn publishes_manifest_pointer_and_index() {
        let store = CatalogStore::in_memory();
        let (publisher, manifests, index) = publisher(&store);
        let d = dataset();
        let v = VersionStamp::new("2024-01-01T00-00-00");
        let delta = delta_rows(&["2024-01-01", "2024-01-02"]);

        let outcome = publisher
            .publish(
                &d,
                &v,
                source_file(),
                vec!["k1".into()],
                2,
                &["obs_time".to_string()],
                None,
                &delta,
                None,
            )
            .await
            .unwrap();
        assert_eq!(outcome, PublishOutcome::Published { rows_total: 2 });

        let pointer = manifests.read_current_pointer(&d).await.unwrap().unwrap();
        assert_eq!(pointer.current_version, v);
        let manifest = manifests.read_version_manifest(&d, &v).await.unwrap().unwrap();
        assert_eq!(manifest.outputs.rows_total, 2);
        assert_eq!(manifest.outputs.rows_added_this_version, 2);
        assert_eq!(index.read_index(&d).await.unwrap().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn zero_rows_skips_everything() {
        let store = CatalogStore::in_memory();
        let (publisher, manifests, _) = publisher(&store);
        let d = dataset();
        let v = VersionStamp::new("2024-01-01T00-00-00");

        let outcome = publisher
            .publish(
                &d,
                &v,
                source_file(),
                vec![],
                0,
                &["obs_time".to_string()],
                None,
                &RowSet::new(["obs_time", "key_hash"]),
                None,
            )
            .await
            .unwrap();
        assert_eq!(outcome, PublishOutcome::Skipped);
        assert!(manifests.read_current_pointer(&d).await.unwrap().is_none());
        assert!(manifests.read_version_manifest(&d, &v).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn lost_cas_touches_neither_pointer_nor_index() {
        let store = CatalogStore::in_memory();
        let (publisher, manifests, index) = publisher(&store);
        let d = dataset();

        // Runner A publishes first.
        let va = VersionStamp::new("2024-01-01T00-00-00");
        publisher
            .publish(
                &d,
                &va,
                source_file(),
                vec![],
                1,
                &["obs_time".to_string()],
                None,
                &delta_rows(&["2024-01-01"]),
                None,
            )
            .await
            .unwrap();

        // Runner B still holds the pre-A etag observation (None: it saw
        // no pointer at all) and loses.
        let vb = VersionStamp::new("2024-01-01T00-00-01");
        let outcome = publisher
            .publish(
                &d,
                &vb,
                source_file(),
                vec![],
                1,
                &["obs_time".to_string()],
                None,
                &delta_rows(&["2024-01-09"]),
                None,
            )
            .await
            .unwrap();
        assert_eq!(outcome, PublishOutcome::LostRace);

        let pointer = manifests.read_current_pointer(&d).await.unwrap().unwrap();
        assert_eq!(pointer.current_version, va);
        // Index still reflects runner A only.
        assert_eq!(index.read_index(&d).await.unwrap().unwrap().len(), 1);
        // The loser's manifest exists but is unreferenced.
        assert!(manifests.read_version_manifest(&d, &vb).await.unwrap().is_some());
    }
}
