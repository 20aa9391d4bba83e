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

//! Recovery-path tests across the event log, manifests and key-set index:
//! rollback of partially written events and index rebuild from the
//! pointer.


use failing_store::FailingStore;
use seriesflow_core::{Cell, DatasetId, ManualClock, RowSet, VersionStamp};
use seriesflow_storage::{
    CatalogStore, CurrentPointer, EventStore, IndexInfo, IndexStore, ManifestStore, OutputsInfo,
    SourceFile, SourceInfo, VersionManifest,
};
use std::sync::Arc;

fn dataset() -> DatasetId {
    DatasetId::new("test_dataset").unwrap()
}

fn rows_for_months(entries: &[(&str, f64, &str)]) -> RowSet {
    let mut rows = RowSet::new(["obs_time", "value", "internal_series_code"]);
    for (time, value, series) in entries {
        rows.push_row(vec![
            Cell::Time(
                chrono::NaiveDateTime::parse_from_str(time, "%Y-%m-%dT%H:%M:%S").unwrap(),
            ),
            Cell::Num(*value),
            Cell::Str(series.to_string()),
        ])
        .unwrap();
    }
    rows
}

fn manifest_for(
    dataset: &DatasetId,
    version: &VersionStamp,
    files: Vec<String>,
    rows_total: usize,
    rows_added: usize,
) -> VersionManifest {
    VersionManifest {
        dataset_id: dataset.to_string(),
        version: version.clone(),
        created_at: "2024-01-01T00:00:00+00:00".into(),
        source: SourceInfo {
            files: vec![SourceFile {
                path: None,
                sha256: "feed".into(),
                size: 1,
            }],
        },
        outputs: OutputsInfo {
            data_prefix: format!("datasets/{dataset}/events/{version}/data/"),
            files,
            rows_total,
            rows_added_this_version: rows_added,
        },
        index: IndexInfo {
            path: format!("datasets/{dataset}/index/keys.parquet"),
            key_columns: vec!["obs_time".into(), "internal_series_code".into()],
            hash_column: "key_hash".into(),
        },
    }
}

#[tokio::test]
async fn failed_event_put_rolls_back_all_files_of_the_run() {
    let failing = Arc::new(FailingStore::wrapping_memory());
    let store = CatalogStore::new(failing.clone());
    let events = EventStore::new(store.clone(), Arc::new(ManualClock::epoch_2024()));
    let d = dataset();

    // Three months → three event files; the second put dies.
    failing.fail_on_put(2, Some(&format!("datasets/{d}/events/")));
    let rows = rows_for_months(&[
        ("2024-01-01T00:00:00", 1.0, "A"),
        ("2024-02-01T00:00:00", 2.0, "A"),
        ("2024-03-01T00:00:00", 3.0, "B"),
    ]);
    let version = VersionStamp::new("2024-04-01T00-00-00");
    let err = events.write_events(&d, &version, &rows).await;
    assert!(err.is_err());

    // Every file of this run was deleted and no month index was written.
    failing.disable_failures();
    assert!(store.list("datasets").await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_index_update_rolls_back_event_files() {
    let failing = Arc::new(FailingStore::wrapping_memory());
    let store = CatalogStore::new(failing.clone());
    let events = EventStore::new(store.clone(), Arc::new(ManualClock::epoch_2024()));
    let d = dataset();

    // One event file, then the month-index put fails.
    failing.fail_on_put(2, Some(&format!("datasets/{d}/events/")));
    let rows = rows_for_months(&[("2024-01-01T00:00:00", 1.0, "A")]);
    let version = VersionStamp::new("2024-04-01T00-00-00");
    assert!(events.write_events(&d, &version, &rows).await.is_err());

    failing.disable_failures();
    assert!(store.list("datasets").await.unwrap().is_empty());
}

#[tokio::test]
async fn stale_index_is_detected_and_rebuilt_from_pointer() {
    let store = CatalogStore::in_memory();
    let clock = Arc::new(ManualClock::epoch_2024());
    let events = EventStore::new(store.clone(), clock.clone());
    let manifests = ManifestStore::new(store.clone());
    let index = IndexStore::new(store.clone());
    let d = dataset();

    // Version 1: two rows in January.
    let v1 = VersionStamp::new("2024-02-01T00-00-00");
    let v1_rows = rows_for_months(&[
        ("2024-01-01T00:00:00", 1.0, "A"),
        ("2024-01-02T00:00:00", 2.0, "A"),
    ]);
    let v1_files = events.write_events(&d, &v1, &v1_rows).await.unwrap();
    manifests
        .write_version_manifest(&d, &manifest_for(&d, &v1, v1_files, 2, 2))
        .await
        .unwrap();
    manifests
        .put_current_pointer(
            &d,
            &CurrentPointer {
                dataset_id: d.to_string(),
                current_version: v1.clone(),
            },
            None,
        )
        .await
        .unwrap();

    // Version 2 published its events and manifest and swapped the
    // pointer, but crashed before the index write: the index still only
    // reflects v1 (here: an index that is simply absent).
    let v2 = VersionStamp::new("2024-03-01T00-00-00");
    let v2_rows = rows_for_months(&[
        ("2024-01-03T00:00:00", 3.0, "B"),
        ("2024-02-01T00:00:00", 4.0, "B"),
    ]);
    let v2_files = events.write_events(&d, &v2, &v2_rows).await.unwrap();
    manifests
        .write_version_manifest(&d, &manifest_for(&d, &v2, v2_files, 4, 2))
        .await
        .unwrap();
    let etag = manifests.current_pointer_etag(&d).await.unwrap().unwrap();
    manifests
        .put_current_pointer(
            &d,
            &CurrentPointer {
                dataset_id: d.to_string(),
                current_version: v2.clone(),
            },
            Some(&etag),
        )
        .await
        .unwrap();

    assert!(!index
        .verify_pointer_index_consistency(&d, &manifests)
        .await
        .unwrap());

    index.rebuild_index_from_pointer(&d, &manifests).await.unwrap();

    let fingerprints = index.read_index(&d).await.unwrap().unwrap();
    assert_eq!(fingerprints.len(), 4);
    assert!(index
        .verify_pointer_index_consistency(&d, &manifests)
        .await
        .unwrap());
}

#[tokio::test]
async fn rebuild_ignores_versions_newer_than_the_pointer() {
    let store = CatalogStore::in_memory();
    let clock = Arc::new(ManualClock::epoch_2024());
    let events = EventStore::new(store.clone(), clock.clone());
    let manifests = ManifestStore::new(store.clone());
    let index = IndexStore::new(store.clone());
    let d = dataset();

    let v1 = VersionStamp::new("2024-02-01T00-00-00");
    let v1_rows = rows_for_months(&[("2024-01-01T00:00:00", 1.0, "A")]);
    let v1_files = events.write_events(&d, &v1, &v1_rows).await.unwrap();
    manifests
        .write_version_manifest(&d, &manifest_for(&d, &v1, v1_files, 1, 1))
        .await
        .unwrap();
    manifests
        .put_current_pointer(
            &d,
            &CurrentPointer {
                dataset_id: d.to_string(),
                current_version: v1.clone(),
            },
            None,
        )
        .await
        .unwrap();

    // Orphaned event files from a run that lost its CAS: lexically newer
    // than the pointer, must not leak into the rebuilt index.
    let orphan = VersionStamp::new("2024-03-01T00-00-00");
    let orphan_rows = rows_for_months(&[("2024-01-09T00:00:00", 9.0, "Z")]);
    events.write_events(&d, &orphan, &orphan_rows).await.unwrap();

    index.rebuild_index_from_pointer(&d, &manifests).await.unwrap();
    let fingerprints = index.read_index(&d).await.unwrap().unwrap();
    assert_eq!(fingerprints.len(), 1);
}
