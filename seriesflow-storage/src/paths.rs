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

//! Object key layout.
//!
//! Total functions from logical ids to object keys. Month components are
//! zero-padded; series codes are used verbatim and treated as opaque.

use seriesflow_core::{DatasetId, VersionStamp};

/// The current-version pointer, the only mutable key per dataset.
pub fn current_pointer_key(dataset: &DatasetId) -> String {
    format!("datasets/{dataset}/current/manifest.json")
}

/// The key-set index of published fingerprints.
pub fn index_key(dataset: &DatasetId) -> String {
    format!("datasets/{dataset}/index/keys.parquet")
}

/// The immutable manifest of one version.
pub fn version_manifest_key(dataset: &DatasetId, version: &VersionStamp) -> String {
    format!("datasets/{dataset}/events/{version}/manifest.json")
}

/// Root of every event of a dataset.
pub fn events_root(dataset: &DatasetId) -> String {
    format!("datasets/{dataset}/events/")
}

/// Data prefix of one version's event files.
pub fn events_prefix(dataset: &DatasetId, version: &VersionStamp) -> String {
    format!("datasets/{dataset}/events/{version}/data/")
}

/// Hive-style partition path component.
pub fn event_partition_path(year: i32, month: u32) -> String {
    format!("year={year}/month={month:02}/")
}

/// Event file key under a data prefix; no partition path means the
/// date-less single-file layout.
pub fn event_file_key(prefix: &str, partition_path: Option<&str>) -> String {
    match partition_path {
        Some(partition) => format!("{prefix}{partition}part-0.parquet"),
        None => format!("{prefix}part-0.parquet"),
    }
}

/// Per-month secondary index of versions with events in that month.
pub fn event_index_key(dataset: &DatasetId, year: i32, month: u32) -> String {
    format!("datasets/{dataset}/events/index/{year}/{month:02}/versions.json")
}

/// Final key of one series' monthly projection window.
pub fn projection_series_key(
    dataset: &DatasetId,
    series_code: &str,
    year: i32,
    month: u32,
) -> String {
    format!(
        "datasets/{dataset}/projections/windows/{series_code}/year={year}/month={month:02}/data.parquet"
    )
}

/// Write-ahead staging key of one series' monthly projection window.
pub fn projection_series_temp_key(
    dataset: &DatasetId,
    series_code: &str,
    year: i32,
    month: u32,
) -> String {
    format!(
        "datasets/{dataset}/projections/windows/{series_code}/year={year}/month={month:02}/.tmp/data.parquet"
    )
}

/// Root of every projection window of a dataset.
pub fn projections_windows_prefix(dataset: &DatasetId) -> String {
    format!("datasets/{dataset}/projections/windows/")
}

/// Consolidation manifest driving projection idempotency.
pub fn consolidation_manifest_key(dataset: &DatasetId, year: i32, month: u32) -> String {
    format!("datasets/{dataset}/projections/consolidation/{year}/{month:02}/manifest.json")
}

/// Root of every consolidation manifest of a dataset.
pub fn consolidation_prefix(dataset: &DatasetId) -> String {
    format!("datasets/{dataset}/projections/consolidation/")
}

/// Extract `(year, month)` from a consolidation manifest key.
pub fn month_from_consolidation_key(key: &str) -> Option<(i32, u32)> {
    let parts: Vec<&str> = key.split('/').collect();
    let i = parts.iter().position(|p| *p == "consolidation")?;
    let year: i32 = parts.get(i + 1)?.parse().ok()?;
    let month: u32 = parts.get(i + 2)?.parse().ok()?;
    Some((year, month))
}

/// Manifest path relative to the bucket (leading `datasets/` stripped),
/// as carried in consumer notifications.
pub fn manifest_pointer(dataset: &DatasetId, version: &VersionStamp) -> String {
    format!("{dataset}/events/{version}/manifest.json")
}

/// Extract the version stamp from an event file key
/// (`datasets/{id}/events/{version}/...`).
pub fn version_from_event_key(key: &str) -> Option<VersionStamp> {
    let parts: Vec<&str> = key.split('/').collect();
    parts
        .iter()
        .position(|p| *p == "events")
        .and_then(|i| parts.get(i + 1))
        .filter(|v| **v != "index")
        .map(|v| VersionStamp::new(*v))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> DatasetId {
        DatasetId::new("bcra_rem").unwrap()
    }

    #[test]
    fn keys_follow_layout() {
        let d = dataset();
        let v = VersionStamp::new("2024-01-01T00-00-00");
        assert_eq!(
            current_pointer_key(&d),
            "datasets/bcra_rem/current/manifest.json"
        );
        assert_eq!(index_key(&d), "datasets/bcra_rem/index/keys.parquet");
        assert_eq!(
            version_manifest_key(&d, &v),
            "datasets/bcra_rem/events/2024-01-01T00-00-00/manifest.json"
        );
        assert_eq!(
            event_file_key(&events_prefix(&d, &v), Some(&event_partition_path(2024, 3))),
            "datasets/bcra_rem/events/2024-01-01T00-00-00/data/year=2024/month=03/part-0.parquet"
        );
        assert_eq!(
            event_file_key(&events_prefix(&d, &v), None),
            "datasets/bcra_rem/events/2024-01-01T00-00-00/data/part-0.parquet"
        );
        assert_eq!(
            event_index_key(&d, 2024, 3),
            "datasets/bcra_rem/events/index/2024/03/versions.json"
        );
    }

    #[test]
    fn months_are_zero_padded() {
        let d = dataset();
        assert!(projection_series_key(&d, "A", 2024, 1).contains("month=01"));
        assert!(consolidation_manifest_key(&d, 2024, 9).ends_with("2024/09/manifest.json"));
    }

    #[test]
    fn month_extraction_from_consolidation_key() {
        let key = "datasets/bcra_rem/projections/consolidation/2024/09/manifest.json";
        assert_eq!(month_from_consolidation_key(key), Some((2024, 9)));
        assert_eq!(
            month_from_consolidation_key("datasets/bcra_rem/current/manifest.json"),
            None
        );
    }

    #[test]
    fn manifest_pointer_strips_datasets_prefix() {
        let d = dataset();
        let v = VersionStamp::new("2024-01-01T00-00-00");
        assert_eq!(
            manifest_pointer(&d, &v),
            "bcra_rem/events/2024-01-01T00-00-00/manifest.json"
        );
    }

    #[test]
    fn version_extraction_from_event_key() {
        let key = "datasets/bcra_rem/events/2024-01-01T00-00-00/data/year=2024/month=01/part-0.parquet";
        assert_eq!(
            version_from_event_key(key),
            Some(VersionStamp::new("2024-01-01T00-00-00"))
        );
        assert_eq!(
            version_from_event_key("datasets/bcra_rem/events/index/2024/01/versions.json"),
            None
        );
        assert_eq!(version_from_event_key("datasets/bcra_rem/current/manifest.json"), None);
    }
}
