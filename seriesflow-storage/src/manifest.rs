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

//! Version manifests and the current-version pointer.
//!
//! A `VersionManifest` is written once at an immutable key. The
//! `CurrentPointer` is the only mutable object per dataset and is swapped
//! exclusively through a compare-and-swap on its etag.

use crate::error::Result;
use crate::paths;
use crate::store::CatalogStore;
use seriesflow_core::{DatasetId, VersionStamp};
use serde::{Deserialize, Serialize};

/// Hash and size of the fetched source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub sha256: String,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceInfo {
    pub files: Vec<SourceFile>,
}

/// What this version wrote and the running totals after it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputsInfo {
    pub data_prefix: String,
    pub files: Vec<String>,
    pub rows_total: usize,
    pub rows_added_this_version: usize,
}

/// Where the key-set index lives and how fingerprints are computed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexInfo {
    pub path: String,
    pub key_columns: Vec<String>,
    pub hash_column: String,
}

/// Immutable per-version record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionManifest {
    pub dataset_id: String,
    pub version: VersionStamp,
    pub created_at: String,
    pub source: SourceInfo,
    pub outputs: OutputsInfo,
    pub index: IndexInfo,
}

impl VersionManifest {
    /// SHA-256 of the first source file, if recorded.
    pub fn source_sha256(&self) -> Option<&str> {
        self.source.files.first().map(|f| f.sha256.as_str())
    }
}

/// The single mutable datum per dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentPointer {
    pub dataset_id: String,
    pub current_version: VersionStamp,
}

/// Store for manifests and the pointer.
#[derive(Clone)]
pub struct ManifestStore {
    store: CatalogStore,
}

impl ManifestStore {
    pub fn new(store: CatalogStore) -> Self {
        Self { store }
    }

    /// Etag of the current pointer; `None` before the first publish.
    pub async fn current_pointer_etag(&self, dataset: &DatasetId) -> Result<Option<String>> {
        let key = paths::current_pointer_key(dataset);
        Ok(self.store.head(&key).await?.and_then(|stat| stat.etag))
    }

    pub async fn read_current_pointer(&self, dataset: &DatasetId) -> Result<Option<CurrentPointer>> {
        let key = paths::current_pointer_key(dataset);
        self.store.read_json(&key).await
    }

    /// Swap the pointer. `if_match = None` means create-if-absent (first
    /// publish); either mode surfaces a lost race as
    /// `StorageError::Precondition`.
    pub async fn put_current_pointer(
        &self,
        dataset: &DatasetId,
        pointer: &CurrentPointer,
        if_match: Option<&str>,
    ) -> Result<Option<String>> {
        let key = paths::current_pointer_key(dataset);
        let body = serde_json::to_vec_pretty(pointer)?;
        self.store
            .put_if_match(&key, bytes::Bytes::from(body), if_match)
            .await
    }

    /// Non-conditional write: the version key is unique to this run.
    pub async fn write_version_manifest(
        &self,
        dataset: &DatasetId,
        manifest: &VersionManifest,
    ) -> Result<()> {
        let key = paths::version_manifest_key(dataset, &manifest.version);
        self.store.write_json(&key, manifest).await
    }

    pub async fn read_version_manifest(
        &self,
        dataset: &DatasetId,
        version: &VersionStamp,
    ) -> Result<Option<VersionManifest>> {
        let key = paths::version_manifest_key(dataset, version);
        self.store.read_json(&key).await
    }

    /// Manifest of the version the pointer currently references.
    pub async fn read_current_manifest(
        &self,
        dataset: &DatasetId,
    ) -> Result<Option<VersionManifest>> {
        match self.read_current_pointer(dataset).await? {
            Some(pointer) => {
                self.read_version_manifest(dataset, &pointer.current_version)
                    .await
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;

    fn dataset() -> DatasetId {
        DatasetId::new("test_dataset").unwrap()
    }

    fn pointer(version: &str) -> CurrentPointer {
        CurrentPointer {
            dataset_id: "test_dataset".into(),
            current_version: VersionStamp::new(version),
        }
    }

    #[tokio::test]
    async fn pointer_cas_round_trip() {
        let manifests = ManifestStore::new(CatalogStore::in_memory());
        let d = dataset();

        assert!(manifests.current_pointer_etag(&d).await.unwrap().is_none());

        // First publish: create-if-absent.
        manifests
            .put_current_pointer(&d, &pointer("v1"), None)
            .await
            .unwrap();
        let etag = manifests.current_pointer_etag(&d).await.unwrap().unwrap();

        // Second publish must carry the etag.
        let err = manifests
            .put_current_pointer(&d, &pointer("v2"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Precondition(_)));

        manifests
            .put_current_pointer(&d, &pointer("v2"), Some(&etag))
            .await
            .unwrap();
        let current = manifests.read_current_pointer(&d).await.unwrap().unwrap();
        assert_eq!(current.current_version.as_str(), "v2");
    }

    #[tokio::test]
    async fn manifest_json_omits_null_path() {
        let manifest = VersionManifest {
            dataset_id: "d".into(),
            version: VersionStamp::new("v1"),
            created_at: "2024-01-01T00:00:00+00:00".into(),
            source: SourceInfo {
                files: vec![SourceFile {
                    path: None,
                    sha256: "abc".into(),
                    size: 10,
                }],
            },
            outputs: OutputsInfo {
                data_prefix: "p/".into(),
                files: vec![],
                rows_total: 1,
                rows_added_this_version: 1,
            },
            index: IndexInfo {
                path: "i".into(),
                key_columns: vec!["obs_time".into()],
                hash_column: "key_hash".into(),
            },
        };
        let json = serde_json::to_string(&manifest).unwrap();
        assert!(!json.contains("\"path\""));
        assert!(json.contains("\"rows_added_this_version\":1"));
    }
}
