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

//! Typed object store facade.
//!
//! Wraps any [`ObjectStore`] implementation with string keys, typed JSON
//! and parquet helpers, and compare-and-swap via conditional put. The
//! etag returned by `put_if_match` is the only strong primitive; the
//! create-if-absent mode still leaves the narrow race that conditional
//! creates have on weakly consistent stores.

use crate::error::{Result, StorageError};
use crate::parquet::{rowset_from_parquet_bytes, rowset_to_parquet_bytes};
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{ObjectStore, PutMode, PutOptions, PutPayload, UpdateVersion};
use serde::de::DeserializeOwned;
use serde::Serialize;
use seriesflow_core::RowSet;
use std::sync::Arc;

/// Metadata returned by `head`.
#[derive(Debug, Clone)]
pub struct ObjectStat {
    pub etag: Option<String>,
    pub size: u64,
}

/// Typed facade over an object store.
#[derive(Clone)]
pub struct CatalogStore {
    store: Arc<dyn ObjectStore>,
}

impl CatalogStore {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// In-memory store, for tests and local experimentation.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()))
    }

    /// Read a key. Missing keys are `StorageError::NotFound`.
    pub async fn get(&self, key: &str) -> Result<Bytes> {
        let path = Path::from(key);
        let result = self
            .store
            .get(&path)
            .await
            .map_err(|e| StorageError::from_object_store(e, key))?;
        result
            .bytes()
            .await
            .map_err(|e| StorageError::from_object_store(e, key))
    }

    /// Read a key; `None` when absent.
    pub async fn get_opt(&self, key: &str) -> Result<Option<Bytes>> {
        match self.get(key).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Unconditional write. Returns the new etag when the store reports
    /// one.
    pub async fn put(&self, key: &str, bytes: Bytes) -> Result<Option<String>> {
        let path = Path::from(key);
        let result = self
            .store
            .put(&path, PutPayload::from(bytes))
            .await
            .map_err(|e| StorageError::from_object_store(e, key))?;
        Ok(result.e_tag)
    }

    /// Conditional write.
    ///
    /// With `if_match = Some(etag)` the write succeeds only while the key
    /// still carries that etag; with `None` it succeeds only if the key
    /// does not exist yet. Both rejections surface as
    /// `StorageError::Precondition`.
    pub async fn put_if_match(
        &self,
        key: &str,
        bytes: Bytes,
        if_match: Option<&str>,
    ) -> Result<Option<String>> {
        let path = Path::from(key);
        let mode = match if_match {
            Some(etag) => PutMode::Update(UpdateVersion {
                e_tag: Some(etag.to_string()),
                version: None,
            }),
            None => PutMode::Create,
        };
        let opts = PutOptions::from(mode);
        let result = self
            .store
            .put_opts(&path, PutPayload::from(bytes), opts)
            .await
            .map_err(|e| StorageError::from_object_store(e, key))?;
        Ok(result.e_tag)
    }

    /// Object metadata; `None` when absent.
    pub async fn head(&self, key: &str) -> Result<Option<ObjectStat>> {
        let path = Path::from(key);
        match self.store.head(&path).await {
            Ok(meta) => Ok(Some(ObjectStat {
                etag: meta.e_tag,
                size: meta.size as u64,
            })),
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(StorageError::from_object_store(e, key)),
        }
    }

    /// All keys under a prefix, lexically sorted.
    pub async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let path = Path::from(prefix);
        let metas: Vec<_> = self
            .store
            .list(Some(&path))
            .try_collect()
            .await
            .map_err(|e| StorageError::from_object_store(e, prefix))?;
        let mut keys: Vec<String> = metas.into_iter().map(|m| m.location.to_string()).collect();
        keys.sort();
        Ok(keys)
    }

    /// Delete a key. Deleting a missing key is not an error.
    pub async fn delete(&self, key: &str) -> Result<()> {
        let path = Path::from(key);
        match self.store.delete(&path).await {
            Ok(()) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(StorageError::from_object_store(e, key)),
        }
    }

    /// Server-side copy, overwriting the destination.
    pub async fn copy(&self, from: &str, to: &str) -> Result<()> {
        self.store
            .copy(&Path::from(from), &Path::from(to))
            .await
            .map_err(|e| StorageError::from_object_store(e, from))
    }

    pub async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get_opt(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub async fn write_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let body = serde_json::to_vec_pretty(value)?;
        self.put(key, Bytes::from(body)).await?;
        Ok(())
    }

    pub async fn read_rowset(&self, key: &str) -> Result<Option<RowSet>> {
        match self.get_opt(key).await? {
            Some(bytes) => Ok(Some(rowset_from_parquet_bytes(bytes)?)),
            None => Ok(None),
        }
    }

    pub async fn write_rowset(&self, key: &str, rows: &RowSet) -> Result<()> {
        let body = rowset_to_parquet_bytes(rows)?;
        self.put(key, body).await?;
        Ok(())
    }
}
