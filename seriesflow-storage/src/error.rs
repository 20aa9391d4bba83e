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

//! Storage error types.
//!
//! `NotFound` and `Precondition` carry distinct meanings for callers:
//! a missing key is often expected (first run) and a failed precondition
//! is a lost race, so neither is folded into the transport-error variant.

use thiserror::Error;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors from the storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Key does not exist
    #[error("Object not found: {0}")]
    NotFound(String),

    /// Conditional write rejected (etag mismatch or key already exists)
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Transport or server error from the object store
    #[error("Object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    /// Lease service error
    #[error("Lease error: {0}")]
    Lease(String),

    /// Parquet encode/decode error
    #[error("Parquet error: {0}")]
    Parquet(String),

    /// JSON encode/decode error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Rows that cannot be stored (missing/invalid partition date)
    #[error("Invalid row data: {0}")]
    InvalidRow(String),

    /// Manifest content that cannot be interpreted
    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),
}

impl StorageError {
    /// Classify an object-store error for key `key`, pulling not-found and
    /// precondition failures out into their own variants.
    pub fn from_object_store(err: object_store::Error, key: &str) -> Self {
        match err {
            object_store::Error::NotFound { .. } => StorageError::NotFound(key.to_string()),
            object_store::Error::Precondition { .. } | object_store::Error::AlreadyExists { .. } => {
                StorageError::Precondition(key.to_string())
            }
            other => StorageError::ObjectStore(other),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }

    pub fn is_precondition(&self) -> bool {
        matches!(self, StorageError::Precondition(_))
    }
}

impl From<StorageError> for seriesflow_core::SeriesflowError {
    fn from(e: StorageError) -> Self {
        use seriesflow_core::SeriesflowError;
        match e {
            StorageError::NotFound(key) => SeriesflowError::NotFound(key),
            StorageError::Precondition(key) => SeriesflowError::ConditionalCheckFailed(key),
            other => SeriesflowError::Storage(other.to_string()),
        }
    }
}
