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

//! Shared error taxonomy for the ingestion engine.
//!
//! The kinds mirror how failures are handled, not where they originate:
//! `ConditionalCheckFailed` is never a run failure (a lost CAS or a held
//! lease is an expected outcome), `NotFound` is often expected (first run),
//! everything else surfaces to the caller.

use thiserror::Error;

/// Result type used across the seriesflow crates.
pub type Result<T> = std::result::Result<T, SeriesflowError>;

/// Errors that can occur while running the ingestion engine.
#[derive(Debug, Error)]
pub enum SeriesflowError {
    /// Malformed or missing dataset/app configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Object store key does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Transport or server error from the object store
    #[error("Storage error: {0}")]
    Storage(String),

    /// A conditional write (pointer CAS, lease) lost its race
    #[error("Conditional check failed: {0}")]
    ConditionalCheckFailed(String),

    /// HTTP fetch failed (non-2xx or timeout)
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Parser plugin error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Normalizer plugin error
    #[error("Normalize error: {0}")]
    Normalize(String),

    /// Detected pointer/index inconsistency
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Row-set shape error (column/arity mismatch)
    #[error("Row set error: {0}")]
    RowSet(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for SeriesflowError {
    fn from(e: serde_json::Error) -> Self {
        SeriesflowError::Serialization(e.to_string())
    }
}

impl SeriesflowError {
    /// True when the error is a missing-key signal from the object store.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SeriesflowError::NotFound(_))
    }
}
