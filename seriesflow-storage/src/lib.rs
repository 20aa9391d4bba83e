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

//! Seriesflow Storage Layer
//!
//! Object-store-backed catalog for versioned datasets:
//!
//! - **Facade**: typed get/put/head/list/delete over any
//!   [`object_store::ObjectStore`], with compare-and-swap via conditional
//!   put and a distinct not-found error kind
//! - **Event log**: append-only partitioned parquet events with a
//!   per-month version index and rollback on failure
//! - **Manifests**: immutable per-version manifests plus the single
//!   mutable current-version pointer, swapped only by CAS
//! - **Key-set index**: the deduplicated fingerprint set of every
//!   published row, with verify/rebuild repair
//! - **Projections**: per-series monthly windows with write-ahead staging
//! - **Lease**: a timed exclusive ownership record per dataset

pub mod error;
pub mod events;
pub mod index;
pub mod lease;
pub mod manifest;
pub mod parquet;
pub mod paths;
pub mod projections;
pub mod store;

pub use error::{Result, StorageError};
pub use events::{EventIndex, EventStore};
pub use index::IndexStore;
pub use lease::{
    default_lease_ttl, DynamoLeaseStore, InMemoryLeaseStore, LeaseStore, DEFAULT_LEASE_TTL_SECS,
};
pub use manifest::{
    CurrentPointer, IndexInfo, ManifestStore, OutputsInfo, SourceFile, SourceInfo, VersionManifest,
};
pub use crate::parquet::{rowset_from_parquet_bytes, rowset_to_parquet_bytes};
pub use projections::{ConsolidationManifest, ConsolidationStatus, ProjectionStore};
pub use store::{CatalogStore, ObjectStat};
