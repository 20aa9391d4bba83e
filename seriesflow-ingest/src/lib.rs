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

//! Seriesflow Ingest
//!
//! The ingestion flow: delta computation against the key-set index, the
//! compare-and-swap publication protocol, projection consolidation with
//! write-ahead staging, consumer notification, and the run orchestrator
//! that sequences them under the dataset lease.

pub mod consolidate;
pub mod delta;
pub mod enrich;
pub mod fetch;
pub mod latest;
pub mod notify;
pub mod pipeline;
pub mod publish;

pub use consolidate::Consolidator;
pub use delta::{compute_delta, update_index};
pub use enrich::enrich_metadata;
pub use fetch::{FetchedSource, Fetcher};
pub use latest::filter_by_latest_date;
pub use notify::{DatasetUpdated, NotificationBus, RecordingNotifier, SnsNotifier};
pub use pipeline::Pipeline;
pub use publish::{PublishOutcome, VersionPublisher};
