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

//! Run record: the outcome of one pipeline invocation.

use crate::ids::{DatasetId, RunId, VersionStamp};
use serde::{Deserialize, Serialize};

/// How a run ended. Every variant except `Completed` is a documented
/// no-op, not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Published a new version.
    Completed,
    /// Source bytes identical to the prior version; nothing to do.
    SourceUnchanged,
    /// Every parsed row was already known.
    NoNewRows,
    /// Another runner holds the dataset lease.
    Locked,
    /// Lost the pointer CAS to a concurrent runner.
    LostRace,
}

/// Metadata of one run attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub dataset_id: DatasetId,
    pub run_id: RunId,
    /// Stamp generated for this attempt, even when no version was
    /// published under it.
    pub version_ts: VersionStamp,
    pub outcome: RunOutcome,
    pub rows_added: usize,
    /// The version actually published, when `outcome == Completed`.
    pub published_version: Option<VersionStamp>,
}

impl RunRecord {
    pub fn new(dataset_id: DatasetId, run_id: RunId, version_ts: VersionStamp) -> Self {
        Self {
            dataset_id,
            run_id,
            version_ts,
            outcome: RunOutcome::NoNewRows,
            rows_added: 0,
            published_version: None,
        }
    }

    pub fn published(&self) -> bool {
        self.outcome == RunOutcome::Completed
    }
}
