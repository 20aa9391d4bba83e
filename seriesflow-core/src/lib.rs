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

//! Seriesflow Core
//!
//! Fundamental data structures and types for the seriesflow ingestion
//! engine: row-set abstraction, dataset/app configuration, identifiers,
//! the clock capability and the shared error taxonomy.

pub mod clock;
pub mod columns;
pub mod config;
pub mod error;
pub mod hash;
pub mod ids;
pub mod observation;
pub mod rowset;
pub mod run;
pub mod series;

pub use clock::{Clock, ManualClock, SystemClock};
pub use columns::find_date_column;
pub use config::{
    AppConfig, DatasetConfig, NormalizeSection, NotifySection, ParseOptions, ParseSection,
    SeriesMapEntry, SourceConfig, SourceFormat, SourceKind,
};
pub use error::{Result, SeriesflowError};
pub use hash::{key_fingerprint, sha256_hex};
pub use ids::{DatasetId, RunId, VersionStamp};
pub use observation::Observation;
pub use rowset::{Cell, RowSet};
pub use run::{RunOutcome, RunRecord};
pub use series::resolve_series_code;
