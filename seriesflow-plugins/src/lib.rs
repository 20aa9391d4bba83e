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

//! Seriesflow Plugins
//!
//! Parser and normalizer plugin contracts, the registry that holds them,
//! and the built-in implementations (`csv` parser, `generic` normalizer).
//!
//! Parsers turn raw source bytes into rows carrying at minimum `obs_time`
//! and `value` (and `internal_series_code` when applicable); normalizers
//! coerce `obs_time` to a datetime and `value` to a number, optionally
//! apply a timezone, and drop rows missing either. Both must be
//! deterministic per input.

pub mod csv;
pub mod error;
pub mod generic;
pub mod registry;

pub use crate::csv::CsvParser;
pub use error::{PluginError, PluginResult};
pub use generic::GenericNormalizer;
pub use registry::Registry;

use seriesflow_core::{DatasetConfig, RowSet};

/// Byte → rows plugin.
pub trait Parser: Send + Sync {
    fn id(&self) -> &str;

    fn parse(&self, config: &DatasetConfig, raw: &[u8]) -> PluginResult<RowSet>;
}

/// Rows → canonical rows plugin.
pub trait Normalizer: Send + Sync {
    fn id(&self) -> &str;

    fn normalize(&self, config: &DatasetConfig, rows: RowSet) -> PluginResult<RowSet>;
}
