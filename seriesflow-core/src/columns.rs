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

//! Canonical column names of the observation schema.

use crate::rowset::RowSet;

pub const OBS_TIME: &str = "obs_time";
pub const OBS_DATE: &str = "obs_date";
pub const VALUE: &str = "value";
pub const INTERNAL_SERIES_CODE: &str = "internal_series_code";
pub const UNIT: &str = "unit";
pub const FREQUENCY: &str = "frequency";
pub const DATASET_ID: &str = "dataset_id";
pub const PROVIDER: &str = "provider";
pub const SOURCE_KIND: &str = "source_kind";
pub const VERSION: &str = "version";
pub const VINTAGE_DATE: &str = "vintage_date";
pub const QUALITY_FLAG: &str = "quality_flag";
pub const KEY_HASH: &str = "key_hash";

/// Preferred column order of enriched event rows; columns outside this
/// list keep their relative order after it.
pub const CANONICAL_ORDER: &[&str] = &[
    DATASET_ID,
    PROVIDER,
    FREQUENCY,
    UNIT,
    SOURCE_KIND,
    OBS_TIME,
    OBS_DATE,
    VALUE,
    INTERNAL_SERIES_CODE,
    VERSION,
    VINTAGE_DATE,
    QUALITY_FLAG,
];

/// Date column preference: `obs_time` first, `obs_date` as fallback.
pub fn find_date_column(rows: &RowSet) -> Option<&'static str> {
    if rows.has_column(OBS_TIME) {
        Some(OBS_TIME)
    } else if rows.has_column(OBS_DATE) {
        Some(OBS_DATE)
    } else {
        None
    }
}
