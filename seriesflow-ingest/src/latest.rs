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

//! Latest-date pre-filter.
//!
//! Reads the previous version's event files, finds the maximum observed
//! date, and drops parsed input rows that are not strictly newer. Rows
//! whose date cannot be read yet are kept; the normalizer decides their
//! fate.

use seriesflow_core::{columns, find_date_column, DatasetId, Result, RowSet};
use seriesflow_storage::{CatalogStore, ManifestStore};
use tracing::{info, warn};

pub async fn filter_by_latest_date(
    store: &CatalogStore,
    manifests: &ManifestStore,
    dataset: &DatasetId,
    rows: RowSet,
) -> Result<RowSet> {
    let Some(manifest) = manifests.read_current_manifest(dataset).await? else {
        info!(dataset = %dataset, "no previous version; keeping all rows");
        return Ok(rows);
    };

    let mut cutoff = None;
    for file_key in &manifest.outputs.files {
        let published = match store.read_rowset(file_key).await {
            Ok(Some(published)) => published,
            Ok(None) => {
                warn!(key = file_key, "published event file is missing");
                continue;
            }
            Err(e) => {
                warn!(key = file_key, error = %e, "could not read event file");
                continue;
            }
        };
        let Some(date_col) = find_date_column(&published) else {
            continue;
        };
        if let Some(max) = published.max_datetime(date_col) {
            cutoff = Some(cutoff.map_or(max, |c: chrono::NaiveDateTime| c.max(max)));
        }
    }

    let Some(cutoff) = cutoff else {
        return Ok(rows);
    };
    if !rows.has_column(columns::OBS_TIME) {
        warn!("parsed rows carry no obs_time column; keeping all rows");
        return Ok(rows);
    }

    let total = rows.len();
    let filtered = rows.filter_rows(|row| {
        match row.cell(columns::OBS_TIME).as_datetime_lossy() {
            Some(t) => t > cutoff,
            // Not parseable yet: leave the decision to the normalizer.
            None => true,
        }
    });
    info!(
        total,
        kept = filtered.len(),
        cutoff = %cutoff,
        "filtered rows by latest published date"
    );
    Ok(filtered)
}
