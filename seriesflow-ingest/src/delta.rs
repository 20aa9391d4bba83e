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

//! Delta engine: which rows are new relative to the prior key-set index.

use seriesflow_core::{
    columns, key_fingerprint, Cell, Result, RowSet, SeriesflowError,
};
use std::collections::HashSet;

/// Annotate rows with a `key_hash` column and keep only those whose
/// fingerprint is absent from the prior index. A `None` or empty prior
/// index means first run: every row is new.
///
/// Deterministic: same inputs produce the same rows in the same column
/// order.
pub fn compute_delta(
    rows: &RowSet,
    prior_index: Option<&[String]>,
    primary_keys: &[String],
) -> Result<RowSet> {
    for key in primary_keys {
        if !rows.has_column(key) {
            return Err(SeriesflowError::Config(format!(
                "primary key column '{key}' missing from normalized rows"
            )));
        }
    }

    let mut annotated = rows.clone();
    let fingerprints: Vec<Cell> = rows
        .iter_rows()
        .map(|row| {
            let values: Vec<String> = primary_keys
                .iter()
                .map(|k| row.cell(k).render())
                .collect();
            Cell::Str(key_fingerprint(&values))
        })
        .collect();
    annotated.set_column(columns::KEY_HASH, fingerprints)?;

    let known: HashSet<&str> = prior_index
        .unwrap_or_default()
        .iter()
        .map(String::as_str)
        .collect();
    if known.is_empty() {
        return Ok(annotated);
    }
    Ok(annotated.filter_rows(|row| {
        row.cell(columns::KEY_HASH)
            .as_str()
            .map(|fp| !known.contains(fp))
            .unwrap_or(true)
    }))
}

/// Union of the prior index and the delta's fingerprints, preserving
/// first-seen order and dropping duplicates.
pub fn update_index(prior_index: Option<&[String]>, delta: &RowSet) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut merged = Vec::new();
    for fp in prior_index.unwrap_or_default() {
        if seen.insert(fp.clone()) {
            merged.push(fp.clone());
        }
    }
    if let Some(cells) = delta.column_cells(columns::KEY_HASH) {
        for cell in cells {
            let fp = cell.render();
            if seen.insert(fp.clone()) {
                merged.push(fp);
            }
        }
    }
    merged
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    fn rows_strategy() -> impl Strategy<Value = RowSet> {
        prop::collection::vec((0u32..60, 0u8..4), 0..50).prop_map(|entries| {
            let mut rs = RowSet::new(["obs_time", "value", "internal_series_code"]);
            for (day, series) in entries {
                let date = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
                    + chrono::Duration::days(i64::from(day));
                let _ = rs.push_row(vec![
                    Cell::Time(date.and_hms_opt(0, 0, 0).unwrap()),
                    Cell::Num(f64::from(day)),
                    Cell::Str(format!("S{series}")),
                ]);
            }
            rs
        })
    }

    fn pk() -> Vec<String> {
        vec!["obs_time".to_string(), "internal_series_code".to_string()]
    }

    proptest! {
        // A delta folded into the index leaves nothing new behind.
        #[test]
        fn delta_after_index_update_is_empty(rows in rows_strategy()) {
            let delta = compute_delta(&rows, None, &pk()).unwrap();
            let index = update_index(None, &delta);
            let again = compute_delta(&rows, Some(&index), &pk()).unwrap();
            prop_assert!(again.is_empty());
        }

        #[test]
        fn update_index_never_shrinks_and_never_duplicates(rows in rows_strategy()) {
            let delta = compute_delta(&rows, None, &pk()).unwrap();
            let prior: Vec<String> = vec!["a".into(), "b".into()];
            let merged = update_index(Some(&prior), &delta);
            prop_assert!(merged.len() >= prior.len());
            let unique: std::collections::HashSet<_> = merged.iter().collect();
            prop_assert_eq!(unique.len(), merged.len());
        }

        #[test]
        fn compute_delta_is_deterministic(rows in rows_strategy()) {
            let a = compute_delta(&rows, None, &pk()).unwrap();
            let b = compute_delta(&rows, None, &pk()).unwrap();
            prop_assert_eq!(a, b);
        }
    }
}
