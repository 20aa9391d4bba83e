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

//! Series code resolution.

use crate::columns;
use crate::rowset::{Cell, RowSet};

/// Ensure every row carries an `internal_series_code`.
///
/// Datasets that expose a single unnamed series fall back to the dataset
/// id as the series code.
pub fn resolve_series_code(rows: &mut RowSet, dataset_id: &str) {
    if !rows.has_column(columns::INTERNAL_SERIES_CODE) {
        rows.set_constant(
            columns::INTERNAL_SERIES_CODE,
            Cell::Str(dataset_id.to_string()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_missing_series_code_with_dataset_id() {
        let mut rows = RowSet::new(["obs_time", "value"]);
        rows.push_row(vec![Cell::Str("2024-01-01".into()), Cell::Num(1.0)])
            .unwrap();
        resolve_series_code(&mut rows, "bcra_rem");
        assert_eq!(
            rows.cell(0, columns::INTERNAL_SERIES_CODE).unwrap().render(),
            "bcra_rem"
        );
    }

    #[test]
    fn keeps_existing_series_code() {
        let mut rows = RowSet::new(["internal_series_code"]);
        rows.push_row(vec![Cell::Str("A".into())]).unwrap();
        resolve_series_code(&mut rows, "bcra_rem");
        assert_eq!(
            rows.cell(0, columns::INTERNAL_SERIES_CODE).unwrap().render(),
            "A"
        );
    }
}
