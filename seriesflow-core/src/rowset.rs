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

//! Row-set abstraction: an ordered set of named columns of loosely typed
//! cells, with the vectorized operations the ingestion flow needs (filter,
//! concat, sort, drop-duplicates, group-by).
//!
//! Parquet is the on-disk format; this is the in-memory representation.
//! Cell rendering (`Cell::render`) is the canonical string form used for
//! key fingerprints and group keys, and is stable across a parquet
//! round-trip at microsecond precision.

use crate::error::{Result, SeriesflowError};
use chrono::{NaiveDate, NaiveDateTime};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;

/// A single loosely typed value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Str(String),
    Num(f64),
    Time(NaiveDateTime),
    Date(NaiveDate),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_num(&self) -> Option<f64> {
        match self {
            Cell::Num(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<NaiveDateTime> {
        match self {
            Cell::Time(t) => Some(*t),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Cell::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Datetime view of any date-bearing cell. Dates map to midnight,
    /// strings are parsed leniently (ISO datetime or plain date).
    pub fn as_datetime_lossy(&self) -> Option<NaiveDateTime> {
        match self {
            Cell::Time(t) => Some(*t),
            Cell::Date(d) => d.and_hms_opt(0, 0, 0),
            Cell::Str(s) => parse_datetime_lenient(s),
            _ => None,
        }
    }

    /// `(year, month)` of a date-bearing cell.
    pub fn year_month(&self) -> Option<(i32, u32)> {
        use chrono::Datelike;
        self.as_datetime_lossy().map(|t| (t.year(), t.month()))
    }

    /// Canonical string form. Stable for equal logical values regardless
    /// of how the cell was produced (in memory or read back from parquet).
    pub fn render(&self) -> String {
        match self {
            Cell::Null => String::new(),
            Cell::Str(s) => s.clone(),
            Cell::Num(n) => format!("{n}"),
            Cell::Time(t) => t.format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
            Cell::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }

    /// Total order used by sorts: nulls first, same-typed values by their
    /// natural order, mixed types by rendered form.
    pub fn compare(&self, other: &Cell) -> Ordering {
        match (self, other) {
            (Cell::Null, Cell::Null) => Ordering::Equal,
            (Cell::Null, _) => Ordering::Less,
            (_, Cell::Null) => Ordering::Greater,
            (Cell::Num(a), Cell::Num(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (Cell::Time(a), Cell::Time(b)) => a.cmp(b),
            (Cell::Date(a), Cell::Date(b)) => a.cmp(b),
            (Cell::Str(a), Cell::Str(b)) => a.cmp(b),
            (a, b) => a.render().cmp(&b.render()),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

fn parse_datetime_lenient(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Borrowed view of one row.
#[derive(Clone, Copy)]
pub struct RowRef<'a> {
    set: &'a RowSet,
    idx: usize,
}

impl<'a> RowRef<'a> {
    pub fn index(&self) -> usize {
        self.idx
    }

    /// Cell by column name; `Null` when the column does not exist.
    pub fn cell(&self, column: &str) -> &'a Cell {
        static NULL: Cell = Cell::Null;
        match self.set.column_index(column) {
            Some(c) => &self.set.rows[self.idx][c],
            None => &NULL,
        }
    }
}

/// Ordered named columns over rows of cells.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RowSet {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl RowSet {
    /// New empty row set with the given column order. Column names must be
    /// unique.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        debug_assert_eq!(
            columns.iter().collect::<HashSet<_>>().len(),
            columns.len(),
            "duplicate column names"
        );
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Append a row; its arity must match the column count.
    pub fn push_row(&mut self, row: Vec<Cell>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(SeriesflowError::RowSet(format!(
                "row arity {} does not match {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn row(&self, idx: usize) -> RowRef<'_> {
        RowRef { set: self, idx }
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = RowRef<'_>> {
        (0..self.rows.len()).map(move |idx| RowRef { set: self, idx })
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&Cell> {
        let c = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[c])
    }

    /// All cells of one column, in row order.
    pub fn column_cells(&self, name: &str) -> Option<Vec<&Cell>> {
        let c = self.column_index(name)?;
        Some(self.rows.iter().map(|r| &r[c]).collect())
    }

    /// Add or replace a column from explicit values (one per row).
    pub fn set_column(&mut self, name: &str, values: Vec<Cell>) -> Result<()> {
        if values.len() != self.rows.len() {
            return Err(SeriesflowError::RowSet(format!(
                "column '{}' has {} values for {} rows",
                name,
                values.len(),
                self.rows.len()
            )));
        }
        match self.column_index(name) {
            Some(c) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[c] = value;
                }
            }
            None => {
                self.columns.push(name.to_string());
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
        Ok(())
    }

    /// Add or replace a column holding the same cell in every row.
    pub fn set_constant(&mut self, name: &str, cell: Cell) {
        let values = vec![cell; self.rows.len()];
        // Arity always matches by construction.
        let _ = self.set_column(name, values);
    }

    /// Remove a column if present.
    pub fn drop_column(&mut self, name: &str) {
        if let Some(c) = self.column_index(name) {
            self.columns.remove(c);
            for row in &mut self.rows {
                row.remove(c);
            }
        }
    }

    /// New row set with only the named columns (missing names skipped).
    pub fn select_columns(&self, names: &[&str]) -> RowSet {
        let picked: Vec<(String, usize)> = names
            .iter()
            .filter_map(|n| self.column_index(n).map(|i| (n.to_string(), i)))
            .collect();
        let mut out = RowSet::new(picked.iter().map(|(n, _)| n.clone()));
        for row in &self.rows {
            let cells = picked.iter().map(|(_, i)| row[*i].clone()).collect();
            let _ = out.push_row(cells);
        }
        out
    }

    /// Reorder so that `preferred` columns (those present) come first, in
    /// that order; remaining columns keep their relative order.
    pub fn reorder_columns(&mut self, preferred: &[&str]) {
        let mut order: Vec<usize> = preferred
            .iter()
            .filter_map(|n| self.column_index(n))
            .collect();
        for (i, _) in self.columns.iter().enumerate() {
            if !order.contains(&i) {
                order.push(i);
            }
        }
        self.columns = order.iter().map(|&i| self.columns[i].clone()).collect();
        for row in &mut self.rows {
            *row = order.iter().map(|&i| row[i].clone()).collect();
        }
    }

    /// New row set with the rows at `indices`, in that order.
    pub fn select_rows(&self, indices: &[usize]) -> RowSet {
        let mut out = RowSet::new(self.columns.clone());
        for &i in indices {
            let _ = out.push_row(self.rows[i].clone());
        }
        out
    }

    /// New row set with the rows matching the predicate.
    pub fn filter_rows<F>(&self, pred: F) -> RowSet
    where
        F: Fn(RowRef<'_>) -> bool,
    {
        let indices: Vec<usize> = self
            .iter_rows()
            .filter(|r| pred(*r))
            .map(|r| r.index())
            .collect();
        self.select_rows(&indices)
    }

    /// Concatenate row sets, aligning columns by name. The output column
    /// order is first-seen across the parts; absent cells become null.
    pub fn concat(parts: &[RowSet]) -> RowSet {
        let mut columns: Vec<String> = Vec::new();
        for part in parts {
            for col in &part.columns {
                if !columns.contains(col) {
                    columns.push(col.clone());
                }
            }
        }
        let mut out = RowSet::new(columns.clone());
        for part in parts {
            let mapping: Vec<Option<usize>> =
                columns.iter().map(|c| part.column_index(c)).collect();
            for row in &part.rows {
                let cells = mapping
                    .iter()
                    .map(|m| m.map_or(Cell::Null, |i| row[i].clone()))
                    .collect();
                let _ = out.push_row(cells);
            }
        }
        out
    }

    /// Stable descending sort by one column (missing column is a no-op).
    pub fn sort_desc_by(&mut self, column: &str) {
        if let Some(c) = self.column_index(column) {
            self.rows.sort_by(|a, b| b[c].compare(&a[c]));
        }
    }

    /// Drop duplicate rows on the subset columns, keeping the first
    /// occurrence. Subset columns missing from the set are ignored.
    pub fn drop_duplicates(&self, subset: &[&str]) -> RowSet {
        let cols: Vec<usize> = subset
            .iter()
            .filter_map(|n| self.column_index(n))
            .collect();
        if cols.is_empty() {
            return self.clone();
        }
        let mut seen = HashSet::new();
        let mut keep = Vec::new();
        for (i, row) in self.rows.iter().enumerate() {
            let key: Vec<String> = cols.iter().map(|&c| row[c].render()).collect();
            if seen.insert(key) {
                keep.push(i);
            }
        }
        self.select_rows(&keep)
    }

    /// Group rows by the rendered value of one column. Rows with a null
    /// key are dropped; groups come back sorted by key.
    pub fn group_by(&self, column: &str) -> Vec<(String, RowSet)> {
        let Some(c) = self.column_index(column) else {
            return Vec::new();
        };
        let mut groups: std::collections::BTreeMap<String, Vec<usize>> = Default::default();
        for (i, row) in self.rows.iter().enumerate() {
            if row[c].is_null() {
                continue;
            }
            groups.entry(row[c].render()).or_default().push(i);
        }
        groups
            .into_iter()
            .map(|(key, indices)| (key, self.select_rows(&indices)))
            .collect()
    }

    /// Maximum datetime value of a date-bearing column.
    pub fn max_datetime(&self, column: &str) -> Option<NaiveDateTime> {
        let cells = self.column_cells(column)?;
        cells
            .into_iter()
            .filter_map(|c| c.as_datetime_lossy())
            .max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RowSet {
        let mut rs = RowSet::new(["obs_time", "value", "internal_series_code"]);
        let t = |s: &str| {
            Cell::Time(NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").unwrap())
        };
        rs.push_row(vec![t("2024-01-01T00:00:00"), Cell::Num(1.0), Cell::Str("A".into())])
            .unwrap();
        rs.push_row(vec![t("2024-01-02T00:00:00"), Cell::Num(2.0), Cell::Str("A".into())])
            .unwrap();
        rs.push_row(vec![t("2024-01-03T00:00:00"), Cell::Num(3.0), Cell::Str("B".into())])
            .unwrap();
        rs
    }

    #[test]
    fn push_row_checks_arity() {
        let mut rs = RowSet::new(["a", "b"]);
        assert!(rs.push_row(vec![Cell::Num(1.0)]).is_err());
        assert!(rs.push_row(vec![Cell::Num(1.0), Cell::Null]).is_ok());
    }

    #[test]
    fn render_is_stable_for_times() {
        let t = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap();
        assert_eq!(Cell::Time(t).render(), "2024-01-01T12:30:00.000000");
    }

    #[test]
    fn set_constant_adds_or_replaces() {
        let mut rs = sample();
        rs.set_constant("provider", Cell::Str("bcra".into()));
        assert!(rs.has_column("provider"));
        rs.set_constant("provider", Cell::Str("indec".into()));
        assert_eq!(rs.cell(0, "provider").unwrap().render(), "indec");
        assert_eq!(rs.columns().len(), 4);
    }

    #[test]
    fn concat_aligns_columns_with_nulls() {
        let mut a = RowSet::new(["x"]);
        a.push_row(vec![Cell::Num(1.0)]).unwrap();
        let mut b = RowSet::new(["x", "y"]);
        b.push_row(vec![Cell::Num(2.0), Cell::Str("v".into())]).unwrap();
        let merged = RowSet::concat(&[a, b]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.columns(), &["x".to_string(), "y".to_string()]);
        assert!(merged.cell(0, "y").unwrap().is_null());
    }

    #[test]
    fn drop_duplicates_keeps_first() {
        let mut rs = RowSet::new(["k", "v"]);
        rs.push_row(vec![Cell::Str("a".into()), Cell::Num(1.0)]).unwrap();
        rs.push_row(vec![Cell::Str("a".into()), Cell::Num(2.0)]).unwrap();
        rs.push_row(vec![Cell::Str("b".into()), Cell::Num(3.0)]).unwrap();
        let deduped = rs.drop_duplicates(&["k"]);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped.cell(0, "v").unwrap().as_num(), Some(1.0));
    }

    #[test]
    fn sort_desc_is_stable() {
        let mut rs = RowSet::new(["version", "v"]);
        rs.push_row(vec![Cell::Str("v1".into()), Cell::Num(1.0)]).unwrap();
        rs.push_row(vec![Cell::Str("v2".into()), Cell::Num(2.0)]).unwrap();
        rs.push_row(vec![Cell::Str("v2".into()), Cell::Num(3.0)]).unwrap();
        rs.sort_desc_by("version");
        assert_eq!(rs.cell(0, "v").unwrap().as_num(), Some(2.0));
        assert_eq!(rs.cell(2, "v").unwrap().as_num(), Some(1.0));
    }

    #[test]
    fn group_by_sorts_keys_and_drops_null() {
        let mut rs = RowSet::new(["s"]);
        rs.push_row(vec![Cell::Str("b".into())]).unwrap();
        rs.push_row(vec![Cell::Null]).unwrap();
        rs.push_row(vec![Cell::Str("a".into())]).unwrap();
        let groups = rs.group_by("s");
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "a");
        assert_eq!(groups[1].0, "b");
    }

    #[test]
    fn reorder_puts_preferred_first() {
        let mut rs = sample();
        rs.reorder_columns(&["internal_series_code", "obs_time"]);
        assert_eq!(
            rs.columns(),
            &[
                "internal_series_code".to_string(),
                "obs_time".to_string(),
                "value".to_string()
            ]
        );
        assert_eq!(rs.cell(0, "value").unwrap().as_num(), Some(1.0));
    }

    #[test]
    fn year_month_handles_strings_and_dates() {
        assert_eq!(
            Cell::Str("2024-03-15".into()).year_month(),
            Some((2024, 3))
        );
        assert_eq!(
            Cell::Date(NaiveDate::from_ymd_opt(2023, 12, 31).unwrap()).year_month(),
            Some((2023, 12))
        );
        assert_eq!(Cell::Num(5.0).year_month(), None);
    }
}
