//! The dataset store: sole owner of the table, the row selection and the
//! hidden set.
//!
//! Every mutation goes through a method here and is followed by a
//! [`DatasetEvent`] on the store's [`EventController`]. Operations that
//! users trigger and that may legitimately fail (merge, rename, save) return
//! an [`OpStatus`]; they compute their result first and only then commit it,
//! so the table is never left half-modified.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::range::{datetime_to_secs, AxisValue, LimitedRange};
use super::selection::{combine, gap_fill, SelectionMode};
use super::table::{Column, DType, RowId, RowSet, Table, Value, DATETIME_COLUMN};
use crate::error::{OpStatus, SaveError, StoreError};
use crate::events::{DatasetEvent, EventController, EventFilter};
use crate::io::{FileIo, TableIo};

/// How a merge resolves cells where both columns hold a value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MergeMode {
    /// Prefer the source value, fall back to the destination.
    SourcePriority,
    /// Prefer the destination value, fall back to the source.
    DestinationPriority,
    /// Replace the destination by the source.
    OverwriteEntirely,
}

impl MergeMode {
    pub const ALL: [MergeMode; 3] = [
        MergeMode::SourcePriority,
        MergeMode::DestinationPriority,
        MergeMode::OverwriteEntirely,
    ];
}

impl fmt::Display for MergeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MergeMode::SourcePriority => "Source priority",
            MergeMode::DestinationPriority => "Destination priority",
            MergeMode::OverwriteEntirely => "Overwrite entirely",
        })
    }
}

/// Whose pre-merge type the merged column is cast to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetType {
    Source,
    Destination,
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TargetType::Source => "Source",
            TargetType::Destination => "Destination",
        })
    }
}

/// Which row of a pair with equal timestamps wins on append.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DuplicatePolicy {
    /// Existing values win; new values only fill empty cells.
    #[default]
    KeepFirst,
    /// New non-empty values replace existing ones.
    Overwrite,
}

/// Options for [`DatasetStore::append`].
#[derive(Clone, Debug, Default)]
pub struct AppendOptions {
    pub duplicate_policy: DuplicatePolicy,
    /// Resample to fixed buckets, keeping the last value per bucket and column.
    pub resample: Option<chrono::Duration>,
    /// Only append rows whose timestamp lies in this closed interval.
    pub time_range: Option<(NaiveDateTime, NaiveDateTime)>,
}

/// What an append did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AppendSummary {
    pub appended: usize,
    pub merged: usize,
    pub dropped: usize,
}

/// Which rows a save writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveSubset {
    All,
    Selection,
    NotHidden,
}

/// Owner of the table, the selection and the hidden set.
pub struct DatasetStore {
    table: Option<Table>,
    selection: RowSet,
    hidden: RowSet,
    source: Option<PathBuf>,
    io: Box<dyn TableIo>,
    events: EventController<DatasetEvent>,
}

impl Default for DatasetStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DatasetStore {
    /// Store backed by the file-extension based loader/saver.
    pub fn new() -> Self {
        Self::with_io(Box::new(FileIo::default()))
    }

    pub fn with_io(io: Box<dyn TableIo>) -> Self {
        Self {
            table: None,
            selection: RowSet::new(),
            hidden: RowSet::new(),
            source: None,
            io,
            events: EventController::new(),
        }
    }

    pub fn events(&self) -> &EventController<DatasetEvent> {
        &self.events
    }

    pub fn subscribe(&self, filter: EventFilter) -> std::sync::mpsc::Receiver<DatasetEvent> {
        self.events.subscribe(filter)
    }

    pub fn table(&self) -> Option<&Table> {
        self.table.as_ref()
    }

    pub fn require_table(&self) -> Result<&Table, StoreError> {
        self.table.as_ref().ok_or(StoreError::NoTable)
    }

    pub fn selection(&self) -> &RowSet {
        &self.selection
    }

    pub fn hidden(&self) -> &RowSet {
        &self.hidden
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Load / replace / append
    // ─────────────────────────────────────────────────────────────────────

    /// Load a table from `path`, replacing the current one. On failure the
    /// current table, selection and hidden set are left untouched.
    pub fn load(&mut self, path: &Path) -> Result<(), StoreError> {
        let table = self.io.load(path)?;
        info!("loaded {} rows x {} columns from {}", table.len(), table.columns().len(), path.display());
        self.replace_table(table, Some(path.to_path_buf()));
        Ok(())
    }

    /// Replace the table wholesale. Selection and hidden set are cleared.
    pub fn replace_table(&mut self, table: Table, source: Option<PathBuf>) {
        self.table = Some(table);
        self.selection.clear();
        self.hidden.clear();
        self.source = source.clone();
        self.events.emit(DatasetEvent::FileSourceChanged(source));
        self.events.emit(DatasetEvent::TableReplaced);
    }

    /// Load `path` and append it, see [`append`](Self::append).
    pub fn append_from_file(
        &mut self,
        path: &Path,
        options: &AppendOptions,
    ) -> Result<AppendSummary, StoreError> {
        let new_rows = self.io.load(path)?;
        Ok(self.append(new_rows, options))
    }

    /// Merge `new_rows` into the table.
    ///
    /// Rows whose timestamp already exists are merged cell by cell following
    /// the duplicate policy; other rows get fresh row identifiers. Afterwards
    /// the table is optionally resampled, sorted by timestamp, and rows that
    /// hold nothing but a timestamp are dropped. Selection and hidden set
    /// survive for every row that still exists.
    pub fn append(&mut self, new_rows: Table, options: &AppendOptions) -> AppendSummary {
        let new_rows = match options.time_range {
            Some((from, to)) => restrict_to_time_range(&new_rows, from, to),
            None => new_rows,
        };
        let existing = self.table.take().unwrap_or_default();
        let (mut merged, mut summary) = merge_rows(existing, &new_rows, options.duplicate_policy);

        if let Some(interval) = options.resample {
            merged = resample_last(&merged, interval);
        }
        merged = sort_by_timestamp(&merged);
        let before = merged.len();
        merged = drop_empty_rows(&merged);
        summary.dropped = before - merged.len();

        info!(
            "appended {} rows, merged {} duplicates, dropped {} empty rows",
            summary.appended, summary.merged, summary.dropped
        );
        self.table = Some(merged);
        self.revalidate_sets();
        self.events.emit(DatasetEvent::TableChanged);
        summary
    }

    /// Apply `f` to a copy of the table and commit the copy if `f` succeeds.
    /// Used by script hooks that rewrite whole columns.
    pub fn update_table<F>(&mut self, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Table) -> Result<(), StoreError>,
    {
        let mut work = self.require_table()?.clone();
        f(&mut work)?;
        self.table = Some(work);
        self.revalidate_sets();
        self.events.emit(DatasetEvent::TableChanged);
        Ok(())
    }

    /// Drop stale identifiers from selection and hidden set.
    fn revalidate_sets(&mut self) {
        let Some(table) = &self.table else {
            return;
        };
        let sel_before = self.selection.len();
        self.selection.retain(|id| table.contains_id(*id));
        if self.selection.len() != sel_before {
            self.events.emit(DatasetEvent::SelectionChanged);
        }
        let hid_before = self.hidden.len();
        self.hidden.retain(|id| table.contains_id(*id));
        if self.hidden.len() != hid_before {
            self.events.emit(DatasetEvent::HiddenChanged);
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Selection
    // ─────────────────────────────────────────────────────────────────────

    /// Combine `rows` into the selection. With `gap_fill_ms > 0` and at least
    /// two rows, `rows` is first densified in time. Returns whether the
    /// selection changed; a notification fires only in that case.
    pub fn set_selection(&mut self, rows: &RowSet, mode: SelectionMode, gap_fill_ms: i64) -> bool {
        let Some(table) = &self.table else {
            return false;
        };
        let rows: RowSet = rows.iter().copied().filter(|id| table.contains_id(*id)).collect();
        let rows = gap_fill(table, &rows, gap_fill_ms);
        let new_selection = combine(&self.selection, &rows, mode);
        if new_selection == self.selection {
            return false;
        }
        debug!(
            "selection {} -> {} rows ({})",
            self.selection.len(),
            new_selection.len(),
            mode
        );
        self.selection = new_selection;
        self.events.emit(DatasetEvent::SelectionChanged);
        true
    }

    pub fn clear_selection(&mut self) -> bool {
        if self.selection.is_empty() {
            return false;
        }
        self.selection.clear();
        self.events.emit(DatasetEvent::SelectionChanged);
        true
    }

    // ─────────────────────────────────────────────────────────────────────
    // Hidden set
    // ─────────────────────────────────────────────────────────────────────

    fn set_hidden(&mut self, hidden: RowSet) -> bool {
        if hidden == self.hidden {
            return false;
        }
        self.hidden = hidden;
        self.events.emit(DatasetEvent::HiddenChanged);
        true
    }

    /// Add `rows` to the hidden set.
    pub fn hide(&mut self, rows: &RowSet) -> bool {
        let Some(table) = &self.table else {
            return false;
        };
        let mut hidden = self.hidden.clone();
        hidden.extend(rows.iter().copied().filter(|id| table.contains_id(*id)));
        self.set_hidden(hidden)
    }

    /// Hide every row except `rows`.
    pub fn hide_all_except(&mut self, rows: &RowSet) -> bool {
        let Some(table) = &self.table else {
            return false;
        };
        let hidden = table.id_set().difference(rows).copied().collect();
        self.set_hidden(hidden)
    }

    pub fn unhide_all(&mut self) -> bool {
        self.set_hidden(RowSet::new())
    }

    /// Invert which rows are hidden.
    pub fn flip_hidden(&mut self) -> bool {
        let current = self.hidden.clone();
        self.hide_all_except(&current)
    }

    pub fn hide_selection(&mut self) -> bool {
        let sel = self.selection.clone();
        self.hide(&sel)
    }

    pub fn hide_all_except_selection(&mut self) -> bool {
        let sel = self.selection.clone();
        self.hide_all_except(&sel)
    }

    /// Positions of the rows that are not hidden, in table order.
    pub fn visible_positions(&self) -> Vec<usize> {
        let Some(table) = &self.table else {
            return Vec::new();
        };
        table
            .ids()
            .iter()
            .enumerate()
            .filter_map(|(pos, id)| (!self.hidden.contains(id)).then_some(pos))
            .collect()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Labels
    // ─────────────────────────────────────────────────────────────────────

    /// Write `label` into `column` for every selected row. See [`set_label_for`](Self::set_label_for).
    pub fn set_label(&mut self, column: &str, label: Value) -> Result<bool, StoreError> {
        let rows = self.selection.clone();
        self.set_label_for(column, label, &rows)
    }

    /// Write `label` into `column` for `rows`, creating the column if needed.
    /// Returns `Ok(false)` without touching anything if the column name or the
    /// row set is empty.
    pub fn set_label_for(
        &mut self,
        column: &str,
        label: Value,
        rows: &RowSet,
    ) -> Result<bool, StoreError> {
        let table = self.table.as_mut().ok_or(StoreError::NoTable)?;
        let column = column.trim();
        if column.is_empty() || rows.is_empty() {
            return Ok(false);
        }
        let positions = table.positions_of(rows);
        if positions.is_empty() {
            return Ok(false);
        }
        let mut col = table
            .column(column)
            .cloned()
            .unwrap_or_else(|| Column::nulls(column, table.len()));
        for pos in &positions {
            col.values[*pos] = label.clone();
        }
        if let Some(t) = label.dtype() {
            if col.is_all_null() || col.dtype != t {
                col = Column::infer(col.name, col.values);
            }
        }
        table.set_column(col)?;
        info!("labelled {} rows in '{}' as '{}'", positions.len(), column, label.label_string());
        self.events.emit(DatasetEvent::TableChanged);
        Ok(true)
    }

    /// Replace label values in `column`. Targets `""`, `"none"` and `"None"`
    /// become null.
    pub fn rename_labels(&mut self, column: &str, mapping: &[(String, String)]) -> OpStatus {
        let res = self.try_rename_labels(column, mapping);
        if let Err(e) = &res {
            warn!("renaming labels in '{}' failed: {}", column, e);
        }
        res.into()
    }

    fn try_rename_labels(
        &mut self,
        column: &str,
        mapping: &[(String, String)],
    ) -> Result<String, StoreError> {
        let table = self.table.as_mut().ok_or(StoreError::NoTable)?;
        let col = table
            .column(column)
            .ok_or_else(|| StoreError::InvalidColumn(column.to_string()))?;

        let mut targets: HashMap<&str, Value> = HashMap::new();
        for (from, to) in mapping {
            let target = match to.trim() {
                "" | "none" | "None" => Value::Null,
                text => match col.dtype {
                    DType::Int | DType::Float | DType::Bool => Value::Text(text.to_string())
                        .cast(col.dtype)
                        .map_err(|cause| StoreError::TypeCoercion {
                            target: col.dtype.to_string(),
                            cause,
                        })?,
                    _ => Value::Text(text.to_string()),
                },
            };
            targets.insert(from.as_str(), target);
        }

        let values = col
            .values
            .iter()
            .map(|v| {
                if v.is_null() {
                    return v.clone();
                }
                match targets.get(v.label_string().as_str()) {
                    Some(t) => t.clone(),
                    None => v.clone(),
                }
            })
            .collect();
        let renamed = Column::new(col.name.clone(), col.dtype, values);
        table.set_column(renamed)?;
        self.events.emit(DatasetEvent::TableChanged);

        let pairs: Vec<String> = mapping
            .iter()
            .map(|(k, v)| {
                let v = match v.trim() {
                    "" | "none" | "None" => "None",
                    s => s,
                };
                format!("{} -> {}", k, v)
            })
            .collect();
        Ok(format!(
            "Successfully renamed labels in column: '{}' using: {}",
            column,
            pairs.join(", ")
        ))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Column merge
    // ─────────────────────────────────────────────────────────────────────

    /// Merge column `src` into `dst`.
    ///
    /// `dst` of `None`, `""` or `"None"` deletes `src` (unless it is
    /// preserved). `src == dst` only applies the type pin. The merged column
    /// is cast to the pre-merge type of the side named by `target`; a failing
    /// cast leaves the table untouched.
    pub fn merge_columns(
        &mut self,
        src: &str,
        dst: Option<&str>,
        mode: MergeMode,
        preserve_src: bool,
        target: TargetType,
    ) -> OpStatus {
        let res = self.try_merge_columns(src, dst, mode, preserve_src, target);
        if let Err(e) = &res {
            warn!("merging '{}' into {:?} failed: {}", src, dst, e);
        }
        res.into()
    }

    fn try_merge_columns(
        &mut self,
        src: &str,
        dst: Option<&str>,
        mode: MergeMode,
        preserve_src: bool,
        target: TargetType,
    ) -> Result<String, StoreError> {
        let table = self.table.as_mut().ok_or(StoreError::NoTable)?;
        let src_col = table
            .column(src)
            .ok_or_else(|| StoreError::InvalidColumn(src.to_string()))?;
        let dst = dst.map(str::trim).filter(|d| !d.is_empty() && *d != "None");

        let Some(dst) = dst else {
            if preserve_src {
                return Ok(format!("Nothing to do: column {} kept and no destination given", src));
            }
            table.remove_column(src);
            self.events.emit(DatasetEvent::TableChanged);
            return Ok(format!("Removed column {} (no destination given)", src));
        };

        if dst == src {
            // Both sides are the same column, so either pin is its own type.
            let cast = src_col.cast(src_col.dtype)?;
            table.set_column(cast)?;
            self.events.emit(DatasetEvent::TableChanged);
            return Ok(format!(
                "Source and destination are both {}, only the type was coerced",
                src
            ));
        }

        let src_type = src_col.dtype;
        let dst_col = table.column(dst);
        let dst_type = dst_col.map(|c| c.dtype);
        let dst_values = match dst_col {
            Some(c) => c.values.clone(),
            None => vec![Value::Null; table.len()],
        };

        let values: Vec<Value> = match mode {
            MergeMode::OverwriteEntirely => src_col.values.clone(),
            MergeMode::SourcePriority => src_col
                .values
                .iter()
                .zip(dst_values)
                .map(|(s, d)| if s.is_null() { d } else { s.clone() })
                .collect(),
            MergeMode::DestinationPriority => src_col
                .values
                .iter()
                .zip(dst_values)
                .map(|(s, d)| if d.is_null() { s.clone() } else { d })
                .collect(),
        };
        let mut merged = Column::infer(dst, values);
        let pin = match target {
            TargetType::Source => Some(src_type),
            TargetType::Destination => dst_type,
        };
        if let Some(t) = pin {
            merged = merged.cast(t)?;
        }

        // Everything fallible is done; commit.
        if !preserve_src {
            table.remove_column(src);
        }
        table.set_column(merged)?;
        self.events.emit(DatasetEvent::TableChanged);
        Ok(format!(
            "Merged columns {} into {} successfully (using {} mode)",
            src, dst, mode
        ))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Save
    // ─────────────────────────────────────────────────────────────────────

    pub fn save(&self, path: &Path, subset: SaveSubset) -> OpStatus {
        let res = self.try_save(path, subset);
        if let Err(e) = &res {
            warn!("saving to {} failed: {}", path.display(), e);
        }
        res.into()
    }

    fn try_save(&self, path: &Path, subset: SaveSubset) -> Result<String, StoreError> {
        let table = self.table.as_ref().ok_or(SaveError::Empty)?;
        let rows: Option<RowSet> = match subset {
            SaveSubset::All => None,
            SaveSubset::Selection => Some(self.selection.clone()),
            SaveSubset::NotHidden => Some(table.id_set().difference(&self.hidden).copied().collect()),
        };
        let count = rows.as_ref().map_or(table.len(), RowSet::len);
        if count == 0 {
            return Err(SaveError::Empty.into());
        }
        self.io.save(table, path, rows.as_ref())?;
        info!("saved {} rows to {}", count, path.display());
        Ok(format!("Saved {} rows to {}", count, path.display()))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Derived queries
    // ─────────────────────────────────────────────────────────────────────

    /// Spectrogram-capable columns and their vector length.
    pub fn fft_columns(&self) -> BTreeMap<String, usize> {
        let Some(table) = &self.table else {
            return BTreeMap::new();
        };
        table
            .columns()
            .iter()
            .filter_map(|c| c.array_len().map(|n| (c.name.clone(), n)))
            .collect()
    }

    /// Columns usable as label columns.
    pub fn label_columns(&self) -> Vec<String> {
        let Some(table) = &self.table else {
            return Vec::new();
        };
        table
            .columns()
            .iter()
            .filter(|c| c.name != DATETIME_COLUMN && c.is_label_column())
            .map(|c| c.name.clone())
            .collect()
    }

    /// Observed `[min, max]` of a column, as a range spanning itself.
    /// Unbounded for missing or non-orderable columns.
    pub fn column_value_range(&self, column: &str) -> LimitedRange<AxisValue> {
        let Some(col) = self.table.as_ref().and_then(|t| t.column(column)) else {
            return LimitedRange::default();
        };
        column_range(col)
    }

    /// Distinct non-null label strings of a column, sorted.
    pub fn unique_labels(&self, column: &str) -> Vec<String> {
        let Some(col) = self.table.as_ref().and_then(|t| t.column(column)) else {
            return Vec::new();
        };
        let mut labels: Vec<String> = col
            .values
            .iter()
            .filter(|v| !v.is_null())
            .map(Value::label_string)
            .collect();
        labels.sort();
        labels.dedup();
        labels
    }
}

/// Range of the orderable values of a column.
pub fn column_range(col: &Column) -> LimitedRange<AxisValue> {
    let mut min: Option<AxisValue> = None;
    let mut max: Option<AxisValue> = None;
    for v in col.values.iter().filter_map(Value::as_axis_value) {
        if min.as_ref().map_or(true, |m| v < *m) {
            min = Some(v);
        }
        if max.as_ref().map_or(true, |m| v > *m) {
            max = Some(v);
        }
    }
    match (min, max) {
        (Some(min), Some(max)) => LimitedRange::spanning(min, max),
        _ => LimitedRange::default(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Append helpers
// ─────────────────────────────────────────────────────────────────────────────

fn restrict_to_time_range(table: &Table, from: NaiveDateTime, to: NaiveDateTime) -> Table {
    let Some(stamps) = table.timestamps() else {
        return table.clone();
    };
    let keep: Vec<usize> = stamps
        .iter()
        .enumerate()
        .filter_map(|(pos, ts)| ts.filter(|t| *t >= from && *t <= to).map(|_| pos))
        .collect();
    table.take_rows(&keep)
}

fn merge_rows(existing: Table, new_rows: &Table, policy: DuplicatePolicy) -> (Table, AppendSummary) {
    let mut summary = AppendSummary::default();
    let mut next_id = existing.next_row_id();
    let (mut ids, mut columns) = existing.into_parts();
    let base_len = ids.len();

    for c in new_rows.columns() {
        if !columns.iter().any(|e| e.name == c.name) {
            columns.push(Column::new(c.name.clone(), c.dtype, vec![Value::Null; base_len]));
        }
    }

    let ts_pos = columns.iter().position(|c| c.name == DATETIME_COLUMN);
    let mut by_time: HashMap<NaiveDateTime, usize> = HashMap::new();
    if let Some(tp) = ts_pos {
        for (row, v) in columns[tp].values.iter().enumerate() {
            if let Value::DateTime(dt) = v {
                by_time.entry(*dt).or_insert(row);
            }
        }
    }

    // Column index in `columns` for every column of `new_rows`.
    let mapping: Vec<usize> = new_rows
        .columns()
        .iter()
        .filter_map(|c| columns.iter().position(|e| e.name == c.name))
        .collect();

    for row in 0..new_rows.len() {
        let stamp = new_rows
            .value(row, DATETIME_COLUMN)
            .and_then(Value::as_datetime);
        if let Some(&target) = stamp.as_ref().and_then(|t| by_time.get(t)) {
            for (src, &dst) in new_rows.columns().iter().zip(&mapping) {
                let incoming = &src.values[row];
                if incoming.is_null() {
                    continue;
                }
                let cell = &mut columns[dst].values[target];
                if policy == DuplicatePolicy::Overwrite || cell.is_null() {
                    *cell = incoming.clone();
                }
            }
            summary.merged += 1;
            continue;
        }
        let pos = ids.len();
        ids.push(next_id);
        next_id += 1;
        for c in columns.iter_mut() {
            c.values.push(Value::Null);
        }
        for (src, &dst) in new_rows.columns().iter().zip(&mapping) {
            columns[dst].values[pos] = src.values[row].clone();
        }
        if let Some(t) = stamp {
            by_time.entry(t).or_insert(pos);
        }
        summary.appended += 1;
    }

    for (src, &dst) in new_rows.columns().iter().zip(&mapping) {
        if columns[dst].dtype != src.dtype {
            let c = std::mem::replace(&mut columns[dst], Column::nulls("", 0));
            columns[dst] = Column::infer(c.name, c.values);
        }
    }

    let table = build_unchecked(ids, columns);
    (table, summary)
}

fn build_unchecked(ids: Vec<RowId>, columns: Vec<Column>) -> Table {
    match Table::from_columns(ids, columns) {
        Ok(t) => t,
        Err(e) => {
            // Only reachable if the inputs were already inconsistent.
            warn!("append produced an inconsistent table ({}); keeping an empty table", e);
            Table::new()
        }
    }
}

/// Bucket rows by `interval`, keeping per bucket the first row id and, per
/// column, the last non-null value. The timestamp becomes the bucket start.
fn resample_last(table: &Table, interval: chrono::Duration) -> Table {
    let interval_ms = interval.num_milliseconds();
    let Some(stamps) = table.timestamps() else {
        warn!("resample skipped: table has no timestamp column");
        return table.clone();
    };
    if interval_ms <= 0 {
        return table.clone();
    }

    let mut order: Vec<usize> = (0..table.len()).collect();
    order.sort_by_key(|&p| stamps[p]);

    let mut groups: Vec<(Option<i64>, Vec<usize>)> = Vec::new();
    for p in order {
        let bucket = stamps[p].map(|t| {
            let ms = (datetime_to_secs(&t) * 1000.0).round() as i64;
            ms.div_euclid(interval_ms)
        });
        match groups.last_mut() {
            Some((b, rows)) if bucket.is_some() && *b == bucket => rows.push(p),
            _ => groups.push((bucket, vec![p])),
        }
    }

    let ids: Vec<RowId> = groups.iter().map(|(_, rows)| table.ids()[rows[0]]).collect();
    let columns = table
        .columns()
        .iter()
        .map(|c| {
            let values = groups
                .iter()
                .map(|(bucket, rows)| {
                    if c.name == DATETIME_COLUMN {
                        if let Some(b) = bucket {
                            let start = super::range::secs_to_datetime((b * interval_ms) as f64 / 1000.0);
                            return start.map_or(Value::Null, Value::DateTime);
                        }
                    }
                    rows.iter()
                        .rev()
                        .map(|&p| &c.values[p])
                        .find(|v| !v.is_null())
                        .cloned()
                        .unwrap_or(Value::Null)
                })
                .collect();
            Column::new(c.name.clone(), c.dtype, values)
        })
        .collect();
    build_unchecked(ids, columns)
}

/// Stable sort by primary timestamp; rows without one go last.
fn sort_by_timestamp(table: &Table) -> Table {
    let Some(stamps) = table.timestamps() else {
        return table.clone();
    };
    let mut order: Vec<usize> = (0..table.len()).collect();
    order.sort_by_key(|&p| (stamps[p].is_none(), stamps[p]));
    table.take_rows(&order)
}

fn drop_empty_rows(table: &Table) -> Table {
    let data_cols: Vec<&Column> = table
        .columns()
        .iter()
        .filter(|c| c.name != DATETIME_COLUMN)
        .collect();
    if data_cols.is_empty() {
        return table.clone();
    }
    let keep: Vec<usize> = (0..table.len())
        .filter(|&p| data_cols.iter().any(|c| !c.values[p].is_null()))
        .collect();
    if keep.len() == table.len() {
        return table.clone();
    }
    table.take_rows(&keep)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryIo;

    fn ts(s: u32) -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2020, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, s))
            .unwrap()
    }

    fn store_with(table: Table) -> DatasetStore {
        let mut store = DatasetStore::with_io(Box::new(MemoryIo::default()));
        store.replace_table(table, None);
        store
    }

    #[test]
    fn resample_keeps_last_non_null_per_bucket() {
        let t = Table::with_sequential_ids(vec![
            Column::from_datetimes(DATETIME_COLUMN, [ts(0), ts(0), ts(1)]),
            Column::new("a", DType::Float, vec![Value::Float(1.0), Value::Null, Value::Float(3.0)]),
        ])
        .unwrap();
        let r = resample_last(&t, chrono::Duration::seconds(1));
        assert_eq!(r.ids(), &[0, 2]);
        assert_eq!(r.value(0, "a"), Some(&Value::Float(1.0)));
    }

    #[test]
    fn drop_empty_rows_ignores_timestamp() {
        let t = Table::with_sequential_ids(vec![
            Column::from_datetimes(DATETIME_COLUMN, [ts(0), ts(1)]),
            Column::new("a", DType::Float, vec![Value::Null, Value::Float(3.0)]),
        ])
        .unwrap();
        assert_eq!(drop_empty_rows(&t).ids(), &[1]);
    }

    #[test]
    fn label_into_new_column_creates_it() {
        let t = Table::with_sequential_ids(vec![Column::from_f64("a", [1.0, 2.0])]).unwrap();
        let mut store = store_with(t);
        let rows: RowSet = [1].into_iter().collect();
        assert!(store
            .set_label_for("activity", Value::Text("walk".into()), &rows)
            .unwrap());
        let col = store.table().unwrap().column("activity").unwrap();
        assert_eq!(col.dtype, DType::Text);
        assert_eq!(col.values, vec![Value::Null, Value::Text("walk".into())]);
    }

    #[test]
    fn rename_coerces_none_to_null() {
        let t = Table::with_sequential_ids(vec![Column::from_text(
            "l",
            [Some("a"), Some("b"), None],
        )])
        .unwrap();
        let mut store = store_with(t);
        let st = store.rename_labels("l", &[("a".into(), "x".into()), ("b".into(), "None".into())]);
        assert!(st.success, "{}", st.message);
        assert_eq!(
            st.message,
            "Successfully renamed labels in column: 'l' using: a -> x, b -> None"
        );
        let col = store.table().unwrap().column("l").unwrap();
        assert_eq!(col.values, vec![Value::Text("x".into()), Value::Null, Value::Null]);
    }

    #[test]
    fn rename_on_missing_column_fails() {
        let t = Table::with_sequential_ids(vec![Column::from_f64("a", [1.0])]).unwrap();
        let mut store = store_with(t);
        let st = store.rename_labels("nope", &[]);
        assert!(!st.success);
        assert!(st.message.contains("nope"));
    }
}
