//! Selection set algebra and temporal gap-fill.

use std::fmt;

use log::warn;
use serde::{Deserialize, Serialize};

use super::range::datetime_to_secs;
use super::table::{RowSet, Table};

/// How a new set of rows is combined with the current selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SelectionMode {
    /// Replace the selection.
    #[default]
    Overwrite,
    /// Union.
    Append,
    /// Subtract.
    Complement,
}

impl fmt::Display for SelectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionMode::Overwrite => f.write_str("overwrite"),
            SelectionMode::Append => f.write_str("append"),
            SelectionMode::Complement => f.write_str("complement"),
        }
    }
}

/// Combine `current` and `new` according to `mode`.
pub fn combine(current: &RowSet, new: &RowSet, mode: SelectionMode) -> RowSet {
    match mode {
        SelectionMode::Overwrite => new.clone(),
        SelectionMode::Append => current.union(new).copied().collect(),
        SelectionMode::Complement => current.difference(new).copied().collect(),
    }
}

/// Densify a sparse temporal selection.
///
/// A row is kept when a selected timestamp lies within `fill_ms / 2` before it
/// *and* one lies within `fill_ms / 2` after it (both windows closed, the row's
/// own timestamp counting for both). The pass runs twice, so gaps of up to
/// `fill_ms` between selected points get filled while isolated points stay
/// isolated. Rows without a timestamp keep their original membership.
///
/// Nothing happens for fewer than two selected rows, a non-positive tolerance,
/// or a table without a timestamp column.
pub fn gap_fill(table: &Table, rows: &RowSet, fill_ms: i64) -> RowSet {
    if rows.len() < 2 || fill_ms <= 0 {
        return rows.clone();
    }
    let Some(stamps) = table.timestamps() else {
        warn!("gap-fill skipped: table has no timestamp column");
        return rows.clone();
    };
    let half = fill_ms / 2;
    let millis: Vec<Option<i64>> = stamps
        .iter()
        .map(|ts| ts.map(|t| (datetime_to_secs(&t) * 1000.0).round() as i64))
        .collect();

    let mut mask: Vec<bool> = table.ids().iter().map(|id| rows.contains(id)).collect();
    for _ in 0..2 {
        mask = fill_pass(&millis, &mask, half);
    }

    table
        .ids()
        .iter()
        .zip(mask)
        .filter_map(|(id, keep)| keep.then_some(*id))
        .collect()
}

fn fill_pass(millis: &[Option<i64>], mask: &[bool], half: i64) -> Vec<bool> {
    let mut selected: Vec<i64> = millis
        .iter()
        .zip(mask)
        .filter_map(|(t, &m)| if m { *t } else { None })
        .collect();
    selected.sort_unstable();

    millis
        .iter()
        .zip(mask)
        .map(|(t, &m)| match t {
            None => m,
            Some(t) => {
                let before = first_at_or_after(&selected, t - half).is_some_and(|s| s <= *t);
                let after = first_at_or_after(&selected, *t).is_some_and(|s| s <= t + half);
                before && after
            }
        })
        .collect()
}

fn first_at_or_after(sorted: &[i64], v: i64) -> Option<i64> {
    let idx = sorted.partition_point(|&s| s < v);
    sorted.get(idx).copied()
}
