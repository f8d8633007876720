use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use labelplot::data::store::{AppendOptions, DuplicatePolicy, MergeMode, SaveSubset, TargetType};
use labelplot::events::{drain, EventFilter, EventKind};
use labelplot::io::MemoryIo;
use labelplot::{Column, DatasetEvent, DatasetStore, RowSet, SelectionMode, Table, Value};

// Helper: noon on a fixed day plus `s` seconds
fn ts(s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2021, 3, 1)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
        + chrono::Duration::seconds(s as i64)
}

// Helper: one row per second, row id == second
fn seconds_table(n: u32) -> Table {
    Table::with_sequential_ids(vec![
        Column::from_datetimes("DateTime", (0..n).map(ts)),
        Column::from_f64("Depth(m)", (0..n).map(|i| i as f64)),
    ])
    .unwrap()
}

fn store_with(table: Table) -> DatasetStore {
    let mut store = DatasetStore::new();
    store.replace_table(table, None);
    store
}

fn set(ids: &[u64]) -> RowSet {
    ids.iter().copied().collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Selection algebra and gap-fill
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn overwrite_keeps_only_known_rows() {
    let mut store = store_with(seconds_table(5));
    assert!(store.set_selection(&set(&[1, 3, 99]), SelectionMode::Overwrite, 0));
    assert_eq!(store.selection(), &set(&[1, 3]));
}

#[test]
fn append_and_complement() {
    let mut store = store_with(seconds_table(8));
    store.set_selection(&set(&[1, 2, 3]), SelectionMode::Overwrite, 0);
    store.set_selection(&set(&[3, 4]), SelectionMode::Append, 0);
    assert_eq!(store.selection(), &set(&[1, 2, 3, 4]));
    store.set_selection(&set(&[2, 4, 7]), SelectionMode::Complement, 0);
    assert_eq!(store.selection(), &set(&[1, 3]));
}

#[test]
fn unchanged_selection_emits_nothing() {
    let mut store = store_with(seconds_table(5));
    store.set_selection(&set(&[1]), SelectionMode::Overwrite, 0);
    let rx = store.subscribe(EventFilter::only(EventKind::SELECTION_CHANGED));
    assert!(!store.set_selection(&set(&[1]), SelectionMode::Overwrite, 0));
    assert!(drain(&rx).is_empty());
    assert!(store.set_selection(&set(&[2]), SelectionMode::Append, 0));
    assert_eq!(drain(&rx), vec![DatasetEvent::SelectionChanged]);
}

#[test]
fn gap_fill_scenarios() {
    let cases: [(i64, &[u64]); 4] = [
        (4000, &[1, 2, 3, 4, 5, 6, 7]),
        (2000, &[1, 5, 6, 7]),
        (1000, &[1, 5, 7]),
        (0, &[1, 5, 7]),
    ];
    for (fill, expected) in cases {
        let mut store = store_with(seconds_table(11));
        store.set_selection(&set(&[1, 5, 7]), SelectionMode::Overwrite, fill);
        assert_eq!(store.selection(), &set(expected), "gap_fill_ms = {}", fill);
    }
}

#[test]
fn gap_fill_leaves_single_row_alone() {
    let mut store = store_with(seconds_table(11));
    store.set_selection(&set(&[4]), SelectionMode::Overwrite, 10_000);
    assert_eq!(store.selection(), &set(&[4]));
}

// ─────────────────────────────────────────────────────────────────────────────
// Hidden set
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn hiding_never_touches_selection() {
    let mut store = store_with(seconds_table(6));
    store.set_selection(&set(&[0, 2, 5]), SelectionMode::Overwrite, 0);
    let all = store.table().unwrap().id_set();
    store.hide(&all);
    assert_eq!(store.hidden().len(), 6);
    assert!(store.visible_positions().is_empty());
    store.unhide_all();
    assert!(store.hidden().is_empty());
    assert_eq!(store.selection(), &set(&[0, 2, 5]));
}

#[test]
fn flip_hidden_twice_restores() {
    let mut store = store_with(seconds_table(6));
    store.hide(&set(&[1, 4]));
    store.flip_hidden();
    assert_eq!(store.hidden(), &set(&[0, 2, 3, 5]));
    store.flip_hidden();
    assert_eq!(store.hidden(), &set(&[1, 4]));
}

#[test]
fn hide_all_except_selection() {
    let mut store = store_with(seconds_table(4));
    store.set_selection(&set(&[2]), SelectionMode::Overwrite, 0);
    store.hide_all_except_selection();
    assert_eq!(store.visible_positions(), vec![2]);
    store.hide_selection();
    assert!(store.visible_positions().is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Load and append
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn load_resets_selection_and_hidden() {
    let io = MemoryIo::with_file("data.lpt", seconds_table(5));
    let mut store = DatasetStore::with_io(Box::new(io));
    let path = Path::new("data.lpt");
    store.load(path).unwrap();
    store.set_selection(&set(&[1, 2]), SelectionMode::Overwrite, 0);
    store.hide(&set(&[3]));
    store.load(path).unwrap();
    assert!(store.selection().is_empty());
    assert!(store.hidden().is_empty());
    assert_eq!(store.source(), Some(path));
}

#[test]
fn failed_load_keeps_everything() {
    let io = MemoryIo::with_file("data.lpt", seconds_table(5));
    let mut store = DatasetStore::with_io(Box::new(io));
    store.load(Path::new("data.lpt")).unwrap();
    store.set_selection(&set(&[1]), SelectionMode::Overwrite, 0);
    assert!(store.load(Path::new("missing.lpt")).is_err());
    assert_eq!(store.table().unwrap().len(), 5);
    assert_eq!(store.selection(), &set(&[1]));
}

#[test]
fn append_preserves_selection() {
    let mut store = store_with(seconds_table(5));
    store.set_selection(&set(&[1, 3]), SelectionMode::Overwrite, 0);
    let more = Table::with_sequential_ids(vec![
        Column::from_datetimes("DateTime", (5..8).map(ts)),
        Column::from_f64("Depth(m)", [50.0, 60.0, 70.0]),
    ])
    .unwrap();
    let summary = store.append(more, &AppendOptions::default());
    assert_eq!(summary.appended, 3);
    let table = store.table().unwrap();
    assert_eq!(table.len(), 8);
    assert!(table.contains_id(1) && table.contains_id(3));
    assert_eq!(store.selection(), &set(&[1, 3]));
}

#[test]
fn append_duplicates_follow_policy() {
    let dup = || {
        Table::with_sequential_ids(vec![
            Column::from_datetimes("DateTime", [ts(2)]),
            Column::from_f64("Depth(m)", [99.0]),
        ])
        .unwrap()
    };

    let mut keep = store_with(seconds_table(4));
    let summary = keep.append(dup(), &AppendOptions::default());
    assert_eq!(summary.merged, 1);
    assert_eq!(keep.table().unwrap().len(), 4);
    assert_eq!(keep.table().unwrap().value(2, "Depth(m)"), Some(&Value::Float(2.0)));

    let mut over = store_with(seconds_table(4));
    let opts = AppendOptions {
        duplicate_policy: DuplicatePolicy::Overwrite,
        ..AppendOptions::default()
    };
    over.append(dup(), &opts);
    assert_eq!(over.table().unwrap().value(2, "Depth(m)"), Some(&Value::Float(99.0)));
}

// ─────────────────────────────────────────────────────────────────────────────
// Labels and columns
// ─────────────────────────────────────────────────────────────────────────────

fn labelled_table() -> Table {
    Table::with_sequential_ids(vec![
        Column::from_datetimes("DateTime", (0..4).map(ts)),
        Column::from_text("A", [Some("walk"), None, Some("run"), None]),
        Column::from_i64("n", [Some(1), Some(2), None, Some(4)]),
    ])
    .unwrap()
}

#[test]
fn merge_round_trip_restores_source() {
    let mut store = store_with(labelled_table());
    let original = store.table().unwrap().column("A").unwrap().values.clone();

    let st = store.merge_columns("A", Some("B"), MergeMode::SourcePriority, false, TargetType::Destination);
    assert!(st.success, "{}", st.message);
    assert!(!store.table().unwrap().has_column("A"));

    let st = store.merge_columns("B", Some("A"), MergeMode::DestinationPriority, true, TargetType::Destination);
    assert!(st.success, "{}", st.message);
    let restored = &store.table().unwrap().column("A").unwrap().values;
    for (o, r) in original.iter().zip(restored) {
        if !o.is_null() {
            assert_eq!(o, r);
        }
    }
    assert!(store.table().unwrap().has_column("B"));
}

#[test]
fn merge_with_failing_cast_changes_nothing() {
    let mut store = store_with(labelled_table());
    let before = store.table().unwrap().clone();
    let st = store.merge_columns("A", Some("n"), MergeMode::SourcePriority, false, TargetType::Destination);
    assert!(!st.success);
    assert_eq!(store.table().unwrap(), &before);
}

#[test]
fn merge_without_destination_deletes_source() {
    let mut store = store_with(labelled_table());
    let st = store.merge_columns("A", Some("None"), MergeMode::SourcePriority, false, TargetType::Source);
    assert!(st.success);
    assert!(!store.table().unwrap().has_column("A"));
}

#[test]
fn rename_labels_maps_and_clears() {
    let mut store = store_with(labelled_table());
    let mapping = vec![
        ("walk".to_string(), "stroll".to_string()),
        ("run".to_string(), "none".to_string()),
    ];
    let st = store.rename_labels("A", &mapping);
    assert!(st.success, "{}", st.message);
    assert_eq!(store.unique_labels("A"), vec!["stroll".to_string()]);
}

#[test]
fn label_selection_into_new_column() {
    let mut store = store_with(labelled_table());
    store.set_selection(&set(&[0, 3]), SelectionMode::Overwrite, 0);
    assert!(store.set_label("activity", Value::Text("swim".into())).unwrap());
    let col = store.table().unwrap().column("activity").unwrap();
    assert_eq!(col.values[0], Value::Text("swim".into()));
    assert!(col.values[1].is_null());
    assert!(store.label_columns().contains(&"activity".to_string()));
}

#[test]
fn save_subsets() {
    let mut store = DatasetStore::with_io(Box::new(MemoryIo::default()));
    store.replace_table(seconds_table(5), None);
    let path = Path::new("out.lpt");

    assert!(!store.save(path, SaveSubset::Selection).success);
    store.set_selection(&set(&[1, 2]), SelectionMode::Overwrite, 0);
    assert!(store.save(path, SaveSubset::Selection).success);
    store.hide(&set(&[0, 1, 2, 3, 4]));
    assert!(!store.save(path, SaveSubset::NotHidden).success);
    assert!(store.save(path, SaveSubset::All).success);
}
