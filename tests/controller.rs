use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use labelplot::controller::Gesture;
use labelplot::hooks::{HookHost, HookRegistry, ScriptHook};
use labelplot::persistence::PlotSettingsSerde;
use labelplot::io::{MemoryIo, TableIo as _};
use labelplot::{
    AxisValue, Column, Controller, DatasetStore, LimitedRange, PlotSettingsModel, SelectionMode, Table, Value,
};

// Helper: 2021-03-01 12:00:00 plus `s` seconds
fn ts(s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2021, 3, 1)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
        + chrono::Duration::seconds(s as i64)
}

fn table(n: u32) -> Table {
    Table::with_sequential_ids(vec![
        Column::from_datetimes("DateTime", (0..n).map(ts)),
        Column::from_f64("Depth(m)", (0..n).map(|i| (i % 4) as f64)),
        Column::from_text("activity", (0..n).map(|_| None::<String>).collect::<Vec<_>>()),
        Column::from_i64("class", (0..n).map(|i| Some(i64::from(i % 2)))),
    ])
    .unwrap()
}

// Helper: controller whose store reads `data.lpt` (10 rows) and `big.lpt` (20 rows)
fn loaded_controller() -> Controller {
    let io = MemoryIo::with_file("data.lpt", table(10));
    io.save(&table(20), Path::new("big.lpt"), None).unwrap();
    let store = DatasetStore::with_io(Box::new(io));
    let mut c = Controller::new(store, PlotSettingsModel::default(), HookRegistry::with_builtins());
    let st = c.load(Path::new("data.lpt"));
    assert!(st.success, "{}", st.message);
    c
}

#[test]
fn load_fits_settings_to_table() {
    let c = loaded_controller();
    let s = c.settings();
    assert_eq!(s.x_axis, "DateTime");
    assert_eq!(s.plot_list, ["Depth(m)"]);
    assert_eq!(s.plot_domain.left_val(), Some(AxisValue::DateTime(ts(0))));
    assert_eq!(s.plot_domain.right_val(), Some(AxisValue::DateTime(ts(9))));
    assert_eq!(c.view().x_axis.current(), "DateTime");
    assert!(c.view().label_columns.contains(&"class".to_string()));
    assert!(c.figure().is_some());
    assert!(c.render_error().is_none());
}

#[test]
fn span_gesture_then_label() {
    let mut c = loaded_controller();
    assert!(c.apply_gesture(&Gesture::Span(f64::MIN, f64::MAX), SelectionMode::Overwrite));
    assert_eq!(c.store().selection().len(), 10);

    let st = c.apply_label("activity", "walk");
    assert!(st.success, "{}", st.message);
    assert_eq!(c.store().unique_labels("activity"), vec!["walk".to_string()]);

    let st = c.apply_label("class", "seven");
    assert!(!st.success);
    let st = c.apply_label("class", "7");
    assert!(st.success, "{}", st.message);
    assert_eq!(c.store().table().unwrap().value(0, "class"), Some(&Value::Int(7)));

    assert!(c.apply_label("class", "none").success);
    assert!(c.store().table().unwrap().column("class").unwrap().is_all_null());
}

#[test]
fn hiding_everything_keeps_last_frame() {
    let mut c = loaded_controller();
    let generation = c.figure().map(|f| f.generation);
    c.apply_gesture(&Gesture::Span(f64::MIN, f64::MAX), SelectionMode::Overwrite);
    c.hide_selection();
    assert!(c.render_error().is_some());
    assert_eq!(c.figure().map(|f| f.generation), generation);
    assert_eq!(c.store().selection().len(), 10);

    c.unhide_all();
    assert!(c.render_error().is_none());
}

#[test]
fn selection_only_recolors() {
    let mut c = loaded_controller();
    let generation = c.figure().map(|f| f.generation);
    let first_x = c.figure().unwrap().translator.clouds()[0].x[0];
    c.apply_gesture(&Gesture::Span(first_x, first_x + 2.5), SelectionMode::Overwrite);
    assert_eq!(c.store().selection().len(), 3);
    assert_eq!(c.figure().map(|f| f.generation), generation);
    let cloud = &c.figure().unwrap().translator.clouds()[0];
    assert_ne!(cloud.colors, cloud.base_colors);
}

#[test]
fn reload_clears_selection_and_respans_domain() {
    let mut c = loaded_controller();
    c.apply_gesture(&Gesture::Span(f64::MIN, f64::MAX), SelectionMode::Overwrite);
    assert!(c.load(Path::new("big.lpt")).success);
    assert!(c.store().selection().is_empty());
    assert_eq!(c.settings().plot_domain.right_val(), Some(AxisValue::DateTime(ts(19))));
}

#[test]
fn domain_to_view_and_reset() {
    let mut c = loaded_controller();
    let x0 = c.figure().unwrap().translator.clouds()[0].x[0];
    assert!(c.set_xlim_to_view(x0 + 2.0, x0 + 5.0));
    assert_eq!(c.settings().plot_domain.left_val(), Some(AxisValue::DateTime(ts(2))));
    assert_eq!(c.figure().unwrap().translator.clouds()[0].len(), 4);

    c.reset_plot_domain();
    c.process_events();
    assert_eq!(c.figure().unwrap().translator.clouds()[0].len(), 10);
}

#[test]
fn picks_reject_unknown_columns() {
    let mut c = loaded_controller();
    assert!(!c.pick_x_axis("no-such-column"));
    assert_eq!(c.settings().x_axis, "DateTime");
    assert!(c.pick_x_axis("Depth(m)"));
    assert_eq!(c.settings().x_axis, "Depth(m)");
    assert_eq!(c.settings().plot_domain.max_val(), Some(AxisValue::Number(3.0)));
}

#[test]
fn builtin_hook_runs_and_replots() {
    let mut c = loaded_controller();
    let st = c.run_hook("normalize-numeric");
    assert!(st.success, "{}", st.message);
    let depth = c.store().table().unwrap().column("Depth(m)").unwrap();
    let max = depth.values.iter().filter_map(Value::as_f64).fold(f64::MIN, f64::max);
    assert!((max - 1.0).abs() < 1e-9);

    assert!(!c.run_hook("missing").success);
}

#[test]
fn reset_settings_refits_table() {
    let mut c = loaded_controller();
    c.pick_x_axis("Depth(m)");
    c.reset_plot_settings();
    assert_eq!(c.settings().x_axis, "DateTime");
    assert_eq!(c.settings().plot_list, ["Depth(m)"]);
    assert!(c.figure().is_some());
}

// Helper: a hook that points the column settings at names the table lacks
struct StaleColumns;

impl ScriptHook for StaleColumns {
    fn name(&self) -> &str {
        "stale-columns"
    }

    fn apply(
        &self,
        _store: &mut DatasetStore,
        settings: &mut PlotSettingsModel,
        _host: &mut dyn HookHost,
    ) -> anyhow::Result<()> {
        settings.set_x_axis("gone".into());
        settings.set_color_column("also-gone".into());
        Ok(())
    }
}

#[test]
fn hook_settings_are_revalidated() {
    let mut c = loaded_controller();
    c.hooks_mut().add_script(Box::new(StaleColumns));
    assert!(c.run_hook("stale-columns").success);

    assert_eq!(c.settings().x_axis, "DateTime");
    assert_eq!(c.view().x_axis.current(), "DateTime");
    assert_eq!(c.settings().color_column, "activity");
    assert_eq!(c.view().color_column.current(), "activity");
    assert!(c.render_error().is_none());
    assert_eq!(c.figure().unwrap().translator.clouds()[0].len(), 10);
}

#[test]
fn settings_snapshot_restores_axis_and_domain() {
    let mut c = loaded_controller();
    let x0 = c.figure().unwrap().translator.clouds()[0].x[0];
    c.set_xlim_to_view(x0 + 2.0, x0 + 5.0);
    let snapshot = PlotSettingsSerde::from(c.settings());

    assert!(c.pick_x_axis("Depth(m)"));
    c.apply_settings_snapshot(snapshot);

    assert_eq!(c.settings().x_axis, "DateTime");
    assert_eq!(c.settings().plot_domain.left_val(), Some(AxisValue::DateTime(ts(2))));
    assert_eq!(c.settings().plot_domain.right_val(), Some(AxisValue::DateTime(ts(5))));
    assert_eq!(c.settings().plot_domain.max_val(), Some(AxisValue::DateTime(ts(9))));
    assert_eq!(c.figure().unwrap().translator.clouds()[0].len(), 4);
}

#[test]
fn bins_to_view_respects_lower_limit() {
    let mut c = loaded_controller();
    c.settings_model()
        .set_spectrogram_lines(LimitedRange::spanning(4usize, 12));
    c.process_events();
    assert!(c.set_spectrogram_lines_to_view(0.0, 0.5));
    let lines = &c.settings().spectrogram.lines;
    assert_eq!((lines.left_val(), lines.right_val()), (Some(4), Some(8)));
}
