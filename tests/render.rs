use chrono::{NaiveDate, NaiveDateTime};
use labelplot::data::settings::ColorMethod;
use labelplot::hooks::{FnFilter, HookRegistry};
use labelplot::render::{build_figure, RenderOrchestrator};
use labelplot::{AxisValue, Column, DatasetStore, PlotSettingsModel, RenderError, RowSet, Table};

// Helper: 2021-03-01 12:00:00 plus `s` seconds
fn ts(s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2021, 3, 1)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
        + chrono::Duration::seconds(s as i64)
}

// Helper: six rows with two numeric series, a label column and spectra
fn sample_store() -> DatasetStore {
    let table = Table::with_sequential_ids(vec![
        Column::from_datetimes("DateTime", (0..6).map(ts)),
        Column::from_f64("Depth(m)", [0.0, 1.0, 2.0, 3.0, 2.0, 1.0]),
        Column::from_f64("Temp", [10.0, 11.0, 12.0, 12.5, 13.0, 14.0]),
        Column::from_text("activity", [Some("walk"), Some("walk"), None, Some("run"), Some("run"), None]),
        Column::from_arrays("spectrum", (0..6).map(|i| vec![i as f64 + 1.0; 8])),
    ])
    .unwrap();
    let mut store = DatasetStore::new();
    store.replace_table(table, None);
    store
}

fn settings_for(columns: &[&str]) -> PlotSettingsModel {
    let mut m = PlotSettingsModel::default();
    m.set_plot_list(columns.iter().map(|c| c.to_string()).collect());
    m
}

#[test]
fn builds_one_axis_per_series() {
    let store = sample_store();
    let settings = settings_for(&["Depth(m)", "Temp"]);
    let fig = build_figure(&store, settings.get(), &HookRegistry::default()).unwrap();
    assert_eq!(fig.axes.len(), 2);
    assert_eq!(fig.translator.clouds().len(), 2);
    assert_eq!(fig.translator.clouds()[0].len(), 6);
    assert!(fig.x_formatter.is_time());
    assert!(fig.warnings.is_empty());
}

#[test]
fn missing_table_and_axis() {
    let settings = settings_for(&["Depth(m)"]);
    let empty = DatasetStore::new();
    assert!(matches!(
        build_figure(&empty, settings.get(), &HookRegistry::default()),
        Err(RenderError::NoTable)
    ));

    let mut settings = settings;
    settings.set_x_axis(String::new());
    assert!(matches!(
        build_figure(&sample_store(), settings.get(), &HookRegistry::default()),
        Err(RenderError::NoXAxis)
    ));

    settings.set_x_axis("activity".into());
    assert!(matches!(
        build_figure(&sample_store(), settings.get(), &HookRegistry::default()),
        Err(RenderError::InvalidColumn(_))
    ));
}

#[test]
fn hidden_rows_are_not_drawn() {
    let mut store = sample_store();
    store.hide(&[0, 1].into_iter().collect());
    let settings = settings_for(&["Depth(m)"]);
    let fig = build_figure(&store, settings.get(), &HookRegistry::default()).unwrap();
    assert_eq!(fig.translator.clouds()[0].ids, vec![2, 3, 4, 5]);
}

#[test]
fn domain_window_cuts_rows() {
    let store = sample_store();
    let mut settings = settings_for(&["Depth(m)"]);
    settings.set_domain_window(Some(AxisValue::DateTime(ts(2))), Some(AxisValue::DateTime(ts(4))));
    let fig = build_figure(&store, settings.get(), &HookRegistry::default()).unwrap();
    assert_eq!(fig.translator.clouds()[0].ids, vec![2, 3, 4]);
}

#[test]
fn row_filters_run_before_the_domain() {
    let store = sample_store();
    let settings = settings_for(&["Temp"]);
    let mut hooks = HookRegistry::default();
    hooks.add_filter(Box::new(FnFilter::new("drop-first", |t: Table| {
        let keep: Vec<usize> = (1..t.len()).collect();
        Ok(t.take_rows(&keep))
    })));
    let fig = build_figure(&store, settings.get(), &hooks).unwrap();
    assert_eq!(fig.translator.clouds()[0].len(), 5);
}

#[test]
fn coloring_by_label_needs_a_column() {
    let store = sample_store();
    let mut settings = settings_for(&["Depth(m)"]);
    settings.set_color_method(ColorMethod::ByLabel);
    assert!(matches!(
        build_figure(&store, settings.get(), &HookRegistry::default()),
        Err(RenderError::MissingColorColumn)
    ));

    settings.set_color_column("activity".into());
    let fig = build_figure(&store, settings.get(), &HookRegistry::default()).unwrap();
    let names: Vec<&str> = fig.legend.iter().map(|e| e.name.as_str()).collect();
    assert!(names.contains(&"walk") && names.contains(&"run") && names.contains(&"None"));
}

#[test]
fn label_bars_follow_plotted_labels() {
    let store = sample_store();
    let mut settings = settings_for(&["Depth(m)"]);
    settings.set_plotted_labels(vec!["activity".into()]);
    let fig = build_figure(&store, settings.get(), &HookRegistry::default()).unwrap();
    assert_eq!(fig.label_bars.len(), 1);
    assert_eq!(fig.label_bars[0].column, "activity");
    assert!(fig.label_classes.names.contains(&"walk".to_string()));
}

#[test]
fn spectrogram_needs_timestamp_axis() {
    let store = sample_store();
    let mut settings = settings_for(&["Temp"]);
    settings.set_spectrogram_column("spectrum".into());
    settings.set_spectrogram_enabled(true);
    let fig = build_figure(&store, settings.get(), &HookRegistry::default()).unwrap();
    let mesh = fig.spectrogram.expect("mesh");
    assert_eq!(mesh.cols(), 6);
    assert_eq!(mesh.rows(), 8);

    settings.set_x_axis("Depth(m)".into());
    let fig = build_figure(&store, settings.get(), &HookRegistry::default()).unwrap();
    assert!(fig.spectrogram.is_none());
    assert_eq!(fig.warnings.len(), 1);
    assert_eq!(fig.translator.clouds().len(), 1);
}

#[test]
fn failed_redraw_keeps_previous_frame() {
    let mut store = sample_store();
    let settings = settings_for(&["Depth(m)"]);
    let hooks = HookRegistry::default();
    let mut r = RenderOrchestrator::new();
    assert!(r.redraw(&store, settings.get(), &hooks));
    let generation = r.generation();

    let all: RowSet = store.table().unwrap().id_set();
    store.hide(&all);
    assert!(!r.redraw(&store, settings.get(), &hooks));
    assert!(r.last_error().is_some());
    assert_eq!(r.figure().map(|f| f.generation), Some(generation));

    store.unhide_all();
    assert!(r.redraw(&store, settings.get(), &hooks));
    assert!(r.last_error().is_none());
    assert!(r.generation() > generation);
}

#[test]
fn redraw_applies_current_selection() {
    let mut store = sample_store();
    store.set_selection(&[2].into_iter().collect(), labelplot::SelectionMode::Overwrite, 0);
    let settings = settings_for(&["Depth(m)"]);
    let mut r = RenderOrchestrator::new();
    r.redraw(&store, settings.get(), &HookRegistry::default());
    let cloud = &r.figure().unwrap().translator.clouds()[0];
    assert_ne!(cloud.colors, cloud.base_colors);
}

#[test]
fn legend_is_sorted_and_unique() {
    let store = sample_store();
    let settings = settings_for(&["Temp", "Depth(m)"]);
    let fig = build_figure(&store, settings.get(), &HookRegistry::default()).unwrap();
    let names: Vec<&str> = fig.legend.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["Depth(m)", "Temp"]);

    // A literal "None" label collides with the entry for missing labels.
    let table = Table::with_sequential_ids(vec![
        Column::from_datetimes("DateTime", (0..4).map(ts)),
        Column::from_f64("Depth(m)", [0.0, 1.0, 2.0, 3.0]),
        Column::from_text("activity", [Some("walk"), Some("None"), None, Some("run")]),
    ])
    .unwrap();
    let mut store = DatasetStore::new();
    store.replace_table(table, None);
    let mut settings = settings_for(&["Depth(m)"]);
    settings.set_color_method(ColorMethod::ByLabel);
    settings.set_color_column("activity".into());
    let fig = build_figure(&store, settings.get(), &HookRegistry::default()).unwrap();
    let names: Vec<&str> = fig.legend.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["None", "run", "walk"]);
}
