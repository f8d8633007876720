//! Controller: the glue between the dataset store, the plot settings, the
//! render orchestrator and the widgets.
//!
//! The store and the settings model emit events; [`Controller::process_events`]
//! drains them and decides what has to happen: refresh option lists, reapply
//! settings, recolor or redraw. Widgets never write into the models directly;
//! they go through a `pick_*` method, which only forwards values that are
//! valid options and differ from the current setting.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::mpsc::Receiver;

use log::{debug, info, warn};

use crate::data::range::{secs_to_datetime, AxisKind, AxisValue, LimitedRange};
use crate::data::selection::SelectionMode;
use crate::data::settings::{sort_columns, PlotSettings, PlotSettingsModel};
use crate::data::store::{AppendOptions, DatasetStore, MergeMode, SaveSubset, TargetType};
use crate::data::table::{DType, RowSet, Value};
use crate::error::{OpStatus, StoreError};
use crate::events::{drain, DatasetEvent, Event, EventFilter, EventKind, SettingsEvent, SettingsField};
use crate::hooks::{HookRegistry, MessageLog};
use crate::persistence::PlotSettingsSerde;
use crate::render::{Figure, RenderOrchestrator};

/// Upper bound on event rounds per call; a well-behaved model settles in two.
const MAX_SYNC_ROUNDS: usize = 8;

// ─────────────────────────────────────────────────────────────────────────────
// Widget state
// ─────────────────────────────────────────────────────────────────────────────

/// A pick list: the offered options and the current choice.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ComboState {
    options: Vec<String>,
    current: String,
}

impl ComboState {
    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    /// Replace the options. A current value that is no longer offered is cleared.
    pub fn set_options(&mut self, options: Vec<String>) {
        self.options = options;
        if !self.options.contains(&self.current) {
            self.current.clear();
        }
    }

    /// Select `value`. Values that are not offered are rejected; the empty
    /// string always clears. Returns whether the choice changed.
    pub fn set_current(&mut self, value: &str) -> bool {
        if !value.is_empty() && !self.options.iter().any(|o| o == value) {
            debug!("rejected '{}': not one of {:?}", value, self.options);
            return false;
        }
        if self.current == value {
            return false;
        }
        self.current = value.to_string();
        true
    }
}

/// Column-derived option lists shown by the widgets.
#[derive(Clone, Debug, Default)]
pub struct ViewState {
    pub x_axis: ComboState,
    pub color_column: ComboState,
    pub fft_column: ComboState,
    /// Columns that can be plotted as series.
    pub plottable: Vec<String>,
    pub label_columns: Vec<String>,
    /// Spectrogram columns and their vector length.
    pub fft_lengths: BTreeMap<String, usize>,
}

/// A finished selection gesture, in plot coordinates with normalized y.
#[derive(Clone, Debug, PartialEq)]
pub enum Gesture {
    Lasso(Vec<[f64; 2]>),
    Rectangle([f64; 2], [f64; 2]),
    Span(f64, f64),
}

/// Selection mode for the modifier keys held during a gesture.
pub fn selection_mode(ctrl: bool, shift: bool, alt: bool) -> SelectionMode {
    if ctrl || shift {
        SelectionMode::Append
    } else if alt {
        SelectionMode::Complement
    } else {
        SelectionMode::Overwrite
    }
}

/// Label text as typed into the labeler. Empty text, `none`, `nan` and
/// `<na>` mean "no label"; integer columns take integers.
pub fn parse_label(text: &str, dtype: Option<DType>) -> Result<Value, String> {
    let text = text.trim();
    if matches!(text.to_lowercase().as_str(), "" | "none" | "nan" | "<na>") {
        return Ok(Value::Null);
    }
    match dtype {
        Some(DType::Int) => text
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| format!("'{}' is not an integer label", text)),
        _ => Ok(Value::Text(text.to_string())),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Controller
// ─────────────────────────────────────────────────────────────────────────────

pub struct Controller {
    store: DatasetStore,
    settings: PlotSettingsModel,
    hooks: HookRegistry,
    renderer: RenderOrchestrator,
    view: ViewState,
    dataset_rx: Receiver<DatasetEvent>,
    settings_rx: Receiver<SettingsEvent>,
    /// Set while option lists are rewritten, so widget echoes are ignored.
    syncing: bool,
    status: Option<String>,
}

impl Default for Controller {
    fn default() -> Self {
        Self::new(DatasetStore::new(), PlotSettingsModel::default(), HookRegistry::with_builtins())
    }
}

impl Controller {
    pub fn new(store: DatasetStore, settings: PlotSettingsModel, hooks: HookRegistry) -> Self {
        let dataset_rx = store.subscribe(EventFilter::all());
        let settings_rx = settings.subscribe(EventFilter::all());
        let mut c = Self {
            store,
            settings,
            hooks,
            renderer: RenderOrchestrator::new(),
            view: ViewState::default(),
            dataset_rx,
            settings_rx,
            syncing: false,
            status: None,
        };
        if c.store.table().is_some() {
            c.sync_table(true);
            c.redraw();
        }
        c
    }

    pub fn store(&self) -> &DatasetStore {
        &self.store
    }

    pub fn settings(&self) -> &PlotSettings {
        self.settings.get()
    }

    /// The settings model, for widgets that edit plain settings fields.
    /// Call [`process_events`](Self::process_events) afterwards.
    pub fn settings_model(&mut self) -> &mut PlotSettingsModel {
        &mut self.settings
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut HookRegistry {
        &mut self.hooks
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn figure(&self) -> Option<&Figure> {
        self.renderer.figure()
    }

    pub fn render_error(&self) -> Option<&str> {
        self.renderer.last_error()
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    /// Show `status` in the status line.
    pub fn set_status(&mut self, status: &OpStatus) {
        self.status = Some(status.message.clone());
    }

    // ── Event dispatch ─────────────────────────────────────────────────

    /// Drain store and settings events and react to them. Returns whether a
    /// redraw happened.
    pub fn process_events(&mut self) -> bool {
        if self.syncing {
            return false;
        }
        let mut redraw = false;
        let mut recolor = false;
        for _ in 0..MAX_SYNC_ROUNDS {
            let dataset = drain(&self.dataset_rx);
            let settings = drain(&self.settings_rx);
            if dataset.is_empty() && settings.is_empty() {
                break;
            }
            for ev in &dataset {
                match ev {
                    DatasetEvent::TableReplaced => {
                        self.sync_table(true);
                        redraw = true;
                    }
                    DatasetEvent::TableChanged => {
                        self.sync_table(false);
                        redraw = true;
                    }
                    DatasetEvent::HiddenChanged => redraw = true,
                    DatasetEvent::SelectionChanged => recolor = true,
                    DatasetEvent::FileSourceChanged(_) => {}
                }
            }
            for ev in &settings {
                match ev {
                    SettingsEvent::Changed(SettingsField::XAxis) => {
                        self.revalidate_settings();
                        self.reset_plot_domain();
                        redraw = true;
                    }
                    SettingsEvent::Changed(SettingsField::SpectrogramColumn) => {
                        self.sync_view_from_settings();
                        self.reset_spectrogram_lines();
                        redraw = true;
                    }
                    SettingsEvent::Changed(SettingsField::ColorColumn) => {
                        self.revalidate_settings();
                        redraw = true;
                    }
                    SettingsEvent::Reset => {
                        self.sync_table(true);
                        redraw = true;
                    }
                    other if other.kinds().intersects(EventKind::SELECTION_SETTINGS) => {}
                    _ => redraw = true,
                }
            }
        }
        if redraw {
            self.redraw();
        } else if recolor {
            self.renderer.recolor(self.store.selection());
        }
        redraw
    }

    fn redraw(&mut self) {
        self.renderer.redraw(&self.store, self.settings.get(), &self.hooks);
    }

    /// Force a full redraw.
    pub fn replot(&mut self) {
        self.process_events();
        self.redraw();
    }

    // ── Table → options → settings ─────────────────────────────────────

    /// Recompute the option lists from the table, then reapply the current
    /// settings against them. Options go first so the reapplied values are
    /// judged against the new table.
    fn sync_table(&mut self, replaced: bool) {
        self.syncing = true;
        self.refresh_options();
        self.syncing = false;
        self.reapply_settings(replaced);
        self.sync_view_from_settings();
    }

    fn refresh_options(&mut self) {
        let Some(table) = self.store.table() else {
            self.view = ViewState::default();
            return;
        };
        let order = &self.settings.get().column_order;
        let mut axis_candidates: Vec<String> = table
            .columns()
            .iter()
            .filter(|c| matches!(c.first_non_null(), Some(v) if v.as_axis_value().is_some()))
            .map(|c| c.name.clone())
            .collect();
        sort_columns(&mut axis_candidates, order);
        let mut plottable: Vec<String> = table
            .columns()
            .iter()
            .filter(|c| c.dtype.is_numeric())
            .map(|c| c.name.clone())
            .collect();
        sort_columns(&mut plottable, order);
        let label_columns = self.store.label_columns();
        let fft_lengths = self.store.fft_columns();

        self.view.x_axis.set_options(axis_candidates);
        self.view.color_column.set_options(label_columns.clone());
        self.view.fft_column.set_options(fft_lengths.keys().cloned().collect());
        self.view.plottable = plottable;
        self.view.label_columns = label_columns;
        self.view.fft_lengths = fft_lengths;
    }

    fn reapply_settings(&mut self, replaced: bool) {
        let s = self.settings.get().clone();
        let view = self.view.clone();

        let mut plot_list: Vec<String> = s.plot_list.iter().filter(|c| view.plottable.contains(c)).cloned().collect();
        if plot_list.is_empty() {
            plot_list = s
                .plot_list_default
                .iter()
                .filter(|c| view.plottable.contains(c))
                .cloned()
                .collect();
        }
        self.settings.set_plot_list(plot_list);

        let axis_options = view.x_axis.options();
        let x_axis = if axis_options.contains(&s.x_axis) {
            s.x_axis.clone()
        } else if axis_options.contains(&s.default_x_axis) {
            s.default_x_axis.clone()
        } else {
            axis_options.first().cloned().unwrap_or_default()
        };
        self.settings.set_x_axis(x_axis.clone());
        let observed = self.store.column_value_range(&x_axis);
        if replaced {
            self.settings.set_plot_domain(observed);
        } else {
            self.settings.adopt_domain_limits(&observed);
        }

        let table_columns = self.store.table().map(|t| t.column_names()).unwrap_or_default();
        let labels: Vec<String> = s
            .plotted_labels
            .iter()
            .filter(|c| table_columns.contains(c))
            .cloned()
            .collect();
        self.settings.set_plotted_labels(labels);

        let fft_column = if view.fft_lengths.contains_key(&s.spectrogram.column) {
            s.spectrogram.column.clone()
        } else {
            view.fft_lengths.keys().next().cloned().unwrap_or_default()
        };
        self.settings.set_spectrogram_column(fft_column);
        self.reset_spectrogram_lines();
        if view.fft_lengths.is_empty() {
            self.settings.set_spectrogram_enabled(false);
        }

        let color_column = if view.label_columns.contains(&s.color_column) {
            s.color_column.clone()
        } else {
            view.label_columns.first().cloned().unwrap_or_default()
        };
        self.settings.set_color_column(color_column);
    }

    /// Re-check column-valued settings against the option lists after an
    /// edit that did not go through them (hooks, settings files).
    fn revalidate_settings(&mut self) {
        if self.store.table().is_some() {
            self.reapply_settings(false);
        }
        self.sync_view_from_settings();
    }

    /// Bring the pick lists in line with the settings without echoing back.
    fn sync_view_from_settings(&mut self) {
        self.syncing = true;
        let s = self.settings.get();
        self.view.x_axis.set_current(&s.x_axis);
        self.view.color_column.set_current(&s.color_column);
        self.view.fft_column.set_current(&s.spectrogram.column);
        self.syncing = false;
    }

    /// Limits of the bin window follow the selected column; a window that
    /// still fits is kept.
    fn reset_spectrogram_lines(&mut self) {
        let s = self.settings.get();
        let len = self.view.fft_lengths.get(&s.spectrogram.column).copied();
        let lines = match len {
            Some(len) => {
                let mut lines = LimitedRange::spanning(0, len);
                lines.copy_vals(&s.spectrogram.lines);
                if lines.left_val() == lines.right_val() {
                    lines = LimitedRange::spanning(0, len);
                }
                lines
            }
            None => LimitedRange::default(),
        };
        self.settings.set_spectrogram_lines(lines);
    }

    // ── Widget edits ───────────────────────────────────────────────────

    pub fn pick_x_axis(&mut self, value: &str) -> bool {
        if self.syncing || !self.view.x_axis.set_current(value) {
            return false;
        }
        self.settings.set_x_axis(value.to_string());
        self.process_events()
    }

    pub fn pick_color_column(&mut self, value: &str) -> bool {
        if self.syncing || !self.view.color_column.set_current(value) {
            return false;
        }
        self.settings.set_color_column(value.to_string());
        self.process_events()
    }

    pub fn pick_spectrogram_column(&mut self, value: &str) -> bool {
        if self.syncing || !self.view.fft_column.set_current(value) {
            return false;
        }
        self.settings.set_spectrogram_column(value.to_string());
        self.process_events()
    }

    // ── Commands ───────────────────────────────────────────────────────

    /// Adopt the visible x range `[left, right]` (axis units) as plot domain.
    pub fn set_xlim_to_view(&mut self, left: f64, right: f64) -> bool {
        let (lo, hi) = (left.min(right), left.max(right));
        let kind = self
            .figure()
            .and_then(|f| f.x_kind)
            .or_else(|| self.settings.get().plot_domain.kind());
        let to_axis = |v: f64| match kind {
            Some(AxisKind::DateTime) => secs_to_datetime(v).map(AxisValue::DateTime),
            _ => Some(AxisValue::Number(v)),
        };
        let changed = self.settings.set_domain_window(to_axis(lo), to_axis(hi));
        self.process_events();
        changed
    }

    /// Adopt the visible part of the spectrogram's frequency axis as bin
    /// window. `bottom` and `top` are fractions of the full bin count.
    pub fn set_spectrogram_lines_to_view(&mut self, bottom: f64, top: f64) -> bool {
        let lines = &self.settings.get().spectrogram.lines;
        let (Some(min), Some(max)) = (lines.min_val(), lines.max_val()) else {
            return false;
        };
        let at = |f: f64| {
            let v = (min as f64 + f * max.saturating_sub(min) as f64).round();
            v.clamp(min as f64, max as f64) as usize
        };
        let (lo, hi) = (at(bottom.min(top)), at(bottom.max(top)));
        let changed = self.settings.set_spectrogram_window(lo, hi);
        self.process_events();
        changed
    }

    /// Apply a saved settings snapshot. The saved domain window is applied
    /// once the x-axis it belongs to is in place, so its limits come from
    /// that column.
    pub fn apply_settings_snapshot(&mut self, snapshot: PlotSettingsSerde) {
        let [left, right] = snapshot.domain;
        snapshot.apply_to(&mut self.settings);
        self.process_events();
        self.settings.set_domain_window(left, right);
        self.process_events();
    }

    /// Reset the plot domain to the full value range of the x-axis column.
    pub fn reset_plot_domain(&mut self) -> bool {
        let observed = self.store.column_value_range(&self.settings.get().x_axis);
        self.settings.set_plot_domain(observed)
    }

    /// Restore default settings, then fit them to the loaded table.
    pub fn reset_plot_settings(&mut self) {
        info!("resetting plot settings");
        self.settings.reset();
        self.process_events();
    }

    /// Run a registered script hook, then replot.
    pub fn run_hook(&mut self, name: &str) -> OpStatus {
        let mut log = MessageLog::default();
        let status = match self.hooks.run(name, &mut self.store, &mut self.settings, &mut log) {
            Ok(()) => {
                let mut msg = format!("Ran hook '{}'", name);
                if !log.messages.is_empty() {
                    msg = format!("{}: {}", msg, log.messages.join("; "));
                }
                OpStatus::ok(msg)
            }
            Err(e) => OpStatus::failed(format!("{:#}", e)),
        };
        self.replot();
        self.set_status(&status);
        status
    }

    /// Apply a finished gesture to the selection.
    pub fn apply_gesture(&mut self, gesture: &Gesture, mode: SelectionMode) -> bool {
        let Some(figure) = self.renderer.figure() else {
            return false;
        };
        let t = &figure.translator;
        let rows = match gesture {
            Gesture::Lasso(poly) => t.lasso_select(poly),
            Gesture::Rectangle(a, b) => t.rectangle_select(*a, *b),
            Gesture::Span(x0, x1) => t.span_select(*x0, *x1),
        };
        debug!("gesture picked {} rows", rows.len());
        self.select(&rows, mode)
    }

    /// Combine `rows` into the selection using the configured gap-fill.
    pub fn select(&mut self, rows: &RowSet, mode: SelectionMode) -> bool {
        let gap = self.settings.get().gap_fill_ms.val();
        let changed = self.store.set_selection(rows, mode, gap);
        self.process_events();
        changed
    }

    // ── Data commands ──────────────────────────────────────────────────

    pub fn load(&mut self, path: &Path) -> OpStatus {
        let status = match self.store.load(path) {
            Ok(()) => OpStatus::ok(format!("Loaded {}", path.display())),
            Err(e) => {
                warn!("loading {} failed: {}", path.display(), e);
                OpStatus::failed(format!("Loading {} failed: {}", path.display(), e))
            }
        };
        self.process_events();
        self.set_status(&status);
        status
    }

    pub fn append(&mut self, path: &Path, options: &AppendOptions) -> OpStatus {
        let status = match self.store.append_from_file(path, options) {
            Ok(summary) => OpStatus::ok(format!(
                "Appended {} rows, merged {}, dropped {} empty rows",
                summary.appended, summary.merged, summary.dropped
            )),
            Err(e) => {
                warn!("appending {} failed: {}", path.display(), e);
                OpStatus::failed(format!("Appending {} failed: {}", path.display(), e))
            }
        };
        self.process_events();
        self.set_status(&status);
        status
    }

    pub fn save(&mut self, path: &Path, subset: SaveSubset) -> OpStatus {
        let status = self.store.save(path, subset);
        self.set_status(&status);
        status
    }

    pub fn merge_columns(
        &mut self,
        src: &str,
        dst: Option<&str>,
        mode: MergeMode,
        preserve_src: bool,
        target: TargetType,
    ) -> OpStatus {
        let status = self.store.merge_columns(src, dst, mode, preserve_src, target);
        self.process_events();
        self.set_status(&status);
        status
    }

    pub fn rename_labels(&mut self, column: &str, mapping: &[(String, String)]) -> OpStatus {
        let status = self.store.rename_labels(column, mapping);
        self.process_events();
        self.set_status(&status);
        status
    }

    // ── Labeler ────────────────────────────────────────────────────────

    /// Columns offered by the labeler: label columns plus presets.
    pub fn labeler_columns(&self) -> Vec<String> {
        let mut cols = self.view.label_columns.clone();
        for p in &self.settings.get().label_column_presets {
            if !cols.contains(p) {
                cols.push(p.clone());
            }
        }
        cols.sort();
        cols
    }

    /// Labels offered for `column`: existing labels plus presets.
    pub fn labeler_options(&self, column: &str) -> Vec<String> {
        let mut labels = self.store.unique_labels(column);
        if let Some(presets) = self.settings.get().label_options_presets.get(column) {
            labels.extend(presets.iter().cloned());
        }
        labels.sort();
        labels.dedup();
        labels
    }

    /// Label the selected rows of `column` with `text`.
    pub fn apply_label(&mut self, column: &str, text: &str) -> OpStatus {
        let dtype = self.store.table().and_then(|t| t.column(column)).map(|c| c.dtype);
        let status = match parse_label(text, dtype) {
            Err(msg) => OpStatus::failed(msg),
            Ok(value) => {
                let shown = value.label_string();
                match self.store.set_label(column, value) {
                    Ok(true) => OpStatus::ok(format!(
                        "Labelled {} rows in '{}' as '{}'",
                        self.store.selection().len(),
                        column,
                        shown
                    )),
                    Ok(false) => OpStatus::failed("Nothing to label: pick a column and select rows"),
                    Err(e @ StoreError::NoTable) => OpStatus::failed(e.to_string()),
                    Err(e) => {
                        warn!("labelling '{}' failed: {}", column, e);
                        OpStatus::failed(e.to_string())
                    }
                }
            }
        };
        self.process_events();
        self.set_status(&status);
        status
    }

    // ── Edit commands ──────────────────────────────────────────────────

    pub fn hide_selection(&mut self) -> bool {
        let changed = self.store.hide_selection();
        self.process_events();
        changed
    }

    pub fn hide_all_except_selection(&mut self) -> bool {
        let changed = self.store.hide_all_except_selection();
        self.process_events();
        changed
    }

    pub fn unhide_all(&mut self) -> bool {
        let changed = self.store.unhide_all();
        self.process_events();
        changed
    }

    pub fn flip_hidden(&mut self) -> bool {
        let changed = self.store.flip_hidden();
        self.process_events();
        changed
    }

    pub fn clear_selection(&mut self) -> bool {
        let changed = self.store.clear_selection();
        self.process_events();
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combo_rejects_unknown_values() {
        let mut c = ComboState::default();
        c.set_options(vec!["a".into(), "b".into()]);
        assert!(c.set_current("a"));
        assert!(!c.set_current("zzz"));
        assert_eq!(c.current(), "a");
        c.set_options(vec!["b".into()]);
        assert_eq!(c.current(), "");
    }

    #[test]
    fn modifiers_pick_mode() {
        assert_eq!(selection_mode(false, false, false), SelectionMode::Overwrite);
        assert_eq!(selection_mode(true, false, false), SelectionMode::Append);
        assert_eq!(selection_mode(false, true, true), SelectionMode::Append);
        assert_eq!(selection_mode(false, false, true), SelectionMode::Complement);
    }

    #[test]
    fn label_text_parsing() {
        assert_eq!(parse_label(" NaN ", None), Ok(Value::Null));
        assert_eq!(parse_label("<NA>", Some(DType::Text)), Ok(Value::Null));
        assert_eq!(parse_label("3", Some(DType::Int)), Ok(Value::Int(3)));
        assert_eq!(parse_label("3", Some(DType::Text)), Ok(Value::Text("3".into())));
        assert!(parse_label("walk", Some(DType::Int)).is_err());
    }
}
