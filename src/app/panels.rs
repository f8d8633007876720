//! Side panels and tool windows.
//!
//! Every panel talks to the models only through the [`Controller`]; none of
//! them keeps a copy of settings beyond the text the user is typing.

use eframe::egui::{self, ComboBox, DragValue, Slider, Ui};

use crate::color_scheme::Colormap;
use crate::controller::Controller;
use crate::data::range::AxisValue;
use crate::data::settings::{ColorMethod, PlotType};
use crate::data::store::{MergeMode, TargetType};
use crate::data::x_formatter::title_value;

/// Visibility of a panel.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct PanelState {
    pub visible: bool,
    pub detached: bool,
}

/// What a panel can reach while it renders.
pub(crate) struct PanelCtx<'a> {
    pub ctrl: &'a mut Controller,
    /// Visible x range of the main plot.
    pub visible_x: Option<(f64, f64)>,
    /// Visible part of the normalized y surface.
    pub visible_y: Option<(f64, f64)>,
}

pub(crate) trait Panel {
    fn title(&self) -> &'static str;
    fn state(&self) -> &PanelState;
    fn state_mut(&mut self) -> &mut PanelState;

    /// Entry in the "Tools" menu.
    fn render_menu(&mut self, ui: &mut Ui) {
        let title = self.title();
        let state = self.state_mut();
        if ui.checkbox(&mut state.visible, title).clicked() {
            ui.close();
        }
    }

    fn render_panel(&mut self, ui: &mut Ui, cx: &mut PanelCtx<'_>);
}

/// Combo box over `options`; returns the newly picked option.
fn pick(ui: &mut Ui, id: &str, current: &str, options: &[String]) -> Option<String> {
    let mut picked = None;
    ComboBox::from_id_salt(id)
        .selected_text(if current.is_empty() { "—" } else { current })
        .show_ui(ui, |ui| {
            for opt in options {
                if ui.selectable_label(opt == current, opt).clicked() && opt != current {
                    picked = Some(opt.clone());
                }
            }
        });
    picked
}

// ─────────────────────────────────────────────────────────────────────────────
// Plot settings
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) struct SettingsPanel {
    state: PanelState,
}

impl Default for SettingsPanel {
    fn default() -> Self {
        Self {
            state: PanelState {
                visible: true,
                detached: false,
            },
        }
    }
}

impl SettingsPanel {
    fn series_section(&mut self, ui: &mut Ui, ctrl: &mut Controller) {
        let s = ctrl.settings().clone();
        let view = ctrl.view().clone();

        ui.label("X axis");
        if let Some(v) = pick(ui, "x_axis", view.x_axis.current(), view.x_axis.options()) {
            ctrl.pick_x_axis(&v);
        }

        ui.collapsing("Plotted columns", |ui| {
            let mut list = s.plot_list.clone();
            for col in &view.plottable {
                let mut on = list.contains(col);
                if ui.checkbox(&mut on, col).changed() {
                    if on {
                        list.push(col.clone());
                    } else {
                        list.retain(|c| c != col);
                    }
                }
            }
            if list != s.plot_list {
                ctrl.settings_model().set_plot_list(list);
                ctrl.process_events();
            }
        });

        ui.horizontal(|ui| {
            let mut plot_type = s.plot_type;
            ui.radio_value(&mut plot_type, PlotType::Line, "Line");
            ui.radio_value(&mut plot_type, PlotType::Scatter, "Scatter");
            if ctrl.settings_model().set_plot_type(plot_type) {
                ctrl.process_events();
            }
        });

        let mut method = s.color_method;
        ComboBox::from_id_salt("color_method")
            .selected_text(method.to_string())
            .show_ui(ui, |ui| {
                for m in [ColorMethod::ByColumn, ColorMethod::ByLabel] {
                    ui.selectable_value(&mut method, m, m.to_string());
                }
            });
        if ctrl.settings_model().set_color_method(method) {
            ctrl.process_events();
        }
        if method == ColorMethod::ByLabel {
            ui.label("Color column");
            if let Some(v) = pick(ui, "color_column", view.color_column.current(), view.color_column.options()) {
                ctrl.pick_color_column(&v);
            }
        }

        ui.collapsing("Label bars", |ui| {
            let mut labels = s.plotted_labels.clone();
            for col in &view.label_columns {
                let mut on = labels.contains(col);
                if ui.checkbox(&mut on, col).changed() {
                    if on {
                        labels.push(col.clone());
                    } else {
                        labels.retain(|c| c != col);
                    }
                }
            }
            if labels != s.plotted_labels {
                ctrl.settings_model().set_plotted_labels(labels);
                ctrl.process_events();
            }
        });
    }

    fn domain_section(&mut self, ui: &mut Ui, cx: &mut PanelCtx<'_>) {
        let d = cx.ctrl.settings().plot_domain.clone();
        ui.label(format!(
            "Domain: {}  -  {}",
            title_value(d.left_val().as_ref()),
            title_value(d.right_val().as_ref())
        ));
        if let (Some(AxisValue::Number(mut left)), Some(AxisValue::Number(mut right))) = (d.left_val(), d.right_val()) {
            ui.horizontal(|ui| {
                let l = ui.add(DragValue::new(&mut left).speed(0.1)).changed();
                let r = ui.add(DragValue::new(&mut right).speed(0.1)).changed();
                if l || r {
                    cx.ctrl
                        .settings_model()
                        .set_domain_window(Some(AxisValue::Number(left)), Some(AxisValue::Number(right)));
                    cx.ctrl.process_events();
                }
            });
        }
        ui.horizontal(|ui| {
            if ui.button("Set to view").clicked() {
                if let Some((l, r)) = cx.visible_x {
                    cx.ctrl.set_xlim_to_view(l, r);
                }
            }
            if ui.button("Reset").clicked() {
                cx.ctrl.reset_plot_domain();
                cx.ctrl.process_events();
            }
        });
    }

    fn spectrogram_section(&mut self, ui: &mut Ui, cx: &mut PanelCtx<'_>) {
        let view = cx.ctrl.view().clone();
        if view.fft_lengths.is_empty() {
            ui.weak("No spectrogram columns");
            return;
        }
        let s = cx.ctrl.settings().spectrogram.clone();
        let model = cx.ctrl.settings_model();
        let mut enabled = s.enabled;
        let mut changed = false;
        if ui.checkbox(&mut enabled, "Show spectrogram").changed() {
            changed |= model.set_spectrogram_enabled(enabled);
        }
        let mut brightness = s.brightness.val();
        if ui.add(Slider::new(&mut brightness, 0.0..=1.0).text("Brightness")).changed() {
            changed |= model.set_spectrogram_brightness(brightness);
        }
        let mut quality = s.quality.val();
        if ui.add(Slider::new(&mut quality, 0.1..=1.0).text("Quality")).changed() {
            changed |= model.set_spectrogram_quality(quality);
        }
        let mut colormap = s.colormap;
        ComboBox::from_id_salt("colormap")
            .selected_text(colormap.to_string())
            .show_ui(ui, |ui| {
                for c in Colormap::ALL {
                    ui.selectable_value(&mut colormap, c, c.to_string());
                }
            });
        changed |= model.set_spectrogram_colormap(colormap);
        if let (Some(mut left), Some(mut right), Some(max)) = (s.lines.left_val(), s.lines.right_val(), s.lines.max_val()) {
            ui.horizontal(|ui| {
                ui.label("Bins");
                let l = ui.add(DragValue::new(&mut left).range(0..=max)).changed();
                let r = ui.add(DragValue::new(&mut right).range(0..=max)).changed();
                if l || r {
                    changed |= model.set_spectrogram_window(left, right);
                }
            });
        }
        if changed {
            cx.ctrl.process_events();
        }

        ui.horizontal(|ui| {
            if let Some(v) = pick(ui, "fft_column", view.fft_column.current(), view.fft_column.options()) {
                cx.ctrl.pick_spectrogram_column(&v);
            }
            if ui.button("Bins to view").clicked() {
                if let Some((b, t)) = cx.visible_y {
                    cx.ctrl.set_spectrogram_lines_to_view(b, t);
                }
            }
        });
    }
}

impl Panel for SettingsPanel {
    fn title(&self) -> &'static str {
        "Plot settings"
    }
    fn state(&self) -> &PanelState {
        &self.state
    }
    fn state_mut(&mut self) -> &mut PanelState {
        &mut self.state
    }

    fn render_panel(&mut self, ui: &mut Ui, cx: &mut PanelCtx<'_>) {
        egui::ScrollArea::vertical().show(ui, |ui| {
            ui.heading("Series");
            self.series_section(ui, cx.ctrl);
            ui.separator();
            ui.heading("Domain");
            self.domain_section(ui, cx);
            ui.separator();
            ui.heading("Spectrogram");
            self.spectrogram_section(ui, cx);
            ui.separator();

            let s = cx.ctrl.settings().clone();
            let mut font = s.font_size.val();
            let mut gap = s.gap_fill_ms.val();
            let model = cx.ctrl.settings_model();
            let mut changed = false;
            if ui.add(Slider::new(&mut font, 4.0..=30.0).text("Font size")).changed() {
                changed |= model.set_font_size(font);
            }
            if ui
                .add(Slider::new(&mut gap, 0..=10_000).text("Gap fill (ms)"))
                .on_hover_text("Selections also take rows between selected points closer than this")
                .changed()
            {
                changed |= model.set_gap_fill_ms(gap);
            }
            if changed {
                cx.ctrl.process_events();
            }
            ui.separator();
            ui.horizontal(|ui| {
                if ui.button("Replot").clicked() {
                    cx.ctrl.replot();
                }
                if ui.button("Reset settings").clicked() {
                    cx.ctrl.reset_plot_settings();
                }
            });
        });
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Labeler
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub(crate) struct LabelerPanel {
    state: PanelState,
    column: String,
    label: String,
}

impl Panel for LabelerPanel {
    fn title(&self) -> &'static str {
        "Labeler"
    }
    fn state(&self) -> &PanelState {
        &self.state
    }
    fn state_mut(&mut self) -> &mut PanelState {
        &mut self.state
    }

    fn render_panel(&mut self, ui: &mut Ui, cx: &mut PanelCtx<'_>) {
        let columns = cx.ctrl.labeler_columns();
        ui.label(format!("{} rows selected", cx.ctrl.store().selection().len()));
        ui.horizontal(|ui| {
            ui.label("Column");
            ui.text_edit_singleline(&mut self.column);
            if let Some(v) = pick(ui, "labeler_column", &self.column, &columns) {
                self.column = v;
            }
        });
        let options = cx.ctrl.labeler_options(&self.column);
        ui.horizontal(|ui| {
            ui.label("Label");
            ui.text_edit_singleline(&mut self.label);
            if let Some(v) = pick(ui, "labeler_label", &self.label, &options) {
                self.label = v;
            }
        });
        if ui
            .button("Apply label")
            .on_hover_text("Empty, none, nan or <NA> clears the label")
            .clicked()
        {
            cx.ctrl.apply_label(&self.column, &self.label);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Column merge
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) struct MergePanel {
    state: PanelState,
    src: String,
    dst: String,
    mode: MergeMode,
    preserve_src: bool,
    target: TargetType,
}

impl Default for MergePanel {
    fn default() -> Self {
        Self {
            state: PanelState {
                visible: false,
                detached: true,
            },
            src: String::new(),
            dst: String::new(),
            mode: MergeMode::SourcePriority,
            preserve_src: false,
            target: TargetType::Destination,
        }
    }
}

impl Panel for MergePanel {
    fn title(&self) -> &'static str {
        "Merge columns"
    }
    fn state(&self) -> &PanelState {
        &self.state
    }
    fn state_mut(&mut self) -> &mut PanelState {
        &mut self.state
    }

    fn render_panel(&mut self, ui: &mut Ui, cx: &mut PanelCtx<'_>) {
        let columns = cx.ctrl.store().table().map(|t| t.column_names()).unwrap_or_default();
        egui::Grid::new("merge_grid").num_columns(2).show(ui, |ui| {
            ui.label("Source");
            if let Some(v) = pick(ui, "merge_src", &self.src, &columns) {
                self.src = v;
            }
            ui.end_row();
            ui.label("Destination");
            ui.horizontal(|ui| {
                ui.text_edit_singleline(&mut self.dst)
                    .on_hover_text("A new name creates the column; empty or None deletes the source");
                if let Some(v) = pick(ui, "merge_dst", &self.dst, &columns) {
                    self.dst = v;
                }
            });
            ui.end_row();
            ui.label("Mode");
            ComboBox::from_id_salt("merge_mode")
                .selected_text(self.mode.to_string())
                .show_ui(ui, |ui| {
                    for m in MergeMode::ALL {
                        ui.selectable_value(&mut self.mode, m, m.to_string());
                    }
                });
            ui.end_row();
            ui.label("Result type");
            ui.horizontal(|ui| {
                ui.radio_value(&mut self.target, TargetType::Source, "Source");
                ui.radio_value(&mut self.target, TargetType::Destination, "Destination");
            });
            ui.end_row();
        });
        ui.checkbox(&mut self.preserve_src, "Keep source column");
        if ui.button("Merge").clicked() {
            let dst = (!self.dst.trim().is_empty()).then_some(self.dst.as_str());
            cx.ctrl
                .merge_columns(&self.src, dst, self.mode, self.preserve_src, self.target);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Label rename
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub(crate) struct RenamePanel {
    state: PanelState,
    column: String,
    /// `(old, new)`; rows left blank are not renamed.
    edits: Vec<(String, String)>,
}

impl Panel for RenamePanel {
    fn title(&self) -> &'static str {
        "Rename labels"
    }
    fn state(&self) -> &PanelState {
        &self.state
    }
    fn state_mut(&mut self) -> &mut PanelState {
        &mut self.state
    }

    fn render_panel(&mut self, ui: &mut Ui, cx: &mut PanelCtx<'_>) {
        let columns = cx.ctrl.view().label_columns.clone();
        if let Some(v) = pick(ui, "rename_column", &self.column, &columns) {
            self.column = v;
            self.edits = cx
                .ctrl
                .store()
                .unique_labels(&self.column)
                .into_iter()
                .map(|l| (l, String::new()))
                .collect();
        }
        egui::Grid::new("rename_grid").num_columns(2).show(ui, |ui| {
            for (old, new) in &mut self.edits {
                ui.label(old.as_str());
                ui.text_edit_singleline(new);
                ui.end_row();
            }
        });
        if ui
            .button("Rename")
            .on_hover_text("Type none to clear a label")
            .clicked()
        {
            let mapping: Vec<(String, String)> = self
                .edits
                .iter()
                .filter(|(_, new)| !new.is_empty())
                .cloned()
                .collect();
            if !mapping.is_empty() {
                cx.ctrl.rename_labels(&self.column, &mapping);
                self.edits.clear();
                self.column.clear();
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Script hooks
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub(crate) struct HooksPanel {
    state: PanelState,
}

impl Panel for HooksPanel {
    fn title(&self) -> &'static str {
        "Hooks"
    }
    fn state(&self) -> &PanelState {
        &self.state
    }
    fn state_mut(&mut self) -> &mut PanelState {
        &mut self.state
    }

    fn render_panel(&mut self, ui: &mut Ui, cx: &mut PanelCtx<'_>) {
        let hooks: Vec<(String, String)> = cx
            .ctrl
            .hooks()
            .script_names()
            .into_iter()
            .filter_map(|n| cx.ctrl.hooks().script(n).map(|h| (n.to_string(), h.description().to_string())))
            .collect();
        if hooks.is_empty() {
            ui.weak("No hooks registered");
        }
        for (name, description) in hooks {
            ui.horizontal(|ui| {
                if ui.button(&name).on_hover_text(&description).clicked() {
                    cx.ctrl.run_hook(&name);
                }
                ui.weak(description);
            });
        }
        let filters: Vec<String> = cx.ctrl.hooks().filters().iter().map(|f| f.name().to_string()).collect();
        if !filters.is_empty() {
            ui.separator();
            ui.label(format!("Active row filters: {}", filters.join(", ")));
        }
    }
}
