//! The eframe front end.
//!
//! | Sub-module    | Responsibility |
//! | ------------- | -------------- |
//! | [`plot_view`] | Central plot, label bars and selection gesture capture |
//! | [`panels`]    | Settings side panel and tool windows (labeler, merge, rename, hooks) |
//! | [`dialogs`]   | Native file dialogs for data and settings files |
//! | [`run`]       | [`run_labelplot()`] entry point and [`LaunchOptions`] |
//!
//! The app owns a [`Controller`] and never touches the store or the settings
//! model directly; every widget goes through controller commands.

mod dialogs;
mod panels;
mod plot_view;
mod run;

pub use run::{run_labelplot, LaunchOptions};

use std::path::PathBuf;

use eframe::egui;
use egui_phosphor::regular::{ARROWS_CLOCKWISE, FLOPPY_DISK, FOLDER_OPEN};
use log::{debug, warn};

use crate::color_scheme::Theme;
use crate::controller::Controller;
use crate::data::settings::PlotSettingsModel;
use crate::data::store::{AppendOptions, DatasetStore, DuplicatePolicy, SaveSubset};
use crate::persistence::Preferences;

use panels::{HooksPanel, LabelerPanel, MergePanel, Panel, PanelCtx, RenamePanel, SettingsPanel};
use plot_view::PlotView;

/// egui points per settings font-size unit.
const FONT_SCALE: f32 = 1.25;

/// The annotator window.
pub struct LabelPlotApp {
    controller: Controller,
    plot_view: PlotView,
    settings_panel: SettingsPanel,
    /// Labeler first; the rest are tool windows.
    tools: Vec<Box<dyn Panel>>,
    prefs: Preferences,
    prefs_path: Option<PathBuf>,
    theme: Theme,
    applied_font_size: Option<f64>,
    append_options: AppendOptions,
    prefs_saved: bool,
}

impl LabelPlotApp {
    /// Build the app from launch options, loading `options.file` if given.
    pub fn new(options: LaunchOptions) -> Self {
        let prefs = options
            .preferences_path
            .as_deref()
            .map(Preferences::load_or_default)
            .unwrap_or_default();
        let dark = options.dark_mode.unwrap_or(prefs.dark_mode);
        let mut controller = Controller::new(DatasetStore::new(), PlotSettingsModel::default(), options.hooks);
        if let Some(file) = &options.file {
            controller.load(file);
        }
        let mut labeler = LabelerPanel::default();
        labeler.state_mut().visible = true;
        Self {
            controller,
            plot_view: PlotView::default(),
            settings_panel: SettingsPanel::default(),
            tools: vec![
                Box::new(labeler),
                Box::new(MergePanel::default()),
                Box::new(RenamePanel::default()),
                Box::new(HooksPanel::default()),
            ],
            prefs: Preferences {
                dark_mode: dark,
                ..prefs
            },
            prefs_path: options.preferences_path,
            theme: Theme::from_dark_mode(dark),
            applied_font_size: None,
            append_options: AppendOptions::default(),
            prefs_saved: false,
        }
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut Controller {
        &mut self.controller
    }

    fn save_preferences(&mut self, ctx: &egui::Context) {
        if let Some(rect) = ctx.input(|i| i.viewport().inner_rect) {
            self.prefs.window_size = [rect.width(), rect.height()];
        }
        let Some(path) = &self.prefs_path else {
            return;
        };
        match self.prefs.save(path) {
            Ok(()) => debug!("saved preferences to {}", path.display()),
            Err(e) => warn!("could not save preferences: {:#}", e),
        }
    }

    fn apply_font_size(&mut self, ctx: &egui::Context) {
        let size = self.controller.settings().font_size.val();
        if self.applied_font_size == Some(size) {
            return;
        }
        let body = size as f32 * FONT_SCALE;
        ctx.style_mut(|style| {
            for (text_style, font) in style.text_styles.iter_mut() {
                font.size = match text_style {
                    egui::TextStyle::Small => body * 0.75,
                    egui::TextStyle::Heading => body * 1.4,
                    _ => body,
                };
            }
        });
        self.applied_font_size = Some(size);
    }

    fn handle_dropped_files(&mut self, ctx: &egui::Context) {
        let dropped: Vec<PathBuf> = ctx.input(|i| i.raw.dropped_files.iter().filter_map(|f| f.path.clone()).collect());
        // Only the last file is kept when several are dropped.
        if let Some(path) = dropped.last() {
            self.prefs.last_data_folder = path.parent().map(|p| p.to_path_buf());
            self.controller.load(path);
        }
    }

    fn render_menu_bar(&mut self, ui: &mut egui::Ui) {
        egui::MenuBar::new().ui(ui, |ui| {
            ui.menu_button("File", |ui| {
                if ui.button(format!("{FOLDER_OPEN} Open…")).clicked() {
                    ui.close();
                    dialogs::open_data(&mut self.controller, &mut self.prefs);
                }
                ui.menu_button("Append", |ui| {
                    ui.radio_value(
                        &mut self.append_options.duplicate_policy,
                        DuplicatePolicy::KeepFirst,
                        "Keep existing on duplicates",
                    );
                    ui.radio_value(
                        &mut self.append_options.duplicate_policy,
                        DuplicatePolicy::Overwrite,
                        "Overwrite on duplicates",
                    );
                    if ui.button("Append file…").clicked() {
                        ui.close();
                        dialogs::append_data(&mut self.controller, &mut self.prefs, &self.append_options);
                    }
                });
                ui.separator();
                let has_table = self.controller.store().table().is_some();
                for (label, subset) in [
                    ("Save…", SaveSubset::All),
                    ("Save selection…", SaveSubset::Selection),
                    ("Save not hidden…", SaveSubset::NotHidden),
                ] {
                    let label = format!("{FLOPPY_DISK} {label}");
                    if ui.add_enabled(has_table, egui::Button::new(label)).clicked() {
                        ui.close();
                        dialogs::save_data(&mut self.controller, &mut self.prefs, subset);
                    }
                }
                ui.separator();
                if ui.button("Save plot settings…").clicked() {
                    ui.close();
                    dialogs::save_settings(&mut self.controller, &mut self.prefs);
                }
                if ui.button("Load plot settings…").clicked() {
                    ui.close();
                    dialogs::load_settings(&mut self.controller, &mut self.prefs);
                }
                ui.separator();
                if ui.button("Quit").clicked() {
                    ui.ctx().send_viewport_cmd(egui::ViewportCommand::Close);
                }
            });

            ui.menu_button("Edit", |ui| {
                let ctrl = &mut self.controller;
                let commands: [(&str, fn(&mut Controller) -> bool); 5] = [
                    ("Hide selection", Controller::hide_selection),
                    ("Hide all except selection", Controller::hide_all_except_selection),
                    ("Unhide all", Controller::unhide_all),
                    ("Flip hidden", Controller::flip_hidden),
                    ("Clear selection", Controller::clear_selection),
                ];
                for (label, command) in commands {
                    if ui.button(label).clicked() {
                        command(ctrl);
                        ui.close();
                    }
                }
            });

            ui.menu_button("View", |ui| {
                let mut dark = self.prefs.dark_mode;
                if ui.checkbox(&mut dark, "Dark mode").changed() {
                    self.prefs.dark_mode = dark;
                    self.theme = Theme::from_dark_mode(dark);
                    self.theme.apply(ui.ctx());
                }
                ui.checkbox(&mut self.settings_panel.state_mut().visible, "Plot settings");
                ui.separator();
                if ui.button("Set domain to view").clicked() {
                    if let Some((l, r)) = self.plot_view.visible_x() {
                        self.controller.set_xlim_to_view(l, r);
                    }
                    ui.close();
                }
                if ui.button("Reset domain").clicked() {
                    self.controller.reset_plot_domain();
                    self.controller.process_events();
                    ui.close();
                }
                if ui.button("Spectrogram bins to view").clicked() {
                    if let Some((b, t)) = self.plot_view.visible_y_fraction() {
                        self.controller.set_spectrogram_lines_to_view(b, t);
                    }
                    ui.close();
                }
                ui.separator();
                if ui.button(format!("{ARROWS_CLOCKWISE} Replot")).clicked() {
                    self.controller.replot();
                    ui.close();
                }
                if ui.button("Reset plot settings").clicked() {
                    self.controller.reset_plot_settings();
                    ui.close();
                }
            });

            ui.menu_button("Tools", |ui| {
                for panel in &mut self.tools {
                    panel.render_menu(ui);
                }
            });
        });
    }

    fn render_status_bar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            if let Some(store_table) = self.controller.store().table() {
                ui.label(format!(
                    "{} rows · {} selected · {} hidden",
                    store_table.len(),
                    self.controller.store().selection().len(),
                    self.controller.store().hidden().len()
                ));
                ui.separator();
            }
            if let Some(err) = self.controller.render_error() {
                ui.colored_label(ui.visuals().error_fg_color, err);
                ui.separator();
            }
            if let Some(fig) = self.controller.figure() {
                for w in &fig.warnings {
                    ui.colored_label(ui.visuals().warn_fg_color, w);
                }
            }
            if let Some(status) = self.controller.status() {
                ui.label(status);
            }
        });
    }
}

impl eframe::App for LabelPlotApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.theme.apply(ctx);
        self.apply_font_size(ctx);
        self.handle_dropped_files(ctx);
        self.controller.process_events();

        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| self.render_menu_bar(ui));
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| self.render_status_bar(ui));

        let visible_x = self.plot_view.visible_x();
        let visible_y = self.plot_view.visible_y_fraction();

        if self.settings_panel.state().visible {
            egui::SidePanel::left("settings_panel")
                .resizable(true)
                .default_width(260.0)
                .show(ctx, |ui| {
                    let mut cx = PanelCtx {
                        ctrl: &mut self.controller,
                        visible_x,
                        visible_y,
                    };
                    self.settings_panel.render_panel(ui, &mut cx);
                });
        }

        let docked: Vec<usize> = (0..self.tools.len())
            .filter(|&i| self.tools[i].state().visible && !self.tools[i].state().detached)
            .collect();
        if !docked.is_empty() {
            egui::SidePanel::right("tools_panel")
                .resizable(true)
                .default_width(280.0)
                .show(ctx, |ui| {
                    for &i in &docked {
                        let panel = &mut self.tools[i];
                        ui.heading(panel.title());
                        let mut cx = PanelCtx {
                            ctrl: &mut self.controller,
                            visible_x,
                            visible_y,
                        };
                        panel.render_panel(ui, &mut cx);
                        ui.separator();
                    }
                });
        }

        for panel in &mut self.tools {
            if !panel.state().visible || !panel.state().detached {
                continue;
            }
            let mut open = true;
            egui::Window::new(panel.title())
                .open(&mut open)
                .resizable(true)
                .show(ctx, |ui| {
                    let mut cx = PanelCtx {
                        ctrl: &mut self.controller,
                        visible_x,
                        visible_y,
                    };
                    panel.render_panel(ui, &mut cx);
                });
            if !open {
                panel.state_mut().visible = false;
            }
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            if let Some((gesture, mode)) = self.plot_view.show(ui, self.controller.figure()) {
                debug!("gesture {:?} with {:?}", gesture, mode);
                self.controller.apply_gesture(&gesture, mode);
            }
        });

        if ctx.input(|i| i.viewport().close_requested()) && !self.prefs_saved {
            self.save_preferences(ctx);
            self.prefs_saved = true;
        }
    }
}
