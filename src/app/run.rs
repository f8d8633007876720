//! Top-level entry point for running LabelPlot as a native window.

use std::path::PathBuf;

use eframe::egui;

use crate::hooks::HookRegistry;
use crate::persistence::{default_preferences_path, Preferences};

use super::LabelPlotApp;

/// How to start the application.
pub struct LaunchOptions {
    /// Data file opened at startup.
    pub file: Option<PathBuf>,
    /// Overrides the saved preference when set.
    pub dark_mode: Option<bool>,
    /// Overrides the saved window size when set.
    pub window_size: Option<[f32; 2]>,
    /// Outer position of the window.
    pub window_pos: Option<[f32; 2]>,
    /// Where preferences are read from and written to; `None` disables them.
    pub preferences_path: Option<PathBuf>,
    pub hooks: HookRegistry,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            file: None,
            dark_mode: None,
            window_size: None,
            window_pos: None,
            preferences_path: default_preferences_path(),
            hooks: HookRegistry::with_builtins(),
        }
    }
}

/// Open the annotator window. Blocks until it is closed.
pub fn run_labelplot(options: LaunchOptions) -> eframe::Result<()> {
    let saved_size = options
        .preferences_path
        .as_deref()
        .map(|p| Preferences::load_or_default(p).window_size)
        .unwrap_or(Preferences::default().window_size);
    let [w, h] = options.window_size.unwrap_or(saved_size);

    let title = match &options.file {
        Some(f) => format!("LabelPlot - {}", f.display()),
        None => "LabelPlot".to_string(),
    };
    let mut viewport = egui::ViewportBuilder::default()
        .with_title(title.clone())
        .with_inner_size(egui::vec2(w, h))
        .with_drag_and_drop(true);
    if let Some([x, y]) = options.window_pos {
        viewport = viewport.with_position(egui::pos2(x, y));
    }
    let opts = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };

    eframe::run_native(
        &title,
        opts,
        Box::new(move |cc| {
            // Install Phosphor icon font before creating the app.
            let mut fonts = egui::FontDefinitions::default();
            egui_phosphor::add_to_fonts(&mut fonts, egui_phosphor::Variant::Regular);
            cc.egui_ctx.set_fonts(fonts);
            Ok(Box::new(LabelPlotApp::new(options)))
        }),
    )
}
