//! Persisted state: user preferences and saved plot settings, both as JSON.
//!
//! Preferences live in the platform config directory and are never required:
//! a missing or unreadable file just means defaults. Plot settings travel
//! through [`PlotSettingsSerde`], which holds only the user's choices and is
//! applied back through the settings model so the usual change events fire.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::color_scheme::Colormap;
use crate::data::range::{AxisValue, LimitedRange};
use crate::data::settings::{ColorMethod, PlotSettings, PlotSettingsModel, PlotType};

const APP_DIR: &str = "labelplot";
const PREFERENCES_FILE: &str = "preferences.json";

// ─────────────────────────────────────────────────────────────────────────────
// Preferences
// ─────────────────────────────────────────────────────────────────────────────

/// Per-user application preferences.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub window_size: [f32; 2],
    pub dark_mode: bool,
    pub last_data_folder: Option<PathBuf>,
    pub last_script_folder: Option<PathBuf>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            window_size: [1400.0, 900.0],
            dark_mode: false,
            last_data_folder: None,
            last_script_folder: None,
        }
    }
}

/// `<config dir>/labelplot/preferences.json`, if the platform has a config dir.
pub fn default_preferences_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join(PREFERENCES_FILE))
}

impl Preferences {
    /// Read preferences from `path`. Anything unreadable yields defaults.
    pub fn load_or_default(path: &Path) -> Preferences {
        if !path.exists() {
            debug!("no preferences at {}", path.display());
            return Preferences::default();
        }
        match Self::load(path) {
            Ok(p) => p,
            Err(e) => {
                warn!("ignoring preferences at {}: {:#}", path.display(), e);
                Preferences::default()
            }
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Preferences> {
        let txt = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&txt).with_context(|| format!("parsing {}", path.display()))
    }

    /// Write preferences, creating the parent directory if needed.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }
        let txt = serde_json::to_string_pretty(self)?;
        std::fs::write(path, txt).with_context(|| format!("writing {}", path.display()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Plot settings
// ─────────────────────────────────────────────────────────────────────────────

/// Serializable snapshot of the user-chosen plot settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlotSettingsSerde {
    pub x_axis: String,
    pub plot_list: Vec<String>,
    pub plotted_labels: Vec<String>,
    pub plot_type: PlotType,
    pub color_method: ColorMethod,
    pub color_column: String,
    pub domain: [Option<AxisValue>; 2],
    pub spectrogram_enabled: bool,
    pub spectrogram_column: String,
    pub spectrogram_lines: [Option<usize>; 2],
    pub spectrogram_brightness: f64,
    pub spectrogram_quality: f64,
    pub colormap: Colormap,
    pub font_size: f64,
    pub gap_fill_ms: i64,
    #[serde(default)]
    pub label_column_presets: Vec<String>,
}

impl From<&PlotSettings> for PlotSettingsSerde {
    fn from(s: &PlotSettings) -> Self {
        Self {
            x_axis: s.x_axis.clone(),
            plot_list: s.plot_list.clone(),
            plotted_labels: s.plotted_labels.clone(),
            plot_type: s.plot_type,
            color_method: s.color_method,
            color_column: s.color_column.clone(),
            domain: [s.plot_domain.left_val(), s.plot_domain.right_val()],
            spectrogram_enabled: s.spectrogram.enabled,
            spectrogram_column: s.spectrogram.column.clone(),
            spectrogram_lines: [s.spectrogram.lines.left_val(), s.spectrogram.lines.right_val()],
            spectrogram_brightness: s.spectrogram.brightness.val(),
            spectrogram_quality: s.spectrogram.quality.val(),
            colormap: s.spectrogram.colormap,
            font_size: s.font_size.val(),
            gap_fill_ms: s.gap_fill_ms.val(),
            label_column_presets: s.label_column_presets.clone(),
        }
    }
}

impl PlotSettingsSerde {
    /// Apply the snapshot through the model's setters. Bounded values are
    /// clamped to the current limits; the domain keeps the current limits.
    pub fn apply_to(self, model: &mut PlotSettingsModel) {
        model.set_x_axis(self.x_axis);
        model.set_plot_list(self.plot_list);
        model.set_plotted_labels(self.plotted_labels);
        model.set_plot_type(self.plot_type);
        model.set_color_method(self.color_method);
        model.set_color_column(self.color_column);
        let [left, right] = self.domain;
        model.set_domain_window(left, right);
        model.set_spectrogram_enabled(self.spectrogram_enabled);
        model.set_spectrogram_column(self.spectrogram_column);
        let mut lines = model.get().spectrogram.lines.clone();
        lines.copy_vals(&LimitedRange::new(None, None, self.spectrogram_lines[0], self.spectrogram_lines[1]));
        model.set_spectrogram_lines(lines);
        model.set_spectrogram_brightness(self.spectrogram_brightness);
        model.set_spectrogram_quality(self.spectrogram_quality);
        model.set_spectrogram_colormap(self.colormap);
        model.set_font_size(self.font_size);
        model.set_gap_fill_ms(self.gap_fill_ms);
        model.set_label_column_presets(self.label_column_presets);
    }
}

pub fn settings_to_json(settings: &PlotSettings) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(&PlotSettingsSerde::from(settings))?)
}

pub fn settings_from_json(json: &str) -> anyhow::Result<PlotSettingsSerde> {
    Ok(serde_json::from_str(json)?)
}

pub fn save_settings_to_path(settings: &PlotSettings, path: &Path) -> anyhow::Result<()> {
    let txt = settings_to_json(settings)?;
    std::fs::write(path, txt).with_context(|| format!("writing {}", path.display()))
}

pub fn load_settings_from_path(path: &Path) -> anyhow::Result<PlotSettingsSerde> {
    let txt = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    settings_from_json(&txt).with_context(|| format!("parsing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corrupt_preferences_fall_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(Preferences::load_or_default(&path), Preferences::default());
    }

    #[test]
    fn preferences_round_trip_creates_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("prefs.json");
        let prefs = Preferences {
            dark_mode: true,
            last_script_folder: Some(PathBuf::from("/tmp/scripts")),
            ..Preferences::default()
        };
        prefs.save(&path).unwrap();
        assert_eq!(Preferences::load_or_default(&path), prefs);
    }

    #[test]
    fn partial_preferences_keep_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, r#"{"dark_mode": true}"#).unwrap();
        let p = Preferences::load_or_default(&path);
        assert!(p.dark_mode);
        assert_eq!(p.window_size, Preferences::default().window_size);
    }

    #[test]
    fn settings_snapshot_applies_through_model() {
        let mut src = PlotSettingsModel::default();
        src.set_plot_list(vec!["a".into(), "b".into()]);
        src.set_font_size(14.0);
        src.set_plot_type(PlotType::Scatter);
        let json = settings_to_json(src.get()).unwrap();

        let mut dst = PlotSettingsModel::default();
        settings_from_json(&json).unwrap().apply_to(&mut dst);
        assert_eq!(dst.get().plot_list, ["a", "b"]);
        assert_eq!(dst.get().font_size.val(), 14.0);
        assert_eq!(dst.get().plot_type, PlotType::Scatter);
    }
}
