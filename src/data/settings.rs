//! Plot settings: the user's visualization choices, independent of any one
//! table.
//!
//! [`PlotSettings`] is the plain record; [`PlotSettingsModel`] owns one and
//! emits a [`SettingsEvent`] for every field that actually changes. Setting a
//! field to its current value is a no-op and emits nothing, which is what
//! stops view → model → view cycles.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::mpsc::Receiver;

use log::debug;
use serde::{Deserialize, Serialize};

use super::range::{AxisValue, LimitedRange, LimitedValue};
use super::table::DATETIME_COLUMN;
use crate::color_scheme::Colormap;
use crate::events::{EventController, EventFilter, SettingsEvent, SettingsField};

/// How series are drawn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlotType {
    #[default]
    Line,
    Scatter,
}

impl fmt::Display for PlotType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PlotType::Line => "Line",
            PlotType::Scatter => "Scatter",
        })
    }
}

/// Where point colors come from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColorMethod {
    /// One color per plotted column.
    #[default]
    ByColumn,
    /// Color each point by its value in the color column.
    ByLabel,
}

impl fmt::Display for ColorMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ColorMethod::ByColumn => "Based On Column",
            ColorMethod::ByLabel => "Based On Labels",
        })
    }
}

/// Spectrogram overlay settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpectrogramSettings {
    pub enabled: bool,
    /// Array column to draw; empty for none.
    pub column: String,
    /// Which vector entries (frequency bins) to draw.
    pub lines: LimitedRange<usize>,
    pub brightness: LimitedValue<f64>,
    /// 1.0 draws every bin; lower values average bins together.
    pub quality: LimitedValue<f64>,
    pub colormap: Colormap,
}

impl Default for SpectrogramSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            column: String::new(),
            lines: LimitedRange::default(),
            brightness: LimitedValue::bounded(0.0, 1.0, 0.5),
            quality: LimitedValue::bounded(0.1, 1.0, 1.0),
            colormap: Colormap::default(),
        }
    }
}

/// Every user-chosen visualization parameter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlotSettings {
    pub x_axis: String,
    pub plot_list: Vec<String>,
    pub plotted_labels: Vec<String>,
    pub plot_type: PlotType,
    pub color_method: ColorMethod,
    pub color_column: String,
    pub plot_domain: LimitedRange<AxisValue>,
    pub spectrogram: SpectrogramSettings,
    pub font_size: LimitedValue<f64>,
    pub gap_fill_ms: LimitedValue<i64>,

    pub default_x_axis: String,
    pub plot_list_default: Vec<String>,
    /// Columns listed first (in this order) in column pickers.
    pub column_order: Vec<String>,
    /// Label columns always offered in the labeler.
    pub label_column_presets: Vec<String>,
    /// Labels always offered for a label column.
    pub label_options_presets: BTreeMap<String, Vec<String>>,
}

impl Default for PlotSettings {
    fn default() -> Self {
        Self::to_default()
    }
}

impl PlotSettings {
    /// Fresh settings with every default value.
    pub fn to_default() -> PlotSettings {
        PlotSettings {
            x_axis: DATETIME_COLUMN.to_string(),
            plot_list: Vec::new(),
            plotted_labels: Vec::new(),
            plot_type: PlotType::Line,
            color_method: ColorMethod::ByColumn,
            color_column: String::new(),
            plot_domain: LimitedRange::default(),
            spectrogram: SpectrogramSettings::default(),
            font_size: LimitedValue::bounded(4.0, 30.0, 10.0),
            gap_fill_ms: LimitedValue::bounded(0, 10_000, 0),
            default_x_axis: DATETIME_COLUMN.to_string(),
            plot_list_default: vec!["Depth(m)".to_string()],
            column_order: vec![DATETIME_COLUMN.to_string()],
            label_column_presets: Vec::new(),
            label_options_presets: BTreeMap::new(),
        }
    }
}

/// Sort column names: those in `default_order` first, in that order, then
/// the rest alphabetically.
///
/// ```
/// # use labelplot::data::settings::sort_columns;
/// let mut cols = vec!["b".to_string(), "a".to_string(), "c".to_string()];
/// sort_columns(&mut cols, &["c".to_string(), "b".to_string()]);
/// assert_eq!(cols, ["c", "b", "a"]);
/// ```
pub fn sort_columns(columns: &mut [String], default_order: &[String]) {
    columns.sort_by(|a, b| {
        let rank = |s: &String| default_order.iter().position(|d| d == s).unwrap_or(usize::MAX);
        rank(a).cmp(&rank(b)).then_with(|| a.cmp(b))
    });
}

/// Owner of the live [`PlotSettings`]; the only place they are mutated.
pub struct PlotSettingsModel {
    settings: PlotSettings,
    events: EventController<SettingsEvent>,
}

impl Default for PlotSettingsModel {
    fn default() -> Self {
        Self::new(PlotSettings::to_default())
    }
}

macro_rules! setter {
    ($(#[$meta:meta])* $name:ident, $field:ident, $ty:ty, $tag:ident) => {
        $(#[$meta])*
        pub fn $name(&mut self, value: $ty) -> bool {
            if self.settings.$field == value {
                return false;
            }
            debug!("settings: {} -> {:?}", stringify!($field), value);
            self.settings.$field = value;
            self.emit(SettingsField::$tag);
            true
        }
    };
}

impl PlotSettingsModel {
    pub fn new(settings: PlotSettings) -> Self {
        Self {
            settings,
            events: EventController::new(),
        }
    }

    pub fn get(&self) -> &PlotSettings {
        &self.settings
    }

    pub fn events(&self) -> &EventController<SettingsEvent> {
        &self.events
    }

    pub fn subscribe(&self, filter: EventFilter) -> Receiver<SettingsEvent> {
        self.events.subscribe(filter)
    }

    fn emit(&self, field: SettingsField) {
        self.events.emit(SettingsEvent::Changed(field));
    }

    setter!(set_x_axis, x_axis, String, XAxis);
    setter!(set_plot_list, plot_list, Vec<String>, PlotList);
    setter!(set_plotted_labels, plotted_labels, Vec<String>, PlottedLabels);
    setter!(set_plot_type, plot_type, PlotType, PlotType);
    setter!(set_color_method, color_method, ColorMethod, ColorMethod);
    setter!(set_color_column, color_column, String, ColorColumn);
    setter!(set_label_column_presets, label_column_presets, Vec<String>, LabelPresets);
    setter!(
        set_label_options_presets,
        label_options_presets,
        BTreeMap<String, Vec<String>>,
        LabelPresets
    );

    // ── Domain ─────────────────────────────────────────────────────────

    /// Replace the whole domain range.
    pub fn set_plot_domain(&mut self, domain: LimitedRange<AxisValue>) -> bool {
        if self.settings.plot_domain == domain {
            return false;
        }
        self.settings.plot_domain = domain;
        self.emit(SettingsField::PlotDomain);
        true
    }

    pub fn set_domain_left(&mut self, left: Option<AxisValue>) -> bool {
        let mut d = self.settings.plot_domain.clone();
        d.set_left_val(left);
        self.set_plot_domain(d)
    }

    pub fn set_domain_right(&mut self, right: Option<AxisValue>) -> bool {
        let mut d = self.settings.plot_domain.clone();
        d.set_right_val(right);
        self.set_plot_domain(d)
    }

    /// Set both ends of the window (clamped into the limits).
    pub fn set_domain_window(&mut self, left: Option<AxisValue>, right: Option<AxisValue>) -> bool {
        let mut d = self.settings.plot_domain.clone();
        let window = LimitedRange::new(None, None, left, right);
        d.copy_vals(&window);
        self.set_plot_domain(d)
    }

    /// Adopt the limits of `observed` (a column's value range), re-clamping the
    /// window. A window that collapsed to a point, or whose kind no longer
    /// matches, is reset to span the new limits.
    pub fn adopt_domain_limits(&mut self, observed: &LimitedRange<AxisValue>) -> bool {
        let mut d = self.settings.plot_domain.clone();
        if d.kind().is_some() && observed.kind().is_some() && d.kind() != observed.kind() {
            d = LimitedRange::default();
        }
        d.copy_limits(observed);
        if d.left_val().is_none() || d.right_val().is_none() || d.left_val() == d.right_val() {
            d = LimitedRange::new(observed.min_val(), observed.max_val(), None, None);
        }
        self.set_plot_domain(d)
    }

    // ── Spectrogram ────────────────────────────────────────────────────

    pub fn set_spectrogram_enabled(&mut self, enabled: bool) -> bool {
        if self.settings.spectrogram.enabled == enabled {
            return false;
        }
        self.settings.spectrogram.enabled = enabled;
        self.emit(SettingsField::SpectrogramEnabled);
        true
    }

    pub fn set_spectrogram_column(&mut self, column: String) -> bool {
        if self.settings.spectrogram.column == column {
            return false;
        }
        self.settings.spectrogram.column = column;
        self.emit(SettingsField::SpectrogramColumn);
        true
    }

    pub fn set_spectrogram_lines(&mut self, lines: LimitedRange<usize>) -> bool {
        if self.settings.spectrogram.lines == lines {
            return false;
        }
        self.settings.spectrogram.lines = lines;
        self.emit(SettingsField::SpectrogramLines);
        true
    }

    /// Set the drawn bin window, clamped to the available bins.
    pub fn set_spectrogram_window(&mut self, left: usize, right: usize) -> bool {
        let mut lines = self.settings.spectrogram.lines.clone();
        let window = LimitedRange::new(None, None, Some(left), Some(right));
        lines.copy_vals(&window);
        self.set_spectrogram_lines(lines)
    }

    pub fn set_spectrogram_brightness(&mut self, v: f64) -> bool {
        let changed = self.settings.spectrogram.brightness.set_val(v);
        if changed {
            self.emit(SettingsField::SpectrogramBrightness);
        }
        changed
    }

    pub fn set_spectrogram_quality(&mut self, v: f64) -> bool {
        let changed = self.settings.spectrogram.quality.set_val(v);
        if changed {
            self.emit(SettingsField::SpectrogramQuality);
        }
        changed
    }

    pub fn set_spectrogram_colormap(&mut self, colormap: Colormap) -> bool {
        if self.settings.spectrogram.colormap == colormap {
            return false;
        }
        self.settings.spectrogram.colormap = colormap;
        self.emit(SettingsField::SpectrogramColormap);
        true
    }

    // ── Cosmetics and selection ────────────────────────────────────────

    pub fn set_font_size(&mut self, v: f64) -> bool {
        let changed = self.settings.font_size.set_val(v);
        if changed {
            self.emit(SettingsField::FontSize);
        }
        changed
    }

    pub fn set_gap_fill_ms(&mut self, v: i64) -> bool {
        let changed = self.settings.gap_fill_ms.set_val(v);
        if changed {
            self.emit(SettingsField::GapFill);
        }
        changed
    }

    /// Replace every field, field by field, with `other`'s value, emitting
    /// only for fields that differ.
    pub fn assign(&mut self, other: PlotSettings) {
        let PlotSettings {
            x_axis,
            plot_list,
            plotted_labels,
            plot_type,
            color_method,
            color_column,
            plot_domain,
            spectrogram,
            font_size,
            gap_fill_ms,
            default_x_axis,
            plot_list_default,
            column_order,
            label_column_presets,
            label_options_presets,
        } = other;
        self.set_x_axis(x_axis);
        self.set_plot_list(plot_list);
        self.set_plotted_labels(plotted_labels);
        self.set_plot_type(plot_type);
        self.set_color_method(color_method);
        self.set_color_column(color_column);
        self.set_plot_domain(plot_domain);
        self.set_spectrogram_enabled(spectrogram.enabled);
        self.set_spectrogram_column(spectrogram.column);
        self.set_spectrogram_lines(spectrogram.lines);
        self.set_spectrogram_colormap(spectrogram.colormap);
        if self.settings.spectrogram.brightness != spectrogram.brightness {
            self.settings.spectrogram.brightness = spectrogram.brightness;
            self.emit(SettingsField::SpectrogramBrightness);
        }
        if self.settings.spectrogram.quality != spectrogram.quality {
            self.settings.spectrogram.quality = spectrogram.quality;
            self.emit(SettingsField::SpectrogramQuality);
        }
        if self.settings.font_size != font_size {
            self.settings.font_size = font_size;
            self.emit(SettingsField::FontSize);
        }
        if self.settings.gap_fill_ms != gap_fill_ms {
            self.settings.gap_fill_ms = gap_fill_ms;
            self.emit(SettingsField::GapFill);
        }
        self.settings.default_x_axis = default_x_axis;
        self.settings.plot_list_default = plot_list_default;
        self.settings.column_order = column_order;
        self.set_label_column_presets(label_column_presets);
        self.set_label_options_presets(label_options_presets);
    }

    /// Reset every field to [`PlotSettings::to_default`].
    pub fn reset(&mut self) {
        self.assign(PlotSettings::to_default());
        self.events.emit(SettingsEvent::Reset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::drain;

    #[test]
    fn setting_same_value_is_silent() {
        let mut m = PlotSettingsModel::default();
        let rx = m.subscribe(EventFilter::all());
        assert!(!m.set_x_axis(DATETIME_COLUMN.to_string()));
        assert!(m.set_x_axis("Depth(m)".to_string()));
        assert!(!m.set_x_axis("Depth(m)".to_string()));
        assert_eq!(drain(&rx), vec![SettingsEvent::Changed(SettingsField::XAxis)]);
    }

    #[test]
    fn limited_fields_clamp() {
        let mut m = PlotSettingsModel::default();
        assert!(m.set_font_size(100.0));
        assert_eq!(m.get().font_size.val(), 30.0);
        assert!(!m.set_font_size(31.0));
        assert!(m.set_gap_fill_ms(-5) == false);
        assert_eq!(m.get().gap_fill_ms.val(), 0);
    }

    #[test]
    fn reset_restores_defaults_and_announces_it() {
        let mut m = PlotSettingsModel::default();
        m.set_plot_type(PlotType::Scatter);
        m.set_spectrogram_enabled(true);
        let rx = m.subscribe(EventFilter::all());
        m.reset();
        assert_eq!(m.get(), &PlotSettings::to_default());
        let evs = drain(&rx);
        assert!(evs.contains(&SettingsEvent::Changed(SettingsField::PlotType)));
        assert!(evs.contains(&SettingsEvent::Changed(SettingsField::SpectrogramEnabled)));
        assert_eq!(evs.last(), Some(&SettingsEvent::Reset));
    }

    #[test]
    fn adopting_limits_respans_collapsed_window() {
        let mut m = PlotSettingsModel::default();
        m.adopt_domain_limits(&LimitedRange::spanning(AxisValue::Number(0.0), AxisValue::Number(0.0)));
        m.adopt_domain_limits(&LimitedRange::spanning(AxisValue::Number(0.0), AxisValue::Number(10.0)));
        let d = &m.get().plot_domain;
        assert_eq!(d.left_val(), Some(AxisValue::Number(0.0)));
        assert_eq!(d.right_val(), Some(AxisValue::Number(10.0)));
    }

    #[test]
    fn adopting_limits_keeps_window_inside() {
        let mut m = PlotSettingsModel::default();
        m.adopt_domain_limits(&LimitedRange::spanning(AxisValue::Number(0.0), AxisValue::Number(10.0)));
        m.set_domain_window(Some(AxisValue::Number(2.0)), Some(AxisValue::Number(8.0)));
        m.adopt_domain_limits(&LimitedRange::spanning(AxisValue::Number(5.0), AxisValue::Number(20.0)));
        let d = &m.get().plot_domain;
        assert_eq!(d.left_val(), Some(AxisValue::Number(5.0)));
        assert_eq!(d.right_val(), Some(AxisValue::Number(8.0)));
    }
}
