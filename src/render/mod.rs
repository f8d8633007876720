//! Render orchestration: turns the store and the plot settings into a
//! [`Figure`], the complete description of one frame.
//!
//! Building a figure never touches the UI. The plot view only draws the last
//! successfully built figure, so a failed redraw leaves the previous frame on
//! screen.

pub mod filter;
pub mod label_bars;
pub mod series;
pub mod spectrogram;

use log::{debug, warn};

use crate::data::range::AxisKind;
use crate::data::settings::{PlotSettings, PlotType};
use crate::data::store::DatasetStore;
use crate::data::table::{RowSet, Table, Value};
use crate::data::x_formatter::XFormatter;
use crate::error::RenderError;
use crate::geometry::SelectionTranslator;
use crate::hooks::HookRegistry;

use label_bars::{LabelBar, LabelClasses};
use series::{LegendEntry, SeriesAxis};
use spectrogram::SpectrogramMesh;

/// Everything needed to draw one frame.
#[derive(Clone, Debug, Default)]
pub struct Figure {
    /// Domain summary, e.g. `2.5  -  x`.
    pub title: String,
    pub x_axis: String,
    pub x_kind: Option<AxisKind>,
    pub x_formatter: XFormatter,
    /// Data extent on the x-axis.
    pub x_bounds: (f64, f64),
    pub font_size: f64,
    pub plot_type: PlotType,
    pub axes: Vec<SeriesAxis>,
    pub translator: SelectionTranslator,
    pub label_bars: Vec<LabelBar>,
    pub label_classes: LabelClasses,
    pub spectrogram: Option<SpectrogramMesh>,
    pub legend: Vec<LegendEntry>,
    /// Non-fatal problems met while building, for the status line.
    pub warnings: Vec<String>,
    /// Increases with every successful build.
    pub generation: u64,
}

fn axis_kind(view: &Table, x_axis: &str) -> Result<AxisKind, RenderError> {
    let col = view
        .column(x_axis)
        .ok_or_else(|| RenderError::InvalidColumn(x_axis.to_string()))?;
    match col.first_non_null() {
        Some(Value::DateTime(_)) => Ok(AxisKind::DateTime),
        Some(Value::Int(_) | Value::Float(_) | Value::Bool(_)) => Ok(AxisKind::Numeric),
        _ => Err(RenderError::InvalidColumn(x_axis.to_string())),
    }
}

fn x_extent(view: &Table, x_axis: &str) -> (f64, f64) {
    let Some(col) = view.column(x_axis) else {
        return (0.0, 1.0);
    };
    let (lo, hi) = col
        .values
        .iter()
        .filter_map(Value::as_f64)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if lo.is_finite() {
        (lo, hi)
    } else {
        (0.0, 1.0)
    }
}

/// Build a figure from scratch. Selection colors are not applied here.
pub fn build_figure(
    store: &DatasetStore,
    settings: &PlotSettings,
    hooks: &HookRegistry,
) -> Result<Figure, RenderError> {
    if store.table().is_none() {
        return Err(RenderError::NoTable);
    }
    if settings.x_axis.is_empty() {
        return Err(RenderError::NoXAxis);
    }
    let view = filter::filter_rows(store, &settings.x_axis, &settings.plot_domain, hooks)?;
    if view.table.is_empty() {
        return Err(RenderError::EmptyView);
    }
    let x_kind = axis_kind(&view.table, &settings.x_axis)?;
    let mut warnings: Vec<String> = view.filter_errors.iter().map(|e| format!("{:#}", e)).collect();

    let label_names = store.unique_labels(&settings.color_column);
    let series = series::build_series(&view.table, settings, &label_names)?;
    let (label_bars, label_classes) =
        label_bars::build_label_bars(&view.table, &settings.x_axis, &settings.plotted_labels)?;
    let spectrogram = match spectrogram::build_spectrogram(&view.table, &settings.x_axis, &settings.spectrogram) {
        Ok(mesh) => mesh,
        Err(e @ RenderError::SpectrogramAxis(_)) => {
            warn!("{}", e);
            warnings.push(e.to_string());
            None
        }
        Err(e) => return Err(e),
    };

    debug!(
        "built figure: {} series, {} label bars, spectrogram {}",
        series.clouds.len(),
        label_bars.len(),
        spectrogram.is_some()
    );
    Ok(Figure {
        title: view.title,
        x_axis: settings.x_axis.clone(),
        x_kind: Some(x_kind),
        x_formatter: XFormatter::for_kind(x_kind),
        x_bounds: x_extent(&view.table, &settings.x_axis),
        font_size: settings.font_size.val(),
        plot_type: settings.plot_type,
        axes: series.axes,
        translator: SelectionTranslator::new(series.clouds),
        label_bars,
        label_classes,
        spectrogram,
        legend: tidy_legend(series.legend),
        warnings,
        generation: 0,
    })
}

/// Legend entries sorted by name, first entry per name kept.
fn tidy_legend(mut legend: Vec<LegendEntry>) -> Vec<LegendEntry> {
    legend.sort_by(|a, b| a.name.cmp(&b.name));
    legend.dedup_by(|a, b| a.name == b.name);
    legend
}

// ─────────────────────────────────────────────────────────────────────────────
// RenderOrchestrator
// ─────────────────────────────────────────────────────────────────────────────

/// Holds the current frame and rebuilds it on request.
#[derive(Debug, Default)]
pub struct RenderOrchestrator {
    figure: Option<Figure>,
    last_error: Option<String>,
    generation: u64,
}

impl RenderOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the frame and color it for the store's current selection.
    /// On failure the error is logged and kept, and the previous frame stays.
    pub fn redraw(&mut self, store: &DatasetStore, settings: &PlotSettings, hooks: &HookRegistry) -> bool {
        match build_figure(store, settings, hooks) {
            Ok(mut figure) => {
                self.generation += 1;
                figure.generation = self.generation;
                figure.translator.recolor_for_selection(store.selection());
                self.figure = Some(figure);
                self.last_error = None;
                true
            }
            Err(RenderError::NoTable) => {
                self.figure = None;
                self.last_error = None;
                false
            }
            Err(e) => {
                warn!("redraw failed: {}", e);
                self.last_error = Some(e.to_string());
                false
            }
        }
    }

    /// Update only the colors of the current frame.
    pub fn recolor(&mut self, selection: &RowSet) {
        if let Some(figure) = &mut self.figure {
            figure.translator.recolor_for_selection(selection);
        }
    }

    pub fn figure(&self) -> Option<&Figure> {
        self.figure.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}
