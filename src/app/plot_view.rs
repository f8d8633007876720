//! The central plot: series, spectrogram image and label bars, plus capture
//! of the selection gestures.
//!
//! All series share one surface whose y range is `[0, 1]`; each series gets
//! its own right-hand axis that maps the surface back to its true values.
//! Gestures are reported in surface coordinates and resolved to rows by the
//! controller.

use std::collections::HashMap;

use eframe::egui::{self, Color32, PointerButton, RichText, Stroke, TextureHandle, Ui};
use egui_plot::{
    AxisHints, HPlacement, Legend, Line, Plot, PlotBounds, PlotImage, PlotPoint, PlotPoints, Points, Polygon,
};

use crate::color_scheme::Rgba;
use crate::controller::{selection_mode, Gesture};
use crate::data::selection::SelectionMode;
use crate::geometry::{CloudKind, SeriesCloud};
use crate::render::label_bars::{LabelBar, LabelClasses, LABEL_BAR_RELATIVE_HEIGHT};
use crate::render::spectrogram::{SpectrogramMesh, FREQUENCY_AXIS_LABEL};
use crate::render::Figure;

const X_LINK_GROUP: &str = "labelplot_x";
const MIN_BAR_HEIGHT: f32 = 14.0;
const LASSO_COLOR: Color32 = Color32::from_rgb(0xd6, 0x27, 0x28);

/// Plot-space state that survives between frames.
#[derive(Default)]
pub(crate) struct PlotView {
    lasso: Vec<[f64; 2]>,
    drag_start: Option<([f64; 2], PointerButton)>,
    drag_current: Option<[f64; 2]>,
    fitted_generation: u64,
    texture: Option<(u64, TextureHandle)>,
    bounds: Option<PlotBounds>,
}

impl PlotView {
    /// Visible x range of the main plot in the last frame.
    pub fn visible_x(&self) -> Option<(f64, f64)> {
        self.bounds.map(|b| (b.min()[0], b.max()[0]))
    }

    /// Visible part of the normalized surface in the last frame, clamped to `[0, 1]`.
    pub fn visible_y_fraction(&self) -> Option<(f64, f64)> {
        self.bounds
            .map(|b| (b.min()[1].clamp(0.0, 1.0), b.max()[1].clamp(0.0, 1.0)))
    }

    /// Draw `figure` and return a finished gesture, if any.
    pub fn show(&mut self, ui: &mut Ui, figure: Option<&Figure>) -> Option<(Gesture, SelectionMode)> {
        let Some(fig) = figure else {
            ui.centered_and_justified(|ui| {
                ui.label("Open a file (File → Open…) or drop one on the window.");
            });
            return None;
        };

        let n_bars = fig.label_bars.len();
        let total_h = ui.available_height();
        let bar_h = (total_h * LABEL_BAR_RELATIVE_HEIGHT / 10.0).max(MIN_BAR_HEIGHT);
        let spacing = ui.spacing().item_spacing.y;
        let main_h = (total_h - n_bars as f32 * (bar_h + spacing)).max(100.0);

        ui.label(RichText::new(&fig.title).strong());
        let gesture = self.show_main(ui, fig, main_h, n_bars == 0);
        for (i, bar) in fig.label_bars.iter().enumerate() {
            show_label_bar(ui, fig, bar, &fig.label_classes, bar_h, i + 1 == n_bars);
        }
        gesture
    }

    fn spectrogram_texture(&mut self, ctx: &egui::Context, fig: &Figure, mesh: &SpectrogramMesh) -> Option<egui::TextureId> {
        let (w, h) = (mesh.cols(), mesh.rows());
        if w == 0 || h == 0 {
            return None;
        }
        if self.texture.as_ref().map(|(g, _)| *g) != Some(fig.generation) {
            // Image rows run top to bottom, mesh rows bottom to top.
            let mut rgba = Vec::with_capacity(w * h * 4);
            for r in (0..h).rev() {
                for c in &mesh.colors[r * w..(r + 1) * w] {
                    rgba.extend_from_slice(&c.to_color32().to_array());
                }
            }
            let image = egui::ColorImage::from_rgba_unmultiplied([w, h], &rgba);
            let handle = ctx.load_texture("spectrogram", image, egui::TextureOptions::NEAREST);
            self.texture = Some((fig.generation, handle));
        }
        self.texture.as_ref().map(|(_, t)| t.id())
    }

    fn show_main(&mut self, ui: &mut Ui, fig: &Figure, height: f32, bottom: bool) -> Option<(Gesture, SelectionMode)> {
        let formatter = fig.x_formatter.clone();
        let mut y_axes: Vec<AxisHints> = fig
            .axes
            .iter()
            .map(|axis| {
                let (lo, hi) = axis.y_range;
                AxisHints::new_y()
                    .label(RichText::new(&axis.column).color(axis.color.to_color32()))
                    .placement(HPlacement::Right)
                    .formatter(move |mark, _range| format!("{:.3}", lo + mark.value * (hi - lo)))
            })
            .collect();
        if let Some(mesh) = &fig.spectrogram {
            let (lo, hi) = mesh.freq_range;
            y_axes.insert(
                0,
                AxisHints::new_y()
                    .label(FREQUENCY_AXIS_LABEL)
                    .placement(HPlacement::Left)
                    .formatter(move |mark, _range| format!("{:.0}", lo + mark.value * (hi - lo))),
            );
        }

        let plot = Plot::new("labelplot_main")
            .height(height)
            .legend(Legend::default())
            .allow_drag(false)
            .allow_boxed_zoom(false)
            .allow_scroll(false)
            .allow_zoom(true)
            .link_axis(X_LINK_GROUP, [true, false])
            .show_axes([bottom, true])
            .custom_y_axes(y_axes)
            .x_axis_formatter(move |mark, range| {
                formatter.format_tick(mark.value, (*range.start(), *range.end()), mark.step_size.abs())
            });

        let texture = fig
            .spectrogram
            .as_ref()
            .and_then(|mesh| self.spectrogram_texture(ui.ctx(), fig, mesh));
        let refit = self.fitted_generation != fig.generation;
        let modifiers = ui.input(|i| i.modifiers);

        let resp = plot.show(ui, |plot_ui| {
            if refit {
                let (x0, x1) = fig.x_bounds;
                let pad = ((x1 - x0) * 0.02).max(0.5);
                plot_ui.set_plot_bounds_x(x0 - pad..=x1 + pad);
                plot_ui.set_plot_bounds_y(-0.02..=1.02);
            }

            if let (Some(mesh), Some(tex)) = (&fig.spectrogram, texture) {
                let x0 = mesh.x.first().copied().unwrap_or(0.0);
                let x1 = mesh.x.last().copied().unwrap_or(x0);
                let width = (x1 - x0).max(1.0);
                plot_ui.image(PlotImage::new(
                    "spectrogram",
                    tex,
                    PlotPoint::new(x0 + width / 2.0, 0.5),
                    egui::vec2(width as f32, 1.0),
                ));
            }

            for (cloud, axis) in fig.translator.clouds().iter().zip(&fig.axes) {
                draw_cloud(plot_ui, cloud, axis.color);
            }
            for entry in &fig.legend {
                plot_ui.points(
                    Points::new(entry.name.clone(), Vec::<[f64; 2]>::new())
                        .color(entry.color.to_color32())
                        .radius(4.0),
                );
            }

            let pointer = plot_ui.pointer_coordinate().map(|p| [p.x, p.y]);
            let gesture = self.track_gesture(plot_ui.response(), pointer, modifiers);
            self.draw_gesture_preview(plot_ui);
            gesture
        });

        self.fitted_generation = fig.generation;
        self.bounds = Some(*resp.transform.bounds());
        resp.inner
    }

    fn track_gesture(
        &mut self,
        resp: &egui::Response,
        pointer: Option<[f64; 2]>,
        modifiers: egui::Modifiers,
    ) -> Option<(Gesture, SelectionMode)> {
        for button in [PointerButton::Primary, PointerButton::Middle, PointerButton::Secondary] {
            if resp.drag_started_by(button) {
                if let Some(p) = pointer {
                    self.drag_start = Some((p, button));
                    self.drag_current = Some(p);
                    self.lasso = vec![p];
                }
            }
        }
        let (start, button) = self.drag_start?;
        if resp.dragged_by(button) {
            if let Some(p) = pointer {
                self.drag_current = Some(p);
                if button == PointerButton::Primary && self.lasso.last() != Some(&p) {
                    self.lasso.push(p);
                }
            }
        }
        if !resp.drag_stopped_by(button) {
            return None;
        }
        let end = pointer.or(self.drag_current).unwrap_or(start);
        let lasso = std::mem::take(&mut self.lasso);
        self.drag_start = None;
        self.drag_current = None;
        let gesture = match button {
            PointerButton::Primary => Gesture::Lasso(lasso),
            PointerButton::Middle => Gesture::Rectangle(start, end),
            _ => Gesture::Span(start[0], end[0]),
        };
        let mode = selection_mode(modifiers.ctrl || modifiers.command, modifiers.shift, modifiers.alt);
        Some((gesture, mode))
    }

    fn draw_gesture_preview(&self, plot_ui: &mut egui_plot::PlotUi) {
        let (Some((start, button)), Some(cur)) = (self.drag_start, self.drag_current) else {
            return;
        };
        let stroke = Stroke::new(1.5, LASSO_COLOR);
        let outline: Vec<[f64; 2]> = match button {
            PointerButton::Primary => {
                let mut pts = self.lasso.clone();
                pts.push(start);
                pts
            }
            PointerButton::Middle => vec![start, [cur[0], start[1]], cur, [start[0], cur[1]], start],
            _ => vec![[start[0], 0.0], [start[0], 1.0], [cur[0], 1.0], [cur[0], 0.0], [start[0], 0.0]],
        };
        plot_ui.line(Line::new("", PlotPoints::from(outline)).stroke(stroke));
    }
}

/// Lines are split into runs of equal segment color; scatter points are
/// grouped by color.
/// How a line cloud is drawn: runs of equally colored segments, or a lone
/// marker when there is nothing to join.
#[derive(Debug, PartialEq)]
enum LineShape {
    Runs(Vec<(Vec<[f64; 2]>, Rgba)>),
    Marker([f64; 2], Rgba),
    Empty,
}

fn line_shape(cloud: &SeriesCloud, fallback: Rgba) -> LineShape {
    let pts = cloud.normalized_points();
    match pts.len() {
        0 => return LineShape::Empty,
        1 => return LineShape::Marker(pts[0], fallback),
        _ => {}
    }
    let mut runs = Vec::new();
    let mut run_start = 0;
    for i in 0..cloud.colors.len() {
        let last = i + 1 == cloud.colors.len();
        if last || cloud.colors[i + 1] != cloud.colors[i] {
            runs.push((pts[run_start..=i + 1].to_vec(), cloud.colors[i]));
            run_start = i + 1;
        }
    }
    LineShape::Runs(runs)
}

fn draw_cloud(plot_ui: &mut egui_plot::PlotUi, cloud: &SeriesCloud, fallback: Rgba) {
    match cloud.kind {
        CloudKind::Line => match line_shape(cloud, fallback) {
            LineShape::Runs(runs) => {
                for (run, color) in runs {
                    plot_ui.line(Line::new("", run).color(color.to_color32()).width(1.5));
                }
            }
            LineShape::Marker(p, color) => {
                plot_ui.points(Points::new("", vec![p]).color(color.to_color32()).radius(2.0));
            }
            LineShape::Empty => {}
        },
        CloudKind::Scatter => {
            let mut groups: HashMap<Color32, Vec<[f64; 2]>> = HashMap::new();
            for (p, c) in cloud.normalized_points().iter().zip(&cloud.colors) {
                groups.entry(c.to_color32()).or_default().push(*p);
            }
            for (color, points) in groups {
                plot_ui.points(Points::new("", points).color(color).radius(2.0));
            }
        }
    }
}

fn show_label_bar(ui: &mut Ui, fig: &Figure, bar: &LabelBar, classes: &LabelClasses, height: f32, bottom: bool) {
    let formatter = fig.x_formatter.clone();
    Plot::new(("labelplot_bar", bar.column.as_str()))
        .height(height)
        .allow_drag(false)
        .allow_boxed_zoom(false)
        .allow_scroll(false)
        .allow_zoom(false)
        .link_axis(X_LINK_GROUP, [true, false])
        .show_axes([bottom, false])
        .show_grid([false, false])
        .y_axis_label(bar.column.clone())
        .include_y(0.0)
        .include_y(1.0)
        .x_axis_formatter(move |mark, range| {
            formatter.format_tick(mark.value, (*range.start(), *range.end()), mark.step_size.abs())
        })
        .show(ui, |plot_ui| {
            for (run, label) in bar.runs.iter().zip(&bar.run_labels) {
                let fill = classes.color(run.class).to_color32();
                let rect = vec![[run.start, 0.0], [run.end, 0.0], [run.end, 1.0], [run.start, 1.0]];
                plot_ui.polygon(
                    Polygon::new(label.clone(), PlotPoints::from(rect))
                        .fill_color(fill)
                        .stroke(Stroke::NONE),
                );
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLUE: Rgba = Rgba::new(0.0, 0.0, 1.0, 1.0);
    const RED: Rgba = Rgba::new(1.0, 0.0, 0.0, 1.0);

    fn line(x: Vec<f64>, colors: Vec<Rgba>) -> SeriesCloud {
        let ids = (0..x.len() as u64).collect();
        let y = x.clone();
        SeriesCloud::new("s", CloudKind::Line, x, y, ids, (0.0, 10.0), colors)
    }

    #[test]
    fn lone_point_becomes_a_marker() {
        let cloud = line(vec![3.0], Vec::new());
        assert_eq!(line_shape(&cloud, BLUE), LineShape::Marker([3.0, 0.3], BLUE));
        assert_eq!(line_shape(&line(Vec::new(), Vec::new()), BLUE), LineShape::Empty);
    }

    #[test]
    fn segments_group_by_color() {
        let cloud = line(vec![0.0, 1.0, 2.0, 3.0], vec![RED, RED, BLUE]);
        let LineShape::Runs(runs) = line_shape(&cloud, BLUE) else {
            panic!("expected runs");
        };
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].0.len(), 3);
        assert_eq!(runs[0].1, RED);
        assert_eq!(runs[1].0.len(), 2);
    }
}
