//! Selection geometry: maps gestures made on the shared, normalized plot
//! surface back to row identifiers, and maps the current selection onto each
//! series' color buffer.
//!
//! Every series is drawn on one surface whose y range is `[0, 1]`; a series'
//! true values are mapped into it with that series' own `(y_min, y_max)`.
//! Gesture coordinates are `[x, y_normalized]`, with x in axis units (seconds
//! since the epoch for a datetime axis).

use crate::color_scheme::Rgba;
use crate::data::table::{RowId, RowSet};

/// Unselected points and segments are blended this far toward white.
pub const UNSELECTED_LIGHTEN: f32 = 0.75;

/// How a cloud is drawn, which decides what one color entry belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloudKind {
    /// One color per segment; segment `i` joins point `i` and point `i + 1`.
    Line,
    /// One color per point.
    Scatter,
}

/// The points of one rendered series, with the row each point came from.
#[derive(Clone, Debug, PartialEq)]
pub struct SeriesCloud {
    pub name: String,
    pub kind: CloudKind,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub ids: Vec<RowId>,
    pub y_min: f64,
    pub y_max: f64,
    /// Colors with nothing selected.
    pub base_colors: Vec<Rgba>,
    /// Colors currently drawn.
    pub colors: Vec<Rgba>,
}

impl SeriesCloud {
    /// Build a cloud; `base_colors` must have one entry per point for scatter
    /// and one per segment for lines.
    pub fn new(
        name: impl Into<String>,
        kind: CloudKind,
        x: Vec<f64>,
        y: Vec<f64>,
        ids: Vec<RowId>,
        (y_min, y_max): (f64, f64),
        base_colors: Vec<Rgba>,
    ) -> Self {
        debug_assert_eq!(x.len(), y.len());
        debug_assert_eq!(x.len(), ids.len());
        Self {
            name: name.into(),
            kind,
            x,
            y,
            ids,
            y_min,
            y_max,
            colors: base_colors.clone(),
            base_colors,
        }
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Map a normalized surface y back into this series' units.
    pub fn denormalize_y(&self, y: f64) -> f64 {
        y * (self.y_max - self.y_min) + self.y_min
    }

    pub fn normalize_y(&self, y: f64) -> f64 {
        let span = self.y_max - self.y_min;
        if span == 0.0 {
            0.5
        } else {
            (y - self.y_min) / span
        }
    }

    /// Points on the normalized surface, in draw order.
    pub fn normalized_points(&self) -> Vec<[f64; 2]> {
        self.x
            .iter()
            .zip(&self.y)
            .map(|(x, y)| [*x, self.normalize_y(*y)])
            .collect()
    }

    fn select_where(&self, mut keep: impl FnMut(f64, f64) -> bool) -> impl Iterator<Item = RowId> + '_ {
        let hits: Vec<usize> = (0..self.len()).filter(|&i| keep(self.x[i], self.y[i])).collect();
        hits.into_iter().map(move |i| self.ids[i])
    }

    /// Recompute [`colors`](Self::colors) from [`base_colors`](Self::base_colors).
    fn recolor(&mut self, selection: &RowSet) {
        if selection.is_empty() {
            self.colors.clone_from(&self.base_colors);
            return;
        }
        let n_entries = self.base_colors.len();
        let selected: Vec<bool> = (0..n_entries)
            .map(|i| self.ids.get(i).is_some_and(|id| selection.contains(id)))
            .collect();
        // A line untouched by the selection keeps its own colors.
        if self.kind == CloudKind::Line && !selected.contains(&true) {
            self.colors.clone_from(&self.base_colors);
            return;
        }
        self.colors = (0..n_entries)
            .map(|i| {
                let base = self.base_colors[i];
                if selected[i] {
                    base
                } else {
                    base.lighten(UNSELECTED_LIGHTEN)
                }
            })
            .collect();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Polygon helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Shoelace area of a polygon (absolute value).
pub fn polygon_area(poly: &[[f64; 2]]) -> f64 {
    if poly.len() < 3 {
        return 0.0;
    }
    let twice: f64 = poly
        .iter()
        .zip(poly.iter().cycle().skip(1))
        .map(|(a, b)| a[0] * b[1] - b[0] * a[1])
        .sum();
    (twice / 2.0).abs()
}

/// Even-odd ray casting. Points exactly on an edge may fall either way.
pub fn point_in_polygon(p: [f64; 2], poly: &[[f64; 2]]) -> bool {
    let mut inside = false;
    let mut j = poly.len().wrapping_sub(1);
    for i in 0..poly.len() {
        let (a, b) = (poly[i], poly[j]);
        if (a[1] > p[1]) != (b[1] > p[1]) {
            let x_cross = (b[0] - a[0]) * (p[1] - a[1]) / (b[1] - a[1]) + a[0];
            if p[0] < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

// ─────────────────────────────────────────────────────────────────────────────
// SelectionTranslator
// ─────────────────────────────────────────────────────────────────────────────

/// Point clouds of the current frame plus the gesture → rows and
/// rows → colors mappings over them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SelectionTranslator {
    clouds: Vec<SeriesCloud>,
}

impl SelectionTranslator {
    pub fn new(clouds: Vec<SeriesCloud>) -> Self {
        Self { clouds }
    }

    pub fn clouds(&self) -> &[SeriesCloud] {
        &self.clouds
    }

    pub fn is_empty(&self) -> bool {
        self.clouds.iter().all(SeriesCloud::is_empty)
    }

    /// Rows whose point lies inside the lasso, over every series. Fewer than
    /// three vertices or a zero-area polygon selects nothing.
    pub fn lasso_select(&self, polygon: &[[f64; 2]]) -> RowSet {
        if polygon.len() < 3 || polygon_area(polygon) == 0.0 {
            return RowSet::new();
        }
        let mut out = RowSet::new();
        for cloud in &self.clouds {
            let poly: Vec<[f64; 2]> = polygon
                .iter()
                .map(|v| [v[0], cloud.denormalize_y(v[1])])
                .collect();
            out.extend(cloud.select_where(|x, y| point_in_polygon([x, y], &poly)));
        }
        out
    }

    /// Rows inside the axis-aligned box spanned by two corners (inclusive).
    pub fn rectangle_select(&self, a: [f64; 2], b: [f64; 2]) -> RowSet {
        let (x0, x1) = (a[0].min(b[0]), a[0].max(b[0]));
        let mut out = RowSet::new();
        for cloud in &self.clouds {
            let ya = cloud.denormalize_y(a[1]);
            let yb = cloud.denormalize_y(b[1]);
            let (y0, y1) = (ya.min(yb), ya.max(yb));
            out.extend(cloud.select_where(|x, y| x >= x0 && x <= x1 && y >= y0 && y <= y1));
        }
        out
    }

    /// Rows whose x lies in `[x_min, x_max]` (either order), ignoring y.
    pub fn span_select(&self, x_min: f64, x_max: f64) -> RowSet {
        let (x0, x1) = (x_min.min(x_max), x_min.max(x_max));
        let mut out = RowSet::new();
        for cloud in &self.clouds {
            out.extend(cloud.select_where(|x, _| x >= x0 && x <= x1));
        }
        out
    }

    /// Refresh every color buffer for `selection`. Only colors change; the
    /// result depends on `selection` alone, so repeated calls are stable.
    pub fn recolor_for_selection(&mut self, selection: &RowSet) {
        for cloud in &mut self.clouds {
            cloud.recolor(selection);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cloud(kind: CloudKind) -> SeriesCloud {
        let x = vec![0.0, 1.0, 2.0, 3.0];
        let y = vec![10.0, 20.0, 30.0, 40.0];
        let n_colors = if kind == CloudKind::Line { 3 } else { 4 };
        SeriesCloud::new(
            "s",
            kind,
            x,
            y,
            vec![100, 101, 102, 103],
            (10.0, 40.0),
            vec![Rgba::new(1.0, 0.0, 0.0, 1.0); n_colors],
        )
    }

    #[test]
    fn lasso_denormalizes_y_per_series() {
        let t = SelectionTranslator::new(vec![cloud(CloudKind::Scatter)]);
        // Normalized 0.0..0.5 covers y 10..25.
        let poly = [[-0.5, -0.1], [1.5, -0.1], [1.5, 0.5], [-0.5, 0.5]];
        assert_eq!(t.lasso_select(&poly), RowSet::from([100, 101]));
    }

    #[test]
    fn degenerate_lasso_is_empty() {
        let t = SelectionTranslator::new(vec![cloud(CloudKind::Scatter)]);
        assert!(t.lasso_select(&[[0.0, 0.0], [3.0, 1.0]]).is_empty());
        assert!(t.lasso_select(&[[0.0, 0.0], [1.0, 1.0], [2.0, 2.0]]).is_empty());
    }

    #[test]
    fn line_recolor_targets_following_segment() {
        let mut t = SelectionTranslator::new(vec![cloud(CloudKind::Line)]);
        t.recolor_for_selection(&RowSet::from([101]));
        let colors = &t.clouds()[0].colors;
        assert_eq!(colors.len(), 3);
        assert_eq!(colors[1], Rgba::new(1.0, 0.0, 0.0, 1.0));
        assert_eq!(colors[0], Rgba::new(1.0, 0.0, 0.0, 1.0).lighten(UNSELECTED_LIGHTEN));
        assert_eq!(colors[2], colors[0]);
    }

    #[test]
    fn untouched_line_keeps_base_colors() {
        let mut t = SelectionTranslator::new(vec![cloud(CloudKind::Line), cloud(CloudKind::Scatter)]);
        t.recolor_for_selection(&RowSet::from([103]));
        // 103 is the last point of the line, which starts no segment.
        assert_eq!(t.clouds()[0].colors, t.clouds()[0].base_colors);
        assert_eq!(t.clouds()[1].colors[3], t.clouds()[1].base_colors[3]);
        assert_ne!(t.clouds()[1].colors[0], t.clouds()[1].base_colors[0]);
    }

    #[test]
    fn empty_selection_restores_base_colors() {
        let mut t = SelectionTranslator::new(vec![cloud(CloudKind::Scatter)]);
        t.recolor_for_selection(&RowSet::from([100]));
        t.recolor_for_selection(&RowSet::new());
        assert_eq!(t.clouds()[0].colors, t.clouds()[0].base_colors);
    }

    #[test]
    fn point_in_polygon_triangle() {
        let tri = [[0.0, 0.0], [4.0, 0.0], [0.0, 4.0]];
        assert!(point_in_polygon([1.0, 1.0], &tri));
        assert!(!point_in_polygon([3.0, 3.0], &tri));
        assert_eq!(polygon_area(&tri), 8.0);
    }
}
