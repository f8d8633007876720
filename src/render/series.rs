//! Series construction: one normalized point cloud per plotted column, with
//! per-point or per-segment colors.

use std::collections::HashMap;

use crate::color_scheme::{series_colors, Rgba, UNMAPPED_GRAY};
use crate::data::settings::{ColorMethod, PlotSettings, PlotType};
use crate::data::table::{RowId, Table, Value, DATETIME_COLUMN};
use crate::error::RenderError;
use crate::geometry::{CloudKind, SeriesCloud};

/// Segments spanning a longer time gap than this are faded.
pub const GAP_FADE_SECS: f64 = 100.0;
/// Alpha multiplier for faded segments.
pub const GAP_FADE_ALPHA: f32 = 0.1;
/// Extra room above and below each series, as a share of its span.
pub const Y_PADDING: f64 = 0.05;

/// The y axis of one plotted column.
#[derive(Clone, Debug, PartialEq)]
pub struct SeriesAxis {
    pub column: String,
    /// Tint of the axis labels.
    pub color: Rgba,
    pub y_range: (f64, f64),
}

#[derive(Clone, Debug, PartialEq)]
pub struct LegendEntry {
    pub name: String,
    pub color: Rgba,
}

/// Output of [`build_series`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SeriesSet {
    pub axes: Vec<SeriesAxis>,
    pub clouds: Vec<SeriesCloud>,
    pub legend: Vec<LegendEntry>,
}

/// Padded y range of a series. A flat series gets ±0.5.
pub fn padded_range(values: &[f64]) -> (f64, f64) {
    let (lo, hi) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
    let span = hi - lo;
    if span == 0.0 {
        (lo - 0.5, hi + 0.5)
    } else {
        let pad = span.abs() * Y_PADDING;
        (lo - pad, hi + pad)
    }
}

/// Label → color over every distinct label of the color column, taken from
/// the whole table so colors do not shift while zooming.
struct LabelPalette {
    colors: HashMap<String, Rgba>,
    legend: Vec<LegendEntry>,
}

impl LabelPalette {
    fn new(names: &[String]) -> Self {
        let colors: HashMap<String, Rgba> = names
            .iter()
            .cloned()
            .zip(series_colors(names.len()))
            .collect();
        let legend = names
            .iter()
            .map(|n| LegendEntry {
                name: n.clone(),
                color: colors[n],
            })
            .collect();
        Self { colors, legend }
    }

    fn color_of(&self, v: &Value) -> Rgba {
        if v.is_null() {
            return UNMAPPED_GRAY;
        }
        self.colors.get(&v.label_string()).copied().unwrap_or(UNMAPPED_GRAY)
    }
}

/// Rows of one series after dropping unusable points, sorted by x.
struct SeriesRows {
    x: Vec<f64>,
    y: Vec<f64>,
    ids: Vec<RowId>,
    positions: Vec<usize>,
}

fn collect_rows(view: &Table, x_axis: &str, column: &str) -> Result<SeriesRows, RenderError> {
    let x_col = view
        .column(x_axis)
        .ok_or_else(|| RenderError::InvalidColumn(x_axis.to_string()))?;
    let y_col = view
        .column(column)
        .ok_or_else(|| RenderError::InvalidColumn(column.to_string()))?;
    let mut rows: Vec<(f64, f64, usize)> = x_col
        .values
        .iter()
        .zip(&y_col.values)
        .enumerate()
        .filter_map(|(pos, (x, y))| {
            let x = x.as_f64()?;
            let y = y.as_f64().filter(|y| y.is_finite())?;
            Some((x, y, pos))
        })
        .collect();
    rows.sort_by(|a, b| a.0.total_cmp(&b.0));
    Ok(SeriesRows {
        x: rows.iter().map(|r| r.0).collect(),
        y: rows.iter().map(|r| r.1).collect(),
        ids: rows.iter().map(|r| view.ids()[r.2]).collect(),
        positions: rows.iter().map(|r| r.2).collect(),
    })
}

/// Fade segments that bridge a long time gap. Segment `i` joins point `i`
/// and point `i + 1`.
fn fade_gaps(view: &Table, positions: &[usize], colors: &mut [Rgba]) {
    let Some(ts) = view.column(DATETIME_COLUMN) else {
        return;
    };
    for (i, color) in colors.iter_mut().enumerate() {
        let (Some(a), Some(b)) = (
            ts.values[positions[i]].as_datetime(),
            ts.values[positions[i + 1]].as_datetime(),
        ) else {
            continue;
        };
        let gap = (b - a).num_milliseconds().abs() as f64 / 1000.0;
        if gap > GAP_FADE_SECS {
            *color = color.with_alpha(color.a * GAP_FADE_ALPHA);
        }
    }
}

/// Build the clouds for every column of `settings.plot_list` over `view`.
///
/// `label_names` are the distinct labels of the color column over the whole
/// table; they fix the label palette in [`ColorMethod::ByLabel`] mode.
/// Columns with no finite values are skipped.
pub fn build_series(
    view: &Table,
    settings: &PlotSettings,
    label_names: &[String],
) -> Result<SeriesSet, RenderError> {
    let column_colors = series_colors(settings.plot_list.len());
    let by_label = settings.color_method == ColorMethod::ByLabel;
    let color_col = if by_label {
        if settings.color_column.is_empty() {
            return Err(RenderError::MissingColorColumn);
        }
        Some(
            view.column(&settings.color_column)
                .ok_or_else(|| RenderError::InvalidColumn(settings.color_column.clone()))?,
        )
    } else {
        None
    };
    let palette = LabelPalette::new(label_names);
    let kind = match settings.plot_type {
        PlotType::Line => CloudKind::Line,
        PlotType::Scatter => CloudKind::Scatter,
    };

    let mut out = SeriesSet::default();
    for (col_idx, column) in settings.plot_list.iter().enumerate() {
        let rows = collect_rows(view, &settings.x_axis, column)?;
        if rows.x.is_empty() {
            continue;
        }
        let column_color = column_colors[col_idx];
        let point_colors: Vec<Rgba> = match color_col {
            Some(c) => rows.positions.iter().map(|p| palette.color_of(&c.values[*p])).collect(),
            None => vec![column_color; rows.x.len()],
        };
        let base_colors = match kind {
            CloudKind::Scatter => point_colors,
            CloudKind::Line => {
                let mut seg = point_colors;
                seg.truncate(rows.x.len().saturating_sub(1));
                fade_gaps(view, &rows.positions, &mut seg);
                seg
            }
        };
        let y_range = padded_range(&rows.y);
        out.axes.push(SeriesAxis {
            column: column.clone(),
            color: column_color,
            y_range,
        });
        out.clouds.push(SeriesCloud::new(
            column.clone(),
            kind,
            rows.x,
            rows.y,
            rows.ids,
            y_range,
            base_colors,
        ));
    }

    out.legend = match color_col {
        Some(c) => {
            let mut legend = palette.legend;
            if c.values.iter().any(Value::is_null) {
                legend.push(LegendEntry {
                    name: "None".to_string(),
                    color: UNMAPPED_GRAY,
                });
            }
            legend
        }
        None => settings
            .plot_list
            .iter()
            .zip(&column_colors)
            .map(|(name, color)| LegendEntry {
                name: name.clone(),
                color: *color,
            })
            .collect(),
    };
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color_scheme::TAB10;
    use crate::data::table::Column;
    use chrono::NaiveDate;

    fn table() -> Table {
        let t0 = NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        let offsets = [0, 10, 20, 500];
        Table::with_sequential_ids(vec![
            Column::from_datetimes(
                DATETIME_COLUMN,
                offsets.iter().map(|s| t0 + chrono::Duration::seconds(*s)),
            ),
            Column::from_f64("depth", [1.0, f64::NAN, 3.0, 5.0]),
            Column::from_text("lbl", [Some("a"), Some("b"), None, Some("a")]),
        ])
        .unwrap()
    }

    fn settings() -> PlotSettings {
        PlotSettings {
            plot_list: vec!["depth".into()],
            ..PlotSettings::default()
        }
    }

    #[test]
    fn non_finite_points_are_dropped_and_range_padded() {
        let set = build_series(&table(), &settings(), &[]).unwrap();
        let cloud = &set.clouds[0];
        assert_eq!(cloud.ids, vec![0, 2, 3]);
        let (lo, hi) = set.axes[0].y_range;
        assert!((lo - 0.8).abs() < 1e-9 && (hi - 5.2).abs() < 1e-9);
        assert_eq!(set.legend[0].color, TAB10[0]);
    }

    #[test]
    fn long_gaps_fade_line_segments() {
        let set = build_series(&table(), &settings(), &[]).unwrap();
        let colors = &set.clouds[0].base_colors;
        assert_eq!(colors.len(), 2);
        assert_eq!(colors[0].a, 1.0);
        assert!((colors[1].a - GAP_FADE_ALPHA).abs() < 1e-6);
    }

    #[test]
    fn by_label_colors_points() {
        let mut s = settings();
        s.plot_type = PlotType::Scatter;
        s.color_method = ColorMethod::ByLabel;
        s.color_column = "lbl".into();
        let names = vec!["a".to_string(), "b".to_string()];
        let set = build_series(&table(), &s, &names).unwrap();
        let colors = &set.clouds[0].base_colors;
        assert_eq!(colors, &vec![TAB10[0], UNMAPPED_GRAY, TAB10[0]]);
        let legend: Vec<&str> = set.legend.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(legend, ["a", "b", "None"]);
    }

    #[test]
    fn by_label_needs_a_column() {
        let mut s = settings();
        s.color_method = ColorMethod::ByLabel;
        assert!(matches!(
            build_series(&table(), &s, &[]),
            Err(RenderError::MissingColorColumn)
        ));
    }

    #[test]
    fn flat_series_gets_unit_range() {
        assert_eq!(padded_range(&[2.0, 2.0]), (1.5, 2.5));
    }
}
