//! Stacked label bars: one thin strip per label column showing which class
//! each stretch of the x-axis belongs to.
//!
//! Consecutive rows with the same class are collapsed into a single run
//! before anything is drawn.

use crate::color_scheme::{rainbow_colors, Rgba, NONE_CLASS_GRAY};
use crate::data::table::{Table, Value};
use crate::error::RenderError;

/// Height of a label bar relative to the main plot (which counts as 10).
pub const LABEL_BAR_RELATIVE_HEIGHT: f32 = 0.3;

/// Name of the class for rows without a label.
pub const NONE_CLASS: &str = "None";

/// One stretch `[start, end]` of the x-axis with a single class.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LabelRun {
    pub start: f64,
    pub end: f64,
    /// Index into [`LabelClasses::names`].
    pub class: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LabelBar {
    pub column: String,
    pub runs: Vec<LabelRun>,
    /// Original label text per run, for hover readouts.
    pub run_labels: Vec<String>,
}

/// Classes shared by all bars of one frame. Index 0 is always `"None"`.
#[derive(Clone, Debug, PartialEq)]
pub struct LabelClasses {
    pub names: Vec<String>,
    pub colors: Vec<Rgba>,
}

impl Default for LabelClasses {
    fn default() -> Self {
        Self {
            names: vec![NONE_CLASS.to_string()],
            colors: vec![NONE_CLASS_GRAY],
        }
    }
}

impl LabelClasses {
    /// `"None"` first, then every other class sorted, on a rainbow.
    pub fn from_labels(mut labels: Vec<String>) -> Self {
        labels.retain(|l| !is_none_class(l));
        labels.sort();
        labels.dedup();
        let mut classes = Self::default();
        classes.colors.extend(rainbow_colors(labels.len()));
        classes.names.extend(labels);
        classes
    }

    pub fn index_of(&self, label: &str) -> usize {
        self.names.iter().position(|n| n == label).unwrap_or(0)
    }

    pub fn color(&self, class: usize) -> Rgba {
        self.colors.get(class).copied().unwrap_or(NONE_CLASS_GRAY)
    }
}

fn is_none_class(label: &str) -> bool {
    matches!(label, "None" | "nan" | "<NA>" | "")
}

fn class_label(v: &Value) -> String {
    let s = v.label_string();
    if is_none_class(&s) {
        NONE_CLASS.to_string()
    } else {
        s
    }
}

/// Collapse per-row classes into runs. A run reaches to the start of the
/// next run; the last run ends at the last row. Needs `x` sorted.
pub fn run_length(x: &[f64], classes: &[usize]) -> Vec<LabelRun> {
    let n = x.len().min(classes.len());
    if n < 2 {
        return Vec::new();
    }
    let mut bounds: Vec<usize> = (0..n)
        .filter(|&i| i == 0 || classes[i] != classes[i - 1])
        .collect();
    if bounds.last() != Some(&(n - 1)) {
        bounds.push(n - 1);
    }
    bounds
        .windows(2)
        .map(|w| LabelRun {
            start: x[w[0]],
            end: x[w[1]],
            class: classes[w[0]],
        })
        .collect()
}

/// Build one bar per column in `columns` over the rows of `view`, ordered
/// by `x_axis`.
pub fn build_label_bars(
    view: &Table,
    x_axis: &str,
    columns: &[String],
) -> Result<(Vec<LabelBar>, LabelClasses), RenderError> {
    if columns.is_empty() || view.is_empty() {
        return Ok((Vec::new(), LabelClasses::default()));
    }
    let x_col = view
        .column(x_axis)
        .ok_or_else(|| RenderError::InvalidColumn(x_axis.to_string()))?;
    let mut order: Vec<(usize, f64)> = x_col
        .values
        .iter()
        .enumerate()
        .filter_map(|(pos, v)| v.as_f64().map(|x| (pos, x)))
        .collect();
    order.sort_by(|a, b| a.1.total_cmp(&b.1));
    let xs: Vec<f64> = order.iter().map(|(_, x)| *x).collect();

    let mut label_cols = Vec::with_capacity(columns.len());
    for name in columns {
        let col = view
            .column(name)
            .ok_or_else(|| RenderError::InvalidColumn(name.clone()))?;
        let labels: Vec<String> = order.iter().map(|(pos, _)| class_label(&col.values[*pos])).collect();
        label_cols.push((name.clone(), labels));
    }

    let classes = LabelClasses::from_labels(
        label_cols.iter().flat_map(|(_, l)| l.iter().cloned()).collect(),
    );
    let bars = label_cols
        .into_iter()
        .map(|(column, labels)| {
            let idx: Vec<usize> = labels.iter().map(|l| classes.index_of(l)).collect();
            let runs = run_length(&xs, &idx);
            let run_labels = runs.iter().map(|r| classes.names[r.class].clone()).collect();
            LabelBar {
                column,
                runs,
                run_labels,
            }
        })
        .collect();
    Ok((bars, classes))
}
